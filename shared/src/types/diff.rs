//! Stub header comparison
//!
//! Compares the symbol sets of two stub headers (baseline vs comparison) and
//! reports what was added, dropped or redefined.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::stub::{StubSymbol, SymbolKind};

/// Symbol-level diff of two stub headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubDiff {
    pub baseline: PathBuf,
    pub comparison: PathBuf,
    pub baseline_total: usize,
    pub comparison_total: usize,
    /// Sorted by name
    pub only_in_baseline: Vec<StubSymbol>,
    /// Sorted by name
    pub only_in_comparison: Vec<StubSymbol>,
    /// Declared by both, with a different kind or definition
    pub changed: Vec<SymbolChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolChange {
    pub name: String,
    pub baseline_kind: SymbolKind,
    pub comparison_kind: SymbolKind,
    pub baseline_detail: String,
    pub comparison_detail: String,
}

impl StubDiff {
    /// Every symbol of the baseline is still declared by the comparison
    pub fn is_superset(&self) -> bool {
        self.only_in_baseline.is_empty()
    }

    pub fn is_identical(&self) -> bool {
        self.only_in_baseline.is_empty()
            && self.only_in_comparison.is_empty()
            && self.changed.is_empty()
    }
}

/// Tags live in their own namespace, so `struct fd` and a typedef `fd` are
/// different keys.
fn diff_key(sym: &StubSymbol) -> (bool, &str) {
    (sym.kind == SymbolKind::Tag, sym.name.as_str())
}

/// Index symbols by key. When a header declares a name more than once the
/// last declaration wins, except that a tag definition beats a later
/// forward declaration.
fn index(symbols: &[StubSymbol]) -> BTreeMap<(bool, &str), &StubSymbol> {
    let mut map: BTreeMap<(bool, &str), &StubSymbol> = BTreeMap::new();
    for sym in symbols {
        let key = diff_key(sym);
        let keep_existing = map.get(&key).is_some_and(|existing| {
            existing.kind == SymbolKind::Tag
                && existing.detail.ends_with('}')
                && !sym.detail.ends_with('}')
        });
        if !keep_existing {
            map.insert(key, sym);
        }
    }
    map
}

/// Compare two stub headers symbol-by-symbol.
pub fn diff_stubs(
    baseline_path: PathBuf,
    baseline: &[StubSymbol],
    comparison_path: PathBuf,
    comparison: &[StubSymbol],
) -> StubDiff {
    let b = index(baseline);
    let c = index(comparison);

    let all_keys: BTreeSet<&(bool, &str)> = b.keys().chain(c.keys()).collect();

    let mut only_in_baseline = Vec::new();
    let mut only_in_comparison = Vec::new();
    let mut changed = Vec::new();

    for key in all_keys {
        match (b.get(key), c.get(key)) {
            (Some(bs), None) => only_in_baseline.push((*bs).clone()),
            (None, Some(cs)) => only_in_comparison.push((*cs).clone()),
            (Some(bs), Some(cs)) => {
                if bs.kind != cs.kind || bs.detail != cs.detail {
                    changed.push(SymbolChange {
                        name: bs.name.clone(),
                        baseline_kind: bs.kind,
                        comparison_kind: cs.kind,
                        baseline_detail: bs.detail.clone(),
                        comparison_detail: cs.detail.clone(),
                    });
                }
            }
            (None, None) => {}
        }
    }

    only_in_baseline.sort_by(|x, y| x.name.cmp(&y.name));
    only_in_comparison.sort_by(|x, y| x.name.cmp(&y.name));
    changed.sort_by(|x, y| x.name.cmp(&y.name));

    StubDiff {
        baseline: baseline_path,
        comparison: comparison_path,
        baseline_total: b.len(),
        comparison_total: c.len(),
        only_in_baseline,
        only_in_comparison,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, kind: SymbolKind, detail: &str) -> StubSymbol {
        StubSymbol::new(name, kind, 1, detail)
    }

    #[test]
    fn test_diff_superset() {
        let baseline = vec![
            sym("u8", SymbolKind::Typedef, "unsigned char"),
            sym("likely", SymbolKind::FunctionMacro, "(x)"),
        ];
        let comparison = vec![
            sym("u8", SymbolKind::Typedef, "unsigned char"),
            sym("likely", SymbolKind::FunctionMacro, "(x)"),
            sym("IS_MODULE", SymbolKind::Macro, "1"),
        ];

        let diff = diff_stubs("a.h".into(), &baseline, "b.h".into(), &comparison);
        assert!(diff.is_superset());
        assert!(!diff.is_identical());
        assert_eq!(diff.only_in_comparison.len(), 1);
        assert_eq!(diff.only_in_comparison[0].name, "IS_MODULE");
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn test_diff_changed_and_dropped() {
        let baseline = vec![
            sym("GFP_KERNEL", SymbolKind::Macro, "0"),
            sym("jiffies", SymbolKind::Variable, "extern unsigned long jiffies"),
        ];
        let comparison = vec![sym("GFP_KERNEL", SymbolKind::Macro, "0x400")];

        let diff = diff_stubs("a.h".into(), &baseline, "b.h".into(), &comparison);
        assert!(!diff.is_superset());
        assert_eq!(diff.only_in_baseline[0].name, "jiffies");
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].baseline_detail, "0");
        assert_eq!(diff.changed[0].comparison_detail, "0x400");
    }

    #[test]
    fn test_tag_namespace_is_separate() {
        let baseline = vec![sym("fd", SymbolKind::Tag, "struct fd")];
        let comparison = vec![
            sym("fd", SymbolKind::Tag, "struct fd"),
            sym("fd", SymbolKind::Typedef, "int"),
        ];
        let diff = diff_stubs("a.h".into(), &baseline, "b.h".into(), &comparison);
        assert!(diff.changed.is_empty());
        assert_eq!(diff.only_in_comparison.len(), 1);
        assert_eq!(diff.only_in_comparison[0].kind, SymbolKind::Typedef);
    }

    #[test]
    fn test_definition_beats_later_forward_declaration() {
        let baseline = vec![
            sym("list_head", SymbolKind::Tag, "struct list_head {}"),
            sym("list_head", SymbolKind::Tag, "struct list_head"),
        ];
        let comparison = vec![sym("list_head", SymbolKind::Tag, "struct list_head {}")];
        let diff = diff_stubs("a.h".into(), &baseline, "b.h".into(), &comparison);
        assert!(diff.is_identical());
    }
}

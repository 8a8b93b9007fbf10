//! Stub declarations for unresolved identifiers

use std::collections::BTreeMap;
use std::fmt::Write;

use kcorpus_shared::types::report::{UnresolvedIdent, UsageKind};
use kcorpus_shared::utils::is_all_caps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Types,
    Macros,
    Functions,
    Variables,
}

impl Section {
    fn title(&self) -> &'static str {
        match self {
            Self::Types => "TYPES",
            Self::Macros => "MACROS",
            Self::Functions => "FUNCTIONS",
            Self::Variables => "GLOBAL VARIABLES",
        }
    }
}

fn declaration(ident: &UnresolvedIdent) -> (Section, String) {
    let name = &ident.name;
    match ident.usage {
        UsageKind::Type => (Section::Types, format!("typedef int {};", name)),
        UsageKind::Call if is_all_caps(name) => {
            (Section::Macros, format!("#define {}(...) 0", name))
        }
        UsageKind::Call => (Section::Functions, format!("long {}();", name)),
        UsageKind::Value if is_all_caps(name) => (Section::Macros, format!("#define {} 0", name)),
        UsageKind::Value => (Section::Variables, format!("extern long {};", name)),
        UsageKind::MacroCondition => (Section::Macros, format!("#define {}(x) 0", name)),
    }
}

/// Render a header fragment declaring every identifier in `unresolved`,
/// grouped in `// ===== SECTION =====` blocks and sorted by name
pub fn suggest(unresolved: &[UnresolvedIdent]) -> String {
    let mut sections: BTreeMap<Section, BTreeMap<&str, String>> = BTreeMap::new();
    for ident in unresolved {
        let (section, line) = declaration(ident);
        sections
            .entry(section)
            .or_default()
            .insert(ident.name.as_str(), line);
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "// Generated declarations for {} unresolved identifier(s)",
        unresolved.len()
    );
    for (section, lines) in &sections {
        let _ = writeln!(out, "\n// ===== GENERATED {} =====", section.title());
        for line in lines.values() {
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ident(name: &str, usage: UsageKind) -> UnresolvedIdent {
        UnresolvedIdent {
            name: name.to_string(),
            usage,
            occurrences: 1,
            samples: 1,
            first_seen: PathBuf::from("a.c"),
        }
    }

    #[test]
    fn test_declaration_forms() {
        let cases = [
            (ident("spinlock_t", UsageKind::Type), "typedef int spinlock_t;"),
            (ident("BUG_ON", UsageKind::Call), "#define BUG_ON(...) 0"),
            (ident("kfree_skb", UsageKind::Call), "long kfree_skb();"),
            (ident("EINVAL", UsageKind::Value), "#define EINVAL 0"),
            (ident("jiffies", UsageKind::Value), "extern long jiffies;"),
            (ident("IS_ENABLED", UsageKind::MacroCondition), "#define IS_ENABLED(x) 0"),
        ];
        for (ident, expected) in cases {
            assert_eq!(declaration(&ident).1, expected);
        }
    }

    #[test]
    fn test_sections_are_sorted() {
        let out = suggest(&[
            ident("jiffies", UsageKind::Value),
            ident("kzalloc", UsageKind::Call),
            ident("EFAULT", UsageKind::Value),
            ident("atomic_t", UsageKind::Type),
            ident("EINVAL", UsageKind::Value),
        ]);
        let expected = "\
// Generated declarations for 5 unresolved identifier(s)

// ===== GENERATED TYPES =====
typedef int atomic_t;

// ===== GENERATED MACROS =====
#define EFAULT 0
#define EINVAL 0

// ===== GENERATED FUNCTIONS =====
long kzalloc();

// ===== GENERATED GLOBAL VARIABLES =====
extern long jiffies;
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            suggest(&[]),
            "// Generated declarations for 0 unresolved identifier(s)\n"
        );
    }
}

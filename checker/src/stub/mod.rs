//! Stub headers
//!
//! A stub header makes kernel identifiers known to a parser that never sees
//! the real kernel headers. Several stubs on one include path behave as a
//! single symbol set.

pub mod generate;
pub mod lint;
pub mod parser;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use kcorpus_shared::types::diff::{diff_stubs, StubDiff};
use kcorpus_shared::types::stub::{StubSymbol, SymbolKind, TagDecl};
use tracing::debug;

use crate::error::{CorpusError, Result};
use crate::lexer::lex;
use crate::usage::{analyze, Usage};

pub use generate::suggest;
pub use lint::lint;

/// One parsed stub header
#[derive(Debug, Clone)]
pub struct StubHeader {
    pub path: PathBuf,
    symbols: Vec<StubSymbol>,
    tags: Vec<TagDecl>,
    /// Identifier usage inside the header itself
    usage: Usage,
}

impl StubHeader {
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Self {
        let lexed = lex(text);
        let decls = parser::parse_declarations(&lexed);

        let typedefs: HashSet<String> = decls
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Typedef)
            .map(|s| s.name.clone())
            .collect();
        let usage = analyze(&lexed, &typedefs);

        Self {
            path: path.into(),
            symbols: decls.symbols,
            tags: decls.tags,
            usage,
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CorpusError::StubNotFound(path.to_path_buf()));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CorpusError::io(path, e))?;
        let header = Self::parse(path, &String::from_utf8_lossy(&bytes));
        debug!(
            "Parsed stub {}: {} symbols, {} tag declarations",
            path.display(),
            header.symbols.len(),
            header.tags.len()
        );
        Ok(header)
    }

    /// Every symbol in declaration order
    pub fn symbols(&self) -> &[StubSymbol] {
        &self.symbols
    }

    pub fn tags(&self) -> &[TagDecl] {
        &self.tags
    }

    pub(crate) fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Whether the header declares `name` in the ordinary (non-tag) namespace
    pub fn defines(&self, name: &str) -> bool {
        self.symbols
            .iter()
            .any(|s| s.name == name && s.kind != SymbolKind::Tag)
    }

    pub fn typedef_names(&self) -> impl Iterator<Item = &str> {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Typedef)
            .map(|s| s.name.as_str())
    }

    /// Symbol-level comparison against another header
    pub fn diff(&self, other: &StubHeader) -> StubDiff {
        diff_stubs(
            self.path.clone(),
            &self.symbols,
            other.path.clone(),
            &other.symbols,
        )
    }
}

/// Several stub headers merged into one symbol set
#[derive(Debug, Clone, Default)]
pub struct StubSet {
    paths: Vec<PathBuf>,
    names: HashSet<String>,
    tags: HashSet<String>,
    typedefs: HashSet<String>,
}

impl StubSet {
    pub fn merge(headers: &[StubHeader]) -> Self {
        let mut set = StubSet::default();
        for header in headers {
            set.paths.push(header.path.clone());
            for sym in header.symbols() {
                match sym.kind {
                    SymbolKind::Tag => {
                        set.tags.insert(sym.name.clone());
                    }
                    SymbolKind::Typedef => {
                        set.typedefs.insert(sym.name.clone());
                        set.names.insert(sym.name.clone());
                    }
                    _ => {
                        set.names.insert(sym.name.clone());
                    }
                }
            }
        }
        set
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn provides(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn provides_tag(&self, name: &str) -> bool {
        self.tags.contains(name)
    }

    /// Typedef names, used to recognise declarations in samples
    pub fn known_types(&self) -> &HashSet<String> {
        &self.typedefs
    }

    /// Distinct names in the ordinary namespace
    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// Load every stub header in order
pub async fn load_all(paths: &[PathBuf]) -> Result<Vec<StubHeader>> {
    let mut headers = Vec::with_capacity(paths.len());
    for path in paths {
        headers.push(StubHeader::load(path).await?);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "\
// ===== BASIC TYPES =====
typedef unsigned char u8, __u8;
typedef int gfp_t;
#define NULL ((void*)0)
struct list_head { struct list_head *next, *prev; };
void* kmalloc(unsigned long size, gfp_t flags);
";

    #[test]
    fn test_defines_and_typedefs() {
        let header = StubHeader::parse("base.h", BASE);
        assert!(header.defines("u8"));
        assert!(header.defines("kmalloc"));
        assert!(header.defines("NULL"));
        // tags live in their own namespace
        assert!(!header.defines("list_head"));

        let mut typedefs: Vec<&str> = header.typedef_names().collect();
        typedefs.sort();
        assert_eq!(typedefs, vec!["__u8", "gfp_t", "u8"]);
    }

    #[test]
    fn test_merge() {
        let base = StubHeader::parse("base.h", BASE);
        let extra = StubHeader::parse("extra.h", "#define IS_MODULE 1\ntypedef long loff_t;\n");
        let set = StubSet::merge(&[base, extra]);

        assert_eq!(set.paths().len(), 2);
        assert!(set.provides("IS_MODULE"));
        assert!(set.provides("kmalloc"));
        assert!(set.provides_tag("list_head"));
        assert!(!set.provides("list_head"));
        assert!(set.known_types().contains("loff_t"));
    }

    #[test]
    fn test_diff_headers() {
        let base = StubHeader::parse("base.h", BASE);
        let grown = StubHeader::parse("grown.h", &format!("{}#define IS_MODULE 1\n", BASE));
        let diff = base.diff(&grown);
        assert!(diff.is_superset());
        assert_eq!(diff.only_in_comparison.len(), 1);
        assert_eq!(diff.only_in_comparison[0].name, "IS_MODULE");
    }

    #[tokio::test]
    async fn test_load_missing() {
        let result = StubHeader::load(Path::new("/nonexistent/stub.h")).await;
        assert!(matches!(result, Err(CorpusError::StubNotFound(_))));
    }
}

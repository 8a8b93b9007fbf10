//! Stub header symbol model
//!
//! A stub header only needs to make identifiers *known* to a parser. These
//! types describe what a header declares and where.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of declaration introduced a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// `#define NAME body`
    Macro,
    /// `#define NAME(args) body`
    FunctionMacro,
    Typedef,
    /// Function prototype
    Function,
    /// Global or extern variable
    Variable,
    /// struct / union / enum tag
    Tag,
    /// Enumeration constant
    Enumerator,
}

impl SymbolKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Macro => "macro",
            Self::FunctionMacro => "function-like macro",
            Self::Typedef => "typedef",
            Self::Function => "function",
            Self::Variable => "variable",
            Self::Tag => "tag",
            Self::Enumerator => "enumerator",
        }
    }

    /// Macros are expanded before parsing, so they shadow every other kind.
    pub fn is_macro(&self) -> bool {
        matches!(self, Self::Macro | Self::FunctionMacro)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// struct, union or enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Struct,
    Union,
    Enum,
}

impl TagKind {
    pub fn from_keyword(kw: &str) -> Option<Self> {
        match kw {
            "struct" => Some(Self::Struct),
            "union" => Some(Self::Union),
            "enum" => Some(Self::Enum),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
        }
    }
}

/// A named symbol declared by a stub header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubSymbol {
    pub name: String,
    pub kind: SymbolKind,

    /// 1-based line of the declaration
    pub line: usize,

    /// Whitespace-normalised definition text (macro body, typedef target,
    /// prototype). Two declarations of one name conflict when this differs.
    pub detail: String,
}

impl StubSymbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: usize, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            line,
            detail: detail.into(),
        }
    }
}

/// One mention of a tag at file scope: a forward declaration or a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDecl {
    pub kind: TagKind,
    pub name: String,
    pub line: usize,

    /// `true` for `struct x { ... }`, `false` for `struct x;`
    pub defined: bool,

    /// Tags of members embedded by value (`struct in6_addr daddr;`), which
    /// must be complete before this definition for a compiler to accept it
    #[serde(default)]
    pub by_value_members: Vec<(TagKind, String)>,
}

impl TagDecl {
    pub fn forward(kind: TagKind, name: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            name: name.into(),
            line,
            defined: false,
            by_value_members: Vec::new(),
        }
    }
}

//! Findings and reports
//!
//! These types are what every check produces, suitable for JSON export
//! and terminal rendering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::sample::{CveId, PairKey};

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Every kind of problem the checker reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    // corpus naming
    UnparsedName,
    UnreadableSample,
    CveMismatch,
    CweMismatch,
    CweDisagreement,

    // vuln/patch pairs
    IdenticalPair,
    WhitespaceOnlyPair,
    OrphanSample,

    // stub coverage
    UnresolvedIdentifier,

    // stub self-consistency
    DuplicateTagDefinition,
    TagKindMismatch,
    IncompleteMember,
    MacroRedefinition,
    TypedefConflict,
    MacroShadowsDeclaration,
    UndeclaredInStub,
}

impl FindingKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnparsedName => "unparsed-name",
            Self::UnreadableSample => "unreadable-sample",
            Self::CveMismatch => "cve-mismatch",
            Self::CweMismatch => "cwe-mismatch",
            Self::CweDisagreement => "cwe-disagreement",
            Self::IdenticalPair => "identical-pair",
            Self::WhitespaceOnlyPair => "whitespace-only-pair",
            Self::OrphanSample => "orphan-sample",
            Self::UnresolvedIdentifier => "unresolved-identifier",
            Self::DuplicateTagDefinition => "duplicate-tag-definition",
            Self::TagKindMismatch => "tag-kind-mismatch",
            Self::IncompleteMember => "incomplete-member",
            Self::MacroRedefinition => "macro-redefinition",
            Self::TypedefConflict => "typedef-conflict",
            Self::MacroShadowsDeclaration => "macro-shadows-declaration",
            Self::UndeclaredInStub => "undeclared-in-stub",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,

    /// File the finding is about (sample or stub header)
    pub path: Option<PathBuf>,

    /// 1-based line, when the finding points into a file
    pub line: Option<usize>,

    pub message: String,
}

impl Finding {
    pub fn new(kind: FindingKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            path: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn error(kind: FindingKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn warning(kind: FindingKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    pub fn info(kind: FindingKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, message)
    }

    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// How an identifier is used in a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    /// `name(...)`
    Call,
    /// In type position: `name *p;`, `(name)x`
    Type,
    /// Any other expression use
    Value,
    /// Function-like use inside `#if` / `#elif`
    MacroCondition,
}

impl UsageKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Type => "type",
            Self::Value => "value",
            Self::MacroCondition => "macro-condition",
        }
    }
}

/// An identifier neither the sample nor any stub declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedIdent {
    pub name: String,

    /// Dominant usage across the corpus
    pub usage: UsageKind,

    /// Total occurrences across all samples
    pub occurrences: usize,

    /// Number of samples using it
    pub samples: usize,

    /// First sample (in path order) where it appears
    pub first_seen: PathBuf,
}

/// Stub coverage of the corpus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageReport {
    pub stub_paths: Vec<PathBuf>,
    pub samples_analyzed: usize,

    /// Distinct bare identifiers the stubs are expected to provide
    pub distinct_identifiers: usize,

    /// How many of those the stubs do provide
    pub covered: usize,

    /// Sorted by number of samples, then occurrences, descending
    pub unresolved: Vec<UnresolvedIdent>,
}

impl CoverageReport {
    pub fn coverage_pct(&self) -> f64 {
        if self.distinct_identifiers == 0 {
            100.0
        } else {
            self.covered as f64 / self.distinct_identifiers as f64 * 100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Line-level change between the two halves of a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStat {
    pub key: PairKey,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl PairStat {
    pub fn is_unchanged(&self) -> bool {
        self.lines_added == 0 && self.lines_removed == 0
    }
}

/// Sample counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub total: usize,

    /// Keyed by layout label
    pub by_layout: BTreeMap<String, usize>,

    /// Keyed by `CWE-<n>`; samples without a CWE are counted under `unknown`
    pub by_cwe: BTreeMap<String, usize>,

    pub vuln: usize,
    pub patch: usize,

    /// Pairs with both halves present
    pub complete_pairs: usize,

    pub distinct_cves: usize,
}

/// Counters derived from the findings list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub by_kind: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Summary::default();
        for f in findings {
            match f.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
            *summary.by_kind.entry(f.kind.label().to_string()).or_insert(0) += 1;
        }
        summary
    }
}

/// Full output of `check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub corpus_root: PathBuf,
    pub inventory: Inventory,
    pub pairs: Vec<PairStat>,
    pub coverage: Option<CoverageReport>,
    pub findings: Vec<Finding>,
    pub summary: Summary,
}

impl CheckReport {
    pub fn new(corpus_root: PathBuf, inventory: Inventory) -> Self {
        Self {
            generated_at: crate::utils::time::now_rfc3339(),
            corpus_root,
            inventory,
            pairs: Vec::new(),
            coverage: None,
            findings: Vec::new(),
            summary: Summary::default(),
        }
    }

    /// Append findings, keeping the list sorted most severe first, then by
    /// path, and refresh the summary
    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
        self.findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.line.cmp(&b.line))
        });
        self.summary = Summary::from_findings(&self.findings);
    }

    /// Drop findings below `min`
    pub fn retain_min_severity(&mut self, min: Severity) {
        self.findings.retain(|f| f.severity >= min);
        self.summary = Summary::from_findings(&self.findings);
    }

    pub fn error_count(&self) -> usize {
        self.summary.errors
    }

    pub fn warning_count(&self) -> usize {
        self.summary.warnings
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Findings that mention a given CVE in their message
    pub fn findings_for(&self, cve: CveId) -> Vec<&Finding> {
        let needle = cve.to_string();
        self.findings
            .iter()
            .filter(|f| f.message.contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_parse() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let mut report = CheckReport::new(PathBuf::from("."), Inventory::default());
        report.extend(vec![
            Finding::error(FindingKind::IdenticalPair, "a"),
            Finding::warning(FindingKind::UnresolvedIdentifier, "b"),
            Finding::warning(FindingKind::UnresolvedIdentifier, "c"),
            Finding::info(FindingKind::OrphanSample, "d"),
        ]);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 2);
        assert!(report.has_errors());
        assert_eq!(report.summary.by_kind["unresolved-identifier"], 2);
    }

    #[test]
    fn test_extend_keeps_errors_first() {
        let mut report = CheckReport::new(PathBuf::from("."), Inventory::default());
        report.extend(vec![Finding::info(FindingKind::OrphanSample, "orphan").at("b.c")]);
        report.extend(vec![
            Finding::warning(FindingKind::UnresolvedIdentifier, "ident").at("a.c"),
            Finding::error(FindingKind::CveMismatch, "late").at("z.c").line(4),
            Finding::error(FindingKind::CveMismatch, "early").at("z.c").line(2),
        ]);
        let order: Vec<&str> = report.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(order, vec!["early", "late", "ident", "orphan"]);
    }

    #[test]
    fn test_retain_min_severity() {
        let mut report = CheckReport::new(PathBuf::from("."), Inventory::default());
        report.extend(vec![
            Finding::info(FindingKind::OrphanSample, "orphan"),
            Finding::warning(FindingKind::IncompleteMember, "member"),
            Finding::error(FindingKind::CveMismatch, "mismatch"),
        ]);
        report.retain_min_severity(Severity::Warning);
        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[0].kind, FindingKind::CveMismatch);
        assert_eq!(report.summary.infos, 0);
    }

    #[test]
    fn test_coverage_pct() {
        let empty = CoverageReport::default();
        assert_eq!(empty.coverage_pct(), 100.0);

        let report = CoverageReport {
            distinct_identifiers: 8,
            covered: 6,
            ..Default::default()
        };
        assert!((report.coverage_pct() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_finding_json_shape() {
        let finding = Finding::error(FindingKind::IdenticalPair, "same bytes")
            .at("data/tmp/instances/CVE-2019-15505_0/vuln.c");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "identical_pair");
        assert_eq!(json["severity"], "error");
        assert!(json["line"].is_null());
    }
}

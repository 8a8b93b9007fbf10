//! Corpus checks: discovery, naming, vuln/patch pairs and stub coverage

pub mod coverage;
pub mod naming;
pub mod pairs;
pub mod scan;

pub use coverage::{check_coverage, CoverageBuilder};
pub use naming::{check_cwe_agreement, check_names};
pub use pairs::check_pairs;
pub use scan::{scan, Corpus};

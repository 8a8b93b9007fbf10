//! Kernel CVE corpus checker
//!
//! This library scans a corpus of vulnerable/patched Linux kernel function
//! excerpts and the stub headers that make them parseable, and reports
//! naming, pairing and stub coverage problems.

pub mod config;
pub mod corpus;
pub mod error;
pub mod lexer;
pub mod output;
pub mod stub;
pub mod usage;

pub use crate::config::CheckerConfig;
pub use crate::error::CorpusError;

use anyhow::{Context, Result};
use kcorpus_shared::types::report::CheckReport;
use std::path::Path;
use tracing::info;

use corpus::{check_coverage, check_cwe_agreement, check_names, check_pairs, scan};
use stub::{StubHeader, StubSet};

/// Load the configured stub headers and merge them into one symbol set
pub async fn load_stubs(config: &CheckerConfig) -> Result<(Vec<StubHeader>, StubSet)> {
    let headers = stub::load_all(&config.stub_paths)
        .await
        .context("Failed to load stub headers")?;
    let set = StubSet::merge(&headers);
    info!(
        "Loaded {} stub header(s) declaring {} names",
        headers.len(),
        set.len()
    );
    Ok((headers, set))
}

/// Run every check against the corpus at `root`
pub async fn run_check(root: &Path, config: &CheckerConfig) -> Result<CheckReport> {
    config.validate().context("Invalid checker configuration")?;

    let corpus = scan(root, config)
        .await
        .with_context(|| format!("Failed to scan corpus at {}", root.display()))?;

    let mut report = CheckReport::new(root.to_path_buf(), corpus.inventory());
    report.extend(corpus.findings.iter().cloned());

    info!("Checking file names against leading comments");
    report.extend(check_names(&corpus.samples));
    report.extend(check_cwe_agreement(&corpus.samples));

    info!("Checking vuln/patch pairs");
    let (pairs, findings) = check_pairs(&corpus.samples);
    report.pairs = pairs;
    report.extend(findings);

    if config.stub_paths.is_empty() {
        info!("No stub headers configured, skipping stub checks");
    } else {
        let (headers, stubs) = load_stubs(config).await?;
        for header in &headers {
            report.extend(stub::lint(header));
        }

        info!("Analysing stub coverage of {} samples", corpus.len());
        let (coverage, findings) = check_coverage(&corpus.samples, &stubs, config);
        report.coverage = Some(coverage);
        report.extend(findings);
    }

    report.retain_min_severity(config.min_severity);
    info!(
        "Check complete: {} error(s), {} warning(s)",
        report.error_count(),
        report.warning_count()
    );
    Ok(report)
}

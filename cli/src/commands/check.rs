//! Check command implementation

use anyhow::Result;
use clap::Args;
use kcorpus_checker::output::write_json;
use kcorpus_checker::run_check;
use kcorpus_shared::types::report::Severity;
use std::path::PathBuf;
use tracing::debug;

use super::CommonArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Corpus root
    pub root: PathBuf,

    /// Stub header to check coverage against (repeatable; added to configured stubs)
    #[arg(short, long = "stub")]
    pub stubs: Vec<PathBuf>,

    /// Write the full report in JSON format
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Drop findings below this severity: info, warning or error
    #[arg(long)]
    pub min_severity: Option<Severity>,

    /// Also require stubs to declare every struct/union/enum tag
    #[arg(long)]
    pub include_tags: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(args: CheckArgs) -> Result<()> {
    let mut config = args.common.load_config()?.with_stubs(args.stubs);
    if let Some(min) = args.min_severity {
        config.min_severity = min;
    }
    config.include_tags |= args.include_tags;
    debug!("Effective configuration: {:?}", config);

    let report = run_check(&args.root, &config).await?;

    output::inventory(&report.inventory);

    let changed = report.pairs.iter().filter(|p| !p.is_unchanged()).count();
    println!("\n=== Pairs ===");
    println!("  {} complete pairs, {} with line changes", report.pairs.len(), changed);

    if let Some(coverage) = &report.coverage {
        println!("\n=== Stub coverage ===");
        println!(
            "  {}/{} identifiers provided ({:.1}%) across {} samples",
            coverage.covered,
            coverage.distinct_identifiers,
            coverage.coverage_pct(),
            coverage.samples_analyzed
        );
    }

    if !report.findings.is_empty() {
        println!("\n=== Findings ===");
        output::findings(&report.findings);
    }
    println!();
    output::summary(&report.summary);

    if let Some(path) = &args.json {
        write_json(&report, path)?;
        output::success(&format!("Report written to {}", path.display()));
    }

    if report.has_errors() {
        anyhow::bail!("{} error-level finding(s)", report.error_count());
    }
    Ok(())
}

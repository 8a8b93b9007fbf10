//! Coverage command implementation

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use kcorpus_checker::corpus::{scan, CoverageBuilder};
use kcorpus_checker::load_stubs;
use kcorpus_checker::output::write_json;
use kcorpus_shared::types::report::CoverageReport;
use std::path::PathBuf;
use tracing::debug;

use super::CommonArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct CoverageArgs {
    /// Corpus root
    pub root: PathBuf,

    /// Stub header (repeatable; added to configured stubs)
    #[arg(short, long = "stub")]
    pub stubs: Vec<PathBuf>,

    /// Write the coverage report in JSON format
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Number of unresolved identifiers to list
    #[arg(short, long, default_value = "25")]
    pub top: usize,

    /// Also require stubs to declare every struct/union/enum tag
    #[arg(long)]
    pub include_tags: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(args: CoverageArgs) -> Result<()> {
    let mut config = args.common.load_config()?.with_stubs(args.stubs);
    config.include_tags |= args.include_tags;
    debug!("Effective configuration: {:?}", config);
    if config.stub_paths.is_empty() {
        anyhow::bail!("No stub headers given (use --stub or stub_paths in kcorpus.toml)");
    }
    config.validate().context("Invalid checker configuration")?;

    let corpus = scan(&args.root, &config)
        .await
        .with_context(|| format!("Failed to scan {}", args.root.display()))?;
    let (_, stubs) = load_stubs(&config).await?;

    let progress = ProgressBar::new(corpus.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );

    let mut builder = CoverageBuilder::new(&stubs, &config);
    for sample in &corpus.samples {
        progress.set_message(sample.name.cve.to_string());
        builder.add(sample);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let (report, _) = builder.finish();
    print_coverage(&report, args.top);

    if let Some(path) = &args.json {
        write_json(&report, path)?;
        output::success(&format!("Coverage report written to {}", path.display()));
    }

    Ok(())
}

fn print_coverage(report: &CoverageReport, top: usize) {
    println!("=== Stub Coverage ===");
    for path in &report.stub_paths {
        println!("  Stub: {}", path.display());
    }
    println!(
        "  {} samples | {}/{} identifiers provided ({:.1}%)",
        report.samples_analyzed,
        report.covered,
        report.distinct_identifiers,
        report.coverage_pct()
    );

    if report.is_complete() {
        output::success("Every identifier used by the corpus is provided");
        return;
    }

    println!(
        "\n  {:>7} {:>7} {:<15} {:<32} FIRST SEEN",
        "SAMPLES", "USES", "KIND", "IDENTIFIER"
    );
    for ident in report.unresolved.iter().take(top) {
        println!(
            "  {:>7} {:>7} {:<15} {:<32} {}",
            ident.samples,
            ident.occurrences,
            ident.usage.label(),
            ident.name,
            ident.first_seen.display()
        );
    }
    if report.unresolved.len() > top {
        println!("  ... and {} more", report.unresolved.len() - top);
    }

    output::warning(&format!(
        "{} identifier(s) unresolved",
        report.unresolved.len()
    ));
}

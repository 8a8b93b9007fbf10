//! Stub header commands: lint, diff and suggest

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use kcorpus_checker::corpus::{check_coverage, scan};
use kcorpus_checker::load_stubs;
use kcorpus_checker::output::write_json;
use kcorpus_checker::stub::{lint, suggest, StubHeader};
use kcorpus_shared::types::diff::StubDiff;
use kcorpus_shared::types::report::{Severity, Summary};
use std::path::PathBuf;

use super::CommonArgs;
use crate::output;

#[derive(Subcommand, Debug)]
pub enum StubCommand {
    /// Check a stub header for conflicting, incomplete or missing declarations
    Lint(LintArgs),

    /// Compare the symbols declared by two stub headers
    Diff(DiffArgs),

    /// Generate declarations for identifiers the stubs do not provide
    Suggest(SuggestArgs),
}

impl StubCommand {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::Lint(args) => &args.common,
            Self::Diff(args) => &args.common,
            Self::Suggest(args) => &args.common,
        }
    }
}

#[derive(Args, Debug)]
pub struct LintArgs {
    /// Stub header to check
    pub header: PathBuf,

    /// Write findings in JSON format
    #[arg(long)]
    pub json: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Baseline stub header
    pub baseline: PathBuf,

    /// Comparison stub header
    pub comparison: PathBuf,

    /// Write the diff in JSON format
    #[arg(long)]
    pub json: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// Corpus root
    pub root: PathBuf,

    /// Stub header (repeatable; added to configured stubs)
    #[arg(short, long = "stub")]
    pub stubs: Vec<PathBuf>,

    /// Write the generated declarations here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(cmd: StubCommand) -> Result<()> {
    match cmd {
        StubCommand::Lint(args) => run_lint(args).await,
        StubCommand::Diff(args) => run_diff(args).await,
        StubCommand::Suggest(args) => run_suggest(args).await,
    }
}

async fn run_lint(args: LintArgs) -> Result<()> {
    let header = StubHeader::load(&args.header).await?;
    let findings = lint(&header);

    println!("=== {} ===", header.path.display());
    println!(
        "  {} symbols, {} tag declarations",
        header.symbols().len(),
        header.tags().len()
    );
    println!();
    output::findings(&findings);

    let summary = Summary::from_findings(&findings);
    output::summary(&summary);

    if let Some(path) = &args.json {
        write_json(&findings, path)?;
        output::success(&format!("Findings written to {}", path.display()));
    }

    if findings.iter().any(|f| f.severity == Severity::Error) {
        anyhow::bail!("{} error-level finding(s)", summary.errors);
    }
    Ok(())
}

async fn run_diff(args: DiffArgs) -> Result<()> {
    let baseline = StubHeader::load(&args.baseline).await?;
    let comparison = StubHeader::load(&args.comparison).await?;
    let diff = baseline.diff(&comparison);

    print_diff(&diff);

    if let Some(path) = &args.json {
        write_json(&diff, path)?;
        output::success(&format!("Diff written to {}", path.display()));
    }
    Ok(())
}

fn print_diff(diff: &StubDiff) {
    println!("=== Stub Diff ===");
    println!(
        "  Baseline: {} ({} symbols) | Comparison: {} ({} symbols)",
        diff.baseline.display(),
        diff.baseline_total,
        diff.comparison.display(),
        diff.comparison_total
    );

    if !diff.only_in_baseline.is_empty() {
        println!("\n  Only in baseline ({}):", diff.only_in_baseline.len());
        for sym in &diff.only_in_baseline {
            println!("    - {:<32} {:<20} line {}", sym.name, sym.kind.label(), sym.line);
        }
    }

    if !diff.only_in_comparison.is_empty() {
        println!("\n  Only in comparison ({}):", diff.only_in_comparison.len());
        for sym in &diff.only_in_comparison {
            println!("    + {:<32} {:<20} line {}", sym.name, sym.kind.label(), sym.line);
        }
    }

    if !diff.changed.is_empty() {
        println!("\n  Changed ({}):", diff.changed.len());
        for change in &diff.changed {
            println!("    ~ {}", change.name);
            println!("        {}: {}", change.baseline_kind, change.baseline_detail);
            println!("        {}: {}", change.comparison_kind, change.comparison_detail);
        }
    }

    println!();
    if diff.is_identical() {
        output::success("Headers declare the same symbols");
    } else if diff.is_superset() {
        output::success("Comparison declares every baseline symbol");
    } else {
        output::warning(&format!(
            "Comparison drops {} baseline symbol(s)",
            diff.only_in_baseline.len()
        ));
    }
}

async fn run_suggest(args: SuggestArgs) -> Result<()> {
    let config = args.common.load_config()?.with_stubs(args.stubs);
    if config.stub_paths.is_empty() {
        anyhow::bail!("No stub headers given (use --stub or stub_paths in kcorpus.toml)");
    }
    config.validate().context("Invalid checker configuration")?;

    let corpus = scan(&args.root, &config)
        .await
        .with_context(|| format!("Failed to scan {}", args.root.display()))?;
    let (_, stubs) = load_stubs(&config).await?;
    let (report, _) = check_coverage(&corpus.samples, &stubs, &config);

    let fragment = suggest(&report.unresolved);
    match &args.output {
        Some(path) => {
            std::fs::write(path, &fragment)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::success(&format!(
                "{} declaration(s) written to {}",
                report.unresolved.len(),
                path.display()
            ));
        }
        None => print!("{}", fragment),
    }
    Ok(())
}

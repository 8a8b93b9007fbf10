//! Scan command implementation

use anyhow::{Context, Result};
use clap::Args;
use kcorpus_checker::corpus::scan;
use kcorpus_checker::output::write_json;
use std::path::PathBuf;

use super::CommonArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Corpus root: a repository with the standard data/ layout, or a directory of samples
    pub root: PathBuf,

    /// Also write the inventory in JSON format
    #[arg(long)]
    pub json: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(args: ScanArgs) -> Result<()> {
    let config = args.common.load_config()?;

    let corpus = scan(&args.root, &config)
        .await
        .with_context(|| format!("Failed to scan {}", args.root.display()))?;
    let inventory = corpus.inventory();

    output::inventory(&inventory);
    if !corpus.findings.is_empty() {
        println!();
        output::findings(&corpus.findings);
    }

    if let Some(path) = &args.json {
        write_json(&inventory, path)?;
        output::success(&format!("Inventory written to {}", path.display()));
    }

    Ok(())
}

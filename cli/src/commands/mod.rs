//! Subcommand implementations

pub mod check;
pub mod coverage;
pub mod scan;
pub mod stub;

use anyhow::{Context, Result};
use clap::Args;
use kcorpus_checker::CheckerConfig;
use std::path::PathBuf;

/// Flags every subcommand accepts
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (defaults to ./kcorpus.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CommonArgs {
    pub fn load_config(&self) -> Result<CheckerConfig> {
        CheckerConfig::load(self.config.as_deref()).context("Failed to load configuration")
    }
}

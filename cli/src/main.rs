//! CLI for kcorpus
//!
//! Checks a corpus of Linux kernel CVE samples and its stub headers:
//! - scan: inventory the samples
//! - check: naming, pair and stub checks in one run
//! - coverage: identifiers the stubs fail to provide
//! - stub: lint, diff and extend stub headers

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "kcorpus")]
#[command(about = "kcorpus - Linux kernel CVE corpus and stub header checker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inventory the samples of a corpus
    Scan(commands::scan::ScanArgs),

    /// Run every corpus and stub check
    Check(commands::check::CheckArgs),

    /// Report identifiers the stub headers do not provide
    Coverage(commands::coverage::CoverageArgs),

    /// Lint, compare and extend stub headers
    #[command(subcommand)]
    Stub(commands::stub::StubCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            init_tracing(args.common.verbose);
            commands::scan::run(args).await
        }
        Commands::Check(args) => {
            init_tracing(args.common.verbose);
            commands::check::run(args).await
        }
        Commands::Coverage(args) => {
            init_tracing(args.common.verbose);
            commands::coverage::run(args).await
        }
        Commands::Stub(cmd) => {
            init_tracing(cmd.common().verbose);
            commands::stub::run(cmd).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

//! Token registry command line.
//!
//! ```bash
//! # Build build/<impl>.all.json, version taken from package.json
//! tokenlist build
//!
//! # Build with an explicit version
//! tokenlist build 1.4.0
//!
//! # Verify the built lists on chain, correcting and pruning them
//! tokenlist check
//!
//! # Validate the curated tokens/<code>/tokens.json files
//! tokenlist lint
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tokenlist::chain::HttpAdapterFactory;
use tokenlist::error::Error;
use tokenlist::market::CoinGeckoClient;
use tokenlist::sources::HttpListFetcher;
use tokenlist::{build_registry, check_registry, sources, Settings};

#[derive(Parser, Debug)]
#[command(name = "tokenlist")]
#[command(about = "Build and verify multi-chain token lists", long_about = None)]
struct Cli {
    /// JSON settings file; defaults apply to every field it omits
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge, rank and write the registry files
    Build {
        /// major.minor.patch; read from package.json when omitted
        version: Option<String>,
    },
    /// Verify registry files against their chains
    Check,
    /// Validate the curated token lists
    Lint,
}

async fn run(cli: Cli) -> Result<(), Error> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Build { version } => {
            let market = CoinGeckoClient::new(settings.market_batching(), settings.rpc_timeout())?;
            let fetcher = HttpListFetcher::new(settings.rpc_timeout())?;
            let written =
                build_registry(&settings, version.as_deref(), &market, &fetcher).await?;
            tracing::info!(files = written.len(), "build finished");
        }
        Command::Check => {
            let factory = HttpAdapterFactory::new(settings.rpc_timeout());
            let reports = check_registry(&settings, Box::new(factory)).await?;
            let removed: usize = reports.iter().map(|r| r.removed).sum();
            let corrected: usize = reports.iter().map(|r| r.corrected).sum();
            tracing::info!(files = reports.len(), corrected, removed, "check finished");
        }
        Command::Lint => {
            let checked = sources::lint_local_tokens(&settings.tokens_dir)?;
            tracing::info!(checked, "curated lists are well-formed");
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "tokenlist failed");
            ExitCode::FAILURE
        }
    }
}

//! insightgate - Rate-limited, cached runs of insight producers
//!
//! Runs an external producer at most once per interval, caching its insights in
//! a JSON lockfile and serving the cached copy in between or when it fails.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insightgate::cli::{Cli, Commands};
use insightgate::commands;
use insightgate::config::Config;

/// Sends logs to stderr so stdout only carries insights.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "insightgate=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load environment
    dotenvy::dotenv().ok();
    init_tracing();

    let config = cli.apply_to(Config::from_env_with(cli.cache_dir.clone())?);
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Commands::Run(args) => {
            let outcome = commands::run(args, &config, &mut stdout).await?;
            Ok(ExitCode::from(commands::exit_code(&outcome, args.strict)))
        }
        Commands::Status(args) => {
            commands::status(args, &config, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show(args) => {
            commands::show(args, &config, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

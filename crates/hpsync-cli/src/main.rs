//! hpsync - release hash sync for the hp Scoop bucket

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use hpsync_cli::{Cli, Commands, cmd};
use hpsync_core::sync::RunMode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let json = cli.json;
    let config = || cmd::load_config(&cli.config);

    match cli.command {
        Commands::Digest { files } => cmd::digest::digest(&files).map(|()| 0),
        Commands::Version => cmd::version::version(&config()?, json).map(|()| 0),
        Commands::Hash => cmd::sync::hash(config()?, json).await,
        Commands::Apply => cmd::sync::apply(config()?, json).await,
        Commands::Sync { fresh, resume } => {
            let mode = if fresh {
                RunMode::Fresh
            } else if resume {
                RunMode::Resume
            } else {
                RunMode::Auto
            };
            cmd::sync::sync(config()?, mode, json).await
        }
        Commands::Notes { tag } => cmd::notes::notes(&config()?, tag).await.map(|()| 0),
        Commands::Publish(args) => cmd::publish::publish(&config()?, args, json)
            .await
            .map(|()| 0),
    }
}

//! Operational CLI for the viral re-cut reconstruction pipeline.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, SnapshotCommand};
use error::Result;
use reconstruct_core::ReconstructConfig;

const APP_NAME: &str = "reconstruct";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    init_logging();
    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = ReconstructConfig::from_env();
    if let Some(path) = &cli.config {
        config = config.overlay_file(path)?;
    }

    match cli.command {
        Command::Reconstruct { srt, lang, style, snapshot } => {
            commands::reconstruct::run(&config, &srt, lang, style, snapshot).await
        }
        Command::Verify { path } => commands::verify::run(&path),
        Command::Snapshot(SnapshotCommand::List { kind, limit }) => {
            commands::snapshot::list(&config, kind.as_deref(), limit)
        }
        Command::Snapshot(SnapshotCommand::Restore { id }) => commands::snapshot::restore(&config, &id),
        Command::Snapshot(SnapshotCommand::Diff { id1, id2 }) => commands::snapshot::diff(&config, &id1, &id2),
        Command::Audit { secure } => commands::audit::run(&config, secure),
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "reconstruct=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

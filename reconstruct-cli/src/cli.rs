//! Argument parsing (`clap` derive), mirroring the subcommands of spec §6.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "reconstruct", version, about = "Viral re-cut reconstruction pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Optional TOML config overlay (see ReconstructConfig::overlay_file).
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconstruct an SRT file into a scored, aligned cut plan.
    Reconstruct {
        /// Path to the source .srt file.
        srt: String,

        #[arg(long, value_enum, default_value_t = LanguageArg::Auto)]
        lang: LanguageArg,

        /// Presentational only: recorded on the rewrite request, does not
        /// change C3's scoring thresholds (spec §1 non-goals).
        #[arg(long, value_enum, default_value_t = StyleArg::Viral)]
        style: StyleArg,

        /// Write the resulting cut plan as a snapshot instead of just
        /// printing it.
        #[arg(long)]
        snapshot: bool,
    },

    /// Recompute hashes under a snapshot directory and report tampered/missing blobs.
    Verify {
        path: String,
    },

    /// Inspect the version tree.
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Directory-wide tamper audit over the configured snapshot store.
    Audit {
        /// Also verify the HMAC signature (requires SECRET_KEY), not just
        /// the content hash.
        #[arg(long)]
        secure: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    List {
        #[arg(long)]
        kind: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Restore {
        id: String,
    },
    Diff {
        id1: String,
        id2: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LanguageArg {
    Auto,
    Zh,
    En,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StyleArg {
    Viral,
    Formal,
}

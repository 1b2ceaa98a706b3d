//! Runtime configuration (spec §6): environment variables with defaults,
//! plus an optional TOML file for knobs that don't have a good env-var
//! shape (cultural rule tables, per-validator overrides).

use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

pub const DEFAULT_MAX_RESIDENT_MEMORY_MIB: u64 = 3800;
pub const DEFAULT_SNAPSHOT_DIR: &str = "./data/snapshots";
pub const DEFAULT_ANCHOR_DIR: &str = "./data/version_metadata";

/// Environment-driven knobs, read once at startup.
#[derive(Debug, Clone)]
pub struct ReconstructConfig {
    pub max_resident_memory_mib: u64,
    pub job_workers: usize,
    pub snapshot_dir: String,
    pub anchor_dir: String,
    pub secret_key: Option<Vec<u8>>,
}

impl ReconstructConfig {
    pub fn from_env() -> Self {
        Self {
            max_resident_memory_mib: env_u64("MAX_RESIDENT_MEMORY_MIB", DEFAULT_MAX_RESIDENT_MEMORY_MIB),
            job_workers: env_job_workers(),
            snapshot_dir: std::env::var("SNAPSHOT_DIR").unwrap_or_else(|_| DEFAULT_SNAPSHOT_DIR.to_string()),
            anchor_dir: std::env::var("ANCHOR_DIR").unwrap_or_else(|_| DEFAULT_ANCHOR_DIR.to_string()),
            secret_key: std::env::var("SECRET_KEY").ok().map(|s| s.into_bytes()),
        }
    }

    /// Overlays a TOML file's fields on top of an env-derived config. Only
    /// fields present in the file are applied; absent ones keep the
    /// env/default value.
    pub fn overlay_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(crate::error::VersioningError::Io)?;
        let file: ConfigFile = toml::from_str(&text).map_err(|e| crate::error::ReconstructError::Internal(e.to_string()))?;

        if let Some(v) = file.max_resident_memory_mib {
            self.max_resident_memory_mib = v;
        }
        if let Some(v) = file.job_workers {
            self.job_workers = v;
        }
        if let Some(v) = file.snapshot_dir {
            self.snapshot_dir = v;
        }
        if let Some(v) = file.anchor_dir {
            self.anchor_dir = v;
        }
        Ok(self)
    }
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shape of the optional TOML config file. Every field is optional so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    max_resident_memory_mib: Option<u64>,
    job_workers: Option<usize>,
    snapshot_dir: Option<String>,
    anchor_dir: Option<String>,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_job_workers() -> usize {
    std::env::var("JOB_WORKERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| (std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2) / 2).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_env() {
        std::env::remove_var("MAX_RESIDENT_MEMORY_MIB");
        std::env::remove_var("JOB_WORKERS");
        std::env::remove_var("SNAPSHOT_DIR");
        std::env::remove_var("ANCHOR_DIR");
        std::env::remove_var("SECRET_KEY");

        let cfg = ReconstructConfig::from_env();
        assert_eq!(cfg.max_resident_memory_mib, DEFAULT_MAX_RESIDENT_MEMORY_MIB);
        assert_eq!(cfg.snapshot_dir, DEFAULT_SNAPSHOT_DIR);
        assert!(cfg.job_workers >= 1);
        assert!(cfg.secret_key.is_none());
    }

    #[test]
    fn overlay_file_only_overrides_present_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "snapshot_dir = \"/tmp/custom\"\n").unwrap();

        let base = ReconstructConfig {
            max_resident_memory_mib: 1234,
            job_workers: 4,
            snapshot_dir: DEFAULT_SNAPSHOT_DIR.to_string(),
            anchor_dir: DEFAULT_ANCHOR_DIR.to_string(),
            secret_key: None,
        };
        let overlaid = base.overlay_file(&path).unwrap();
        assert_eq!(overlaid.snapshot_dir, "/tmp/custom");
        assert_eq!(overlaid.max_resident_memory_mib, 1234);
    }
}

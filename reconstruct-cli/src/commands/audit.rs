//! `audit [--secure]` — tamper audit over the configured snapshot store,
//! optionally also checking HMAC signatures.

use reconstruct_core::versioning::audit_directory;
use reconstruct_core::ReconstructConfig;

use crate::error::Result;

pub fn run(config: &ReconstructConfig, secure: bool) -> Result<i32> {
    let report = audit_directory(std::path::Path::new(&config.snapshot_dir), secure, config.secret_key.as_deref())?;

    println!("snapshot_dir: {}", config.snapshot_dir);
    println!("secure: {secure}");
    println!("verified: {}", report.verified);
    for id in &report.tampered {
        println!("TAMPERED  {id}");
    }
    for id in &report.missing {
        println!("MISSING   {id}");
    }
    for name in &report.unregistered {
        println!("UNKNOWN   {name}");
    }

    Ok(if report.is_clean() { 0 } else { 1 })
}

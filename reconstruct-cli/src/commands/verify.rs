//! `verify <path>` — recompute hashes under a snapshot directory and
//! report tampered/missing blobs. Exit 0 clean, 1 if any issue (spec §6).

use reconstruct_core::versioning::audit_directory;

use crate::error::Result;

pub fn run(path: &str) -> Result<i32> {
    let report = audit_directory(std::path::Path::new(path), false, None)?;

    println!("verified: {}", report.verified);
    for id in &report.tampered {
        println!("TAMPERED  {id}");
    }
    for id in &report.missing {
        println!("MISSING   {id} (referenced as a parent but absent)");
    }
    for name in &report.unregistered {
        println!("UNKNOWN   {name}");
    }

    Ok(if report.is_clean() { 0 } else { 1 })
}

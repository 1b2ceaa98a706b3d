//! `snapshot list|restore|diff` over the version tree (spec §6).

use reconstruct_core::versioning::VersionTree;
use reconstruct_core::ReconstructConfig;

use crate::error::{CliError, Result};

fn open_tree(config: &ReconstructConfig) -> Result<VersionTree> {
    Ok(VersionTree::open(&config.snapshot_dir, config.secret_key.clone())?)
}

pub fn list(config: &ReconstructConfig, kind: Option<&str>, limit: usize) -> Result<i32> {
    let tree = open_tree(config)?;
    let mut nodes = tree.all();
    nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if let Some(kind) = kind {
        nodes.retain(|n| n.kind == kind);
    }
    nodes.truncate(limit);

    println!("{:<36}  {:<10}  {:<12}  {:<24}  parent", "id", "kind", "operation", "created_at");
    for node in &nodes {
        println!(
            "{:<36}  {:<10}  {:<12}  {:<24}  {}",
            node.id,
            node.kind,
            node.operation,
            node.created_at.to_rfc3339(),
            node.parent_id.as_deref().unwrap_or("-"),
        );
    }
    Ok(0)
}

pub fn restore(config: &ReconstructConfig, id: &str) -> Result<i32> {
    let tree = open_tree(config)?;
    let content = tree.restore(id).map_err(|e| match e {
        reconstruct_core::ReconstructError::Versioning(_) => CliError::UnknownSnapshot(id.to_string()),
        other => CliError::Pipeline(other),
    })?;
    println!("{}", serde_json::to_string_pretty(&content).expect("Value always serializes"));
    Ok(0)
}

pub fn diff(config: &ReconstructConfig, id1: &str, id2: &str) -> Result<i32> {
    let tree = open_tree(config)?;
    let result = tree.compare(id1, id2)?;
    let json = serde_json::json!({
        "common_ancestor": result.common_ancestor,
        "diff_summary": result.diff_summary,
    });
    println!("{}", serde_json::to_string_pretty(&json).expect("Value always serializes"));
    Ok(0)
}

//! The content-addressed version tree (C6, spec §4.6): `Take`, `Restore`,
//! `Branch`, `History`, `Compare`, `Delete` over an arena of
//! [`VersionNode`]s indexed by id, guarded by a single mutex for mutating
//! operations (spec §5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VersioningError};

use super::tamper;

/// On-disk shape of one node file under `SNAPSHOT_DIR`: the node plus its
/// HMAC signature, since the signature map is otherwise process-local.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PersistedNode {
    pub(crate) node: VersionNode,
    pub(crate) signature: Option<String>,
}

fn persist_node(dir: &Path, node: &VersionNode, signature: Option<&str>) -> Result<()> {
    let persisted = PersistedNode {
        node: node.clone(),
        signature: signature.map(str::to_string),
    };
    let text = serde_json::to_string_pretty(&persisted).map_err(VersioningError::Serde)?;
    let tmp = dir.join(format!("{}.json.tmp", node.id));
    std::fs::write(&tmp, text).map_err(VersioningError::Io)?;
    std::fs::rename(&tmp, dir.join(format!("{}.json", node.id))).map_err(VersioningError::Io)?;
    Ok(())
}

fn persist_current(dir: &Path, current: Option<&str>) -> Result<()> {
    let tmp = dir.join("_current.tmp");
    std::fs::write(&tmp, current.unwrap_or("")).map_err(VersioningError::Io)?;
    std::fs::rename(&tmp, dir.join("_current")).map_err(VersioningError::Io)?;
    Ok(())
}

fn unpersist_node(dir: &Path, id: &str) -> Result<()> {
    let path = dir.join(format!("{id}.json"));
    if path.exists() {
        std::fs::remove_file(&path).map_err(VersioningError::Io)?;
    }
    Ok(())
}

/// Access-control seam for destructive operations (SPEC_FULL supplement:
/// the original engine's versioning layer has no notion of callers, but a
/// multi-tenant deployment of this pipeline needs one before `Delete` is
/// exposed over any shared surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub kind: String,
    pub operation: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompareResult {
    pub common_ancestor: Option<String>,
    pub diff_summary: Vec<String>,
}

struct Inner {
    nodes: HashMap<String, VersionNode>,
    children: HashMap<String, Vec<String>>,
    roots: Vec<String>,
    current: Option<String>,
    secret_key: Option<Vec<u8>>,
    signatures: HashMap<String, String>,
    snapshot_dir: Option<PathBuf>,
}

/// Thread-safe handle to the tree; cheap to clone (an `Arc` around a
/// single `RwLock`). Mutating operations take the write lock; readers
/// (`Restore`, `History`, `Compare`) take a read lease.
#[derive(Clone)]
pub struct VersionTree {
    inner: Arc<RwLock<Inner>>,
}

impl VersionTree {
    pub fn new(secret_key: Option<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                nodes: HashMap::new(),
                children: HashMap::new(),
                roots: Vec::new(),
                current: None,
                secret_key,
                signatures: HashMap::new(),
                snapshot_dir: None,
            })),
        }
    }

    /// Opens (creating if absent) a tree backed by `dir`: every `Take`
    /// persists a journaled node file (write temp, then rename) and the
    /// current cursor; construction replays whatever is already on disk
    /// (spec §5, "persistence uses a journaled write, then swap").
    pub fn open(dir: impl Into<PathBuf>, secret_key: Option<Vec<u8>>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(VersioningError::Io)?;

        let mut nodes = HashMap::new();
        let mut signatures = HashMap::new();
        for entry in std::fs::read_dir(&dir).map_err(VersioningError::Io)? {
            let entry = entry.map_err(VersioningError::Io)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(VersioningError::Io)?;
            let persisted: PersistedNode = serde_json::from_str(&text).map_err(VersioningError::Serde)?;
            if let Some(sig) = persisted.signature {
                signatures.insert(persisted.node.id.clone(), sig);
            }
            nodes.insert(persisted.node.id.clone(), persisted.node);
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut roots = Vec::new();
        for node in nodes.values() {
            match &node.parent_id {
                Some(p) => children.entry(p.clone()).or_default().push(node.id.clone()),
                None => roots.push(node.id.clone()),
            }
        }

        let current = std::fs::read_to_string(dir.join("_current"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        tracing::info!("version tree opened at {:?}: {} node(s) replayed", dir, nodes.len());

        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                nodes,
                children,
                roots,
                current,
                secret_key,
                signatures,
                snapshot_dir: Some(dir),
            })),
        })
    }

    /// Appends a new child node, updates the "current" cursor, and
    /// returns its id.
    pub fn take(
        &self,
        content: serde_json::Value,
        operation: impl Into<String>,
        kind: impl Into<String>,
        description: Option<String>,
        tags: Vec<String>,
        parent: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        let mut inner = self.inner.write();
        if let Some(parent_id) = parent {
            if !inner.nodes.contains_key(parent_id) {
                return Err(VersioningError::NodeNotFound(parent_id.to_string()).into());
            }
        }

        let id = Uuid::new_v4().to_string();
        let kind_label = kind.into();
        let content_hash = tamper::content_hash(&content);
        let signature = tamper::sign(&content, inner.secret_key.as_deref());
        if let Some(sig) = &signature {
            inner.signatures.insert(id.clone(), sig.clone());
        }

        let node = VersionNode {
            id: id.clone(),
            parent_id: parent.map(str::to_string),
            kind: kind_label.clone(),
            operation: operation.into(),
            description,
            tags,
            created_at,
            content_hash,
            content,
        };

        if let Some(dir) = &inner.snapshot_dir {
            persist_node(dir, &node, signature.as_deref())?;
            persist_current(dir, Some(&id))?;
        }

        match &node.parent_id {
            Some(parent_id) => inner.children.entry(parent_id.clone()).or_default().push(id.clone()),
            None => inner.roots.push(id.clone()),
        }
        inner.nodes.insert(id.clone(), node);
        inner.current = Some(id.clone());
        tracing::info!("snapshot taken: {} ({})", id, kind_label);
        Ok(id)
    }

    pub fn restore(&self, id: &str) -> Result<serde_json::Value> {
        let mut inner = self.inner.write();
        let content = inner
            .nodes
            .get(id)
            .map(|n| n.content.clone())
            .ok_or_else(|| VersioningError::NodeNotFound(id.to_string()))?;
        if let Some(dir) = inner.snapshot_dir.clone() {
            persist_current(&dir, Some(id))?;
        }
        inner.current = Some(id.to_string());
        Ok(content)
    }

    /// Convenience wrapper for `take` with an explicit parent.
    pub fn branch(
        &self,
        from_id: &str,
        content: serde_json::Value,
        operation: impl Into<String>,
        kind: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        self.take(content, operation, kind, None, Vec::new(), Some(from_id), created_at)
    }

    /// Root -> node path. `id = None` uses the current cursor.
    pub fn history(&self, id: Option<&str>) -> Result<Vec<VersionNode>> {
        let inner = self.inner.read();
        let start = id.map(str::to_string).or_else(|| inner.current.clone());
        let Some(mut cursor) = start else { return Ok(Vec::new()) };

        let mut path = Vec::new();
        loop {
            let node = inner
                .nodes
                .get(&cursor)
                .cloned()
                .ok_or_else(|| VersioningError::NodeNotFound(cursor.clone()))?;
            let parent = node.parent_id.clone();
            path.push(node);
            match parent {
                Some(p) => cursor = p,
                None => break,
            }
        }
        path.reverse();
        Ok(path)
    }

    fn ancestors(inner: &Inner, id: &str) -> Vec<String> {
        let mut chain = vec![id.to_string()];
        let mut cursor = id.to_string();
        while let Some(node) = inner.nodes.get(&cursor) {
            match &node.parent_id {
                Some(p) => {
                    chain.push(p.clone());
                    cursor = p.clone();
                }
                None => break,
            }
        }
        chain
    }

    pub fn compare(&self, id1: &str, id2: &str) -> Result<CompareResult> {
        let inner = self.inner.read();
        if !inner.nodes.contains_key(id1) {
            return Err(VersioningError::NodeNotFound(id1.to_string()).into());
        }
        if !inner.nodes.contains_key(id2) {
            return Err(VersioningError::NodeNotFound(id2.to_string()).into());
        }

        let chain1 = Self::ancestors(&inner, id1);
        let chain2: std::collections::HashSet<String> = Self::ancestors(&inner, id2).into_iter().collect();
        let common_ancestor = chain1.into_iter().find(|a| chain2.contains(a));

        let n1 = &inner.nodes[id1];
        let n2 = &inner.nodes[id2];
        let mut diff_summary = Vec::new();
        if n1.kind != n2.kind {
            diff_summary.push(format!("kind: {} -> {}", n1.kind, n2.kind));
        }
        if n1.operation != n2.operation {
            diff_summary.push(format!("operation: {} -> {}", n1.operation, n2.operation));
        }
        if n1.content_hash != n2.content_hash {
            diff_summary.push("content differs".to_string());
        }
        if n1.tags != n2.tags {
            diff_summary.push(format!("tags: {:?} -> {:?}", n1.tags, n2.tags));
        }

        Ok(CompareResult { common_ancestor, diff_summary })
    }

    /// Leaf-only unless `recursive`; never the current cursor.
    pub fn delete(&self, id: &str, recursive: bool, permission: Permission) -> Result<()> {
        if permission < Permission::ReadWrite {
            return Err(VersioningError::PermissionDenied { id: id.to_string(), held: permission }.into());
        }

        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(id) {
            return Err(VersioningError::NodeNotFound(id.to_string()).into());
        }
        if inner.current.as_deref() == Some(id) {
            return Err(VersioningError::IsCurrentCursor(id.to_string()).into());
        }

        let children = inner.children.get(id).cloned().unwrap_or_default();
        if !children.is_empty() && !recursive {
            return Err(VersioningError::NotALeaf(id.to_string()).into());
        }

        let mut to_delete = vec![id.to_string()];
        let mut frontier = children;
        while let Some(child) = frontier.pop() {
            if let Some(grandchildren) = inner.children.get(&child).cloned() {
                frontier.extend(grandchildren);
            }
            to_delete.push(child);
        }

        for node_id in &to_delete {
            if inner.current.as_deref() == Some(node_id.as_str()) {
                return Err(VersioningError::IsCurrentCursor(node_id.clone()).into());
            }
        }

        let dir = inner.snapshot_dir.clone();
        for node_id in &to_delete {
            if let Some(node) = inner.nodes.remove(node_id) {
                if let Some(parent_id) = &node.parent_id {
                    if let Some(siblings) = inner.children.get_mut(parent_id) {
                        siblings.retain(|s| s != node_id);
                    }
                }
            }
            inner.children.remove(node_id);
            inner.signatures.remove(node_id);
            inner.roots.retain(|r| r != node_id);
            if let Some(dir) = &dir {
                unpersist_node(dir, node_id)?;
            }
        }
        tracing::info!("deleted {} snapshot(s) rooted at {}", to_delete.len(), id);
        Ok(())
    }

    pub fn current(&self) -> Option<String> {
        self.inner.read().current.clone()
    }

    pub fn node(&self, id: &str) -> Option<VersionNode> {
        self.inner.read().nodes.get(id).cloned()
    }

    /// All nodes, in no particular order (callers sort/filter as needed).
    pub fn all(&self) -> Vec<VersionNode> {
        self.inner.read().nodes.values().cloned().collect()
    }

    pub fn leaves(&self) -> Vec<VersionNode> {
        let inner = self.inner.read();
        inner
            .nodes
            .values()
            .filter(|n| inner.children.get(&n.id).map(|c| c.is_empty()).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Recomputes and checks a node's hash and (if a secret key is
    /// configured) signature, without mutating state.
    pub fn verify_integrity(&self, id: &str) -> Result<()> {
        let inner = self.inner.read();
        let node = inner.nodes.get(id).ok_or_else(|| VersioningError::NodeNotFound(id.to_string()))?;
        let actual = tamper::content_hash(&node.content);
        if actual != node.content_hash {
            return Err(VersioningError::HashMismatch {
                id: id.to_string(),
                expected: node.content_hash.clone(),
                actual,
            }
            .into());
        }
        if let Some(key) = &inner.secret_key {
            if let Some(expected_sig) = inner.signatures.get(id) {
                if !tamper::verify_signature(&node.content, expected_sig, key) {
                    return Err(VersioningError::SignatureMismatch(id.to_string()).into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn take_then_restore_round_trips_content() {
        let tree = VersionTree::new(None);
        let id = tree.take(json!({"text": "v1"}), "reconstruct", "draft", None, vec![], None, now()).unwrap();
        let restored = tree.restore(&id).unwrap();
        assert_eq!(restored, json!({"text": "v1"}));
    }

    #[test]
    fn delete_rejects_non_leaf_without_recursive() {
        let tree = VersionTree::new(None);
        let root = tree.take(json!({"text": "root"}), "op", "draft", None, vec![], None, now()).unwrap();
        let _child = tree.branch(&root, json!({"text": "child"}), "op", "draft", now()).unwrap();
        let err = tree.delete(&root, false, Permission::Admin).unwrap_err();
        assert!(matches!(err, crate::error::ReconstructError::Versioning(_)));
    }

    #[test]
    fn delete_rejects_read_only_permission() {
        let tree = VersionTree::new(None);
        let root = tree.take(json!({"text": "root"}), "op", "draft", None, vec![], None, now()).unwrap();
        let _child = tree.branch(&root, json!({"text": "child"}), "op", "draft", now()).unwrap();
        let err = tree.delete(&root, true, Permission::ReadOnly).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReconstructError::Versioning(crate::error::VersioningError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn delete_rejects_current_cursor() {
        let tree = VersionTree::new(None);
        let root = tree.take(json!({"text": "root"}), "op", "draft", None, vec![], None, now()).unwrap();
        let err = tree.delete(&root, false, Permission::Admin).unwrap_err();
        assert!(matches!(err, crate::error::ReconstructError::Versioning(_)));
    }

    #[test]
    fn compare_finds_common_ancestor() {
        let tree = VersionTree::new(None);
        let root = tree.take(json!({"text": "root"}), "op", "draft", None, vec![], None, now()).unwrap();
        let a = tree.branch(&root, json!({"text": "a"}), "op", "draft", now()).unwrap();
        let b = tree.branch(&root, json!({"text": "b"}), "op", "draft", now()).unwrap();
        let result = tree.compare(&a, &b).unwrap();
        assert_eq!(result.common_ancestor, Some(root));
        assert!(!result.diff_summary.is_empty());
    }

    #[test]
    fn verify_integrity_detects_tampering() {
        let tree = VersionTree::new(Some(b"secret".to_vec()));
        let id = tree.take(json!({"text": "original"}), "op", "draft", None, vec![], None, now()).unwrap();
        tree.verify_integrity(&id).unwrap();

        // simulate tampering by mutating the stored node directly
        {
            let mut inner = tree.inner.write();
            if let Some(node) = inner.nodes.get_mut(&id) {
                node.content = json!({"text": "tampered"});
            }
        }
        assert!(tree.verify_integrity(&id).is_err());
    }

    #[test]
    fn open_replays_persisted_nodes_and_cursor() {
        let dir = tempfile::tempdir().unwrap();

        let id = {
            let tree = VersionTree::open(dir.path(), None).unwrap();
            let root = tree.take(json!({"text": "root"}), "op", "draft", None, vec![], None, now()).unwrap();
            tree.branch(&root, json!({"text": "child"}), "op", "draft", now()).unwrap()
        };

        let reopened = VersionTree::open(dir.path(), None).unwrap();
        assert_eq!(reopened.current(), Some(id.clone()));
        assert_eq!(reopened.restore(&id).unwrap(), json!({"text": "child"}));
        assert_eq!(reopened.history(Some(&id)).unwrap().len(), 2);
    }
}

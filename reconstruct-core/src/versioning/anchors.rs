//! Metadata anchors (spec §4.6): out-of-tree records pinned to a
//! snapshot id, queryable by kind, fingerprint prefix, or ancestry. The
//! anchor store is a separate persistence namespace from the version
//! tree and must stay consistent with it; orphans are surfaced, never
//! silently deleted.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, VersioningError};

use super::tree::VersionTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    Milestone,
    Reference,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataAnchor {
    pub id: String,
    pub snapshot_id: String,
    pub kind: AnchorKind,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AnchorStore {
    anchors: Arc<RwLock<Vec<MetadataAnchor>>>,
    anchor_dir: Option<PathBuf>,
}

fn persist_all(dir: &Path, anchors: &[MetadataAnchor]) -> Result<()> {
    let text = serde_json::to_string_pretty(anchors).map_err(VersioningError::Serde)?;
    let tmp = dir.join("anchors.json.tmp");
    std::fs::write(&tmp, text).map_err(VersioningError::Io)?;
    std::fs::rename(&tmp, dir.join("anchors.json")).map_err(VersioningError::Io)?;
    Ok(())
}

impl AnchorStore {
    pub fn new() -> Self {
        Self {
            anchors: Arc::new(RwLock::new(Vec::new())),
            anchor_dir: None,
        }
    }

    /// Opens (creating if absent) an anchor store backed by a single
    /// `anchors.json` under `dir`, matching the tree's journaled
    /// write-then-swap persistence style.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(VersioningError::Io)?;
        let path = dir.join("anchors.json");
        let anchors = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(VersioningError::Io)?;
            serde_json::from_str(&text).map_err(VersioningError::Serde)?
        } else {
            Vec::new()
        };
        Ok(Self {
            anchors: Arc::new(RwLock::new(anchors)),
            anchor_dir: Some(dir),
        })
    }

    pub fn register(
        &self,
        snapshot_id: impl Into<String>,
        kind: AnchorKind,
        note: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut anchors = self.anchors.write();
        anchors.push(MetadataAnchor {
            id: id.clone(),
            snapshot_id: snapshot_id.into(),
            kind,
            note,
            created_at,
        });
        if let Some(dir) = &self.anchor_dir {
            persist_all(dir, &anchors)?;
        }
        Ok(id)
    }

    pub fn by_kind(&self, kind: AnchorKind) -> Vec<MetadataAnchor> {
        self.anchors.read().iter().filter(|a| a.kind == kind).cloned().collect()
    }

    pub fn by_fingerprint_prefix(&self, tree: &VersionTree, prefix: &str) -> Vec<MetadataAnchor> {
        self.anchors
            .read()
            .iter()
            .filter(|a| {
                tree.node(&a.snapshot_id)
                    .map(|n| n.content_hash.starts_with(prefix))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Anchors whose snapshot is `snapshot_id` or any of its ancestors.
    pub fn by_ancestry(&self, tree: &VersionTree, snapshot_id: &str) -> Vec<MetadataAnchor> {
        let Ok(path) = tree.history(Some(snapshot_id)) else { return Vec::new() };
        let ids: std::collections::HashSet<&str> = path.iter().map(|n| n.id.as_str()).collect();
        self.anchors
            .read()
            .iter()
            .filter(|a| ids.contains(a.snapshot_id.as_str()))
            .cloned()
            .collect()
    }

    /// Anchors whose `snapshot_id` no longer exists in `tree`. Surfaced,
    /// not auto-removed (spec §4.6).
    pub fn consistency_check(&self, tree: &VersionTree) -> Vec<MetadataAnchor> {
        self.anchors
            .read()
            .iter()
            .filter(|a| tree.node(&a.snapshot_id).is_none())
            .cloned()
            .collect()
    }
}

impl Default for AnchorStore {
    fn default() -> Self {
        Self::new()
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
    fn orphan_anchor_is_surfaced_not_removed() {
        let tree = VersionTree::new(None);
        let store = AnchorStore::new();
        let anchor_id = store.register("missing-snapshot", AnchorKind::Milestone, None, now()).unwrap();

        let orphans = store.consistency_check(&tree);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, anchor_id);
        // still present after the check
        assert_eq!(store.by_kind(AnchorKind::Milestone).len(), 1);
    }

    #[test]
    fn by_kind_filters_correctly() {
        let store = AnchorStore::new();
        store.register("a", AnchorKind::Milestone, None, now()).unwrap();
        store.register("b", AnchorKind::Critical, None, now()).unwrap();
        assert_eq!(store.by_kind(AnchorKind::Milestone).len(), 1);
        assert_eq!(store.by_kind(AnchorKind::Critical).len(), 1);
    }

    #[test]
    fn by_ancestry_includes_parent_anchors() {
        let tree = VersionTree::new(None);
        let root = tree.take(json!({"text": "root"}), "op", "draft", None, vec![], None, now()).unwrap();
        let child = tree.branch(&root, json!({"text": "child"}), "op", "draft", now()).unwrap();

        let store = AnchorStore::new();
        store.register(&root, AnchorKind::Milestone, None, now()).unwrap();

        let found = store.by_ancestry(&tree, &child);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn open_replays_persisted_anchors() {
        let dir = tempfile::tempdir().unwrap();
        let anchor_id = {
            let store = AnchorStore::open(dir.path()).unwrap();
            store.register("snap-1", AnchorKind::Reference, Some("note".into()), now()).unwrap()
        };

        let reopened = AnchorStore::open(dir.path()).unwrap();
        let found = reopened.by_kind(AnchorKind::Reference);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, anchor_id);
    }
}

//! Versioning & Snapshot Core (C6, spec §4.6): a content-addressed tree,
//! a diversity gate, tamper detection and out-of-tree metadata anchors.

pub mod anchors;
pub mod audit;
pub mod diversity;
pub mod tamper;
pub mod tree;

pub use anchors::{AnchorKind, AnchorStore, MetadataAnchor};
pub use audit::{audit_directory, AuditReport};
pub use diversity::{DiversityVerdict, DEFAULT_RECENT_K, DEFAULT_THRESHOLD};
pub use tree::{CompareResult, Permission, VersionNode, VersionTree};

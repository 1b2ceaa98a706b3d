//! Error taxonomy for the reconstruction pipeline.
//!
//! Mirrors spec §7: input / resource / validation / integrity / internal
//! errors, each surfaced with enough structure for the CLI to pick an
//! exit code without string-matching messages.

use thiserror::Error;

/// Errors raised while parsing subtitle input (C1).
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed timestamp at block {block}: {text}")]
    MalformedTimestamp { block: usize, text: String },

    #[error("segment end ({end}ms) <= start ({start}ms) at block {block}")]
    NonPositiveDuration { block: usize, start: i64, end: i64 },

    #[error("input bytes could not be decoded as UTF-8 or UTF-16: {0}")]
    UndecodableEncoding(String),
}

/// Errors raised by the language router / memory governor (C2).
#[derive(Error, Debug)]
pub enum GovernorError {
    #[error("insufficient resident memory to load backend for {lang:?} (needs {needed_mib} MiB, budget {budget_mib} MiB)")]
    InsufficientMemory {
        lang: crate::model::Language,
        needed_mib: u64,
        budget_mib: u64,
    },

    #[error("backend load failed for {lang:?}: {reason}")]
    BackendLoadFailed {
        lang: crate::model::Language,
        reason: String,
    },

    #[error("acquire cancelled")]
    Cancelled,
}

/// Errors raised by the alignment & splicing planner (C4).
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("no source interval could be recovered for rewritten segment {0}")]
    UnresolvedProvenance(usize),

    #[error("mean alignment error {mean_error_ms}ms exceeds tolerance even after text-similarity fallback")]
    AlignmentFailed { mean_error_ms: f64 },

    #[error("planner produced overlapping output intervals (invariant violation)")]
    OverlappingOutput,
}

/// Errors raised by the versioning / snapshot core (C6).
#[derive(Error, Debug)]
pub enum VersioningError {
    #[error("version node not found: {0}")]
    NodeNotFound(String),

    #[error("cannot delete a non-leaf node without recursive=true: {0}")]
    NotALeaf(String),

    #[error("cannot delete the current cursor without switching first: {0}")]
    IsCurrentCursor(String),

    #[error("content hash mismatch for {id}: expected {expected}, computed {actual}")]
    HashMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("HMAC signature verification failed for {0}")]
    SignatureMismatch(String),

    #[error("anchor references missing node {0}")]
    OrphanAnchor(String),

    #[error("permission denied deleting {id}: requires ReadWrite, has {held:?}")]
    PermissionDenied { id: String, held: crate::versioning::Permission },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type returned by the coordinator and all public APIs.
#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("input error: {0}")]
    Input(#[from] ParseError),

    #[error("resource error: {0}")]
    Resource(#[from] GovernorError),

    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("versioning error: {0}")]
    Versioning(#[from] VersioningError),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("plan rejected: {0} critical validation issue(s)")]
    ValidationRejected(usize),

    #[error("job cancelled")]
    Cancelled,
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReconstructError>;

impl ReconstructError {
    /// Whether this error is retriable per spec §7 (only resource-exhaustion
    /// memory errors are).
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ReconstructError::Resource(GovernorError::InsufficientMemory { .. })
        )
    }

    /// CLI exit code mapping per spec §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconstructError::Input(_) => 2,
            ReconstructError::Resource(_) => 3,
            ReconstructError::Planner(_) | ReconstructError::Versioning(_) => 4,
            ReconstructError::Internal(_) => 4,
            ReconstructError::ValidationRejected(_) => 1,
            ReconstructError::Cancelled => 4,
        }
    }
}

//! # reconstruct-core
//!
//! The reconstruction pipeline for turning long-form subtitled footage
//! into short, high-engagement re-cuts: subtitle ingest (C1), language
//! routing under a shared memory budget (C2), the screenplay
//! reconstruction engine (C3), alignment & splicing planning (C4), logic
//! validators (C5) and a content-addressed versioning core (C6), all
//! sequenced by the job [`coordinator`].
//!
//! ## Usage
//!
//! ```ignore
//! let config = reconstruct_core::ReconstructConfig::from_env();
//! let coordinator = reconstruct_core::Coordinator::new(&config);
//! let cancel = tokio_util::sync::CancellationToken::new();
//! let output = coordinator.run_job(srt_bytes, RewriteParams::default(), None, cancel).await?;
//! ```
//!
//! Every public stage function is also callable on its own (e.g.
//! `subtitle::parse_srt`, `engine::reconstruct`, `planner::plan`,
//! `validators::run_all`) for callers that want to drive the pipeline by
//! hand instead of through the coordinator's job pool.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod model;
pub mod planner;
pub mod router;
pub mod subtitle;
pub mod validators;
pub mod versioning;

pub use config::ReconstructConfig;
pub use coordinator::{Coordinator, JobOutput};
pub use error::{GovernorError, ParseError, PlannerError, ReconstructError, Result, VersioningError};
pub use model::{
    Cut, CutPlan, Language, Provenance, RewrittenSegment, RewrittenTimeline, Segment, Timeline, TransformTag,
};
pub use router::RewriteParams;

//! Language Router & Memory Governor (C2, spec §4.2): picks a resident
//! generation backend for a [`Timeline`]'s language and leases it under a
//! shared memory ceiling.

pub mod backend;
pub mod governor;

pub use backend::{BackendKind, GenerationBackend, RewriteParams, SemanticSignals};
pub use governor::{Lease, MemoryGovernor};

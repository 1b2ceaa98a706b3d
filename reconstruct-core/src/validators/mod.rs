//! Logic Validators (C5, spec §4.5): V1-V8 plus the sandbox defect
//! injector test harness.

pub mod checks;
pub mod sandbox;
pub mod types;

pub use checks::run_all;
pub use types::{Severity, ValidationIssue, ValidationReport};

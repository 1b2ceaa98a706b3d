//! CLI-facing error type. Wraps [`reconstruct_core::ReconstructError`] and
//! adds the handful of failure modes that only make sense at the CLI
//! boundary (bad arguments, missing files).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Pipeline(#[from] reconstruct_core::ReconstructError),

    #[error("could not read '{path}': {source}")]
    InputFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no snapshot found with id '{0}'")]
    UnknownSnapshot(String),
}

impl CliError {
    /// Exit codes per spec §6: 0 success, 1 validation rejection, 2 input
    /// error, 3 resource exhaustion, 4 internal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Pipeline(e) => e.exit_code(),
            CliError::InputFile { .. } | CliError::UnknownSnapshot(_) => 2,
        }
    }
}

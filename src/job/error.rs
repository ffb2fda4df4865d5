//! Job-level errors. Anything raised here stops the job before items run.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::failure::ErrorKind;

/// Errors that prevent a job from starting.
#[derive(Debug, Error)]
pub enum JobError {
    /// Configuration rejected, or no usable strategy.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Destination directory could not be created or written.
    #[error(
        "destination {path} is not writable: {source}\n  Suggestion: choose a writable directory with --dest"
    )]
    DestinationUnwritable {
        /// Destination directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::DestinationUnwritable { .. } => ErrorKind::FileSystem,
        }
    }
}

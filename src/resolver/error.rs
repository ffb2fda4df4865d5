//! Error types for artifact resolution.
//!
//! Follows the What/Why/Fix pattern used across the project. Every variant
//! maps to an [`ErrorKind`] so results can be tallied per category.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::failure::ErrorKind;

/// Errors that can occur while resolving an artifact.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The index or package manager has no artifact of the requested form.
    #[error("no {form} found for '{package}': {detail}\n  Suggestion: {suggestion}")]
    NoArtifactFound {
        /// Requirement being resolved.
        package: String,
        /// Requested form, e.g. "wheel for Linux/py3.11" or "source distribution".
        form: String,
        /// What the resolver observed.
        detail: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The resolver ran but could not produce an artifact.
    #[error("resolution failed for '{package}': {reason}\n  Suggestion: {suggestion}")]
    ResolutionFailed {
        /// Requirement being resolved.
        package: String,
        /// Why resolution failed.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// Transport-level failure talking to the index.
    #[error("network error resolving '{package}': {reason}\n  Suggestion: check connectivity and proxy settings")]
    Network {
        /// Requirement being resolved.
        package: String,
        /// Underlying transport error.
        reason: String,
    },

    /// Staging area could not be prepared.
    #[error("file system error at {path}: {reason}\n  Suggestion: check that the destination directory is writable")]
    FileSystem {
        /// Path involved.
        path: String,
        /// Underlying IO error.
        reason: String,
    },

    /// The resolver itself could not be constructed.
    #[error("{resolver} resolver unavailable: {reason}")]
    ClientUnavailable {
        /// Resolver name.
        resolver: String,
        /// Why construction failed.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `NoArtifactFound` error.
    #[must_use]
    pub fn no_artifact(package: &str, form: &str, detail: &str) -> Self {
        Self::NoArtifactFound {
            package: package.to_string(),
            form: form.to_string(),
            detail: detail.to_string(),
            suggestion: "Check the package name and version, or enable --include-source".to_string(),
        }
    }

    /// Creates a `ResolutionFailed` error.
    #[must_use]
    pub fn resolution_failed(package: &str, reason: &str) -> Self {
        Self::ResolutionFailed {
            package: package.to_string(),
            reason: reason.to_string(),
            suggestion: "Re-run with -v to see resolver output".to_string(),
        }
    }

    /// Creates a `ResolutionFailed` error for an operation that ran too long.
    #[must_use]
    pub fn timeout(package: &str, after: Duration) -> Self {
        Self::ResolutionFailed {
            package: package.to_string(),
            reason: format!("timed out after {}s", after.as_secs()),
            suggestion: "Increase the timeout or check network connectivity".to_string(),
        }
    }

    /// Creates a `Network` error.
    #[must_use]
    pub fn network(package: &str, reason: impl std::fmt::Display) -> Self {
        Self::Network {
            package: package.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `FileSystem` error.
    #[must_use]
    pub fn file_system(path: &Path, source: &std::io::Error) -> Self {
        Self::FileSystem {
            path: path.display().to_string(),
            reason: source.to_string(),
        }
    }

    /// Creates a `ClientUnavailable` error.
    #[must_use]
    pub fn client_unavailable(resolver: &str, reason: impl std::fmt::Display) -> Self {
        Self::ClientUnavailable {
            resolver: resolver.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Error category used for reporting and fallback decisions.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoArtifactFound { .. } => ErrorKind::NoArtifactFound,
            Self::ResolutionFailed { .. } | Self::ClientUnavailable { .. } => {
                ErrorKind::ResolutionFailed
            }
            Self::Network { .. } => ErrorKind::Network,
            Self::FileSystem { .. } => ErrorKind::FileSystem,
        }
    }
}

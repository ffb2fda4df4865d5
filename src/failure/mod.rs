//! Error kinds shared by every per-item outcome, plus user-facing descriptors.

use std::fmt;

use serde::Serialize;

/// Coarse classification of a failure, independent of the component that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ErrorKind {
    /// Invalid or missing job configuration. Fatal before the job starts.
    Config,
    /// No artifact matched the request.
    NoArtifactFound,
    /// The package manager or index answered with an unexpected error.
    ResolutionFailed,
    /// Transport failure after retries were exhausted.
    Network,
    /// Destination directory could not be written.
    FileSystem,
}

impl ErrorKind {
    /// Returns the stable label used in reports and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "ConfigError",
            Self::NoArtifactFound => "NoArtifactFound",
            Self::ResolutionFailed => "ResolutionFailed",
            Self::Network => "NetworkError",
            Self::FileSystem => "FileSystemError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What/Why/Fix text shown next to a failed item in the final summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureDescriptor {
    pub what: &'static str,
    pub why: &'static str,
    pub fix: &'static str,
}

/// Returns the user-facing descriptor for an error kind.
#[must_use]
pub fn describe(kind: ErrorKind) -> FailureDescriptor {
    match kind {
        ErrorKind::Config => FailureDescriptor {
            what: "Invalid job configuration",
            why: "A required field is missing or holds a value outside its allowed range.",
            fix: "Review the command-line flags and settings file, then rerun.",
        },
        ErrorKind::NoArtifactFound => FailureDescriptor {
            what: "No matching distribution",
            why: "The package has no wheel for this platform/interpreter and no usable source form.",
            fix: "Check the package name and version constraint, or enable --include-source.",
        },
        ErrorKind::ResolutionFailed => FailureDescriptor {
            what: "Resolution failed",
            why: "The package manager or package index returned an unexpected error.",
            fix: "Rerun with -v to see the underlying output; verify the pip path or index URL.",
        },
        ErrorKind::Network => FailureDescriptor {
            what: "Network request failed",
            why: "Connectivity, DNS, TLS, or proxy conditions interrupted the transfer.",
            fix: "Check connectivity and proxy settings, then rerun; finished files are skipped.",
        },
        ErrorKind::FileSystem => FailureDescriptor {
            what: "Could not write to destination",
            why: "The destination directory is missing, read-only, or out of space.",
            fix: "Choose a writable destination directory with enough free space.",
        },
    }
}

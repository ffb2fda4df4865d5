//! Error types for job configuration.
//!
//! Every variant is fatal: a job never starts with an invalid configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::failure::ErrorKind;

/// Errors raised while assembling or validating a [`JobConfig`](super::JobConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A selection that must be non-empty was empty.
    #[error("no {field} selected\n  Suggestion: select at least one {field}")]
    EmptySelection {
        /// Name of the empty selection ("operating system", "python version").
        field: &'static str,
    },

    /// Unknown operating system name.
    #[error("unknown operating system '{value}'\n  Suggestion: use one of windows, linux, macos")]
    InvalidPlatform {
        /// The rejected value.
        value: String,
    },

    /// Interpreter version could not be parsed.
    #[error("invalid python version '{value}': {reason}\n  Suggestion: use the form 3.N, e.g. 3.11")]
    InvalidPythonVersion {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required field was not provided.
    #[error("missing required setting: {field}\n  Suggestion: {suggestion}")]
    Missing {
        /// Name of the missing field.
        field: &'static str,
        /// How to provide it.
        suggestion: &'static str,
    },

    /// The package list file could not be read.
    #[error("cannot read package list {path}: {source}")]
    PackageListUnreadable {
        /// Path of the package list.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The package list holds no package names.
    #[error("package list {path} contains no packages\n  Suggestion: add one package name per line")]
    EmptyPackageList {
        /// Path of the package list.
        path: PathBuf,
    },

    /// A line of the package list is not a valid requirement.
    #[error("invalid requirement on line {line}: '{content}': {reason}")]
    InvalidRequirement {
        /// 1-based line number.
        line: usize,
        /// Raw line content.
        content: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configured package manager executable does not exist.
    #[error("package manager not found at {path}\n  Suggestion: pass --pip with the full path to pip")]
    PackageManagerNotFound {
        /// Configured path.
        path: PathBuf,
    },

    /// The index URL is not a usable http(s) URL.
    #[error("invalid index URL '{url}': {reason}")]
    InvalidIndexUrl {
        /// Configured URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Proxy settings are incomplete or malformed.
    #[error("invalid proxy settings: {reason}")]
    InvalidProxy {
        /// Why they were rejected.
        reason: String,
    },

    /// A numeric setting is outside its allowed range.
    #[error("invalid value for `{field}`: {value}. Expected range: {range}")]
    OutOfRange {
        /// Name of the setting.
        field: &'static str,
        /// The rejected value.
        value: u64,
        /// Human-readable allowed range.
        range: &'static str,
    },

    /// The settings file could not be read or written.
    #[error("settings file {path}: {source}")]
    SettingsIo {
        /// Settings file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for the expected shape.
    #[error("settings file {path} is invalid: {source}")]
    SettingsInvalid {
        /// Settings file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Creates an `InvalidRequirement` error.
    #[must_use]
    pub fn invalid_requirement(line: usize, content: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRequirement {
            line,
            content: content.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidPythonVersion` error.
    #[must_use]
    pub fn invalid_python_version(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPythonVersion {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidProxy` error.
    #[must_use]
    pub fn invalid_proxy(reason: impl Into<String>) -> Self {
        Self::InvalidProxy {
            reason: reason.into(),
        }
    }

    /// Configuration errors always classify as [`ErrorKind::Config`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

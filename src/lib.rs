//! wheelfetch Core Library
//!
//! Downloads Python wheels and source distributions for a list of packages
//! across a matrix of operating systems and interpreter versions, without
//! needing those environments locally.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Validated job configuration, proxy settings, settings file
//! - [`target`] - Target matrix and wheel compatibility tags
//! - [`package`] - Package list parsing and version specifiers
//! - [`artifact`] - Wheel and sdist filenames, resolved artifact references
//! - [`resolver`] - Package manager and index client resolution strategies
//! - [`download`] - Atomic retrieval into the destination directory
//! - [`job`] - Batch orchestration, source fallback, progress events
//! - [`failure`] - Error kinds and user-facing descriptions

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod config;
pub mod download;
pub mod failure;
pub mod job;
pub mod package;
pub mod resolver;
pub mod target;
pub(crate) mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use artifact::{ArtifactKind, ArtifactRef, ArtifactSource};
pub use config::{ConfigError, JobConfig, JobConfigBuilder, ProxyConfig, Settings, Strategy, VersionPreference};
pub use download::{ArtifactFetcher, CommitOutcome, DownloadError};
pub use failure::ErrorKind;
pub use job::{
    ChannelSink, DownloadResult, ItemOutcome, JobEngine, JobError, JobEvent, JobReport,
    JobSummary, LogSink, ProgressSink, SkipReason,
};
pub use package::{PackageSpec, Version, VersionConstraint};
pub use resolver::{ArtifactForm, IndexClientResolver, PackageManagerResolver, ResolveError, Resolver};
pub use target::{DownloadTarget, Platform, PythonVersion};

//! Artifact retrieval into the destination directory.
//!
//! # Features
//!
//! - Streaming downloads into hidden `.part` files, renamed atomically
//! - sha256 verification against the digest published by the index
//! - Bounded immediate retry for transient network failures
//! - Per-filename locks around existence check and final rename
//! - No-clobber commit of package-manager staged files
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use wheelfetch_core::artifact::{ArtifactKind, ArtifactRef, ArtifactSource};
//! use wheelfetch_core::download::{ArtifactFetcher, CommitOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = ArtifactFetcher::new(Some(reqwest::Client::new()), 2);
//! let artifact = ArtifactRef {
//!     filename: "six-1.16.0-py2.py3-none-any.whl".to_string(),
//!     kind: ArtifactKind::Wheel,
//!     version: "1.16.0".parse()?,
//!     source: ArtifactSource::Url {
//!         url: "https://files.example/six-1.16.0-py2.py3-none-any.whl".to_string(),
//!         sha256: None,
//!     },
//! };
//! if let CommitOutcome::Committed(path) = fetcher.commit(&artifact, Path::new("./wheels")).await? {
//!     println!("Downloaded: {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod locks;
mod retry;

pub use client::{ArtifactFetcher, CommitOutcome, PART_PREFIX, PART_SUFFIX};
pub use error::DownloadError;
pub use locks::FilenameLocks;
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error, classify_resolve_error};

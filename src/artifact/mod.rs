//! Resolved artifacts and their on-disk naming.
//!
//! An [`ArtifactRef`] is what a resolver hands to retrieval: the final filename
//! plus where the bytes come from. Index results point at a URL; package
//! manager results point at a file already staged inside the destination.

mod filename;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tempfile::TempDir;

use crate::package::{Version, VersionConstraint};
use crate::target::{DownloadTarget, match_wheel_tags};

pub use filename::{
    SDIST_EXTENSIONS, SdistFilename, WheelFilename, is_safe_filename, parse_sdist_filename,
    parse_wheel_filename,
};

/// Artifact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    Wheel,
    SourceDist,
}

impl ArtifactKind {
    /// Returns the kind implied by a filename, if it is a wheel or sdist.
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lowered = filename.to_ascii_lowercase();
        if lowered.ends_with(".whl") {
            Some(Self::Wheel)
        } else if SDIST_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) {
            Some(Self::SourceDist)
        } else {
            None
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wheel => f.write_str("wheel"),
            Self::SourceDist => f.write_str("sdist"),
        }
    }
}

/// Where an artifact's bytes come from.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// Downloadable from the index.
    Url {
        url: String,
        /// Hex sha256 digest published by the index, if any.
        sha256: Option<String>,
    },
    /// Already written by the package manager into a staging directory.
    Staged {
        path: PathBuf,
        /// Arguments the package manager was invoked with.
        args: Vec<String>,
        /// Keeps the staging directory alive until the artifact is dropped.
        staging: Arc<TempDir>,
    },
}

/// A concrete artifact chosen by a resolver.
#[derive(Debug, Clone)]
pub struct ArtifactRef {
    pub filename: String,
    pub kind: ArtifactKind,
    pub version: Version,
    pub source: ArtifactSource,
}

impl ArtifactRef {
    /// Final path of this artifact inside `dest`.
    #[must_use]
    pub fn destination_in(&self, dest: &Path) -> PathBuf {
        dest.join(&self.filename)
    }
}

/// Returns true when `filename` already satisfies `(project, constraint, target)`
/// without asking a resolver.
///
/// Only a wheel built for the target's platform counts. A universal wheel or
/// an sdist on disk may have been saved for another target, and a platform
/// wheel may still exist for this one, so those pairs resolve again and let
/// the commit step report the existing file.
#[must_use]
pub fn satisfies(
    filename: &str,
    normalized_name: &str,
    constraint: &VersionConstraint,
    target: &DownloadTarget,
) -> bool {
    parse_wheel_filename(filename).is_some_and(|wheel| {
        wheel.name == normalized_name
            && constraint.allows(&wheel.version)
            && match_wheel_tags(&wheel.tag, target).is_some_and(|found| found.exact)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::target::{Platform, PythonVersion};

    fn linux311() -> DownloadTarget {
        DownloadTarget::new(Platform::Linux, PythonVersion::new(11))
    }

    #[test]
    fn test_kind_from_filename() {
        assert_eq!(
            ArtifactKind::from_filename("a-1-py3-none-any.whl"),
            Some(ArtifactKind::Wheel)
        );
        assert_eq!(
            ArtifactKind::from_filename("a-1.TAR.GZ"),
            Some(ArtifactKind::SourceDist)
        );
        assert_eq!(ArtifactKind::from_filename("notes.txt"), None);
    }

    #[test]
    fn test_satisfies_matching_platform_wheel() {
        let any = VersionConstraint::default();
        let file = "requests-2.31.0-cp311-cp311-manylinux2014_x86_64.whl";
        assert!(satisfies(file, "requests", &any, &linux311()));
        assert!(!satisfies(file, "urllib3", &any, &linux311()));
    }

    #[test]
    fn test_satisfies_respects_target_and_constraint() {
        let pinned = VersionConstraint::parse("==1.26.0").unwrap();
        let file = "numpy-1.26.0-cp311-cp311-win_amd64.whl";
        assert!(!satisfies(file, "numpy", &pinned, &linux311()));

        let windows = DownloadTarget::new(Platform::Windows, PythonVersion::new(11));
        assert!(satisfies(file, "numpy", &pinned, &windows));

        let newer = VersionConstraint::parse(">=2").unwrap();
        assert!(!satisfies(file, "numpy", &newer, &windows));
    }

    #[test]
    fn test_universal_wheel_and_sdist_never_satisfy() {
        let any = VersionConstraint::default();
        assert!(!satisfies(
            "requests-2.31.0-py3-none-any.whl",
            "requests",
            &any,
            &linux311()
        ));
        assert!(!satisfies(
            "obscure-pkg-0.1.tar.gz",
            "obscure-pkg",
            &any,
            &linux311()
        ));
    }
}

//! Artifact resolution.
//!
//! A [`Resolver`] turns a package requirement plus a requested form (a wheel
//! for one target, or the source distribution) into an [`ArtifactRef`].
//!
//! # Architecture
//!
//! - [`Resolver`] - Async trait shared by both strategies
//! - [`PackageManagerResolver`] - Runs `pip download` into a staging directory
//! - [`IndexClientResolver`] - Queries a PEP 691 JSON index and picks the best file
//! - [`build_http_client`] - Shared HTTP client policy (proxy, timeouts, user-agent)
//!
//! One resolver is chosen per job and shared as `Arc<dyn Resolver>`.

mod error;
mod http_client;
mod index;
mod package_manager;
mod select;

pub use error::ResolveError;
pub use http_client::{HttpClientOptions, build_http_client};
pub use index::{INDEX_ACCEPT, IndexClientResolver};
pub use package_manager::{
    NO_MATCH_MARKERS, PackageManagerResolver, STAGING_PREFIX, package_manager_args,
};
pub use select::{IndexFile, ProjectPage, Selected, Yanked, select_sdist, select_wheel};

use std::fmt;

use async_trait::async_trait;

use crate::artifact::{ArtifactKind, ArtifactRef};
use crate::config::Strategy;
use crate::package::PackageSpec;
use crate::target::DownloadTarget;

/// Form of artifact requested from a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactForm {
    /// A wheel installable on the given target.
    Wheel(DownloadTarget),
    /// The source distribution (not platform specific).
    SourceDist,
}

impl ArtifactForm {
    /// Artifact kind this form produces.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Wheel(_) => ArtifactKind::Wheel,
            Self::SourceDist => ArtifactKind::SourceDist,
        }
    }
}

impl fmt::Display for ArtifactForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wheel(target) => write!(f, "wheel for {target}"),
            Self::SourceDist => f.write_str("source distribution"),
        }
    }
}

/// Trait that both resolution strategies implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the job can hold an `Arc<dyn Resolver>`.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the resolver's name (e.g., "pip", "index").
    fn name(&self) -> &str;

    /// Strategy this resolver implements.
    fn strategy(&self) -> Strategy;

    /// Resolves `package` to a concrete artifact of the requested form.
    async fn resolve(
        &self,
        package: &PackageSpec,
        form: &ArtifactForm,
    ) -> Result<ArtifactRef, ResolveError>;
}

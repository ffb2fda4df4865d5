//! Strategy selection, including the downgrade from index client to package manager.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::JobError;
use crate::config::{JobConfig, Strategy};
use crate::download::ArtifactFetcher;
use crate::resolver::{
    HttpClientOptions, IndexClientResolver, PackageManagerResolver, ResolveError, Resolver,
    build_http_client,
};

/// Resolver and fetcher a job runs with.
#[derive(Clone)]
pub struct StrategyChoice {
    resolver: Arc<dyn Resolver>,
    fetcher: ArtifactFetcher,
    requested: Strategy,
    downgrade_reason: Option<String>,
}

impl fmt::Debug for StrategyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyChoice")
            .field("resolver", &self.resolver.name())
            .field("requested", &self.requested)
            .field("downgrade_reason", &self.downgrade_reason)
            .finish_non_exhaustive()
    }
}

impl StrategyChoice {
    /// Uses `resolver` as requested, with no downgrade.
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>, fetcher: ArtifactFetcher) -> Self {
        let requested = resolver.strategy();
        Self {
            resolver,
            fetcher,
            requested,
            downgrade_reason: None,
        }
    }

    /// Marks this choice as replacing a `requested` strategy that was unavailable.
    #[must_use]
    pub fn downgraded_from(mut self, requested: Strategy, reason: impl Into<String>) -> Self {
        self.requested = requested;
        self.downgrade_reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    #[must_use]
    pub fn fetcher(&self) -> &ArtifactFetcher {
        &self.fetcher
    }

    #[must_use]
    pub fn requested(&self) -> Strategy {
        self.requested
    }

    /// Strategy every resolution will use.
    #[must_use]
    pub fn effective(&self) -> Strategy {
        self.resolver.strategy()
    }

    /// Why the requested strategy was replaced, if it was.
    #[must_use]
    pub fn downgrade_reason(&self) -> Option<&str> {
        self.downgrade_reason.as_deref()
    }
}

/// Chooses the resolver for a job.
///
/// The index client needs an HTTP client built with the configured proxy and
/// timeouts, and a valid http(s) index URL. When either is missing the job
/// falls back to the package manager.
///
/// # Errors
///
/// Returns [`JobError::Config`] when the package manager is needed but was
/// neither configured nor found on `PATH`.
pub fn select_strategy(config: &JobConfig) -> Result<StrategyChoice, JobError> {
    let mut downgrade = None;
    if config.strategy() == Strategy::IndexClient {
        match index_client(config) {
            Ok(choice) => {
                info!(index_url = config.index_url(), "using index client");
                return Ok(choice);
            }
            Err(error) => {
                warn!(error = %error, "index client unavailable; falling back to package manager");
                downgrade = Some(error.to_string());
            }
        }
    }

    let resolver = PackageManagerResolver::from_config(config)?;
    info!(executable = %resolver.executable().display(), "using package manager");
    let choice = StrategyChoice::new(
        Arc::new(resolver),
        ArtifactFetcher::new(None, config.max_fetch_attempts()),
    );
    Ok(match downgrade {
        Some(reason) => choice.downgraded_from(Strategy::IndexClient, reason),
        None => choice,
    })
}

fn index_client(config: &JobConfig) -> Result<StrategyChoice, ResolveError> {
    let client = build_http_client(&HttpClientOptions::from_config(config))?;
    let resolver =
        IndexClientResolver::new(client.clone(), config.index_url(), config.version_preference())?
            .with_max_attempts(config.max_fetch_attempts());
    Ok(StrategyChoice::new(
        Arc::new(resolver),
        ArtifactFetcher::new(Some(client), config.max_fetch_attempts()),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::package::parse_package_list;
    use crate::target::{Platform, PythonVersion};
    use tempfile::TempDir;

    fn config(dest: &TempDir, index_url: &str, pip: Option<&std::path::Path>) -> JobConfig {
        let mut builder = JobConfig::builder()
            .strategy(Strategy::IndexClient)
            .platforms([Platform::Linux])
            .python_versions([PythonVersion::new(11)])
            .packages(parse_package_list("requests\n").unwrap())
            .destination_dir(dest.path())
            .index_url(index_url)
            .package_manager_search_path("");
        if let Some(pip) = pip {
            builder = builder.package_manager_path(pip);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_index_client_selected_when_available() {
        let dest = TempDir::new().unwrap();
        let choice = select_strategy(&config(&dest, "https://pypi.org/simple", None)).unwrap();
        assert_eq!(choice.effective(), Strategy::IndexClient);
        assert!(choice.downgrade_reason().is_none());
    }

    #[test]
    fn test_invalid_index_url_downgrades_to_package_manager() {
        let dest = TempDir::new().unwrap();
        let pip = dest.path().join("pip");
        std::fs::write(&pip, "").unwrap();

        let choice = select_strategy(&config(&dest, "ftp://mirror/simple", Some(&pip))).unwrap();
        assert_eq!(choice.requested(), Strategy::IndexClient);
        assert_eq!(choice.effective(), Strategy::PackageManager);
        assert!(choice.downgrade_reason().unwrap().contains("ftp://mirror/simple"));
    }

    #[test]
    fn test_downgrade_without_package_manager_is_config_error() {
        let dest = TempDir::new().unwrap();
        let error = select_strategy(&config(&dest, "not a url", None)).unwrap_err();
        assert!(matches!(
            error,
            JobError::Config(ConfigError::Missing {
                field: "package manager path",
                ..
            })
        ));
    }
}

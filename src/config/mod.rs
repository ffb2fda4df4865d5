//! Job configuration.
//!
//! [`JobConfigBuilder`] collects settings from any front end, validates them,
//! and produces an immutable [`JobConfig`]. The core never reads anything
//! outside the built config.

mod error;
mod proxy;
mod secret;
mod settings;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::package::{PackageSpec, load_package_list};
use crate::target::{DownloadTarget, Platform, PythonVersion, build_target_matrix};

pub use error::ConfigError;
pub use proxy::ProxyConfig;
pub use secret::{MASTER_KEY_ENV, SecretError};
pub use settings::{Settings, default_settings_path};

/// Default package index (PEP 691 JSON simple API).
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";

/// Default number of (package, target) pairs processed at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound for concurrent pairs.
pub const MAX_CONCURRENCY: usize = 16;

/// Default HTTP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout in seconds (large wheels stream for a while).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Default package manager invocation timeout in seconds.
pub const DEFAULT_SUBPROCESS_TIMEOUT_SECS: u64 = 600;

/// Default fetch attempts per artifact (one immediate retry).
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 2;

const PACKAGE_MANAGER_CANDIDATES: [&str; 2] = ["pip", "pip3"];

/// How artifacts are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Run the local package manager (`pip download`).
    #[serde(rename = "pip")]
    PackageManager,
    /// Query the package index directly over HTTP.
    #[serde(rename = "index")]
    IndexClient,
}

impl Strategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PackageManager => "pip",
            Self::IndexClient => "index",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pip" | "package-manager" => Ok(Self::PackageManager),
            "index" | "index-client" | "no-pip" => Ok(Self::IndexClient),
            other => Err(format!("unknown strategy '{other}' (expected pip or index)")),
        }
    }
}

/// Tie-break between several compatible releases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionPreference {
    /// Newest release that satisfies the constraint.
    #[default]
    Highest,
    /// First satisfying file in index listing order.
    FirstListed,
}

impl FromStr for VersionPreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "highest" => Ok(Self::Highest),
            "first-listed" | "first" => Ok(Self::FirstListed),
            other => Err(format!(
                "unknown version preference '{other}' (expected highest or first-listed)"
            )),
        }
    }
}

/// Validated, immutable description of one download job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    strategy: Strategy,
    platforms: Vec<Platform>,
    python_versions: Vec<PythonVersion>,
    targets: Vec<DownloadTarget>,
    package_list_path: Option<PathBuf>,
    packages: Vec<PackageSpec>,
    destination_dir: PathBuf,
    package_manager_path: Option<PathBuf>,
    proxy: Option<ProxyConfig>,
    include_source_form: bool,
    index_url: String,
    concurrency: usize,
    version_preference: VersionPreference,
    connect_timeout: Duration,
    read_timeout: Duration,
    subprocess_timeout: Duration,
    max_fetch_attempts: u32,
}

impl JobConfig {
    /// Starts a builder with default tunables.
    #[must_use]
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder::default()
    }

    /// Requested strategy (the job may downgrade it).
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[must_use]
    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    #[must_use]
    pub fn python_versions(&self) -> &[PythonVersion] {
        &self.python_versions
    }

    /// Deduplicated target matrix, OS order outer.
    #[must_use]
    pub fn targets(&self) -> &[DownloadTarget] {
        &self.targets
    }

    #[must_use]
    pub fn package_list_path(&self) -> Option<&Path> {
        self.package_list_path.as_deref()
    }

    /// Packages in list order.
    #[must_use]
    pub fn packages(&self) -> &[PackageSpec] {
        &self.packages
    }

    #[must_use]
    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    /// Package manager executable, configured or found on `PATH`.
    #[must_use]
    pub fn package_manager_path(&self) -> Option<&Path> {
        self.package_manager_path.as_deref()
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    #[must_use]
    pub fn include_source_form(&self) -> bool {
        self.include_source_form
    }

    /// Index base URL as configured; validated when the index client is built.
    #[must_use]
    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn version_preference(&self) -> VersionPreference {
        self.version_preference
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    #[must_use]
    pub fn subprocess_timeout(&self) -> Duration {
        self.subprocess_timeout
    }

    #[must_use]
    pub fn max_fetch_attempts(&self) -> u32 {
        self.max_fetch_attempts
    }
}

/// Builder for [`JobConfig`].
#[derive(Debug, Clone)]
pub struct JobConfigBuilder {
    strategy: Strategy,
    platforms: Vec<Platform>,
    python_versions: Vec<PythonVersion>,
    package_list_path: Option<PathBuf>,
    packages: Option<Vec<PackageSpec>>,
    destination_dir: Option<PathBuf>,
    package_manager_path: Option<PathBuf>,
    search_path: Option<OsString>,
    proxy: Option<ProxyConfig>,
    include_source_form: bool,
    index_url: String,
    concurrency: usize,
    version_preference: VersionPreference,
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    subprocess_timeout_secs: u64,
    max_fetch_attempts: u32,
}

impl Default for JobConfigBuilder {
    fn default() -> Self {
        Self {
            strategy: Strategy::PackageManager,
            platforms: Vec::new(),
            python_versions: Vec::new(),
            package_list_path: None,
            packages: None,
            destination_dir: None,
            package_manager_path: None,
            search_path: None,
            proxy: None,
            include_source_form: false,
            index_url: DEFAULT_INDEX_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            version_preference: VersionPreference::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            subprocess_timeout_secs: DEFAULT_SUBPROCESS_TIMEOUT_SECS,
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
        }
    }
}

impl JobConfigBuilder {
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    #[must_use]
    pub fn python_versions(mut self, versions: impl IntoIterator<Item = PythonVersion>) -> Self {
        self.python_versions = versions.into_iter().collect();
        self
    }

    /// Package list file, read during [`build`](Self::build).
    #[must_use]
    pub fn package_list_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_list_path = Some(path.into());
        self
    }

    /// Supplies packages directly instead of reading a list file.
    #[must_use]
    pub fn packages(mut self, packages: Vec<PackageSpec>) -> Self {
        self.packages = Some(packages);
        self
    }

    #[must_use]
    pub fn destination_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.destination_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn package_manager_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_manager_path = Some(path.into());
        self
    }

    /// Overrides the `PATH` value searched for `pip`/`pip3`.
    #[must_use]
    pub fn package_manager_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    #[must_use]
    pub fn include_source_form(mut self, include: bool) -> Self {
        self.include_source_form = include;
        self
    }

    #[must_use]
    pub fn index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = url.into();
        self
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn version_preference(mut self, preference: VersionPreference) -> Self {
        self.version_preference = preference;
        self
    }

    #[must_use]
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn subprocess_timeout_secs(mut self, secs: u64) -> Self {
        self.subprocess_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts;
        self
    }

    /// Validates every field and produces the immutable config.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn build(self) -> Result<JobConfig, ConfigError> {
        validate_range("concurrency", self.concurrency as u64, 1, MAX_CONCURRENCY as u64, "1..=16")?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600, "1..=3600")?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600, "1..=3600")?;
        validate_range("subprocess_timeout_secs", self.subprocess_timeout_secs, 1, 3600, "1..=3600")?;
        validate_range("max_fetch_attempts", u64::from(self.max_fetch_attempts), 1, 5, "1..=5")?;

        let targets = build_target_matrix(&self.platforms, &self.python_versions)?;

        let destination_dir = self.destination_dir.ok_or(ConfigError::Missing {
            field: "destination directory",
            suggestion: "pass --dest DIR or set dest_folder in the settings file",
        })?;

        let packages = match (self.packages, &self.package_list_path) {
            (Some(packages), _) => packages,
            (None, Some(path)) => load_package_list(path)?,
            (None, None) => {
                return Err(ConfigError::Missing {
                    field: "package list",
                    suggestion: "pass --package-list FILE or set package_list_file in the settings file",
                });
            }
        };
        if packages.is_empty() {
            return Err(ConfigError::EmptyPackageList {
                path: self.package_list_path.clone().unwrap_or_default(),
            });
        }

        let package_manager_path = match self.package_manager_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::PackageManagerNotFound { path });
                }
                Some(path)
            }
            None => {
                let search = self.search_path.or_else(|| std::env::var_os("PATH"));
                search.as_deref().and_then(find_package_manager)
            }
        };
        if self.strategy == Strategy::PackageManager && package_manager_path.is_none() {
            return Err(ConfigError::Missing {
                field: "package manager path",
                suggestion: "install pip, put it on PATH, or pass --pip PATH",
            });
        }

        debug!(
            strategy = %self.strategy,
            targets = targets.len(),
            packages = packages.len(),
            "job configuration validated"
        );

        Ok(JobConfig {
            strategy: self.strategy,
            platforms: self.platforms,
            python_versions: self.python_versions,
            targets,
            package_list_path: self.package_list_path,
            packages,
            destination_dir,
            package_manager_path,
            proxy: self.proxy,
            include_source_form: self.include_source_form,
            index_url: self.index_url,
            concurrency: self.concurrency,
            version_preference: self.version_preference,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            subprocess_timeout: Duration::from_secs(self.subprocess_timeout_secs),
            max_fetch_attempts: self.max_fetch_attempts,
        })
    }
}

fn validate_range(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
    range: &'static str,
) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, range })
    }
}

/// Searches a `PATH`-style value for `pip`, then `pip3`.
#[must_use]
pub fn find_package_manager(search_path: &std::ffi::OsStr) -> Option<PathBuf> {
    for name in PACKAGE_MANAGER_CANDIDATES {
        for dir in std::env::split_paths(search_path) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            if cfg!(windows) {
                let exe = candidate.with_extension("exe");
                if exe.is_file() {
                    return Some(exe);
                }
            }
        }
    }
    None
}

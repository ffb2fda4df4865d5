//! Package manager resolver (`pip download`).
//!
//! Each call stages into a fresh hidden directory inside the destination so
//! the final move is a same-filesystem rename. The staging directory lives as
//! long as the returned [`ArtifactRef`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::artifact::{ArtifactKind, ArtifactRef, ArtifactSource, parse_sdist_filename, parse_wheel_filename};
use crate::config::{ConfigError, JobConfig, ProxyConfig, Strategy};
use crate::package::{PackageSpec, Version};

use super::{ArtifactForm, ResolveError, Resolver};

/// Output fragments meaning "nothing matches", not "pip broke".
pub const NO_MATCH_MARKERS: [&str; 2] = [
    "No matching distribution",
    "Could not find a version that satisfies",
];

/// Prefix of per-call staging directories inside the destination.
pub const STAGING_PREFIX: &str = ".wheelfetch-staging-";

/// Resolves artifacts by running the local package manager.
#[derive(Debug, Clone)]
pub struct PackageManagerResolver {
    executable: PathBuf,
    destination: PathBuf,
    proxy: Option<ProxyConfig>,
    timeout: Duration,
}

impl PackageManagerResolver {
    /// Creates a resolver running `executable`, staging inside `destination`.
    #[must_use]
    pub fn new(
        executable: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        proxy: Option<ProxyConfig>,
        timeout: Duration,
    ) -> Self {
        Self {
            executable: executable.into(),
            destination: destination.into(),
            proxy,
            timeout,
        }
    }

    /// Builds the resolver from a job config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no package manager is available.
    pub fn from_config(config: &JobConfig) -> Result<Self, ConfigError> {
        let executable = config.package_manager_path().ok_or(ConfigError::Missing {
            field: "package manager path",
            suggestion: "install pip, put it on PATH, or pass --pip PATH",
        })?;
        Ok(Self::new(
            executable,
            config.destination_dir(),
            config.proxy().cloned(),
            config.subprocess_timeout(),
        ))
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

/// Arguments for one `pip download` call.
///
/// `proxy` is inserted verbatim; pass a redacted value when logging.
#[must_use]
pub fn package_manager_args(
    package: &PackageSpec,
    form: &ArtifactForm,
    staging: &Path,
    proxy: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "download".to_string(),
        package.requirement(),
        "--no-deps".to_string(),
        format!("--dest={}", staging.display()),
    ];
    if let Some(proxy) = proxy {
        args.push(format!("--proxy={proxy}"));
    }
    match form {
        ArtifactForm::Wheel(target) => {
            args.push("--only-binary=:all:".to_string());
            for tag in target.platform.platform_tags() {
                args.push(format!("--platform={tag}"));
            }
            args.push(format!("--python-version={}", target.python.nodot()));
            args.push("--implementation=cp".to_string());
            args.push(format!("--abi={}", target.python.cpython_tag()));
        }
        ArtifactForm::SourceDist => {
            args.push("--no-binary=:all:".to_string());
        }
    }
    args
}

#[async_trait]
impl Resolver for PackageManagerResolver {
    fn name(&self) -> &str {
        "pip"
    }

    fn strategy(&self) -> Strategy {
        Strategy::PackageManager
    }

    #[instrument(skip_all, fields(package = %package, form = %form))]
    async fn resolve(
        &self,
        package: &PackageSpec,
        form: &ArtifactForm,
    ) -> Result<ArtifactRef, ResolveError> {
        let requirement = package.requirement();
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.destination)
            .map_err(|e| ResolveError::file_system(&self.destination, &e))?;

        let secret_proxy = self
            .proxy
            .as_ref()
            .map(ProxyConfig::package_manager_arg)
            .transpose()
            .map_err(|e| ResolveError::resolution_failed(&requirement, &e.to_string()))?;
        let shown_proxy = self.proxy.as_ref().map(ToString::to_string);

        let args = package_manager_args(package, form, staging.path(), secret_proxy.as_deref());
        let shown_args = package_manager_args(package, form, staging.path(), shown_proxy.as_deref());
        debug!(executable = %self.executable.display(), args = ?shown_args, "running package manager");

        let mut command = Command::new(&self.executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ResolveError::resolution_failed(
                    &requirement,
                    &format!("failed to run {}: {e}", self.executable.display()),
                ));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "package manager timed out; killed");
                return Err(ResolveError::timeout(&requirement, self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if NO_MATCH_MARKERS
                .iter()
                .any(|marker| stdout.contains(marker) || stderr.contains(marker))
            {
                return Err(ResolveError::no_artifact(
                    &requirement,
                    &form.to_string(),
                    "package manager found no matching distribution",
                ));
            }
            let detail = last_error_line(&stderr).unwrap_or("no error output");
            return Err(ResolveError::resolution_failed(
                &requirement,
                &format!("package manager exited with {}: {detail}", output.status),
            ));
        }

        let (path, filename, version) = find_staged(staging.path(), form.kind())
            .map_err(|e| ResolveError::file_system(staging.path(), &e))?
            .ok_or_else(|| {
                ResolveError::resolution_failed(
                    &requirement,
                    "package manager reported success but staged no artifact",
                )
            })?;
        debug!(filename = %filename, "package manager staged artifact");

        Ok(ArtifactRef {
            filename,
            kind: form.kind(),
            version,
            source: ArtifactSource::Staged {
                path,
                args: shown_args,
                staging: Arc::new(staging),
            },
        })
    }
}

fn last_error_line(stderr: &str) -> Option<&str> {
    stderr.lines().map(str::trim).rev().find(|line| !line.is_empty())
}

/// First staged file of `kind` whose name parses, sorted by name for determinism.
fn find_staged(
    staging: &Path,
    kind: ArtifactKind,
) -> std::io::Result<Option<(PathBuf, String, Version)>> {
    let mut names: Vec<String> = std::fs::read_dir(staging)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| ArtifactKind::from_filename(name) == Some(kind))
        .collect();
    names.sort();

    Ok(names.into_iter().find_map(|name| {
        let version = match kind {
            ArtifactKind::Wheel => parse_wheel_filename(&name)?.version,
            ArtifactKind::SourceDist => parse_sdist_filename(&name)?.version,
        };
        Some((staging.join(&name), name, version))
    }))
}

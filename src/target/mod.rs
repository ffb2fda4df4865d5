//! Target matrix construction.
//!
//! A job downloads for every combination of the selected operating systems and
//! interpreter versions. This module owns those two axes, the
//! [`DownloadTarget`] pair, and the compatibility rules in [`tags`] that decide
//! which wheel tags a target accepts.

mod tags;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

pub use tags::{TagMatch, WheelTag, match_wheel_tags};

/// Operating system family a wheel is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// 64-bit Windows.
    Windows,
    /// x86-64 Linux (manylinux).
    Linux,
    /// x86-64 macOS.
    #[serde(rename = "macos")]
    MacOs,
}

impl Platform {
    /// All platforms in their canonical display order.
    pub const ALL: [Self; 3] = [Self::Windows, Self::Linux, Self::MacOs];

    /// Platform tags passed to the package manager as `--platform` values.
    #[must_use]
    pub fn platform_tags(self) -> &'static [&'static str] {
        match self {
            Self::Windows => &["win_amd64"],
            Self::Linux => &["manylinux2014_x86_64", "manylinux2010_x86_64"],
            Self::MacOs => &["macosx_10_9_x86_64"],
        }
    }

    /// Returns true when a wheel platform tag installs on this platform.
    #[must_use]
    pub fn accepts_platform_tag(self, tag: &str) -> bool {
        tags::platform_accepts(self, tag)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("Windows"),
            Self::Linux => f.write_str("Linux"),
            Self::MacOs => f.write_str("macOS"),
        }
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" | "win_amd64" => Ok(Self::Windows),
            "linux" | "manylinux" => Ok(Self::Linux),
            "macos" | "mac" | "osx" | "darwin" => Ok(Self::MacOs),
            _ => Err(ConfigError::InvalidPlatform {
                value: value.to_string(),
            }),
        }
    }
}

/// A CPython 3.x interpreter version, e.g. `3.11`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PythonVersion {
    minor: u8,
}

impl PythonVersion {
    /// Creates a `3.<minor>` version.
    #[must_use]
    pub fn new(minor: u8) -> Self {
        Self { minor }
    }

    /// Minor version number (`11` for 3.11).
    #[must_use]
    pub fn minor(self) -> u8 {
        self.minor
    }

    /// Dotless form used by tags and `--python-version` (`311`).
    #[must_use]
    pub fn nodot(self) -> String {
        format!("3{}", self.minor)
    }

    /// CPython interpreter and ABI tag (`cp311`).
    #[must_use]
    pub fn cpython_tag(self) -> String {
        format!("cp3{}", self.minor)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "3.{}", self.minor)
    }
}

impl FromStr for PythonVersion {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let Some((major, minor)) = trimmed.split_once('.') else {
            return Err(ConfigError::invalid_python_version(
                value,
                "expected MAJOR.MINOR",
            ));
        };
        if major != "3" {
            return Err(ConfigError::invalid_python_version(
                value,
                "only CPython 3.x targets are supported",
            ));
        }
        let minor = minor
            .parse::<u8>()
            .map_err(|e| ConfigError::invalid_python_version(value, e.to_string()))?;
        Ok(Self::new(minor))
    }
}

impl TryFrom<String> for PythonVersion {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PythonVersion> for String {
    fn from(value: PythonVersion) -> Self {
        value.to_string()
    }
}

/// One (platform, interpreter version) pair to download for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DownloadTarget {
    pub platform: Platform,
    pub python: PythonVersion,
}

impl DownloadTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(platform: Platform, python: PythonVersion) -> Self {
        Self { platform, python }
    }
}

impl fmt::Display for DownloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/py{}", self.platform, self.python)
    }
}

/// Expands the OS selection and interpreter selection into concrete targets.
///
/// Order is OS-selection order outer, version-selection order inner, with
/// repeated selections removed (first occurrence wins).
///
/// # Errors
///
/// Returns [`ConfigError::EmptySelection`] if either selection is empty.
pub fn build_target_matrix(
    platforms: &[Platform],
    versions: &[PythonVersion],
) -> Result<Vec<DownloadTarget>, ConfigError> {
    if platforms.is_empty() {
        return Err(ConfigError::EmptySelection {
            field: "operating system",
        });
    }
    if versions.is_empty() {
        return Err(ConfigError::EmptySelection {
            field: "python version",
        });
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(platforms.len() * versions.len());
    for &platform in platforms {
        for &python in versions {
            let target = DownloadTarget::new(platform, python);
            if seen.insert(target) {
                targets.push(target);
            }
        }
    }

    debug!(count = targets.len(), "built target matrix");
    Ok(targets)
}

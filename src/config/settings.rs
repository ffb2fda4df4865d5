//! JSON settings file.
//!
//! Settings hold defaults for every job field. Front ends layer their own
//! values on top with [`Settings::overlay`] and turn the result into a
//! [`JobConfigBuilder`](super::JobConfigBuilder). The proxy password is only
//! written encrypted; when no key is available it is left out of the file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::secret::{self, SecretError};
use super::{ConfigError, JobConfigBuilder, ProxyConfig, Strategy, VersionPreference};
use crate::target::{Platform, PythonVersion};

const SETTINGS_DIR: &str = "wheelfetch";
const SETTINGS_FILE: &str = "settings.json";

/// Persisted job defaults. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_versions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_list_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pip_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_proxy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_user: Option<String>,
    /// Plain-text password. Accepted on load, never written.
    #[serde(skip_serializing)]
    pub proxy_password: Option<String>,
    /// Password sealed by [`Settings::save`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_password_encrypted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer: Option<VersionPreference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subprocess_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fetch_attempts: Option<u32>,
}

/// Resolves the default settings path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/wheelfetch/settings.json`
/// 2. `$HOME/.config/wheelfetch/settings.json`
#[must_use]
pub fn default_settings_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(SETTINGS_DIR)
                .join(SETTINGS_FILE),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(SETTINGS_DIR)
            .join(SETTINGS_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

impl Settings {
    /// Loads settings from `path`; a missing file yields `None`.
    ///
    /// An encrypted proxy password that cannot be opened is dropped with a
    /// warning rather than failing the load.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SettingsIo`] or [`ConfigError::SettingsInvalid`].
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        Self::load_with(path, secret::load_key)
    }

    fn load_with<F>(path: &Path, key: F) -> Result<Option<Self>, ConfigError>
    where
        F: FnOnce() -> Result<String, SecretError>,
    {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file");
            return Ok(None);
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::SettingsInvalid {
                path: path.to_path_buf(),
                source,
            })?;
        let sealed = settings
            .proxy_password_encrypted
            .clone()
            .filter(|_| settings.proxy_password.is_none());
        if let Some(sealed) = sealed {
            match key().and_then(|key| secret::open(&sealed, &key)) {
                Ok(password) => settings.proxy_password = Some(password),
                Err(e) => warn!(error = %e, "ignoring saved proxy password"),
            }
        }
        debug!(path = %path.display(), "loaded settings file");
        Ok(Some(settings))
    }

    /// Writes settings as pretty JSON, creating parent directories.
    ///
    /// A proxy password is sealed with the keychain key; when no key can be
    /// had it is left out and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SettingsIo`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.save_with(path, secret::load_or_create_key)
    }

    fn save_with<F>(&self, path: &Path, key: F) -> Result<(), ConfigError>
    where
        F: FnOnce() -> Result<String, SecretError>,
    {
        let mut stored = self.clone();
        stored.proxy_password_encrypted = None;
        if let Some(password) = self.proxy_password.as_deref().filter(|p| !p.is_empty()) {
            match key().and_then(|key| secret::seal(password, &key)) {
                Ok(sealed) => stored.proxy_password_encrypted = Some(sealed),
                Err(e) => warn!(error = %e, "proxy password not saved"),
            }
        }

        let io_err = |source| ConfigError::SettingsIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&stored).map_err(|source| ConfigError::SettingsInvalid {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json + "\n").map_err(io_err)?;
        info!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Returns `self` with every field set in `top` replaced.
    #[must_use]
    pub fn overlay(self, top: Self) -> Self {
        Self {
            strategy: top.strategy.or(self.strategy),
            os_list: top.os_list.or(self.os_list),
            python_versions: top.python_versions.or(self.python_versions),
            package_list_file: top.package_list_file.or(self.package_list_file),
            dest_folder: top.dest_folder.or(self.dest_folder),
            pip_path: top.pip_path.or(self.pip_path),
            include_source: top.include_source.or(self.include_source),
            use_proxy: top.use_proxy.or(self.use_proxy),
            proxy_server: top.proxy_server.or(self.proxy_server),
            proxy_port: top.proxy_port.or(self.proxy_port),
            proxy_user: top.proxy_user.or(self.proxy_user),
            proxy_password: top.proxy_password.or(self.proxy_password),
            proxy_password_encrypted: top
                .proxy_password_encrypted
                .or(self.proxy_password_encrypted),
            index_url: top.index_url.or(self.index_url),
            concurrency: top.concurrency.or(self.concurrency),
            prefer: top.prefer.or(self.prefer),
            connect_timeout_secs: top.connect_timeout_secs.or(self.connect_timeout_secs),
            read_timeout_secs: top.read_timeout_secs.or(self.read_timeout_secs),
            subprocess_timeout_secs: top.subprocess_timeout_secs.or(self.subprocess_timeout_secs),
            max_fetch_attempts: top.max_fetch_attempts.or(self.max_fetch_attempts),
        }
    }

    /// Proxy described by these settings, if enabled.
    ///
    /// A proxy server implies `use_proxy` unless it is explicitly `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the proxy is enabled but incomplete.
    pub fn proxy(&self) -> Result<Option<ProxyConfig>, ConfigError> {
        let server = self.proxy_server.as_deref().filter(|s| !s.trim().is_empty());
        let enabled = self.use_proxy.unwrap_or(server.is_some());
        if !enabled {
            return Ok(None);
        }
        let server = server.ok_or(ConfigError::Missing {
            field: "proxy server",
            suggestion: "pass --proxy-host or set proxy_server in the settings file",
        })?;
        let port = self.proxy_port.ok_or(ConfigError::Missing {
            field: "proxy port",
            suggestion: "pass --proxy-port or set proxy_port in the settings file",
        })?;
        ProxyConfig::new(
            server,
            port,
            self.proxy_user.clone(),
            self.proxy_password.clone(),
        )
        .map(Some)
    }

    /// Converts settings into a builder, parsing OS and version names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unknown OS names, bad versions or proxy
    /// settings. Range checks happen in [`JobConfigBuilder::build`].
    pub fn to_builder(&self) -> Result<JobConfigBuilder, ConfigError> {
        let platforms = self
            .os_list
            .iter()
            .flatten()
            .map(|name| name.parse::<Platform>())
            .collect::<Result<Vec<_>, _>>()?;
        let versions = self
            .python_versions
            .iter()
            .flatten()
            .map(|v| v.parse::<PythonVersion>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = JobConfigBuilder::default()
            .platforms(platforms)
            .python_versions(versions)
            .include_source_form(self.include_source.unwrap_or(false))
            .proxy(self.proxy()?);

        if let Some(strategy) = self.strategy {
            builder = builder.strategy(strategy);
        }
        if let Some(path) = &self.package_list_file {
            builder = builder.package_list_path(path);
        }
        if let Some(dir) = &self.dest_folder {
            builder = builder.destination_dir(dir);
        }
        if let Some(pip) = self.pip_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            builder = builder.package_manager_path(pip);
        }
        if let Some(url) = &self.index_url {
            builder = builder.index_url(url);
        }
        if let Some(concurrency) = self.concurrency {
            builder = builder.concurrency(concurrency);
        }
        if let Some(prefer) = self.prefer {
            builder = builder.version_preference(prefer);
        }
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout_secs(secs);
        }
        if let Some(secs) = self.read_timeout_secs {
            builder = builder.read_timeout_secs(secs);
        }
        if let Some(secs) = self.subprocess_timeout_secs {
            builder = builder.subprocess_timeout_secs(secs);
        }
        if let Some(attempts) = self.max_fetch_attempts {
            builder = builder.max_fetch_attempts(attempts);
        }
        Ok(builder)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Settings::load(&dir.path().join("settings.json")).unwrap().is_none());
    }

    fn with_password() -> Settings {
        Settings {
            proxy_server: Some("proxy".into()),
            proxy_port: Some(8080),
            proxy_user: Some("alice".into()),
            proxy_password: Some("hunter2".into()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_save_encrypts_password_and_load_restores_it() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        with_password()
            .save_with(&path, || Ok("test-key".to_string()))
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("hunter2"), "{raw}");
        assert!(raw.contains("proxy_password_encrypted"), "{raw}");
        assert!(!raw.contains("\"proxy_password\""), "{raw}");

        let loaded = Settings::load_with(&path, || Ok("test-key".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.proxy_user.as_deref(), Some("alice"));
        assert_eq!(loaded.proxy_password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_save_without_key_drops_password() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        with_password()
            .save_with(&path, || Err(SecretError::KeychainUnavailable))
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("hunter2"), "{raw}");
        assert!(!raw.contains("proxy_password"), "{raw}");
        let loaded = Settings::load_with(&path, || Ok("unused".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.proxy_server.as_deref(), Some("proxy"));
        assert!(loaded.proxy_password.is_none());
    }

    #[test]
    fn test_load_with_wrong_key_keeps_other_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        with_password()
            .save_with(&path, || Ok("key-a".to_string()))
            .unwrap();

        let loaded = Settings::load_with(&path, || Ok("key-b".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.proxy_user.as_deref(), Some("alice"));
        assert!(loaded.proxy_password.is_none());
    }

    #[test]
    fn test_reads_password_and_legacy_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "os_list": ["Windows", "Linux"],
                "python_versions": ["3.10", "3.11"],
                "include_source": true,
                "use_proxy": true,
                "proxy_server": "proxy.local",
                "proxy_port": 3128,
                "proxy_user": "u",
                "proxy_password": "p",
                "unknown_key": 1
            }"#,
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap().unwrap();
        assert_eq!(settings.proxy_password.as_deref(), Some("p"));
        let proxy = settings.proxy().unwrap().unwrap();
        assert_eq!(proxy.package_manager_arg().unwrap(), "http://u:p@proxy.local:3128");
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(&path).unwrap_err(),
            ConfigError::SettingsInvalid { .. }
        ));
    }

    #[test]
    fn test_overlay_prefers_top() {
        let base = Settings {
            concurrency: Some(4),
            index_url: Some("https://mirror/simple".into()),
            ..Settings::default()
        };
        let top = Settings {
            concurrency: Some(8),
            ..Settings::default()
        };
        let merged = base.overlay(top);
        assert_eq!(merged.concurrency, Some(8));
        assert_eq!(merged.index_url.as_deref(), Some("https://mirror/simple"));
    }

    #[test]
    fn test_proxy_disabled_explicitly() {
        let settings = Settings {
            use_proxy: Some(false),
            proxy_server: Some("proxy".into()),
            ..Settings::default()
        };
        assert!(settings.proxy().unwrap().is_none());
    }

    #[test]
    fn test_proxy_enabled_without_port() {
        let settings = Settings {
            proxy_server: Some("proxy".into()),
            ..Settings::default()
        };
        assert!(matches!(settings.proxy().unwrap_err(), ConfigError::Missing { .. }));
    }

    #[test]
    fn test_to_builder_rejects_unknown_os() {
        let settings = Settings {
            os_list: Some(vec!["beos".into()]),
            ..Settings::default()
        };
        assert!(matches!(
            settings.to_builder().unwrap_err(),
            ConfigError::InvalidPlatform { .. }
        ));
    }
}

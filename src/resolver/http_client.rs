//! Shared HTTP client construction.
//!
//! One client serves both index queries and artifact downloads so they share
//! the configured proxy, timeouts and user-agent.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use crate::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, JobConfig, ProxyConfig};
use crate::user_agent;

use super::ResolveError;

/// Network settings for [`build_http_client`].
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub proxy: Option<ProxyConfig>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

impl HttpClientOptions {
    /// Network settings of a job.
    #[must_use]
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            proxy: config.proxy().cloned(),
        }
    }
}

/// Builds the HTTP client using shared project policy.
///
/// # Errors
///
/// Returns [`ResolveError::ClientUnavailable`] when construction fails.
pub fn build_http_client(options: &HttpClientOptions) -> Result<Client, ResolveError> {
    let explicit_proxy = options
        .proxy
        .as_ref()
        .map(ProxyConfig::to_reqwest)
        .transpose()
        .map_err(|e| ResolveError::client_unavailable("index", e))?;

    match try_build_client(options, explicit_proxy.clone(), false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed macOS environments panic when querying system
            // proxy settings; retry with env-proxy lookup only.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(options, explicit_proxy, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(ResolveError::client_unavailable(
                    "index",
                    "HTTP client construction panicked",
                )),
                Err(BuildClientFailure::Build(error)) => Err(ResolveError::client_unavailable(
                    "index",
                    format!("HTTP client construction failed: {error}"),
                )),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(ResolveError::client_unavailable(
            "index",
            format!("HTTP client construction failed: {error}"),
        )),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    options: &HttpClientOptions,
    explicit_proxy: Option<Proxy>,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(options);
        match explicit_proxy {
            Some(proxy) => builder = builder.proxy(proxy),
            None if disable_system_proxy_lookup => {
                builder = apply_env_proxy_fallback(builder.no_proxy());
            }
            None => {}
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(options: &HttpClientOptions) -> ClientBuilder {
    Client::builder()
        .connect_timeout(options.connect_timeout)
        .read_timeout(options.read_timeout)
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

//! Error types for artifact retrieval.
//!
//! Defines structured errors for fetching and committing artifacts, with
//! context-rich messages for logs and the final report.

use std::path::PathBuf;

use thiserror::Error;

use crate::failure::ErrorKind;

/// Errors that can occur while retrieving an artifact.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The body stream broke off before completion.
    #[error("transfer of {url} interrupted: {reason}")]
    Interrupted {
        /// The URL being downloaded.
        url: String,
        /// What went wrong mid-stream.
        reason: String,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The proxy rejected our credentials (HTTP 407).
    #[error(
        "proxy authentication required downloading {url}\n  Suggestion: check --proxy-user and --proxy-password"
    )]
    ProxyAuthRequired {
        /// The URL being downloaded.
        url: String,
    },

    /// File system error while writing or committing.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An index artifact reached retrieval without an HTTP client.
    #[error("no HTTP client available to download {url}")]
    NoHttpClient {
        /// The URL that could not be fetched.
        url: String,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Downloaded bytes do not match the digest published by the index.
    #[error("sha256 mismatch for {filename}: expected {expected}, got {actual}")]
    Integrity {
        /// Artifact filename.
        filename: String,
        /// Published digest.
        expected: String,
        /// Digest of the received bytes.
        actual: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an interrupted-transfer error.
    pub fn interrupted(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Interrupted {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an HTTP status error; 407 becomes [`DownloadError::ProxyAuthRequired`].
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        if status == 407 {
            return Self::ProxyAuthRequired { url: url.into() };
        }
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a missing-client error.
    pub fn no_http_client(url: impl Into<String>) -> Self {
        Self::NoHttpClient { url: url.into() }
    }

    /// Creates a digest mismatch error.
    pub fn integrity(
        filename: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Integrity {
            filename: filename.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Error category for the report. Local IO is a file system failure;
    /// everything else happened on the wire.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::FileSystem,
            _ => ErrorKind::Network,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://files.example/pkg.whl");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://files.example/pkg.whl"));
        assert_eq!(error.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://files.example/pkg.whl", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
    }

    #[test]
    fn test_http_407_becomes_proxy_auth() {
        let error = DownloadError::http_status("https://files.example/pkg.whl", 407);
        assert!(matches!(error, DownloadError::ProxyAuthRequired { .. }));
        assert!(error.to_string().contains("--proxy-user"));
    }

    #[test]
    fn test_download_error_io_is_file_system() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/pkg.whl"), io_error);
        assert!(error.to_string().contains("/tmp/pkg.whl"));
        assert_eq!(error.kind(), ErrorKind::FileSystem);
    }

    #[test]
    fn test_integrity_display() {
        let error = DownloadError::integrity("pkg-1.0.tar.gz", "aa", "bb");
        let msg = error.to_string();
        assert!(msg.contains("pkg-1.0.tar.gz") && msg.contains("aa") && msg.contains("bb"));
    }
}

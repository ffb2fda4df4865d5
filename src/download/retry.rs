//! Retry policy for network requests.
//!
//! Errors are classified into a [`FailureType`]; the [`RetryPolicy`] decides
//! whether another attempt is worthwhile. Retries happen right away, up to a
//! bounded number of attempts. Both artifact fetches and index queries go
//! through the same policy.
//!
//! # Example
//!
//! ```
//! use wheelfetch_core::download::{DownloadError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::immediate(2);
//! let error = DownloadError::http_status("https://files.example/pkg.whl", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { attempt } => assert_eq!(attempt, 2),
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

use tracing::{debug, instrument};

use super::DownloadError;
use crate::resolver::ResolveError;

/// Classification of request failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: connection reset, timeout, 5xx server errors.
    Transient,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404, digest mismatch, local IO errors.
    Permanent,

    /// Proxy credentials rejected.
    NeedsAuth,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry now.
    Retry {
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Bounded immediate retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,
}

impl RetryPolicy {
    /// Retries right away, up to `max_attempts` total attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "proxy authentication required - retry would not help".to_string(),
                };
            }
            FailureType::Transient => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(attempt, next_attempt = attempt + 1, "will retry");
        RetryDecision::Retry {
            attempt: attempt + 1,
        }
    }
}

/// Classifies a fetch error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout, interrupted stream | Transient |
/// | Network (most) | Transient |
/// | Network (TLS) | Permanent |
/// | HTTP 408, 429, 5xx | Transient |
/// | Other HTTP 4xx | Permanent |
/// | HTTP 407 | NeedsAuth |
/// | IO, invalid URL, missing client, digest mismatch | Permanent |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),
        DownloadError::Timeout { .. } | DownloadError::Interrupted { .. } => FailureType::Transient,
        DownloadError::Network { source, .. } => {
            if is_tls_error(&source.to_string()) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        DownloadError::ProxyAuthRequired { .. } => FailureType::NeedsAuth,
        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::NoHttpClient { .. }
        | DownloadError::Integrity { .. } => FailureType::Permanent,
    }
}

/// Classifies an index query error. Only transport failures are retried;
/// anything the index actually answered is final.
#[must_use]
pub fn classify_resolve_error(error: &ResolveError) -> FailureType {
    match error {
        ResolveError::Network { reason, .. } if !is_tls_error(reason) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Transient, // Request Timeout
        429 => FailureType::Transient, // Too Many Requests
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("certificate")
        || message.contains("tls")
        || message.contains("ssl")
        || message.contains("handshake")
}

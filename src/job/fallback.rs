//! Single-flight source-distribution fallback.
//!
//! When several targets of one package find no wheel, only the first runs the
//! source attempt. The rest wait for it and share its outcome.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use super::report::{ItemOutcome, SkipReason};

/// Per-job table of source fallback attempts, keyed by normalized package name.
#[derive(Debug, Default)]
pub struct FallbackController {
    attempts: DashMap<String, Arc<OnceCell<ItemOutcome>>>,
}

impl FallbackController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `attempt` unless another caller already ran it for `package`.
    ///
    /// The caller that runs the attempt gets its outcome unchanged. Followers
    /// get [`SkipReason::SourceFallbackShared`] when it produced or found a
    /// file, and the identical failure otherwise.
    pub async fn run<F, Fut>(&self, package: &str, attempt: F) -> ItemOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ItemOutcome>,
    {
        let cell = self
            .attempts
            .entry(package.to_string())
            .or_default()
            .clone();

        let mut leader = false;
        let outcome = cell
            .get_or_init(|| {
                leader = true;
                attempt()
            })
            .await
            .clone();

        if leader {
            return outcome;
        }
        debug!(package, "reusing source fallback outcome");
        match outcome {
            ItemOutcome::Success(_) | ItemOutcome::Skipped(_) => {
                ItemOutcome::Skipped(SkipReason::SourceFallbackShared)
            }
            failed @ ItemOutcome::Failed { .. } => failed,
        }
    }

    /// Number of packages that needed a source attempt.
    #[must_use]
    pub fn attempted_packages(&self) -> usize {
        self.attempts.len()
    }
}

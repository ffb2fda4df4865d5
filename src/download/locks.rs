//! Per-filename async locks.
//!
//! Two pairs can resolve to the same file (a universal wheel serves every
//! target). The existence check, transfer and final rename for one filename
//! run under the same lock so the second pair observes the first's result.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by artifact filename.
#[derive(Debug, Clone, Default)]
pub struct FilenameLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FilenameLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and returns the lock guarding `filename`.
    pub async fn acquire(&self, filename: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard is not held across the await.
        let lock = self
            .locks
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of distinct filenames seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_filename_is_serialized() {
        let locks = FilenameLocks::new();
        let guard = locks.acquire("pkg-1.0-py3-none-any.whl").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other.acquire("pkg-1.0-py3-none-any.whl").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish once the lock is released")
            .expect("waiter task panicked");
    }

    #[tokio::test]
    async fn test_different_filenames_do_not_block() {
        let locks = FilenameLocks::new();
        let _a = locks.acquire("a-1.0.tar.gz").await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("b-1.0.tar.gz"))
            .await
            .expect("distinct filename must not wait");
        assert_eq!(locks.len(), 2);
    }
}

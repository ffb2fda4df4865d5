//! Batch orchestration over packages x targets.
//!
//! # Concurrency Model
//!
//! - Each (package, target) pair runs in its own Tokio task
//! - A semaphore permit is acquired, in report order, before each task spawns
//! - With the default concurrency of 1 pairs run strictly one after another
//! - Cancellation stops scheduling; unscheduled pairs report `Skipped(Cancelled)`
//! - In-flight pairs are abandoned on cancellation; dropping them kills any
//!   package manager subprocess and removes partial downloads
//!
//! Results are collected by pair index, so the report order never depends on
//! completion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::fallback::FallbackController;
use super::report::{DownloadResult, ItemOutcome, JobReport, SkipReason};
use super::sink::{JobEvent, ProgressSink};
use super::strategy::{StrategyChoice, select_strategy};
use super::JobError;
use crate::artifact::{ArtifactRef, satisfies};
use crate::config::JobConfig;
use crate::download::{ArtifactFetcher, CommitOutcome};
use crate::failure::ErrorKind;
use crate::package::PackageSpec;
use crate::resolver::{ArtifactForm, Resolver, STAGING_PREFIX};
use crate::target::DownloadTarget;

/// Runs one download job.
#[derive(Debug)]
pub struct JobEngine {
    config: Arc<JobConfig>,
    choice: StrategyChoice,
    cancel: CancellationToken,
}

/// Shared state handed to every pair task.
struct PairContext {
    config: Arc<JobConfig>,
    resolver: Arc<dyn Resolver>,
    fetcher: ArtifactFetcher,
    fallback: FallbackController,
}

impl JobEngine {
    /// Creates an engine, selecting the strategy from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Config`] when no usable strategy exists.
    pub fn new(config: JobConfig) -> Result<Self, JobError> {
        let choice = select_strategy(&config)?;
        Ok(Self::with_strategy(config, choice))
    }

    /// Creates an engine with an already chosen resolver and fetcher.
    #[must_use]
    pub fn with_strategy(config: JobConfig, choice: StrategyChoice) -> Self {
        Self {
            config: Arc::new(config),
            choice,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the job when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn strategy(&self) -> &StrategyChoice {
        &self.choice
    }

    /// Processes every (package, target) pair and returns the ordered report.
    ///
    /// Individual item failures never make this method fail; they are
    /// recorded in the report.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::DestinationUnwritable`] if the destination cannot
    /// be created or written.
    #[instrument(skip_all, fields(dest = %self.config.destination_dir().display()))]
    pub async fn run(&self, sink: Arc<dyn ProgressSink>) -> Result<JobReport, JobError> {
        let dest = self.config.destination_dir();
        ensure_writable(dest)?;

        let packages = self.config.packages();
        let targets = self.config.targets();
        let total = packages.len() * targets.len();
        let effective = self.choice.effective();

        sink.emit(JobEvent::JobStarted {
            total,
            strategy: effective,
        });
        if let Some(reason) = self.choice.downgrade_reason() {
            sink.emit(JobEvent::StrategyDowngraded {
                requested: self.choice.requested(),
                effective,
                reason: reason.to_string(),
            });
        }
        info!(
            packages = packages.len(),
            targets = targets.len(),
            strategy = %effective,
            concurrency = self.config.concurrency(),
            "starting job"
        );

        let context = Arc::new(PairContext {
            config: Arc::clone(&self.config),
            resolver: Arc::clone(self.choice.resolver()),
            fetcher: self.choice.fetcher().clone(),
            fallback: FallbackController::new(),
        });
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));
        let mut slots: Vec<Option<DownloadResult>> = vec![None; total];
        let mut handles = Vec::with_capacity(total);

        let pairs = packages
            .iter()
            .flat_map(|package| targets.iter().map(move |target| (package, *target)));
        for (index, (package, target)) in pairs.enumerate() {
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                let result = DownloadResult {
                    package: package.clone(),
                    target,
                    outcome: ItemOutcome::Skipped(SkipReason::Cancelled),
                };
                sink.emit(JobEvent::ItemFinished(result.clone()));
                slots[index] = Some(result);
                continue;
            };

            let context = Arc::clone(&context);
            let sink = Arc::clone(&sink);
            let cancel = self.cancel.clone();
            let task_package = package.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => ItemOutcome::Skipped(SkipReason::Cancelled),
                    outcome = process_pair(&context, &task_package, target) => outcome,
                };
                let result = DownloadResult {
                    package: task_package,
                    target,
                    outcome,
                };
                sink.emit(JobEvent::ItemFinished(result.clone()));
                result
            });
            handles.push((index, package, target, handle));
        }

        debug!(task_count = handles.len(), "waiting for pairs to complete");
        for (index, package, target, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    // Task panics are recorded against their pair but don't fail the batch
                    warn!(package = %package, target = %target, error = %e, "pair task panicked");
                    let result = DownloadResult {
                        package: package.clone(),
                        target,
                        outcome: ItemOutcome::failed(ErrorKind::ResolutionFailed, &e),
                    };
                    sink.emit(JobEvent::ItemFinished(result.clone()));
                    result
                }
            };
            slots[index] = Some(result);
        }

        let report = JobReport::new(
            slots.into_iter().flatten().collect(),
            effective,
            self.choice.downgrade_reason().is_some(),
        );
        let summary = report.summary();
        info!(%summary, "job complete");
        sink.emit(JobEvent::JobFinished(summary));
        Ok(report)
    }
}

/// Resolves, falls back and commits one pair.
async fn process_pair(
    context: &PairContext,
    package: &PackageSpec,
    target: DownloadTarget,
) -> ItemOutcome {
    let dest = context.config.destination_dir();
    let include_source = context.config.include_source_form();

    if let Some(existing) = find_existing(dest, package, &target) {
        debug!(package = %package, target = %target, file = %existing.display(), "already downloaded");
        return ItemOutcome::Skipped(SkipReason::AlreadyExists);
    }

    match context
        .resolver
        .resolve(package, &ArtifactForm::Wheel(target))
        .await
    {
        Ok(artifact) => commit(&context.fetcher, &artifact, dest).await,
        Err(error) if error.kind() == ErrorKind::NoArtifactFound && include_source => {
            debug!(package = %package, target = %target, "no wheel; trying source distribution");
            context
                .fallback
                .run(package.normalized_name(), || async {
                    match context
                        .resolver
                        .resolve(package, &ArtifactForm::SourceDist)
                        .await
                    {
                        Ok(artifact) => commit(&context.fetcher, &artifact, dest).await,
                        Err(error) => ItemOutcome::failed(error.kind(), &error),
                    }
                })
                .await
        }
        Err(error) => ItemOutcome::failed(error.kind(), &error),
    }
}

async fn commit(fetcher: &ArtifactFetcher, artifact: &ArtifactRef, dest: &Path) -> ItemOutcome {
    match fetcher.commit(artifact, dest).await {
        Ok(CommitOutcome::Committed(path)) => ItemOutcome::Success(path),
        Ok(CommitOutcome::AlreadyExists(_)) => ItemOutcome::Skipped(SkipReason::AlreadyExists),
        Err(error) => ItemOutcome::failed(error.kind(), &error),
    }
}

/// First platform wheel in `dest` that already satisfies the pair, if any.
fn find_existing(dest: &Path, package: &PackageSpec, target: &DownloadTarget) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dest) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dest = %dest.display(), error = %e, "cannot scan destination");
            return None;
        }
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with(STAGING_PREFIX))
        .find(|name| {
            satisfies(
                name,
                package.normalized_name(),
                package.constraint(),
                target,
            )
        })
        .map(|name| dest.join(name))
}

/// Creates `dest` if needed and checks that a file can be written in it.
fn ensure_writable(dest: &Path) -> Result<(), JobError> {
    let unwritable = |source| JobError::DestinationUnwritable {
        path: dest.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dest).map_err(unwritable)?;
    tempfile::tempfile_in(dest).map_err(unwritable)?;
    Ok(())
}

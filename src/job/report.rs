//! Per-item results and the final job report.

use std::fmt;
use std::path::PathBuf;

use crate::config::Strategy;
use crate::failure::ErrorKind;
use crate::package::PackageSpec;
use crate::target::DownloadTarget;

/// Why an item produced no new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// A satisfying file was already in the destination.
    AlreadyExists,
    /// Another target of the same package already ran the shared source fallback.
    SourceFallbackShared,
    /// The job was cancelled before or while this item ran.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyExists => "already exists",
            Self::SourceFallbackShared => "source fallback shared",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Outcome for one (package, target) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A file was written at this path.
    Success(PathBuf),
    Skipped(SkipReason),
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

impl ItemOutcome {
    /// Builds a failure outcome from any error carrying a kind.
    pub fn failed(kind: ErrorKind, error: &impl fmt::Display) -> Self {
        Self::Failed {
            kind,
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(path) => write!(f, "saved {}", path.display()),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed { kind, message } => write!(f, "{kind}: {message}"),
        }
    }
}

/// Result for one (package, target) pair.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub package: PackageSpec,
    pub target: DownloadTarget,
    pub outcome: ItemOutcome,
}

/// Tallies over a job's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Every (package, target) pair in the job.
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl JobSummary {
    fn tally<'a>(outcomes: impl IntoIterator<Item = &'a ItemOutcome>) -> Self {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut summary, outcome| {
                summary.attempted += 1;
                match outcome {
                    ItemOutcome::Success(_) => summary.succeeded += 1,
                    ItemOutcome::Skipped(_) => summary.skipped += 1,
                    ItemOutcome::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted {}, succeeded {}, skipped {}, failed {}",
            self.attempted, self.succeeded, self.skipped, self.failed
        )
    }
}

/// Ordered results of a finished job.
///
/// Results follow package order, then target order, regardless of the order
/// in which items completed.
#[derive(Debug, Clone)]
pub struct JobReport {
    results: Vec<DownloadResult>,
    strategy: Strategy,
    downgraded: bool,
}

impl JobReport {
    pub(crate) fn new(results: Vec<DownloadResult>, strategy: Strategy, downgraded: bool) -> Self {
        Self {
            results,
            strategy,
            downgraded,
        }
    }

    #[must_use]
    pub fn results(&self) -> &[DownloadResult] {
        &self.results
    }

    /// Strategy every resolution in this job used.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// True when the requested index client was replaced by the package manager.
    #[must_use]
    pub fn downgraded(&self) -> bool {
        self.downgraded
    }

    #[must_use]
    pub fn summary(&self) -> JobSummary {
        JobSummary::tally(self.results.iter().map(|r| &r.outcome))
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failure())
    }

    /// Failed results only, in report order.
    pub fn failures(&self) -> impl Iterator<Item = &DownloadResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::target::{Platform, PythonVersion};

    fn result(outcome: ItemOutcome) -> DownloadResult {
        DownloadResult {
            package: PackageSpec::parse("requests").unwrap(),
            target: DownloadTarget::new(Platform::Linux, PythonVersion::new(11)),
            outcome,
        }
    }

    #[test]
    fn test_summary_counts_every_outcome() {
        let report = JobReport::new(
            vec![
                result(ItemOutcome::Success(PathBuf::from("a.whl"))),
                result(ItemOutcome::Skipped(SkipReason::AlreadyExists)),
                result(ItemOutcome::Skipped(SkipReason::Cancelled)),
                result(ItemOutcome::failed(ErrorKind::Network, &"reset")),
            ],
            Strategy::IndexClient,
            false,
        );

        let summary = report.summary();
        assert_eq!(
            summary,
            JobSummary {
                attempted: 4,
                succeeded: 1,
                skipped: 2,
                failed: 1
            }
        );
        assert_eq!(
            summary.to_string(),
            "attempted 4, succeeded 1, skipped 2, failed 1"
        );
        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_empty_report_has_no_failures() {
        let report = JobReport::new(Vec::new(), Strategy::PackageManager, true);
        assert!(!report.has_failures());
        assert!(report.downgraded());
        assert_eq!(report.summary(), JobSummary::default());
    }

    #[test]
    fn test_outcome_display() {
        let failed = ItemOutcome::failed(ErrorKind::NoArtifactFound, &"nothing");
        assert_eq!(failed.to_string(), "NoArtifactFound: nothing");
        assert_eq!(
            ItemOutcome::Skipped(SkipReason::SourceFallbackShared).to_string(),
            "skipped (source fallback shared)"
        );
    }
}

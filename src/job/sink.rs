//! Job progress events and the sinks that consume them.

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::report::{DownloadResult, ItemOutcome, JobSummary};
use crate::config::Strategy;

/// Progress notification emitted while a job runs.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Emitted once, before any item runs.
    JobStarted {
        /// Number of (package, target) pairs.
        total: usize,
        strategy: Strategy,
    },
    /// Emitted at most once, right after `JobStarted`.
    StrategyDowngraded {
        requested: Strategy,
        effective: Strategy,
        reason: String,
    },
    /// One pair reached its final outcome.
    ItemFinished(DownloadResult),
    JobFinished(JobSummary),
}

/// Receiver of job events. Called from worker tasks.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: JobEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.sender.send(event);
    }
}

/// Writes events to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: JobEvent) {
        match event {
            JobEvent::JobStarted { total, strategy } => {
                info!(total, strategy = %strategy, "job started");
            }
            JobEvent::StrategyDowngraded {
                requested,
                effective,
                reason,
            } => {
                warn!(requested = %requested, effective = %effective, reason = %reason, "strategy downgraded");
            }
            JobEvent::ItemFinished(result) => match &result.outcome {
                ItemOutcome::Failed { kind, message } => {
                    warn!(package = %result.package, target = %result.target, kind = %kind, "{message}");
                }
                outcome => {
                    info!(package = %result.package, target = %result.target, "{outcome}");
                }
            },
            JobEvent::JobFinished(summary) => info!(%summary, "job finished"),
        }
    }
}

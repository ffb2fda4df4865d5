//! Progress UI for job runs.
//!
//! Consumes the job's event channel. Every event is logged; when a bar is
//! enabled log lines are printed above it.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use wheelfetch_core::job::{JobEvent, LogSink, ProgressSink};

/// Spawns the event consumer. The task ends when the sender side is dropped.
pub(crate) fn spawn_progress_ui(
    use_bar: bool,
    mut events: UnboundedReceiver<JobEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = use_bar.then(new_bar);
        while let Some(event) = events.recv().await {
            let Some(bar) = &bar else {
                LogSink.emit(event);
                continue;
            };
            match &event {
                JobEvent::JobStarted { total, .. } => {
                    bar.set_length(u64::try_from(*total).unwrap_or(u64::MAX));
                }
                JobEvent::ItemFinished(result) => {
                    bar.inc(1);
                    bar.set_message(format!("{} [{}]", result.package, result.target));
                }
                JobEvent::JobFinished(_) => bar.finish_and_clear(),
                JobEvent::StrategyDowngraded { .. } => {}
            }
            bar.suspend(|| LogSink.emit(event));
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    })
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

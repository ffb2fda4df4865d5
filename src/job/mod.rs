//! Download jobs: every package in the list, for every target in the matrix.
//!
//! # Architecture
//!
//! - [`JobEngine`] - Schedules (package, target) pairs and builds the [`JobReport`]
//! - [`select_strategy`] - Picks the resolver, downgrading to the package manager when needed
//! - [`FallbackController`] - Single-flight source-distribution fallback per package
//! - [`ProgressSink`] - Receives [`JobEvent`]s as the job runs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wheelfetch_core::config::{JobConfig, Strategy};
//! use wheelfetch_core::job::{JobEngine, LogSink};
//! use wheelfetch_core::target::{Platform, PythonVersion};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JobConfig::builder()
//!     .strategy(Strategy::IndexClient)
//!     .platforms([Platform::Linux, Platform::Windows])
//!     .python_versions([PythonVersion::new(11)])
//!     .package_list_path("requirements.txt")
//!     .destination_dir("./wheels")
//!     .build()?;
//! let report = JobEngine::new(config)?.run(Arc::new(LogSink)).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod fallback;
mod report;
mod sink;
mod strategy;

pub use engine::JobEngine;
pub use error::JobError;
pub use fallback::FallbackController;
pub use report::{DownloadResult, ItemOutcome, JobReport, JobSummary, SkipReason};
pub use sink::{ChannelSink, JobEvent, LogSink, ProgressSink};
pub use strategy::{StrategyChoice, select_strategy};

//! Exit code logic for the wheelfetch process.
//!
//! Single responsibility: map a finished job (or a setup error) to the process exit code.

use std::process::ExitCode;

use wheelfetch_core::JobSummary;

/// Process outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every item succeeded or was skipped.
    Success,
    /// The job could not start: bad configuration or unusable destination.
    SetupFailure,
    /// The job ran but at least one item failed.
    ItemsFailed,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::SetupFailure => 1,
            Self::ItemsFailed => 2,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Determines the process exit outcome from a finished job's summary.
pub(crate) fn determine_exit_outcome(summary: &JobSummary) -> ProcessExit {
    if summary.failed == 0 {
        ProcessExit::Success
    } else {
        ProcessExit::ItemsFailed
    }
}

//! Exit code logic for the multiloader process.
//!
//! Single responsibility: map transfer outcomes to the process exit outcome.

use multiloader_core::TransferOutcome;

use crate::ProcessExit;

/// Tallies of one finished batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutcomeCounts {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub rejected: usize,
}

impl OutcomeCounts {
    pub(crate) fn tally<'a>(outcomes: impl IntoIterator<Item = &'a TransferOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome {
                TransferOutcome::Completed { .. } => counts.completed += 1,
                TransferOutcome::Skipped => counts.skipped += 1,
                TransferOutcome::Failed { .. } => counts.failed += 1,
                TransferOutcome::Cancelled => counts.cancelled += 1,
                TransferOutcome::Rejected => counts.rejected += 1,
            }
        }
        counts
    }

    fn unsuccessful(self) -> usize {
        self.failed + self.cancelled + self.rejected
    }

    fn successful(self) -> usize {
        self.completed + self.skipped
    }
}

/// Determines the process exit outcome from a batch's tallies.
pub(crate) fn determine_exit_outcome(counts: OutcomeCounts, interrupted: bool) -> ProcessExit {
    if interrupted {
        ProcessExit::Failure
    } else if counts.unsuccessful() == 0 {
        ProcessExit::Success
    } else if counts.successful() > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

//! Progress notifications from a pipeline run

use std::fmt;

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Stack was created in this run
    Created,
    /// Stack was already complete, its outputs were reused
    Skipped,
    /// Stack was deleted in this run
    Deleted,
    /// Nothing to delete
    AlreadyAbsent,
    /// The step failed with this message
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Created => f.write_str("created"),
            StepOutcome::Skipped => f.write_str("already complete"),
            StepOutcome::Deleted => f.write_str("deleted"),
            StepOutcome::AlreadyAbsent => f.write_str("already absent"),
            StepOutcome::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Receives one notification per step as a pipeline runs
pub trait ProgressObserver: Send {
    /// Total number of steps the run will visit
    fn begin(&mut self, _cluster: &str, _steps: usize) {}

    /// A step is about to touch its stack
    fn step_started(&mut self, _step: &str, _stack: &str) {}

    /// A step finished, successfully or not
    fn step_finished(&mut self, step: &str, stack: &str, outcome: &StepOutcome);

    /// The run is over
    fn finish(&mut self) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn step_finished(&mut self, _step: &str, _stack: &str, _outcome: &StepOutcome) {}
}

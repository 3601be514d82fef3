//! Prefetch job state machine and reports.

use std::fmt;

use geoshield_core::AppError;
use uuid::Uuid;

/// Lifecycle of the most recent prefetch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl JobState {
    /// True if the job has stopped, one way or the other.
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled)
    }

    /// State after the worker loop exits.
    pub fn on_exit(self, cancelled: bool) -> Self {
        match self {
            JobState::Running if cancelled => JobState::Cancelled,
            JobState::Running => JobState::Completed,
            other => other,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Returned by `start` as soon as the job is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchAck {
    pub job_id: Uuid,
    pub sample_size: usize,
}

/// Outcome of a job that has been joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchReport {
    pub job_id: Uuid,
    pub state: JobState,
    pub sampled: usize,
    pub attempted: usize,
    pub failed: usize,
}

impl PrefetchReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrefetchError {
    #[error("Failed to list location groups: {0}")]
    Source(anyhow::Error),
}

impl From<PrefetchError> for AppError {
    fn from(err: PrefetchError) -> Self {
        match err {
            PrefetchError::Source(e) => AppError::Other(e),
        }
    }
}

//! Queue items and their lifecycle.
//!
//! `waiting -> processing -> completed | error`, and `error -> waiting` on an
//! explicit retry. Jobs are owned by the [`Scheduler`](crate::Scheduler);
//! everything outside it sees clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vf_core::{JobId, Preset, ResultSource};

use crate::artifact::{Artifact, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Completed and error jobs are history; only they are persisted.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One source file, one preset, N requested copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub source: SourceFile,
    pub preset: Preset,
    pub copies: u32,
    /// Which mode enqueued the job; its results are tagged with it.
    pub mode: ResultSource,
    pub status: JobStatus,
    /// 0..=100, advanced once per finished copy.
    pub progress: u8,
    pub error: Option<String>,
    /// Set only when the job completed; `None` otherwise.
    pub results: Option<Vec<Artifact>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(source: SourceFile, preset: Preset, copies: u32, mode: ResultSource) -> Self {
        Self {
            id: JobId::new(),
            source,
            preset,
            copies,
            mode,
            status: JobStatus::Waiting,
            progress: 0,
            error: None,
            results: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub(crate) fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.progress = 0;
        self.error = None;
        self.results = None;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
    }

    pub(crate) fn complete(&mut self, artifacts: Vec<Artifact>) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.error = None;
        self.results = Some(artifacts);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.status = JobStatus::Error;
        self.error = Some(message);
        self.results = None;
        self.finished_at = Some(Utc::now());
    }

    /// Back to `waiting` with no trace of the failed attempt.
    pub(crate) fn reset(&mut self) {
        self.status = JobStatus::Waiting;
        self.progress = 0;
        self.error = None;
        self.results = None;
        self.started_at = None;
        self.finished_at = None;
    }
}

/// `round(done / total * 100)`.
pub fn copy_progress(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::domain::ProgramSummary;

/// Identifier handed back to callers when an enrollment run is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// First eight characters, used to keep artifact names unique per job.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle stage of an enrollment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStage {
    pub const fn label(self) -> &'static str {
        match self {
            JobStage::Pending => "pending",
            JobStage::Processing => "processing",
            JobStage::Completed => "completed",
            JobStage::Error => "error",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Error)
    }

    /// Every job passes through processing before it may end in either terminal stage.
    pub const fn can_transition_to(self, next: JobStage) -> bool {
        match self {
            JobStage::Pending => matches!(next, JobStage::Processing),
            JobStage::Processing => !matches!(next, JobStage::Pending),
            JobStage::Completed | JobStage::Error => false,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status record polled by clients while a run is in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub stage: JobStage,
    pub progress: u8,
    pub message: String,
    /// Download location of the rendered report, set once the job completes.
    pub result_location: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<ProgramSummary>>,
}

impl JobRecord {
    fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            stage: JobStage::Pending,
            progress: 0,
            message: "waiting for calculation to start".to_string(),
            result_location: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            summary: None,
        }
    }

    fn apply(&mut self, update: JobUpdate) -> UpdateOutcome {
        let next = update.stage.unwrap_or(self.stage);
        if self.stage.is_terminal() {
            return UpdateOutcome::Terminal;
        }
        if next != self.stage && !self.stage.can_transition_to(next) {
            return UpdateOutcome::Regression;
        }

        self.stage = next;
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if next == JobStage::Completed {
            self.result_location = update.result_location.or(self.result_location.take());
            self.summary = update.summary.or(self.summary.take());
            self.completed_at = Some(Utc::now());
        }
        if next == JobStage::Error {
            self.error = update.error.or(self.error.take());
        }

        UpdateOutcome::Applied
    }
}

/// Partial update merged into an existing record; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub stage: Option<JobStage>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result_location: Option<String>,
    pub error: Option<String>,
    pub summary: Option<Vec<ProgramSummary>>,
}

impl JobUpdate {
    pub fn stage(stage: JobStage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::default()
        }
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn result_location(mut self, result_location: impl Into<String>) -> Self {
        self.result_location = Some(result_location.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn summary(mut self, summary: Vec<ProgramSummary>) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// What happened to an update handed to [`JobStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    UnknownJob,
    /// The record already reached a terminal stage.
    Terminal,
    /// The update would move the stage backwards.
    Regression,
}

/// Shared registry of job status records.
pub trait JobStore: Send + Sync {
    fn create(&self) -> JobId;
    fn update(&self, job_id: &JobId, update: JobUpdate) -> UpdateOutcome;
    fn get(&self, job_id: &JobId) -> Option<JobRecord>;
    fn delete(&self, job_id: &JobId) -> bool;
}

/// Process-lifetime job registry behind a single lock.
#[derive(Debug, Default, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<Mutex<HashMap<JobId, JobRecord>>>,
}

impl InMemoryJobStore {
    pub fn len(&self) -> usize {
        self.jobs.lock().expect("job store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self) -> JobId {
        let job_id = JobId::generate();
        let mut guard = self.jobs.lock().expect("job store mutex poisoned");
        guard.insert(job_id.clone(), JobRecord::pending(job_id.clone()));
        job_id
    }

    fn update(&self, job_id: &JobId, update: JobUpdate) -> UpdateOutcome {
        let mut guard = self.jobs.lock().expect("job store mutex poisoned");
        let outcome = match guard.get_mut(job_id) {
            Some(record) => record.apply(update),
            None => UpdateOutcome::UnknownJob,
        };
        if outcome != UpdateOutcome::Applied {
            debug!(%job_id, ?outcome, "job update ignored");
        }
        outcome
    }

    fn get(&self, job_id: &JobId) -> Option<JobRecord> {
        let guard = self.jobs.lock().expect("job store mutex poisoned");
        guard.get(job_id).cloned()
    }

    fn delete(&self, job_id: &JobId) -> bool {
        let mut guard = self.jobs.lock().expect("job store mutex poisoned");
        guard.remove(job_id).is_some()
    }
}

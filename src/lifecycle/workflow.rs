use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::ApplicationId;

/// Identifier wrapper for workflow runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

/// Outcome of a processing attempt. `Running` only while the run is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            RunOutcome::Running => "running",
            RunOutcome::Completed => "completed",
            RunOutcome::Failed => "failed",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

/// Terminal outcomes a caller may close a run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCompletion {
    Completed,
    Failed,
    Cancelled,
}

impl From<RunCompletion> for RunOutcome {
    fn from(completion: RunCompletion) -> Self {
        match completion {
            RunCompletion::Completed => RunOutcome::Completed,
            RunCompletion::Failed => RunOutcome::Failed,
            RunCompletion::Cancelled => RunOutcome::Cancelled,
        }
    }
}

/// Whether a close call changed anything. A repeated close with the same
/// outcome is tolerated for at-least-once callers and must not produce a
/// second audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    Closed,
    AlreadyClosed,
}

/// One execution pass of the processing pipeline for an application. Created
/// when processing begins, closed exactly once, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub application_id: ApplicationId,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub documents_processed: u32,
    pub errors_count: u32,
    pub warnings_count: u32,
    pub metadata: BTreeMap<String, Value>,
}

impl WorkflowRun {
    pub fn begin(id: RunId, application_id: ApplicationId, now: DateTime<Utc>) -> Self {
        WorkflowRun {
            id,
            application_id,
            outcome: RunOutcome::Running,
            started_at: now,
            finished_at: None,
            duration_seconds: None,
            documents_processed: 0,
            errors_count: 0,
            warnings_count: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }

    pub fn record_document(&mut self, succeeded: bool) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        self.documents_processed += 1;
        if !succeeded {
            self.errors_count += 1;
        }
        Ok(())
    }

    pub fn record_warning(&mut self) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        self.warnings_count += 1;
        Ok(())
    }

    /// Close the run, computing the whole-second duration. Closing an
    /// already-closed run with the same outcome is a no-op; any other repeat
    /// close is an error.
    pub fn close(
        &mut self,
        completion: RunCompletion,
        now: DateTime<Utc>,
    ) -> Result<CloseDisposition, WorkflowError> {
        let outcome = RunOutcome::from(completion);
        if self.finished_at.is_some() {
            if self.outcome == outcome {
                return Ok(CloseDisposition::AlreadyClosed);
            }
            return Err(WorkflowError::RunAlreadyClosed {
                run_id: self.id.clone(),
            });
        }
        self.outcome = outcome;
        self.finished_at = Some(now);
        self.duration_seconds = Some((now - self.started_at).num_seconds());
        Ok(CloseDisposition::Closed)
    }

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(WorkflowError::RunAlreadyClosed {
                run_id: self.id.clone(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("an unclosed workflow run already exists for application {application_id:?}")]
    RunAlreadyActive { application_id: ApplicationId },
    #[error("workflow run {run_id:?} is already closed")]
    RunAlreadyClosed { run_id: RunId },
}

use chrono::{DateTime, Utc};

use super::assessment::AssessmentResult;
use super::audit::{AuditRecord, TrackedTable};
use super::domain::{
    Actor, Applicant, ApplicantId, Application, ApplicationId, ApplicationNumber,
};
use super::history::StatusTransition;
use super::workflow::{RunId, WorkflowRun};

/// Durability-layer failure. Always surfaced to the caller; a lost audit row
/// is a correctness violation, not a retryable nuisance.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[source] serde_json::Error),
}

/// Storage abstraction for the lifecycle engine.
///
/// The `commit_*` methods are composite write units: every row they carry,
/// including the audit records, becomes visible atomically or not at all.
/// `allocate_application` is the single cross-application serialization
/// point; it reserves the id and the year-scoped number under one atomic
/// increment so concurrent creations can never collide.
pub trait LifecycleStore: Send + Sync {
    fn allocate_applicant_id(&self) -> Result<ApplicantId, StorageError>;

    fn allocate_application(
        &self,
        year: i32,
    ) -> Result<(ApplicationId, ApplicationNumber), StorageError>;

    fn allocate_run_id(&self) -> Result<RunId, StorageError>;

    fn insert_applicant(
        &self,
        applicant: Applicant,
        audit: AuditRecord,
    ) -> Result<(), StorageError>;

    fn commit_creation(
        &self,
        application: Application,
        transition: StatusTransition,
        audit: AuditRecord,
    ) -> Result<(), StorageError>;

    fn commit_transition(
        &self,
        application: Application,
        transition: StatusTransition,
        closed_run: Option<WorkflowRun>,
        audits: Vec<AuditRecord>,
    ) -> Result<(), StorageError>;

    fn commit_assessment(
        &self,
        application: Application,
        results: Vec<AssessmentResult>,
        audits: Vec<AuditRecord>,
    ) -> Result<(), StorageError>;

    fn commit_application_update(
        &self,
        application: Application,
        audit: AuditRecord,
    ) -> Result<(), StorageError>;

    fn insert_run(&self, run: WorkflowRun, audit: AuditRecord) -> Result<(), StorageError>;

    /// Persist a mutated run. `audit` is absent only for the idempotent
    /// re-close case, which must not add a ledger row.
    fn update_run(&self, run: WorkflowRun, audit: Option<AuditRecord>)
        -> Result<(), StorageError>;

    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, StorageError>;

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, StorageError>;

    fn application_by_number(
        &self,
        number: &ApplicationNumber,
    ) -> Result<Option<Application>, StorageError>;

    fn status_history(&self, id: &ApplicationId) -> Result<Vec<StatusTransition>, StorageError>;

    fn runs(&self, id: &ApplicationId) -> Result<Vec<WorkflowRun>, StorageError>;

    fn active_run(&self, id: &ApplicationId) -> Result<Option<WorkflowRun>, StorageError>;

    fn run(&self, run_id: &RunId) -> Result<Option<WorkflowRun>, StorageError>;

    fn assessments(&self, id: &ApplicationId) -> Result<Vec<AssessmentResult>, StorageError>;

    /// All audit records for one (table, record id), in timestamp order.
    /// Served from an index, never by scanning unrelated tables.
    fn audit_trail(
        &self,
        table: TrackedTable,
        record_id: &str,
    ) -> Result<Vec<AuditRecord>, StorageError>;

    /// All audit records written by one actor within a time range, also
    /// index-served.
    fn audit_by_actor(
        &self,
        actor: &Actor,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, StorageError>;
}

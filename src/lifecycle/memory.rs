use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::assessment::AssessmentResult;
use super::audit::{AuditRecord, TrackedTable};
use super::domain::{
    Actor, Applicant, ApplicantId, Application, ApplicationId, ApplicationNumber,
};
use super::history::StatusTransition;
use super::store::{LifecycleStore, StorageError};
use super::workflow::{RunId, WorkflowRun};

#[derive(Default)]
struct Inner {
    applicant_seq: u64,
    application_seq: u64,
    run_seq: u64,
    /// Per-year counters backing the application number sequence.
    year_counters: HashMap<i32, u64>,
    applicants: HashMap<ApplicantId, Applicant>,
    /// National id uniqueness index; one applicant row per national id.
    national_ids: HashMap<String, ApplicantId>,
    applications: HashMap<ApplicationId, Application>,
    numbers: HashMap<ApplicationNumber, ApplicationId>,
    transitions: HashMap<ApplicationId, Vec<StatusTransition>>,
    runs: HashMap<RunId, WorkflowRun>,
    runs_by_application: HashMap<ApplicationId, Vec<RunId>>,
    assessments: HashMap<ApplicationId, Vec<AssessmentResult>>,
    audit: Vec<AuditRecord>,
    audit_by_record: HashMap<(TrackedTable, String), Vec<usize>>,
    audit_by_actor: HashMap<String, Vec<usize>>,
}

impl Inner {
    fn append_audit(&mut self, record: AuditRecord) {
        let index = self.audit.len();
        self.audit_by_record
            .entry((record.table, record.record_id.clone()))
            .or_default()
            .push(index);
        self.audit_by_actor
            .entry(record.actor.0.clone())
            .or_default()
            .push(index);
        self.audit.push(record);
    }

    fn append_transition(&mut self, mut transition: StatusTransition) {
        let history = self
            .transitions
            .entry(transition.application_id.clone())
            .or_default();
        transition.sequence = history.len() as u64;
        history.push(transition);
    }
}

/// In-memory store. A single mutex over the whole state makes every
/// composite commit atomic and keeps number allocation race-free, matching
/// the transactional guarantees a database-backed store would give.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LifecycleStore for InMemoryStore {
    fn allocate_applicant_id(&self) -> Result<ApplicantId, StorageError> {
        let mut inner = self.lock();
        inner.applicant_seq += 1;
        Ok(ApplicantId(format!("apl-{:06}", inner.applicant_seq)))
    }

    fn allocate_application(
        &self,
        year: i32,
    ) -> Result<(ApplicationId, ApplicationNumber), StorageError> {
        let mut inner = self.lock();
        inner.application_seq += 1;
        let id = ApplicationId(format!("app-{:08}", inner.application_seq));
        let counter = inner.year_counters.entry(year).or_insert(0);
        *counter += 1;
        let number = ApplicationNumber::format(year, *counter);
        Ok((id, number))
    }

    fn allocate_run_id(&self) -> Result<RunId, StorageError> {
        let mut inner = self.lock();
        inner.run_seq += 1;
        Ok(RunId(format!("run-{:06}", inner.run_seq)))
    }

    fn insert_applicant(
        &self,
        applicant: Applicant,
        audit: AuditRecord,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.applicants.contains_key(&applicant.id)
            || inner.national_ids.contains_key(&applicant.national_id)
        {
            return Err(StorageError::Conflict);
        }
        inner
            .national_ids
            .insert(applicant.national_id.clone(), applicant.id.clone());
        inner.applicants.insert(applicant.id.clone(), applicant);
        inner.append_audit(audit);
        Ok(())
    }

    fn commit_creation(
        &self,
        application: Application,
        transition: StatusTransition,
        audit: AuditRecord,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.applications.contains_key(&application.id)
            || inner.numbers.contains_key(&application.number)
        {
            return Err(StorageError::Conflict);
        }
        inner
            .numbers
            .insert(application.number.clone(), application.id.clone());
        inner
            .applications
            .insert(application.id.clone(), application);
        inner.append_transition(transition);
        inner.append_audit(audit);
        Ok(())
    }

    fn commit_transition(
        &self,
        application: Application,
        transition: StatusTransition,
        closed_run: Option<WorkflowRun>,
        audits: Vec<AuditRecord>,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if !inner.applications.contains_key(&application.id) {
            return Err(StorageError::NotFound);
        }
        inner
            .applications
            .insert(application.id.clone(), application);
        inner.append_transition(transition);
        if let Some(run) = closed_run {
            inner.runs.insert(run.id.clone(), run);
        }
        for audit in audits {
            inner.append_audit(audit);
        }
        Ok(())
    }

    fn commit_assessment(
        &self,
        application: Application,
        results: Vec<AssessmentResult>,
        audits: Vec<AuditRecord>,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if !inner.applications.contains_key(&application.id) {
            return Err(StorageError::NotFound);
        }
        let id = application.id.clone();
        inner.applications.insert(id.clone(), application);
        inner.assessments.entry(id).or_default().extend(results);
        for audit in audits {
            inner.append_audit(audit);
        }
        Ok(())
    }

    fn commit_application_update(
        &self,
        application: Application,
        audit: AuditRecord,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if !inner.applications.contains_key(&application.id) {
            return Err(StorageError::NotFound);
        }
        inner
            .applications
            .insert(application.id.clone(), application);
        inner.append_audit(audit);
        Ok(())
    }

    fn insert_run(&self, run: WorkflowRun, audit: AuditRecord) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.runs.contains_key(&run.id) {
            return Err(StorageError::Conflict);
        }
        inner
            .runs_by_application
            .entry(run.application_id.clone())
            .or_default()
            .push(run.id.clone());
        inner.runs.insert(run.id.clone(), run);
        inner.append_audit(audit);
        Ok(())
    }

    fn update_run(
        &self,
        run: WorkflowRun,
        audit: Option<AuditRecord>,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if !inner.runs.contains_key(&run.id) {
            return Err(StorageError::NotFound);
        }
        inner.runs.insert(run.id.clone(), run);
        if let Some(audit) = audit {
            inner.append_audit(audit);
        }
        Ok(())
    }

    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, StorageError> {
        Ok(self.lock().applicants.get(id).cloned())
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, StorageError> {
        Ok(self.lock().applications.get(id).cloned())
    }

    fn application_by_number(
        &self,
        number: &ApplicationNumber,
    ) -> Result<Option<Application>, StorageError> {
        let inner = self.lock();
        Ok(inner
            .numbers
            .get(number)
            .and_then(|id| inner.applications.get(id))
            .cloned())
    }

    fn status_history(&self, id: &ApplicationId) -> Result<Vec<StatusTransition>, StorageError> {
        Ok(self.lock().transitions.get(id).cloned().unwrap_or_default())
    }

    fn runs(&self, id: &ApplicationId) -> Result<Vec<WorkflowRun>, StorageError> {
        let inner = self.lock();
        Ok(inner
            .runs_by_application
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|run_id| inner.runs.get(run_id))
            .cloned()
            .collect())
    }

    fn active_run(&self, id: &ApplicationId) -> Result<Option<WorkflowRun>, StorageError> {
        let inner = self.lock();
        Ok(inner
            .runs_by_application
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|run_id| inner.runs.get(run_id))
            .find(|run| run.is_open())
            .cloned())
    }

    fn run(&self, run_id: &RunId) -> Result<Option<WorkflowRun>, StorageError> {
        Ok(self.lock().runs.get(run_id).cloned())
    }

    fn assessments(&self, id: &ApplicationId) -> Result<Vec<AssessmentResult>, StorageError> {
        Ok(self.lock().assessments.get(id).cloned().unwrap_or_default())
    }

    fn audit_trail(
        &self,
        table: TrackedTable,
        record_id: &str,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        let inner = self.lock();
        let mut records: Vec<AuditRecord> = inner
            .audit_by_record
            .get(&(table, record_id.to_string()))
            .into_iter()
            .flatten()
            .map(|index| inner.audit[*index].clone())
            .collect();
        records.sort_by_key(|record| record.recorded_at);
        Ok(records)
    }

    fn audit_by_actor(
        &self,
        actor: &Actor,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        let inner = self.lock();
        let mut records: Vec<AuditRecord> = inner
            .audit_by_actor
            .get(&actor.0)
            .into_iter()
            .flatten()
            .map(|index| inner.audit[*index].clone())
            .filter(|record| record.recorded_at >= from && record.recorded_at <= to)
            .collect();
        records.sort_by_key(|record| record.recorded_at);
        Ok(records)
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use tracing::info;

use super::assessment::{
    AssessmentAggregator, AssessmentError, AssessmentKind, AssessmentOutcome, Dimension,
    DimensionScore,
};
use super::audit::{AuditRecord, TrackedTable};
use super::domain::{
    Actor, Applicant, ApplicantId, Application, ApplicationId, ApplicationNumber,
    ApplicationDraft, ApplicationStatus, DocumentProcessingStatus, ExtractedDocument,
    FinancialSnapshot, NewApplicant, TransitionError, ValidationError,
};
use super::history::StatusTransition;
use super::store::{LifecycleStore, StorageError};
use super::workflow::{CloseDisposition, RunCompletion, RunId, WorkflowError, WorkflowRun};

/// Error raised by the lifecycle service. Variants mirror the failure
/// taxonomy callers are expected to branch on; HTTP translation happens in
/// the router, not here.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error("applicant not found")]
    ApplicantNotFound,
    #[error("application not found")]
    ApplicationNotFound,
    #[error("workflow run not found")]
    RunNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The application state machine. Owns the transition graph, drives the
/// aggregator, run tracker, status history, and audit ledger, and serializes
/// all mutation per application id. Reads never take the per-application
/// gate.
pub struct ApplicationService<S> {
    store: Arc<S>,
    aggregator: AssessmentAggregator,
    /// One lock per application id, created on first use and never pruned:
    /// removing an entry while another thread still waits on its clone would
    /// let two mutations interleave. The map grows with the number of
    /// distinct applications touched by this process; a long-lived
    /// deployment over a database-backed store should move this
    /// serialization into the store instead.
    gates: Mutex<HashMap<ApplicationId, Arc<Mutex<()>>>>,
}

impl<S> ApplicationService<S>
where
    S: LifecycleStore + 'static,
{
    pub fn new(store: Arc<S>, aggregator: AssessmentAggregator) -> Self {
        ApplicationService {
            store,
            aggregator,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Exclusive section for one application id. At most one in-flight
    /// transition, assessment pass, or run mutation per application.
    fn gate(&self, id: &ApplicationId) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(id.clone()).or_default().clone()
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Application, LifecycleError> {
        self.store
            .application(id)?
            .ok_or(LifecycleError::ApplicationNotFound)
    }

    /// Register a new applicant identity.
    pub fn register_applicant(&self, new: NewApplicant) -> Result<Applicant, LifecycleError> {
        let now = Utc::now();
        new.validate(now.date_naive())?;
        let id = self.store.allocate_applicant_id()?;
        let applicant = new.into_applicant(id, now);
        let audit = AuditRecord::created(
            TrackedTable::Applicants,
            applicant.id.0.clone(),
            &applicant,
            Actor::system(),
            now,
        )?;
        self.store.insert_applicant(applicant.clone(), audit)?;
        Ok(applicant)
    }

    /// Open a draft application: allocate the year-scoped number, start in
    /// `Draft`, and write the initial `None -> draft` transition as the
    /// system actor.
    pub fn create_application(
        &self,
        applicant_id: &ApplicantId,
        draft: ApplicationDraft,
    ) -> Result<Application, LifecycleError> {
        draft.validate()?;
        self.store
            .applicant(applicant_id)?
            .ok_or(LifecycleError::ApplicantNotFound)?;

        let now = Utc::now();
        let (id, number) = self.store.allocate_application(now.year())?;
        let application = Application::open(id, number, applicant_id.clone(), draft, now);

        let transition = StatusTransition::new(
            application.id.clone(),
            None,
            ApplicationStatus::Draft,
            Actor::system(),
            "application created",
            now,
        );
        let audit = AuditRecord::created(
            TrackedTable::Applications,
            application.id.0.clone(),
            &application,
            Actor::system(),
            now,
        )?;
        self.store
            .commit_creation(application.clone(), transition, audit)?;
        info!(number = %application.number.0, "application created");
        Ok(application)
    }

    /// Move an application along one edge of the transition graph. Status
    /// update, milestone timestamp, status history row, and audit record
    /// commit as one atomic unit; approving or rejecting also closes the
    /// active workflow run.
    pub fn transition(
        &self,
        id: &ApplicationId,
        target: ApplicationStatus,
        actor: Actor,
        reason: impl Into<String>,
    ) -> Result<Application, LifecycleError> {
        let reason = reason.into();
        let gate = self.gate(id);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let before = self.fetch(id)?;
        if before.status.is_terminal() {
            return Err(TransitionError::TerminalStateViolation {
                status: before.status,
            }
            .into());
        }
        if !before.status.allows_transition_to(target) {
            return Err(TransitionError::InvalidTransition {
                from: before.status,
                to: target,
            }
            .into());
        }

        let now = Utc::now();
        let mut after = before.clone();
        after.apply_status(target, now);
        match target {
            ApplicationStatus::Approved => {
                after.approved_amount = Some(after.requested_amount);
                after.approved_duration_months = Some(after.support_duration_months);
            }
            ApplicationStatus::Rejected => {
                after.rejection_reason = Some(reason.clone());
            }
            _ => {}
        }

        let transition = StatusTransition::new(
            id.clone(),
            Some(before.status),
            target,
            actor.clone(),
            reason,
            now,
        );
        let mut audits = vec![AuditRecord::updated(
            TrackedTable::Applications,
            id.0.clone(),
            &before,
            &after,
            actor.clone(),
            now,
        )?];

        // A decision ends the processing attempt that produced it.
        let closed_run = if matches!(
            target,
            ApplicationStatus::Approved | ApplicationStatus::Rejected
        ) {
            match self.store.active_run(id)? {
                Some(mut run) => {
                    let run_before = run.clone();
                    run.close(RunCompletion::Completed, now)?;
                    audits.push(AuditRecord::updated(
                        TrackedTable::WorkflowRuns,
                        run.id.0.clone(),
                        &run_before,
                        &run,
                        actor.clone(),
                        now,
                    )?);
                    Some(run)
                }
                None => None,
            }
        } else {
            None
        };

        self.store
            .commit_transition(after.clone(), transition, closed_run, audits)?;
        info!(
            number = %after.number.0,
            from = before.status.label(),
            to = target.label(),
            actor = %actor.0,
            "status transition"
        );
        Ok(after)
    }

    /// Submit one full set of dimension scores. Writes one result row per
    /// dimension plus the comprehensive row and refreshes the application's
    /// assessment summary; all-or-nothing, and advisory only — status is
    /// untouched until a separate `transition` call commits the decision.
    pub fn submit_assessment(
        &self,
        id: &ApplicationId,
        scores: BTreeMap<Dimension, DimensionScore>,
    ) -> Result<AssessmentOutcome, LifecycleError> {
        let gate = self.gate(id);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let before = self.fetch(id)?;
        let now = Utc::now();
        let outcome = self.aggregator.aggregate(id, &scores, now)?;
        // Rows per pass is fixed, so the stored row count gives the pass
        // number and keeps ledger record ids distinct across passes.
        let rows_per_pass = Dimension::ALL.len() + 1;
        let pass = self.store.assessments(id)?.len() / rows_per_pass + 1;

        let mut after = before.clone();
        after.assessment_score = Some(outcome.comprehensive_score);
        after.assessment_decision = Some(outcome.decision.label().to_string());
        after.human_review_required = outcome.human_review_required;
        after.updated_at = now;

        let mut audits = vec![AuditRecord::updated(
            TrackedTable::Applications,
            id.0.clone(),
            &before,
            &after,
            Actor::system(),
            now,
        )?];
        for result in &outcome.results {
            audits.push(AuditRecord::created(
                TrackedTable::AssessmentResults,
                assessment_record_id(id, pass, result.kind),
                result,
                Actor::system(),
                now,
            )?);
        }

        self.store
            .commit_assessment(after, outcome.results.clone(), audits)?;
        info!(
            number = %before.number.0,
            score = outcome.comprehensive_score,
            decision = outcome.decision.label(),
            "assessment recorded"
        );
        Ok(outcome)
    }

    /// Replace the application's financial snapshot. Net worth is never
    /// stored; it derives from these fields on read.
    pub fn update_financials(
        &self,
        id: &ApplicationId,
        snapshot: FinancialSnapshot,
        actor: Actor,
    ) -> Result<Application, LifecycleError> {
        snapshot.validate()?;
        let gate = self.gate(id);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let before = self.fetch(id)?;
        let now = Utc::now();
        let mut after = before.clone();
        after.financials = Some(snapshot);
        after.updated_at = now;

        let audit = AuditRecord::updated(
            TrackedTable::Applications,
            id.0.clone(),
            &before,
            &after,
            actor,
            now,
        )?;
        self.store.commit_application_update(after.clone(), audit)?;
        Ok(after)
    }

    /// Begin a processing attempt. At most one open run per application.
    pub fn start_run(&self, id: &ApplicationId) -> Result<WorkflowRun, LifecycleError> {
        let gate = self.gate(id);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        self.fetch(id)?;
        if self.store.active_run(id)?.is_some() {
            return Err(WorkflowError::RunAlreadyActive {
                application_id: id.clone(),
            }
            .into());
        }

        let now = Utc::now();
        let run_id = self.store.allocate_run_id()?;
        let run = WorkflowRun::begin(run_id, id.clone(), now);
        let audit = AuditRecord::created(
            TrackedTable::WorkflowRuns,
            run.id.0.clone(),
            &run,
            Actor::system(),
            now,
        )?;
        self.store.insert_run(run.clone(), audit)?;
        info!(run = %run.id.0, "workflow run started");
        Ok(run)
    }

    /// Account for one processed document on an open run.
    pub fn record_document(
        &self,
        run_id: &RunId,
        succeeded: bool,
    ) -> Result<WorkflowRun, LifecycleError> {
        self.mutate_run(run_id, |run| run.record_document(succeeded))
    }

    /// Feed the run tracker from the extraction collaborator's boundary
    /// record. The confidence score is validated but otherwise opaque here.
    pub fn record_extracted(
        &self,
        run_id: &RunId,
        document: &ExtractedDocument,
    ) -> Result<WorkflowRun, LifecycleError> {
        if !(0.0..=1.0).contains(&document.confidence_score)
            || !document.confidence_score.is_finite()
        {
            return Err(ValidationError::ConfidenceOutOfRange {
                score: document.confidence_score,
            }
            .into());
        }
        let succeeded = document.processing_status == DocumentProcessingStatus::Processed;
        self.record_document(run_id, succeeded)
    }

    pub fn record_warning(&self, run_id: &RunId) -> Result<WorkflowRun, LifecycleError> {
        self.mutate_run(run_id, |run| run.record_warning())
    }

    /// Close a run with a terminal outcome. A repeated close with the same
    /// outcome returns the stored run unchanged and writes nothing.
    pub fn close_run(
        &self,
        run_id: &RunId,
        completion: RunCompletion,
    ) -> Result<WorkflowRun, LifecycleError> {
        let application_id = self.run_application(run_id)?;
        let gate = self.gate(&application_id);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let before = self
            .store
            .run(run_id)?
            .ok_or(LifecycleError::RunNotFound)?;
        let mut run = before.clone();
        let now = Utc::now();
        match run.close(completion, now)? {
            CloseDisposition::AlreadyClosed => Ok(before),
            CloseDisposition::Closed => {
                let audit = AuditRecord::updated(
                    TrackedTable::WorkflowRuns,
                    run.id.0.clone(),
                    &before,
                    &run,
                    Actor::system(),
                    now,
                )?;
                self.store.update_run(run.clone(), Some(audit))?;
                info!(run = %run.id.0, outcome = run.outcome.label(), "workflow run closed");
                Ok(run)
            }
        }
    }

    fn mutate_run<F>(&self, run_id: &RunId, apply: F) -> Result<WorkflowRun, LifecycleError>
    where
        F: FnOnce(&mut WorkflowRun) -> Result<(), WorkflowError>,
    {
        let application_id = self.run_application(run_id)?;
        let gate = self.gate(&application_id);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let before = self
            .store
            .run(run_id)?
            .ok_or(LifecycleError::RunNotFound)?;
        let mut run = before.clone();
        apply(&mut run)?;
        let audit = AuditRecord::updated(
            TrackedTable::WorkflowRuns,
            run.id.0.clone(),
            &before,
            &run,
            Actor::system(),
            Utc::now(),
        )?;
        self.store.update_run(run.clone(), Some(audit))?;
        Ok(run)
    }

    fn run_application(&self, run_id: &RunId) -> Result<ApplicationId, LifecycleError> {
        Ok(self
            .store
            .run(run_id)?
            .ok_or(LifecycleError::RunNotFound)?
            .application_id)
    }

    // Read accessors. None of these take the per-application gate.

    pub fn application(&self, id: &ApplicationId) -> Result<Application, LifecycleError> {
        self.fetch(id)
    }

    pub fn application_by_number(
        &self,
        number: &ApplicationNumber,
    ) -> Result<Application, LifecycleError> {
        self.store
            .application_by_number(number)?
            .ok_or(LifecycleError::ApplicationNotFound)
    }

    pub fn status_history(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<StatusTransition>, LifecycleError> {
        self.fetch(id)?;
        Ok(self.store.status_history(id)?)
    }

    pub fn runs(&self, id: &ApplicationId) -> Result<Vec<WorkflowRun>, LifecycleError> {
        self.fetch(id)?;
        Ok(self.store.runs(id)?)
    }

    pub fn assessments(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<super::assessment::AssessmentResult>, LifecycleError> {
        self.fetch(id)?;
        Ok(self.store.assessments(id)?)
    }

    pub fn audit_trail(&self, id: &ApplicationId) -> Result<Vec<AuditRecord>, LifecycleError> {
        self.fetch(id)?;
        Ok(self
            .store
            .audit_trail(TrackedTable::Applications, &id.0)?)
    }

    pub fn audit_by_actor(
        &self,
        actor: &Actor,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, LifecycleError> {
        Ok(self.store.audit_by_actor(actor, from, to)?)
    }
}

fn assessment_record_id(id: &ApplicationId, pass: usize, kind: AssessmentKind) -> String {
    match kind {
        AssessmentKind::Dimension(dimension) => {
            format!("{}:{pass}:{}", id.0, dimension.label())
        }
        AssessmentKind::Comprehensive => format!("{}:{pass}:comprehensive", id.0),
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::lifecycle::assessment::{
    AssessmentAggregator, AssessmentConfig, AssessmentResult, Dimension, DimensionScore,
    DimensionWeights,
};
use crate::lifecycle::audit::{AuditRecord, TrackedTable};
use crate::lifecycle::domain::{
    Actor, Applicant, ApplicantId, Application, ApplicationDraft, ApplicationId,
    ApplicationNumber, ApplicationStatus, ApplicationType, ContactInfo, EducationLevel, Gender,
    MaritalStatus, NewApplicant, Priority,
};
use crate::lifecycle::history::StatusTransition;
use crate::lifecycle::memory::InMemoryStore;
use crate::lifecycle::service::ApplicationService;
use crate::lifecycle::store::{LifecycleStore, StorageError};
use crate::lifecycle::workflow::{RunId, WorkflowRun};

pub(super) fn policy() -> AssessmentConfig {
    AssessmentConfig {
        weights: DimensionWeights {
            income: 0.25,
            employment: 0.20,
            family: 0.15,
            wealth: 0.25,
            demographic: 0.15,
        },
        approval_threshold: 0.70,
        rejection_threshold: 0.50,
    }
}

pub(super) fn aggregator() -> AssessmentAggregator {
    AssessmentAggregator::new(policy()).expect("valid policy")
}

pub(super) fn service() -> ApplicationService<InMemoryStore> {
    ApplicationService::new(Arc::new(InMemoryStore::new()), aggregator())
}

/// Each fixture applicant gets a fresh national id; the store enforces
/// national id uniqueness across registrations.
pub(super) fn unique_national_id() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(1);
    format!("7841988{:08}", SEQ.fetch_add(1, Ordering::Relaxed))
}

pub(super) fn new_applicant() -> NewApplicant {
    NewApplicant {
        national_id: unique_national_id(),
        first_name: "Mariam".to_string(),
        last_name: "Hassan".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1988, 6, 14).expect("valid date"),
        gender: Gender::Female,
        nationality: "UAE".to_string(),
        marital_status: MaritalStatus::Married,
        education_level: EducationLevel::Diploma,
        contact: ContactInfo {
            phone: "+971500000001".to_string(),
            email: "mariam@example.com".to_string(),
        },
    }
}

pub(super) fn draft() -> ApplicationDraft {
    ApplicationDraft {
        application_type: ApplicationType::RegularSupport,
        priority: Priority::Normal,
        requested_amount: 2500.0,
        support_duration_months: 6,
        justification: "Primary earner lost employment".to_string(),
    }
}

pub(super) fn register(service: &ApplicationService<InMemoryStore>) -> Applicant {
    service
        .register_applicant(new_applicant())
        .expect("register applicant")
}

pub(super) fn open_application(service: &ApplicationService<InMemoryStore>) -> Application {
    let applicant = register(service);
    service
        .create_application(&applicant.id, draft())
        .expect("create application")
}

pub(super) fn advance(
    service: &ApplicationService<InMemoryStore>,
    id: &ApplicationId,
    path: &[ApplicationStatus],
) -> Application {
    let mut current = service.application(id).expect("application exists");
    for status in path {
        current = service
            .transition(id, *status, Actor::system(), "test step")
            .expect("allowed transition");
    }
    current
}

pub(super) fn dimension_scores(values: [f64; 5]) -> BTreeMap<Dimension, DimensionScore> {
    Dimension::ALL
        .iter()
        .zip(values)
        .map(|(dimension, score)| (*dimension, plain_score(score)))
        .collect()
}

pub(super) fn plain_score(score: f64) -> DimensionScore {
    DimensionScore {
        score,
        details: BTreeMap::new(),
        recommendations: Vec::new(),
        risk_factors: Vec::new(),
    }
}

pub(super) fn current_year() -> i32 {
    Utc::now().year()
}

/// Store stub whose every operation reports an outage, for checking that
/// infrastructure failures surface instead of being swallowed.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StorageError> {
    Err(StorageError::Unavailable("store offline".to_string()))
}

impl LifecycleStore for UnavailableStore {
    fn allocate_applicant_id(&self) -> Result<ApplicantId, StorageError> {
        offline()
    }

    fn allocate_application(
        &self,
        _year: i32,
    ) -> Result<(ApplicationId, ApplicationNumber), StorageError> {
        offline()
    }

    fn allocate_run_id(&self) -> Result<RunId, StorageError> {
        offline()
    }

    fn insert_applicant(
        &self,
        _applicant: Applicant,
        _audit: AuditRecord,
    ) -> Result<(), StorageError> {
        offline()
    }

    fn commit_creation(
        &self,
        _application: Application,
        _transition: StatusTransition,
        _audit: AuditRecord,
    ) -> Result<(), StorageError> {
        offline()
    }

    fn commit_transition(
        &self,
        _application: Application,
        _transition: StatusTransition,
        _closed_run: Option<WorkflowRun>,
        _audits: Vec<AuditRecord>,
    ) -> Result<(), StorageError> {
        offline()
    }

    fn commit_assessment(
        &self,
        _application: Application,
        _results: Vec<AssessmentResult>,
        _audits: Vec<AuditRecord>,
    ) -> Result<(), StorageError> {
        offline()
    }

    fn commit_application_update(
        &self,
        _application: Application,
        _audit: AuditRecord,
    ) -> Result<(), StorageError> {
        offline()
    }

    fn insert_run(&self, _run: WorkflowRun, _audit: AuditRecord) -> Result<(), StorageError> {
        offline()
    }

    fn update_run(
        &self,
        _run: WorkflowRun,
        _audit: Option<AuditRecord>,
    ) -> Result<(), StorageError> {
        offline()
    }

    fn applicant(&self, _id: &ApplicantId) -> Result<Option<Applicant>, StorageError> {
        offline()
    }

    fn application(&self, _id: &ApplicationId) -> Result<Option<Application>, StorageError> {
        offline()
    }

    fn application_by_number(
        &self,
        _number: &ApplicationNumber,
    ) -> Result<Option<Application>, StorageError> {
        offline()
    }

    fn status_history(
        &self,
        _id: &ApplicationId,
    ) -> Result<Vec<StatusTransition>, StorageError> {
        offline()
    }

    fn runs(&self, _id: &ApplicationId) -> Result<Vec<WorkflowRun>, StorageError> {
        offline()
    }

    fn active_run(&self, _id: &ApplicationId) -> Result<Option<WorkflowRun>, StorageError> {
        offline()
    }

    fn run(&self, _run_id: &RunId) -> Result<Option<WorkflowRun>, StorageError> {
        offline()
    }

    fn assessments(&self, _id: &ApplicationId) -> Result<Vec<AssessmentResult>, StorageError> {
        offline()
    }

    fn audit_trail(
        &self,
        _table: TrackedTable,
        _record_id: &str,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        offline()
    }

    fn audit_by_actor(
        &self,
        _actor: &Actor,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        offline()
    }
}

//! Application lifecycle and assessment engine.
//!
//! The state machine in [`service`] orchestrates four leaves: the status
//! history, the assessment aggregator, the workflow run tracker, and the
//! audit ledger. Storage sits behind [`store::LifecycleStore`] so the engine
//! can be exercised against the in-memory store in tests and demos.

pub mod assessment;
pub mod audit;
pub mod domain;
pub mod history;
pub mod memory;
pub mod router;
pub mod service;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use assessment::{
    AssessmentAggregator, AssessmentConfig, AssessmentDecision, AssessmentError, AssessmentKind,
    AssessmentOutcome, AssessmentResult, Dimension, DimensionScore, DimensionWeights,
};
pub use audit::{AuditOperation, AuditRecord, TrackedTable};
pub use domain::{
    Actor, Applicant, ApplicantId, Application, ApplicationDraft, ApplicationId,
    ApplicationNumber, ApplicationStatus, ApplicationType, ContactInfo, DocumentProcessingStatus,
    EducationLevel, ExtractedDocument, FinancialSnapshot, Gender, MaritalStatus, NewApplicant,
    Priority, TransitionError, ValidationError,
};
pub use history::StatusTransition;
pub use memory::InMemoryStore;
pub use router::{lifecycle_router, ApplicationView};
pub use service::{ApplicationService, LifecycleError};
pub use store::{LifecycleStore, StorageError};
pub use workflow::{RunCompletion, RunId, RunOutcome, WorkflowError, WorkflowRun};

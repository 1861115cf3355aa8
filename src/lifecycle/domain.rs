use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for stored applicants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

/// Identifier wrapper for stored applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Human-readable application number, `APP-<year>-<sequence>` with a
/// zero-padded six digit per-year sequence. Assigned exactly once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationNumber(pub String);

impl ApplicationNumber {
    pub fn format(year: i32, sequence: u64) -> Self {
        ApplicationNumber(format!("APP-{year}-{sequence:06}"))
    }
}

/// Who performed a mutation: a staff/applicant identifier or the system itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(pub String);

impl Actor {
    pub const SYSTEM: &'static str = "system";

    pub fn system() -> Self {
        Actor(Self::SYSTEM.to_string())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Actor(name.into())
    }

    pub fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
    Widowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    Primary,
    Secondary,
    Diploma,
    Bachelor,
    Master,
    Phd,
}

/// Contact details captured at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
}

/// Immutable applicant identity. One applicant may hold several applications
/// over time; identity is owned independently of any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub nationality: String,
    pub marital_status: MaritalStatus,
    pub education_level: EducationLevel,
    pub contact: ContactInfo,
    pub registered_at: DateTime<Utc>,
}

/// Applicant data as submitted for registration, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplicant {
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub nationality: String,
    pub marital_status: MaritalStatus,
    pub education_level: EducationLevel,
    pub contact: ContactInfo,
}

pub const NATIONAL_ID_DIGITS: usize = 15;
pub const MINIMUM_APPLICANT_AGE: i32 = 18;

impl NewApplicant {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if self.national_id.len() != NATIONAL_ID_DIGITS
            || !self.national_id.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::NationalIdFormat {
                value: self.national_id.clone(),
            });
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        let age = age_on(self.date_of_birth, today);
        if age < MINIMUM_APPLICANT_AGE {
            return Err(ValidationError::UnderMinimumAge { age });
        }
        Ok(())
    }

    pub fn into_applicant(self, id: ApplicantId, now: DateTime<Utc>) -> Applicant {
        Applicant {
            id,
            national_id: self.national_id,
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            nationality: self.nationality,
            marital_status: self.marital_status,
            education_level: self.education_level,
            contact: self.contact,
            registered_at: now,
        }
    }
}

fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    RegularSupport,
    EconomicEnablement,
    EmergencySupport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Lifecycle status of an application. `Draft` is initial; `Approved`,
/// `Rejected`, and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    DocumentsPending,
    Processing,
    Approved,
    Rejected,
    OnHold,
    Cancelled,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::DocumentsPending => "documents_pending",
            ApplicationStatus::Processing => "processing",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::OnHold => "on_hold",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved | ApplicationStatus::Rejected | ApplicationStatus::Cancelled
        )
    }

    /// Whether the directed edge `self -> target` is part of the allowed
    /// transition graph. Any non-terminal status may move to `Cancelled`.
    pub fn allows_transition_to(self, target: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if self.is_terminal() {
            return false;
        }
        if target == Cancelled {
            return true;
        }
        matches!(
            (self, target),
            (Draft, Submitted)
                | (Submitted, UnderReview)
                | (Submitted, DocumentsPending)
                | (DocumentsPending, UnderReview)
                | (UnderReview, Processing)
                | (UnderReview, DocumentsPending)
                | (Processing, Approved)
                | (Processing, Rejected)
                | (Processing, OnHold)
                | (OnHold, Processing)
        )
    }
}

/// Per-application financial facts. Net worth is always derived from the
/// current fields, never stored or set independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub existing_debts: f64,
    pub savings: f64,
    pub property_value: f64,
    pub other_assets: f64,
}

impl FinancialSnapshot {
    pub fn net_worth(&self) -> f64 {
        self.savings + self.property_value + self.other_assets - self.existing_debts
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            self.monthly_income,
            self.monthly_expenses,
            self.existing_debts,
            self.savings,
            self.property_value,
            self.other_assets,
        ];
        if fields.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(ValidationError::NegativeFinancialFigure);
        }
        Ok(())
    }
}

/// Fields supplied by the applicant when a draft application is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub application_type: ApplicationType,
    pub priority: Priority,
    pub requested_amount: f64,
    pub support_duration_months: u32,
    pub justification: String,
}

impl ApplicationDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.requested_amount.is_finite() || self.requested_amount <= 0.0 {
            return Err(ValidationError::NonPositiveAmount {
                amount: self.requested_amount,
            });
        }
        if self.support_duration_months == 0 {
            return Err(ValidationError::ZeroSupportDuration);
        }
        if self.justification.trim().is_empty() {
            return Err(ValidationError::MissingJustification);
        }
        Ok(())
    }
}

/// The central aggregate. Created in `Draft`, mutated only through the
/// lifecycle service, and never physically deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub number: ApplicationNumber,
    pub applicant_id: ApplicantId,
    pub application_type: ApplicationType,
    pub priority: Priority,
    pub requested_amount: f64,
    pub support_duration_months: u32,
    pub justification: String,
    pub status: ApplicationStatus,
    pub financials: Option<FinancialSnapshot>,
    pub approved_amount: Option<f64>,
    pub approved_duration_months: Option<u32>,
    pub rejection_reason: Option<String>,
    pub assessment_score: Option<f64>,
    pub assessment_decision: Option<String>,
    pub human_review_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn open(
        id: ApplicationId,
        number: ApplicationNumber,
        applicant_id: ApplicantId,
        draft: ApplicationDraft,
        now: DateTime<Utc>,
    ) -> Self {
        Application {
            id,
            number,
            applicant_id,
            application_type: draft.application_type,
            priority: draft.priority,
            requested_amount: draft.requested_amount,
            support_duration_months: draft.support_duration_months,
            justification: draft.justification,
            status: ApplicationStatus::Draft,
            financials: None,
            approved_amount: None,
            approved_duration_months: None,
            rejection_reason: None,
            assessment_score: None,
            assessment_decision: None,
            human_review_required: false,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            processed_at: None,
            approved_at: None,
            rejected_at: None,
        }
    }

    /// Apply an already-validated status change, stamping the milestone field
    /// that corresponds to the target status.
    pub(crate) fn apply_status(&mut self, target: ApplicationStatus, now: DateTime<Utc>) {
        self.status = target;
        self.updated_at = now;
        match target {
            ApplicationStatus::Submitted => self.submitted_at = Some(now),
            ApplicationStatus::Processing => self.processed_at = Some(now),
            ApplicationStatus::Approved => self.approved_at = Some(now),
            ApplicationStatus::Rejected => self.rejected_at = Some(now),
            _ => {}
        }
    }
}

/// Structured record handed over by the external document extraction
/// collaborator. The core treats `extracted_fields` and `confidence_score`
/// as opaque inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub document_type: String,
    pub extracted_fields: std::collections::BTreeMap<String, serde_json::Value>,
    pub confidence_score: f64,
    pub processing_status: DocumentProcessingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentProcessingStatus {
    Processed,
    Failed,
}

/// Malformed input, rejected before any write.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("national id '{value}' must be a {NATIONAL_ID_DIGITS}-digit numeric string")]
    NationalIdFormat { value: String },
    #[error("applicant name must not be empty")]
    MissingName,
    #[error("applicant age {age} is below the minimum of {MINIMUM_APPLICANT_AGE}")]
    UnderMinimumAge { age: i32 },
    #[error("requested amount {amount} must be positive")]
    NonPositiveAmount { amount: f64 },
    #[error("support duration must be at least one month")]
    ZeroSupportDuration,
    #[error("justification must not be empty")]
    MissingJustification,
    #[error("financial figures must be non-negative")]
    NegativeFinancialFigure,
    #[error("confidence score {score} is outside [0, 1]")]
    ConfidenceOutOfRange { score: f64 },
}

/// Attempted use of an edge outside the allowed transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("transition {from:?} -> {to:?} is not allowed")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application is in terminal status {status:?}")]
    TerminalStateViolation { status: ApplicationStatus },
}

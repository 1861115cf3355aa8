use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::assessment::{AssessmentError, Dimension, DimensionScore};
use super::domain::{
    ApplicantId, Application, ApplicationDraft, ApplicationId, ApplicationNumber,
    ApplicationStatus, Actor, FinancialSnapshot, NewApplicant,
};
use super::service::{ApplicationService, LifecycleError};
use super::store::{LifecycleStore, StorageError};
use super::workflow::{RunCompletion, RunId};

/// Router builder exposing the lifecycle boundary contracts over HTTP.
/// Filtering/listing beyond these keyed accessors is the surrounding
/// layer's concern.
pub fn lifecycle_router<S>(service: Arc<ApplicationService<S>>) -> Router
where
    S: LifecycleStore + 'static,
{
    Router::new()
        .route("/api/v1/applicants", post(register_applicant::<S>))
        .route("/api/v1/applications", post(create_application::<S>))
        .route("/api/v1/applications/:id", get(get_application::<S>))
        .route(
            "/api/v1/applications/by-number/:number",
            get(get_by_number::<S>),
        )
        .route(
            "/api/v1/applications/:id/transitions",
            post(transition::<S>),
        )
        .route(
            "/api/v1/applications/:id/assessments",
            post(submit_assessment::<S>),
        )
        .route(
            "/api/v1/applications/:id/financials",
            put(update_financials::<S>),
        )
        .route("/api/v1/applications/:id/runs", post(start_run::<S>))
        .route("/api/v1/applications/:id/history", get(status_history::<S>))
        .route("/api/v1/applications/:id/run-log", get(run_log::<S>))
        .route("/api/v1/applications/:id/audit", get(audit_trail::<S>))
        .route("/api/v1/runs/:run_id/documents", post(record_document::<S>))
        .route("/api/v1/runs/:run_id/warnings", post(record_warning::<S>))
        .route("/api/v1/runs/:run_id/close", post(close_run::<S>))
        .with_state(service)
}

/// Sanitized application summary returned by the read endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub number: ApplicationNumber,
    pub status: &'static str,
    pub requested_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_worth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_decision: Option<String>,
    pub human_review_required: bool,
}

impl From<&Application> for ApplicationView {
    fn from(application: &Application) -> Self {
        ApplicationView {
            id: application.id.clone(),
            number: application.number.clone(),
            status: application.status.label(),
            requested_amount: application.requested_amount,
            net_worth: application.financials.as_ref().map(FinancialSnapshot::net_worth),
            assessment_score: application.assessment_score,
            assessment_decision: application.assessment_decision.clone(),
            human_review_required: application.human_review_required,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub applicant_id: ApplicantId,
    #[serde(flatten)]
    pub draft: ApplicationDraft,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub target: ApplicationStatus,
    pub actor: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AssessmentRequest {
    pub scores: BTreeMap<Dimension, DimensionScore>,
}

#[derive(Debug, Deserialize)]
pub struct FinancialsRequest {
    pub actor: String,
    #[serde(flatten)]
    pub snapshot: FinancialSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct DocumentReport {
    pub succeeded: bool,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub outcome: RunCompletion,
}

async fn register_applicant<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Json(new): Json<NewApplicant>,
) -> Response {
    match service.register_applicant(new) {
        Ok(applicant) => (StatusCode::CREATED, Json(applicant)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn create_application<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Json(request): Json<CreateApplicationRequest>,
) -> Response {
    match service.create_application(&request.applicant_id, request.draft) {
        Ok(application) => {
            (StatusCode::CREATED, Json(ApplicationView::from(&application))).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn get_application<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
) -> Response {
    match service.application(&ApplicationId(id)) {
        Ok(application) => Json(ApplicationView::from(&application)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_by_number<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(number): Path<String>,
) -> Response {
    match service.application_by_number(&ApplicationNumber(number)) {
        Ok(application) => Json(ApplicationView::from(&application)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn transition<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Response {
    match service.transition(
        &ApplicationId(id),
        request.target,
        Actor::named(request.actor),
        request.reason,
    ) {
        Ok(application) => Json(ApplicationView::from(&application)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn submit_assessment<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
    Json(request): Json<AssessmentRequest>,
) -> Response {
    match service.submit_assessment(&ApplicationId(id), request.scores) {
        Ok(outcome) => Json(outcome).into_response(),
        Err(error) => error_response(error),
    }
}

async fn update_financials<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
    Json(request): Json<FinancialsRequest>,
) -> Response {
    match service.update_financials(
        &ApplicationId(id),
        request.snapshot,
        Actor::named(request.actor),
    ) {
        Ok(application) => Json(ApplicationView::from(&application)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn start_run<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
) -> Response {
    match service.start_run(&ApplicationId(id)) {
        Ok(run) => (StatusCode::CREATED, Json(run)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn status_history<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
) -> Response {
    match service.status_history(&ApplicationId(id)) {
        Ok(history) => Json(history).into_response(),
        Err(error) => error_response(error),
    }
}

async fn run_log<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
) -> Response {
    match service.runs(&ApplicationId(id)) {
        Ok(runs) => Json(runs).into_response(),
        Err(error) => error_response(error),
    }
}

async fn audit_trail<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(id): Path<String>,
) -> Response {
    match service.audit_trail(&ApplicationId(id)) {
        Ok(records) => Json(records).into_response(),
        Err(error) => error_response(error),
    }
}

async fn record_document<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(run_id): Path<String>,
    Json(report): Json<DocumentReport>,
) -> Response {
    match service.record_document(&RunId(run_id), report.succeeded) {
        Ok(run) => Json(run).into_response(),
        Err(error) => error_response(error),
    }
}

async fn record_warning<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(run_id): Path<String>,
) -> Response {
    match service.record_warning(&RunId(run_id)) {
        Ok(run) => Json(run).into_response(),
        Err(error) => error_response(error),
    }
}

async fn close_run<S: LifecycleStore + 'static>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(run_id): Path<String>,
    Json(request): Json<CloseRequest>,
) -> Response {
    match service.close_run(&RunId(run_id), request.outcome) {
        Ok(run) => Json(run).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: LifecycleError) -> Response {
    let status = match &error {
        LifecycleError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Assessment(assessment) => match assessment {
            AssessmentError::IncompleteAssessment { .. }
            | AssessmentError::ScoreOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        LifecycleError::Transition(_) | LifecycleError::Workflow(_) => StatusCode::CONFLICT,
        LifecycleError::ApplicantNotFound
        | LifecycleError::ApplicationNotFound
        | LifecycleError::RunNotFound => StatusCode::NOT_FOUND,
        LifecycleError::Storage(storage) => match storage {
            StorageError::Conflict => StatusCode::CONFLICT,
            StorageError::NotFound => StatusCode::NOT_FOUND,
            StorageError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StorageError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

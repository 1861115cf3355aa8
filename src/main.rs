use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::info;

use benefits_core::config::AppConfig;
use benefits_core::error::AppError;
use benefits_core::lifecycle::{
    lifecycle_router, Actor, ApplicationDraft, ApplicationService, ApplicationStatus,
    ApplicationType, AssessmentAggregator, ContactInfo, Dimension, DimensionScore,
    EducationLevel, FinancialSnapshot, Gender, InMemoryStore, LifecycleError, MaritalStatus,
    NewApplicant, Priority, RunCompletion,
};
use benefits_core::telemetry;

#[derive(Clone)]
struct OpsState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Benefits Lifecycle Engine",
    about = "Run the benefit application lifecycle and assessment engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk one application through intake, assessment, and approval
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let aggregator = AssessmentAggregator::new(config.assessment)
        .map_err(LifecycleError::from)?;
    let service = Arc::new(ApplicationService::new(
        Arc::new(InMemoryStore::new()),
        aggregator,
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = OpsState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(lifecycle_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "benefits lifecycle engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Offline walkthrough used for stakeholder demos: one application moves
/// from draft to approval with a workflow run and a full assessment pass.
fn run_demo() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let aggregator = AssessmentAggregator::new(config.assessment)
        .map_err(LifecycleError::from)?;
    let service = ApplicationService::new(Arc::new(InMemoryStore::new()), aggregator);

    let applicant = service.register_applicant(NewApplicant {
        national_id: "784199012345678".to_string(),
        first_name: "Fatima".to_string(),
        last_name: "Al Mansouri".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap_or_default(),
        gender: Gender::Female,
        nationality: "UAE".to_string(),
        marital_status: MaritalStatus::Married,
        education_level: EducationLevel::Bachelor,
        contact: ContactInfo {
            phone: "+971501234567".to_string(),
            email: "fatima@example.com".to_string(),
        },
    })?;

    let application = service.create_application(
        &applicant.id,
        ApplicationDraft {
            application_type: ApplicationType::RegularSupport,
            priority: Priority::Normal,
            requested_amount: 3000.0,
            support_duration_months: 6,
            justification: "Household income no longer covers essential expenses".to_string(),
        },
    )?;

    service.update_financials(
        &application.id,
        FinancialSnapshot {
            monthly_income: 4200.0,
            monthly_expenses: 5100.0,
            existing_debts: 18000.0,
            savings: 2500.0,
            property_value: 0.0,
            other_assets: 1200.0,
        },
        Actor::named("case-officer-7"),
    )?;

    service.transition(
        &application.id,
        ApplicationStatus::Submitted,
        Actor::named("applicant"),
        "application submitted",
    )?;
    service.transition(
        &application.id,
        ApplicationStatus::UnderReview,
        Actor::system(),
        "intake checks passed",
    )?;
    service.transition(
        &application.id,
        ApplicationStatus::Processing,
        Actor::system(),
        "documents complete, scoring started",
    )?;

    let run = service.start_run(&application.id)?;
    service.record_document(&run.id, true)?;
    service.record_document(&run.id, true)?;
    service.record_warning(&run.id)?;

    let mut scores = BTreeMap::new();
    for (dimension, score) in [
        (Dimension::Income, 0.85),
        (Dimension::Employment, 0.70),
        (Dimension::Family, 0.80),
        (Dimension::Wealth, 0.75),
        (Dimension::Demographic, 0.60),
    ] {
        scores.insert(
            dimension,
            DimensionScore {
                score,
                details: BTreeMap::new(),
                recommendations: Vec::new(),
                risk_factors: Vec::new(),
            },
        );
    }
    let outcome = service.submit_assessment(&application.id, scores)?;

    service.transition(
        &application.id,
        ApplicationStatus::Approved,
        Actor::named("reviewer-3"),
        "assessment supports approval",
    )?;
    // Approval already closed the run; the repeated close is a no-op.
    service.close_run(&run.id, RunCompletion::Completed)?;

    let final_state = service.application(&application.id)?;
    let history = service.status_history(&application.id)?;
    let audit = service.audit_trail(&application.id)?;

    println!("Application {}", final_state.number.0);
    println!("  status: {}", final_state.status.label());
    println!(
        "  comprehensive score: {:.3} ({})",
        outcome.comprehensive_score,
        outcome.decision.label()
    );
    println!("  status history:");
    for entry in &history {
        let from = entry
            .from
            .map(|status| status.label())
            .unwrap_or("(none)");
        println!(
            "    {} -> {} by {} ({})",
            from,
            entry.to.label(),
            entry.actor.0,
            entry.reason
        );
    }
    println!("  audit records for the application row: {}", audit.len());
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "application": final_state,
            "assessment": outcome,
        }))?
    );

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<OpsState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<OpsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

use chrono::{Datelike, Utc};

use super::common::*;
use crate::lifecycle::domain::{
    Actor, ApplicantId, ApplicationStatus, FinancialSnapshot, TransitionError, ValidationError,
};
use crate::lifecycle::service::LifecycleError;
use crate::lifecycle::store::StorageError;
use crate::lifecycle::workflow::RunOutcome;

#[test]
fn creation_opens_draft_with_initial_history() {
    let service = service();
    let application = open_application(&service);

    assert_eq!(application.status, ApplicationStatus::Draft);
    assert!(application.submitted_at.is_none());

    let history = service
        .status_history(&application.id)
        .expect("history exists");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, None);
    assert_eq!(history[0].to, ApplicationStatus::Draft);
    assert!(history[0].actor.is_system());
}

#[test]
fn application_numbers_increment_within_the_year() {
    let service = service();
    let applicant = register(&service);

    let first = service
        .create_application(&applicant.id, draft())
        .expect("first application");
    let second = service
        .create_application(&applicant.id, draft())
        .expect("second application");

    let year = current_year();
    assert_eq!(first.number.0, format!("APP-{year}-000001"));
    assert_eq!(second.number.0, format!("APP-{year}-000002"));

    let fetched = service
        .application_by_number(&second.number)
        .expect("lookup by number");
    assert_eq!(fetched.id, second.id);
}

#[test]
fn submission_records_actor_and_reason() {
    let service = service();
    let application = open_application(&service);

    let submitted = service
        .transition(
            &application.id,
            ApplicationStatus::Submitted,
            Actor::named("applicant"),
            "application submitted",
        )
        .expect("draft to submitted is allowed");

    assert_eq!(submitted.status, ApplicationStatus::Submitted);
    assert!(submitted.submitted_at.is_some());

    let history = service
        .status_history(&application.id)
        .expect("history exists");
    assert_eq!(history.len(), 2);
    let latest = history.last().expect("latest entry");
    assert_eq!(latest.from, Some(ApplicationStatus::Draft));
    assert_eq!(latest.to, ApplicationStatus::Submitted);
    assert_eq!(latest.actor, Actor::named("applicant"));
    assert_eq!(latest.reason, "application submitted");
}

#[test]
fn creation_requires_a_registered_applicant() {
    let service = service();
    let missing = ApplicantId("apl-999999".to_string());

    match service.create_application(&missing, draft()) {
        Err(LifecycleError::ApplicantNotFound) => {}
        other => panic!("expected applicant lookup failure, got {other:?}"),
    }
}

#[test]
fn malformed_drafts_are_rejected_before_any_write() {
    let service = service();
    let applicant = register(&service);

    let mut zero_duration = draft();
    zero_duration.support_duration_months = 0;
    match service.create_application(&applicant.id, zero_duration) {
        Err(LifecycleError::Validation(ValidationError::ZeroSupportDuration)) => {}
        other => panic!("expected duration rejection, got {other:?}"),
    }

    let mut negative_amount = draft();
    negative_amount.requested_amount = -10.0;
    match service.create_application(&applicant.id, negative_amount) {
        Err(LifecycleError::Validation(ValidationError::NonPositiveAmount { .. })) => {}
        other => panic!("expected amount rejection, got {other:?}"),
    }

    let mut blank_justification = draft();
    blank_justification.justification = "   ".to_string();
    match service.create_application(&applicant.id, blank_justification) {
        Err(LifecycleError::Validation(ValidationError::MissingJustification)) => {}
        other => panic!("expected justification rejection, got {other:?}"),
    }
}

#[test]
fn registration_validates_identity_fields() {
    let service = service();

    let mut short_id = new_applicant();
    short_id.national_id = "12345".to_string();
    match service.register_applicant(short_id) {
        Err(LifecycleError::Validation(ValidationError::NationalIdFormat { .. })) => {}
        other => panic!("expected national id rejection, got {other:?}"),
    }

    let mut minor = new_applicant();
    minor.date_of_birth = chrono::NaiveDate::from_ymd_opt(Utc::now().year() - 17, 1, 1)
        .expect("valid date");
    match service.register_applicant(minor) {
        Err(LifecycleError::Validation(ValidationError::UnderMinimumAge { age: 17 })) => {}
        other => panic!("expected age rejection, got {other:?}"),
    }
}

#[test]
fn registration_rejects_a_reused_national_id() {
    let service = service();

    let mut first = new_applicant();
    first.national_id = "784197700000001".to_string();
    service
        .register_applicant(first.clone())
        .expect("first registration");

    let mut second = new_applicant();
    second.national_id = first.national_id.clone();
    second.first_name = "Ahmed".to_string();
    match service.register_applicant(second) {
        Err(LifecycleError::Storage(StorageError::Conflict)) => {}
        other => panic!("expected duplicate national id rejection, got {other:?}"),
    }
}

#[test]
fn edges_outside_the_graph_are_rejected() {
    let service = service();
    let application = open_application(&service);

    match service.transition(
        &application.id,
        ApplicationStatus::Processing,
        Actor::system(),
        "skip ahead",
    ) {
        Err(LifecycleError::Transition(TransitionError::InvalidTransition {
            from: ApplicationStatus::Draft,
            to: ApplicationStatus::Processing,
        })) => {}
        other => panic!("expected invalid edge rejection, got {other:?}"),
    }
}

#[test]
fn terminal_applications_reject_every_further_move() {
    let service = service();
    let application = open_application(&service);
    advance(
        &service,
        &application.id,
        &[
            ApplicationStatus::Submitted,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Processing,
            ApplicationStatus::Approved,
        ],
    );

    for target in [
        ApplicationStatus::Processing,
        ApplicationStatus::OnHold,
        ApplicationStatus::Cancelled,
    ] {
        match service.transition(&application.id, target, Actor::system(), "post-decision move") {
            Err(LifecycleError::Transition(TransitionError::TerminalStateViolation {
                status: ApplicationStatus::Approved,
            })) => {}
            other => panic!("expected terminal violation for {target:?}, got {other:?}"),
        }
    }
}

#[test]
fn any_non_terminal_status_may_cancel() {
    let service = service();

    let from_draft = open_application(&service);
    let cancelled = service
        .transition(
            &from_draft.id,
            ApplicationStatus::Cancelled,
            Actor::named("applicant"),
            "withdrawn by applicant",
        )
        .expect("draft may cancel");
    assert_eq!(cancelled.status, ApplicationStatus::Cancelled);

    let from_hold = open_application(&service);
    advance(
        &service,
        &from_hold.id,
        &[
            ApplicationStatus::Submitted,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Processing,
            ApplicationStatus::OnHold,
        ],
    );
    let cancelled = service
        .transition(
            &from_hold.id,
            ApplicationStatus::Cancelled,
            Actor::system(),
            "stale for ninety days",
        )
        .expect("on hold may cancel");
    assert_eq!(cancelled.status, ApplicationStatus::Cancelled);
}

#[test]
fn approval_copies_the_requested_terms() {
    let service = service();
    let application = open_application(&service);
    let approved = advance(
        &service,
        &application.id,
        &[
            ApplicationStatus::Submitted,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Processing,
            ApplicationStatus::Approved,
        ],
    );

    assert_eq!(approved.approved_amount, Some(approved.requested_amount));
    assert_eq!(
        approved.approved_duration_months,
        Some(approved.support_duration_months)
    );
    assert!(approved.approved_at.is_some());
    assert!(approved.processed_at.is_some());
}

#[test]
fn rejection_stores_the_reason() {
    let service = service();
    let application = open_application(&service);
    advance(
        &service,
        &application.id,
        &[
            ApplicationStatus::Submitted,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Processing,
        ],
    );

    let rejected = service
        .transition(
            &application.id,
            ApplicationStatus::Rejected,
            Actor::named("reviewer-2"),
            "income above eligibility ceiling",
        )
        .expect("processing to rejected is allowed");

    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("income above eligibility ceiling")
    );
    assert!(rejected.rejected_at.is_some());
}

#[test]
fn decision_closes_the_active_run() {
    let service = service();
    let application = open_application(&service);
    advance(
        &service,
        &application.id,
        &[
            ApplicationStatus::Submitted,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Processing,
        ],
    );
    let run = service.start_run(&application.id).expect("run starts");

    advance(&service, &application.id, &[ApplicationStatus::Approved]);

    let closed = service
        .runs(&application.id)
        .expect("runs listed")
        .into_iter()
        .find(|candidate| candidate.id == run.id)
        .expect("run still listed");
    assert!(!closed.is_open());
    assert_eq!(closed.outcome, RunOutcome::Completed);
}

#[test]
fn current_status_always_matches_the_latest_history_entry() {
    let service = service();
    let application = open_application(&service);
    advance(
        &service,
        &application.id,
        &[
            ApplicationStatus::Submitted,
            ApplicationStatus::DocumentsPending,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Processing,
            ApplicationStatus::Rejected,
        ],
    );

    let current = service.application(&application.id).expect("application");
    let history = service.status_history(&application.id).expect("history");

    let latest = history.last().expect("non-empty history");
    assert_eq!(latest.to, current.status);

    for pair in history.windows(2) {
        assert_eq!(pair[1].from, Some(pair[0].to));
        assert!(pair[0].to.allows_transition_to(pair[1].to));
        assert!(pair[0].sequence < pair[1].sequence);
    }
}

#[test]
fn financial_updates_round_trip_and_derive_net_worth() {
    let service = service();
    let application = open_application(&service);

    let snapshot = FinancialSnapshot {
        monthly_income: 6000.0,
        monthly_expenses: 7100.0,
        existing_debts: 20000.0,
        savings: 4000.0,
        property_value: 150000.0,
        other_assets: 1000.0,
    };
    let updated = service
        .update_financials(&application.id, snapshot, Actor::named("case-officer-1"))
        .expect("financials accepted");

    let stored = updated.financials.expect("snapshot stored");
    assert_eq!(stored.net_worth(), 135000.0);

    let negative = FinancialSnapshot {
        savings: -1.0,
        ..snapshot
    };
    match service.update_financials(&application.id, negative, Actor::system()) {
        Err(LifecycleError::Validation(ValidationError::NegativeFinancialFigure)) => {}
        other => panic!("expected negative figure rejection, got {other:?}"),
    }
}

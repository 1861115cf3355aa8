use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, ApplicationId, ApplicationStatus};

/// Immutable record of one status change. The first transition of an
/// application carries no prior status. Records are totally ordered per
/// application by timestamp, then by the store-assigned insertion sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub application_id: ApplicationId,
    pub from: Option<ApplicationStatus>,
    pub to: ApplicationStatus,
    pub actor: Actor,
    pub reason: String,
    pub changed_at: DateTime<Utc>,
    /// Insertion sequence within the application's history, assigned by the
    /// store on append.
    pub sequence: u64,
}

impl StatusTransition {
    pub fn new(
        application_id: ApplicationId,
        from: Option<ApplicationStatus>,
        to: ApplicationStatus,
        actor: Actor,
        reason: impl Into<String>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        StatusTransition {
            application_id,
            from,
            to,
            actor,
            reason: reason.into(),
            changed_at,
            sequence: 0,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::Actor;
use super::store::StorageError;

/// Entities whose mutations are captured in the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedTable {
    Applicants,
    Applications,
    AssessmentResults,
    WorkflowRuns,
}

impl TrackedTable {
    pub const fn label(self) -> &'static str {
        match self {
            TrackedTable::Applicants => "applicants",
            TrackedTable::Applications => "applications",
            TrackedTable::AssessmentResults => "assessment_results",
            TrackedTable::WorkflowRuns => "workflow_runs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Create,
    Update,
    Delete,
}

/// Generic change-capture row: full before/after snapshots of one mutation
/// to one tracked entity. Appended synchronously with the mutation it
/// describes; never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub table: TrackedTable,
    pub record_id: String,
    pub operation: AuditOperation,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn created<T: Serialize>(
        table: TrackedTable,
        record_id: impl Into<String>,
        after: &T,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        Ok(AuditRecord {
            table,
            record_id: record_id.into(),
            operation: AuditOperation::Create,
            before: None,
            after: Some(snapshot(after)?),
            actor,
            recorded_at,
        })
    }

    pub fn updated<T: Serialize>(
        table: TrackedTable,
        record_id: impl Into<String>,
        before: &T,
        after: &T,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        Ok(AuditRecord {
            table,
            record_id: record_id.into(),
            operation: AuditOperation::Update,
            before: Some(snapshot(before)?),
            after: Some(snapshot(after)?),
            actor,
            recorded_at,
        })
    }

    pub fn deleted<T: Serialize>(
        table: TrackedTable,
        record_id: impl Into<String>,
        before: &T,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        Ok(AuditRecord {
            table,
            record_id: record_id.into(),
            operation: AuditOperation::Delete,
            before: Some(snapshot(before)?),
            after: None,
            actor,
            recorded_at,
        })
    }
}

fn snapshot<T: Serialize>(value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(StorageError::Snapshot)
}

//! Events the engine emits for downstream readers (audit log, metrics,
//! dashboards). Variants are added over time, never removed or reordered.

use crate::types::{ComplaintId, DepartmentId, Level, OfficerId, RuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    EscalationTriggered {
        complaint_id: ComplaintId,
        rule_id: RuleId,
        level: Level,
        target_level: Level,
        department_id: DepartmentId,
        officer_id: Option<OfficerId>,
        reason: String,
    },
    ReminderSent {
        complaint_id: ComplaintId,
        rule_id: RuleId,
        level: Level,
        reason: String,
    },
    CycleCompleted {
        cycle: u64,
        processed: usize,
        escalated: usize,
        reminders: usize,
        skipped: usize,
        failed: usize,
    },
}

impl EngineEvent {
    /// Stable name used for the `event_name` / `action` columns.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EscalationTriggered { .. } => "escalation_triggered",
            Self::ReminderSent { .. } => "reminder_sent",
            Self::CycleCompleted { .. } => "cycle_completed",
        }
    }
}

/// Audit actions recorded by the engine.
pub const AUDIT_ACTION_ESCALATION: &str = "escalation";
pub const AUDIT_ACTION_REMINDER: &str = "reminder";

/// A row of `audit_log` as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Option<i64>,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    pub payload: String, // JSON-serialized EngineEvent
    pub created_at: DateTime<Utc>,
}

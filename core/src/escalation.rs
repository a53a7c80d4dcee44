//! The durable escalation record. Append-only: created once per successful
//! escalation, never updated or deleted.

use crate::types::{ComplaintId, DepartmentId, Level, OfficerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who triggers automated escalations.
pub const SYSTEM_TRIGGER: &str = "system";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintEscalation {
    pub escalation_id: String,
    pub complaint_id: ComplaintId,
    pub from_department_id: Option<DepartmentId>,
    pub from_officer_id: Option<OfficerId>,
    pub to_department_id: DepartmentId,
    pub to_officer_id: Option<OfficerId>,
    /// The level the complaint was at BEFORE this escalation
    /// (equal to the firing rule's level).
    pub escalation_level: Level,
    pub reason: String,
    pub triggered_by: String,
    pub status_history_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

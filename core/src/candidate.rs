//! Read-only projection of a complaint for escalation purposes.

use crate::{
    clock::minutes_since,
    types::{ComplaintId, ComplaintStatus, DepartmentId, Level, LocationId, OfficerId, Priority},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationCandidate {
    pub complaint_id: ComplaintId,
    pub complaint_number: String,
    pub status: ComplaintStatus,
    pub priority: Priority,
    pub assigned_department_id: Option<DepartmentId>,
    pub assigned_officer_id: Option<OfficerId>,
    pub location_id: Option<LocationId>,
    /// Fallback location key for authority lookup.
    pub pincode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// MAX(status_history.created_at), or `created_at` when there is no history.
    pub last_status_change_at: DateTime<Utc>,
    /// Denormalised counter. Never trusted for decisions; see
    /// `Store::current_escalation_level`.
    pub current_escalation_level: Level,
}

impl EscalationCandidate {
    pub fn minutes_since_status_change(&self, now: DateTime<Utc>) -> i64 {
        minutes_since(self.last_status_change_at, now)
    }

    pub fn minutes_since_last_update(&self, now: DateTime<Utc>) -> i64 {
        minutes_since(self.updated_at.unwrap_or(self.created_at), now)
    }

    pub fn minutes_since_creation(&self, now: DateTime<Utc>) -> i64 {
        minutes_since(self.created_at, now)
    }
}

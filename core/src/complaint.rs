//! Complaint rows and their status history, as the engine reads and writes them.
//!
//! Intake, citizen-facing CRUD and officer workflows live outside this crate;
//! they share the same tables.

use crate::types::{
    ComplaintId, ComplaintStatus, DepartmentId, Level, LocationId, OfficerId, Priority,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub complaint_id: ComplaintId,
    pub complaint_number: String,
    pub status: ComplaintStatus,
    pub priority: Priority,
    pub assigned_department_id: Option<DepartmentId>,
    pub assigned_officer_id: Option<OfficerId>,
    pub location_id: Option<LocationId>,
    pub pincode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub current_escalation_level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Citizen,
    Officer,
    Admin,
    System,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Officer => "officer",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

/// One immutable row of `complaint_status_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub history_id: String,
    pub complaint_id: ComplaintId,
    pub old_status: Option<ComplaintStatus>,
    pub new_status: ComplaintStatus,
    pub changed_by: Option<String>,
    pub changed_by_type: ActorType,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

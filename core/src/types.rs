//! Shared primitive types used across the escalation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ComplaintId = String;
pub type DepartmentId = String;
pub type LocationId = String;
pub type OfficerId = String;
pub type RuleId = String;

/// Zero-indexed escalation tier. 0 = L1, 1 = L2, 2 = L3.
pub type Level = u8;

/// The deepest tier a complaint can reach (L3).
pub const MAX_ESCALATION_LEVEL: Level = 2;

/// Human label for a zero-indexed level ("L1", "L2", ...).
pub fn level_label(level: Level) -> String {
    format!("L{}", u32::from(level) + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Submitted,
    Verified,
    UnderReview,
    InProgress,
    Escalated,
    Resolved,
    Closed,
    Rejected,
}

impl ComplaintStatus {
    pub const TERMINAL: [ComplaintStatus; 3] = [Self::Resolved, Self::Closed, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Verified => "verified",
            Self::UnderReview => "under_review",
            Self::InProgress => "in_progress",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "verified" => Ok(Self::Verified),
            "under_review" => Ok(Self::UnderReview),
            "in_progress" => Ok(Self::InProgress),
            "escalated" => Ok(Self::Escalated),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown complaint status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

//! Typed escalation conditions.
//!
//! Rules carry their conditions as a JSON blob. The blob is parsed exactly
//! once, when rules are loaded for a cycle, into `EscalationConditions`.
//! Legacy field names are migrated here so the evaluator only ever sees the
//! current shape:
//!
//!   hours_since_status_change  ->  sla_hours   (when sla_hours is absent or 0)

use crate::{
    error::{EngineError, EngineResult},
    types::{ComplaintStatus, Priority},
};
use serde::{Deserialize, Serialize};

/// Current condition schema version. Bump when the parsed shape changes.
pub const CONDITIONS_VERSION: u32 = 2;

/// The blob as authors write it. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConditions {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    status: Option<Vec<String>>,
    #[serde(default)]
    priority: Option<Vec<String>>,
    #[serde(default)]
    sla_hours: Option<f64>,
    #[serde(default)]
    hours_since_status_change: Option<f64>, // deprecated alias of sla_hours
    #[serde(default)]
    hours_since_last_update: Option<f64>,
    #[serde(default)]
    hours_since_creation: Option<f64>,
    #[serde(default)]
    is_reminder: bool,
    #[serde(default)]
    reminder_interval_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeConditions {
    /// Hours the complaint may sit in its current status before breaching.
    pub sla_hours: Option<f64>,
    pub hours_since_last_update: Option<f64>,
    pub hours_since_creation: Option<f64>,
}

impl TimeConditions {
    pub fn is_empty(&self) -> bool {
        self.sla_hours.is_none()
            && self.hours_since_last_update.is_none()
            && self.hours_since_creation.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPolicy {
    /// Minimum hours between two reminders for the same complaint.
    pub interval_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationConditions {
    pub version: u32,
    pub statuses: Option<Vec<ComplaintStatus>>,
    pub priorities: Option<Vec<Priority>>,
    pub time: TimeConditions,
    pub reminder: Option<ReminderPolicy>,
}

impl EscalationConditions {
    /// Parse and migrate a rule's condition blob.
    ///
    /// An empty string or `null` yields no conditions (always passes).
    pub fn parse(rule_id: &str, blob: &str) -> EngineResult<Self> {
        let blob = blob.trim();
        if blob.is_empty() || blob == "null" {
            return Ok(Self { version: CONDITIONS_VERSION, ..Self::default() });
        }

        let raw: RawConditions =
            serde_json::from_str(blob).map_err(|e| invalid(rule_id, e.to_string()))?;

        if let Some(v) = raw.version {
            if v > CONDITIONS_VERSION {
                return Err(invalid(
                    rule_id,
                    format!("unsupported conditions version {v}"),
                ));
            }
        }

        let statuses = raw
            .status
            .map(|list| {
                list.iter()
                    .map(|s| s.parse::<ComplaintStatus>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|e| invalid(rule_id, e))?;

        let priorities = raw
            .priority
            .map(|list| {
                list.iter()
                    .map(|p| p.parse::<Priority>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|e| invalid(rule_id, e))?;

        let sla_hours = match (positive(raw.sla_hours), positive(raw.hours_since_status_change)) {
            (Some(h), _) => Some(h),
            (None, Some(legacy)) => {
                log::debug!(
                    "rule {rule_id}: migrating hours_since_status_change={legacy} to sla_hours"
                );
                Some(legacy)
            }
            (None, None) => None,
        };

        for (name, value) in [
            ("hours_since_last_update", raw.hours_since_last_update),
            ("hours_since_creation", raw.hours_since_creation),
            ("reminder_interval_hours", raw.reminder_interval_hours),
        ] {
            if matches!(value, Some(v) if v < 0.0 || !v.is_finite()) {
                return Err(invalid(rule_id, format!("{name} must be a non-negative number")));
            }
        }

        let reminder = raw.is_reminder.then(|| ReminderPolicy {
            interval_hours: raw.reminder_interval_hours.unwrap_or(24.0),
        });

        Ok(Self {
            version: CONDITIONS_VERSION,
            statuses,
            priorities,
            time: TimeConditions {
                sla_hours,
                hours_since_last_update: raw.hours_since_last_update,
                hours_since_creation: raw.hours_since_creation,
            },
            reminder,
        })
    }

    pub fn is_reminder(&self) -> bool {
        self.reminder.is_some()
    }
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|h| h.is_finite() && *h > 0.0)
}

fn invalid(rule_id: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidConditions {
        rule_id: rule_id.to_string(),
        reason: reason.into(),
    }
}

//! Reminder rules: nudge the current assignee without escalating.
//!
//! A reminder never changes status or level. Its only durable effect is an
//! audit-log "reminder" entry, which is also how the next reminder is timed.

use crate::{
    candidate::EscalationCandidate,
    clock::minutes_since,
    conditions::ReminderPolicy,
    error::EngineResult,
    event::{AuditEntry, EngineEvent, AUDIT_ACTION_REMINDER},
    escalation::SYSTEM_TRIGGER,
    notification::{EscalationNotice, NoticeKind, Notifier},
    rule::EscalationRule,
    store::Store,
    types::Level,
};
use chrono::{DateTime, Utc};

pub const AUDIT_ENTITY_COMPLAINT: &str = "complaint";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderCheck {
    Sent { reason: String },
    NotDue { reason: String },
}

/// Send a reminder if none was sent yet, or the interval has elapsed since
/// the last one. The rule's conditions have already passed.
///
/// With `dry_run` set, a due reminder is reported but neither audited nor
/// sent, so the reminder timer is left untouched.
#[allow(clippy::too_many_arguments)]
pub fn send_if_due(
    store: &Store,
    notifier: &dyn Notifier,
    candidate: &EscalationCandidate,
    rule: &EscalationRule,
    policy: &ReminderPolicy,
    level: Level,
    now: DateTime<Utc>,
    dry_run: bool,
) -> EngineResult<ReminderCheck> {
    let last = store.last_audit_at(
        AUDIT_ENTITY_COMPLAINT,
        &candidate.complaint_id,
        AUDIT_ACTION_REMINDER,
    )?;

    let reason = match last {
        None => "First reminder: conditions met".to_string(),
        Some(last) => {
            let elapsed = minutes_since(last, now);
            let interval = policy.interval_hours * 60.0;
            if (elapsed as f64) < interval {
                return Ok(ReminderCheck::NotDue {
                    reason: format!(
                        "Reminder interval not elapsed: {elapsed} min since last reminder < {interval:.0} min"
                    ),
                });
            }
            format!("Repeat reminder: {elapsed} min since last reminder")
        }
    };

    if dry_run {
        return Ok(ReminderCheck::Sent {
            reason: format!("[dry-run] {reason}"),
        });
    }

    let event = EngineEvent::ReminderSent {
        complaint_id: candidate.complaint_id.clone(),
        rule_id: rule.rule_id.clone(),
        level,
        reason: reason.clone(),
    };
    store.append_audit(&AuditEntry {
        id: None,
        entity_type: AUDIT_ENTITY_COMPLAINT.to_string(),
        entity_id: candidate.complaint_id.clone(),
        action: AUDIT_ACTION_REMINDER.to_string(),
        actor: SYSTEM_TRIGGER.to_string(),
        payload: serde_json::to_string(&event)?,
        created_at: now,
    })?;

    let notice = EscalationNotice {
        kind: NoticeKind::Reminder,
        complaint_id: candidate.complaint_id.clone(),
        complaint_number: candidate.complaint_number.clone(),
        department_id: candidate.assigned_department_id.clone(),
        officer_id: candidate.assigned_officer_id.clone(),
        level,
        reason: reason.clone(),
    };
    if let Err(e) = notifier.notify(&notice) {
        log::warn!(
            "escalation: reminder notice for {} not delivered: {e}",
            candidate.complaint_number
        );
    }

    Ok(ReminderCheck::Sent { reason })
}

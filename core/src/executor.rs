//! One escalation attempt for one candidate.
//!
//! STEPS (each may end the attempt with a named no-op):
//!   1. Level check     true level from escalation history, not the cache
//!   2. Rule matching   level + optional department/location filters
//!   3. Conditions      first passing rule wins; reminders short-circuit
//!   4. Idempotency     no escalation at this level within the cooldown
//!   5. Target          rule target, else the complaint's own department
//!   6. Authority       tiered lookup; vacant assignee allowed by policy
//!   7. Write           one transaction, then best-effort side effects
//!
//! Only store errors propagate. Everything else is an `Outcome`.

use crate::{
    authority::AuthorityResolver,
    candidate::EscalationCandidate,
    complaint::{ActorType, StatusHistoryEntry},
    config::EngineConfig,
    error::{EngineError, EngineResult},
    escalation::{ComplaintEscalation, SYSTEM_TRIGGER},
    evaluator::evaluate,
    event::{AuditEntry, EngineEvent, AUDIT_ACTION_ESCALATION},
    notification::{EscalationNotice, NoticeKind, Notifier},
    outcome::{CandidateResult, Outcome, SkipReason},
    reminder::{self, ReminderCheck, AUDIT_ENTITY_COMPLAINT},
    rule::EscalationRule,
    store::{EscalationCommit, Store},
    types::{level_label, ComplaintStatus, Level},
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub struct EscalationExecutor<'a> {
    store: &'a Store,
    config: &'a EngineConfig,
    notifier: &'a dyn Notifier,
}

impl<'a> EscalationExecutor<'a> {
    pub fn new(store: &'a Store, config: &'a EngineConfig, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            config,
            notifier,
        }
    }

    pub fn process(
        &self,
        candidate: &EscalationCandidate,
        rules: &[EscalationRule],
        now: DateTime<Utc>,
    ) -> EngineResult<CandidateResult> {
        // 1. Level check.
        let level = self.store.current_escalation_level(&candidate.complaint_id)?;
        if candidate.current_escalation_level < level && !self.config.dry_run {
            log::debug!(
                "escalation: {} cached level {} behind history {}; refreshing",
                candidate.complaint_number,
                candidate.current_escalation_level,
                level
            );
            self.refresh_cached_level(candidate, level);
        }
        if level >= self.config.max_escalation_level {
            return Ok(skip(
                candidate,
                SkipReason::MaxLevelReached,
                format!("Already at {} (max level)", level_label(level)),
            ));
        }

        // 2. Rule matching.
        let matching: Vec<&EscalationRule> = rules
            .iter()
            .filter(|r| r.applies_to(candidate, level))
            .collect();
        if matching.is_empty() {
            return Ok(skip(
                candidate,
                SkipReason::NoMatchingRule,
                format!(
                    "No active rule for {} in department {} / location {}",
                    level_label(level),
                    candidate.assigned_department_id.as_deref().unwrap_or("-"),
                    candidate.location_id.as_deref().unwrap_or("-"),
                ),
            ));
        }

        // 3. Conditions, in rule order.
        let mut failures = Vec::new();
        let mut chosen = None;
        for rule in matching {
            let evaluation = evaluate(candidate, &rule.conditions, self.config, now);
            if !evaluation.passes {
                failures.push(format!("rule {}: {}", rule.rule_id, evaluation.reason));
                continue;
            }
            if let Some(policy) = &rule.conditions.reminder {
                match reminder::send_if_due(
                    self.store,
                    self.notifier,
                    candidate,
                    rule,
                    policy,
                    level,
                    now,
                    self.config.dry_run,
                )? {
                    ReminderCheck::Sent { reason } => {
                        log::info!(
                            "escalation: reminder {} for {} at {} (rule {})",
                            if self.config.dry_run { "due [dry-run]" } else { "sent" },
                            candidate.complaint_number,
                            level_label(level),
                            rule.rule_id
                        );
                        return Ok(CandidateResult {
                            complaint_id: candidate.complaint_id.clone(),
                            complaint_number: candidate.complaint_number.clone(),
                            outcome: Outcome::Reminded {
                                rule_id: rule.rule_id.clone(),
                                level,
                            },
                            reason,
                        });
                    }
                    ReminderCheck::NotDue { reason } => {
                        failures.push(format!("rule {}: {reason}", rule.rule_id));
                        continue;
                    }
                }
            }
            chosen = Some((rule, evaluation.reason));
            break;
        }
        let Some((rule, met_reason)) = chosen else {
            return Ok(skip(candidate, SkipReason::ConditionsNotMet, failures.join("; ")));
        };

        // 4. Idempotency. Backstop only: `level` is derived from history, so a
        // record at `level` exists only if another writer committed after the
        // level check. The compare-and-swap in `commit_escalation` is the guard
        // that always holds.
        let since = now - Duration::minutes(self.config.idempotency_cooldown_minutes);
        if self
            .store
            .escalated_at_level_since(&candidate.complaint_id, level, since)?
        {
            return Ok(skip(
                candidate,
                SkipReason::AlreadyEscalated,
                format!(
                    "Already escalated at {} within the last {} min",
                    level_label(level),
                    self.config.idempotency_cooldown_minutes
                ),
            ));
        }

        // 5. Target department and location.
        let Some(department_id) = rule
            .target_department_id
            .clone()
            .or_else(|| candidate.assigned_department_id.clone())
        else {
            log::warn!(
                "escalation: {} has no assigned department and rule {} names no target; cannot escalate",
                candidate.complaint_number,
                rule.rule_id
            );
            return Ok(skip(
                candidate,
                SkipReason::NoTargetDepartment,
                format!(
                    "No target department: complaint unassigned and rule {} has no target",
                    rule.rule_id
                ),
            ));
        };
        let location_id = rule
            .target_location_id
            .clone()
            .or_else(|| candidate.location_id.clone());
        // The complaint's pincode only locates it within its own location.
        let pincode = match rule.target_location_id {
            Some(_) => None,
            None => candidate.pincode.as_deref(),
        };

        // 6. Authority.
        let authority = AuthorityResolver::new(self.store).resolve_with_pincode(
            &department_id,
            location_id.as_deref(),
            pincode,
            level,
        )?;
        let officer_id = match authority {
            Some(a) => Some(a.officer_id),
            None if self.config.escalate_without_authority => {
                log::warn!(
                    "escalation: no authority for {} in {department_id}/{}; escalating with vacant assignee",
                    candidate.complaint_number,
                    location_id.as_deref().unwrap_or("*"),
                );
                None
            }
            None => {
                return Ok(skip(
                    candidate,
                    SkipReason::NoAuthority,
                    format!(
                        "No active {} authority in {department_id}",
                        level_label(level + 1)
                    ),
                ));
            }
        };

        let to_level = level + 1;
        let reason = format!(
            "Auto-escalated from {} to {} by rule {}: {met_reason}",
            level_label(level),
            level_label(to_level),
            rule.rule_id
        );

        if self.config.dry_run {
            log::info!("escalation: [dry-run] {} would escalate: {reason}", candidate.complaint_number);
            return Ok(CandidateResult {
                complaint_id: candidate.complaint_id.clone(),
                complaint_number: candidate.complaint_number.clone(),
                outcome: Outcome::WouldEscalate {
                    rule_id: rule.rule_id.clone(),
                    from_level: level,
                    to_level,
                    department_id,
                    officer_id,
                },
                reason: format!("[dry-run] {reason}"),
            });
        }

        // 7. Write.
        let history = StatusHistoryEntry {
            history_id: Uuid::new_v4().to_string(),
            complaint_id: candidate.complaint_id.clone(),
            old_status: Some(candidate.status),
            new_status: ComplaintStatus::Escalated,
            changed_by: None,
            changed_by_type: ActorType::System,
            reason: Some(reason.clone()),
            created_at: now,
        };
        let escalation = ComplaintEscalation {
            escalation_id: Uuid::new_v4().to_string(),
            complaint_id: candidate.complaint_id.clone(),
            from_department_id: candidate.assigned_department_id.clone(),
            from_officer_id: candidate.assigned_officer_id.clone(),
            to_department_id: department_id.clone(),
            to_officer_id: officer_id.clone(),
            escalation_level: level,
            reason: reason.clone(),
            triggered_by: SYSTEM_TRIGGER.to_string(),
            status_history_id: Some(history.history_id.clone()),
            created_at: now,
        };
        let committed = self.store.commit_escalation(&EscalationCommit {
            expected_status: candidate.status,
            history: &history,
            escalation: &escalation,
        })?;
        if !committed {
            return Ok(skip(
                candidate,
                SkipReason::ConcurrentlyModified,
                format!(
                    "Complaint changed since it was loaded (expected status '{}', {}); nothing written",
                    candidate.status,
                    level_label(level)
                ),
            ));
        }

        log::info!(
            "escalation: {} escalated {} -> {} to {department_id} (officer {})",
            candidate.complaint_number,
            level_label(level),
            level_label(to_level),
            officer_id.as_deref().unwrap_or("vacant"),
        );

        self.refresh_cached_level(candidate, to_level);
        self.emit_side_effects(candidate, rule, &escalation, now);

        Ok(CandidateResult {
            complaint_id: candidate.complaint_id.clone(),
            complaint_number: candidate.complaint_number.clone(),
            outcome: Outcome::Escalated {
                escalation_id: escalation.escalation_id,
                rule_id: rule.rule_id.clone(),
                from_level: level,
                to_level,
                department_id,
                officer_id,
            },
            reason,
        })
    }

    /// Best effort: history stays the source of truth if this fails.
    fn refresh_cached_level(&self, candidate: &EscalationCandidate, level: Level) {
        if let Err(e) = self
            .store
            .set_cached_escalation_level(&candidate.complaint_id, level)
        {
            log::warn!(
                "escalation: cached level update for {} failed: {e}",
                candidate.complaint_number
            );
        }
    }

    /// Audit, metric and notification. Failures are logged, never returned.
    fn emit_side_effects(
        &self,
        candidate: &EscalationCandidate,
        rule: &EscalationRule,
        escalation: &ComplaintEscalation,
        now: DateTime<Utc>,
    ) {
        let number = &candidate.complaint_number;
        let level = escalation.escalation_level;
        let event = EngineEvent::EscalationTriggered {
            complaint_id: candidate.complaint_id.clone(),
            rule_id: rule.rule_id.clone(),
            level,
            target_level: level + 1,
            department_id: escalation.to_department_id.clone(),
            officer_id: escalation.to_officer_id.clone(),
            reason: escalation.reason.clone(),
        };

        let audit = serde_json::to_string(&event)
            .map_err(EngineError::from)
            .and_then(|payload| {
                self.store.append_audit(&AuditEntry {
                    id: None,
                    entity_type: AUDIT_ENTITY_COMPLAINT.to_string(),
                    entity_id: candidate.complaint_id.clone(),
                    action: AUDIT_ACTION_ESCALATION.to_string(),
                    actor: SYSTEM_TRIGGER.to_string(),
                    payload,
                    created_at: now,
                })
            });
        if let Err(e) = audit {
            log::warn!("escalation: audit entry for {number} not written: {e}");
        }

        let metadata = serde_json::json!({
            "level": level,
            "target_level": level + 1,
            "department_id": escalation.to_department_id,
            "officer_id": escalation.to_officer_id,
            "rule_id": rule.rule_id,
            "reason": escalation.reason,
        });
        if let Err(e) =
            self.store
                .record_metric(event.name(), Some(&candidate.complaint_id), &metadata, now)
        {
            log::warn!("escalation: metric event for {number} not recorded: {e}");
        }

        let notice = EscalationNotice {
            kind: NoticeKind::Escalation,
            complaint_id: candidate.complaint_id.clone(),
            complaint_number: number.clone(),
            department_id: Some(escalation.to_department_id.clone()),
            officer_id: escalation.to_officer_id.clone(),
            level: level + 1,
            reason: escalation.reason.clone(),
        };
        if let Err(e) = self.notifier.notify(&notice) {
            log::warn!("escalation: notice for {number} not delivered: {e}");
        }
    }
}

fn skip(candidate: &EscalationCandidate, skip: SkipReason, reason: String) -> CandidateResult {
    log::debug!("escalation: {} skipped ({skip:?}): {reason}", candidate.complaint_number);
    CandidateResult {
        complaint_id: candidate.complaint_id.clone(),
        complaint_number: candidate.complaint_number.clone(),
        outcome: Outcome::Skipped { skip },
        reason,
    }
}

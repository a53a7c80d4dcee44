//! Condition evaluation. Pure: reads the candidate, the rule's conditions,
//! the config and the current time; never touches the store.
//!
//! Every failure carries a reason string. A complaint that silently fails to
//! escalate must be explainable from that string alone.

use crate::{
    candidate::EscalationCandidate,
    conditions::{EscalationConditions, TimeConditions},
    config::EngineConfig,
};
use chrono::{DateTime, Utc};

pub const ALL_CONDITIONS_MET: &str = "All conditions met";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passes: bool,
    pub reason: String,
}

impl Evaluation {
    fn pass() -> Self {
        Self {
            passes: true,
            reason: ALL_CONDITIONS_MET.to_string(),
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            passes: false,
            reason,
        }
    }
}

pub fn evaluate(
    candidate: &EscalationCandidate,
    conditions: &EscalationConditions,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Evaluation {
    if let Some(statuses) = &conditions.statuses {
        if !statuses.contains(&candidate.status) {
            return Evaluation::fail(format!(
                "Status condition not met: '{}' not in [{}]",
                candidate.status,
                join(statuses.iter().map(|s| s.as_str()))
            ));
        }
    }

    if let Some(priorities) = &conditions.priorities {
        if !priorities.contains(&candidate.priority) {
            return Evaluation::fail(format!(
                "Priority condition not met: '{}' not in [{}]",
                candidate.priority,
                join(priorities.iter().map(|p| p.as_str()))
            ));
        }
    }

    match check_time(candidate, &conditions.time, config, now) {
        Some(reason) => Evaluation::fail(reason),
        None => Evaluation::pass(),
    }
}

/// `None` when every present time check passes, else the first failure.
fn check_time(
    candidate: &EscalationCandidate,
    time: &TimeConditions,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Option<String> {
    if let Some(hours) = time.hours_since_last_update {
        let elapsed = candidate.minutes_since_last_update(now);
        if !reached(elapsed, hours * 60.0) {
            return Some(format!(
                "Last-update condition not met: {elapsed} min since last update < {} min",
                fmt_minutes(hours * 60.0)
            ));
        }
    }

    if let Some(sla_hours) = time.sla_hours {
        let elapsed = candidate.minutes_since_status_change(now);
        let (threshold, mode) = match config.sla_override() {
            Some((mode, minutes)) => (minutes as f64, Some(mode)),
            None => (sla_hours * 60.0, None),
        };
        if !reached(elapsed, threshold) {
            let source = match mode {
                Some(mode) => format!("{} override", mode.label()),
                None => format!("sla_hours={sla_hours}"),
            };
            return Some(format!(
                "SLA not breached: {elapsed} min since status change < {} min ({source})",
                fmt_minutes(threshold)
            ));
        }
    }

    if let Some(hours) = time.hours_since_creation {
        let elapsed = candidate.minutes_since_creation(now);
        if !reached(elapsed, hours * 60.0) {
            return Some(format!(
                "Creation-age condition not met: {elapsed} min since creation < {} min",
                fmt_minutes(hours * 60.0)
            ));
        }
    }

    None
}

fn reached(elapsed_minutes: i64, threshold_minutes: f64) -> bool {
    elapsed_minutes as f64 >= threshold_minutes
}

fn fmt_minutes(m: f64) -> String {
    if m.fract() == 0.0 {
        format!("{m:.0}")
    } else {
        format!("{m:.1}")
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::EscalationConditions;
    use crate::types::{ComplaintStatus, Priority};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    /// Created 10 days ago, last status change `changed_mins` ago.
    fn candidate(changed_mins: i64) -> EscalationCandidate {
        EscalationCandidate {
            complaint_id: "c1".into(),
            complaint_number: "CMP-0001".into(),
            status: ComplaintStatus::UnderReview,
            priority: Priority::High,
            assigned_department_id: Some("water".into()),
            assigned_officer_id: None,
            location_id: Some("ward-7".into()),
            pincode: None,
            created_at: now() - Duration::days(10),
            updated_at: Some(now() - Duration::hours(1)),
            last_status_change_at: now() - Duration::minutes(changed_mins),
            current_escalation_level: 0,
        }
    }

    fn conditions(json: &str) -> EscalationConditions {
        EscalationConditions::parse("test", json).unwrap()
    }

    #[test]
    fn no_conditions_always_pass() {
        let e = evaluate(&candidate(0), &conditions(""), &EngineConfig::default_test(), now());
        assert!(e.passes);
        assert_eq!(e.reason, ALL_CONDITIONS_MET);
    }

    #[test]
    fn status_filter_rejects_other_statuses() {
        let e = evaluate(
            &candidate(600),
            &conditions(r#"{"status": ["verified"]}"#),
            &EngineConfig::default_test(),
            now(),
        );
        assert!(!e.passes);
        assert!(e.reason.starts_with("Status condition not met"), "{}", e.reason);
    }

    #[test]
    fn priority_filter_rejects_other_priorities() {
        let e = evaluate(
            &candidate(600),
            &conditions(r#"{"priority": ["urgent"]}"#),
            &EngineConfig::default_test(),
            now(),
        );
        assert!(!e.passes);
        assert!(e.reason.starts_with("Priority condition not met"), "{}", e.reason);
    }

    #[test]
    fn sla_in_hours_is_compared_in_minutes() {
        let c = conditions(r#"{"sla_hours": 2}"#);
        let config = EngineConfig::default_test();
        assert!(!evaluate(&candidate(119), &c, &config, now()).passes);
        assert!(evaluate(&candidate(120), &c, &config, now()).passes);
    }

    #[test]
    fn legacy_sla_alias_is_honoured() {
        let c = conditions(r#"{"hours_since_status_change": 1}"#);
        let config = EngineConfig::default_test();
        assert!(!evaluate(&candidate(59), &c, &config, now()).passes);
        assert!(evaluate(&candidate(60), &c, &config, now()).passes);
    }

    #[test]
    fn test_mode_override_replaces_rule_sla() {
        let c = conditions(r#"{"sla_hours": 48}"#);
        let config = EngineConfig {
            test_mode_sla_minutes: Some(2),
            ..EngineConfig::default_test()
        };
        assert!(evaluate(&candidate(2), &c, &config, now()).passes);

        let e = evaluate(&candidate(1), &c, &config, now());
        assert!(!e.passes);
        assert!(e.reason.contains("test mode override"), "{}", e.reason);
    }

    #[test]
    fn dry_run_override_is_named_in_reason() {
        let c = conditions(r#"{"sla_hours": 48}"#);
        let config = EngineConfig {
            dry_run: true,
            dry_run_sla_override_minutes: Some(30),
            ..EngineConfig::default_test()
        };
        let e = evaluate(&candidate(10), &c, &config, now());
        assert!(!e.passes);
        assert!(e.reason.contains("dry-run override"), "{}", e.reason);
        assert!(evaluate(&candidate(30), &c, &config, now()).passes);
    }

    #[test]
    fn unconfigured_sla_reason_names_rule_hours() {
        let e = evaluate(
            &candidate(10),
            &conditions(r#"{"sla_hours": 24}"#),
            &EngineConfig::default_test(),
            now(),
        );
        assert!(e.reason.contains("sla_hours=24"), "{}", e.reason);
    }

    #[test]
    fn all_time_checks_must_pass() {
        // Status change and creation age satisfied, last update only 60 min ago.
        let c = conditions(
            r#"{"sla_hours": 1, "hours_since_creation": 24, "hours_since_last_update": 2}"#,
        );
        let e = evaluate(&candidate(600), &c, &EngineConfig::default_test(), now());
        assert!(!e.passes);
        assert!(e.reason.starts_with("Last-update condition not met"), "{}", e.reason);
    }

    #[test]
    fn creation_age_is_checked() {
        let c = conditions(r#"{"hours_since_creation": 720}"#);
        let e = evaluate(&candidate(600), &c, &EngineConfig::default_test(), now());
        assert!(!e.passes);
        assert!(e.reason.starts_with("Creation-age condition not met"), "{}", e.reason);
    }

    #[test]
    fn missing_update_time_falls_back_to_creation() {
        let mut cand = candidate(600);
        cand.updated_at = None;
        let c = conditions(r#"{"hours_since_last_update": 48}"#);
        assert!(evaluate(&cand, &c, &EngineConfig::default_test(), now()).passes);
    }

    #[test]
    fn future_status_change_counts_as_zero_minutes() {
        let cand = candidate(-30);
        assert_eq!(cand.minutes_since_status_change(now()), 0);
        let config = EngineConfig {
            test_mode_sla_minutes: Some(0),
            ..EngineConfig::default_test()
        };
        assert!(evaluate(&cand, &conditions(r#"{"sla_hours": 1}"#), &config, now()).passes);
    }
}

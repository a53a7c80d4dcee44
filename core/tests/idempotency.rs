//! Idempotency tests: repeated and overlapping runs never double-escalate.

mod common;

use chrono::Duration;
use common::*;
use grievance_core::{
    complaint::{ActorType, StatusHistoryEntry},
    engine::EscalationEngine,
    escalation::ComplaintEscalation,
    executor::EscalationExecutor,
    notification::LogNotifier,
    outcome::SkipReason,
    store::{EscalationCommit, Store},
    types::ComplaintStatus,
};
use std::sync::Arc;

fn escalation_at(level: u8, id: &str) -> (StatusHistoryEntry, ComplaintEscalation) {
    let history = StatusHistoryEntry {
        history_id: format!("h-{id}"),
        complaint_id: "c1".into(),
        old_status: Some(ComplaintStatus::UnderReview),
        new_status: ComplaintStatus::Escalated,
        changed_by: None,
        changed_by_type: ActorType::System,
        reason: Some("manual fixture".into()),
        created_at: t0(),
    };
    let escalation = ComplaintEscalation {
        escalation_id: id.to_string(),
        complaint_id: "c1".into(),
        from_department_id: Some("water".into()),
        from_officer_id: None,
        to_department_id: "water".into(),
        to_officer_id: None,
        escalation_level: level,
        reason: "manual fixture".into(),
        triggered_by: "system".into(),
        status_history_id: Some(history.history_id.clone()),
        created_at: t0(),
    };
    (history, escalation)
}

/// Two cycles back to back: one escalation record, second cycle is a no-op.
#[test]
fn back_to_back_cycles_escalate_once() {
    let h = harness(pilot_config());
    file_stale(h.store(), "c1", 10);
    add_rule(h.store(), "r-l1", 0, r#"{"sla_hours": 24}"#, None, 0);

    let first = h.engine.run_cycle().unwrap();
    let second = h.engine.run_cycle().unwrap();

    assert_eq!(first.stats.escalated, 1);
    assert_eq!(second.stats.escalated, 0);
    assert_eq!(
        second.result_for("c1").unwrap().skip_reason(),
        Some(SkipReason::NoMatchingRule)
    );
    assert_eq!(h.store().escalations_for("c1").unwrap().len(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

/// The cooldown window is measured from the recorded escalation time.
#[test]
fn cooldown_window_finds_recent_escalation_at_level() {
    let h = harness(pilot_config());
    file_stale(h.store(), "c1", 10);
    add_rule(h.store(), "r-l1", 0, "", None, 0);
    h.engine.run_cycle().unwrap();

    let store = h.store();
    assert!(store
        .escalated_at_level_since("c1", 0, t0() - Duration::minutes(60))
        .unwrap());
    assert!(store.escalated_at_level_since("c1", 0, t0()).unwrap());
    assert!(!store
        .escalated_at_level_since("c1", 0, t0() + Duration::minutes(1))
        .unwrap());
    assert!(!store
        .escalated_at_level_since("c1", 1, t0() - Duration::minutes(60))
        .unwrap());
    assert_eq!(store.last_escalated_at("c1").unwrap(), Some(t0()));
}

/// The write is a compare-and-swap on status and level: a stale claim
/// writes nothing at all.
#[test]
fn commit_is_rejected_when_claim_is_stale() {
    let h = harness(pilot_config());
    file_stale(h.store(), "c1", 10);
    let store = h.store();

    let (history, escalation) = escalation_at(0, "e-stale");
    let stale = EscalationCommit {
        expected_status: ComplaintStatus::Verified,
        history: &history,
        escalation: &escalation,
    };
    assert!(!store.commit_escalation(&stale).unwrap());
    assert!(store.escalations_for("c1").unwrap().is_empty());
    assert_eq!(store.status_history("c1").unwrap().len(), 1);
    assert_eq!(
        store.get_complaint("c1").unwrap().status,
        ComplaintStatus::UnderReview
    );

    let fresh = EscalationCommit {
        expected_status: ComplaintStatus::UnderReview,
        ..stale
    };
    assert!(store.commit_escalation(&fresh).unwrap());

    let (history2, escalation2) = escalation_at(0, "e-dup");
    let duplicate = EscalationCommit {
        expected_status: ComplaintStatus::Escalated,
        history: &history2,
        escalation: &escalation2,
    };
    assert!(
        !store.commit_escalation(&duplicate).unwrap(),
        "a second escalation at the same level must lose"
    );
    assert_eq!(store.escalations_for("c1").unwrap().len(), 1);
    assert_eq!(store.status_history("c1").unwrap().len(), 2);
}

/// A candidate loaded before another writer escalated it loses the race.
#[test]
fn stale_candidate_is_reported_as_concurrently_modified() {
    let h = harness(pilot_config());
    file_stale(h.store(), "c1", 10);
    add_rule(h.store(), "r-l1", 0, "", None, 0);
    add_rule(h.store(), "r-l2", 1, "", None, 1);

    let snapshot = h.store().list_escalation_candidates().unwrap();
    let rules = h.engine.load_rules().unwrap();
    h.engine.run_cycle().unwrap();

    let config = pilot_config();
    let executor = EscalationExecutor::new(h.store(), &config, &LogNotifier);
    let result = executor.process(&snapshot[0], &rules, t0()).unwrap();

    assert_eq!(result.skip_reason(), Some(SkipReason::ConcurrentlyModified));
    assert_eq!(h.store().escalations_for("c1").unwrap().len(), 1);
    assert_eq!(h.store().current_escalation_level("c1").unwrap(), 1);
}

/// Two engines on one database file, interleaved: exactly one escalation.
#[test]
fn two_engines_on_one_database_do_not_double_escalate() {
    let path = std::env::temp_dir().join(format!("escalation-{}.db", uuid::Uuid::new_v4()));
    let path = path.to_string_lossy().into_owned();

    let store_a = Store::open(&path).unwrap();
    store_a.migrate().unwrap();
    let store_b = store_a.reopen().unwrap();
    store_b.migrate().unwrap();

    file_stale(&store_a, "c1", 10);
    add_rule(&store_a, "r-l1", 0, r#"{"sla_hours": 24}"#, None, 0);

    let clock = Arc::new(grievance_core::clock::FixedClock::new(t0()));
    let engine_a = EscalationEngine::new(store_a, pilot_config()).with_clock(clock.clone());
    let engine_b = EscalationEngine::new(store_b, pilot_config()).with_clock(clock);

    let a = engine_a.run_cycle().unwrap();
    let b = engine_b.run_cycle().unwrap();

    assert_eq!(a.stats.escalated + b.stats.escalated, 1);
    assert_eq!(engine_a.store().escalation_count().unwrap(), 1);
    assert_eq!(engine_b.store().escalations_for("c1").unwrap().len(), 1);

    drop(engine_a);
    drop(engine_b);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}

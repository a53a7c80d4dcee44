//! Shared fixtures for escalation integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use grievance_core::{
    authority::Officer,
    clock::FixedClock,
    complaint::{ActorType, ComplaintRecord, StatusHistoryEntry},
    config::EngineConfig,
    engine::EscalationEngine,
    notification::{EscalationNotice, Notifier},
    rule::RuleRow,
    store::Store,
    types::{ComplaintStatus, Level, Priority},
};
use std::sync::{Arc, Mutex};

/// Fixed "now" for every test: 2026-06-01 10:00:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<EscalationNotice>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self { notices: Mutex::new(Vec::new()), fail: true }
    }

    pub fn sent(&self) -> Vec<EscalationNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &EscalationNotice) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("smtp relay unreachable");
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

pub struct Harness {
    pub engine: EscalationEngine,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn store(&self) -> &Store {
        self.engine.store()
    }
}

/// Pilot-style config: 2-minute SLA override.
pub fn pilot_config() -> EngineConfig {
    EngineConfig {
        test_mode_sla_minutes: Some(2),
        ..EngineConfig::default_test()
    }
}

pub fn harness(config: EngineConfig) -> Harness {
    harness_with(config, RecordingNotifier::default())
}

pub fn harness_with(config: EngineConfig, notifier: RecordingNotifier) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Store::in_memory().expect("open in-memory store");
    store.migrate().expect("migrate");
    let clock = Arc::new(FixedClock::new(t0()));
    let notifier = Arc::new(notifier);
    let engine = EscalationEngine::new(store, config)
        .with_clock(clock.clone())
        .with_notifier(notifier.clone());
    Harness { engine, clock, notifier }
}

pub fn complaint(id: &str, department: Option<&str>, status: ComplaintStatus) -> ComplaintRecord {
    ComplaintRecord {
        complaint_id: id.to_string(),
        complaint_number: format!("CMP-{}", id.to_uppercase()),
        status,
        priority: Priority::Medium,
        assigned_department_id: department.map(String::from),
        assigned_officer_id: None,
        location_id: Some("ward-7".into()),
        pincode: Some("560001".into()),
        created_at: t0() - Duration::days(3),
        updated_at: None,
        current_escalation_level: 0,
    }
}

/// Insert the complaint plus one history row marking its last status change.
pub fn file_complaint(store: &Store, c: &ComplaintRecord, changed_at: DateTime<Utc>) {
    store.insert_complaint(c).unwrap();
    store
        .append_status_history(&StatusHistoryEntry {
            history_id: format!("h-{}-{}", c.complaint_id, changed_at.timestamp_micros()),
            complaint_id: c.complaint_id.clone(),
            old_status: Some(ComplaintStatus::Submitted),
            new_status: c.status,
            changed_by: Some("officer-1".into()),
            changed_by_type: ActorType::Officer,
            reason: None,
            created_at: changed_at,
        })
        .unwrap();
}

/// Common case: under review in `water`, last changed `mins_ago` minutes before t0.
pub fn file_stale(store: &Store, id: &str, mins_ago: i64) -> ComplaintRecord {
    let c = complaint(id, Some("water"), ComplaintStatus::UnderReview);
    file_complaint(store, &c, t0() - Duration::minutes(mins_ago));
    c
}

/// Rules are ordered by insertion: `order` spaces their created_at.
pub fn add_rule(
    store: &Store,
    rule_id: &str,
    level: Level,
    conditions: &str,
    target_department: Option<&str>,
    order: i64,
) {
    store
        .upsert_rule(
            &RuleRow {
                rule_id: rule_id.to_string(),
                source_department_id: None,
                source_location_id: None,
                target_department_id: target_department.map(String::from),
                target_location_id: None,
                escalation_level: level,
                conditions_json: conditions.to_string(),
                is_active: true,
            },
            t0() - Duration::days(30) + Duration::seconds(order),
        )
        .unwrap();
}

pub fn add_officer(store: &Store, id: &str, code: &str, department: &str, active: bool) {
    store
        .insert_officer(&Officer {
            officer_id: id.to_string(),
            officer_code: code.to_string(),
            name: format!("Officer {id}"),
            department_id: department.to_string(),
            location_id: Some("ward-7".into()),
            is_active: active,
        })
        .unwrap();
}

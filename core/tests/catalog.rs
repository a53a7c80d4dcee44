//! The shipped rule catalog and engine config load and behave.

mod common;

use common::*;
use chrono::Duration;
use grievance_core::{
    complaint::ComplaintRecord,
    config::EngineConfig,
    outcome::Outcome,
    rule::RuleCatalog,
    types::{ComplaintStatus, Priority},
};

const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");

#[test]
fn shipped_catalog_compiles_every_rule() {
    let catalog = RuleCatalog::load(DATA_DIR).unwrap();
    assert!(!catalog.rules.is_empty());

    let h = harness(pilot_config());
    let written = h.engine.sync_rule_catalog(&catalog).unwrap();
    assert_eq!(written, catalog.rules.len());

    let active = catalog.rules.iter().filter(|r| r.is_active).count();
    assert_eq!(h.engine.load_rules().unwrap().len(), active);
}

/// Re-syncing updates in place and keeps rule order stable.
#[test]
fn catalog_sync_is_repeatable() {
    let catalog = RuleCatalog::load(DATA_DIR).unwrap();
    let h = harness(pilot_config());
    h.engine.sync_rule_catalog(&catalog).unwrap();
    let first: Vec<String> = h.engine.load_rules().unwrap().into_iter().map(|r| r.rule_id).collect();

    h.clock.advance(Duration::hours(1));
    h.engine.sync_rule_catalog(&catalog).unwrap();
    let second: Vec<String> = h.engine.load_rules().unwrap().into_iter().map(|r| r.rule_id).collect();
    assert_eq!(first, second);
}

#[test]
fn shipped_config_is_production_shaped() {
    let config = EngineConfig::load(DATA_DIR).unwrap();
    assert!(config.cycle_interval_secs >= 60);
    assert_eq!(config.max_escalation_level, 2);
    assert!(config.escalate_without_authority);
}

/// Real SLAs, no override: an urgent complaint 30h in review breaches the
/// 24h urgent rule while the 72h default rule is still waiting.
#[test]
fn urgent_complaint_breaches_shipped_urgent_rule() {
    let h = harness(EngineConfig::default_test());
    h.engine
        .sync_rule_catalog(&RuleCatalog::load(DATA_DIR).unwrap())
        .unwrap();
    let c = ComplaintRecord {
        priority: Priority::Urgent,
        ..complaint("u1", Some("water"), ComplaintStatus::UnderReview)
    };
    file_complaint(h.store(), &c, t0() - Duration::hours(30));
    file_stale(h.store(), "m1", 30 * 60);

    let report = h.engine.run_cycle().unwrap();
    match &report.result_for("u1").unwrap().outcome {
        Outcome::Escalated { rule_id, .. } => assert_eq!(rule_id, "urgent-l1-sla"),
        other => panic!("expected escalation, got {other:?}"),
    }
    let medium = report.result_for("m1").unwrap();
    assert!(!medium.is_escalated());
    assert!(medium.reason.contains("sla_hours=72"), "{}", medium.reason);
}

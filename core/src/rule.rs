//! Escalation rules: stored rows, compiled rules, and the JSON rule catalog.
//!
//! A rule fires FROM `escalation_level` (the complaint's current level) and
//! moves the complaint to `escalation_level + 1`. Unset source filters are
//! wildcards; an unset target department means "stay in the complaint's own
//! department", resolved at execution time.

use crate::{
    candidate::EscalationCandidate,
    conditions::EscalationConditions,
    error::EngineResult,
    types::{DepartmentId, Level, LocationId, RuleId},
};
use serde::{Deserialize, Serialize};

/// Row from the `escalation_rule` table. Conditions are still raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub rule_id: RuleId,
    pub source_department_id: Option<DepartmentId>,
    pub source_location_id: Option<LocationId>,
    pub target_department_id: Option<DepartmentId>,
    pub target_location_id: Option<LocationId>,
    pub escalation_level: Level,
    pub conditions_json: String,
    pub is_active: bool,
}

/// A rule with parsed conditions, ready for evaluation.
/// Immutable for the duration of a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationRule {
    pub rule_id: RuleId,
    pub source_department_id: Option<DepartmentId>,
    pub source_location_id: Option<LocationId>,
    pub target_department_id: Option<DepartmentId>,
    pub target_location_id: Option<LocationId>,
    pub escalation_level: Level,
    pub conditions: EscalationConditions,
}

impl EscalationRule {
    pub fn compile(row: RuleRow) -> EngineResult<Self> {
        let conditions = EscalationConditions::parse(&row.rule_id, &row.conditions_json)?;
        Ok(Self {
            rule_id: row.rule_id,
            source_department_id: row.source_department_id,
            source_location_id: row.source_location_id,
            target_department_id: row.target_department_id,
            target_location_id: row.target_location_id,
            escalation_level: row.escalation_level,
            conditions,
        })
    }

    /// Level and source filters only. Conditions are the evaluator's job.
    pub fn applies_to(&self, candidate: &EscalationCandidate, current_level: Level) -> bool {
        if self.escalation_level != current_level {
            return false;
        }
        let dept_ok = match &self.source_department_id {
            None => true,
            Some(d) => candidate.assigned_department_id.as_deref() == Some(d.as_str()),
        };
        let loc_ok = match &self.source_location_id {
            None => true,
            Some(l) => candidate.location_id.as_deref() == Some(l.as_str()),
        };
        dept_ok && loc_ok
    }
}

/// Compile stored rows, dropping any rule whose conditions do not parse.
pub fn compile_rules(rows: Vec<RuleRow>) -> Vec<EscalationRule> {
    rows.into_iter()
        .filter_map(|row| match EscalationRule::compile(row) {
            Ok(rule) => Some(rule),
            Err(e) => {
                log::warn!("escalation: skipping rule: {e}");
                None
            }
        })
        .collect()
}

// ── Rule catalog file ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub rule_id: RuleId,
    #[serde(default)]
    pub source_department_id: Option<DepartmentId>,
    #[serde(default)]
    pub source_location_id: Option<LocationId>,
    #[serde(default)]
    pub target_department_id: Option<DepartmentId>,
    #[serde(default)]
    pub target_location_id: Option<LocationId>,
    pub escalation_level: Level,
    #[serde(default)]
    pub conditions: serde_json::Value,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl RuleDefinition {
    pub fn into_row(self) -> RuleRow {
        let conditions_json = if self.conditions.is_null() {
            String::new()
        } else {
            self.conditions.to_string()
        };
        RuleRow {
            rule_id: self.rule_id,
            source_department_id: self.source_department_id,
            source_location_id: self.source_location_id,
            target_department_id: self.target_department_id,
            target_location_id: self.target_location_id,
            escalation_level: self.escalation_level,
            conditions_json,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleCatalog {
    pub rules: Vec<RuleDefinition>,
}

impl RuleCatalog {
    /// Load `escalation_rules.json` from the data directory.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/escalation_rules.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let catalog: RuleCatalog = serde_json::from_str(&content)?;
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComplaintStatus, Priority};
    use chrono::{TimeZone, Utc};

    fn candidate(dept: Option<&str>, loc: Option<&str>) -> EscalationCandidate {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        EscalationCandidate {
            complaint_id: "c1".into(),
            complaint_number: "CMP-1".into(),
            status: ComplaintStatus::UnderReview,
            priority: Priority::Medium,
            assigned_department_id: dept.map(String::from),
            assigned_officer_id: None,
            location_id: loc.map(String::from),
            pincode: None,
            created_at: t,
            updated_at: None,
            last_status_change_at: t,
            current_escalation_level: 0,
        }
    }

    fn rule(level: Level, dept: Option<&str>, loc: Option<&str>) -> EscalationRule {
        EscalationRule {
            rule_id: "r".into(),
            source_department_id: dept.map(String::from),
            source_location_id: loc.map(String::from),
            target_department_id: None,
            target_location_id: None,
            escalation_level: level,
            conditions: EscalationConditions::default(),
        }
    }

    #[test]
    fn global_rule_matches_any_department() {
        let c = candidate(Some("water"), Some("ward-7"));
        assert!(rule(0, None, None).applies_to(&c, 0));
        assert!(!rule(1, None, None).applies_to(&c, 0));
    }

    #[test]
    fn department_filter_must_match() {
        let c = candidate(Some("water"), None);
        assert!(rule(0, Some("water"), None).applies_to(&c, 0));
        assert!(!rule(0, Some("roads"), None).applies_to(&c, 0));
        let unassigned = candidate(None, None);
        assert!(!rule(0, Some("water"), None).applies_to(&unassigned, 0));
    }

    #[test]
    fn location_filter_must_match() {
        let c = candidate(Some("water"), Some("ward-7"));
        assert!(rule(0, None, Some("ward-7")).applies_to(&c, 0));
        assert!(!rule(0, None, Some("ward-8")).applies_to(&c, 0));
    }

    #[test]
    fn bad_conditions_are_dropped_on_compile() {
        let good = RuleRow {
            rule_id: "good".into(),
            source_department_id: None,
            source_location_id: None,
            target_department_id: None,
            target_location_id: None,
            escalation_level: 0,
            conditions_json: r#"{"sla_hours": 24}"#.into(),
            is_active: true,
        };
        let bad = RuleRow {
            rule_id: "bad".into(),
            conditions_json: "{oops".into(),
            ..good.clone()
        };
        let rules = compile_rules(vec![bad, good]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id, "good");
    }

    #[test]
    fn definition_with_no_conditions_stores_empty_blob() {
        let def: RuleDefinition =
            serde_json::from_str(r#"{"rule_id": "r0", "escalation_level": 0}"#).unwrap();
        let row = def.into_row();
        assert!(row.is_active);
        assert_eq!(row.conditions_json, "");
    }
}

use super::{encode_ts, level_col, Store};
use crate::{error::EngineResult, rule::RuleRow};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl Store {
    // ── Escalation rules ───────────────────────────────────────────

    /// Insert or replace a rule by id. `created_at` (rule order) is kept on
    /// replace.
    pub fn upsert_rule(&self, rule: &RuleRow, now: DateTime<Utc>) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO escalation_rule (
                rule_id, source_department_id, source_location_id,
                target_department_id, target_location_id, escalation_level,
                conditions, is_active, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(rule_id) DO UPDATE SET
                source_department_id = excluded.source_department_id,
                source_location_id   = excluded.source_location_id,
                target_department_id = excluded.target_department_id,
                target_location_id   = excluded.target_location_id,
                escalation_level     = excluded.escalation_level,
                conditions           = excluded.conditions,
                is_active            = excluded.is_active",
            params![
                &rule.rule_id,
                rule.source_department_id.as_deref(),
                rule.source_location_id.as_deref(),
                rule.target_department_id.as_deref(),
                rule.target_location_id.as_deref(),
                i64::from(rule.escalation_level),
                &rule.conditions_json,
                if rule.is_active { 1i32 } else { 0i32 },
                encode_ts(&now),
            ],
        )?;
        Ok(())
    }

    /// Active rules in evaluation order (oldest first).
    pub fn list_active_rules(&self) -> EngineResult<Vec<RuleRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT rule_id, source_department_id, source_location_id,
                    target_department_id, target_location_id, escalation_level,
                    conditions, is_active
             FROM escalation_rule
             WHERE is_active = 1
             ORDER BY created_at ASC, rule_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RuleRow {
                rule_id: row.get(0)?,
                source_department_id: row.get(1)?,
                source_location_id: row.get(2)?,
                target_department_id: row.get(3)?,
                target_location_id: row.get(4)?,
                escalation_level: level_col(row, 5)?,
                conditions_json: row.get(6)?,
                is_active: row.get::<_, i32>(7)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

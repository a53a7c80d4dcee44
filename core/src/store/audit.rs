//! Audit log and metric events. Both are written best-effort by the engine.

use super::{encode_ts, opt_ts_col, ts_col, Store};
use crate::{error::EngineResult, event::AuditEntry};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl Store {
    // ── Audit log ──────────────────────────────────────────────────

    pub fn append_audit(&self, entry: &AuditEntry) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO audit_log (entity_type, entity_id, action, actor, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &entry.entity_type,
                &entry.entity_id,
                &entry.action,
                &entry.actor,
                &entry.payload,
                encode_ts(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn audit_entries_for(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> EngineResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, action, actor, payload, created_at
             FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![entity_type, entity_id], |row| {
            Ok(AuditEntry {
                id: Some(row.get(0)?),
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
                action: row.get(3)?,
                actor: row.get(4)?,
                payload: row.get(5)?,
                created_at: ts_col(row, 6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Time of the latest audit entry with `action` for the entity.
    pub fn last_audit_at(
        &self,
        entity_type: &str,
        entity_id: &str,
        action: &str,
    ) -> EngineResult<Option<DateTime<Utc>>> {
        self.conn
            .query_row(
                "SELECT MAX(created_at) FROM audit_log
                 WHERE entity_type = ?1 AND entity_id = ?2 AND action = ?3",
                params![entity_type, entity_id, action],
                |row| opt_ts_col(row, 0),
            )
            .map_err(Into::into)
    }

    // ── Metric events ──────────────────────────────────────────────

    pub fn record_metric(
        &self,
        event_name: &str,
        entity_id: Option<&str>,
        metadata: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO metric_event (event_name, entity_id, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![event_name, entity_id, metadata.to_string(), encode_ts(&now)],
        )?;
        Ok(())
    }

    pub fn metric_count(&self, event_name: &str) -> EngineResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM metric_event WHERE event_name = ?1",
            params![event_name],
            |row| row.get(0),
        )?)
    }
}

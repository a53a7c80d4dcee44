//! Escalation history: level derivation, idempotency, and the escalation write.

use super::{complaint::insert_history, encode_ts, level_col, opt_ts_col, ts_col, Store};
use crate::{
    complaint::StatusHistoryEntry,
    error::EngineResult,
    escalation::ComplaintEscalation,
    types::{ComplaintStatus, Level},
};
use chrono::{DateTime, Utc};
use rusqlite::params;

/// Everything written when a complaint escalates.
pub struct EscalationCommit<'a> {
    /// Status observed when the candidate was loaded. The update only
    /// applies if the complaint still has it.
    pub expected_status: ComplaintStatus,
    pub history: &'a StatusHistoryEntry,
    pub escalation: &'a ComplaintEscalation,
}

fn escalation_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintEscalation> {
    Ok(ComplaintEscalation {
        escalation_id: row.get(0)?,
        complaint_id: row.get(1)?,
        from_department_id: row.get(2)?,
        from_officer_id: row.get(3)?,
        to_department_id: row.get(4)?,
        to_officer_id: row.get(5)?,
        escalation_level: level_col(row, 6)?,
        reason: row.get(7)?,
        triggered_by: row.get(8)?,
        status_history_id: row.get(9)?,
        created_at: ts_col(row, 10)?,
    })
}

impl Store {
    // ── Escalation ─────────────────────────────────────────────────

    /// Highest pre-escalation level recorded for the complaint, if any.
    pub fn max_escalation_level(&self, complaint_id: &str) -> EngineResult<Option<Level>> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(escalation_level) FROM complaint_escalation WHERE complaint_id = ?1",
            params![complaint_id],
            |row| row.get(0),
        )?;
        Ok(max.map(|m| m.clamp(0, i64::from(u8::MAX)) as Level))
    }

    /// The complaint's true level, derived from history: one above the
    /// highest recorded escalation, or 0 when it has never escalated.
    pub fn current_escalation_level(&self, complaint_id: &str) -> EngineResult<Level> {
        Ok(self
            .max_escalation_level(complaint_id)?
            .map_or(0, |m| m.saturating_add(1)))
    }

    /// Whether an escalation at `level` was recorded at or after `since`.
    pub fn escalated_at_level_since(
        &self,
        complaint_id: &str,
        level: Level,
        since: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM complaint_escalation
             WHERE complaint_id = ?1 AND escalation_level = ?2 AND created_at >= ?3",
            params![complaint_id, i64::from(level), encode_ts(&since)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn escalations_for(&self, complaint_id: &str) -> EngineResult<Vec<ComplaintEscalation>> {
        let mut stmt = self.conn.prepare(
            "SELECT escalation_id, complaint_id, from_department_id, from_officer_id,
                    to_department_id, to_officer_id, escalation_level, reason,
                    triggered_by, status_history_id, created_at
             FROM complaint_escalation WHERE complaint_id = ?1
             ORDER BY created_at ASC, escalation_id ASC",
        )?;
        let rows = stmt.query_map(params![complaint_id], escalation_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn escalation_count(&self) -> EngineResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM complaint_escalation", [], |row| row.get(0))?)
    }

    /// Most recent escalation time for a complaint, if any.
    pub fn last_escalated_at(&self, complaint_id: &str) -> EngineResult<Option<DateTime<Utc>>> {
        self.conn
            .query_row(
                "SELECT MAX(created_at) FROM complaint_escalation WHERE complaint_id = ?1",
                params![complaint_id],
                |row| opt_ts_col(row, 0),
            )
            .map_err(Into::into)
    }

    /// Apply an escalation in one transaction: complaint update, history row,
    /// escalation row.
    ///
    /// The complaint update is a compare-and-swap: it only applies while the
    /// complaint still has `expected_status` and no escalation at this level
    /// or above exists. Returns `false` (and writes nothing) when the claim
    /// loses.
    pub fn commit_escalation(&self, commit: &EscalationCommit<'_>) -> EngineResult<bool> {
        let esc = commit.escalation;
        let tx = self.conn.unchecked_transaction()?;

        let claimed = tx.execute(
            "UPDATE complaint
             SET status = ?1, assigned_department_id = ?2, assigned_officer_id = ?3,
                 updated_at = ?4
             WHERE complaint_id = ?5 AND status = ?6
               AND NOT EXISTS (
                   SELECT 1 FROM complaint_escalation
                   WHERE complaint_id = ?5 AND escalation_level >= ?7
               )",
            params![
                commit.history.new_status.as_str(),
                &esc.to_department_id,
                esc.to_officer_id.as_deref(),
                encode_ts(&esc.created_at),
                &esc.complaint_id,
                commit.expected_status.as_str(),
                i64::from(esc.escalation_level),
            ],
        )?;
        if claimed == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        insert_history(&tx, commit.history)?;
        tx.execute(
            "INSERT INTO complaint_escalation (
                escalation_id, complaint_id, from_department_id, from_officer_id,
                to_department_id, to_officer_id, escalation_level, reason,
                triggered_by, status_history_id, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &esc.escalation_id,
                &esc.complaint_id,
                esc.from_department_id.as_deref(),
                esc.from_officer_id.as_deref(),
                &esc.to_department_id,
                esc.to_officer_id.as_deref(),
                i64::from(esc.escalation_level),
                &esc.reason,
                &esc.triggered_by,
                esc.status_history_id.as_deref(),
                encode_ts(&esc.created_at),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

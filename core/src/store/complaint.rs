use super::{encode_ts, enum_col, level_col, opt_enum_col, opt_ts_col, ts_col, Store};
use crate::{
    candidate::EscalationCandidate,
    complaint::{ActorType, ComplaintRecord, StatusHistoryEntry},
    error::{EngineError, EngineResult},
    types::{ComplaintStatus, Level},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

const COMPLAINT_COLUMNS: &str = "complaint_id, complaint_number, status, priority,
    assigned_department_id, assigned_officer_id, location_id, pincode,
    created_at, updated_at, current_escalation_level";

fn complaint_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintRecord> {
    Ok(ComplaintRecord {
        complaint_id: row.get(0)?,
        complaint_number: row.get(1)?,
        status: enum_col(row, 2)?,
        priority: enum_col(row, 3)?,
        assigned_department_id: row.get(4)?,
        assigned_officer_id: row.get(5)?,
        location_id: row.get(6)?,
        pincode: row.get(7)?,
        created_at: ts_col(row, 8)?,
        updated_at: opt_ts_col(row, 9)?,
        current_escalation_level: level_col(row, 10)?,
    })
}

fn history_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusHistoryEntry> {
    let actor: String = row.get(5)?;
    Ok(StatusHistoryEntry {
        history_id: row.get(0)?,
        complaint_id: row.get(1)?,
        old_status: opt_enum_col(row, 2)?,
        new_status: enum_col(row, 3)?,
        changed_by: row.get(4)?,
        changed_by_type: match actor.as_str() {
            "citizen" => ActorType::Citizen,
            "officer" => ActorType::Officer,
            "admin" => ActorType::Admin,
            _ => ActorType::System,
        },
        reason: row.get(6)?,
        created_at: ts_col(row, 7)?,
    })
}

impl Store {
    // ── Complaint ──────────────────────────────────────────────────

    pub fn insert_complaint(&self, c: &ComplaintRecord) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO complaint (
                complaint_id, complaint_number, status, priority,
                assigned_department_id, assigned_officer_id, location_id, pincode,
                created_at, updated_at, current_escalation_level
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &c.complaint_id,
                &c.complaint_number,
                c.status.as_str(),
                c.priority.as_str(),
                c.assigned_department_id.as_deref(),
                c.assigned_officer_id.as_deref(),
                c.location_id.as_deref(),
                c.pincode.as_deref(),
                encode_ts(&c.created_at),
                c.updated_at.as_ref().map(encode_ts),
                i64::from(c.current_escalation_level),
            ],
        )?;
        Ok(())
    }

    pub fn get_complaint(&self, complaint_id: &str) -> EngineResult<ComplaintRecord> {
        self.conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE complaint_id = ?1"),
                params![complaint_id],
                complaint_row_mapper,
            )
            .optional()?
            .ok_or_else(|| EngineError::ComplaintNotFound {
                complaint_id: complaint_id.to_string(),
            })
    }

    /// Every complaint not in a terminal status, with its last status change.
    ///
    /// No recency filter is applied here: timing is the evaluator's decision.
    pub fn list_escalation_candidates(&self) -> EngineResult<Vec<EscalationCandidate>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.complaint_id, c.complaint_number, c.status, c.priority,
                    c.assigned_department_id, c.assigned_officer_id, c.location_id, c.pincode,
                    c.created_at, c.updated_at, c.current_escalation_level,
                    COALESCE(
                        (SELECT MAX(h.created_at) FROM complaint_status_history h
                         WHERE h.complaint_id = c.complaint_id),
                        c.created_at
                    ) AS last_status_change_at
             FROM complaint c
             WHERE c.status NOT IN (?1, ?2, ?3)
             ORDER BY c.created_at ASC, c.complaint_id ASC",
        )?;
        let [a, b, t] = ComplaintStatus::TERMINAL;
        let rows = stmt.query_map(params![a.as_str(), b.as_str(), t.as_str()], |row| {
            let record = complaint_row_mapper(row)?;
            Ok(EscalationCandidate {
                complaint_id: record.complaint_id,
                complaint_number: record.complaint_number,
                status: record.status,
                priority: record.priority,
                assigned_department_id: record.assigned_department_id,
                assigned_officer_id: record.assigned_officer_id,
                location_id: record.location_id,
                pincode: record.pincode,
                created_at: record.created_at,
                updated_at: record.updated_at,
                last_status_change_at: ts_col(row, 11)?,
                current_escalation_level: record.current_escalation_level,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Status change by an outside actor (officer action, citizen reopen).
    /// Writes the complaint and its history row together.
    pub fn change_complaint_status(
        &self,
        complaint_id: &str,
        new_status: ComplaintStatus,
        actor: ActorType,
        changed_by: Option<&str>,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<StatusHistoryEntry> {
        let current = self.get_complaint(complaint_id)?;
        let entry = StatusHistoryEntry {
            history_id: uuid::Uuid::new_v4().to_string(),
            complaint_id: complaint_id.to_string(),
            old_status: Some(current.status),
            new_status,
            changed_by: changed_by.map(String::from),
            changed_by_type: actor,
            reason: reason.map(String::from),
            created_at: now,
        };
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE complaint SET status = ?1, updated_at = ?2 WHERE complaint_id = ?3",
            params![new_status.as_str(), encode_ts(&now), complaint_id],
        )?;
        insert_history(&tx, &entry)?;
        tx.commit()?;
        Ok(entry)
    }

    pub fn append_status_history(&self, entry: &StatusHistoryEntry) -> EngineResult<()> {
        insert_history(&self.conn, entry)
    }

    pub fn status_history(&self, complaint_id: &str) -> EngineResult<Vec<StatusHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT history_id, complaint_id, old_status, new_status, changed_by,
                    changed_by_type, reason, created_at
             FROM complaint_status_history WHERE complaint_id = ?1
             ORDER BY created_at ASC, history_id ASC",
        )?;
        let rows = stmt.query_map(params![complaint_id], history_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Refresh the denormalised level counter. Never lowers it.
    pub fn set_cached_escalation_level(&self, complaint_id: &str, level: Level) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE complaint SET current_escalation_level = ?1
             WHERE complaint_id = ?2 AND current_escalation_level < ?1",
            params![i64::from(level), complaint_id],
        )?;
        Ok(())
    }
}

pub(super) fn insert_history(
    conn: &rusqlite::Connection,
    entry: &StatusHistoryEntry,
) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO complaint_status_history (
            history_id, complaint_id, old_status, new_status, changed_by,
            changed_by_type, reason, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &entry.history_id,
            &entry.complaint_id,
            entry.old_status.map(|s| s.as_str()),
            entry.new_status.as_str(),
            entry.changed_by.as_deref(),
            entry.changed_by_type.as_str(),
            entry.reason.as_deref(),
            encode_ts(&entry.created_at),
        ],
    )?;
    Ok(())
}

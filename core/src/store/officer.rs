//! Authority directory queries.

use super::Store;
use crate::{authority::Officer, error::EngineResult, types::OfficerId};
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn insert_officer(&self, o: &Officer) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO officer (officer_id, officer_code, name, department_id, location_id, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &o.officer_id,
                &o.officer_code,
                &o.name,
                &o.department_id,
                o.location_id.as_deref(),
                if o.is_active { 1i32 } else { 0i32 },
            ],
        )?;
        Ok(())
    }

    pub fn set_officer_active(&self, officer_id: &str, active: bool) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE officer SET is_active = ?1 WHERE officer_id = ?2",
            params![if active { 1i32 } else { 0i32 }, officer_id],
        )?;
        Ok(())
    }

    /// Active officer in the department (and location, when given) whose code
    /// carries the tier marker, e.g. `-L2-` inside or `-L2` at the end.
    pub fn find_active_officer_by_tier(
        &self,
        department_id: &str,
        location_id: Option<&str>,
        tier_label: &str,
    ) -> EngineResult<Option<OfficerId>> {
        let inner = format!("%-{tier_label}-%");
        let suffix = format!("%-{tier_label}");
        self.conn
            .query_row(
                "SELECT officer_id FROM officer
                 WHERE is_active = 1 AND department_id = ?1
                   AND (?2 IS NULL OR location_id = ?2)
                   AND (officer_code LIKE ?3 OR officer_code LIKE ?4)
                 ORDER BY officer_code ASC LIMIT 1",
                params![department_id, location_id, inner, suffix],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Any active officer in the department (and location, when given).
    pub fn find_any_active_officer(
        &self,
        department_id: &str,
        location_id: Option<&str>,
    ) -> EngineResult<Option<OfficerId>> {
        self.conn
            .query_row(
                "SELECT officer_id FROM officer
                 WHERE is_active = 1 AND department_id = ?1
                   AND (?2 IS NULL OR location_id = ?2)
                 ORDER BY officer_code ASC LIMIT 1",
                params![department_id, location_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }
}

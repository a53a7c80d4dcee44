//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Engine components call store methods; they never execute SQL directly.
//!
//! TIMESTAMPS: every timestamp column holds canonical UTC RFC 3339 text
//! (`2026-01-01T12:00:00.000000Z`). All writes go through `encode_ts`, so
//! lexicographic MAX() is chronological MAX(). Reads accept any RFC 3339
//! offset and SQLite's bare `YYYY-MM-DD HH:MM:SS` (which is UTC by SQLite's
//! own definition); nothing is ever interpreted in a local timezone.

mod audit;
mod complaint;
mod escalation;
mod officer;
mod rule;

pub use escalation::EscalationCommit;

use crate::error::EngineResult;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{types::Type, Connection};
use std::str::FromStr;
use std::time::Instant;

/// SQLite VM instructions between deadline checks.
const DEADLINE_CHECK_OPS: i32 = 1_000;

pub struct Store {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl Store {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a new, isolated database.
    pub fn reopen(&self) -> EngineResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order. Safe to run repeatedly.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_complaints.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_escalation.sql"))?;
        Ok(())
    }

    /// Run an ad-hoc SQL script (fixtures, operational fixes).
    pub fn run_script(&self, sql: &str) -> EngineResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run `f` with every statement interrupted once `deadline` passes.
    ///
    /// An interrupted statement surfaces as a `Database` error from `f`.
    pub fn with_deadline<T>(
        &self,
        deadline: Instant,
        f: impl FnOnce(&Self) -> EngineResult<T>,
    ) -> EngineResult<T> {
        self.conn
            .progress_handler(DEADLINE_CHECK_OPS, Some(move || Instant::now() >= deadline));
        let result = f(self);
        self.conn.progress_handler(0, None::<fn() -> bool>);
        result
    }
}

// ── Column codecs ──────────────────────────────────────────────────

pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    decode_ts(&raw).ok_or_else(|| conversion_error(idx, format!("invalid timestamp '{raw}'")))
}

fn opt_ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => decode_ts(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("invalid timestamp '{raw}'"))),
    }
}

fn enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn opt_enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e| conversion_error(idx, e)),
    }
}

fn level_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<crate::types::Level> {
    let raw: i64 = row.get(idx)?;
    u8::try_from(raw).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("escalation level {raw} out of range").into(),
        )
    })
}

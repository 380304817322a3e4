//! Append-only log of application attempts.

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use super::DatabaseError;
use crate::ledger::record::{format_timestamp, parse_timestamp};
use crate::ledger::{ApplicationAttempt, Fingerprint, NewAttempt};
use crate::portal::ApplyOutcome;

fn conversion_error(row: &Row<'_>, column: &str, message: String) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

impl ApplicationAttempt {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let outcome: String = row.get("outcome")?;
        let outcome = outcome
            .parse::<ApplyOutcome>()
            .map_err(|e| conversion_error(row, "outcome", e))?;

        let snapshot: Option<String> = row.get("form_snapshot")?;
        let form_snapshot = snapshot
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| conversion_error(row, "form_snapshot", e.to_string()))?;

        let attempted_at: String = row.get("attempted_at")?;
        let attempted_at = parse_timestamp(&attempted_at)
            .ok_or_else(|| conversion_error(row, "attempted_at", attempted_at.clone()))?;

        Ok(Self {
            id: row.get("id")?,
            fingerprint: Fingerprint::from_raw(row.get::<_, String>("fingerprint")?),
            outcome,
            error: row.get("error")?,
            form_snapshot,
            screenshot_path: row.get("screenshot_path")?,
            attempted_at,
        })
    }
}

/// Appends one attempt row and returns its id.
pub fn insert(
    conn: &Connection,
    fingerprint: &str,
    attempt: &NewAttempt,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<i64, DatabaseError> {
    let snapshot = attempt
        .form_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO attempts (fingerprint, outcome, error, form_snapshot, screenshot_path, attempted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            fingerprint,
            attempt.outcome.as_str(),
            attempt.error,
            snapshot,
            attempt.screenshot_path,
            format_timestamp(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All attempts for one job, oldest first.
pub fn list_for(
    conn: &Connection,
    fingerprint: &str,
) -> Result<Vec<ApplicationAttempt>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM attempts WHERE fingerprint = ?1 ORDER BY attempted_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![fingerprint], ApplicationAttempt::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Total number of attempts in the log.
pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM attempts", [], |r| r.get(0))?;
    Ok(n.max(0) as u64)
}

//! Job repository: SQL for the `jobs` table.
//!
//! Functions take a `&Connection` so they compose inside a transaction;
//! the locking and lifecycle rules live in [`crate::ledger::JobLedger`].

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::ledger::record::{format_timestamp, parse_timestamp};
use crate::ledger::{Fingerprint, JobRecord, JobStatus, NewJob};

/// Queue ordering: priority tier descending, then score descending, then
/// oldest discovery first. `rowid` breaks exact timestamp ties by insertion order.
const QUEUE_ORDER: &str = "ORDER BY CASE priority WHEN 'HIGH' THEN 3 WHEN 'MEDIUM' THEN 2 ELSE 1 END DESC,
     score DESC, discovered_at ASC, rowid ASC";

/// Query filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: JobStatus,
    pub portal: Option<String>,
    pub limit: u32,
}

fn parse_column<T>(row: &Row<'_>, column: &str) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

fn timestamp_column(
    row: &Row<'_>,
    column: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
            let idx = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("invalid timestamp '{}'", raw).into(),
            )
        }),
    }
}

fn required_timestamp(
    row: &Row<'_>,
    column: &str,
) -> Result<chrono::DateTime<chrono::Utc>, rusqlite::Error> {
    timestamp_column(row, column)?.ok_or_else(|| {
        let idx = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::InvalidColumnType(idx, column.to_string(), Type::Null)
    })
}

impl JobRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            fingerprint: Fingerprint::from_raw(row.get::<_, String>("fingerprint")?),
            url: row.get("url")?,
            title: row.get("title")?,
            company: row.get("company")?,
            portal: row.get("portal")?,
            location: row.get("location")?,
            description: row.get("description")?,
            score: row.get("score")?,
            priority: parse_column(row, "priority")?,
            status: parse_column(row, "status")?,
            discovered_at: required_timestamp(row, "discovered_at")?,
            updated_at: required_timestamp(row, "updated_at")?,
            applied_at: timestamp_column(row, "applied_at")?,
            notes: row.get("notes")?,
            screenshot_path: row.get("screenshot_path")?,
        })
    }
}

/// Inserts a job unless its fingerprint already exists. Returns whether a row was written.
pub fn insert_or_ignore(
    conn: &Connection,
    job: &NewJob,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<bool, DatabaseError> {
    let ts = format_timestamp(now);
    let written = conn.execute(
        "INSERT OR IGNORE INTO jobs (fingerprint, url, title, company, portal, location,
         description, score, priority, status, discovered_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            job.fingerprint().as_str(),
            job.url,
            job.title,
            job.company,
            job.portal,
            job.location,
            job.description,
            job.score,
            job.priority.as_str(),
            job.status.as_str(),
            ts,
        ],
    )?;
    Ok(written == 1)
}

/// Finds a job by fingerprint.
pub fn find(conn: &Connection, fingerprint: &str) -> Result<Option<JobRecord>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM jobs WHERE fingerprint = ?1")?;
    Ok(stmt
        .query_row(params![fingerprint], JobRecord::from_row)
        .optional()?)
}

/// Current status of a job, or `None` when the fingerprint is unknown.
pub fn status_of(conn: &Connection, fingerprint: &str) -> Result<Option<JobStatus>, DatabaseError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT status FROM jobs WHERE fingerprint = ?1",
            params![fingerprint],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| {
        s.parse::<JobStatus>().map_err(|_| DatabaseError::Corrupt {
            column: "status",
            value: s,
        })
    })
    .transpose()
}

/// Compare-and-set status update. Only rows currently in `from` are touched;
/// returns the number of rows changed (0 or 1).
pub fn update_status(
    conn: &Connection,
    fingerprint: &str,
    from: JobStatus,
    to: JobStatus,
    notes: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<usize, DatabaseError> {
    let ts = format_timestamp(now);
    let applied_at = (to == JobStatus::Applied).then(|| ts.clone());
    let changed = conn.execute(
        "UPDATE jobs SET status = ?3, updated_at = ?4,
         applied_at = COALESCE(?5, applied_at),
         notes = COALESCE(?6, notes)
         WHERE fingerprint = ?1 AND status = ?2",
        params![fingerprint, from.as_str(), to.as_str(), ts, applied_at, notes],
    )?;
    Ok(changed)
}

/// Sets the screenshot reference of a job.
pub fn set_screenshot(
    conn: &Connection,
    fingerprint: &str,
    path: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET screenshot_path = ?2 WHERE fingerprint = ?1",
        params![fingerprint, path],
    )?;
    Ok(())
}

/// Lists jobs in queue order.
pub fn query(conn: &Connection, filter: &JobFilter) -> Result<Vec<JobRecord>, DatabaseError> {
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(filter.status.as_str())];
    let mut where_clause = "WHERE status = ?1".to_string();

    if let Some(ref portal) = filter.portal {
        param_values.push(Box::new(portal.clone()));
        where_clause.push_str(&format!(" AND portal = ?{}", param_values.len()));
    }

    param_values.push(Box::new(i64::from(filter.limit)));
    let sql = format!(
        "SELECT * FROM jobs {} {} LIMIT ?{}",
        where_clause,
        QUEUE_ORDER,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_ref.as_slice(), JobRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Head of the queue for one portal.
pub fn next_queued(conn: &Connection, portal: &str) -> Result<Option<JobRecord>, DatabaseError> {
    let sql = format!(
        "SELECT * FROM jobs WHERE status = 'queued' AND portal = ?1 {} LIMIT 1",
        QUEUE_ORDER
    );
    let mut stmt = conn.prepare(&sql)?;
    Ok(stmt.query_row(params![portal], JobRecord::from_row).optional()?)
}

/// Returns every `applying` row last touched before `cutoff` to `queued`.
pub fn requeue_stale(
    conn: &Connection,
    cutoff: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = 'queued', updated_at = ?2,
         notes = 'Lease expired; returned to queue'
         WHERE status = 'applying' AND updated_at < ?1",
        params![format_timestamp(cutoff), format_timestamp(now)],
    )?;
    Ok(changed)
}

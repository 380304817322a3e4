//! Aggregate ledger statistics.

use std::collections::BTreeMap;

use rusqlite::params;
use serde::Serialize;

use super::{Database, DatabaseError};
use crate::ledger::JobStatus;

/// Ledger-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    /// Count per status. Every status is present, zero when empty.
    pub by_status: BTreeMap<String, u64>,
    pub total: u64,
    pub avg_score: f64,
    pub total_attempts: u64,
}

impl LedgerStats {
    pub fn count(&self, status: JobStatus) -> u64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// Per-portal breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalStats {
    pub portal: String,
    pub total: u64,
    pub applied: u64,
    pub failed: u64,
    pub queued: u64,
    pub avg_score: f64,
}

/// Computes ledger-wide statistics.
pub fn ledger_stats(db: &Database) -> Result<LedgerStats, DatabaseError> {
    db.with_conn(|conn| {
        let mut by_status: BTreeMap<String, u64> = JobStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, n) = row?;
            *by_status.entry(status).or_insert(0) += n.max(0) as u64;
        }

        let (total, avg_score): (i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*), AVG(score) FROM jobs",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let total_attempts = super::attempt_repo::count(conn)?;

        Ok(LedgerStats {
            by_status,
            total: total.max(0) as u64,
            avg_score: avg_score.unwrap_or(0.0),
            total_attempts,
        })
    })
}

/// Per-portal counts, ordered by portal name.
pub fn portal_stats(db: &Database) -> Result<Vec<PortalStats>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT portal,
                    COUNT(*),
                    SUM(CASE WHEN status IN (?1, ?2) THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = ?3 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = ?4 THEN 1 ELSE 0 END),
                    AVG(score)
             FROM jobs GROUP BY portal ORDER BY portal",
        )?;
        let rows = stmt
            .query_map(
                params![
                    JobStatus::Applied.as_str(),
                    JobStatus::Interview.as_str(),
                    JobStatus::Failed.as_str(),
                    JobStatus::Queued.as_str(),
                ],
                |r| {
                    Ok(PortalStats {
                        portal: r.get(0)?,
                        total: r.get::<_, i64>(1)?.max(0) as u64,
                        applied: r.get::<_, i64>(2)?.max(0) as u64,
                        failed: r.get::<_, i64>(3)?.max(0) as u64,
                        queued: r.get::<_, i64>(4)?.max(0) as u64,
                        avg_score: r.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo;
    use crate::ledger::{NewJob, Priority};
    use chrono::Utc;

    fn job(url: &str, portal: &str, score: u8) -> NewJob {
        NewJob {
            url: url.to_string(),
            title: "ML Engineer".to_string(),
            company: "Globex".to_string(),
            portal: portal.to_string(),
            location: None,
            description: None,
            score,
            priority: Priority::Medium,
            status: JobStatus::Queued,
        }
    }

    #[test]
    fn test_empty_ledger_stats() {
        let db = Database::open_in_memory().unwrap();
        let stats = ledger_stats(&db).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_score, 0.0);
        assert_eq!(stats.by_status.len(), JobStatus::ALL.len());
        assert_eq!(stats.count(JobStatus::Queued), 0);
    }

    #[test]
    fn test_counts_and_average() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            job_repo::insert_or_ignore(conn, &job("https://a.com/1", "indeed", 70), Utc::now())?;
            job_repo::insert_or_ignore(conn, &job("https://a.com/2", "indeed", 90), Utc::now())?;
            job_repo::insert_or_ignore(conn, &job("https://a.com/3", "dice", 80), Utc::now())?;
            Ok(())
        })
        .unwrap();

        let stats = ledger_stats(&db).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(JobStatus::Queued), 3);
        assert!((stats.avg_score - 80.0).abs() < f64::EPSILON);

        let per_portal = portal_stats(&db).unwrap();
        assert_eq!(per_portal.len(), 2);
        assert_eq!(per_portal[0].portal, "dice");
        assert_eq!(per_portal[1].portal, "indeed");
        assert_eq!(per_portal[1].total, 2);
        assert_eq!(per_portal[1].queued, 2);
        assert!((per_portal[1].avg_score - 80.0).abs() < f64::EPSILON);
    }
}

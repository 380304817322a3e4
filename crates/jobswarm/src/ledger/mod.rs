//! Durable job ledger.
//!
//! [`JobLedger`] is the only state shared between workers. Every mutation
//! runs under the database mutex, and status changes are compare-and-set
//! inside a transaction, so concurrent workers can never interleave two
//! transitions on the same record.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::{attempt_repo, job_repo, stats_repo, Database, DatabaseError};

pub mod fingerprint;
pub mod record;
pub mod status;

pub use crate::db::stats_repo::{LedgerStats, PortalStats};
pub use fingerprint::{canonicalize_url, Fingerprint};
pub use record::{ApplicationAttempt, JobRecord, NewAttempt, NewJob};
pub use status::{JobStatus, Priority};

/// Handle to the job ledger. Cheap to clone.
#[derive(Clone)]
pub struct JobLedger {
    db: Database,
}

impl JobLedger {
    /// Opens the ledger database at `path`, creating and migrating it if needed.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Inserts a newly discovered job. Returns `false` when the fingerprint
    /// already exists; the existing record is left untouched.
    pub fn insert(&self, job: &NewJob) -> Result<bool, DatabaseError> {
        if !matches!(job.status, JobStatus::Discovered | JobStatus::Queued) {
            return Err(DatabaseError::InvalidTransition {
                fingerprint: job.fingerprint().to_string(),
                from: JobStatus::Discovered,
                to: job.status,
            });
        }
        let inserted = self
            .db
            .with_conn(|conn| job_repo::insert_or_ignore(conn, job, Utc::now()))?;
        if inserted {
            debug!(portal = %job.portal, fingerprint = %job.fingerprint(), "Job recorded");
        }
        Ok(inserted)
    }

    /// Moves a job along the lifecycle. Only forward edges are accepted.
    pub fn set_status(
        &self,
        fingerprint: &Fingerprint,
        status: JobStatus,
        notes: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.db.with_tx(|tx| {
            let current = job_repo::status_of(tx, fingerprint.as_str())?.ok_or_else(|| {
                DatabaseError::NotFound {
                    fingerprint: fingerprint.to_string(),
                }
            })?;
            transition(tx, fingerprint, current, status, notes)
        })?;
        debug!(fingerprint = %fingerprint, status = %status, "Job status updated");
        Ok(())
    }

    /// Records an external interview invitation (`APPLIED -> INTERVIEW`).
    pub fn mark_interview(&self, fingerprint: &Fingerprint) -> Result<(), DatabaseError> {
        self.set_status(fingerprint, JobStatus::Interview, None)
    }

    /// Jobs in `status`, optionally for one portal, in queue order.
    pub fn query(
        &self,
        status: JobStatus,
        portal: Option<&str>,
        limit: u32,
    ) -> Result<Vec<JobRecord>, DatabaseError> {
        let filter = job_repo::JobFilter {
            status,
            portal: portal.map(str::to_string),
            limit,
        };
        self.db.with_conn(|conn| job_repo::query(conn, &filter))
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<JobRecord>, DatabaseError> {
        self.db
            .with_conn(|conn| job_repo::find(conn, fingerprint.as_str()))
    }

    /// Appends to the attempts log. Unknown fingerprints are rejected.
    pub fn record_attempt(
        &self,
        fingerprint: &Fingerprint,
        attempt: &NewAttempt,
    ) -> Result<i64, DatabaseError> {
        self.db.with_tx(|tx| {
            if job_repo::status_of(tx, fingerprint.as_str())?.is_none() {
                return Err(DatabaseError::NotFound {
                    fingerprint: fingerprint.to_string(),
                });
            }
            attempt_repo::insert(tx, fingerprint.as_str(), attempt, Utc::now())
        })
    }

    pub fn attempts(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<ApplicationAttempt>, DatabaseError> {
        self.db
            .with_conn(|conn| attempt_repo::list_for(conn, fingerprint.as_str()))
    }

    /// Takes the lease on the next queued job for `portal`.
    ///
    /// Selection and the `QUEUED -> APPLYING` transition happen in one
    /// transaction, so two callers never receive the same job.
    pub fn claim_next(&self, portal: &str) -> Result<Option<JobRecord>, DatabaseError> {
        self.db.with_tx(|tx| {
            let Some(mut job) = job_repo::next_queued(tx, portal)? else {
                return Ok(None);
            };
            let now = Utc::now();
            let changed = job_repo::update_status(
                tx,
                job.fingerprint.as_str(),
                JobStatus::Queued,
                JobStatus::Applying,
                None,
                now,
            )?;
            if changed == 0 {
                return Ok(None);
            }
            job.status = JobStatus::Applying;
            job.updated_at = now;
            Ok(Some(job))
        })
    }

    /// Ends a lease: sets the terminal status and appends the attempt row
    /// in a single transaction.
    pub fn complete_application(
        &self,
        fingerprint: &Fingerprint,
        status: JobStatus,
        attempt: &NewAttempt,
        notes: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.db.with_tx(|tx| {
            let current = job_repo::status_of(tx, fingerprint.as_str())?.ok_or_else(|| {
                DatabaseError::NotFound {
                    fingerprint: fingerprint.to_string(),
                }
            })?;
            if current != JobStatus::Applying {
                return Err(DatabaseError::InvalidTransition {
                    fingerprint: fingerprint.to_string(),
                    from: current,
                    to: status,
                });
            }
            transition(tx, fingerprint, current, status, notes)?;
            if let Some(ref path) = attempt.screenshot_path {
                job_repo::set_screenshot(tx, fingerprint.as_str(), path)?;
            }
            attempt_repo::insert(tx, fingerprint.as_str(), attempt, Utc::now())?;
            Ok(())
        })
    }

    /// Returns `APPLYING` leases untouched for longer than `older_than` to
    /// `QUEUED`. Returns the number of reclaimed jobs.
    pub fn requeue_stale(&self, older_than: chrono::Duration) -> Result<usize, DatabaseError> {
        let now = Utc::now();
        let reclaimed = self
            .db
            .with_conn(|conn| job_repo::requeue_stale(conn, now - older_than, now))?;
        if reclaimed > 0 {
            info!(reclaimed, "Reclaimed stale application leases");
        }
        Ok(reclaimed)
    }

    pub fn stats(&self) -> Result<LedgerStats, DatabaseError> {
        stats_repo::ledger_stats(&self.db)
    }

    pub fn portal_stats(&self) -> Result<Vec<PortalStats>, DatabaseError> {
        stats_repo::portal_stats(&self.db)
    }
}

fn transition(
    conn: &rusqlite::Connection,
    fingerprint: &Fingerprint,
    from: JobStatus,
    to: JobStatus,
    notes: Option<&str>,
) -> Result<(), DatabaseError> {
    if !from.can_transition_to(to) {
        return Err(DatabaseError::InvalidTransition {
            fingerprint: fingerprint.to_string(),
            from,
            to,
        });
    }
    let changed = job_repo::update_status(conn, fingerprint.as_str(), from, to, notes, Utc::now())?;
    if changed == 0 {
        // Status moved between the read and the write.
        return Err(DatabaseError::InvalidTransition {
            fingerprint: fingerprint.to_string(),
            from,
            to,
        });
    }
    Ok(())
}

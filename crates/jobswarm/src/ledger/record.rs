//! Ledger row types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{Fingerprint, JobStatus, Priority};
use crate::portal::ApplyOutcome;

/// A job record as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub fingerprint: Fingerprint,
    pub url: String,
    pub title: String,
    pub company: String,
    pub portal: String,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Fit score in `[0, 100]`.
    pub score: u8,
    pub priority: Priority,
    pub status: JobStatus,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub screenshot_path: Option<String>,
}

/// A freshly discovered job, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub url: String,
    pub title: String,
    pub company: String,
    pub portal: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub score: u8,
    pub priority: Priority,
    /// `Discovered` or `Queued`; anything else is rejected at insert time.
    pub status: JobStatus,
}

impl NewJob {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_url(&self.url)
    }
}

/// One row of the append-only attempts log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAttempt {
    pub id: i64,
    pub fingerprint: Fingerprint,
    pub outcome: ApplyOutcome,
    pub error: Option<String>,
    pub form_snapshot: Option<serde_json::Value>,
    pub screenshot_path: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Attempt data supplied by the caller; the ledger assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub outcome: ApplyOutcome,
    pub error: Option<String>,
    pub form_snapshot: Option<serde_json::Value>,
    pub screenshot_path: Option<String>,
}

/// Fixed-width UTC timestamps so that lexical order equals time order.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

//! Job lifecycle status and priority tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job record.
///
/// ```text
/// DISCOVERED -> QUEUED -> APPLYING -> { APPLIED | FAILED | SKIPPED }
/// APPLIED -> INTERVIEW   (external)
/// ```
///
/// `APPLYING` is a lease: the only backward edge is the explicit stale-lease
/// reclaim (`APPLYING -> QUEUED`), which is not reachable through
/// [`JobStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Discovered,
    Queued,
    Applying,
    Applied,
    Failed,
    Skipped,
    Interview,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Discovered,
        JobStatus::Queued,
        JobStatus::Applying,
        JobStatus::Applied,
        JobStatus::Failed,
        JobStatus::Skipped,
        JobStatus::Interview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Discovered => "discovered",
            JobStatus::Queued => "queued",
            JobStatus::Applying => "applying",
            JobStatus::Applied => "applied",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
            JobStatus::Interview => "interview",
        }
    }

    /// Whether `next` is a forward edge from `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Discovered, Queued)
                | (Queued, Applying)
                | (Applying, Applied)
                | (Applying, Failed)
                | (Applying, Skipped)
                | (Applied, Interview)
        )
    }

    /// Terminal outcomes of an application attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Applied | JobStatus::Failed | JobStatus::Skipped | JobStatus::Interview
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown job status '{}'", s))
    }
}

/// Priority tier assigned by the scorer. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

//! Portal adapter contract.
//!
//! An adapter knows how to log in to, search and apply on one external job
//! portal. Adapters hold configuration only; all run state (quota, pacing,
//! the automation session) belongs to the worker driving them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::ledger::JobRecord;

pub mod feed;
pub mod profile;
pub mod registry;
pub mod session;

pub use feed::FeedAdapter;
pub use profile::CandidateProfile;
pub use registry::{builtin_catalog, PortalRegistry};
pub use session::{AutomationDriver, AutomationSession, OfflineDriver, OfflineSession};

/// Portal grouping by maturity and volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Major,
    Secondary,
    Specialized,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Major, Tier::Secondary, Tier::Specialized];

    pub fn number(&self) -> u8 {
        match self {
            Tier::Major => 1,
            Tier::Secondary => 2,
            Tier::Specialized => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Major => "major",
            Tier::Secondary => "secondary",
            Tier::Specialized => "specialized",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {} ({})", self.number(), self.label())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "major" => Ok(Tier::Major),
            "2" | "secondary" => Ok(Tier::Secondary),
            "3" | "specialized" => Ok(Tier::Specialized),
            other => Err(format!("unknown tier '{}' (expected 1, 2 or 3)", other)),
        }
    }
}

/// Static description of a portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub name: String,
    pub base_url: String,
    pub tier: Tier,
    pub daily_cap: u32,
    pub delay_min_secs: u64,
    pub delay_max_secs: u64,
    pub requires_login: bool,
    #[serde(default)]
    pub easy_apply: bool,
    #[serde(default)]
    pub tech_focus: bool,
}

impl PortalConfig {
    /// Lower bound of the pause between two apply actions.
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.delay_min_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.delay_max_secs.max(self.delay_min_secs))
    }

    /// A uniformly random pause within the configured bounds, at millisecond
    /// granularity. Falls back to the upper bound if the OS RNG is unavailable.
    pub fn rate_limit_delay(&self) -> Duration {
        let min_ms = self.min_delay().as_millis() as u64;
        let max_ms = self.max_delay().as_millis() as u64;
        let span = max_ms - min_ms;
        if span == 0 {
            return Duration::from_millis(min_ms);
        }

        let mut buf = [0u8; 8];
        match getrandom::getrandom(&mut buf) {
            Ok(()) => Duration::from_millis(min_ms + u64::from_le_bytes(buf) % (span + 1)),
            Err(_) => Duration::from_millis(max_ms),
        }
    }
}

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keywords: String,
    pub location: Option<String>,
    #[serde(default = "default_remote")]
    pub remote: bool,
    #[serde(default = "default_posted_within_days")]
    pub posted_within_days: u32,
}

fn default_remote() -> bool {
    true
}

fn default_posted_within_days() -> u32 {
    7
}

impl SearchQuery {
    pub fn new(keywords: impl Into<String>, location: Option<String>) -> Self {
        Self {
            keywords: keywords.into(),
            location,
            remote: default_remote(),
            posted_within_days: default_posted_within_days(),
        }
    }
}

/// A listing returned by a portal search, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCandidate {
    pub title: String,
    pub company: String,
    pub url: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
}

/// Result class of one apply action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Success,
    Failure,
    AlreadyApplied,
    Captcha,
    RateLimited,
    Skipped,
}

impl ApplyOutcome {
    pub const ALL: [ApplyOutcome; 6] = [
        ApplyOutcome::Success,
        ApplyOutcome::Failure,
        ApplyOutcome::AlreadyApplied,
        ApplyOutcome::Captcha,
        ApplyOutcome::RateLimited,
        ApplyOutcome::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Success => "success",
            ApplyOutcome::Failure => "failure",
            ApplyOutcome::AlreadyApplied => "already_applied",
            ApplyOutcome::Captcha => "captcha",
            ApplyOutcome::RateLimited => "rate_limited",
            ApplyOutcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for ApplyOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplyOutcome::ALL
            .iter()
            .copied()
            .find(|o| o.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown apply outcome '{}'", s))
    }
}

/// What an adapter reports back from `apply`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,
    pub error: Option<String>,
    /// Form fields as submitted, for the attempts log.
    pub form_snapshot: Option<serde_json::Value>,
    pub screenshot_path: Option<String>,
}

impl ApplyReport {
    pub fn new(outcome: ApplyOutcome) -> Self {
        Self {
            outcome,
            error: None,
            form_snapshot: None,
            screenshot_path: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_snapshot(mut self, snapshot: serde_json::Value) -> Self {
        self.form_snapshot = Some(snapshot);
        self
    }
}

/// Capability every portal implementation provides.
///
/// Adapters are owned by exactly one worker and are never called
/// concurrently.
#[async_trait]
pub trait PortalAdapter: Send + Sync {
    fn config(&self) -> &PortalConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Interactive login inside `session`.
    async fn login(&self, session: &mut dyn AutomationSession) -> Result<bool, AdapterError>;

    async fn is_logged_in(&self, session: &mut dyn AutomationSession)
        -> Result<bool, AdapterError>;

    async fn search(
        &self,
        session: &mut dyn AutomationSession,
        query: &SearchQuery,
    ) -> Result<Vec<ListingCandidate>, AdapterError>;

    async fn apply(
        &self,
        session: &mut dyn AutomationSession,
        job: &JobRecord,
        profile: &CandidateProfile,
    ) -> Result<ApplyReport, AdapterError>;
}

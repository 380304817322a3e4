use serde::{Deserialize, Serialize};

use crate::portal::CandidateProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    /// Overrides the data home (`JOBSWARM_HOME` or `~/.jobswarm`).
    #[serde(default)]
    pub data_directory: Option<String>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub profile: CandidateProfile,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_directory: None,
            search: SearchConfig::default(),
            scoring: ScoringConfig::default(),
            swarm: SwarmConfig::default(),
            profile: CandidateProfile::default(),
        }
    }
}

/// Keyword x location grid explored by the research phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
    #[serde(default = "default_posted_within_days")]
    pub posted_within_days: u32,
    #[serde(default = "default_true")]
    pub remote: bool,
}

fn default_keywords() -> Vec<String> {
    [
        "AI Engineer",
        "Generative AI Engineer",
        "Agentic AI Engineer",
        "LLM Engineer",
        "Python Backend Engineer",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_locations() -> Vec<String> {
    vec!["Remote".to_string(), "India".to_string()]
}

fn default_posted_within_days() -> u32 {
    7
}

fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            locations: default_locations(),
            posted_within_days: default_posted_within_days(),
            remote: true,
        }
    }
}

/// Weights and thresholds of the fit score. All points are out of 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_title_points")]
    pub title_points: u8,
    #[serde(default = "default_domain_points_each")]
    pub domain_points_each: u8,
    #[serde(default = "default_domain_points_cap")]
    pub domain_points_cap: u8,
    #[serde(default = "default_location_points")]
    pub location_points: u8,
    #[serde(default = "default_baseline_points")]
    pub baseline_points: u8,
    /// Listings scoring below this are never queued.
    #[serde(default = "default_admission_threshold")]
    pub admission_threshold: u8,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: u8,
    #[serde(default = "default_domain_keywords")]
    pub domain_keywords: Vec<String>,
    /// Location tokens accepted in addition to the search location itself.
    #[serde(default = "default_accepted_locations")]
    pub accepted_locations: Vec<String>,
    #[serde(default)]
    pub keyword_match: KeywordMatch,
}

/// How search and domain keywords are matched against a listing title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMatch {
    /// Case-insensitive substring: "ai" matches "GenAI" and "Maintenance".
    #[default]
    Substring,
    /// Whole words; a multi-word keyword needs its words adjacent and in order.
    Word,
}

fn default_title_points() -> u8 {
    50
}

fn default_domain_points_each() -> u8 {
    10
}

fn default_domain_points_cap() -> u8 {
    30
}

fn default_location_points() -> u8 {
    10
}

fn default_baseline_points() -> u8 {
    10
}

fn default_admission_threshold() -> u8 {
    65
}

fn default_high_threshold() -> u8 {
    85
}

fn default_domain_keywords() -> Vec<String> {
    ["ai", "machine learning", "llm", "generative", "agent", "python"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_accepted_locations() -> Vec<String> {
    vec!["remote".to_string()]
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            title_points: default_title_points(),
            domain_points_each: default_domain_points_each(),
            domain_points_cap: default_domain_points_cap(),
            location_points: default_location_points(),
            baseline_points: default_baseline_points(),
            admission_threshold: default_admission_threshold(),
            high_threshold: default_high_threshold(),
            domain_keywords: default_domain_keywords(),
            accepted_locations: default_accepted_locations(),
            keyword_match: KeywordMatch::default(),
        }
    }
}

/// Scheduling policy of the orchestrator and its workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: usize,
    /// Pause between the research and application phases.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_cycle_interval_mins")]
    pub cycle_interval_mins: u64,
    /// Wait after a failed cycle in continuous mode.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// `APPLYING` leases older than this are reclaimed at startup.
    #[serde(default = "default_stale_lease_mins")]
    pub stale_lease_mins: u64,
    /// Applications per day across the swarm, split between workers.
    #[serde(default = "default_daily_target")]
    pub daily_target: u32,
    /// Maximum jobs a worker takes from the queue in one cycle.
    #[serde(default = "default_cycle_batch_limit")]
    pub cycle_batch_limit: u32,
    #[serde(default = "default_session_max_age_days")]
    pub session_max_age_days: u32,
}

fn default_max_concurrent_workers() -> usize {
    4
}

fn default_cooldown_secs() -> u64 {
    5
}

fn default_cycle_interval_mins() -> u64 {
    60
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_stale_lease_mins() -> u64 {
    30
}

fn default_daily_target() -> u32 {
    200
}

fn default_cycle_batch_limit() -> u32 {
    10
}

fn default_session_max_age_days() -> u32 {
    30
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: default_max_concurrent_workers(),
            cooldown_secs: default_cooldown_secs(),
            cycle_interval_mins: default_cycle_interval_mins(),
            error_backoff_secs: default_error_backoff_secs(),
            stale_lease_mins: default_stale_lease_mins(),
            daily_target: default_daily_target(),
            cycle_batch_limit: default_cycle_batch_limit(),
            session_max_age_days: default_session_max_age_days(),
        }
    }
}

//! Builder patterns and scripted collaborators for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use jobswarm::config::Config;
use jobswarm::ledger::JobRecord;
use jobswarm::portal::{
    ApplyOutcome, ApplyReport, AutomationSession, CandidateProfile, ListingCandidate,
    PortalAdapter, PortalConfig, SearchQuery, Tier,
};
use jobswarm::AdapterError;

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// A config with one keyword, one location and no cooldown.
    pub fn new() -> Self {
        let mut config = Config::default();
        config.search.keywords = vec!["AI Engineer".to_string()];
        config.search.locations = vec!["Remote".to_string()];
        config.swarm.cooldown_secs = 0;
        config.profile.full_name = "Ada Lovelace".to_string();
        config.profile.email = "ada@example.com".to_string();
        Self { config }
    }

    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.config.search.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn locations(mut self, locations: &[&str]) -> Self {
        self.config.search.locations = locations.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn daily_target(mut self, target: u32) -> Self {
        self.config.swarm.daily_target = target;
        self
    }

    pub fn batch_limit(mut self, limit: u32) -> Self {
        self.config.swarm.cycle_batch_limit = limit;
        self
    }

    pub fn error_backoff_secs(mut self, secs: u64) -> Self {
        self.config.swarm.error_backoff_secs = secs;
        self
    }

    pub fn max_concurrent_workers(mut self, n: usize) -> Self {
        self.config.swarm.max_concurrent_workers = n;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `PortalConfig`; defaults to a login-free portal with no delay.
pub struct PortalBuilder {
    config: PortalConfig,
}

impl PortalBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            config: PortalConfig {
                name: name.to_string(),
                base_url: format!("https://{}.example.com", name),
                tier: Tier::Major,
                daily_cap: 50,
                delay_min_secs: 0,
                delay_max_secs: 0,
                requires_login: false,
                easy_apply: true,
                tech_focus: false,
            },
        }
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.config.tier = tier;
        self
    }

    pub fn daily_cap(mut self, cap: u32) -> Self {
        self.config.daily_cap = cap;
        self
    }

    pub fn delays(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.config.delay_min_secs = min_secs;
        self.config.delay_max_secs = max_secs;
        self
    }

    pub fn requires_login(mut self) -> Self {
        self.config.requires_login = true;
        self
    }

    pub fn build(self) -> PortalConfig {
        self.config
    }
}

/// A listing on `portal` with a title that scores well for "AI Engineer".
pub fn listing(portal: &str, id: usize) -> ListingCandidate {
    ListingCandidate {
        title: "Senior AI Engineer".to_string(),
        company: format!("Company {}", id),
        url: format!("https://{}.example.com/jobs/{}", portal, id),
        location: Some("Remote".to_string()),
        description: None,
        salary_range: None,
    }
}

pub fn listing_titled(portal: &str, id: usize, title: &str) -> ListingCandidate {
    ListingCandidate {
        title: title.to_string(),
        ..listing(portal, id)
    }
}

/// State shared between a `ScriptedAdapter` and the test observing it.
#[derive(Clone, Default)]
pub struct Script {
    pub listings: Arc<Mutex<Vec<ListingCandidate>>>,
    outcomes: Arc<Mutex<VecDeque<ApplyOutcome>>>,
    applies: Arc<Mutex<Vec<(String, Instant)>>>,
    fail_search: Arc<Mutex<bool>>,
    search_delay: Arc<Mutex<Option<Duration>>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listings(self, listings: Vec<ListingCandidate>) -> Self {
        *self.listings.lock().unwrap() = listings;
        self
    }

    /// Outcomes returned by successive applies; `Success` once exhausted.
    pub fn with_outcomes(self, outcomes: &[ApplyOutcome]) -> Self {
        self.outcomes.lock().unwrap().extend(outcomes.iter().copied());
        self
    }

    pub fn failing_search(self) -> Self {
        *self.fail_search.lock().unwrap() = true;
        self
    }

    /// Every search sleeps for `delay` before answering.
    pub fn slow_search(self, delay: Duration) -> Self {
        *self.search_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Fingerprints applied to, in order.
    pub fn applied(&self) -> Vec<String> {
        self.applies.lock().unwrap().iter().map(|(fp, _)| fp.clone()).collect()
    }

    pub fn apply_times(&self) -> Vec<Instant> {
        self.applies.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

/// Portal adapter that serves scripted listings and outcomes.
pub struct ScriptedAdapter {
    config: PortalConfig,
    script: Script,
}

impl ScriptedAdapter {
    pub fn new(config: PortalConfig, script: Script) -> Self {
        Self { config, script }
    }
}

#[async_trait]
impl PortalAdapter for ScriptedAdapter {
    fn config(&self) -> &PortalConfig {
        &self.config
    }

    async fn login(&self, _session: &mut dyn AutomationSession) -> Result<bool, AdapterError> {
        Ok(false)
    }

    async fn is_logged_in(
        &self,
        session: &mut dyn AutomationSession,
    ) -> Result<bool, AdapterError> {
        Ok(!session.export_state().await?.is_null())
    }

    async fn search(
        &self,
        session: &mut dyn AutomationSession,
        _query: &SearchQuery,
    ) -> Result<Vec<ListingCandidate>, AdapterError> {
        if *self.script.fail_search.lock().unwrap() {
            return Err(AdapterError::Navigation {
                url: self.config.base_url.clone(),
                reason: "timed out".to_string(),
            });
        }
        let delay = *self.script.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        session.navigate(&self.config.base_url).await?;
        Ok(self.script.listings.lock().unwrap().clone())
    }

    async fn apply(
        &self,
        _session: &mut dyn AutomationSession,
        job: &JobRecord,
        _profile: &CandidateProfile,
    ) -> Result<ApplyReport, AdapterError> {
        self.script
            .applies
            .lock()
            .unwrap()
            .push((job.fingerprint.to_string(), Instant::now()));
        let outcome = self
            .script
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ApplyOutcome::Success);
        Ok(ApplyReport::new(outcome))
    }
}

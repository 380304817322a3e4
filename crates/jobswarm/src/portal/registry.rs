//! Portal catalog and constructor registry.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{FeedAdapter, PortalAdapter, PortalConfig, Tier};
use crate::error::WorkerError;
use crate::vault::Credentials;

/// Builds an adapter from its portal config and the portal-scoped credentials.
pub type AdapterConstructor =
    Arc<dyn Fn(PortalConfig, Credentials) -> Box<dyn PortalAdapter> + Send + Sync>;

struct Entry {
    config: PortalConfig,
    constructor: AdapterConstructor,
}

/// Maps portal names to their configuration and adapter constructor.
#[derive(Default)]
pub struct PortalRegistry {
    entries: BTreeMap<String, Entry>,
}

impl PortalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every built-in portal backed by a [`FeedAdapter`].
    pub fn with_feed_adapters(
        feeds_dir: impl Into<PathBuf>,
        outbox_dir: impl Into<PathBuf>,
    ) -> Self {
        let feeds_dir = feeds_dir.into();
        let outbox_dir = outbox_dir.into();
        let mut registry = Self::new();
        for config in builtin_catalog() {
            let feeds_dir = feeds_dir.clone();
            let outbox_dir = outbox_dir.clone();
            registry.register(
                config,
                Arc::new(
                    move |config: PortalConfig,
                          _credentials: Credentials|
                          -> Box<dyn PortalAdapter> {
                        Box::new(FeedAdapter::new(config, feeds_dir.clone(), outbox_dir.clone()))
                    },
                ),
            );
        }
        registry
    }

    /// Registers (or replaces) a portal.
    pub fn register(&mut self, config: PortalConfig, constructor: AdapterConstructor) {
        self.entries
            .insert(config.name.clone(), Entry { config, constructor });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn config(&self, name: &str) -> Option<&PortalConfig> {
        self.entries.get(name).map(|e| &e.config)
    }

    /// Constructs the adapter for `name`, handing it only `<name>_*` credentials.
    pub fn build(
        &self,
        name: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn PortalAdapter>, WorkerError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| WorkerError::UnknownPortal(name.to_string()))?;
        Ok((entry.constructor)(
            entry.config.clone(),
            credentials.scoped(name),
        ))
    }

    /// Registered portal names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn portals_in(&self, tier: Tier) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.config.tier == tier)
            .map(|e| e.config.name.clone())
            .collect()
    }

    /// Registered configs ordered by tier, then name.
    pub fn catalog(&self) -> Vec<&PortalConfig> {
        let mut configs: Vec<&PortalConfig> = self.entries.values().map(|e| &e.config).collect();
        configs.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.name.cmp(&b.name)));
        configs
    }
}

#[allow(clippy::too_many_arguments)]
fn portal(
    name: &str,
    base_url: &str,
    tier: Tier,
    daily_cap: u32,
    delay: (u64, u64),
    requires_login: bool,
    easy_apply: bool,
    tech_focus: bool,
) -> PortalConfig {
    PortalConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        tier,
        daily_cap,
        delay_min_secs: delay.0,
        delay_max_secs: delay.1,
        requires_login,
        easy_apply,
        tech_focus,
    }
}

/// Built-in portal configurations.
#[rustfmt::skip]
pub fn builtin_catalog() -> Vec<PortalConfig> {
    use Tier::*;
    vec![
        portal("linkedin", "https://www.linkedin.com", Major, 50, (45, 90), true, true, false),
        portal("indeed", "https://www.indeed.com", Major, 40, (30, 60), true, true, false),
        portal("glassdoor", "https://www.glassdoor.com", Major, 25, (45, 90), true, true, false),
        portal("naukri", "https://www.naukri.com", Major, 35, (45, 90), true, true, false),
        portal("ziprecruiter", "https://www.ziprecruiter.com", Major, 30, (30, 60), true, true, false),
        portal("wellfound", "https://wellfound.com", Secondary, 30, (60, 120), true, true, true),
        portal("dice", "https://www.dice.com", Secondary, 30, (40, 80), true, true, true),
        portal("simplyhired", "https://www.simplyhired.com", Secondary, 25, (35, 70), false, false, false),
        portal("careerbuilder", "https://www.careerbuilder.com", Secondary, 25, (35, 70), true, true, false),
        portal("otta", "https://app.otta.com", Specialized, 20, (60, 120), true, false, true),
        portal("remoteok", "https://remoteok.com", Specialized, 25, (30, 60), false, false, true),
        portal("weworkremotely", "https://weworkremotely.com", Specialized, 20, (40, 80), false, false, true),
        portal("hired", "https://hired.com", Specialized, 15, (60, 120), true, true, true),
    ]
}

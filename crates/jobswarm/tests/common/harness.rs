//! Test harness for isolated swarm runs.
//!
//! `TestHarness` owns a temporary data home with a file-backed ledger and a
//! session directory, and registers scripted portals for the orchestrator.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use jobswarm::config::{Config, DataPaths};
use jobswarm::portal::{OfflineDriver, PortalAdapter, PortalConfig, PortalRegistry};
use jobswarm::vault::Credentials;
use jobswarm::{JobLedger, SessionStore, SwarmOrchestrator};

use super::builders::{Script, ScriptedAdapter};

pub struct TestHarness {
    temp_dir: TempDir,
    pub paths: DataPaths,
    pub ledger: JobLedger,
    pub sessions: SessionStore,
    registry: Option<PortalRegistry>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let paths = DataPaths::new(temp_dir.path());
        paths.ensure().expect("Failed to create data home");
        let ledger = JobLedger::open(&paths.database()).expect("Failed to open ledger");
        let sessions = SessionStore::new(paths.sessions_dir(), chrono::Duration::days(30));
        Self {
            temp_dir,
            paths,
            ledger,
            sessions,
            registry: Some(PortalRegistry::new()),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Registers a portal served by a `ScriptedAdapter` sharing `script`.
    pub fn register(&mut self, config: PortalConfig, script: &Script) {
        let script = script.clone();
        self.registry
            .as_mut()
            .expect("registry already handed to an orchestrator")
            .register(
                config,
                Arc::new(
                    move |config: PortalConfig,
                          _credentials: Credentials|
                          -> Box<dyn PortalAdapter> {
                        Box::new(ScriptedAdapter::new(config, script.clone()))
                    },
                ),
            );
    }

    /// Saves a live session artifact for `portal`.
    pub fn import_session(&self, portal: &str) {
        self.sessions
            .save(portal, json!({"cookies": [{"name": "sid", "value": "x", "expires": -1}]}))
            .expect("Failed to save session");
    }

    /// Saves a session whose only cookie has already expired.
    pub fn import_expired_session(&self, portal: &str) {
        let past = (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp();
        self.sessions
            .save(portal, json!({"cookies": [{"name": "sid", "value": "x", "expires": past}]}))
            .expect("Failed to save session");
    }

    /// Builds an orchestrator over this harness's ledger, sessions and
    /// registered portals. Can be called once.
    pub fn orchestrator(&mut self, config: Config) -> SwarmOrchestrator {
        let registry = self
            .registry
            .take()
            .expect("orchestrator already built for this harness");
        SwarmOrchestrator::new(
            config,
            self.ledger.clone(),
            self.sessions.clone(),
            registry,
            Arc::new(OfflineDriver),
            Credentials::new(),
        )
    }
}

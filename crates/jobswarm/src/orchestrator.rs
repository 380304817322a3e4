//! Swarm orchestration.
//!
//! The orchestrator owns one [`PortalWorker`] per selected portal and drives
//! them through research and application phases. Both phases fan out one
//! task per worker and join all of them before returning; a failing search
//! or cycle contributes zero and never cancels its siblings.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DataPaths};
use crate::error::{Result, SwarmError, WorkerError};
use crate::ledger::{JobLedger, LedgerStats};
use crate::portal::{AutomationDriver, CandidateProfile, OfflineDriver, PortalRegistry, Tier};
use crate::scoring::Scorer;
use crate::sessions::SessionStore;
use crate::vault::{Credentials, SecretVault};
use crate::worker::{PortalWorker, WorkerSettings};

/// Which portals the swarm runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalSelection {
    Portals(Vec<String>),
    Tier(Tier),
}

impl Default for PortalSelection {
    fn default() -> Self {
        PortalSelection::Tier(Tier::Major)
    }
}

/// Result of one `run_full_cycle`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    /// New jobs queued by the research phase.
    pub research: usize,
    /// Applications that reached `APPLIED` in the application phase.
    pub applied: usize,
    pub timestamp: DateTime<Utc>,
    pub ledger: LedgerStats,
}

/// Requests the end of `continuous_mode`. Cheap to clone.
#[derive(Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` or until a stop is requested. Returns true when
    /// woken by a stop.
    pub async fn wait(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        if self.is_stopped() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_stopped(),
            _ = &mut notified => true,
        }
    }
}

type SharedWorker = Arc<Mutex<PortalWorker>>;

pub struct SwarmOrchestrator {
    config: Config,
    ledger: JobLedger,
    sessions: SessionStore,
    registry: PortalRegistry,
    driver: Arc<dyn AutomationDriver>,
    profile: Arc<CandidateProfile>,
    scorer: Arc<Scorer>,
    credentials: Credentials,
    workers: BTreeMap<String, SharedWorker>,
    stop: StopHandle,
}

impl SwarmOrchestrator {
    pub fn new(
        config: Config,
        ledger: JobLedger,
        sessions: SessionStore,
        registry: PortalRegistry,
        driver: Arc<dyn AutomationDriver>,
        credentials: Credentials,
    ) -> Self {
        let profile = Arc::new(config.profile.clone());
        let scorer = Arc::new(Scorer::new(config.scoring.clone()));
        Self {
            config,
            ledger,
            sessions,
            registry,
            driver,
            profile,
            scorer,
            credentials,
            workers: BTreeMap::new(),
            stop: StopHandle::new(),
        }
    }

    /// Wires the orchestrator to the on-disk data home: ledger database,
    /// session directory, credential vault and feed-backed portals.
    pub fn open(config: Config, paths: &DataPaths) -> Result<Self> {
        let ledger = JobLedger::open(&paths.database())?;
        let sessions = SessionStore::new(
            paths.sessions_dir(),
            chrono::Duration::days(i64::from(config.swarm.session_max_age_days)),
        );
        let vault = SecretVault::open(paths.vault_key(), paths.vault_data())?;
        let credentials = vault.decrypt()?;
        let registry = PortalRegistry::with_feed_adapters(paths.feeds_dir(), paths.outbox_dir());
        Ok(Self::new(
            config,
            ledger,
            sessions,
            registry,
            Arc::new(OfflineDriver),
            credentials,
        ))
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &PortalRegistry {
        &self.registry
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Names of the running workers, sorted.
    pub fn worker_names(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    pub fn worker(&self, name: &str) -> Option<SharedWorker> {
        self.workers.get(name).cloned()
    }

    fn resolve(&self, selection: &PortalSelection) -> Vec<String> {
        match selection {
            PortalSelection::Portals(names) => names.clone(),
            PortalSelection::Tier(tier) => self.registry.portals_in(*tier),
        }
    }

    /// Reclaims stale leases, then builds and starts a worker for every
    /// selected portal. Portals that fail to start are left out. Errors with
    /// [`SwarmError::NoWorkers`] when none start.
    pub async fn initialize_workers(&mut self, selection: &PortalSelection) -> Result<()> {
        if !self.workers.is_empty() {
            self.shutdown().await;
        }

        let stale_after = chrono::Duration::minutes(self.config.swarm.stale_lease_mins as i64);
        let reclaimed = self.ledger.requeue_stale(stale_after)?;
        if reclaimed > 0 {
            info!("Returned {} abandoned application(s) to the queue", reclaimed);
        }

        let settings = WorkerSettings {
            daily_target: None,
            batch_limit: self.config.swarm.cycle_batch_limit,
            remote: self.config.search.remote,
            posted_within_days: self.config.search.posted_within_days,
        };

        let mut started = Vec::new();
        for name in self.resolve(selection) {
            match self.start_worker(&name, settings.clone()).await {
                Ok(worker) => {
                    info!(portal = %name, "Worker initialized");
                    started.push((name, worker));
                }
                Err(e) if e.is_configuration() => {
                    warn!(
                        portal = %name,
                        "Skipping portal: {} (import a session with `jobswarm session import {}`)",
                        e,
                        name
                    );
                }
                Err(e) => error!(portal = %name, "Failed to initialize worker: {}", e),
            }
        }

        if started.is_empty() {
            return Err(SwarmError::NoWorkers);
        }

        let shares = split_target(self.config.swarm.daily_target, started.len());
        for ((name, mut worker), share) in started.into_iter().zip(shares) {
            worker.set_daily_target(share);
            debug!(portal = %name, daily_cap = worker.daily_cap(), "Daily cap assigned");
            self.workers.insert(name, Arc::new(Mutex::new(worker)));
        }

        info!("Started {} workers", self.workers.len());
        Ok(())
    }

    async fn start_worker(
        &self,
        name: &str,
        settings: WorkerSettings,
    ) -> std::result::Result<PortalWorker, WorkerError> {
        let adapter = self.registry.build(name, &self.credentials)?;
        let mut worker = PortalWorker::new(
            adapter,
            self.ledger.clone(),
            self.sessions.clone(),
            Arc::clone(&self.driver),
            Arc::clone(&self.profile),
            Arc::clone(&self.scorer),
            settings,
        );
        worker.start().await?;
        Ok(worker)
    }

    fn semaphore(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.config.swarm.max_concurrent_workers.max(1)))
    }

    /// Every worker searches every keyword x location pair. Returns the
    /// number of newly queued jobs.
    ///
    /// Each worker walks the whole grid in order under a single permit.
    pub async fn run_research_phase(&self) -> usize {
        info!("=== RESEARCH PHASE ===");
        let semaphore = self.semaphore();
        let grid: Arc<Vec<(String, String)>> = Arc::new(
            self.config
                .search
                .keywords
                .iter()
                .flat_map(|k| {
                    self.config
                        .search
                        .locations
                        .iter()
                        .map(move |l| (k.clone(), l.clone()))
                })
                .collect(),
        );
        let mut tasks = JoinSet::new();

        for (name, worker) in &self.workers {
            let name = name.clone();
            let worker = Arc::clone(worker);
            let semaphore = Arc::clone(&semaphore);
            let grid = Arc::clone(&grid);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return 0;
                };
                let mut worker = worker.lock().await;
                let mut added = 0;
                for (keyword, location) in grid.iter() {
                    match worker.search_and_queue(keyword, location).await {
                        Ok(n) => added += n,
                        Err(e) => warn!(
                            portal = %name,
                            %keyword,
                            %location,
                            "Search task failed: {}",
                            e
                        ),
                    }
                }
                added
            });
        }

        let mut total = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(added) => total += added,
                Err(e) => error!("Search task panicked: {}", e),
            }
        }

        info!("Research complete: {} jobs added to queue", total);
        total
    }

    /// Every worker runs one application cycle. Returns the number of jobs
    /// that reached `APPLIED`.
    pub async fn run_application_phase(&self) -> usize {
        info!("=== APPLICATION PHASE ===");
        let semaphore = self.semaphore();
        let mut tasks = JoinSet::new();

        for (name, worker) in &self.workers {
            let name = name.clone();
            let worker = Arc::clone(worker);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, Err(None));
                };
                let mut worker = worker.lock().await;
                let result = worker.run_cycle().await.map_err(Some);
                (name, result)
            });
        }

        let mut total = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(report))) => {
                    debug!(portal = %name, ?report, "Cycle finished");
                    total += report.applied;
                }
                Ok((name, Err(Some(e)))) => {
                    warn!(portal = %name, "Application cycle failed: {}", e)
                }
                Ok((_, Err(None))) => {}
                Err(e) => error!("Application task panicked: {}", e),
            }
        }

        info!("Application phase complete: {} jobs applied", total);
        total
    }

    /// Research, cooldown, application, then a ledger snapshot.
    pub async fn run_full_cycle(&self) -> Result<CycleStats> {
        let research = self.run_research_phase().await;
        tokio::time::sleep(Duration::from_secs(self.config.swarm.cooldown_secs)).await;
        let applied = self.run_application_phase().await;
        let ledger = self.ledger.stats()?;
        Ok(CycleStats {
            research,
            applied,
            timestamp: Utc::now(),
            ledger,
        })
    }

    /// Runs full cycles every `interval` until [`StopHandle::stop`] is called.
    /// The stop flag is only checked between cycles.
    pub async fn continuous_mode(&self, interval: Duration) {
        info!("Starting continuous mode (interval: {:?})", interval);
        let backoff = Duration::from_secs(self.config.swarm.error_backoff_secs);

        while !self.stop.is_stopped() {
            let pause = match self.run_full_cycle().await {
                Ok(stats) => {
                    info!(
                        research = stats.research,
                        applied = stats.applied,
                        total = stats.ledger.total,
                        "Cycle complete"
                    );
                    interval
                }
                Err(e) => {
                    error!("Cycle error: {}", e);
                    backoff
                }
            };

            if self.stop.wait(pause).await {
                break;
            }
        }
        info!("Continuous mode stopped");
    }

    /// Stops every worker and releases its automation session.
    pub async fn shutdown(&mut self) {
        info!("Shutting down swarm...");
        for (name, worker) in std::mem::take(&mut self.workers) {
            if let Err(e) = worker.lock().await.stop().await {
                warn!(portal = %name, "Error stopping worker: {}", e);
            }
        }
    }
}

/// Splits `target` into `workers` shares differing by at most one.
fn split_target(target: u32, workers: usize) -> Vec<u32> {
    if workers == 0 {
        return Vec::new();
    }
    let n = workers as u32;
    let base = target / n;
    let extra = (target % n) as usize;
    (0..workers)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

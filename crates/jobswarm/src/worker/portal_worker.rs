//! One worker per portal.
//!
//! A worker owns its adapter, its automation session and its quota counter.
//! The only state it shares with other workers is the ledger.
//!
//! ```text
//! IDLE -> SEARCHING -> (queue results) -> IDLE -> APPLYING(job) -> IDLE
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::quota::QuotaState;
use crate::error::{AdapterError, WorkerError};
use crate::ledger::{Fingerprint, JobLedger, JobStatus, NewAttempt, NewJob};
use crate::portal::{
    ApplyOutcome, ApplyReport, AutomationDriver, AutomationSession, CandidateProfile,
    PortalAdapter, SearchQuery,
};
use crate::scoring::{Scorer, SearchContext};
use crate::sessions::{SessionStatus, SessionStore};

/// Tunables handed to a worker by the orchestrator.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Daily application target for this worker; clamped to the portal cap.
    pub daily_target: Option<u32>,
    /// Maximum jobs taken from the queue per cycle.
    pub batch_limit: u32,
    pub remote: bool,
    pub posted_within_days: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            daily_target: None,
            batch_limit: 10,
            remote: true,
            posted_within_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Searching,
    Applying(Fingerprint),
}

/// Outcome counts of one `run_cycle`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub attempts: usize,
    /// The cycle ended early on a CAPTCHA.
    pub halted: bool,
    pub quota_exhausted: bool,
}

pub struct PortalWorker {
    adapter: Box<dyn PortalAdapter>,
    ledger: JobLedger,
    sessions: SessionStore,
    driver: Arc<dyn AutomationDriver>,
    profile: Arc<CandidateProfile>,
    scorer: Arc<Scorer>,
    settings: WorkerSettings,
    quota: QuotaState,
    session: Option<Box<dyn AutomationSession>>,
    state: WorkerState,
    last_apply_at: Option<Instant>,
}

impl PortalWorker {
    pub fn new(
        adapter: Box<dyn PortalAdapter>,
        ledger: JobLedger,
        sessions: SessionStore,
        driver: Arc<dyn AutomationDriver>,
        profile: Arc<CandidateProfile>,
        scorer: Arc<Scorer>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            adapter,
            ledger,
            sessions,
            driver,
            profile,
            scorer,
            settings,
            quota: QuotaState::new(Utc::now()),
            session: None,
            state: WorkerState::Idle,
            last_apply_at: None,
        }
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    pub fn adapter(&self) -> &dyn PortalAdapter {
        self.adapter.as_ref()
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn quota(&self) -> &QuotaState {
        &self.quota
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Effective daily cap: the worker's share of the swarm target, never
    /// above the portal's own cap.
    pub fn daily_cap(&self) -> u32 {
        let portal_cap = self.adapter.config().daily_cap;
        self.settings
            .daily_target
            .map_or(portal_cap, |target| target.min(portal_cap))
    }

    pub fn set_daily_target(&mut self, target: u32) {
        self.settings.daily_target = Some(target);
    }

    fn adapter_error(&self, source: AdapterError) -> WorkerError {
        WorkerError::Adapter {
            portal: self.name().to_string(),
            source,
        }
    }

    /// Opens the automation session and, for login portals, restores the
    /// saved session artifact. Fails closed when the artifact is missing or
    /// expired, or the portal does not accept it.
    pub async fn start(&mut self) -> Result<(), WorkerError> {
        let config = self.adapter.config().clone();
        let mut session = self
            .driver
            .open(&config)
            .await
            .map_err(|e| self.adapter_error(e))?;

        if config.requires_login {
            if let Err(e) = self.restore_login(session.as_mut()).await {
                if let Err(close_err) = session.close().await {
                    debug!("{}: closing session after failed start: {}", config.name, close_err);
                }
                return Err(e);
            }
        }

        self.session = Some(session);
        self.state = WorkerState::Idle;
        info!(portal = %config.name, daily_cap = self.daily_cap(), "Worker started");
        Ok(())
    }

    async fn restore_login(&self, session: &mut dyn AutomationSession) -> Result<(), WorkerError> {
        let portal = self.name().to_string();
        match self.sessions.status(&portal, Utc::now())? {
            SessionStatus::Missing => return Err(WorkerError::MissingSession { portal }),
            SessionStatus::Expired(_) => return Err(WorkerError::SessionExpired { portal }),
            SessionStatus::Valid(artifact) => session
                .import_state(&artifact.state)
                .await
                .map_err(|e| self.adapter_error(e))?,
        }

        let logged_in = match self.adapter.is_logged_in(session).await {
            Ok(true) => true,
            Ok(false) => self.try_login(session).await,
            Err(e) => {
                warn!("{}: login check failed: {}", portal, e);
                self.try_login(session).await
            }
        };

        if logged_in {
            Ok(())
        } else {
            Err(WorkerError::LoginFailed { portal })
        }
    }

    async fn try_login(&self, session: &mut dyn AutomationSession) -> bool {
        match self.adapter.login(session).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!("{}: login failed: {}", self.name(), e);
                false
            }
        }
    }

    /// Releases the automation session. Idempotent.
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        self.state = WorkerState::Idle;
        if let Some(mut session) = self.session.take() {
            session.close().await.map_err(|e| self.adapter_error(e))?;
            info!(portal = %self.name(), "Worker stopped");
        }
        Ok(())
    }

    /// Searches one keyword/location pair, scores every listing and queues
    /// those that clear the admission threshold. Returns the number of new
    /// jobs added to the ledger.
    pub async fn search_and_queue(
        &mut self,
        keyword: &str,
        location: &str,
    ) -> Result<usize, WorkerError> {
        self.state = WorkerState::Searching;
        let result = self.search_inner(keyword, location).await;
        self.state = WorkerState::Idle;
        result
    }

    async fn search_inner(&mut self, keyword: &str, location: &str) -> Result<usize, WorkerError> {
        let portal = self.name().to_string();
        let query = SearchQuery {
            keywords: keyword.to_string(),
            location: Some(location.to_string()),
            remote: self.settings.remote,
            posted_within_days: self.settings.posted_within_days,
        };

        let session = self
            .session
            .as_deref_mut()
            .ok_or_else(|| WorkerError::NotStarted {
                portal: portal.clone(),
            })?;
        let listings = self
            .adapter
            .search(session, &query)
            .await
            .map_err(|source| WorkerError::Adapter {
                portal: portal.clone(),
                source,
            })?;

        let ctx = SearchContext::new(keyword, Some(location.to_string()));
        let mut added = 0;
        for listing in &listings {
            let card = self.scorer.score(listing, &ctx);
            if !card.admitted {
                debug!("{}: '{}' scored {}, not queued", portal, listing.title, card.score);
                continue;
            }

            let job = NewJob {
                url: listing.url.clone(),
                title: listing.title.clone(),
                company: listing.company.clone(),
                portal: portal.clone(),
                location: listing.location.clone(),
                description: listing.description.clone(),
                score: card.score,
                priority: card.priority,
                status: JobStatus::Queued,
            };
            if self.ledger.insert(&job)? {
                added += 1;
            }
        }

        info!(
            "{}: '{}' in {} found {} listing(s), queued {} new",
            portal,
            keyword,
            location,
            listings.len(),
            added
        );
        Ok(added)
    }

    /// Waits until the randomized gap since the previous apply has elapsed.
    async fn pace(&self) {
        if let Some(last) = self.last_apply_at {
            let delay = self.adapter.config().rate_limit_delay();
            debug!("{}: pacing {:?} before next application", self.name(), delay);
            tokio::time::sleep_until(last + delay).await;
        }
    }

    /// Applies to queued jobs of this portal until the queue is empty, the
    /// batch limit or the daily quota is reached, or a CAPTCHA shows up.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, WorkerError> {
        let portal = self.name().to_string();
        if self.session.is_none() {
            return Err(WorkerError::NotStarted { portal });
        }

        if self.quota.roll_over(Utc::now()) {
            info!("{}: daily quota reset", portal);
        }

        let cap = self.daily_cap();
        let mut report = CycleReport::default();

        for _ in 0..self.settings.batch_limit {
            if self.quota.is_exhausted(cap) {
                info!("{}: daily limit of {} reached", portal, cap);
                report.quota_exhausted = true;
                break;
            }

            let Some(job) = self.ledger.claim_next(&portal)? else {
                break;
            };

            self.pace().await;

            self.state = WorkerState::Applying(job.fingerprint.clone());
            let result = match self.session.as_deref_mut() {
                Some(session) => self.adapter.apply(session, &job, &self.profile).await,
                None => Err(AdapterError::Session("session closed".to_string())),
            };
            self.last_apply_at = Some(Instant::now());
            self.state = WorkerState::Idle;

            let report_or_error = result.unwrap_or_else(|e| {
                ApplyReport::new(ApplyOutcome::Failure).with_error(e.to_string())
            });
            let outcome = report_or_error.outcome;
            let (status, error) = classify(&report_or_error);

            let attempt = NewAttempt {
                outcome,
                error: error.clone(),
                form_snapshot: report_or_error.form_snapshot,
                screenshot_path: report_or_error.screenshot_path,
            };
            self.ledger
                .complete_application(&job.fingerprint, status, &attempt, error.as_deref())?;
            report.attempts += 1;

            match status {
                JobStatus::Applied => {
                    self.quota.record_success();
                    report.applied += 1;
                    info!(
                        "{}: applied to '{}' at {} ({}/{})",
                        portal,
                        job.title,
                        job.company,
                        self.quota.sent_today(),
                        cap
                    );
                }
                JobStatus::Skipped => {
                    report.skipped += 1;
                    debug!("{}: already applied to '{}'", portal, job.title);
                }
                _ => {
                    report.failed += 1;
                    warn!(
                        portal = %portal,
                        fingerprint = %job.fingerprint,
                        outcome = %outcome,
                        "Application failed: {}",
                        error.as_deref().unwrap_or("no detail")
                    );
                }
            }

            if outcome == ApplyOutcome::Captcha {
                warn!("{}: CAPTCHA detected, halting cycle", portal);
                report.halted = true;
                break;
            }
        }

        Ok(report)
    }
}

/// Maps an apply outcome to the job's terminal status and error detail.
fn classify(report: &ApplyReport) -> (JobStatus, Option<String>) {
    match report.outcome {
        ApplyOutcome::Success => (JobStatus::Applied, None),
        ApplyOutcome::AlreadyApplied => (JobStatus::Skipped, None),
        ApplyOutcome::Captcha => (
            JobStatus::Failed,
            Some(report.error.clone().unwrap_or_else(|| "CAPTCHA detected".to_string())),
        ),
        other => (
            JobStatus::Failed,
            Some(
                report
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("apply returned {}", other)),
            ),
        ),
    }
}

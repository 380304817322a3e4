//! Command handlers.

use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use jobswarm::config::{load_config, load_config_or_default};
use jobswarm::ledger::Fingerprint;
use jobswarm::portal::builtin_catalog;
use jobswarm::{
    Config, DataPaths, JobLedger, JobStatus, PortalRegistry, PortalSelection, SecretVault,
    SessionStatus, SessionStore, SwarmOrchestrator, Tier,
};

use crate::cli::{RunArgs, SessionCommand, StatsArgs, VaultCommand};

/// Resolved configuration and data home.
pub struct AppContext {
    pub config: Config,
    pub paths: DataPaths,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config(path)?,
            None => load_config_or_default(DataPaths::from_env()?.config_file())?,
        };
        let paths = DataPaths::resolve(Some(&config))?;
        Ok(Self { config, paths })
    }

    fn ledger(&self) -> Result<JobLedger> {
        Ok(JobLedger::open(&self.paths.database())?)
    }

    fn sessions(&self) -> SessionStore {
        SessionStore::new(
            self.paths.sessions_dir(),
            chrono::Duration::days(i64::from(self.config.swarm.session_max_age_days)),
        )
    }

    fn vault(&self) -> Result<SecretVault> {
        Ok(SecretVault::open(
            self.paths.vault_key(),
            self.paths.vault_data(),
        )?)
    }
}

pub fn init(ctx: &AppContext) -> Result<()> {
    ctx.paths
        .ensure()
        .with_context(|| format!("cannot create {}", ctx.paths.root().display()))?;

    let config_file = ctx.paths.config_file();
    if config_file.exists() {
        println!("Config already present: {}", config_file.display());
    } else {
        let json = serde_json::to_string_pretty(&Config::default())?;
        std::fs::write(&config_file, json)
            .with_context(|| format!("cannot write {}", config_file.display()))?;
        println!("Wrote default config: {}", config_file.display());
    }

    ctx.ledger()?;
    println!("Ledger:   {}", ctx.paths.database().display());
    println!("Sessions: {}", ctx.paths.sessions_dir().display());
    println!("Feeds:    {}", ctx.paths.feeds_dir().display());
    println!();
    println!("Next: import a session for each login portal with `jobswarm session import <portal> <file>`");
    Ok(())
}

fn selection(args: &RunArgs) -> Result<PortalSelection> {
    if !args.portals.is_empty() {
        return Ok(PortalSelection::Portals(args.portals.clone()));
    }
    match args.tier.as_deref() {
        Some(tier) => Ok(PortalSelection::Tier(tier.parse::<Tier>().map_err(|e| anyhow!(e))?)),
        None => Ok(PortalSelection::default()),
    }
}

pub async fn run(mut ctx: AppContext, args: RunArgs) -> Result<()> {
    if let Some(target) = args.target {
        ctx.config.swarm.daily_target = target;
    }
    let selection = selection(&args)?;
    ctx.paths.ensure()?;

    let mut swarm = SwarmOrchestrator::open(ctx.config.clone(), &ctx.paths)?;
    swarm.initialize_workers(&selection).await?;

    let stop = swarm.stop_handle();
    ctrlc::set_handler(move || {
        info!("Interrupt received; stopping after the current cycle");
        stop.stop();
    })
    .context("cannot install Ctrl-C handler")?;

    let outcome = if args.continuous {
        let minutes = args.interval.unwrap_or(ctx.config.swarm.cycle_interval_mins);
        swarm.continuous_mode(Duration::from_secs(minutes * 60)).await;
        Ok(())
    } else {
        swarm.run_full_cycle().await.map(|stats| {
            println!(
                "Cycle complete: {} new jobs queued, {} applications sent",
                stats.research, stats.applied
            );
            println!(
                "Ledger: {} jobs, {} applied, {} queued, {} failed",
                stats.ledger.total,
                stats.ledger.count(JobStatus::Applied),
                stats.ledger.count(JobStatus::Queued),
                stats.ledger.count(JobStatus::Failed),
            );
        })
    };

    swarm.shutdown().await;
    outcome?;
    Ok(())
}

pub fn stats(ctx: &AppContext, args: StatsArgs) -> Result<()> {
    let ledger = ctx.ledger()?;
    let totals = ledger.stats()?;
    let portals = ledger.portal_stats()?;

    if args.json {
        let value = serde_json::json!({ "ledger": totals, "portals": portals });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Jobs: {} (avg score {:.1})", totals.total, totals.avg_score);
    println!("Attempts: {}", totals.total_attempts);
    for (status, count) in &totals.by_status {
        println!("  {:<10} {}", status, count);
    }

    if !portals.is_empty() {
        println!();
        println!(
            "{:<16} {:>6} {:>8} {:>7} {:>7} {:>6}",
            "PORTAL", "TOTAL", "APPLIED", "FAILED", "QUEUED", "SCORE"
        );
        for p in &portals {
            println!(
                "{:<16} {:>6} {:>8} {:>7} {:>7} {:>6.1}",
                p.portal, p.total, p.applied, p.failed, p.queued, p.avg_score
            );
        }
    }

    if let Some(status) = args.jobs {
        let status: JobStatus = status.parse().map_err(|e: String| anyhow!(e))?;
        println!();
        for job in ledger.query(status, None, args.limit)? {
            println!(
                "{}  {:>3}  {:<14} {} @ {}",
                job.fingerprint, job.score, job.portal, job.title, job.company
            );
        }
    }
    Ok(())
}

pub fn portals(ctx: &AppContext) -> Result<()> {
    let registry =
        PortalRegistry::with_feed_adapters(ctx.paths.feeds_dir(), ctx.paths.outbox_dir());
    let sessions = ctx.sessions();
    let now = Utc::now();

    for tier in Tier::ALL {
        println!("{}", tier);
        for config in registry.catalog().into_iter().filter(|c| c.tier == tier) {
            let session = if !config.requires_login {
                "no login"
            } else {
                match sessions.status(&config.name, now)? {
                    SessionStatus::Valid(_) => "session ok",
                    SessionStatus::Expired(_) => "session expired",
                    SessionStatus::Missing => "no session",
                }
            };
            println!(
                "  {:<16} {:>3}/day  {:>3}-{:<3}s  {}",
                config.name, config.daily_cap, config.delay_min_secs, config.delay_max_secs, session
            );
        }
    }
    Ok(())
}

pub fn session(ctx: &AppContext, command: SessionCommand) -> Result<()> {
    let sessions = ctx.sessions();
    match command {
        SessionCommand::Import { portal, file } => {
            if !builtin_catalog().iter().any(|c| c.name == portal) {
                bail!("unknown portal '{}'", portal);
            }
            sessions.import_from(&portal, &file)?;
            println!("Imported session for {}", portal);
        }
        SessionCommand::List => {
            let now = Utc::now();
            for portal in sessions.list()? {
                let (state, saved_at) = match sessions.status(&portal, now)? {
                    SessionStatus::Valid(a) => ("valid", Some(a.saved_at)),
                    SessionStatus::Expired(a) => ("expired", Some(a.saved_at)),
                    SessionStatus::Missing => ("missing", None),
                };
                let saved = saved_at.map(|t| t.to_rfc3339()).unwrap_or_default();
                println!("{:<16} {:<8} {}", portal, state, saved);
            }
        }
        SessionCommand::Delete { portal } => {
            if sessions.delete(&portal)? {
                println!("Deleted session for {}", portal);
            } else {
                println!("No session saved for {}", portal);
            }
        }
    }
    Ok(())
}

fn read_secret() -> Result<SecretString> {
    eprint!("Value: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let value = line.trim_end_matches(&['\r', '\n'][..]).to_string();
    if value.is_empty() {
        bail!("empty value");
    }
    Ok(SecretString::from(value))
}

pub fn vault(ctx: &AppContext, command: VaultCommand) -> Result<()> {
    let vault = ctx.vault()?;
    match command {
        VaultCommand::Set { key, value } => {
            let secret = match value {
                Some(v) => SecretString::from(v),
                None => read_secret()?,
            };
            vault.set(&key, secret.expose_secret())?;
            println!("Stored {}", key);
        }
        VaultCommand::List => {
            for key in vault.decrypt()?.keys() {
                println!("{}", key);
            }
        }
        VaultCommand::Remove { key } => {
            if vault.remove(&key)? {
                println!("Removed {}", key);
            } else {
                println!("No credential named {}", key);
            }
        }
        VaultCommand::Rotate => {
            vault.rotate()?;
            println!("Vault re-encrypted under a new key");
        }
    }
    Ok(())
}

pub fn mark_interview(ctx: &AppContext, fingerprint: &str) -> Result<()> {
    ctx.ledger()?
        .mark_interview(&Fingerprint::from_raw(fingerprint))?;
    println!("Marked {} as INTERVIEW", fingerprint);
    Ok(())
}

pub fn requeue_stale(ctx: &AppContext, older_than: Option<u64>) -> Result<()> {
    let minutes = older_than.unwrap_or(ctx.config.swarm.stale_lease_mins);
    let reclaimed = ctx
        .ledger()?
        .requeue_stale(chrono::Duration::minutes(minutes as i64))?;
    println!("Returned {} job(s) to the queue", reclaimed);
    Ok(())
}

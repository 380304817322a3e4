//! Command line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Concurrent job-application swarm.
///
/// Discovers listings on the configured portals, scores and queues them in a
/// local ledger, and applies within each portal's pacing and daily limits.
#[derive(Parser, Debug)]
#[command(name = "jobswarm")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config.json (defaults to <data home>/config.json)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data home, default config and ledger
    Init,

    /// Run one research + application cycle, or keep cycling
    Run(RunArgs),

    /// Print ledger statistics
    Stats(StatsArgs),

    /// List available portals by tier
    Portals,

    /// Manage saved portal sessions
    #[command(subcommand)]
    Session(SessionCommand),

    /// Manage encrypted portal credentials
    #[command(subcommand)]
    Vault(VaultCommand),

    /// Record that an applied job led to an interview
    MarkInterview {
        /// Job fingerprint as shown by `stats --jobs`
        fingerprint: String,
    },

    /// Return abandoned APPLYING jobs to the queue
    RequeueStale {
        /// Minimum lease age in minutes (defaults to swarm.stale_lease_mins)
        #[arg(long)]
        older_than: Option<u64>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Portals to run, by name
    #[arg(long, value_delimiter = ',', conflicts_with = "tier")]
    pub portals: Vec<String>,

    /// Portal tier: 1|2|3 or major|secondary|specialized
    #[arg(long)]
    pub tier: Option<String>,

    /// Keep running cycles until interrupted
    #[arg(long)]
    pub continuous: bool,

    /// Minutes between cycles in continuous mode
    #[arg(long)]
    pub interval: Option<u64>,

    /// Daily application target across all workers
    #[arg(long)]
    pub target: Option<u32>,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,

    /// Also list jobs with this status
    #[arg(long)]
    pub jobs: Option<String>,

    /// Maximum jobs listed with --jobs
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Import an exported browser state file for a portal
    Import {
        portal: String,
        /// JSON file holding cookies and storage
        file: PathBuf,
    },

    /// List saved sessions and whether they are still valid
    List,

    /// Delete a portal's saved session
    Delete { portal: String },
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Store a credential (value read from stdin when --value is omitted)
    Set {
        /// Key, e.g. linkedin_email
        key: String,
        #[arg(long)]
        value: Option<String>,
    },

    /// List stored credential keys
    List,

    /// Remove a credential
    Remove { key: String },

    /// Re-encrypt the vault under a fresh key
    Rotate,
}

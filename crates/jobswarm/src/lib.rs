pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod portal;
mod private_file;
pub mod scoring;
pub mod sessions;
pub mod vault;
pub mod worker;

pub use config::{load_config, load_config_or_default, Config, DataPaths};
pub use error::{AdapterError, ConfigError, Result, SwarmError, WorkerError};
pub use ledger::{Fingerprint, JobLedger, JobRecord, JobStatus, Priority};
pub use orchestrator::{CycleStats, PortalSelection, StopHandle, SwarmOrchestrator};
pub use portal::{PortalAdapter, PortalConfig, PortalRegistry, Tier};
pub use scoring::Scorer;
pub use sessions::{SessionStatus, SessionStore};
pub use vault::{Credentials, SecretVault, VaultError};
pub use worker::{CycleReport, PortalWorker};

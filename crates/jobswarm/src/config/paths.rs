//! On-disk layout of the data home.

use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const HOME_ENV: &str = "JOBSWARM_HOME";
pub const CONFIG_FILE: &str = "config.json";

/// Every path the swarm reads or writes, derived from one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolution order: `data_directory` in the config, then
    /// `JOBSWARM_HOME`, then `~/.jobswarm`.
    pub fn resolve(config: Option<&Config>) -> Result<Self, ConfigError> {
        if let Some(dir) = config.and_then(|c| c.data_directory.as_deref()) {
            return Ok(Self::new(dir));
        }
        Self::from_env()
    }

    /// `JOBSWARM_HOME` or `~/.jobswarm`.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(home));
        }
        dirs::home_dir()
            .map(|home| Self::new(home.join(".jobswarm")))
            .ok_or(ConfigError::NoDataDirectory)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn database(&self) -> PathBuf {
        self.root.join("jobswarm.db")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn vault_key(&self) -> PathBuf {
        self.root.join("vault").join("credentials.key")
    }

    pub fn vault_data(&self) -> PathBuf {
        self.root.join("vault").join("credentials.enc")
    }

    pub fn feeds_dir(&self) -> PathBuf {
        self.root.join("feeds")
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.root.join("outbox")
    }

    /// Creates the directory skeleton. Existing directories are left alone.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [
            self.root.clone(),
            self.sessions_dir(),
            self.root.join("vault"),
            self.feeds_dir(),
            self.outbox_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_derived_paths() {
        let paths = DataPaths::new("/data/js");
        assert_eq!(paths.database(), PathBuf::from("/data/js/jobswarm.db"));
        assert_eq!(paths.sessions_dir(), PathBuf::from("/data/js/sessions"));
        assert_eq!(
            paths.vault_key(),
            PathBuf::from("/data/js/vault/credentials.key")
        );
        assert_eq!(
            paths.vault_data(),
            PathBuf::from("/data/js/vault/credentials.enc")
        );
        assert_eq!(paths.config_file(), PathBuf::from("/data/js/config.json"));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var(HOME_ENV, "/tmp/jobswarm-env-test");
        let paths = DataPaths::from_env().unwrap();
        std::env::remove_var(HOME_ENV);
        assert_eq!(paths.root(), Path::new("/tmp/jobswarm-env-test"));
    }

    #[test]
    #[serial]
    fn test_config_directory_wins_over_env() {
        std::env::set_var(HOME_ENV, "/tmp/jobswarm-env-test");
        let config = Config {
            data_directory: Some("/srv/jobswarm".to_string()),
            ..Config::default()
        };
        let paths = DataPaths::resolve(Some(&config)).unwrap();
        std::env::remove_var(HOME_ENV);
        assert_eq!(paths.root(), Path::new("/srv/jobswarm"));
    }

    #[test]
    #[serial]
    fn test_default_home() {
        std::env::remove_var(HOME_ENV);
        if let Some(home) = dirs::home_dir() {
            let paths = DataPaths::from_env().unwrap();
            assert_eq!(paths.root(), home.join(".jobswarm"));
        }
    }

    #[test]
    fn test_ensure_creates_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("home"));
        paths.ensure().unwrap();
        assert!(paths.sessions_dir().is_dir());
        assert!(paths.feeds_dir().is_dir());
        assert!(paths.outbox_dir().is_dir());
        assert!(paths.vault_key().parent().unwrap().is_dir());
    }
}

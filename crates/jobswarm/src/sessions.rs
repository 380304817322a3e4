//! Per-portal authenticated session artifacts.
//!
//! One JSON file per portal under the sessions directory, owner-only.
//! Artifacts are written by the session setup flow (`jobswarm session
//! import`) and only read by workers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::private_file::{write_private, WriteError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session file I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed session file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize session state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid portal name '{0}'")]
    InvalidPortalName(String),
}

impl From<WriteError> for SessionError {
    fn from(e: WriteError) -> Self {
        SessionError::Io {
            path: e.path,
            source: e.source,
        }
    }
}

/// Saved authentication state of one portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArtifact {
    pub portal: String,
    pub saved_at: DateTime<Utc>,
    /// Cookies and storage, opaque to the swarm.
    pub state: Value,
}

impl SessionArtifact {
    pub fn new(portal: impl Into<String>, state: Value) -> Self {
        Self {
            portal: portal.into(),
            saved_at: Utc::now(),
            state,
        }
    }

    /// Expired when older than `max_age`, or when every cookie carrying an
    /// expiry timestamp is already past it.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.saved_at > max_age || self.all_cookies_expired(now)
    }

    fn all_cookies_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(cookies) = self.state.get("cookies").and_then(Value::as_array) else {
            return false;
        };
        if cookies.is_empty() {
            return false;
        }
        let now = now.timestamp() as f64;
        cookies.iter().all(|cookie| {
            cookie
                .get("expires")
                .and_then(Value::as_f64)
                .is_some_and(|expires| expires > 0.0 && expires < now)
        })
    }
}

/// Result of checking a portal's artifact before a worker starts.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Missing,
    Expired(SessionArtifact),
    Valid(SessionArtifact),
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn path_for(&self, portal: &str) -> Result<PathBuf, SessionError> {
        let valid = !portal.is_empty()
            && portal
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid {
            return Err(SessionError::InvalidPortalName(portal.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", portal)))
    }

    /// Stores `state` for `portal`, replacing any previous artifact.
    pub fn save(&self, portal: &str, state: Value) -> Result<SessionArtifact, SessionError> {
        let path = self.path_for(portal)?;
        let artifact = SessionArtifact::new(portal, state);
        let json = serde_json::to_string_pretty(&artifact)?;
        write_private(&path, json)?;

        tracing::info!(portal = %portal, "Session artifact saved");
        Ok(artifact)
    }

    /// Reads a JSON state blob from `source` and saves it for `portal`.
    pub fn import_from(
        &self,
        portal: &str,
        source: &Path,
    ) -> Result<SessionArtifact, SessionError> {
        let content = std::fs::read_to_string(source).map_err(|e| SessionError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let state: Value = serde_json::from_str(&content).map_err(|e| SessionError::Parse {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.save(portal, state)
    }

    pub fn load(&self, portal: &str) -> Result<Option<SessionArtifact>, SessionError> {
        let path = self.path_for(portal)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Io { path, source: e }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SessionError::Parse { path, source: e })
    }

    pub fn status(&self, portal: &str, now: DateTime<Utc>) -> Result<SessionStatus, SessionError> {
        Ok(match self.load(portal)? {
            None => SessionStatus::Missing,
            Some(artifact) if artifact.is_expired(self.max_age, now) => {
                SessionStatus::Expired(artifact)
            }
            Some(artifact) => SessionStatus::Valid(artifact),
        })
    }

    pub fn exists(&self, portal: &str) -> Result<bool, SessionError> {
        Ok(self.path_for(portal)?.exists())
    }

    /// Returns whether an artifact was removed.
    pub fn delete(&self, portal: &str) -> Result<bool, SessionError> {
        let path = self.path_for(portal)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::Io { path, source: e }),
        }
    }

    /// Portals with a saved artifact, sorted.
    pub fn list(&self) -> Result<Vec<String>, SessionError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SessionError::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut portals: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let portal = name.strip_suffix(".json")?;
                (!portal.starts_with('.')).then(|| portal.to_string())
            })
            .collect();
        portals.sort();
        Ok(portals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("sessions"), Duration::days(30))
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let state = json!({"cookies": [{"name": "li_at", "value": "x", "expires": -1}]});
        store.save("linkedin", state.clone()).unwrap();

        let loaded = store.load("linkedin").unwrap().unwrap();
        assert_eq!(loaded.portal, "linkedin");
        assert_eq!(loaded.state, state);
        assert!(store.exists("linkedin").unwrap());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.load("indeed").unwrap().is_none());
        assert_eq!(store.status("indeed", Utc::now()).unwrap(), SessionStatus::Missing);
        assert!(!store.delete("indeed").unwrap());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("dice", json!({"v": 1})).unwrap();
        store.save("dice", json!({"v": 2})).unwrap();
        assert_eq!(store.load("dice").unwrap().unwrap().state, json!({"v": 2}));
        assert_eq!(store.list().unwrap(), vec!["dice"]);
    }

    #[test]
    fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.list().unwrap().is_empty());
        store.save("otta", json!({})).unwrap();
        store.save("hired", json!({})).unwrap();
        assert_eq!(store.list().unwrap(), vec!["hired", "otta"]);
        assert!(store.delete("otta").unwrap());
        assert_eq!(store.list().unwrap(), vec!["hired"]);
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for name in ["../etc", "", "LinkedIn", "a/b"] {
            assert!(matches!(
                store.save(name, json!({})),
                Err(SessionError::InvalidPortalName(_))
            ));
        }
    }

    #[test]
    fn test_expiry_by_age() {
        let mut artifact = SessionArtifact::new("indeed", json!({}));
        let now = Utc::now();
        assert!(!artifact.is_expired(Duration::days(30), now));
        artifact.saved_at = now - Duration::days(31);
        assert!(artifact.is_expired(Duration::days(30), now));
    }

    #[test]
    fn test_expiry_by_cookies() {
        let now = Utc::now();
        let past = (now - Duration::hours(1)).timestamp();
        let future = (now + Duration::hours(1)).timestamp();

        let all_past = SessionArtifact::new(
            "indeed",
            json!({"cookies": [{"expires": past}, {"expires": past}]}),
        );
        assert!(all_past.is_expired(Duration::days(30), now));

        let one_live = SessionArtifact::new(
            "indeed",
            json!({"cookies": [{"expires": past}, {"expires": future}]}),
        );
        assert!(!one_live.is_expired(Duration::days(30), now));

        let session_cookie = SessionArtifact::new(
            "indeed",
            json!({"cookies": [{"expires": past}, {"expires": -1}]}),
        );
        assert!(!session_cookie.is_expired(Duration::days(30), now));
    }

    #[test]
    fn test_status_expired() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path(), Duration::days(1));
        store.save("naukri", json!({})).unwrap();
        let later = Utc::now() + Duration::days(2);
        assert!(matches!(
            store.status("naukri", later).unwrap(),
            SessionStatus::Expired(_)
        ));
        assert!(matches!(
            store.status("naukri", Utc::now()).unwrap(),
            SessionStatus::Valid(_)
        ));
    }

    #[test]
    fn test_import_from_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let source = dir.path().join("export.json");
        std::fs::write(&source, r#"{"cookies": [], "origins": []}"#).unwrap();
        let artifact = store.import_from("wellfound", &source).unwrap();
        assert_eq!(artifact.state["origins"], json!([]));

        std::fs::write(&source, "not json").unwrap();
        assert!(matches!(
            store.import_from("wellfound", &source),
            Err(SessionError::Parse { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_artifact_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("glassdoor", json!({"cookies": []})).unwrap();
        let path = store.dir().join("glassdoor.json");
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

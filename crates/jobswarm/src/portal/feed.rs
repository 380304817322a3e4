//! File-backed portal adapter.
//!
//! Listings are read from `feeds/<portal>.json` (a JSON array of
//! [`ListingCandidate`]). Applying appends an application packet to
//! `outbox/<portal>.jsonl` for manual submission.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::session::state_is_present;
use super::{
    ApplyOutcome, ApplyReport, AutomationSession, CandidateProfile, ListingCandidate,
    PortalAdapter, PortalConfig, SearchQuery,
};
use crate::error::AdapterError;
use crate::ledger::{Fingerprint, JobRecord};
use crate::scoring::tokenize;

/// One line of the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub fingerprint: Fingerprint,
    pub url: String,
    pub title: String,
    pub company: String,
    pub fields: BTreeMap<String, String>,
    pub submitted_at: DateTime<Utc>,
}

pub struct FeedAdapter {
    config: PortalConfig,
    feeds_dir: PathBuf,
    outbox_dir: PathBuf,
}

impl FeedAdapter {
    pub fn new(
        config: PortalConfig,
        feeds_dir: impl Into<PathBuf>,
        outbox_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            feeds_dir: feeds_dir.into(),
            outbox_dir: outbox_dir.into(),
        }
    }

    pub fn feed_path(&self) -> PathBuf {
        self.feeds_dir.join(format!("{}.json", self.config.name))
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.outbox_dir.join(format!("{}.jsonl", self.config.name))
    }

    async fn load_feed(&self) -> Result<Vec<ListingCandidate>, AdapterError> {
        let path = self.feed_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AdapterError::Extraction(format!(
                    "cannot read feed {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&content).map_err(|e| {
            AdapterError::Extraction(format!("malformed feed {}: {}", path.display(), e))
        })
    }

    async fn read_outbox(&self) -> Result<String, AdapterError> {
        match tokio::fs::read_to_string(self.outbox_path()).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(AdapterError::Submission(format!("cannot read outbox: {}", e))),
        }
    }

    /// Entries already written to the outbox. Unparseable lines are skipped.
    pub async fn outbox_entries(&self) -> Result<Vec<OutboxEntry>, AdapterError> {
        Ok(parse_outbox(&self.read_outbox().await?))
    }

    /// Appends `record` to the outbox without touching earlier lines.
    async fn append_outbox(&self, record: &str) -> Result<(), AdapterError> {
        let write_error =
            |e: std::io::Error| AdapterError::Submission(format!("cannot write outbox: {}", e));

        tokio::fs::create_dir_all(&self.outbox_dir)
            .await
            .map_err(|e| AdapterError::Submission(format!("cannot create outbox: {}", e)))?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.outbox_path())
            .await
            .map_err(write_error)?;
        file.write_all(record.as_bytes()).await.map_err(write_error)?;
        file.sync_data().await.map_err(write_error)
    }

    fn matches_query(candidate: &ListingCandidate, query: &SearchQuery) -> bool {
        let keywords = tokenize(&query.keywords);
        let title = tokenize(&candidate.title);
        let keyword_match = keywords.is_empty() || keywords.iter().any(|k| title.contains(k));

        let location_match = match (query.location.as_deref(), candidate.location.as_deref()) {
            (Some(wanted), Some(actual)) => {
                let actual = actual.to_lowercase();
                actual.contains(&wanted.to_lowercase())
                    || (query.remote && actual.contains("remote"))
            }
            _ => true,
        };

        keyword_match && location_match
    }
}

fn parse_outbox(content: &str) -> Vec<OutboxEntry> {
    content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

#[async_trait]
impl PortalAdapter for FeedAdapter {
    fn config(&self) -> &PortalConfig {
        &self.config
    }

    async fn login(&self, session: &mut dyn AutomationSession) -> Result<bool, AdapterError> {
        // No interactive login exists for a feed; an imported session is the only way in.
        self.is_logged_in(session).await
    }

    async fn is_logged_in(
        &self,
        session: &mut dyn AutomationSession,
    ) -> Result<bool, AdapterError> {
        if !self.config.requires_login {
            return Ok(true);
        }
        Ok(state_is_present(&session.export_state().await?))
    }

    async fn search(
        &self,
        session: &mut dyn AutomationSession,
        query: &SearchQuery,
    ) -> Result<Vec<ListingCandidate>, AdapterError> {
        session.navigate(&self.config.base_url).await?;
        let listings: Vec<ListingCandidate> = self
            .load_feed()
            .await?
            .into_iter()
            .filter(|c| Self::matches_query(c, query))
            .collect();
        debug!(
            portal = %self.config.name,
            found = listings.len(),
            keywords = %query.keywords,
            "Feed searched"
        );
        Ok(listings)
    }

    async fn apply(
        &self,
        session: &mut dyn AutomationSession,
        job: &JobRecord,
        profile: &CandidateProfile,
    ) -> Result<ApplyReport, AdapterError> {
        let existing = self.read_outbox().await?;
        if parse_outbox(&existing)
            .iter()
            .any(|e| e.fingerprint == job.fingerprint)
        {
            return Ok(ApplyReport::new(ApplyOutcome::AlreadyApplied));
        }

        let fields = profile.form_fields();
        if fields.get("email").map_or(true, |e| e.is_empty()) {
            return Ok(ApplyReport::new(ApplyOutcome::Failure)
                .with_error("candidate profile has no email address"));
        }

        session.navigate(&job.url).await?;
        session.submit("outbox", &fields).await?;

        let entry = OutboxEntry {
            fingerprint: job.fingerprint.clone(),
            url: job.url.clone(),
            title: job.title.clone(),
            company: job.company.clone(),
            fields: fields.clone(),
            submitted_at: Utc::now(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| AdapterError::Submission(e.to_string()))?;

        // A line left without its newline by an interrupted write stays on its own.
        let mut record = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            record.push('\n');
        }
        record.push_str(&line);
        record.push('\n');
        self.append_outbox(&record).await?;

        let snapshot = serde_json::to_value(&fields)
            .map_err(|e| AdapterError::Submission(e.to_string()))?;
        Ok(ApplyReport::new(ApplyOutcome::Success).with_snapshot(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{JobStatus, Priority};
    use crate::portal::{OfflineSession, Tier};
    use serde_json::json;
    use tempfile::TempDir;

    fn config(requires_login: bool) -> PortalConfig {
        PortalConfig {
            name: "remoteok".to_string(),
            base_url: "https://remoteok.com".to_string(),
            tier: Tier::Specialized,
            daily_cap: 25,
            delay_min_secs: 30,
            delay_max_secs: 60,
            requires_login,
            easy_apply: false,
            tech_focus: true,
        }
    }

    fn job(url: &str) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            fingerprint: Fingerprint::from_url(url),
            url: url.to_string(),
            title: "LLM Engineer".to_string(),
            company: "Acme".to_string(),
            portal: "remoteok".to_string(),
            location: Some("Remote".to_string()),
            description: None,
            score: 90,
            priority: Priority::High,
            status: JobStatus::Applying,
            discovered_at: now,
            updated_at: now,
            applied_at: None,
            notes: None,
            screenshot_path: None,
        }
    }

    fn feed_adapter(dir: &TempDir) -> FeedAdapter {
        FeedAdapter::new(config(false), dir.path().join("feeds"), dir.path().join("outbox"))
    }

    fn profile() -> CandidateProfile {
        CandidateProfile {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..CandidateProfile::default()
        }
    }

    fn write_feed(dir: &TempDir) {
        let feed = json!([
            {"title": "Senior LLM Engineer", "company": "A", "url": "https://remoteok.com/1", "location": "Remote"},
            {"title": "Sales Manager", "company": "B", "url": "https://remoteok.com/2", "location": "Remote"},
            {"title": "AI Engineer", "company": "C", "url": "https://remoteok.com/3", "location": "Berlin"},
            {"title": "AI Engineer", "company": "D", "url": "https://remoteok.com/4"}
        ]);
        std::fs::create_dir_all(dir.path().join("feeds")).unwrap();
        std::fs::write(
            dir.path().join("feeds/remoteok.json"),
            serde_json::to_string(&feed).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_search_filters_by_keyword_and_location() {
        let dir = TempDir::new().unwrap();
        write_feed(&dir);
        let adapter = feed_adapter(&dir);
        let mut session = OfflineSession::new();

        let query = SearchQuery::new("LLM Engineer", Some("India".to_string()));
        let found = adapter.search(&mut session, &query).await.unwrap();
        let urls: Vec<&str> = found.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://remoteok.com/1", "https://remoteok.com/4"]);
        assert_eq!(session.current_url(), Some("https://remoteok.com"));
    }

    #[tokio::test]
    async fn test_missing_feed_is_empty() {
        let dir = TempDir::new().unwrap();
        let adapter = feed_adapter(&dir);
        let mut session = OfflineSession::new();
        let found = adapter
            .search(&mut session, &SearchQuery::new("AI", None))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_feed_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("feeds")).unwrap();
        std::fs::write(dir.path().join("feeds/remoteok.json"), "{oops").unwrap();
        let adapter = feed_adapter(&dir);
        let mut session = OfflineSession::new();
        let err = adapter
            .search(&mut session, &SearchQuery::new("AI", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_apply_writes_outbox_then_reports_duplicate() {
        let dir = TempDir::new().unwrap();
        let adapter = feed_adapter(&dir);
        let mut session = OfflineSession::new();
        let job = job("https://remoteok.com/1");

        let first = adapter.apply(&mut session, &job, &profile()).await.unwrap();
        assert_eq!(first.outcome, ApplyOutcome::Success);
        assert_eq!(first.form_snapshot.unwrap()["first_name"], "Ada");
        assert_eq!(session.submissions().len(), 1);

        let entries = adapter.outbox_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fingerprint, job.fingerprint);

        let second = adapter.apply(&mut session, &job, &profile()).await.unwrap();
        assert_eq!(second.outcome, ApplyOutcome::AlreadyApplied);
        assert_eq!(adapter.outbox_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_appends_after_earlier_and_torn_lines() {
        let dir = TempDir::new().unwrap();
        let adapter = feed_adapter(&dir);
        let earlier = OutboxEntry {
            fingerprint: Fingerprint::from_url("https://remoteok.com/0"),
            url: "https://remoteok.com/0".to_string(),
            title: "AI Engineer".to_string(),
            company: "Acme".to_string(),
            fields: BTreeMap::new(),
            submitted_at: Utc::now(),
        };
        // An earlier packet, then a write cut short before its newline.
        let seeded = format!(
            "{}\n{{\"fingerprint\":\"ab",
            serde_json::to_string(&earlier).unwrap()
        );
        std::fs::create_dir_all(dir.path().join("outbox")).unwrap();
        std::fs::write(adapter.outbox_path(), &seeded).unwrap();

        let mut session = OfflineSession::new();
        let job = job("https://remoteok.com/1");
        let report = adapter.apply(&mut session, &job, &profile()).await.unwrap();
        assert_eq!(report.outcome, ApplyOutcome::Success);

        let content = std::fs::read_to_string(adapter.outbox_path()).unwrap();
        assert!(content.starts_with(&seeded));
        assert!(content.ends_with('\n'));

        let entries = adapter.outbox_entries().await.unwrap();
        let fingerprints: Vec<&Fingerprint> = entries.iter().map(|e| &e.fingerprint).collect();
        assert_eq!(fingerprints, vec![&earlier.fingerprint, &job.fingerprint]);

        let again = adapter.apply(&mut session, &job, &profile()).await.unwrap();
        assert_eq!(again.outcome, ApplyOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn test_apply_without_email_fails() {
        let dir = TempDir::new().unwrap();
        let adapter = feed_adapter(&dir);
        let mut session = OfflineSession::new();
        let report = adapter
            .apply(&mut session, &job("https://remoteok.com/9"), &CandidateProfile::default())
            .await
            .unwrap();
        assert_eq!(report.outcome, ApplyOutcome::Failure);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_login_requires_imported_state() {
        let dir = TempDir::new().unwrap();
        let adapter = FeedAdapter::new(config(true), dir.path(), dir.path());
        let mut session = OfflineSession::new();
        assert!(!adapter.is_logged_in(&mut session).await.unwrap());
        assert!(!adapter.login(&mut session).await.unwrap());

        session
            .import_state(&json!({"cookies": [{"name": "sid", "value": "1"}]}))
            .await
            .unwrap();
        assert!(adapter.is_logged_in(&mut session).await.unwrap());

        let open = FeedAdapter::new(config(false), dir.path(), dir.path());
        assert!(open.is_logged_in(&mut OfflineSession::new()).await.unwrap());
    }
}

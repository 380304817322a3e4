//! Browser-automation abstraction.
//!
//! The core only needs "open a session, navigate, extract, submit" plus
//! export and import of authentication state. Concrete drivers live outside
//! this crate; [`OfflineDriver`] is the in-memory driver used by feed-backed
//! portals and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use super::PortalConfig;
use crate::error::AdapterError;

/// One live automation session (a browser context or equivalent).
#[async_trait]
pub trait AutomationSession: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<(), AdapterError>;

    /// Returns the records matched by `selector` on the current page.
    async fn extract(&mut self, selector: &str) -> Result<Vec<Value>, AdapterError>;

    async fn submit(
        &mut self,
        selector: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), AdapterError>;

    /// Cookies and storage as an opaque blob; `Value::Null` when empty.
    async fn export_state(&mut self) -> Result<Value, AdapterError>;

    async fn import_state(&mut self, state: &Value) -> Result<(), AdapterError>;

    async fn close(&mut self) -> Result<(), AdapterError>;
}

/// Opens automation sessions.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn open(&self, portal: &PortalConfig) -> Result<Box<dyn AutomationSession>, AdapterError>;
}

/// A submitted form, as recorded by [`OfflineSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub url: Option<String>,
    pub selector: String,
    pub fields: BTreeMap<String, String>,
}

/// In-memory session with no network access.
#[derive(Debug, Default)]
pub struct OfflineSession {
    current_url: Option<String>,
    state: Option<Value>,
    fixtures: BTreeMap<String, Vec<Value>>,
    submissions: Vec<Submission>,
    closed: bool,
}

impl OfflineSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records returned by `extract(selector)`.
    pub fn with_fixture(mut self, selector: impl Into<String>, records: Vec<Value>) -> Self {
        self.fixtures.insert(selector.into(), records);
        self
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.closed {
            return Err(AdapterError::Session("session is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AutomationSession for OfflineSession {
    async fn navigate(&mut self, url: &str) -> Result<(), AdapterError> {
        self.ensure_open()?;
        self.current_url = Some(url.to_string());
        Ok(())
    }

    async fn extract(&mut self, selector: &str) -> Result<Vec<Value>, AdapterError> {
        self.ensure_open()?;
        Ok(self.fixtures.get(selector).cloned().unwrap_or_default())
    }

    async fn submit(
        &mut self,
        selector: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), AdapterError> {
        self.ensure_open()?;
        self.submissions.push(Submission {
            url: self.current_url.clone(),
            selector: selector.to_string(),
            fields: fields.clone(),
        });
        Ok(())
    }

    async fn export_state(&mut self) -> Result<Value, AdapterError> {
        self.ensure_open()?;
        Ok(self.state.clone().unwrap_or(Value::Null))
    }

    async fn import_state(&mut self, state: &Value) -> Result<(), AdapterError> {
        self.ensure_open()?;
        self.state = Some(state.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.closed = true;
        Ok(())
    }
}

/// Driver handing out fresh [`OfflineSession`]s.
#[derive(Debug, Clone, Default)]
pub struct OfflineDriver;

#[async_trait]
impl AutomationDriver for OfflineDriver {
    async fn open(
        &self,
        _portal: &PortalConfig,
    ) -> Result<Box<dyn AutomationSession>, AdapterError> {
        Ok(Box::new(OfflineSession::new()))
    }
}

/// True when an exported state blob carries anything worth keeping.
pub fn state_is_present(state: &Value) -> bool {
    match state {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

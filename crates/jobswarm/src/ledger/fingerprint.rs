//! Deterministic job identity derived from the canonical posting URL.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Query parameters that only carry tracking state and never identify a posting.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "ref",
    "trk",
];

/// Stable identifier of a job record (truncated SHA-256 of the canonical URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints a posting URL. The same URL, modulo canonicalization,
    /// always yields the same fingerprint.
    pub fn from_url(url: &str) -> Self {
        let canonical = canonicalize_url(url);
        let digest = Sha256::digest(canonical.as_bytes());
        Self(hex::encode(&digest[..16]))
    }

    /// Wraps an already-computed fingerprint (e.g. read back from the ledger).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a posting URL: trims whitespace, lowercases scheme and host,
/// drops the fragment, tracking parameters and any trailing slash.
pub fn canonicalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);

    let (scheme, rest) = match without_fragment.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, without_fragment),
    };

    let (authority_and_path, query) = match rest.split_once('?') {
        Some((head, query)) => (head, Some(query)),
        None => (rest, None),
    };

    let (host, path) = match authority_and_path.find('/') {
        Some(idx) => authority_and_path.split_at(idx),
        None => (authority_and_path, ""),
    };

    let mut canonical = String::with_capacity(trimmed.len());
    if let Some(scheme) = scheme {
        canonical.push_str(&scheme);
        canonical.push_str("://");
    }
    canonical.push_str(&host.to_ascii_lowercase());
    canonical.push_str(path.trim_end_matches('/'));

    if let Some(query) = query {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                !pair.is_empty() && !TRACKING_PARAMS.contains(&key.to_ascii_lowercase().as_str())
            })
            .collect();
        if !kept.is_empty() {
            canonical.push('?');
            canonical.push_str(&kept.join("&"));
        }
    }

    canonical
}

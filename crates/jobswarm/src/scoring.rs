//! Fit scoring of discovered listings.
//!
//! A pure weighted sum over the listing title and location. Every weight and
//! both thresholds come from [`ScoringConfig`]. Keywords match as plain
//! substrings of the title unless [`KeywordMatch::Word`] is configured.

use serde::Serialize;

use crate::config::{KeywordMatch, ScoringConfig};
use crate::ledger::Priority;
use crate::portal::ListingCandidate;

/// The search that produced a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchContext {
    pub keywords: String,
    pub location: Option<String>,
}

impl SearchContext {
    pub fn new(keywords: impl Into<String>, location: Option<String>) -> Self {
        Self {
            keywords: keywords.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    /// In `[0, 100]`.
    pub score: u8,
    pub priority: Priority,
    /// Whether the listing clears the admission threshold and may be queued.
    pub admitted: bool,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
    domain_terms: Vec<String>,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        let domain_terms = config
            .domain_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            config,
            domain_terms,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, listing: &ListingCandidate, ctx: &SearchContext) -> ScoreCard {
        let cfg = &self.config;
        let title = Title::new(&listing.title, cfg.keyword_match);

        let title_points = if self.keyword_terms(&ctx.keywords).iter().any(|k| title.matches(k)) {
            u32::from(cfg.title_points)
        } else {
            0
        };

        let domain_matches = self
            .domain_terms
            .iter()
            .filter(|term| title.matches(term))
            .count() as u32;
        let domain_points = (domain_matches * u32::from(cfg.domain_points_each))
            .min(u32::from(cfg.domain_points_cap));

        let location_points = match listing.location.as_deref() {
            Some(location) if self.location_accepted(location, ctx) => {
                u32::from(cfg.location_points)
            }
            _ => 0,
        };

        let total = (title_points
            + domain_points
            + location_points
            + u32::from(cfg.baseline_points))
        .min(100) as u8;

        let (priority, admitted) = if total >= cfg.high_threshold {
            (Priority::High, true)
        } else if total >= cfg.admission_threshold {
            (Priority::Medium, true)
        } else {
            (Priority::Low, false)
        };

        ScoreCard {
            score: total,
            priority,
            admitted,
        }
    }

    /// Search keywords split into the terms matched one by one.
    fn keyword_terms(&self, keywords: &str) -> Vec<String> {
        match self.config.keyword_match {
            KeywordMatch::Substring => keywords
                .to_lowercase()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            KeywordMatch::Word => tokenize(keywords),
        }
    }

    fn location_accepted(&self, location: &str, ctx: &SearchContext) -> bool {
        let location = location.to_lowercase();
        self.config
            .accepted_locations
            .iter()
            .map(String::as_str)
            .chain(ctx.location.as_deref())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .any(|token| location.contains(&token.to_lowercase()))
    }
}

/// A listing title prepared for one matching mode.
struct Title {
    lower: String,
    words: Vec<String>,
    mode: KeywordMatch,
}

impl Title {
    fn new(text: &str, mode: KeywordMatch) -> Self {
        Self {
            lower: text.to_lowercase(),
            words: tokenize(text),
            mode,
        }
    }

    /// `term` is already lowercased.
    fn matches(&self, term: &str) -> bool {
        match self.mode {
            KeywordMatch::Substring => !term.is_empty() && self.lower.contains(term),
            KeywordMatch::Word => contains_phrase(&self.words, &tokenize(term)),
        }
    }
}

/// Lowercased alphanumeric words of `text`.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty()
        && phrase.len() <= words.len()
        && words.windows(phrase.len()).any(|w| w == phrase)
}

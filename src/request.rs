//! Inbound search requests and the outbound result envelope.

use crate::models::{RankedPaper, SourceDiagnostics, SourceId};
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Largest per-source limit accepted from callers
pub const MAX_PER_SOURCE_LIMIT: i64 = 1000;

const WEIGHT_SCALE_TOLERANCE: f64 = 1e-6;

/// Per-source secrets and contact details.
///
/// Every field is optional; adapters that need one fail permanently without it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Credentials {
    pub semantic_scholar_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    /// Sent to CrossRef and OpenAlex as `mailto`, required by Unpaywall
    pub contact_email: Option<String>,
}

impl Credentials {
    /// Fields set on `overrides` win; the rest fall back to `self`.
    #[must_use]
    pub fn merged_with(&self, overrides: &Self) -> Self {
        fn pick(over: &Option<String>, base: &Option<String>) -> Option<String> {
            over.clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| base.clone())
        }
        Self {
            semantic_scholar_api_key: pick(
                &overrides.semantic_scholar_api_key,
                &self.semantic_scholar_api_key,
            ),
            google_api_key: pick(&overrides.google_api_key, &self.google_api_key),
            google_cse_id: pick(&overrides.google_cse_id, &self.google_cse_id),
            contact_email: pick(&overrides.contact_email, &self.contact_email),
        }
    }

    /// Non-blank value of an optional credential
    #[must_use]
    pub fn present(value: Option<&String>) -> Option<&str> {
        value.map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

// Secrets never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("Credentials")
            .field("semantic_scholar_api_key", &mask(&self.semantic_scholar_api_key))
            .field("google_api_key", &mask(&self.google_api_key))
            .field("google_cse_id", &self.google_cse_id)
            .field("contact_email", &self.contact_email)
            .finish()
    }
}

/// Linear weights of the relevance score components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreWeights {
    pub title: f64,
    pub recency: f64,
    pub venue: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            title: 0.6,
            recency: 0.25,
            venue: 0.15,
        }
    }
}

impl ScoreWeights {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.title + self.recency + self.venue
    }

    /// Weights must be finite, non-negative and add up to `scale`.
    pub fn validate(&self, scale: f64) -> Result<()> {
        for (name, value) in [
            ("title", self.title),
            ("recency", self.recency),
            ("venue", self.venue),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid_input(
                    format!("score_weights.{name}"),
                    format!("must be a finite non-negative number, got {value}"),
                ));
            }
        }
        if (self.sum() - scale).abs() > WEIGHT_SCALE_TOLERANCE {
            return Err(Error::invalid_input(
                "score_weights",
                format!("weights sum to {} but must sum to {scale}", self.sum()),
            ));
        }
        Ok(())
    }
}

/// A search as submitted by a caller, not yet validated
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,
    /// Maximum number of records requested from each source
    pub per_source_limit: i64,
    pub enabled_sources: Vec<SourceId>,
    #[serde(default)]
    pub score_weights: Option<ScoreWeights>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, per_source_limit: i64, sources: &[SourceId]) -> Self {
        Self {
            query: query.into(),
            per_source_limit,
            enabled_sources: sources.to_vec(),
            score_weights: None,
            credentials: None,
        }
    }

    /// Check the request and freeze it into a [`SourceQuery`].
    pub fn validate(&self) -> Result<SourceQuery> {
        let text = self.query.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(Error::invalid_input("query", "query cannot be empty"));
        }

        if self.per_source_limit <= 0 {
            return Err(Error::invalid_input(
                "per_source_limit",
                format!("must be positive, got {}", self.per_source_limit),
            ));
        }
        if self.per_source_limit > MAX_PER_SOURCE_LIMIT {
            return Err(Error::invalid_input(
                "per_source_limit",
                format!(
                    "{} exceeds the maximum of {MAX_PER_SOURCE_LIMIT}",
                    self.per_source_limit
                ),
            ));
        }

        if self.enabled_sources.is_empty() {
            return Err(Error::invalid_input(
                "enabled_sources",
                "at least one source must be enabled",
            ));
        }
        if let Some(source) = self.enabled_sources.iter().find(|s| !s.is_searchable()) {
            return Err(Error::invalid_input(
                "enabled_sources",
                format!("{source} cannot be searched by query"),
            ));
        }

        let mut enabled_sources = self.enabled_sources.clone();
        enabled_sources.sort_unstable();
        enabled_sources.dedup();

        Ok(SourceQuery {
            text,
            // bounded by MAX_PER_SOURCE_LIMIT above
            per_source_limit: u32::try_from(self.per_source_limit).unwrap_or(u32::MAX),
            enabled_sources,
        })
    }
}

/// Validated, immutable query shared by every stage of one search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "SourceQueryFields")]
pub struct SourceQuery {
    text: String,
    per_source_limit: u32,
    enabled_sources: Vec<SourceId>,
}

/// Wire form of [`SourceQuery`], validated again on the way in
#[derive(Deserialize, JsonSchema)]
struct SourceQueryFields {
    text: String,
    per_source_limit: i64,
    enabled_sources: Vec<SourceId>,
}

impl TryFrom<SourceQueryFields> for SourceQuery {
    type Error = Error;

    fn try_from(fields: SourceQueryFields) -> Result<Self> {
        SearchRequest::new(fields.text, fields.per_source_limit, &fields.enabled_sources).validate()
    }
}

impl SourceQuery {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn per_source_limit(&self) -> u32 {
        self.per_source_limit
    }

    /// Enabled sources in canonical order, without duplicates
    #[must_use]
    pub fn enabled_sources(&self) -> &[SourceId] {
        &self.enabled_sources
    }
}

/// Everything a search produced
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    pub search_id: Uuid,
    pub query: SourceQuery,
    /// Merged works in rank order
    pub papers: Vec<RankedPaper>,
    pub diagnostics: BTreeMap<SourceId, SourceDiagnostics>,
    /// The caller aborted before every source settled
    pub cancelled: bool,
}

impl SearchResult {
    /// Sources that ended with an error
    #[must_use]
    pub fn failed_sources(&self) -> Vec<SourceId> {
        self.diagnostics
            .iter()
            .filter(|(_, d)| d.error.is_some())
            .map(|(s, _)| *s)
            .collect()
    }
}

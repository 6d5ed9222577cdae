//! Canonical records shared by every pipeline stage.
//!
//! Provider-shaped data stops at the normalizer; everything downstream of it
//! works with [`Paper`] and the types defined here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an external metadata provider
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Crossref,
    #[serde(alias = "semantic_scholar")]
    SemanticScholar,
    OpenAlex,
    Arxiv,
    #[serde(alias = "google")]
    GoogleCse,
    Unpaywall,
}

impl SourceId {
    /// Sources that answer free-text queries
    pub const SEARCHABLE: [Self; 5] = [
        Self::Crossref,
        Self::SemanticScholar,
        Self::OpenAlex,
        Self::Arxiv,
        Self::GoogleCse,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crossref => "crossref",
            Self::SemanticScholar => "semanticscholar",
            Self::OpenAlex => "openalex",
            Self::Arxiv => "arxiv",
            Self::GoogleCse => "googlecse",
            Self::Unpaywall => "unpaywall",
        }
    }

    /// Whether the source can be fanned out to with a query string.
    /// Unpaywall only resolves DOIs and is used for enrichment.
    #[must_use]
    pub const fn is_searchable(self) -> bool {
        !matches!(self, Self::Unpaywall)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crossref" => Ok(Self::Crossref),
            "semanticscholar" | "semantic_scholar" | "s2" => Ok(Self::SemanticScholar),
            "openalex" => Ok(Self::OpenAlex),
            "arxiv" => Ok(Self::Arxiv),
            "googlecse" | "google" => Ok(Self::GoogleCse),
            "unpaywall" => Ok(Self::Unpaywall),
            other => Err(crate::Error::invalid_input(
                "enabled_sources",
                format!("unknown source '{other}'"),
            )),
        }
    }
}

/// How freely the full text of a paper is available
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum OaStatus {
    Gold,
    Green,
    Hybrid,
    Closed,
    #[default]
    Unknown,
}

impl OaStatus {
    /// Ordering used when merging duplicates; higher is more permissive.
    #[must_use]
    pub const fn permissiveness(self) -> u8 {
        match self {
            Self::Gold => 4,
            Self::Hybrid => 3,
            Self::Green => 2,
            Self::Closed => 1,
            Self::Unknown => 0,
        }
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Map the vocabulary used by Unpaywall and OpenAlex.
    #[must_use]
    pub fn from_provider_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "gold" | "diamond" => Self::Gold,
            "green" => Self::Green,
            "hybrid" | "bronze" => Self::Hybrid,
            "closed" => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

/// Per-search identifier of a normalized paper
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct PaperId(pub u32);

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Canonical paper record produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Paper {
    pub id: PaperId,
    pub source: SourceId,
    /// Never empty
    pub title: String,
    /// Full author list in provider order
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    /// Bare, lower-cased DOI
    pub doi: Option<String>,
    pub open_access: OaStatus,
    pub pdf_url: Option<String>,
    pub url: Option<String>,
    pub abstract_text: Option<String>,
    pub citation_count: Option<u64>,
    /// Relevance score reported by the provider itself, when it has one
    pub raw_score: Option<f64>,
}

impl Paper {
    /// Minimal paper; mostly useful for building fixtures
    #[must_use]
    pub fn new(id: PaperId, source: SourceId, title: impl Into<String>) -> Self {
        Self {
            id,
            source,
            title: title.into(),
            authors: Vec::new(),
            year: None,
            venue: None,
            doi: None,
            open_access: OaStatus::Unknown,
            pdf_url: None,
            url: None,
            abstract_text: None,
            citation_count: None,
            raw_score: None,
        }
    }

    /// Authors as shown to users: the first three, with an "et al." marker
    #[must_use]
    pub fn display_authors(&self) -> String {
        let shown = self
            .authors
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ");
        if self.authors.len() > 3 {
            format!("{shown}; et al.")
        } else {
            shown
        }
    }

    #[must_use]
    pub fn has_doi(&self) -> bool {
        self.doi.as_deref().is_some_and(|d| !d.is_empty())
    }

    #[must_use]
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    #[must_use]
    pub fn has_venue(&self) -> bool {
        self.venue.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Papers believed to denote the same work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupGroup {
    pub members: Vec<Paper>,
    pub representative: PaperId,
}

impl DedupGroup {
    #[must_use]
    pub fn representative(&self) -> Option<&Paper> {
        self.members.iter().find(|p| p.id == self.representative)
    }

    /// Member ids in ascending order
    #[must_use]
    pub fn member_ids(&self) -> Vec<PaperId> {
        let mut ids: Vec<PaperId> = self.members.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids
    }

    /// The group's DOI; the clustering veto guarantees there is at most one
    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        self.members
            .iter()
            .find_map(|p| p.doi.as_deref().filter(|d| !d.is_empty()))
    }
}

/// Components of a paper's relevance score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreBreakdown {
    pub paper_id: PaperId,
    pub title_match: f64,
    pub recency_bonus: f64,
    pub venue_bonus: f64,
    pub total: f64,
}

/// A merged work in its final ranked position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedPaper {
    #[serde(flatten)]
    pub paper: Paper,
    pub score: ScoreBreakdown,
    /// Every source that reported this work, sorted
    pub sources: Vec<SourceId>,
    pub member_count: usize,
}

/// Outcome of a single source for one search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    Cancelled,
}

/// Per-source diagnostics reported alongside the results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceDiagnostics {
    /// Papers kept after normalization
    pub count: usize,
    /// Records dropped by the normalizer
    pub skipped: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub attempts: u32,
    pub status: SourceStatus,
}

impl SourceDiagnostics {
    #[must_use]
    pub const fn cancelled(elapsed_ms: u64, attempts: u32) -> Self {
        Self {
            count: 0,
            skipped: 0,
            error: None,
            elapsed_ms,
            attempts,
            status: SourceStatus::Cancelled,
        }
    }

    #[must_use]
    pub const fn failed(error: String, elapsed_ms: u64, attempts: u32) -> Self {
        Self {
            count: 0,
            skipped: 0,
            error: Some(error),
            elapsed_ms,
            attempts,
            status: SourceStatus::Failed,
        }
    }
}

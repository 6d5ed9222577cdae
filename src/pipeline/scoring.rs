use super::normalize::normalize_title;
use crate::config::ScoringConfig;
use crate::models::{Paper, ScoreBreakdown};
use crate::request::{ScoreWeights, SourceQuery};
use chrono::Datelike;
use std::collections::BTreeSet;

/// Relevance scorer for one search.
///
/// The reference year is captured when the scorer is built, so scoring the
/// same paper twice always gives the same breakdown.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoreWeights,
    reference_year: i32,
    horizon_years: f64,
    missing_year_recency: f64,
}

impl Scorer {
    #[must_use]
    pub fn new(weights: ScoreWeights, config: &ScoringConfig) -> Self {
        Self::with_reference_year(weights, config, chrono::Utc::now().year())
    }

    #[must_use]
    pub fn with_reference_year(weights: ScoreWeights, config: &ScoringConfig, year: i32) -> Self {
        Self {
            weights,
            reference_year: year,
            horizon_years: config.recency_horizon_years,
            missing_year_recency: config.missing_year_recency,
        }
    }

    #[must_use]
    pub const fn weights(&self) -> ScoreWeights {
        self.weights
    }

    #[must_use]
    pub fn score(&self, paper: &Paper, query: &SourceQuery) -> ScoreBreakdown {
        let title_match = title_match(paper, query.text());
        let recency_bonus = self.recency(paper.year);
        let venue_bonus = if paper.has_venue() { 1.0 } else { 0.0 };
        let total = self.weights.title * title_match
            + self.weights.recency * recency_bonus
            + self.weights.venue * venue_bonus;

        ScoreBreakdown {
            paper_id: paper.id,
            title_match,
            recency_bonus,
            venue_bonus,
            total,
        }
    }

    fn recency(&self, year: Option<i32>) -> f64 {
        let Some(year) = year else {
            return self.missing_year_recency;
        };
        let age = f64::from(self.reference_year - year);
        if age <= 0.0 {
            return 1.0;
        }
        (1.0 - age / self.horizon_years).max(0.0)
    }
}

/// Lower-case alphanumeric query tokens longer than two characters
#[must_use]
pub fn query_tokens(query: &str) -> BTreeSet<String> {
    normalize_title(query)
        .split(' ')
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

fn title_match(paper: &Paper, query: &str) -> f64 {
    let title = normalize_title(&paper.title);
    let phrase = normalize_title(query);
    if !phrase.is_empty() && format!(" {title} ").contains(&format!(" {phrase} ")) {
        return 1.0;
    }

    let tokens = query_tokens(query);
    if tokens.is_empty() {
        return 0.0;
    }
    let title_words: BTreeSet<&str> = title.split(' ').collect();
    let context = normalize_title(&format!(
        "{} {}",
        paper.abstract_text.as_deref().unwrap_or_default(),
        paper.venue.as_deref().unwrap_or_default()
    ));
    let context_words: BTreeSet<&str> = context.split(' ').collect();

    let total = tokens.len() as f64;
    let in_title = tokens
        .iter()
        .filter(|t| title_words.contains(t.as_str()))
        .count() as f64;
    let elsewhere = tokens
        .iter()
        .filter(|t| !title_words.contains(t.as_str()) && context_words.contains(t.as_str()))
        .count() as f64;

    (in_title / total + 0.5 * elsewhere / total).clamp(0.0, 1.0)
}

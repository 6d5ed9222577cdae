//! Process-wide settings, built once at start-up.
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! `PAPER_SCOUT__SECTION__KEY` environment variables. Credentials may also come
//! from the historical `S2_API_KEY`, `GOOGLE_API_KEY`, `CSE_ID` and
//! `UNPAYWALL_EMAIL` variables, which only fill gaps.

use crate::models::SourceId;
use crate::pipeline::dedup::DedupConfig;
use crate::request::{Credentials, ScoreWeights};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "PAPER_SCOUT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub retry: BackoffConfig,
    pub sources: SourcesConfig,
    pub credentials: Credentials,
    pub scoring: ScoringConfig,
    pub dedup: DedupConfig,
    pub enrichment: EnrichmentConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Used by the CLI when `--limit` is absent
    pub default_limit: u32,
    pub default_sources: Vec<SourceId>,
    /// Budget for a single provider call
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_sources: vec![
                SourceId::Crossref,
                SourceId::SemanticScholar,
                SourceId::OpenAlex,
                SourceId::Arxiv,
            ],
            timeout_secs: 10,
            connect_timeout_secs: 5,
            user_agent: format!(
                "paper-scout/{} (academic metadata search)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Upper bound of the random extra delay, as a fraction of the backoff
    pub jitter: f64,
    /// Cap applied to a provider's `Retry-After` hint
    pub retry_after_cap_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            multiplier: 2.0,
            jitter: 0.2,
            retry_after_cap_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub politeness_delay_ms: u64,
}

impl EndpointConfig {
    fn new(base_url: &str, politeness_delay_ms: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            politeness_delay_ms,
        }
    }

    #[must_use]
    pub const fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Semantic Scholar spacing used instead when an API key is configured
    pub semantic_scholar_keyed_delay_ms: u64,
    pub crossref: EndpointConfig,
    pub semantic_scholar: EndpointConfig,
    pub openalex: EndpointConfig,
    pub arxiv: EndpointConfig,
    pub google_cse: EndpointConfig,
    pub unpaywall: EndpointConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            semantic_scholar_keyed_delay_ms: 100,
            crossref: EndpointConfig::new("https://api.crossref.org/works", 100),
            semantic_scholar: EndpointConfig::new(
                "https://api.semanticscholar.org/graph/v1/paper/search",
                1_000,
            ),
            openalex: EndpointConfig::new("https://api.openalex.org/works", 100),
            arxiv: EndpointConfig::new("http://export.arxiv.org/api/query", 3_000),
            google_cse: EndpointConfig::new("https://www.googleapis.com/customsearch/v1", 0),
            unpaywall: EndpointConfig::new("https://api.unpaywall.org/v2", 100),
        }
    }
}

impl SourcesConfig {
    fn endpoints(&self) -> [(SourceId, &EndpointConfig); 6] {
        [
            (SourceId::Crossref, &self.crossref),
            (SourceId::SemanticScholar, &self.semantic_scholar),
            (SourceId::OpenAlex, &self.openalex),
            (SourceId::Arxiv, &self.arxiv),
            (SourceId::GoogleCse, &self.google_cse),
            (SourceId::Unpaywall, &self.unpaywall),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Every weight set must add up to this
    pub weight_scale: f64,
    pub recency_horizon_years: f64,
    /// Recency component for papers without a year; may be negative
    pub missing_year_recency: f64,
    /// Used when a request carries no weights of its own
    pub weights: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_scale: 1.0,
            recency_horizon_years: 20.0,
            missing_year_recency: 0.0,
            weights: ScoreWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Look up DOIs on Unpaywall; also requires a contact email
    pub enabled: bool,
    pub concurrency: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Variables the earlier scripts read credentials from
#[derive(Debug, Default, Deserialize)]
struct HistoricalEnv {
    s2_api_key: Option<String>,
    google_api_key: Option<String>,
    cse_id: Option<String>,
    unpaywall_email: Option<String>,
}

impl From<HistoricalEnv> for Credentials {
    fn from(env: HistoricalEnv) -> Self {
        Self {
            semantic_scholar_api_key: env.s2_api_key,
            google_api_key: env.google_api_key,
            google_cse_id: env.cse_id,
            contact_email: env.unpaywall_email,
        }
    }
}

impl Config {
    /// Load from the process environment and an optional file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, std::env::vars().collect())
    }

    /// Load against an explicit variable set.
    pub fn load_from(path: Option<&Path>, vars: HashMap<String, String>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("search.default_sources")
                .source(Some(vars.clone())),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;

        let historical: Credentials = envy::from_iter::<_, HistoricalEnv>(vars)?.into();
        config.credentials = historical.merged_with(&config.credentials);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.default_limit == 0 {
            return Err(Error::invalid_input(
                "search.default_limit",
                "must be positive",
            ));
        }
        if let Some(source) = self
            .search
            .default_sources
            .iter()
            .find(|s| !s.is_searchable())
        {
            return Err(Error::invalid_input(
                "search.default_sources",
                format!("{source} cannot be searched by query"),
            ));
        }
        if self.search.timeout_secs == 0 {
            return Err(Error::invalid_input(
                "search.timeout_secs",
                "must be positive",
            ));
        }

        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(Error::invalid_input(
                "retry.multiplier",
                "must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(Error::invalid_input(
                "retry.jitter",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(Error::invalid_input(
                "retry.initial_delay_ms",
                "cannot exceed retry.max_delay_ms",
            ));
        }

        for (source, endpoint) in self.sources.endpoints() {
            url::Url::parse(&endpoint.base_url).map_err(|e| {
                Error::invalid_input(format!("sources.{source}.base_url"), e.to_string())
            })?;
        }

        self.scoring.weights.validate(self.scoring.weight_scale)?;
        let horizon = self.scoring.recency_horizon_years;
        if horizon.is_nan() || horizon <= 0.0 {
            return Err(Error::invalid_input(
                "scoring.recency_horizon_years",
                "must be positive",
            ));
        }
        if !self.scoring.missing_year_recency.is_finite() {
            return Err(Error::invalid_input(
                "scoring.missing_year_recency",
                "must be finite",
            ));
        }

        self.dedup.validate()?;

        if self.enrichment.concurrency == 0 {
            return Err(Error::invalid_input(
                "enrichment.concurrency",
                "must be positive",
            ));
        }

        Ok(())
    }

    /// Copy with secrets blanked out, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let hide = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some("***".to_string());
            }
        };
        hide(&mut copy.credentials.semantic_scholar_api_key);
        hide(&mut copy.credentials.google_api_key);
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Parse {
            context: "config".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.sources.arxiv.politeness_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_env_overrides_defaults() {
        let vars = HashMap::from([
            (
                "PAPER_SCOUT__SEARCH__TIMEOUT_SECS".to_string(),
                "4".to_string(),
            ),
            (
                "PAPER_SCOUT__SEARCH__DEFAULT_SOURCES".to_string(),
                "arxiv,openalex".to_string(),
            ),
            ("S2_API_KEY".to_string(), "legacy-key".to_string()),
        ]);
        let config = Config::load_from(None, vars).unwrap();
        assert_eq!(config.search.timeout_secs, 4);
        assert_eq!(
            config.search.default_sources,
            vec![SourceId::Arxiv, SourceId::OpenAlex]
        );
        assert_eq!(
            config.credentials.semantic_scholar_api_key.as_deref(),
            Some("legacy-key")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.retry.jitter = 1.5;
        assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));

        let mut config = Config::default();
        config.sources.crossref.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.default_sources = vec![SourceId::Unpaywall];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_output_hides_secrets() {
        let mut config = Config::default();
        config.credentials.google_api_key = Some("secret".to_string());
        let rendered = config.redacted().to_toml().unwrap();
        assert!(rendered.contains("[search]"));
        assert!(!rendered.contains("secret"));
    }
}

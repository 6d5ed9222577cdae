use async_trait::async_trait;
use paper_scout::client::providers::crossref::CrossrefWork;
use paper_scout::client::providers::{ProviderError, RawRecord, SourceAdapter};
use paper_scout::{
    Config, Credentials, Error, MetaSearchClient, MetaSearchConfig, SearchRequest, SourceId,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Adapter that counts calls and returns one fixed record
struct CountingAdapter {
    source: SourceId,
    calls: AtomicU32,
}

impl CountingAdapter {
    fn new(source: SourceId) -> Arc<Self> {
        Arc::new(Self {
            source,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for CountingAdapter {
    fn source(&self) -> SourceId {
        self.source
    }

    fn politeness_delay(&self, _credentials: &Credentials) -> Duration {
        Duration::ZERO
    }

    async fn fetch(
        &self,
        text: &str,
        _limit: u32,
        _credentials: &Credentials,
    ) -> Result<Vec<RawRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![RawRecord::Crossref(CrossrefWork {
            title: vec![format!("A study of {text}")],
            ..CrossrefWork::default()
        })])
    }
}

fn client_with(adapters: &[Arc<CountingAdapter>]) -> MetaSearchClient {
    MetaSearchClient::with_adapters(
        MetaSearchConfig::default(),
        adapters
            .iter()
            .map(|a| a.clone() as Arc<dyn SourceAdapter>)
            .collect(),
        None,
    )
}

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.search.default_limit, 10);
    assert_eq!(config.search.timeout_secs, 10);
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.sources.arxiv.politeness_delay_ms, 3000);
    assert!((config.dedup.threshold - 0.85).abs() < f64::EPSILON);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation() {
    let mut config = Config::default();

    config.search.default_limit = 0;
    assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));
    config.search.default_limit = 10;

    config.scoring.weights.title = 0.9;
    assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));
    config.scoring.weights.title = 0.6;

    config.retry.jitter = 1.5;
    assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));
    config.retry.jitter = 0.2;

    config.sources.crossref.base_url = "not a url".to_string();
    assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));
}

#[test]
fn test_config_file_is_layered_over_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[search]
default_limit = 25
default_sources = ["arxiv", "openalex"]

[dedup]
threshold = 0.9

[credentials]
contact_email = "me@example.org"
"#
    )
    .unwrap();

    let config = Config::load_from(Some(file.path()), HashMap::new()).unwrap();
    assert_eq!(config.search.default_limit, 25);
    assert_eq!(
        config.search.default_sources,
        vec![SourceId::Arxiv, SourceId::OpenAlex]
    );
    assert!((config.dedup.threshold - 0.9).abs() < f64::EPSILON);
    assert_eq!(config.search.timeout_secs, 10);
    assert_eq!(
        config.credentials.contact_email.as_deref(),
        Some("me@example.org")
    );
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[enrichment]\nconcurrency = 0").unwrap();
    let err = Config::load_from(Some(file.path()), HashMap::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));
}

#[test]
fn test_rendered_config_loads_back() {
    let rendered = Config::default().to_toml().unwrap();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(rendered.as_bytes()).unwrap();

    let loaded = Config::load_from(Some(file.path()), HashMap::new()).unwrap();
    assert_eq!(loaded, Config::default());
}

#[test]
fn test_error_display() {
    let err = Error::invalid_input("per_source_limit", "must be positive, got 0");
    assert_eq!(
        format!("{err}"),
        "Invalid input: per_source_limit - must be positive, got 0"
    );
}

#[tokio::test]
async fn test_non_positive_limit_rejected_before_any_adapter_runs() {
    let crossref = CountingAdapter::new(SourceId::Crossref);
    let arxiv = CountingAdapter::new(SourceId::Arxiv);
    let client = client_with(&[crossref.clone(), arxiv.clone()]);

    for limit in [0, -5] {
        let request = SearchRequest::new("graphs", limit, &[SourceId::Crossref, SourceId::Arxiv]);
        let err = client
            .search(&request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::InvalidInput { field, .. } if field == "per_source_limit"),
            "unexpected error: {err}"
        );
    }
    assert_eq!(crossref.calls() + arxiv.calls(), 0);
}

#[tokio::test]
async fn test_request_validation_errors() {
    let crossref = CountingAdapter::new(SourceId::Crossref);
    let client = client_with(&[crossref.clone()]);
    let cancel = CancellationToken::new();

    let blank = SearchRequest::new("   ", 5, &[SourceId::Crossref]);
    assert!(client.search(&blank, &cancel).await.is_err());

    let no_sources = SearchRequest::new("graphs", 5, &[]);
    assert!(client.search(&no_sources, &cancel).await.is_err());

    let enrichment_only = SearchRequest::new("graphs", 5, &[SourceId::Unpaywall]);
    assert!(client.search(&enrichment_only, &cancel).await.is_err());

    assert_eq!(crossref.calls(), 0);
}

#[tokio::test]
async fn test_valid_request_reaches_every_enabled_source_once() {
    let crossref = CountingAdapter::new(SourceId::Crossref);
    let arxiv = CountingAdapter::new(SourceId::Arxiv);
    let client = client_with(&[crossref.clone(), arxiv.clone()]);

    let request = SearchRequest::new(
        "graphs",
        3,
        &[SourceId::Arxiv, SourceId::Crossref, SourceId::Arxiv],
    );
    let result = client
        .search(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(crossref.calls(), 1);
    assert_eq!(arxiv.calls(), 1);
    assert_eq!(result.query.enabled_sources(), &[SourceId::Crossref, SourceId::Arxiv]);
    // Both sources return the same title, so the two records merge
    assert_eq!(result.papers.len(), 1);
    assert_eq!(
        result.papers[0].sources,
        vec![SourceId::Crossref, SourceId::Arxiv]
    );
    assert_eq!(result.papers[0].member_count, 2);
}

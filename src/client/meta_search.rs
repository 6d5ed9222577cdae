use crate::client::providers::{
    ArxivAdapter, CrossrefAdapter, GoogleCseAdapter, OpenAccessResolver, OpenAlexAdapter,
    RawRecord, SemanticScholarAdapter, SourceAdapter, UnpaywallResolver,
};
use crate::client::{HttpClientConfig, RateLimiter};
use crate::config::{Config, EnrichmentConfig, ScoringConfig};
use crate::models::{PaperId, SourceDiagnostics, SourceId, SourceStatus};
use crate::pipeline::{
    cluster, enrich_open_access, finalize, normalize, DedupConfig, EnrichmentContext, Scorer,
    TitleSimilarity, TokenEditSimilarity,
};
use crate::request::{Credentials, ScoreWeights, SearchRequest, SearchResult, SourceQuery};
use crate::resilience::{retry_with_policy, with_logged_timeout, RetryPolicy};
use crate::{Error, Result};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Settings the orchestrator needs for one search
#[derive(Debug, Clone)]
pub struct MetaSearchConfig {
    /// Budget for a single provider call
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub dedup: DedupConfig,
    pub scoring: ScoringConfig,
    pub enrichment: EnrichmentConfig,
    /// Used when a request carries none of its own
    pub credentials: Credentials,
}

impl Default for MetaSearchConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MetaSearchConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.search.timeout(),
            retry: RetryPolicy::from_settings(&config.retry),
            dedup: config.dedup.clone(),
            scoring: config.scoring.clone(),
            enrichment: config.enrichment.clone(),
            credentials: config.credentials.clone(),
        }
    }
}

struct SourceSlot {
    adapter: Arc<dyn SourceAdapter>,
    limiter: Mutex<RateLimiter>,
}

struct ResolverSlot {
    resolver: Arc<dyn OpenAccessResolver>,
    limiter: Mutex<RateLimiter>,
}

/// Raw outcome of one source before normalization
struct SourceFetch {
    source: SourceId,
    result: Result<Vec<RawRecord>>,
    attempts: u32,
    elapsed_ms: u64,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Fans a query out to every enabled source and turns the answers into one
/// ranked, deduplicated result.
pub struct MetaSearchClient {
    sources: BTreeMap<SourceId, SourceSlot>,
    resolver: Option<ResolverSlot>,
    config: MetaSearchConfig,
    similarity: Box<dyn TitleSimilarity>,
}

impl MetaSearchClient {
    /// Build a client talking to the real providers configured in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = HttpClientConfig::from(&config.search).build()?;
        let endpoints = &config.sources;

        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(CrossrefAdapter::new(http.clone(), &endpoints.crossref)),
            Arc::new(SemanticScholarAdapter::new(
                http.clone(),
                &endpoints.semantic_scholar,
                Duration::from_millis(endpoints.semantic_scholar_keyed_delay_ms),
            )),
            Arc::new(OpenAlexAdapter::new(http.clone(), &endpoints.openalex)),
            Arc::new(ArxivAdapter::new(http.clone(), &endpoints.arxiv)),
            Arc::new(GoogleCseAdapter::new(http.clone(), &endpoints.google_cse)),
        ];
        let resolver: Arc<dyn OpenAccessResolver> =
            Arc::new(UnpaywallResolver::new(http, &endpoints.unpaywall));

        info!(
            "Initialized meta-search client with {} sources",
            adapters.len()
        );
        Ok(Self::with_adapters(
            MetaSearchConfig::from(config),
            adapters,
            Some(resolver),
        ))
    }

    /// Build a client around arbitrary adapters; later adapters replace
    /// earlier ones for the same source.
    #[must_use]
    pub fn with_adapters(
        config: MetaSearchConfig,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        resolver: Option<Arc<dyn OpenAccessResolver>>,
    ) -> Self {
        let sources = adapters
            .into_iter()
            .map(|adapter| {
                let interval = adapter.politeness_delay(&config.credentials);
                (
                    adapter.source(),
                    SourceSlot {
                        adapter,
                        limiter: Mutex::new(RateLimiter::with_interval(interval)),
                    },
                )
            })
            .collect();
        let resolver = resolver.map(|resolver| ResolverSlot {
            limiter: Mutex::new(RateLimiter::with_interval(resolver.politeness_delay())),
            resolver,
        });

        Self {
            sources,
            resolver,
            config,
            similarity: Box::new(TokenEditSimilarity),
        }
    }

    /// Swap the title similarity used for fuzzy duplicate detection.
    #[must_use]
    pub fn with_similarity(mut self, similarity: Box<dyn TitleSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Sources this client can query
    #[must_use]
    pub fn sources(&self) -> Vec<SourceId> {
        self.sources.keys().copied().collect()
    }

    #[must_use]
    pub const fn config(&self) -> &MetaSearchConfig {
        &self.config
    }

    /// Validate `request` and run it.
    ///
    /// Invalid requests fail here, before any source is contacted. Source
    /// failures never do; they are reported in the result's diagnostics.
    #[instrument(skip(self, request, cancel), fields(query = %request.query))]
    pub async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResult> {
        let query = request.validate()?;

        let weights = request.score_weights.unwrap_or(self.config.scoring.weights);
        weights.validate(self.config.scoring.weight_scale)?;

        if let Some(missing) = query
            .enabled_sources()
            .iter()
            .find(|s| !self.sources.contains_key(*s))
        {
            return Err(Error::invalid_input(
                "enabled_sources",
                format!("source '{missing}' is not configured"),
            ));
        }

        let credentials = match &request.credentials {
            Some(overrides) => self.config.credentials.merged_with(overrides),
            None => self.config.credentials.clone(),
        };

        Ok(self.execute(query, weights, &credentials, cancel).await)
    }

    /// Run an already validated query with the configured weights and credentials.
    pub async fn run(&self, query: &SourceQuery, cancel: &CancellationToken) -> SearchResult {
        self.execute(
            query.clone(),
            self.config.scoring.weights,
            &self.config.credentials,
            cancel,
        )
        .await
    }

    async fn execute(
        &self,
        query: SourceQuery,
        weights: ScoreWeights,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> SearchResult {
        let started = Instant::now();
        info!(
            "Starting search for '{}' across {:?}",
            query.text(),
            query.enabled_sources()
        );

        let fetches = join_all(
            query
                .enabled_sources()
                .iter()
                .map(|&source| self.fetch_source(source, &query, credentials, cancel)),
        )
        .await;

        let mut diagnostics = BTreeMap::new();
        let mut papers = Vec::new();
        let mut next_id = 0u32;
        let mut cancelled = false;

        for fetch in fetches {
            let diagnostic = match fetch.result {
                Ok(records) => {
                    let mut count = 0;
                    let mut skipped = 0;
                    for raw in records {
                        match normalize(raw, PaperId(next_id)) {
                            Some(paper) => {
                                next_id += 1;
                                count += 1;
                                papers.push(paper);
                            }
                            None => skipped += 1,
                        }
                    }
                    if skipped > 0 {
                        debug!("{}: skipped {} records without a title", fetch.source, skipped);
                    }
                    SourceDiagnostics {
                        count,
                        skipped,
                        error: None,
                        elapsed_ms: fetch.elapsed_ms,
                        attempts: fetch.attempts,
                        status: SourceStatus::Ok,
                    }
                }
                Err(Error::Cancelled) => {
                    cancelled = true;
                    SourceDiagnostics::cancelled(fetch.elapsed_ms, fetch.attempts)
                }
                Err(e) => SourceDiagnostics::failed(e.to_string(), fetch.elapsed_ms, fetch.attempts),
            };
            diagnostics.insert(fetch.source, diagnostic);
        }

        let mut groups = cluster(papers, &self.config.dedup, self.similarity.as_ref());

        if let Some(slot) = self.enrichment_slot(credentials, cancel) {
            let context = EnrichmentContext {
                credentials,
                policy: &self.config.retry,
                limiter: &slot.limiter,
                timeout: self.config.timeout,
                concurrency: self.config.enrichment.concurrency,
            };
            let diagnostic =
                enrich_open_access(&mut groups, slot.resolver.as_ref(), &context, cancel).await;
            cancelled |= diagnostic.status == SourceStatus::Cancelled;
            diagnostics.insert(slot.resolver.source(), diagnostic);
        }

        let scorer = Scorer::new(weights, &self.config.scoring);
        let scores: HashMap<PaperId, _> = groups
            .iter()
            .flat_map(|g| g.members.iter())
            .map(|paper| (paper.id, scorer.score(paper, &query)))
            .collect();

        cancelled |= cancel.is_cancelled();
        let result = finalize(query, groups, &scores, diagnostics, cancelled);
        info!(
            "Search {} finished in {:?}: {} works, failed sources {:?}, cancelled={}",
            result.search_id,
            started.elapsed(),
            result.papers.len(),
            result.failed_sources(),
            result.cancelled
        );
        result
    }

    fn enrichment_slot(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Option<&ResolverSlot> {
        if !self.config.enrichment.enabled || cancel.is_cancelled() {
            return None;
        }
        if Credentials::present(credentials.contact_email.as_ref()).is_none() {
            debug!("Skipping open-access enrichment: no contact email configured");
            return None;
        }
        self.resolver.as_ref()
    }

    async fn fetch_source(
        &self,
        source: SourceId,
        query: &SourceQuery,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> SourceFetch {
        let started = Instant::now();
        let Some(slot) = self.sources.get(&source) else {
            return SourceFetch {
                source,
                result: Err(Error::invalid_input(
                    "enabled_sources",
                    format!("source '{source}' is not configured"),
                )),
                attempts: 0,
                elapsed_ms: 0,
            };
        };

        let name = source.as_str();
        let text = query.text();
        let limit = query.per_source_limit();
        let timeout = self.config.timeout;

        let outcome = retry_with_policy(
            move || async move {
                {
                    let mut limiter = slot.limiter.lock().await;
                    limiter.update_interval(slot.adapter.politeness_delay(credentials));
                    limiter.acquire().await;
                }
                with_logged_timeout(slot.adapter.fetch(text, limit, credentials), timeout, name)
                    .await
            },
            &self.config.retry,
            name,
            cancel,
        )
        .await;

        match &outcome.result {
            Ok(records) => info!(
                "{} returned {} records after {} attempt(s)",
                source,
                records.len(),
                outcome.attempts
            ),
            Err(Error::Cancelled) => info!("{} cancelled", source),
            Err(e) => warn!("{} failed after {} attempt(s): {}", source, outcome.attempts, e),
        }

        SourceFetch {
            source,
            result: outcome.result,
            attempts: outcome.attempts,
            elapsed_ms: elapsed_ms(started),
        }
    }
}

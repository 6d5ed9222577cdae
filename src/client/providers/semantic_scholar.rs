use super::traits::{read_json, send_checked, ProviderError, RawRecord, SourceAdapter};
use crate::config::EndpointConfig;
use crate::models::SourceId;
use crate::request::Credentials;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

const FIELDS: &str =
    "title,authors,year,url,openAccessPdf,venue,externalIds,citationCount,abstract,isOpenAccess";

/// Graph API search pages hold at most 100 papers
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct S2SearchResponse {
    data: Vec<S2Paper>,
}

/// Paper object from the Semantic Scholar Graph API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct S2Paper {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<S2Author>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub url: Option<String>,
    pub open_access_pdf: Option<S2OpenAccessPdf>,
    pub external_ids: Option<S2ExternalIds>,
    pub citation_count: Option<u64>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub is_open_access: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct S2Author {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct S2OpenAccessPdf {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct S2ExternalIds {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
    #[serde(rename = "ArXiv")]
    pub arxiv: Option<String>,
}

impl S2Paper {
    #[must_use]
    pub fn pdf_url(&self) -> Option<&str> {
        self.open_access_pdf
            .as_ref()
            .and_then(|p| p.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }

    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        self.external_ids.as_ref().and_then(|ids| ids.doi.as_deref())
    }
}

/// Semantic Scholar Graph API adapter
pub struct SemanticScholarAdapter {
    client: Client,
    base_url: String,
    politeness: Duration,
    keyed_politeness: Duration,
}

impl SemanticScholarAdapter {
    #[must_use]
    pub fn new(client: Client, endpoint: &EndpointConfig, keyed_delay: Duration) -> Self {
        Self {
            client,
            base_url: endpoint.base_url.clone(),
            politeness: endpoint.politeness_delay(),
            keyed_politeness: keyed_delay,
        }
    }

    fn build_search_url(&self, text: &str, limit: u32) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Other(format!("Invalid base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("query", text)
            .append_pair("limit", &limit.min(MAX_LIMIT).to_string())
            .append_pair("fields", FIELDS);
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    fn source(&self) -> SourceId {
        SourceId::SemanticScholar
    }

    fn politeness_delay(&self, credentials: &Credentials) -> Duration {
        if Credentials::present(credentials.semantic_scholar_api_key.as_ref()).is_some() {
            self.keyed_politeness
        } else {
            self.politeness
        }
    }

    async fn fetch(
        &self,
        text: &str,
        limit: u32,
        credentials: &Credentials,
    ) -> Result<Vec<RawRecord>, ProviderError> {
        let start_time = Instant::now();
        let url = self.build_search_url(text, limit)?;
        debug!("Semantic Scholar search URL: {}", url);

        let mut request = self.client.get(url);
        if let Some(key) = Credentials::present(credentials.semantic_scholar_api_key.as_ref()) {
            request = request.header("x-api-key", key);
        }

        let response = send_checked(self.source(), request).await?;
        let body: S2SearchResponse = read_json(self.source(), response).await?;

        let records: Vec<RawRecord> = body
            .data
            .into_iter()
            .take(limit as usize)
            .map(RawRecord::SemanticScholar)
            .collect();

        info!(
            "Semantic Scholar returned {} records in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }
}

use super::traits::{read_json, send_checked, ProviderError, RawRecord, SourceAdapter};
use crate::config::EndpointConfig;
use crate::models::SourceId;
use crate::request::Credentials;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenAlexResponse {
    results: Vec<OpenAlexWork>,
}

/// Work entity from the OpenAlex API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenAlexWork {
    pub id: Option<String>,
    /// Full `https://doi.org/...` URL
    pub doi: Option<String>,
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub publication_year: Option<i32>,
    pub authorships: Vec<OpenAlexAuthorship>,
    pub primary_location: Option<OpenAlexLocation>,
    pub best_oa_location: Option<OpenAlexLocation>,
    pub open_access: Option<OpenAlexOpenAccess>,
    pub cited_by_count: Option<u64>,
    pub relevance_score: Option<f64>,
    /// Word -> positions; OpenAlex does not ship plain abstracts
    pub abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenAlexAuthorship {
    pub author: Option<OpenAlexAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenAlexAuthor {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenAlexLocation {
    pub source: Option<OpenAlexSource>,
    pub pdf_url: Option<String>,
    pub landing_page_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenAlexSource {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenAlexOpenAccess {
    pub is_oa: Option<bool>,
    pub oa_status: Option<String>,
    pub oa_url: Option<String>,
}

impl OpenAlexWork {
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().or(self.display_name.as_deref())
    }

    #[must_use]
    pub fn venue(&self) -> Option<&str> {
        self.primary_location
            .as_ref()
            .and_then(|l| l.source.as_ref())
            .and_then(|s| s.display_name.as_deref())
    }

    /// Direct PDF first, then the generic open-access URL
    #[must_use]
    pub fn pdf_url(&self) -> Option<&str> {
        self.best_oa_location
            .as_ref()
            .and_then(|l| l.pdf_url.as_deref())
            .or_else(|| {
                self.primary_location
                    .as_ref()
                    .and_then(|l| l.pdf_url.as_deref())
            })
            .or_else(|| self.open_access.as_ref().and_then(|oa| oa.oa_url.as_deref()))
    }

    /// Rebuild the abstract text from the inverted index
    #[must_use]
    pub fn abstract_text(&self) -> Option<String> {
        let index = self.abstract_inverted_index.as_ref()?;
        let mut positioned: Vec<(usize, &str)> = index
            .iter()
            .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
            .collect();
        if positioned.is_empty() {
            return None;
        }
        positioned.sort_unstable();
        Some(
            positioned
                .into_iter()
                .map(|(_, w)| w)
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

/// OpenAlex works search adapter
pub struct OpenAlexAdapter {
    client: Client,
    base_url: String,
    politeness: Duration,
}

impl OpenAlexAdapter {
    #[must_use]
    pub fn new(client: Client, endpoint: &EndpointConfig) -> Self {
        Self {
            client,
            base_url: endpoint.base_url.clone(),
            politeness: endpoint.politeness_delay(),
        }
    }

    fn build_search_url(
        &self,
        text: &str,
        limit: u32,
        credentials: &Credentials,
    ) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Other(format!("Invalid base URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("search", text)
                .append_pair("per_page", &limit.min(MAX_PER_PAGE).to_string());
            if let Some(email) = Credentials::present(credentials.contact_email.as_ref()) {
                pairs.append_pair("mailto", email);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for OpenAlexAdapter {
    fn source(&self) -> SourceId {
        SourceId::OpenAlex
    }

    fn politeness_delay(&self, _credentials: &Credentials) -> Duration {
        self.politeness
    }

    async fn fetch(
        &self,
        text: &str,
        limit: u32,
        credentials: &Credentials,
    ) -> Result<Vec<RawRecord>, ProviderError> {
        let start_time = Instant::now();
        let url = self.build_search_url(text, limit, credentials)?;
        debug!("OpenAlex search URL: {}", url);

        let response = send_checked(self.source(), self.client.get(url)).await?;
        let body: OpenAlexResponse = read_json(self.source(), response).await?;

        let records: Vec<RawRecord> = body
            .results
            .into_iter()
            .take(limit as usize)
            .map(RawRecord::OpenAlex)
            .collect();

        info!(
            "OpenAlex returned {} records in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }
}

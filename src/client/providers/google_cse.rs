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

/// The Custom Search JSON API returns at most ten items per call
const MAX_NUM: u32 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CseResponse {
    items: Vec<CseItem>,
}

/// Search hit from Google Programmable Search
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CseItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub display_link: Option<String>,
    pub snippet: Option<String>,
}

impl CseItem {
    /// The hit itself is a PDF
    #[must_use]
    pub fn pdf_link(&self) -> Option<&str> {
        self.link
            .as_deref()
            .filter(|l| l.to_ascii_lowercase().ends_with(".pdf"))
    }
}

/// Google Custom Search adapter; needs both an API key and an engine id
pub struct GoogleCseAdapter {
    client: Client,
    base_url: String,
    politeness: Duration,
}

impl GoogleCseAdapter {
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
        let key = Credentials::present(credentials.google_api_key.as_ref())
            .ok_or_else(|| ProviderError::Auth("Google API key is not configured".to_string()))?;
        let cx = Credentials::present(credentials.google_cse_id.as_ref()).ok_or_else(|| {
            ProviderError::Auth("Google search engine id is not configured".to_string())
        })?;

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Other(format!("Invalid base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", text)
            .append_pair("key", key)
            .append_pair("cx", cx)
            .append_pair("num", &limit.min(MAX_NUM).to_string());
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for GoogleCseAdapter {
    fn source(&self) -> SourceId {
        SourceId::GoogleCse
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
        // the URL carries the key, so only the query is logged
        debug!("Google CSE search for '{}'", text);

        let response = send_checked(self.source(), self.client.get(url)).await?;
        let body: CseResponse = read_json(self.source(), response).await?;

        let records: Vec<RawRecord> = body
            .items
            .into_iter()
            .take(limit as usize)
            .map(RawRecord::GoogleCse)
            .collect();

        info!(
            "Google CSE returned {} records in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }
}

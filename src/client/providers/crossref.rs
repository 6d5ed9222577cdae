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

/// CrossRef caps `rows` at this value
const MAX_ROWS: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CrossrefMessage {
    items: Vec<CrossrefWork>,
}

/// One item of the CrossRef `/works` listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrossrefWork {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
    pub title: Vec<String>,
    pub author: Vec<CrossrefAuthor>,
    pub container_title: Vec<String>,
    pub issued: Option<CrossrefDate>,
    pub published: Option<CrossrefDate>,
    #[serde(rename = "URL")]
    pub url: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub is_referenced_by_count: Option<u64>,
    pub score: Option<f64>,
    pub link: Vec<CrossrefLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefAuthor {
    pub given: Option<String>,
    pub family: Option<String>,
    /// Set for corporate authors
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefDate {
    #[serde(rename = "date-parts")]
    pub date_parts: Vec<Vec<Option<i32>>>,
}

impl CrossrefDate {
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.date_parts.first()?.first().copied().flatten()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrossrefLink {
    #[serde(rename = "URL")]
    pub url: Option<String>,
    pub content_type: Option<String>,
}

impl CrossrefWork {
    /// Publication year, preferring `issued` over `published`
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.issued
            .as_ref()
            .and_then(CrossrefDate::year)
            .or_else(|| self.published.as_ref().and_then(CrossrefDate::year))
    }

    /// First full-text link advertised as PDF
    #[must_use]
    pub fn pdf_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.content_type.as_deref() == Some("application/pdf"))
            .and_then(|l| l.url.as_deref())
    }
}

/// CrossRef REST API adapter
pub struct CrossrefAdapter {
    client: Client,
    base_url: String,
    politeness: Duration,
}

impl CrossrefAdapter {
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
                .append_pair("query", text)
                .append_pair("rows", &limit.min(MAX_ROWS).to_string());
            // the polite pool wants a contact address
            if let Some(email) = Credentials::present(credentials.contact_email.as_ref()) {
                pairs.append_pair("mailto", email);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for CrossrefAdapter {
    fn source(&self) -> SourceId {
        SourceId::Crossref
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
        debug!("CrossRef search URL: {}", url);

        let response = send_checked(self.source(), self.client.get(url)).await?;
        let body: CrossrefResponse = read_json(self.source(), response).await?;

        let records: Vec<RawRecord> = body
            .message
            .items
            .into_iter()
            .take(limit as usize)
            .map(RawRecord::Crossref)
            .collect();

        info!(
            "CrossRef returned {} records in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> CrossrefAdapter {
        CrossrefAdapter::new(
            Client::new(),
            &crate::config::SourcesConfig::default().crossref,
        )
    }

    #[test]
    fn test_search_url_includes_mailto_when_known() {
        let credentials = Credentials {
            contact_email: Some("lab@example.org".to_string()),
            ..Credentials::default()
        };
        let url = adapter()
            .build_search_url("protein folding", 5000, &credentials)
            .unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("query=protein+folding"));
        assert!(query.contains("rows=1000"));
        assert!(query.contains("mailto=lab%40example.org"));

        let url = adapter()
            .build_search_url("x", 3, &Credentials::default())
            .unwrap();
        assert!(!url.query().unwrap().contains("mailto"));
    }

    #[test]
    fn test_parse_work() {
        let body = r#"{
            "status": "ok",
            "message": {
                "items": [{
                    "DOI": "10.1000/XYZ",
                    "title": ["Machine Learning in\n   Healthcare"],
                    "author": [{"given": "Ada", "family": "Lovelace"}, {"name": "WHO Consortium"}],
                    "container-title": ["Journal of Things"],
                    "issued": {"date-parts": [[2021, 3, 1]]},
                    "is-referenced-by-count": 12,
                    "score": 17.5,
                    "link": [{"URL": "https://example.org/a.pdf", "content-type": "application/pdf"}]
                }, {
                    "issued": {"date-parts": [[null]]}
                }]
            }
        }"#;
        let parsed: CrossrefResponse = serde_json::from_str(body).unwrap();
        let work = &parsed.message.items[0];
        assert_eq!(work.year(), Some(2021));
        assert_eq!(work.pdf_link(), Some("https://example.org/a.pdf"));
        assert_eq!(work.author.len(), 2);
        assert_eq!(parsed.message.items[1].year(), None);
        assert!(parsed.message.items[1].title.is_empty());
    }
}

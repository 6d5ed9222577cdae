use super::traits::{send_checked, ProviderError, RawRecord, SourceAdapter};
use crate::config::EndpointConfig;
use crate::models::SourceId;
use crate::request::Credentials;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// One `<entry>` of an arXiv Atom feed
#[derive(Debug, Clone, Default)]
pub struct ArxivEntry {
    /// Abstract page URL, e.g. `http://arxiv.org/abs/2101.00001v1`
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
    pub authors: Vec<String>,
    pub pdf_url: Option<String>,
    /// `arxiv:doi`, present once the paper is published elsewhere
    pub doi: Option<String>,
    /// `arxiv:journal_ref`
    pub journal_ref: Option<String>,
}

impl ArxivEntry {
    /// Year from the `published` timestamp (`YYYY-MM-DDTHH:MM:SSZ`)
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.published
            .as_deref()?
            .split('-')
            .next()?
            .trim()
            .parse()
            .ok()
    }
}

/// arXiv API provider for academic papers
pub struct ArxivAdapter {
    client: Client,
    base_url: String,
    politeness: Duration,
}

impl ArxivAdapter {
    #[must_use]
    pub fn new(client: Client, endpoint: &EndpointConfig) -> Self {
        Self {
            client,
            base_url: endpoint.base_url.clone(),
            politeness: endpoint.politeness_delay(),
        }
    }

    /// Build arXiv API URL for search
    fn build_search_url(&self, text: &str, limit: u32) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Other(format!("Invalid base URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("search_query", &format!("all:{text}"))
            .append_pair("start", "0")
            .append_pair("max_results", &limit.to_string())
            .append_pair("sortBy", "relevance")
            .append_pair("sortOrder", "descending");

        Ok(url)
    }

    /// Parse arXiv Atom feed response
    fn parse_response(response_text: &str) -> Result<Vec<ArxivEntry>, ProviderError> {
        use roxmltree::Document;

        let doc = Document::parse(response_text)
            .map_err(|e| ProviderError::Parse(format!("Failed to parse XML: {e}")))?;

        let mut entries = Vec::new();

        for node in doc.descendants().filter(|n| n.has_tag_name("entry")) {
            let mut entry = ArxivEntry::default();

            for child in node.children().filter(roxmltree::Node::is_element) {
                match child.tag_name().name() {
                    "id" => entry.id = child.text().map(|t| t.trim().to_string()),
                    "title" => entry.title = child.text().map(str::to_string),
                    "summary" => entry.summary = child.text().map(str::to_string),
                    "published" => entry.published = child.text().map(str::to_string),
                    "doi" => entry.doi = child.text().map(|t| t.trim().to_string()),
                    "journal_ref" => entry.journal_ref = child.text().map(str::to_string),
                    "author" => {
                        for name_elem in child.children().filter(|n| n.has_tag_name("name")) {
                            if let Some(author_name) = name_elem.text() {
                                entry.authors.push(author_name.to_string());
                            }
                        }
                    }
                    "link" => {
                        let is_pdf = child.attribute("title") == Some("pdf")
                            || child.attribute("type") == Some("application/pdf");
                        if is_pdf {
                            entry.pdf_url = child.attribute("href").map(str::to_string);
                        }
                    }
                    _ => {}
                }
            }

            entries.push(entry);
        }

        debug!("Parsed {} entries from arXiv response", entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn source(&self) -> SourceId {
        SourceId::Arxiv
    }

    fn politeness_delay(&self, _credentials: &Credentials) -> Duration {
        self.politeness
    }

    async fn fetch(
        &self,
        text: &str,
        limit: u32,
        _credentials: &Credentials,
    ) -> Result<Vec<RawRecord>, ProviderError> {
        let start_time = Instant::now();
        let url = self.build_search_url(text, limit)?;
        debug!("arXiv search URL: {}", url);

        let response = send_checked(self.source(), self.client.get(url)).await?;
        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response: {e}")))?;

        let records: Vec<RawRecord> = Self::parse_response(&response_text)?
            .into_iter()
            .take(limit as usize)
            .map(RawRecord::Arxiv)
            .collect();

        info!(
            "arXiv search completed: {} entries in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }
}

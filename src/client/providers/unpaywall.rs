use super::traits::{read_json, send_checked, OpenAccessResolver, ProviderError, RawRecord};
use crate::config::EndpointConfig;
use crate::models::SourceId;
use crate::request::Credentials;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// DOI record from the Unpaywall v2 API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnpaywallRecord {
    pub doi: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub journal_name: Option<String>,
    pub is_oa: Option<bool>,
    pub oa_status: Option<String>,
    pub best_oa_location: Option<UnpaywallLocation>,
    pub z_authors: Option<Vec<UnpaywallAuthor>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnpaywallLocation {
    pub url_for_pdf: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnpaywallAuthor {
    pub given: Option<String>,
    pub family: Option<String>,
}

impl UnpaywallRecord {
    /// Direct PDF of the best location, else its landing page
    #[must_use]
    pub fn best_link(&self) -> Option<&str> {
        let location = self.best_oa_location.as_ref()?;
        location
            .url_for_pdf
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| location.url.as_deref().filter(|u| !u.trim().is_empty()))
    }
}

/// Resolves DOIs to open-access locations via Unpaywall
pub struct UnpaywallResolver {
    client: Client,
    base_url: String,
    politeness: Duration,
}

impl UnpaywallResolver {
    #[must_use]
    pub fn new(client: Client, endpoint: &EndpointConfig) -> Self {
        Self {
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            politeness: endpoint.politeness_delay(),
        }
    }

    fn build_lookup_url(&self, doi: &str, email: &str) -> Result<Url, ProviderError> {
        // DOI slashes stay literal; everything else inside a segment is escaped
        let path = doi
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| ProviderError::Other(format!("Invalid base URL: {e}")))?;
        url.query_pairs_mut().append_pair("email", email);
        Ok(url)
    }
}

#[async_trait]
impl OpenAccessResolver for UnpaywallResolver {
    fn source(&self) -> SourceId {
        SourceId::Unpaywall
    }

    fn politeness_delay(&self) -> Duration {
        self.politeness
    }

    async fn resolve(
        &self,
        doi: &str,
        credentials: &Credentials,
    ) -> Result<Option<RawRecord>, ProviderError> {
        let email = Credentials::present(credentials.contact_email.as_ref()).ok_or_else(|| {
            ProviderError::Auth("Unpaywall requires a contact email".to_string())
        })?;
        let url = self.build_lookup_url(doi, email)?;
        debug!("Unpaywall lookup for {}", doi);

        let response = match send_checked(self.source(), self.client.get(url)).await {
            Ok(response) => response,
            Err(ProviderError::Rejected { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let record: UnpaywallRecord = read_json(self.source(), response).await?;
        Ok(Some(RawRecord::Unpaywall(record)))
    }
}

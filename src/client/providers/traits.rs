use super::arxiv::ArxivEntry;
use super::crossref::CrossrefWork;
use super::google_cse::CseItem;
use super::openalex::OpenAlexWork;
use super::semantic_scholar::S2Paper;
use super::unpaywall::UnpaywallRecord;
use crate::models::SourceId;
use crate::request::Credentials;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Provider-shaped record, exactly as one source returned it.
///
/// Only the normalizer looks inside; everything after it sees `Paper`.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Crossref(CrossrefWork),
    SemanticScholar(S2Paper),
    OpenAlex(OpenAlexWork),
    Arxiv(ArxivEntry),
    GoogleCse(CseItem),
    Unpaywall(UnpaywallRecord),
}

impl RawRecord {
    #[must_use]
    pub const fn source(&self) -> SourceId {
        match self {
            Self::Crossref(_) => SourceId::Crossref,
            Self::SemanticScholar(_) => SourceId::SemanticScholar,
            Self::OpenAlex(_) => SourceId::OpenAlex,
            Self::Arxiv(_) => SourceId::Arxiv,
            Self::GoogleCse(_) => SourceId::GoogleCse,
            Self::Unpaywall(_) => SourceId::Unpaywall,
        }
    }
}

/// Errors that can occur during provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimit { retry_after: Option<Duration> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request rejected by {service}: HTTP {status}")]
    Rejected { service: String, status: u16 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Service unavailable: {service} - {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(source: SourceId, status: StatusCode, headers: &HeaderMap) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Auth(format!("{source} refused the request (HTTP {status})")),
            429 => Self::RateLimit {
                retry_after: parse_retry_after(headers),
            },
            500..=599 => Self::ServiceUnavailable {
                service: source.to_string(),
                reason: format!("HTTP {status}"),
            },
            code => Self::Rejected {
                service: source.to_string(),
                status: code,
            },
        }
    }

    fn from_reqwest(source: SourceId, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("{source} request timed out: {err}"))
        } else if err.is_connect() {
            Self::Network(format!("Connection to {source} failed: {err}"))
        } else if err.is_decode() {
            Self::Parse(format!("{source} body could not be decoded: {err}"))
        } else {
            Self::Network(format!("{source} request failed: {err}"))
        }
    }
}

/// `Retry-After` accepts either delta-seconds or an HTTP date.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Send a request and turn transport failures and error statuses into
/// [`ProviderError`]s.
pub(crate) async fn send_checked(
    source: SourceId,
    request: RequestBuilder,
) -> Result<Response, ProviderError> {
    let response = request.send().await.map_err(|e| {
        error!("{} request failed: {}", source, e);
        ProviderError::from_reqwest(source, &e)
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let err = ProviderError::from_status(source, status, response.headers());
    debug!("{} answered HTTP {}: {}", source, status, err);
    Err(err)
}

/// Read a JSON body, reporting schema problems as parse errors.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    source: SourceId,
    response: Response,
) -> Result<T, ProviderError> {
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(source, &e))?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Parse(format!("{source} returned unexpected JSON: {e}")))
}

/// A metadata source that answers free-text queries
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    /// Minimum spacing between two requests to this source
    fn politeness_delay(&self, credentials: &Credentials) -> Duration;

    /// Run one query and return at most `limit` provider records.
    async fn fetch(
        &self,
        text: &str,
        limit: u32,
        credentials: &Credentials,
    ) -> Result<Vec<RawRecord>, ProviderError>;
}

/// Looks up the open-access status of a single DOI
#[async_trait]
pub trait OpenAccessResolver: Send + Sync {
    fn source(&self) -> SourceId;

    fn politeness_delay(&self) -> Duration;

    /// `Ok(None)` when the DOI is unknown to the resolver.
    async fn resolve(
        &self,
        doi: &str,
        credentials: &Credentials,
    ) -> Result<Option<RawRecord>, ProviderError>;
}

pub mod meta_search;
pub mod providers;
pub mod rate_limiter;

pub use meta_search::{MetaSearchClient, MetaSearchConfig};
pub use rate_limiter::RateLimiter;

use crate::config::SearchConfig;
use crate::Result;
use reqwest::Client;
use std::time::Duration;

/// HTTP client configuration shared by every provider
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout duration
    pub timeout: Duration,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for HttpClientConfig {
    fn from(search: &SearchConfig) -> Self {
        Self {
            timeout: search.timeout(),
            connect_timeout: Duration::from_secs(search.connect_timeout_secs),
            max_redirects: 10,
            user_agent: search.user_agent.clone(),
        }
    }
}

impl HttpClientConfig {
    /// Build the pooled client every adapter shares.
    pub fn build(&self) -> Result<Client> {
        let client = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .user_agent(&self.user_agent)
            .gzip(true)
            .build()?;
        Ok(client)
    }
}

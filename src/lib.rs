pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod request;
pub mod resilience;

pub use client::{MetaSearchClient, MetaSearchConfig};
pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use models::{
    DedupGroup, OaStatus, Paper, PaperId, RankedPaper, ScoreBreakdown, SourceDiagnostics,
    SourceId, SourceStatus,
};
pub use request::{Credentials, ScoreWeights, SearchRequest, SearchResult, SourceQuery};
pub use resilience::{RetryConfig, RetryPolicy, TimeoutExt};

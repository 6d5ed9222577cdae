//! Post-fetch stages: normalization, clustering, enrichment, scoring and ranking.

pub mod aggregate;
pub mod dedup;
pub mod enrich;
pub mod normalize;
pub mod scoring;
pub mod similarity;

pub use aggregate::{finalize, merge_group};
pub use dedup::{cluster, composite_similarity, DedupConfig};
pub use enrich::{enrich_open_access, EnrichmentContext};
pub use normalize::{
    clean_text, first_author_surname, normalize, normalize_doi, title_fingerprint,
};
pub use scoring::Scorer;
pub use similarity::{TitleSimilarity, TokenEditSimilarity};

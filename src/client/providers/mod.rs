pub mod arxiv;
pub mod crossref;
pub mod google_cse;
pub mod openalex;
pub mod semantic_scholar;
pub mod traits;
pub mod unpaywall;

pub use arxiv::ArxivAdapter;
pub use crossref::CrossrefAdapter;
pub use google_cse::GoogleCseAdapter;
pub use openalex::OpenAlexAdapter;
pub use semantic_scholar::SemanticScholarAdapter;
pub use traits::{OpenAccessResolver, ProviderError, RawRecord, SourceAdapter};
pub use unpaywall::UnpaywallResolver;

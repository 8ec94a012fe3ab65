// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod adapters;
pub mod api;
pub mod config;
pub mod error;
pub mod materialize;
pub mod metrics;
pub mod ocr;
pub mod record;
pub mod relevance;
pub mod renderer;
pub mod repo;
pub mod search;
pub mod taxonomy;
pub mod translation;

// ---- Re-exports for stable public API ----
pub use crate::adapters::registry::AdapterRegistry;
pub use crate::adapters::{PlatformAdapter, ScrapeOptions};
pub use crate::api::{create_router, AppState};
pub use crate::error::SearchError;
pub use crate::ocr::{EnhancedRecord, OcrPipeline};
pub use crate::record::CampaignRecord;
pub use crate::search::{SearchRequest, SearchResponse, SearchService};

//! Search module / 搜索模块
//!
//! Layout:
//! - `store`: enrichment cache rows (`external_results`)
//! - `local`: substring / full-text lookup over `pages`
//! - `wikipedia`: external enrichment source
//! - `orchestrator`: the per-request pipeline tying them together
//! - `flags`: runtime switches read by the orchestrator

pub mod error;
pub mod flags;
pub mod local;
pub mod orchestrator;
pub mod store;
pub mod wikipedia;

pub use error::{SearchError, SearchWarning};
pub use flags::SearchFlags;
pub use local::{LocalMode, LocalOutcome, LocalQueryEngine};
pub use orchestrator::{SearchOutcome, SearchService, SearchSurface};
pub use store::ResultStore;
pub use wikipedia::{EnrichmentError, EnrichmentSource, WikipediaClient};

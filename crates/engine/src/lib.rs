//! # Recstack Engine
//!
//! Hybrid recommendation engine: collaborative filtering over a sparse
//! user-item rating matrix, content-based scoring over decaying preference
//! profiles, a fusion blender with diversity, popularity, and recency
//! adjustments, and a multi-source parallel recall layer feeding the
//! candidate pool.
//!
//! ## Modules
//!
//! - `store`: Typed stores, one read/write lock per logical structure
//! - `collaborative`: User-user and item-item similarity plus neighborhood
//!   recommendation
//! - `content`: Online profile learning with exponential time decay
//! - `hybrid`: Signal fusion, confidence, reasons, and diversity reordering
//! - `source`: The `DataSource` capability and the in-memory implementation
//! - `registry`: Static source registry mapping kind tags to constructors
//! - `recall`: Parallel fan-out, failure isolation, and max-score merging
//! - `engine`: The `Recommender` facade wiring everything together

pub mod collaborative;
pub mod content;
pub mod engine;
pub mod hybrid;
pub mod recall;
pub mod registry;
pub mod source;
pub mod store;

// Re-export key types
pub use collaborative::{
    CollaborativeConfig, CollaborativeFilter, RecommendMode, ScoredItem,
};
pub use content::{ContentConfig, ContentProfiler, ItemFeatures, UserProfile};
pub use engine::{Algorithm, EngineStats, Recommender, RecommenderConfig};
pub use hybrid::{BlendStats, HybridBlender, HybridConfig, HybridRecommendation};
pub use recall::{MergedCandidate, RecallConfig, RecallCoordinator, RecallResult, RecallType};
pub use registry::{build_coordinator, build_source, register_creator, SourceConfig, SourceKind};
pub use source::{DataSource, MemoryDataSource};

#[cfg(test)]
mod tests;

//! # Recstack Core
//!
//! Core data structures and types for the Recstack recommendation engine.
//!
//! This crate provides the fundamental building blocks shared across the
//! engine: domain models for items, users, and behaviors, the error taxonomy,
//! configuration loading, vector math utilities, health reporting, and
//! structured logging setup.
//!
//! ## Modules
//!
//! - `models`: Domain models for items, users, behaviors, and recommendations
//! - `error`: Error types and handling
//! - `config`: Configuration loading from environment variables
//! - `math`: Vector similarity utilities for dense and sparse vectors
//! - `health`: Health report types for data-source aggregation
//! - `observability`: Structured logging initialization

pub mod config;
pub mod error;
pub mod health;
pub mod math;
pub mod models;
pub mod observability;

// Re-export commonly used types
pub use config::{load_dotenv, ConfigLoader};
pub use error::{EntityKind, RecError};
pub use health::{AggregatedHealth, ComponentHealth, HealthStatus};
pub use math::{cosine_similarity, dot_product, l2_norm, normalize_vector, sparse_cosine};
pub use models::{
    BehaviorKind, BehaviorRecord, ItemRecord, Recommendation, Record, SimilarUserRecord,
    TimeRange, UserRecord,
};
pub use observability::{init_logging, LogConfig, LogFormat};

/// Result type alias for Recstack operations
pub type Result<T> = std::result::Result<T, RecError>;

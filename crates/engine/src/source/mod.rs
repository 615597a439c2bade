//! Data source capability consumed by the recall layer
//!
//! The engine never assumes a specific backing store; anything implementing
//! [`DataSource`] can be registered with the coordinator. Implementations are
//! expected to be cheap to share behind an `Arc`.

pub mod memory;

pub use memory::MemoryDataSource;

use async_trait::async_trait;

use recstack_core::models::{BehaviorRecord, ItemRecord, SimilarUserRecord, TimeRange, UserRecord};
use recstack_core::Result;

/// A queryable source of behavioral and catalog data
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Behaviors of a user inside a time window
    async fn user_behavior(&self, user_id: &str, range: TimeRange) -> Result<Vec<BehaviorRecord>>;

    /// Item records for the given ids; unknown ids are silently skipped
    async fn item_data(&self, item_ids: &[String]) -> Result<Vec<ItemRecord>>;

    /// A single user record
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown users; this is a direct accessor, not a
    /// recommend-style call.
    async fn user_data(&self, user_id: &str) -> Result<UserRecord>;

    /// Most popular items, optionally restricted to a category
    ///
    /// An empty category means the whole catalog.
    async fn popular_items(&self, category: &str, limit: usize) -> Result<Vec<ItemRecord>>;

    /// Users most similar to the given user
    async fn similar_users(&self, user_id: &str, limit: usize) -> Result<Vec<SimilarUserRecord>>;

    /// Probe the source for liveness
    async fn health_check(&self) -> Result<()>;

    /// Stable name used for provenance and error reporting
    fn name(&self) -> &str;

    /// Release held resources; must be safe to call more than once
    async fn close(&self) -> Result<()>;
}

//! In-memory data source
//!
//! Backs tests, examples, and small deployments. All maps sit behind one
//! read/write lock; snapshots are cloned out so no lock is held across an
//! await point.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, info};

use recstack_core::error::{EntityKind, RecError};
use recstack_core::models::{BehaviorRecord, ItemRecord, SimilarUserRecord, TimeRange, UserRecord};
use recstack_core::Result;

use super::DataSource;

#[derive(Debug, Default)]
struct MemoryState {
    behaviors: HashMap<String, Vec<BehaviorRecord>>,
    items: HashMap<String, ItemRecord>,
    users: HashMap<String, UserRecord>,
}

/// Data source holding everything in process memory
pub struct MemoryDataSource {
    name: String,
    state: RwLock<MemoryState>,
}

impl MemoryDataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Insert or overwrite an item
    pub fn insert_item(&self, item: ItemRecord) {
        let mut state = self.state.write().expect("memory source lock poisoned");
        state.items.insert(item.item_id.clone(), item);
    }

    /// Insert or overwrite a user
    pub fn insert_user(&self, user: UserRecord) {
        let mut state = self.state.write().expect("memory source lock poisoned");
        state.users.insert(user.user_id.clone(), user);
    }

    /// Append a behavior record
    pub fn insert_behavior(&self, behavior: BehaviorRecord) {
        let mut state = self.state.write().expect("memory source lock poisoned");
        state
            .behaviors
            .entry(behavior.user_id.clone())
            .or_default()
            .push(behavior);
    }

    fn sort_by_popularity(items: &mut [ItemRecord]) {
        items.sort_by(|a, b| {
            b.popularity
                .partial_cmp(&a.popularity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    async fn user_behavior(&self, user_id: &str, range: TimeRange) -> Result<Vec<BehaviorRecord>> {
        let state = self.state.read().expect("memory source lock poisoned");
        let result: Vec<BehaviorRecord> = state
            .behaviors
            .get(user_id)
            .map(|behaviors| {
                behaviors
                    .iter()
                    .filter(|b| range.contains(b.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        debug!(source = %self.name, user_id, count = result.len(), "fetched user behavior");
        Ok(result)
    }

    async fn item_data(&self, item_ids: &[String]) -> Result<Vec<ItemRecord>> {
        let state = self.state.read().expect("memory source lock poisoned");
        let result: Vec<ItemRecord> = item_ids
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect();

        debug!(
            source = %self.name,
            requested = item_ids.len(),
            returned = result.len(),
            "fetched item data"
        );
        Ok(result)
    }

    async fn user_data(&self, user_id: &str) -> Result<UserRecord> {
        let state = self.state.read().expect("memory source lock poisoned");
        state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| RecError::not_found(EntityKind::User, user_id))
    }

    async fn popular_items(&self, category: &str, limit: usize) -> Result<Vec<ItemRecord>> {
        let state = self.state.read().expect("memory source lock poisoned");
        let mut items: Vec<ItemRecord> = state
            .items
            .values()
            .filter(|item| category.is_empty() || item.category == category)
            .cloned()
            .collect();
        drop(state);

        Self::sort_by_popularity(&mut items);
        if limit > 0 {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn similar_users(&self, user_id: &str, limit: usize) -> Result<Vec<SimilarUserRecord>> {
        let state = self.state.read().expect("memory source lock poisoned");
        if !state.users.contains_key(user_id) {
            return Err(RecError::not_found(EntityKind::User, user_id));
        }

        // Behavior-volume proximity stands in for a real similarity model
        let target_count = state.behaviors.get(user_id).map_or(0, |b| b.len());
        let mut similar: Vec<SimilarUserRecord> = state
            .users
            .keys()
            .filter(|other| other.as_str() != user_id)
            .filter_map(|other| {
                let count = state.behaviors.get(other).map_or(0, |b| b.len());
                if count == 0 {
                    return None;
                }
                let max = target_count.max(count) as f64;
                let similarity = 1.0 - (target_count as i64 - count as i64).abs() as f64 / max;
                Some(SimilarUserRecord {
                    user_id: other.clone(),
                    similarity,
                })
            })
            .collect();
        drop(state);

        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        if limit > 0 {
            similar.truncate(limit);
        }
        Ok(similar)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<()> {
        info!(source = %self.name, "closed memory data source");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use recstack_core::models::BehaviorKind;

    fn behavior(user: &str, item: &str, hours_ago: i64) -> BehaviorRecord {
        BehaviorRecord {
            user_id: user.to_string(),
            item_id: item.to_string(),
            behavior: BehaviorKind::View,
            value: 1.0,
            timestamp: Utc::now() - Duration::hours(hours_ago),
        }
    }

    #[tokio::test]
    async fn test_user_behavior_filters_time_range() {
        let source = MemoryDataSource::new("memory");
        source.insert_behavior(behavior("user_123", "item_001", 2));
        source.insert_behavior(behavior("user_123", "item_002", 24 * 30));

        let recent = source
            .user_behavior("user_123", TimeRange::last_days(7))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].item_id, "item_001");
    }

    #[tokio::test]
    async fn test_item_data_skips_unknown_ids() {
        let source = MemoryDataSource::new("memory");
        source.insert_item(ItemRecord::new("item_001", "technology"));

        let items = source
            .item_data(&["item_001".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_user_data_not_found_is_error() {
        let source = MemoryDataSource::new("memory");
        let err = tokio_test::block_on(source.user_data("ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_popular_items_sorted_and_filtered() {
        let source = MemoryDataSource::new("memory");
        source.insert_item(ItemRecord::new("item_a", "technology").with_popularity(0.5));
        source.insert_item(ItemRecord::new("item_b", "technology").with_popularity(0.9));
        source.insert_item(ItemRecord::new("item_c", "sports").with_popularity(0.99));

        let tech = source.popular_items("technology", 10).await.unwrap();
        assert_eq!(tech.len(), 2);
        assert_eq!(tech[0].item_id, "item_b");

        let all = source.popular_items("", 2).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].item_id, "item_c");
    }

    #[tokio::test]
    async fn test_similar_users_by_behavior_volume() {
        let source = MemoryDataSource::new("memory");
        source.insert_user(UserRecord::new("user_a"));
        source.insert_user(UserRecord::new("user_b"));
        source.insert_user(UserRecord::new("user_idle"));
        for i in 0..3 {
            source.insert_behavior(behavior("user_a", &format!("i{i}"), 1));
            source.insert_behavior(behavior("user_b", &format!("i{i}"), 1));
        }

        let similar = source.similar_users("user_a", 10).await.unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].user_id, "user_b");
        assert!((similar[0].similarity - 1.0).abs() < 1e-9);
    }
}

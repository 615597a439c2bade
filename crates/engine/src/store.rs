//! Typed stores guarding the engine's shared mutable state
//!
//! Each logical structure gets exactly one read/write lock and a typed API;
//! the raw maps never leave this module. The twin rating indices form one
//! structure so an insert lands in both sides under a single write guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::content::{ItemFeatures, UserProfile};

/// Twin sparse indices over the same rating set
#[derive(Debug, Default)]
struct RatingIndices {
    /// user -> item -> rating
    by_user: HashMap<String, HashMap<String, f64>>,
    /// item -> user -> rating
    by_item: HashMap<String, HashMap<String, f64>>,
}

/// Sparse user-item rating matrix
///
/// Writes bump a generation counter so derived similarity caches can detect
/// staleness and re-derive lazily.
#[derive(Debug, Default)]
pub struct RatingStore {
    inner: RwLock<RatingIndices>,
    generation: AtomicU64,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a rating, updating both indices together
    pub fn insert(&self, user_id: &str, item_id: &str, value: f64) {
        let mut indices = self.inner.write().expect("rating store lock poisoned");
        indices
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(item_id.to_string(), value);
        indices
            .by_item
            .entry(item_id.to_string())
            .or_default()
            .insert(user_id.to_string(), value);
        drop(indices);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// All ratings by one user, or None for an unknown user
    pub fn user_ratings(&self, user_id: &str) -> Option<HashMap<String, f64>> {
        let indices = self.inner.read().expect("rating store lock poisoned");
        indices.by_user.get(user_id).cloned()
    }

    /// All ratings on one item, or None for an unknown item
    pub fn item_ratings(&self, item_id: &str) -> Option<HashMap<String, f64>> {
        let indices = self.inner.read().expect("rating store lock poisoned");
        indices.by_item.get(item_id).cloned()
    }

    /// Ids of every rated-at-least-once user
    pub fn user_ids(&self) -> Vec<String> {
        let indices = self.inner.read().expect("rating store lock poisoned");
        indices.by_user.keys().cloned().collect()
    }

    /// Ids of every rated-at-least-once item
    pub fn item_ids(&self) -> Vec<String> {
        let indices = self.inner.read().expect("rating store lock poisoned");
        indices.by_item.keys().cloned().collect()
    }

    /// Number of users who rated the item
    pub fn rater_count(&self, item_id: &str) -> usize {
        let indices = self.inner.read().expect("rating store lock poisoned");
        indices.by_item.get(item_id).map_or(0, |raters| raters.len())
    }

    /// Largest rater count across all items
    pub fn max_rater_count(&self) -> usize {
        let indices = self.inner.read().expect("rating store lock poisoned");
        indices
            .by_item
            .values()
            .map(|raters| raters.len())
            .max()
            .unwrap_or(0)
    }

    pub fn user_count(&self) -> usize {
        self.inner
            .read()
            .expect("rating store lock poisoned")
            .by_user
            .len()
    }

    pub fn item_count(&self) -> usize {
        self.inner
            .read()
            .expect("rating store lock poisoned")
            .by_item
            .len()
    }

    /// Current write generation, used to stamp derived caches
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Cache of pairwise similarity scores derived from a [`RatingStore`]
///
/// Entries are stamped with the rating-store generation they were computed
/// at; a write to the store makes the whole cache stale and the next insert
/// clears it. Keys are ordered so `(a, b)` and `(b, a)` share an entry.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    entries: DashMap<(String, String), f64>,
    stamped_at: AtomicU64,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Cached score for the pair, if still valid at `generation`
    pub fn get(&self, a: &str, b: &str, generation: u64) -> Option<f64> {
        if self.stamped_at.load(Ordering::Acquire) != generation {
            return None;
        }
        self.entries.get(&Self::key(a, b)).map(|entry| *entry)
    }

    /// Store a score computed at `generation`, discarding stale entries first
    pub fn insert(&self, a: &str, b: &str, generation: u64, score: f64) {
        if self.stamped_at.load(Ordering::Acquire) != generation {
            self.entries.clear();
            self.stamped_at.store(generation, Ordering::Release);
        }
        self.entries.insert(Self::key(a, b), score);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Item catalog guarded by a single lock
#[derive(Debug, Default)]
pub struct CatalogStore {
    inner: RwLock<HashMap<String, ItemFeatures>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite item metadata
    pub fn insert(&self, item: ItemFeatures) {
        let mut catalog = self.inner.write().expect("catalog lock poisoned");
        catalog.insert(item.item_id.clone(), item);
    }

    pub fn get(&self, item_id: &str) -> Option<ItemFeatures> {
        let catalog = self.inner.read().expect("catalog lock poisoned");
        catalog.get(item_id).cloned()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        let catalog = self.inner.read().expect("catalog lock poisoned");
        catalog.contains_key(item_id)
    }

    /// Snapshot of every registered item
    pub fn items(&self) -> Vec<ItemFeatures> {
        let catalog = self.inner.read().expect("catalog lock poisoned");
        catalog.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct ProfileState {
    profiles: HashMap<String, UserProfile>,
    /// user -> item -> last observed rating
    history: HashMap<String, HashMap<String, f64>>,
}

/// User profiles and interaction history under one lock
#[derive(Debug, Default)]
pub struct ProfileStore {
    inner: RwLock<ProfileState>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction in the user's history
    pub fn record_interaction(&self, user_id: &str, item_id: &str, rating: f64) {
        let mut state = self.inner.write().expect("profile store lock poisoned");
        state
            .history
            .entry(user_id.to_string())
            .or_default()
            .insert(item_id.to_string(), rating);
    }

    /// Mutate a user's profile, creating it at `now` when absent
    pub fn modify<F>(&self, user_id: &str, now: DateTime<Utc>, f: F)
    where
        F: FnOnce(&mut UserProfile),
    {
        let mut state = self.inner.write().expect("profile store lock poisoned");
        let profile = state
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id, now));
        f(profile);
    }

    pub fn profile(&self, user_id: &str) -> Option<UserProfile> {
        let state = self.inner.read().expect("profile store lock poisoned");
        state.profiles.get(user_id).cloned()
    }

    pub fn history(&self, user_id: &str) -> Option<HashMap<String, f64>> {
        let state = self.inner.read().expect("profile store lock poisoned");
        state.history.get(user_id).cloned()
    }

    pub fn profile_count(&self) -> usize {
        self.inner
            .read()
            .expect("profile store lock poisoned")
            .profiles
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_updates_both_indices() {
        let store = RatingStore::new();
        store.insert("user_1", "item_a", 4.0);

        let by_user = store.user_ratings("user_1").unwrap();
        assert_eq!(by_user.get("item_a"), Some(&4.0));

        let by_item = store.item_ratings("item_a").unwrap();
        assert_eq!(by_item.get("user_1"), Some(&4.0));
    }

    #[test]
    fn test_insert_overwrites_same_key() {
        let store = RatingStore::new();
        store.insert("user_1", "item_a", 2.0);
        store.insert("user_1", "item_a", 5.0);

        assert_eq!(store.user_ratings("user_1").unwrap().len(), 1);
        assert_eq!(
            store.item_ratings("item_a").unwrap().get("user_1"),
            Some(&5.0)
        );
    }

    #[test]
    fn test_no_entry_without_ratings() {
        let store = RatingStore::new();
        assert!(store.user_ratings("ghost").is_none());
        assert!(store.item_ratings("ghost").is_none());
        assert_eq!(store.rater_count("ghost"), 0);
        assert_eq!(store.max_rater_count(), 0);
    }

    #[test]
    fn test_generation_bumps_on_write() {
        let store = RatingStore::new();
        let before = store.generation();
        store.insert("user_1", "item_a", 1.0);
        assert!(store.generation() > before);
    }

    #[test]
    fn test_similarity_cache_symmetric_key() {
        let cache = SimilarityCache::new();
        cache.insert("b", "a", 1, 0.5);
        assert_eq!(cache.get("a", "b", 1), Some(0.5));
        assert_eq!(cache.get("b", "a", 1), Some(0.5));
    }

    #[test]
    fn test_catalog_store_upsert_and_snapshot() {
        let catalog = CatalogStore::new();
        catalog.insert(ItemFeatures {
            item_id: "item_001".to_string(),
            category: "technology".to_string(),
            keywords: vec![],
            features: HashMap::new(),
        });
        catalog.insert(ItemFeatures {
            item_id: "item_001".to_string(),
            category: "sports".to_string(),
            keywords: vec![],
            features: HashMap::new(),
        });

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("item_001").unwrap().category, "sports");
        assert!(catalog.contains("item_001"));
    }

    #[test]
    fn test_profile_store_creates_profile_on_modify() {
        let store = ProfileStore::new();
        let now = Utc::now();
        assert!(store.profile("user_1").is_none());

        store.modify("user_1", now, |profile| {
            profile.preference_weights.insert("tech".to_string(), 0.5);
        });

        let profile = store.profile("user_1").unwrap();
        assert_eq!(profile.last_update, now);
        assert_eq!(profile.preference_weights["tech"], 0.5);
        assert_eq!(store.profile_count(), 1);
    }

    #[test]
    fn test_profile_store_history_tracks_last_rating() {
        let store = ProfileStore::new();
        store.record_interaction("user_1", "item_a", 2.0);
        store.record_interaction("user_1", "item_a", 5.0);

        let history = store.history("user_1").unwrap();
        assert_eq!(history.get("item_a"), Some(&5.0));
    }

    #[test]
    fn test_similarity_cache_invalidated_by_generation() {
        let cache = SimilarityCache::new();
        cache.insert("a", "b", 1, 0.5);
        assert_eq!(cache.get("a", "b", 2), None);

        // A write at the new generation clears the stale entries
        cache.insert("c", "d", 2, 0.9);
        assert_eq!(cache.get("a", "b", 2), None);
        assert_eq!(cache.get("c", "d", 2), Some(0.9));
        assert_eq!(cache.len(), 1);
    }
}

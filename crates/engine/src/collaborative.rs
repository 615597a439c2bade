//! Collaborative filtering over the sparse user-item rating matrix
//!
//! User similarity uses Pearson correlation restricted to co-rated items,
//! additionally scaled by `|common items| / max_neighbors` so low-evidence
//! overlaps are damped. Item similarity uses cosine over common raters.
//! Both are cached per rating-matrix generation and re-derived lazily after
//! any write.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use recstack_core::config::{parse_env_var, ConfigLoader};
use recstack_core::error::RecError;
use recstack_core::Result;

use crate::store::{RatingStore, SimilarityCache};

/// Which neighborhood drives the recommendation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendMode {
    /// Score unrated items through the most similar users
    UserBased,
    /// Score unrated items through similarity to already-rated items
    ItemBased,
}

/// A candidate item with an accumulated score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item_id: String,
    pub score: f64,
}

/// Collaborative filtering configuration
///
/// # Environment Variables
///
/// - `RECSTACK_CF_SIMILARITY_THRESHOLD` (optional, default 0.1)
/// - `RECSTACK_CF_MAX_NEIGHBORS` (optional, default 50)
/// - `RECSTACK_CF_MIN_COMMON_ITEMS` (optional, default 2)
#[derive(Debug, Clone)]
pub struct CollaborativeConfig {
    /// Minimum similarity for a neighbor to contribute
    pub similarity_threshold: f64,
    /// Neighborhood size cap, also the evidence-scaling divisor
    pub max_neighbors: usize,
    /// Minimum co-rated items before a user pair gets a nonzero similarity
    pub min_common_items: usize,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.1,
            max_neighbors: 50,
            min_common_items: 2,
        }
    }
}

impl ConfigLoader for CollaborativeConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            similarity_threshold: parse_env_var(
                "RECSTACK_CF_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            )?,
            max_neighbors: parse_env_var("RECSTACK_CF_MAX_NEIGHBORS", defaults.max_neighbors)?,
            min_common_items: parse_env_var(
                "RECSTACK_CF_MIN_COMMON_ITEMS",
                defaults.min_common_items,
            )?,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.max_neighbors == 0 {
            return Err(RecError::configuration(
                "max_neighbors must be greater than 0",
                "RECSTACK_CF_MAX_NEIGHBORS",
            ));
        }
        if self.min_common_items == 0 {
            return Err(RecError::configuration(
                "min_common_items must be at least 1",
                "RECSTACK_CF_MIN_COMMON_ITEMS",
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RecError::configuration(
                "similarity_threshold must be within [0, 1]",
                "RECSTACK_CF_SIMILARITY_THRESHOLD",
            ));
        }
        Ok(())
    }
}

/// Collaborative filtering engine
pub struct CollaborativeFilter {
    ratings: Arc<RatingStore>,
    user_cache: SimilarityCache,
    item_cache: SimilarityCache,
    config: CollaborativeConfig,
}

impl CollaborativeFilter {
    pub fn new(config: CollaborativeConfig) -> Self {
        Self {
            ratings: Arc::new(RatingStore::new()),
            user_cache: SimilarityCache::new(),
            item_cache: SimilarityCache::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollaborativeConfig::default())
    }

    pub fn config(&self) -> &CollaborativeConfig {
        &self.config
    }

    /// Insert or overwrite a rating
    ///
    /// Idempotent on the same `(user, item)` key. Rejects empty identifiers
    /// and negative or non-finite values.
    pub fn record_rating(&self, user_id: &str, item_id: &str, value: f64) -> Result<()> {
        if user_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "user_id"));
        }
        if item_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "item_id"));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(RecError::invalid_input(
                format!("rating must be a non-negative number, got {value}"),
                "value",
            ));
        }

        self.ratings.insert(user_id, item_id, value);
        debug!(user_id, item_id, rating = value, "recorded rating");
        Ok(())
    }

    /// Pearson correlation over co-rated items, scaled by evidence
    ///
    /// Returns 0.0 for unknown users or overlaps below `min_common_items`.
    /// The raw correlation is multiplied by `|common| / max_neighbors`, a
    /// deliberate bias toward higher-support pairs rather than canonical
    /// Pearson.
    pub fn user_similarity(&self, user_a: &str, user_b: &str) -> f64 {
        let generation = self.ratings.generation();
        if let Some(cached) = self.user_cache.get(user_a, user_b, generation) {
            return cached;
        }

        let (Some(ratings_a), Some(ratings_b)) = (
            self.ratings.user_ratings(user_a),
            self.ratings.user_ratings(user_b),
        ) else {
            return 0.0;
        };

        let common: Vec<&String> = ratings_a
            .keys()
            .filter(|item| ratings_b.contains_key(*item))
            .collect();

        if common.len() < self.config.min_common_items {
            return 0.0;
        }

        let score = self.pearson(&ratings_a, &ratings_b, &common);
        self.user_cache.insert(user_a, user_b, generation, score);
        score
    }

    /// Cosine similarity over the users who rated both items
    ///
    /// Returns 0.0 when either item has no raters.
    pub fn item_similarity(&self, item_a: &str, item_b: &str) -> f64 {
        let generation = self.ratings.generation();
        if let Some(cached) = self.item_cache.get(item_a, item_b, generation) {
            return cached;
        }

        let (Some(raters_a), Some(raters_b)) = (
            self.ratings.item_ratings(item_a),
            self.ratings.item_ratings(item_b),
        ) else {
            return 0.0;
        };

        let score = Self::common_rater_cosine(&raters_a, &raters_b);
        self.item_cache.insert(item_a, item_b, generation, score);
        score
    }

    /// Top-N recommendations for a user
    ///
    /// Items the user already rated are excluded; scores aggregate by
    /// summation across the neighborhood. Unknown users yield an empty list.
    /// Ties are broken by item id for deterministic output.
    pub fn recommend(&self, user_id: &str, top_n: usize, mode: RecommendMode) -> Vec<ScoredItem> {
        let Some(user_ratings) = self.ratings.user_ratings(user_id) else {
            return Vec::new();
        };

        let scores = match mode {
            RecommendMode::UserBased => self.user_based_scores(user_id, &user_ratings),
            RecommendMode::ItemBased => self.item_based_scores(&user_ratings),
        };

        let mut result: Vec<ScoredItem> = scores
            .into_iter()
            .map(|(item_id, score)| ScoredItem { item_id, score })
            .collect();
        result.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        result.truncate(top_n);

        debug!(
            user_id,
            mode = ?mode,
            candidates = result.len(),
            "collaborative recommendation pass finished"
        );
        result
    }

    /// Neighbors of a user ranked by similarity, threshold and cap applied
    pub fn similar_users(&self, user_id: &str) -> Vec<(String, f64)> {
        let mut neighbors: Vec<(String, f64)> = self
            .ratings
            .user_ids()
            .into_iter()
            .filter(|other| other != user_id)
            .filter_map(|other| {
                let similarity = self.user_similarity(user_id, &other);
                (similarity >= self.config.similarity_threshold).then_some((other, similarity))
            })
            .collect();

        neighbors.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        neighbors.truncate(self.config.max_neighbors);
        neighbors
    }

    /// Items similar to the given item, threshold and cap applied
    pub fn similar_items(&self, item_id: &str) -> Vec<(String, f64)> {
        let mut similar: Vec<(String, f64)> = self
            .ratings
            .item_ids()
            .into_iter()
            .filter(|other| other != item_id)
            .filter_map(|other| {
                let similarity = self.item_similarity(item_id, &other);
                (similarity >= self.config.similarity_threshold).then_some((other, similarity))
            })
            .collect();

        similar.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        similar.truncate(self.config.max_neighbors);
        similar
    }

    /// Rating history of a user
    pub fn user_history(&self, user_id: &str) -> Option<HashMap<String, f64>> {
        self.ratings.user_ratings(user_id)
    }

    /// Number of users who rated the item
    pub fn rater_count(&self, item_id: &str) -> usize {
        self.ratings.rater_count(item_id)
    }

    /// Largest rater count across all items
    pub fn max_rater_count(&self) -> usize {
        self.ratings.max_rater_count()
    }

    /// (user count, item count) of the rating matrix
    pub fn matrix_dimensions(&self) -> (usize, usize) {
        (self.ratings.user_count(), self.ratings.item_count())
    }

    fn user_based_scores(
        &self,
        user_id: &str,
        user_ratings: &HashMap<String, f64>,
    ) -> HashMap<String, f64> {
        let mut scores: HashMap<String, f64> = HashMap::new();

        for (neighbor, similarity) in self.similar_users(user_id) {
            let Some(neighbor_ratings) = self.ratings.user_ratings(&neighbor) else {
                continue;
            };
            for (item_id, rating) in neighbor_ratings {
                if user_ratings.contains_key(&item_id) {
                    continue;
                }
                *scores.entry(item_id).or_insert(0.0) += similarity * rating;
            }
        }
        scores
    }

    fn item_based_scores(&self, user_ratings: &HashMap<String, f64>) -> HashMap<String, f64> {
        let mut scores: HashMap<String, f64> = HashMap::new();

        for (rated_item, rating) in user_ratings {
            for (candidate, similarity) in self.similar_items(rated_item) {
                if user_ratings.contains_key(&candidate) {
                    continue;
                }
                *scores.entry(candidate).or_insert(0.0) += similarity * rating;
            }
        }
        scores
    }

    fn pearson(
        &self,
        ratings_a: &HashMap<String, f64>,
        ratings_b: &HashMap<String, f64>,
        common: &[&String],
    ) -> f64 {
        if common.is_empty() {
            return 0.0;
        }

        let n = common.len() as f64;
        let mean_a: f64 = common.iter().map(|item| ratings_a[*item]).sum::<f64>() / n;
        let mean_b: f64 = common.iter().map(|item| ratings_b[*item]).sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denom_a = 0.0;
        let mut denom_b = 0.0;
        for item in common {
            let diff_a = ratings_a[*item] - mean_a;
            let diff_b = ratings_b[*item] - mean_b;
            numerator += diff_a * diff_b;
            denom_a += diff_a * diff_a;
            denom_b += diff_b * diff_b;
        }

        if denom_a == 0.0 || denom_b == 0.0 {
            return 0.0;
        }

        let correlation = numerator / (denom_a * denom_b).sqrt();

        // Evidence weighting: more co-rated items, more trust
        let weight = common.len() as f64 / self.config.max_neighbors as f64;
        correlation * weight
    }

    fn common_rater_cosine(
        raters_a: &HashMap<String, f64>,
        raters_b: &HashMap<String, f64>,
    ) -> f64 {
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        let mut any = false;

        for (user, rating_a) in raters_a {
            if let Some(rating_b) = raters_b.get(user) {
                any = true;
                dot += rating_a * rating_b;
                norm_a += rating_a * rating_a;
                norm_b += rating_b * rating_b;
            }
        }

        if !any || norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(threshold: f64, max_neighbors: usize) -> CollaborativeFilter {
        CollaborativeFilter::new(CollaborativeConfig {
            similarity_threshold: threshold,
            max_neighbors,
            min_common_items: 2,
        })
    }

    #[test]
    fn test_record_rating_rejects_bad_input() {
        let cf = CollaborativeFilter::with_defaults();
        assert!(cf.record_rating("", "item_001", 4.0).is_err());
        assert!(cf.record_rating("user_123", "", 4.0).is_err());
        assert!(cf.record_rating("user_123", "item_001", -1.0).is_err());
        assert!(cf.record_rating("user_123", "item_001", f64::NAN).is_err());
        assert!(cf.record_rating("user_123", "item_001", 4.0).is_ok());
    }

    #[test]
    fn test_user_similarity_symmetry() {
        let cf = CollaborativeFilter::with_defaults();
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u1", "i2", 3.0).unwrap();
        cf.record_rating("u1", "i3", 1.0).unwrap();
        cf.record_rating("u2", "i1", 4.0).unwrap();
        cf.record_rating("u2", "i2", 2.0).unwrap();
        cf.record_rating("u2", "i3", 2.0).unwrap();

        let ab = cf.user_similarity("u1", "u2");
        let ba = cf.user_similarity("u2", "u1");
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab != 0.0);
    }

    #[test]
    fn test_item_similarity_symmetry() {
        let cf = CollaborativeFilter::with_defaults();
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u1", "i2", 4.0).unwrap();
        cf.record_rating("u2", "i1", 3.0).unwrap();
        cf.record_rating("u2", "i2", 2.0).unwrap();

        let ab = cf.item_similarity("i1", "i2");
        let ba = cf.item_similarity("i2", "i1");
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab > 0.0);
    }

    #[test]
    fn test_similarity_zero_below_min_common_items() {
        let cf = CollaborativeFilter::with_defaults();
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u2", "i1", 4.0).unwrap();

        // Only one common item, min is 2
        assert_eq!(cf.user_similarity("u1", "u2"), 0.0);
    }

    #[test]
    fn test_similarity_of_unknown_entities_is_zero() {
        let cf = CollaborativeFilter::with_defaults();
        assert_eq!(cf.user_similarity("ghost_a", "ghost_b"), 0.0);
        assert_eq!(cf.item_similarity("ghost_a", "ghost_b"), 0.0);
    }

    #[test]
    fn test_evidence_scaling_damps_small_overlap() {
        // Perfectly correlated users over two items; canonical Pearson would
        // be 1.0 but the evidence factor scales it to 2/max_neighbors.
        let cf = filter_with(0.01, 50);
        cf.record_rating("u1", "i1", 1.0).unwrap();
        cf.record_rating("u1", "i2", 5.0).unwrap();
        cf.record_rating("u2", "i1", 2.0).unwrap();
        cf.record_rating("u2", "i2", 4.0).unwrap();

        let sim = cf.user_similarity("u1", "u2");
        assert!((sim - 2.0 / 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_ratings_have_zero_variance() {
        let cf = CollaborativeFilter::with_defaults();
        cf.record_rating("u1", "i1", 3.0).unwrap();
        cf.record_rating("u1", "i2", 3.0).unwrap();
        cf.record_rating("u2", "i1", 1.0).unwrap();
        cf.record_rating("u2", "i2", 5.0).unwrap();

        assert_eq!(cf.user_similarity("u1", "u2"), 0.0);
    }

    #[test]
    fn test_recommend_unknown_user_is_empty() {
        let cf = CollaborativeFilter::with_defaults();
        assert!(cf.recommend("ghost", 10, RecommendMode::UserBased).is_empty());
        assert!(cf.recommend("ghost", 10, RecommendMode::ItemBased).is_empty());
    }

    #[test]
    fn test_user_based_recommend_excludes_rated_items() {
        let cf = filter_with(0.01, 5);
        // Two well-correlated users; u2 has an item u1 does not
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u1", "i2", 3.0).unwrap();
        cf.record_rating("u1", "i3", 1.0).unwrap();
        cf.record_rating("u2", "i1", 5.0).unwrap();
        cf.record_rating("u2", "i2", 3.0).unwrap();
        cf.record_rating("u2", "i3", 1.0).unwrap();
        cf.record_rating("u2", "i4", 4.0).unwrap();

        let recs = cf.recommend("u1", 10, RecommendMode::UserBased);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item_id, "i4");
        assert!(recs[0].score > 0.0);
        assert!(recs.iter().all(|r| !["i1", "i2", "i3"].contains(&r.item_id.as_str())));
    }

    #[test]
    fn test_user_based_scores_aggregate_by_summation() {
        let cf = filter_with(0.01, 5);
        for user in ["u2", "u3"] {
            cf.record_rating(user, "i1", 5.0).unwrap();
            cf.record_rating(user, "i2", 3.0).unwrap();
            cf.record_rating(user, "i3", 1.0).unwrap();
            cf.record_rating(user, "i_new", 4.0).unwrap();
        }
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u1", "i2", 3.0).unwrap();
        cf.record_rating("u1", "i3", 1.0).unwrap();

        let sim = cf.user_similarity("u1", "u2");
        let recs = cf.recommend("u1", 10, RecommendMode::UserBased);
        assert_eq!(recs.len(), 1);
        // Two identical neighbors contribute sim * 4.0 each
        assert!((recs[0].score - 2.0 * sim * 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_item_based_recommend_excludes_rated_items() {
        let cf = filter_with(0.01, 5);
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u2", "i1", 4.0).unwrap();
        cf.record_rating("u2", "i2", 4.0).unwrap();
        cf.record_rating("u3", "i1", 3.0).unwrap();
        cf.record_rating("u3", "i2", 5.0).unwrap();

        let recs = cf.recommend("u1", 10, RecommendMode::ItemBased);
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.item_id != "i1"));
    }

    #[test]
    fn test_recommend_ties_break_by_item_id() {
        let cf = filter_with(0.01, 5);
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u1", "i2", 1.0).unwrap();
        cf.record_rating("u2", "i1", 5.0).unwrap();
        cf.record_rating("u2", "i2", 1.0).unwrap();
        // Same rating on two new items: identical scores
        cf.record_rating("u2", "i_b", 4.0).unwrap();
        cf.record_rating("u2", "i_a", 4.0).unwrap();

        let recs = cf.recommend("u1", 10, RecommendMode::UserBased);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item_id, "i_a");
        assert_eq!(recs[1].item_id, "i_b");
    }

    #[test]
    fn test_top_n_truncation() {
        let cf = filter_with(0.01, 5);
        cf.record_rating("u1", "i1", 5.0).unwrap();
        cf.record_rating("u1", "i2", 1.0).unwrap();
        cf.record_rating("u2", "i1", 5.0).unwrap();
        cf.record_rating("u2", "i2", 1.0).unwrap();
        for i in 0..6 {
            cf.record_rating("u2", &format!("extra_{i}"), 3.0).unwrap();
        }

        let recs = cf.recommend("u1", 3, RecommendMode::UserBased);
        assert_eq!(recs.len(), 3);
    }
}

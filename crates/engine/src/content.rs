//! Content-based filtering over decaying user preference profiles
//!
//! Profiles learn online: every observed behavior first decays the existing
//! weights exponentially by elapsed time, then adds learning-rate scaled
//! contributions from the item's features, keywords, and category. There is
//! no separate retraining pass and updates are not reversible.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use recstack_core::config::{parse_env_var, ConfigLoader};
use recstack_core::error::{EntityKind, RecError};
use recstack_core::math::sparse_cosine;
use recstack_core::models::ItemRecord;
use recstack_core::Result;

use crate::collaborative::ScoredItem;
use crate::store::{CatalogStore, ProfileStore};

/// Seconds per day, the decay granularity
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Relative weights of the three content signals
const FEATURE_WEIGHT: f64 = 0.5;
const KEYWORD_WEIGHT: f64 = 0.3;
const CATEGORY_WEIGHT: f64 = 0.2;

/// Registered item metadata used for content scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFeatures {
    pub item_id: String,
    pub category: String,
    /// Order-irrelevant keyword set
    pub keywords: Vec<String>,
    /// Named feature weights
    pub features: HashMap<String, f64>,
}

impl From<&ItemRecord> for ItemFeatures {
    fn from(record: &ItemRecord) -> Self {
        Self {
            item_id: record.item_id.clone(),
            category: record.category.clone(),
            keywords: record.keywords.clone(),
            features: record.features.clone(),
        }
    }
}

/// A user's learned preference profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    /// Feature name -> learned weight
    pub feature_vector: HashMap<String, f64>,
    /// Keyword or category -> learned preference weight
    pub preference_weights: HashMap<String, f64>,
    pub last_update: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            feature_vector: HashMap::new(),
            preference_weights: HashMap::new(),
            last_update: now,
        }
    }
}

/// Content-based filtering configuration
///
/// # Environment Variables
///
/// - `RECSTACK_CB_SIMILARITY_THRESHOLD` (optional, default 0.3)
/// - `RECSTACK_CB_LEARNING_RATE` (optional, default 0.01)
/// - `RECSTACK_CB_DECAY_FACTOR` (optional, default 0.95)
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Minimum score for an item to be recommended
    pub similarity_threshold: f64,
    /// Scale of each observed behavior's contribution
    pub learning_rate: f64,
    /// Per-day exponential decay applied before each update
    pub decay_factor: f64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            learning_rate: 0.01,
            decay_factor: 0.95,
        }
    }
}

impl ConfigLoader for ContentConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            similarity_threshold: parse_env_var(
                "RECSTACK_CB_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            )?,
            learning_rate: parse_env_var("RECSTACK_CB_LEARNING_RATE", defaults.learning_rate)?,
            decay_factor: parse_env_var("RECSTACK_CB_DECAY_FACTOR", defaults.decay_factor)?,
        })
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RecError::configuration(
                "similarity_threshold must be within [0, 1]",
                "RECSTACK_CB_SIMILARITY_THRESHOLD",
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(RecError::configuration(
                "learning_rate must be positive",
                "RECSTACK_CB_LEARNING_RATE",
            ));
        }
        if self.decay_factor <= 0.0 || self.decay_factor > 1.0 {
            return Err(RecError::configuration(
                "decay_factor must be within (0, 1]",
                "RECSTACK_CB_DECAY_FACTOR",
            ));
        }
        Ok(())
    }
}

/// Content-based profile learner and scorer
pub struct ContentProfiler {
    catalog: CatalogStore,
    profiles: ProfileStore,
    config: ContentConfig,
}

impl ContentProfiler {
    pub fn new(config: ContentConfig) -> Self {
        Self {
            catalog: CatalogStore::new(),
            profiles: ProfileStore::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ContentConfig::default())
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    /// Upsert item metadata into the catalog
    pub fn register_item(&self, item: ItemFeatures) -> Result<()> {
        if item.item_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "item_id"));
        }
        debug!(
            item_id = %item.item_id,
            category = %item.category,
            keywords = item.keywords.len(),
            features = item.features.len(),
            "registered item"
        );
        self.catalog.insert(item);
        Ok(())
    }

    /// Observe a user behavior and fold it into the profile
    ///
    /// Existing profile weights decay by `decay_factor^(elapsed days)` before
    /// the new contribution is added. Behaviors on items missing from the
    /// catalog still enter the interaction history but leave the profile
    /// untouched.
    pub fn ingest_behavior(&self, user_id: &str, item_id: &str, rating: f64) -> Result<()> {
        self.ingest_behavior_at(user_id, item_id, rating, Utc::now())
    }

    /// [`ingest_behavior`](Self::ingest_behavior) with an explicit clock,
    /// for replay and deterministic tests
    pub fn ingest_behavior_at(
        &self,
        user_id: &str,
        item_id: &str,
        rating: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if user_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "user_id"));
        }
        if item_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "item_id"));
        }
        if !rating.is_finite() || rating < 0.0 {
            return Err(RecError::invalid_input(
                format!("rating must be a non-negative number, got {rating}"),
                "rating",
            ));
        }

        self.profiles.record_interaction(user_id, item_id, rating);

        let Some(item) = self.catalog.get(item_id) else {
            warn!(item_id, "behavior on unregistered item, profile unchanged");
            return Ok(());
        };

        let learning_rate = self.config.learning_rate;
        let decay_factor = self.config.decay_factor;
        self.profiles.modify(user_id, now, |profile| {
            Self::apply_decay(profile, now, decay_factor);

            for (feature, value) in &item.features {
                *profile.feature_vector.entry(feature.clone()).or_insert(0.0) +=
                    learning_rate * rating * value;
            }
            for keyword in &item.keywords {
                *profile
                    .preference_weights
                    .entry(keyword.clone())
                    .or_insert(0.0) += learning_rate * rating;
            }
            *profile
                .preference_weights
                .entry(item.category.clone())
                .or_insert(0.0) += learning_rate * rating;

            profile.last_update = now;
        });

        debug!(user_id, item_id, rating, "ingested behavior");
        Ok(())
    }

    /// Similarity between a user's profile and an item, in [0, 1]
    ///
    /// Weighted sum of feature-vector cosine (0.5), keyword overlap (0.3),
    /// and category preference (0.2). Unknown users or items score 0.0.
    pub fn score(&self, user_id: &str, item_id: &str) -> f64 {
        let Some(profile) = self.profiles.profile(user_id) else {
            return 0.0;
        };
        let Some(item) = self.catalog.get(item_id) else {
            return 0.0;
        };
        Self::profile_item_score(&profile, &item)
    }

    /// Top-N catalog items for the user, excluding interaction history
    ///
    /// Only items scoring at least `similarity_threshold` are kept. Unknown
    /// users yield an empty list; ties break by item id.
    pub fn recommend(&self, user_id: &str, top_n: usize) -> Vec<ScoredItem> {
        let Some(profile) = self.profiles.profile(user_id) else {
            return Vec::new();
        };
        let history = self.profiles.history(user_id).unwrap_or_default();

        let mut result: Vec<ScoredItem> = self
            .catalog
            .items()
            .into_iter()
            .filter(|item| !history.contains_key(&item.item_id))
            .filter_map(|item| {
                let score = Self::profile_item_score(&profile, &item);
                (score >= self.config.similarity_threshold).then_some(ScoredItem {
                    item_id: item.item_id,
                    score,
                })
            })
            .collect();

        result.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        result.truncate(top_n);

        debug!(user_id, candidates = result.len(), "content recommendation pass finished");
        result
    }

    /// The user's learned profile
    ///
    /// # Errors
    ///
    /// `NotFound` when the user has no profile yet.
    pub fn profile(&self, user_id: &str) -> Result<UserProfile> {
        self.profiles
            .profile(user_id)
            .ok_or_else(|| RecError::not_found(EntityKind::Profile, user_id))
    }

    /// Directly set a preference weight, creating the profile if needed
    pub fn set_preference(&self, user_id: &str, preference: &str, weight: f64) -> Result<()> {
        if user_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "user_id"));
        }
        if preference.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "preference"));
        }

        let now = Utc::now();
        self.profiles.modify(user_id, now, |profile| {
            profile
                .preference_weights
                .insert(preference.to_string(), weight);
            profile.last_update = now;
        });
        debug!(user_id, preference, weight, "set preference weight");
        Ok(())
    }

    /// Most frequent keywords across the catalog
    pub fn popular_keywords(&self, limit: usize) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for item in self.catalog.items() {
            for keyword in item.keywords {
                *counts.entry(keyword).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.into_iter().take(limit).map(|(kw, _)| kw).collect()
    }

    /// Catalog metadata for one item
    pub fn item_features(&self, item_id: &str) -> Option<ItemFeatures> {
        self.catalog.get(item_id)
    }

    /// The user's interaction history (item -> last observed rating)
    pub fn history(&self, user_id: &str) -> Option<HashMap<String, f64>> {
        self.profiles.history(user_id)
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog.len()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.profile_count()
    }

    fn profile_item_score(profile: &UserProfile, item: &ItemFeatures) -> f64 {
        let feature_similarity = sparse_cosine(&profile.feature_vector, &item.features);
        let keyword_similarity = Self::keyword_overlap(&profile.preference_weights, &item.keywords);
        let category_similarity = profile
            .preference_weights
            .get(&item.category)
            .copied()
            .unwrap_or(0.0);

        FEATURE_WEIGHT * feature_similarity
            + KEYWORD_WEIGHT * keyword_similarity
            + CATEGORY_WEIGHT * category_similarity
    }

    fn keyword_overlap(preferences: &HashMap<String, f64>, keywords: &[String]) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let total: f64 = keywords
            .iter()
            .filter_map(|keyword| preferences.get(keyword))
            .sum();
        total / keywords.len() as f64
    }

    fn apply_decay(profile: &mut UserProfile, now: DateTime<Utc>, decay_factor: f64) {
        let elapsed_seconds = (now - profile.last_update).num_seconds();
        if elapsed_seconds <= 0 {
            return;
        }

        let factor = decay_factor.powf(elapsed_seconds as f64 / SECONDS_PER_DAY);
        for value in profile.feature_vector.values_mut() {
            *value *= factor;
        }
        for value in profile.preference_weights.values_mut() {
            *value *= factor;
        }
    }
}

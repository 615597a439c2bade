//! Recommendation engine facade
//!
//! Wires the recall coordinator, both scorers, and the hybrid blender into
//! the surface callers consume: `produce_recommendations` and its
//! category-filtered variant. Algorithm selection is a closed enum resolved
//! at startup; a configurable fallback keeps partial results flowing when
//! the primary path comes up empty.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use recstack_core::config::{parse_env_var, ConfigLoader};
use recstack_core::error::RecError;
use recstack_core::health::AggregatedHealth;
use recstack_core::models::{ItemRecord, Recommendation, Record};
use recstack_core::Result;

use crate::collaborative::{CollaborativeConfig, CollaborativeFilter, RecommendMode};
use crate::content::{ContentConfig, ContentProfiler, ItemFeatures};
use crate::hybrid::{BlendStats, HybridBlender, HybridConfig};
use crate::recall::{MergedCandidate, RecallCoordinator, RecallType};

/// Confidence attached to single-algorithm recommendations
const COLLABORATIVE_CONFIDENCE: f64 = 0.8;
const CONTENT_CONFIDENCE: f64 = 0.75;
const POOL_FALLBACK_CONFIDENCE: f64 = 0.5;

/// Preference weight seeded from an absorbed user record
const PREFERRED_CATEGORY_WEIGHT: f64 = 1.0;

/// Available recommendation algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Collaborative,
    ContentBased,
    Hybrid,
}

impl Algorithm {
    /// Tag surfaced in [`Recommendation::algorithm`]
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Collaborative => "collaborative_filtering",
            Algorithm::ContentBased => "content_based_filtering",
            Algorithm::Hybrid => "hybrid_filtering",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "collaborative" | "collaborative_filtering" => Ok(Algorithm::Collaborative),
            "content_based" | "content_based_filtering" => Ok(Algorithm::ContentBased),
            "hybrid" | "hybrid_filtering" => Ok(Algorithm::Hybrid),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}

/// Engine configuration
///
/// # Environment Variables
///
/// - `RECSTACK_ENGINE_DEFAULT_ALGORITHM` (optional, default "hybrid")
/// - `RECSTACK_ENGINE_FALLBACK_ALGORITHM` (optional, default "content_based")
/// - `RECSTACK_ENGINE_ENABLE_FALLBACK` (optional, default true)
/// - `RECSTACK_ENGINE_MAX_RECOMMENDATIONS` (optional, default 50)
/// - `RECSTACK_ENGINE_MIN_CONFIDENCE` (optional, default 0.1)
#[derive(Debug, Clone)]
pub struct RecommenderConfig {
    pub default_algorithm: Algorithm,
    pub fallback_algorithm: Algorithm,
    pub enable_fallback: bool,
    /// Hard cap on the number of recommendations per request
    pub max_recommendations: usize,
    /// Recommendations below this confidence are dropped
    pub min_confidence: f64,
    /// Recall types requested per recall pass, in priority order
    pub recall_types: Vec<RecallType>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            default_algorithm: Algorithm::Hybrid,
            fallback_algorithm: Algorithm::ContentBased,
            enable_fallback: true,
            max_recommendations: 50,
            min_confidence: 0.1,
            recall_types: vec![RecallType::Popular],
        }
    }
}

impl ConfigLoader for RecommenderConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_algorithm: parse_env_var(
                "RECSTACK_ENGINE_DEFAULT_ALGORITHM",
                defaults.default_algorithm,
            )?,
            fallback_algorithm: parse_env_var(
                "RECSTACK_ENGINE_FALLBACK_ALGORITHM",
                defaults.fallback_algorithm,
            )?,
            enable_fallback: parse_env_var(
                "RECSTACK_ENGINE_ENABLE_FALLBACK",
                defaults.enable_fallback,
            )?,
            max_recommendations: parse_env_var(
                "RECSTACK_ENGINE_MAX_RECOMMENDATIONS",
                defaults.max_recommendations,
            )?,
            min_confidence: parse_env_var(
                "RECSTACK_ENGINE_MIN_CONFIDENCE",
                defaults.min_confidence,
            )?,
            recall_types: defaults.recall_types,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.max_recommendations == 0 {
            return Err(RecError::configuration(
                "max_recommendations must be greater than 0",
                "RECSTACK_ENGINE_MAX_RECOMMENDATIONS",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(RecError::configuration(
                "min_confidence must be within [0, 1]",
                "RECSTACK_ENGINE_MIN_CONFIDENCE",
            ));
        }
        if self.recall_types.is_empty() {
            return Err(RecError::configuration(
                "at least one recall type is required",
                "RECSTACK_ENGINE_RECALL_TYPES",
            ));
        }
        Ok(())
    }
}

/// Counts describing the engine's current state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub rated_users: usize,
    pub rated_items: usize,
    pub profiles: usize,
    pub catalog_items: usize,
    pub sources: usize,
}

/// The assembled recommendation engine
pub struct Recommender {
    collaborative: Arc<CollaborativeFilter>,
    content: Arc<ContentProfiler>,
    blender: HybridBlender,
    coordinator: Option<RecallCoordinator>,
    config: RecommenderConfig,
}

impl Recommender {
    pub fn new(config: RecommenderConfig) -> Self {
        Self::with_components(
            config,
            CollaborativeConfig::default(),
            ContentConfig::default(),
            HybridConfig::default(),
        )
    }

    pub fn with_defaults() -> Self {
        Self::new(RecommenderConfig::default())
    }

    pub fn with_components(
        config: RecommenderConfig,
        collaborative_config: CollaborativeConfig,
        content_config: ContentConfig,
        hybrid_config: HybridConfig,
    ) -> Self {
        let collaborative = Arc::new(CollaborativeFilter::new(collaborative_config));
        let content = Arc::new(ContentProfiler::new(content_config));
        let blender = HybridBlender::new(
            Arc::clone(&collaborative),
            Arc::clone(&content),
            hybrid_config,
        );
        Self {
            collaborative,
            content,
            blender,
            coordinator: None,
            config,
        }
    }

    /// Attach a recall coordinator feeding the candidate pool
    pub fn with_coordinator(mut self, coordinator: RecallCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn collaborative(&self) -> &Arc<CollaborativeFilter> {
        &self.collaborative
    }

    pub fn content(&self) -> &Arc<ContentProfiler> {
        &self.content
    }

    pub fn blender(&self) -> &HybridBlender {
        &self.blender
    }

    /// Record a rating into both the rating matrix and the user profile
    pub fn record_rating(&self, user_id: &str, item_id: &str, value: f64) -> Result<()> {
        self.collaborative.record_rating(user_id, item_id, value)?;
        self.content.ingest_behavior(user_id, item_id, value)
    }

    /// Register item metadata into the content catalog
    pub fn register_item(&self, item: &ItemRecord) -> Result<()> {
        self.content.register_item(ItemFeatures::from(item))
    }

    /// Feed one record into the engine, dispatched by kind
    pub fn absorb(&self, record: Record) -> Result<()> {
        match record {
            Record::Behavior(behavior) => {
                self.record_rating(&behavior.user_id, &behavior.item_id, behavior.value)
            }
            Record::Item(item) => self.register_item(&item),
            Record::User(user) => {
                for category in &user.preferred_categories {
                    self.content
                        .set_preference(&user.user_id, category, PREFERRED_CATEGORY_WEIGHT)?;
                }
                Ok(())
            }
        }
    }

    /// Produce ranked, explained recommendations for a user
    ///
    /// Recall enrichment is best-effort: a failed recall pass is logged and
    /// scoring continues over the already-known catalog. When the primary
    /// algorithm yields nothing the configured fallback runs, and as a last
    /// resort the recall pool's own popularity ranking is returned.
    pub async fn produce_recommendations(
        &self,
        user_id: &str,
        count: usize,
    ) -> Result<Vec<Recommendation>> {
        if user_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "user_id"));
        }
        let effective = count.min(self.config.max_recommendations);
        if effective == 0 {
            return Ok(Vec::new());
        }

        let pool = self.gather_candidates(user_id).await;
        for candidate in &pool {
            if self.content.item_features(&candidate.item.item_id).is_none() {
                self.content
                    .register_item(ItemFeatures::from(&candidate.item))?;
            }
        }

        let mut recommendations =
            self.run_algorithm(self.config.default_algorithm, user_id, effective);

        if recommendations.is_empty()
            && self.config.enable_fallback
            && self.config.fallback_algorithm != self.config.default_algorithm
        {
            debug!(
                user_id,
                fallback = self.config.fallback_algorithm.as_str(),
                "primary algorithm produced nothing, running fallback"
            );
            recommendations =
                self.run_algorithm(self.config.fallback_algorithm, user_id, effective);
        }

        if recommendations.is_empty() && !pool.is_empty() {
            debug!(user_id, "falling back to recall pool popularity ranking");
            recommendations = Self::pool_recommendations(&pool, effective);
        }

        let min_confidence = self.config.min_confidence;
        recommendations.retain(|rec| rec.confidence >= min_confidence);
        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        recommendations.truncate(effective);

        info!(
            user_id,
            returned = recommendations.len(),
            "produced recommendations"
        );
        Ok(recommendations)
    }

    /// Recommendations restricted to one category
    ///
    /// Oversamples at 2x the requested count before filtering.
    pub async fn produce_recommendations_by_category(
        &self,
        user_id: &str,
        category: &str,
        count: usize,
    ) -> Result<Vec<Recommendation>> {
        if category.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "category"));
        }

        let recommendations = self
            .produce_recommendations(user_id, count.saturating_mul(2))
            .await?;
        Ok(recommendations
            .into_iter()
            .filter(|rec| rec.category == category)
            .take(count)
            .collect())
    }

    /// Aggregate health of every attached data source
    pub async fn health_check(&self) -> AggregatedHealth {
        match &self.coordinator {
            Some(coordinator) => coordinator.health_check().await,
            None => AggregatedHealth::from_components(Vec::new(), 0),
        }
    }

    /// Close all attached data sources
    pub async fn close(&self) -> Result<()> {
        match &self.coordinator {
            Some(coordinator) => coordinator.close().await,
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let BlendStats {
            rated_users,
            rated_items,
            profiles,
            catalog_items,
        } = self.blender.stats();
        EngineStats {
            rated_users,
            rated_items,
            profiles,
            catalog_items,
            sources: self
                .coordinator
                .as_ref()
                .map_or(0, RecallCoordinator::source_count),
        }
    }

    async fn gather_candidates(&self, user_id: &str) -> Vec<MergedCandidate> {
        let Some(coordinator) = &self.coordinator else {
            return Vec::new();
        };
        match coordinator
            .parallel_recall(user_id, &self.config.recall_types)
            .await
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(user_id, error = %e, "recall pass failed, scoring without pool");
                Vec::new()
            }
        }
    }

    fn run_algorithm(&self, algorithm: Algorithm, user_id: &str, count: usize) -> Vec<Recommendation> {
        let now = Utc::now();
        match algorithm {
            Algorithm::Hybrid => self
                .blender
                .blend(user_id, count)
                .into_iter()
                .map(|rec| Recommendation {
                    category: self.category_of(&rec.item_id),
                    item_id: rec.item_id,
                    score: rec.final_score,
                    reason: rec.reason,
                    algorithm: algorithm.as_str().to_string(),
                    confidence: rec.confidence,
                    created_at: now,
                })
                .collect(),
            Algorithm::Collaborative => self
                .collaborative
                .recommend(user_id, count, RecommendMode::UserBased)
                .into_iter()
                .map(|rec| Recommendation {
                    category: self.category_of(&rec.item_id),
                    item_id: rec.item_id,
                    score: rec.score,
                    reason: "history-based".to_string(),
                    algorithm: algorithm.as_str().to_string(),
                    confidence: COLLABORATIVE_CONFIDENCE,
                    created_at: now,
                })
                .collect(),
            Algorithm::ContentBased => self
                .content
                .recommend(user_id, count)
                .into_iter()
                .map(|rec| Recommendation {
                    category: self.category_of(&rec.item_id),
                    item_id: rec.item_id,
                    score: rec.score,
                    reason: "content-similarity".to_string(),
                    algorithm: algorithm.as_str().to_string(),
                    confidence: CONTENT_CONFIDENCE,
                    created_at: now,
                })
                .collect(),
        }
    }

    fn pool_recommendations(pool: &[MergedCandidate], count: usize) -> Vec<Recommendation> {
        let now = Utc::now();
        pool.iter()
            .take(count)
            .map(|candidate| Recommendation {
                item_id: candidate.item.item_id.clone(),
                score: candidate.score,
                reason: "trending".to_string(),
                algorithm: "multi_recall".to_string(),
                confidence: POOL_FALLBACK_CONFIDENCE,
                created_at: now,
                category: candidate.item.category.clone(),
            })
            .collect()
    }

    fn category_of(&self, item_id: &str) -> String {
        self.content
            .item_features(item_id)
            .map(|features| features.category)
            .unwrap_or_default()
    }
}

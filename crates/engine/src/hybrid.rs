//! Hybrid fusion of collaborative and content-based signals
//!
//! Pulls an oversampled candidate set from both scorers, merges by item id,
//! applies diversity, popularity, and recency adjustments, derives a coarse
//! confidence bucket and a reason tag string per item, and finally reorders
//! the ranked list with a greedy category-penalized diversity pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use recstack_core::config::{parse_env_var, validate_unit_weight, ConfigLoader};
use recstack_core::Result;

use crate::collaborative::{CollaborativeFilter, RecommendMode};
use crate::content::ContentProfiler;

/// Rater count at which the recency proxy saturates
const RECENCY_SATURATION: f64 = 100.0;

/// Signal thresholds for reason tags
const COMPONENT_REASON_THRESHOLD: f64 = 0.5;
const BONUS_REASON_THRESHOLD: f64 = 0.7;

/// Fallback reason when no signal is strong enough
const DEFAULT_REASON: &str = "personalized";

/// Hybrid blending configuration
///
/// # Environment Variables
///
/// - `RECSTACK_HYBRID_COLLABORATIVE_WEIGHT` (optional, default 0.4)
/// - `RECSTACK_HYBRID_CONTENT_WEIGHT` (optional, default 0.4)
/// - `RECSTACK_HYBRID_DIVERSITY_WEIGHT` (optional, default 0.1)
/// - `RECSTACK_HYBRID_POPULARITY_WEIGHT` (optional, default 0.05)
/// - `RECSTACK_HYBRID_RECENCY_WEIGHT` (optional, default 0.05)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    pub collaborative_weight: f64,
    pub content_weight: f64,
    pub diversity_weight: f64,
    pub popularity_weight: f64,
    pub recency_weight: f64,
    pub enable_diversity: bool,
    pub enable_popularity: bool,
    pub enable_recency: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            collaborative_weight: 0.4,
            content_weight: 0.4,
            diversity_weight: 0.1,
            popularity_weight: 0.05,
            recency_weight: 0.05,
            enable_diversity: true,
            enable_popularity: true,
            enable_recency: true,
        }
    }
}

impl ConfigLoader for HybridConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            collaborative_weight: parse_env_var(
                "RECSTACK_HYBRID_COLLABORATIVE_WEIGHT",
                defaults.collaborative_weight,
            )?,
            content_weight: parse_env_var(
                "RECSTACK_HYBRID_CONTENT_WEIGHT",
                defaults.content_weight,
            )?,
            diversity_weight: parse_env_var(
                "RECSTACK_HYBRID_DIVERSITY_WEIGHT",
                defaults.diversity_weight,
            )?,
            popularity_weight: parse_env_var(
                "RECSTACK_HYBRID_POPULARITY_WEIGHT",
                defaults.popularity_weight,
            )?,
            recency_weight: parse_env_var(
                "RECSTACK_HYBRID_RECENCY_WEIGHT",
                defaults.recency_weight,
            )?,
            enable_diversity: parse_env_var(
                "RECSTACK_HYBRID_ENABLE_DIVERSITY",
                defaults.enable_diversity,
            )?,
            enable_popularity: parse_env_var(
                "RECSTACK_HYBRID_ENABLE_POPULARITY",
                defaults.enable_popularity,
            )?,
            enable_recency: parse_env_var(
                "RECSTACK_HYBRID_ENABLE_RECENCY",
                defaults.enable_recency,
            )?,
        })
    }

    fn validate(&self) -> Result<()> {
        validate_unit_weight(
            self.collaborative_weight,
            "RECSTACK_HYBRID_COLLABORATIVE_WEIGHT",
        )?;
        validate_unit_weight(self.content_weight, "RECSTACK_HYBRID_CONTENT_WEIGHT")?;
        validate_unit_weight(self.diversity_weight, "RECSTACK_HYBRID_DIVERSITY_WEIGHT")?;
        validate_unit_weight(self.popularity_weight, "RECSTACK_HYBRID_POPULARITY_WEIGHT")?;
        validate_unit_weight(self.recency_weight, "RECSTACK_HYBRID_RECENCY_WEIGHT")?;
        Ok(())
    }
}

/// A scored, explained hybrid candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridRecommendation {
    pub item_id: String,
    /// Fused score; additive bonuses can exceed 1.0
    pub final_score: f64,
    pub collaborative_score: f64,
    pub content_score: f64,
    pub diversity_score: f64,
    pub popularity_score: f64,
    pub recency_score: f64,
    /// Coarse three-bucket confidence: 0.9, 0.7, or 0.3
    pub confidence: f64,
    /// Reason tags joined by '+' in a fixed order
    pub reason: String,
}

/// Counts describing the blender's underlying state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendStats {
    pub rated_users: usize,
    pub rated_items: usize,
    pub profiles: usize,
    pub catalog_items: usize,
}

/// Hybrid recommendation blender
pub struct HybridBlender {
    collaborative: Arc<CollaborativeFilter>,
    content: Arc<ContentProfiler>,
    config: HybridConfig,
}

impl HybridBlender {
    pub fn new(
        collaborative: Arc<CollaborativeFilter>,
        content: Arc<ContentProfiler>,
        config: HybridConfig,
    ) -> Self {
        Self {
            collaborative,
            content,
            config,
        }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: HybridConfig) {
        self.config = config;
    }

    /// Current signal weights keyed by signal name
    pub fn weights(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("collaborative".to_string(), self.config.collaborative_weight),
            ("content_based".to_string(), self.config.content_weight),
            ("diversity".to_string(), self.config.diversity_weight),
            ("popularity".to_string(), self.config.popularity_weight),
            ("recency".to_string(), self.config.recency_weight),
        ])
    }

    /// Counts of the shared state both scorers operate on
    pub fn stats(&self) -> BlendStats {
        let (rated_users, rated_items) = self.collaborative.matrix_dimensions();
        BlendStats {
            rated_users,
            rated_items,
            profiles: self.content.profile_count(),
            catalog_items: self.content.catalog_size(),
        }
    }

    /// Fused top-N recommendations for a user
    ///
    /// Both scorers are oversampled at 2x the requested size before the
    /// merge. An empty candidate set from both sides yields an empty list;
    /// a `top_n` larger than the pool returns the whole pool.
    pub fn blend(&self, user_id: &str, top_n: usize) -> Vec<HybridRecommendation> {
        let collaborative = self
            .collaborative
            .recommend(user_id, top_n * 2, RecommendMode::UserBased);
        let content = self.content.recommend(user_id, top_n * 2);

        // item id -> (collaborative score, content score); a side missing an
        // item keeps that component at zero
        let mut merged: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for rec in collaborative {
            merged.entry(rec.item_id).or_insert((0.0, 0.0)).0 = rec.score;
        }
        for rec in content {
            merged.entry(rec.item_id).or_insert((0.0, 0.0)).1 = rec.score;
        }

        let mut recommendations: Vec<HybridRecommendation> = merged
            .into_iter()
            .map(|(item_id, (collab, content))| self.score_candidate(user_id, item_id, collab, content))
            .collect();

        recommendations.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });

        if self.config.enable_diversity {
            recommendations = self.reorder_for_diversity(recommendations);
        }
        recommendations.truncate(top_n);

        debug!(
            user_id,
            returned = recommendations.len(),
            "hybrid blend finished"
        );
        recommendations
    }

    fn score_candidate(
        &self,
        user_id: &str,
        item_id: String,
        collaborative_score: f64,
        content_score: f64,
    ) -> HybridRecommendation {
        let base = self.config.collaborative_weight * collaborative_score
            + self.config.content_weight * content_score;

        let diversity_score = if self.config.enable_diversity {
            self.diversity_score(user_id, &item_id)
        } else {
            0.0
        };
        let popularity_score = if self.config.enable_popularity {
            self.popularity_score(&item_id)
        } else {
            0.0
        };
        let recency_score = if self.config.enable_recency {
            self.recency_score(&item_id)
        } else {
            0.0
        };

        let final_score = base
            + self.config.diversity_weight * diversity_score
            + self.config.popularity_weight * popularity_score
            + self.config.recency_weight * recency_score;

        let confidence = Self::confidence_for(collaborative_score, content_score);
        let reason = Self::reason_for(
            collaborative_score,
            content_score,
            diversity_score,
            popularity_score,
        );

        HybridRecommendation {
            item_id,
            final_score,
            collaborative_score,
            content_score,
            diversity_score,
            popularity_score,
            recency_score,
            confidence,
            reason,
        }
    }

    /// Category novelty of an item relative to the user's rating history
    ///
    /// New users score 1.0; items missing from the catalog score 0.5.
    fn diversity_score(&self, user_id: &str, item_id: &str) -> f64 {
        let history = match self.collaborative.user_history(user_id) {
            Some(history) if !history.is_empty() => history,
            _ => return 1.0,
        };
        let Some(item) = self.content.item_features(item_id) else {
            return 0.5;
        };

        let mut category_counts: HashMap<String, usize> = HashMap::new();
        for history_item in history.keys() {
            if let Some(features) = self.content.item_features(history_item) {
                *category_counts.entry(features.category).or_insert(0) += 1;
            }
        }

        let max_count = category_counts.values().copied().max().unwrap_or(0);
        if max_count == 0 {
            return 1.0;
        }

        let same_category = category_counts.get(&item.category).copied().unwrap_or(0);
        (1.0 - same_category as f64 / max_count as f64).clamp(0.0, 1.0)
    }

    /// Rater count of the item relative to the most-rated item
    ///
    /// Defaults to 0.5 when nothing has been rated yet.
    fn popularity_score(&self, item_id: &str) -> f64 {
        let max_raters = self.collaborative.max_rater_count();
        if max_raters == 0 {
            return 0.5;
        }
        self.collaborative.rater_count(item_id) as f64 / max_raters as f64
    }

    /// Simplified recency proxy derived from rating volume
    fn recency_score(&self, item_id: &str) -> f64 {
        (self.collaborative.rater_count(item_id) as f64 / RECENCY_SATURATION).min(1.0)
    }

    /// Coarse agreement heuristic between the two component scores
    fn confidence_for(collaborative_score: f64, content_score: f64) -> f64 {
        if collaborative_score > 0.5 && content_score > 0.5 {
            return 0.9;
        }
        if (collaborative_score - content_score).abs() > 0.8 {
            return 0.3;
        }
        0.7
    }

    /// Reason tags for each strong signal, joined in a fixed order
    fn reason_for(
        collaborative_score: f64,
        content_score: f64,
        diversity_score: f64,
        popularity_score: f64,
    ) -> String {
        let mut reasons: Vec<&str> = Vec::new();
        if collaborative_score > COMPONENT_REASON_THRESHOLD {
            reasons.push("history-based");
        }
        if content_score > COMPONENT_REASON_THRESHOLD {
            reasons.push("content-similarity");
        }
        if diversity_score > BONUS_REASON_THRESHOLD {
            reasons.push("novel-category");
        }
        if popularity_score > BONUS_REASON_THRESHOLD {
            reasons.push("trending");
        }

        if reasons.is_empty() {
            DEFAULT_REASON.to_string()
        } else {
            reasons.join("+")
        }
    }

    /// Greedy category-penalized rebuild of the ranked list
    ///
    /// Keeps the top item, then repeatedly selects the remaining candidate
    /// with the highest diversity score, halved when its category was
    /// already picked. Local greedy pass, not a global optimum.
    fn reorder_for_diversity(
        &self,
        recommendations: Vec<HybridRecommendation>,
    ) -> Vec<HybridRecommendation> {
        if recommendations.len() <= 1 {
            return recommendations;
        }

        let mut remaining = recommendations;
        let mut selected = Vec::with_capacity(remaining.len());
        let mut selected_categories: HashSet<String> = HashSet::new();

        let first = remaining.remove(0);
        if let Some(features) = self.content.item_features(&first.item_id) {
            selected_categories.insert(features.category);
        }
        selected.push(first);

        while !remaining.is_empty() {
            let mut best_index = 0;
            let mut best_score = f64::NEG_INFINITY;

            for (index, candidate) in remaining.iter().enumerate() {
                let mut score = candidate.diversity_score;
                if let Some(features) = self.content.item_features(&candidate.item_id) {
                    if selected_categories.contains(&features.category) {
                        score *= 0.5;
                    }
                }
                if score > best_score {
                    best_score = score;
                    best_index = index;
                }
            }

            let chosen = remaining.remove(best_index);
            if let Some(features) = self.content.item_features(&chosen.item_id) {
                selected_categories.insert(features.category);
            }
            selected.push(chosen);
        }

        selected
    }
}

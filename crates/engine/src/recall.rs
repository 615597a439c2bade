//! Multi-source parallel recall
//!
//! Fans a recall request out to every registered data source, one task per
//! source, and merges the heterogeneous candidate sets into a single pool
//! keyed by item id. Each source is isolated: a failure or a blown deadline
//! is logged and excluded without disturbing its siblings, and the merge
//! waits for every task before producing partial results.
//!
//! Per source, only the FIRST requested recall type is executed. That
//! short-circuit mirrors long-standing behavior the rest of the pipeline
//! depends on; widening it to a union across types changes candidate pools.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use recstack_core::config::{parse_env_var, ConfigLoader};
use recstack_core::error::RecError;
use recstack_core::health::{AggregatedHealth, ComponentHealth};
use recstack_core::models::{ItemRecord, TimeRange};
use recstack_core::Result;

use crate::source::DataSource;

/// Base scores assigned per recall strategy
const POPULAR_BASE_SCORE: f64 = 0.8;
const SIMILAR_USERS_BASE_SCORE: f64 = 0.7;
const RECENT_BEHAVIOR_BASE_SCORE: f64 = 0.6;
const CATEGORY_PREFERENCE_BASE_SCORE: f64 = 0.75;

/// Fetch limits per strategy
const PER_CATEGORY_POPULAR_LIMIT: usize = 10;
const GLOBAL_POPULAR_LIMIT: usize = 20;
const SIMILAR_USER_LIMIT: usize = 10;
const CATEGORY_PREFERENCE_LIMIT: usize = 5;

/// Behavior look-back windows in days
const SIMILAR_USERS_WINDOW_DAYS: i64 = 30;
const RECENT_BEHAVIOR_WINDOW_DAYS: i64 = 7;

/// Per-source health probe timeout
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Candidate retrieval strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallType {
    /// Popular items in the user's preferred categories, else global top-N
    Popular,
    /// Recent items of the most similar users
    SimilarUsers,
    /// The user's own recent interactions
    RecentBehavior,
    /// Top popular items per preferred category
    CategoryPreference,
}

impl RecallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecallType::Popular => "popular",
            RecallType::SimilarUsers => "similar_users",
            RecallType::RecentBehavior => "recent_behavior",
            RecallType::CategoryPreference => "category_preference",
        }
    }
}

/// Raw candidate set produced by one (source, strategy) execution
#[derive(Debug, Clone)]
pub struct RecallResult {
    pub strategy: RecallType,
    pub items: Vec<ItemRecord>,
    /// Source-level confidence attached to every item in the set
    pub score: f64,
    pub generated_at: DateTime<Utc>,
}

impl RecallResult {
    fn new(strategy: RecallType, items: Vec<ItemRecord>, score: f64) -> Self {
        Self {
            strategy,
            items,
            score,
            generated_at: Utc::now(),
        }
    }
}

/// A pooled candidate with provenance
///
/// Provenance always holds at least the first contributing source; its order
/// follows worker completion and is therefore not deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedCandidate {
    pub item: ItemRecord,
    /// Highest source-level score seen across contributing sources
    pub score: f64,
    /// Names of every source that produced this item
    pub sources: Vec<String>,
}

/// Recall coordination configuration
///
/// # Environment Variables
///
/// - `RECSTACK_RECALL_SOURCE_DEADLINE_SECS` (optional, default 5)
#[derive(Debug, Clone)]
pub struct RecallConfig {
    /// Hard per-source deadline; a hung source is dropped, never awaited
    /// indefinitely
    pub source_deadline: Duration,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            source_deadline: Duration::from_secs(5),
        }
    }
}

impl ConfigLoader for RecallConfig {
    fn from_env() -> Result<Self> {
        let deadline_secs = parse_env_var("RECSTACK_RECALL_SOURCE_DEADLINE_SECS", 5u64)?;
        Ok(Self {
            source_deadline: Duration::from_secs(deadline_secs),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.source_deadline.is_zero() {
            return Err(RecError::configuration(
                "source_deadline must be greater than 0",
                "RECSTACK_RECALL_SOURCE_DEADLINE_SECS",
            ));
        }
        Ok(())
    }
}

/// Coordinates parallel recall across independent data sources
pub struct RecallCoordinator {
    sources: Vec<Arc<dyn DataSource>>,
    config: RecallConfig,
}

impl RecallCoordinator {
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        Self::with_config(sources, RecallConfig::default())
    }

    pub fn with_config(sources: Vec<Arc<dyn DataSource>>, config: RecallConfig) -> Self {
        Self { sources, config }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Gather and merge candidates from every source in parallel
    ///
    /// Waits for all workers (each bounded by the configured deadline)
    /// before merging. Partial results win over total failure; an error is
    /// returned only when sources exist and every one of them failed.
    pub async fn parallel_recall(
        &self,
        user_id: &str,
        recall_types: &[RecallType],
    ) -> Result<Vec<MergedCandidate>> {
        if user_id.is_empty() {
            return Err(RecError::invalid_input("must not be empty", "user_id"));
        }
        if recall_types.is_empty() {
            return Err(RecError::invalid_input(
                "at least one recall type is required",
                "recall_types",
            ));
        }

        let request_id = Uuid::new_v4();
        info!(
            %request_id,
            user_id,
            recall_types = ?recall_types,
            source_count = self.sources.len(),
            "starting parallel recall"
        );

        let mut tasks = JoinSet::new();
        for source in &self.sources {
            let source = Arc::clone(source);
            let user = user_id.to_string();
            let types = recall_types.to_vec();
            let deadline = self.config.source_deadline;

            tasks.spawn(async move {
                let name = source.name().to_string();
                let outcome = match timeout(deadline, execute_recall(source.as_ref(), &user, &types)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(RecError::source_failure(
                        name.clone(),
                        format!("recall timed out after {deadline:?}"),
                    )),
                };
                (name, outcome)
            });
        }

        let mut results: Vec<(String, RecallResult)> = Vec::new();
        let mut failures: HashMap<String, String> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(result))) => {
                    info!(
                        %request_id,
                        source = %name,
                        strategy = result.strategy.as_str(),
                        items = result.items.len(),
                        "recall source finished"
                    );
                    results.push((name, result));
                }
                Ok((name, Err(e))) => {
                    warn!(%request_id, source = %name, error = %e, "recall source failed");
                    failures.insert(name, e.to_string());
                }
                Err(e) => {
                    warn!(%request_id, error = %e, "recall worker aborted");
                    failures.insert(format!("worker-{}", failures.len()), e.to_string());
                }
            }
        }

        if results.is_empty() && !failures.is_empty() {
            return Err(RecError::aggregate("parallel_recall", failures));
        }

        let merged = merge_results(results);
        info!(
            %request_id,
            candidates = merged.len(),
            failed_sources = failures.len(),
            "parallel recall finished"
        );
        Ok(merged)
    }

    /// Probe every source in parallel and aggregate the results
    pub async fn health_check(&self) -> AggregatedHealth {
        let start = Instant::now();

        let checks = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let check_start = Instant::now();
                let name = source.name().to_string();
                match timeout(HEALTH_CHECK_TIMEOUT, source.health_check()).await {
                    Ok(Ok(())) => ComponentHealth::healthy(
                        name,
                        check_start.elapsed().as_millis() as u64,
                        false,
                    ),
                    Ok(Err(e)) => ComponentHealth::unhealthy(
                        name,
                        check_start.elapsed().as_millis() as u64,
                        false,
                        e.to_string(),
                    ),
                    Err(_) => ComponentHealth::unhealthy(
                        name,
                        HEALTH_CHECK_TIMEOUT.as_millis() as u64,
                        false,
                        format!("health check timed out after {HEALTH_CHECK_TIMEOUT:?}"),
                    ),
                }
            }
        });

        let components = futures::future::join_all(checks).await;
        AggregatedHealth::from_components(components, start.elapsed().as_millis() as u64)
    }

    /// Close every source, attempting all of them even after failures
    pub async fn close(&self) -> Result<()> {
        let mut failures: HashMap<String, String> = HashMap::new();
        for source in &self.sources {
            if let Err(e) = source.close().await {
                error!(source = source.name(), error = %e, "failed to close data source");
                failures.insert(source.name().to_string(), e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RecError::aggregate("close", failures))
        }
    }
}

/// Run the first requested recall type against one source
async fn execute_recall(
    source: &dyn DataSource,
    user_id: &str,
    recall_types: &[RecallType],
) -> Result<RecallResult> {
    // Short-circuit: the remaining requested types are intentionally ignored
    let Some(recall_type) = recall_types.first() else {
        return Err(RecError::invalid_input(
            "no recall strategy requested",
            "recall_types",
        ));
    };

    match recall_type {
        RecallType::Popular => recall_popular(source, user_id).await,
        RecallType::SimilarUsers => recall_similar_users(source, user_id).await,
        RecallType::RecentBehavior => recall_recent_behavior(source, user_id).await,
        RecallType::CategoryPreference => recall_category_preference(source, user_id).await,
    }
}

/// Popular items in the user's preferred categories, else global top-N
async fn recall_popular(source: &dyn DataSource, user_id: &str) -> Result<RecallResult> {
    let user = source.user_data(user_id).await?;

    let items = if user.preferred_categories.is_empty() {
        source.popular_items("", GLOBAL_POPULAR_LIMIT).await?
    } else {
        let mut items = Vec::new();
        for category in &user.preferred_categories {
            match source.popular_items(category, PER_CATEGORY_POPULAR_LIMIT).await {
                Ok(popular) => items.extend(popular),
                Err(e) => {
                    warn!(source = source.name(), category = %category, error = %e, "popular item fetch failed");
                }
            }
        }
        items
    };

    Ok(RecallResult::new(RecallType::Popular, items, POPULAR_BASE_SCORE))
}

/// Recent items of the user's nearest neighbors
async fn recall_similar_users(source: &dyn DataSource, user_id: &str) -> Result<RecallResult> {
    let similar = source.similar_users(user_id, SIMILAR_USER_LIMIT).await?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();
    for neighbor in &similar {
        let behaviors = match source
            .user_behavior(&neighbor.user_id, TimeRange::last_days(SIMILAR_USERS_WINDOW_DAYS))
            .await
        {
            Ok(behaviors) => behaviors,
            Err(e) => {
                warn!(
                    source = source.name(),
                    neighbor = %neighbor.user_id,
                    error = %e,
                    "neighbor behavior fetch failed"
                );
                continue;
            }
        };

        let item_ids: Vec<String> = behaviors
            .into_iter()
            .filter(|b| seen.insert(b.item_id.clone()))
            .map(|b| b.item_id)
            .collect();
        if item_ids.is_empty() {
            continue;
        }

        match source.item_data(&item_ids).await {
            Ok(neighbor_items) => items.extend(neighbor_items),
            Err(e) => {
                warn!(
                    source = source.name(),
                    neighbor = %neighbor.user_id,
                    error = %e,
                    "neighbor item fetch failed"
                );
            }
        }
    }

    Ok(RecallResult::new(
        RecallType::SimilarUsers,
        items,
        SIMILAR_USERS_BASE_SCORE,
    ))
}

/// The user's own last-week interactions
async fn recall_recent_behavior(source: &dyn DataSource, user_id: &str) -> Result<RecallResult> {
    let behaviors = source
        .user_behavior(user_id, TimeRange::last_days(RECENT_BEHAVIOR_WINDOW_DAYS))
        .await?;

    if behaviors.is_empty() {
        return Ok(RecallResult::new(RecallType::RecentBehavior, Vec::new(), 0.0));
    }

    let mut seen: HashSet<String> = HashSet::new();
    let item_ids: Vec<String> = behaviors
        .into_iter()
        .filter(|b| seen.insert(b.item_id.clone()))
        .map(|b| b.item_id)
        .collect();

    let items = source.item_data(&item_ids).await?;
    Ok(RecallResult::new(
        RecallType::RecentBehavior,
        items,
        RECENT_BEHAVIOR_BASE_SCORE,
    ))
}

/// Top popular items for each preferred category
async fn recall_category_preference(source: &dyn DataSource, user_id: &str) -> Result<RecallResult> {
    let user = source.user_data(user_id).await?;

    if user.preferred_categories.is_empty() {
        return Ok(RecallResult::new(
            RecallType::CategoryPreference,
            Vec::new(),
            0.0,
        ));
    }

    let mut items = Vec::new();
    for category in &user.preferred_categories {
        match source
            .popular_items(category, CATEGORY_PREFERENCE_LIMIT)
            .await
        {
            Ok(popular) => items.extend(popular),
            Err(e) => {
                warn!(source = source.name(), category = %category, error = %e, "category fetch failed");
            }
        }
    }

    Ok(RecallResult::new(
        RecallType::CategoryPreference,
        items,
        CATEGORY_PREFERENCE_BASE_SCORE,
    ))
}

/// Merge per-source results into one pool keyed by item id
///
/// On collision the highest source score wins and the new source is appended
/// to the candidate's provenance.
fn merge_results(results: Vec<(String, RecallResult)>) -> Vec<MergedCandidate> {
    let mut pool: HashMap<String, MergedCandidate> = HashMap::new();

    for (source_name, result) in results {
        for item in result.items {
            match pool.get_mut(&item.item_id) {
                Some(candidate) => {
                    if result.score > candidate.score {
                        candidate.score = result.score;
                    }
                    if !candidate.sources.contains(&source_name) {
                        candidate.sources.push(source_name.clone());
                    }
                }
                None => {
                    pool.insert(
                        item.item_id.clone(),
                        MergedCandidate {
                            item,
                            score: result.score,
                            sources: vec![source_name.clone()],
                        },
                    );
                }
            }
        }
    }

    let mut merged: Vec<MergedCandidate> = pool.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item.item_id.cmp(&b.item.item_id))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_max_score_and_both_sources() {
        let item = ItemRecord::new("item_001", "technology");
        let results = vec![
            (
                "source_a".to_string(),
                RecallResult::new(RecallType::RecentBehavior, vec![item.clone()], 0.6),
            ),
            (
                "source_b".to_string(),
                RecallResult::new(RecallType::Popular, vec![item], 0.8),
            ),
        ];

        let merged = merge_results(results);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].score, 0.8);
        // Provenance order depends on completion order; assert membership only
        assert!(merged[0].sources.contains(&"source_a".to_string()));
        assert!(merged[0].sources.contains(&"source_b".to_string()));
    }

    #[test]
    fn test_merge_lower_score_does_not_overwrite() {
        let item = ItemRecord::new("item_001", "technology");
        let results = vec![
            (
                "source_a".to_string(),
                RecallResult::new(RecallType::Popular, vec![item.clone()], 0.8),
            ),
            (
                "source_b".to_string(),
                RecallResult::new(RecallType::RecentBehavior, vec![item], 0.6),
            ),
        ];

        let merged = merge_results(results);
        assert_eq!(merged[0].score, 0.8);
        assert_eq!(merged[0].sources.len(), 2);
    }

    #[test]
    fn test_merge_same_source_listed_once() {
        let results = vec![(
            "source_a".to_string(),
            RecallResult::new(
                RecallType::Popular,
                vec![
                    ItemRecord::new("item_001", "technology"),
                    ItemRecord::new("item_001", "technology"),
                ],
                0.8,
            ),
        )];

        let merged = merge_results(results);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].sources, vec!["source_a".to_string()]);
    }

    #[test]
    fn test_merge_orders_pool_by_score() {
        let results = vec![
            (
                "source_a".to_string(),
                RecallResult::new(
                    RecallType::RecentBehavior,
                    vec![ItemRecord::new("item_low", "a")],
                    0.6,
                ),
            ),
            (
                "source_b".to_string(),
                RecallResult::new(
                    RecallType::Popular,
                    vec![ItemRecord::new("item_high", "b")],
                    0.8,
                ),
            ),
        ];

        let merged = merge_results(results);
        assert_eq!(merged[0].item.item_id, "item_high");
        assert_eq!(merged[1].item.item_id, "item_low");
    }

    #[test]
    fn test_recall_type_tags() {
        assert_eq!(RecallType::Popular.as_str(), "popular");
        assert_eq!(RecallType::SimilarUsers.as_str(), "similar_users");
        assert_eq!(RecallType::RecentBehavior.as_str(), "recent_behavior");
        assert_eq!(RecallType::CategoryPreference.as_str(), "category_preference");
    }

    #[tokio::test]
    async fn test_parallel_recall_rejects_empty_type_list() {
        let coordinator = RecallCoordinator::new(Vec::new());
        let err = coordinator.parallel_recall("user_123", &[]).await.unwrap_err();
        assert!(matches!(err, RecError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_parallel_recall_without_sources_is_empty() {
        let coordinator = RecallCoordinator::new(Vec::new());
        let pool = coordinator
            .parallel_recall("user_123", &[RecallType::Popular])
            .await
            .unwrap();
        assert!(pool.is_empty());
    }
}

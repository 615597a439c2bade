//! Minimal end-to-end walkthrough: seed a data source, feed ratings, and
//! produce explained recommendations.
//!
//! Run with: cargo run --example quickstart -p recstack-engine

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use recstack_core::models::{BehaviorKind, BehaviorRecord, ItemRecord, UserRecord};
use recstack_core::observability::{init_logging, LogConfig};
use recstack_engine::{MemoryDataSource, RecallCoordinator, Recommender};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LogConfig::default()).ok();

    // A data source with a small catalog and one known user
    let source = MemoryDataSource::new("memory");
    source.insert_user(
        UserRecord::new("user_123")
            .with_categories(vec!["technology".to_string(), "sports".to_string()]),
    );
    for (id, category, keyword, popularity) in [
        ("item_001", "technology", "smartphone", 0.95),
        ("item_002", "sports", "running", 0.87),
        ("item_003", "technology", "laptop", 0.82),
    ] {
        source.insert_item(
            ItemRecord::new(id, category)
                .with_keywords(vec![keyword.to_string()])
                .with_feature("quality", 0.9)
                .with_popularity(popularity),
        );
    }
    source.insert_behavior(BehaviorRecord {
        user_id: "user_123".to_string(),
        item_id: "item_001".to_string(),
        behavior: BehaviorKind::View,
        value: 1.0,
        timestamp: Utc::now(),
    });

    // Assemble the engine and feed some ratings
    let engine = Recommender::with_defaults()
        .with_coordinator(RecallCoordinator::new(vec![Arc::new(source)]));

    for (id, category, keyword) in [
        ("item_001", "technology", "smartphone"),
        ("item_002", "sports", "running"),
        ("item_003", "technology", "laptop"),
    ] {
        engine.register_item(
            &ItemRecord::new(id, category)
                .with_keywords(vec![keyword.to_string()])
                .with_feature("quality", 0.9),
        )?;
    }
    engine.record_rating("user_123", "item_001", 5.0)?;
    engine.record_rating("user_456", "item_001", 4.0)?;
    engine.record_rating("user_456", "item_002", 3.0)?;

    // Produce and print recommendations
    let recommendations = engine.produce_recommendations("user_123", 5).await?;
    for rec in &recommendations {
        println!(
            "{} score={:.3} confidence={:.1} [{}] via {}",
            rec.item_id, rec.score, rec.confidence, rec.reason, rec.algorithm
        );
    }

    let health = engine.health_check().await;
    println!("source health: {:?}", health.status);

    engine.close().await?;
    Ok(())
}

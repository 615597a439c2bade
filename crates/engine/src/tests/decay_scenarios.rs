//! Profile decay scenarios across a realistic rating session

use std::collections::HashMap;

use chrono::{Duration, Utc};

use crate::content::{ContentConfig, ContentProfiler, ItemFeatures};

fn item(id: &str, category: &str, keywords: &[&str], features: &[(&str, f64)]) -> ItemFeatures {
    ItemFeatures {
        item_id: id.to_string(),
        category: category.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        features: features
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect(),
    }
}

fn catalog() -> Vec<ItemFeatures> {
    vec![
        item(
            "item_001",
            "technology",
            &["smartphone", "apple"],
            &[("performance", 0.9), ("price", 0.6)],
        ),
        item(
            "item_002",
            "sports",
            &["running", "nike"],
            &[("comfort", 0.8), ("price", 0.4)],
        ),
        item(
            "item_003",
            "technology",
            &["laptop", "apple"],
            &[("performance", 0.95), ("price", 0.9)],
        ),
    ]
}

#[test]
fn test_three_rating_session_with_zero_elapsed_days() {
    let profiler = ContentProfiler::with_defaults();
    for entry in catalog() {
        profiler.register_item(entry).unwrap();
    }

    // All three ratings land at the same instant: no decay applies and the
    // profile holds the raw learning-rate contributions.
    let now = Utc::now();
    profiler
        .ingest_behavior_at("user_123", "item_001", 5.0, now)
        .unwrap();
    profiler
        .ingest_behavior_at("user_123", "item_002", 3.0, now)
        .unwrap();
    profiler
        .ingest_behavior_at("user_123", "item_003", 1.0, now)
        .unwrap();

    let profile = profiler.profile("user_123").unwrap();
    let lr = 0.01;

    let expected_features: HashMap<&str, f64> = HashMap::from([
        ("performance", lr * 5.0 * 0.9 + lr * 1.0 * 0.95),
        ("price", lr * 5.0 * 0.6 + lr * 3.0 * 0.4 + lr * 1.0 * 0.9),
        ("comfort", lr * 3.0 * 0.8),
    ]);
    for (feature, expected) in expected_features {
        let actual = profile.feature_vector[feature];
        assert!(
            (actual - expected).abs() < 1e-9,
            "feature {feature}: expected {expected}, got {actual}"
        );
    }

    // Keyword and category weights accumulate learning_rate * rating
    assert!((profile.preference_weights["smartphone"] - lr * 5.0).abs() < 1e-9);
    assert!((profile.preference_weights["apple"] - (lr * 5.0 + lr * 1.0)).abs() < 1e-9);
    assert!((profile.preference_weights["running"] - lr * 3.0).abs() < 1e-9);
    assert!(
        (profile.preference_weights["technology"] - (lr * 5.0 + lr * 1.0)).abs() < 1e-9
    );
    assert!((profile.preference_weights["sports"] - lr * 3.0).abs() < 1e-9);
}

#[test]
fn test_decay_shrinks_old_signal_monotonically() {
    let profiler = ContentProfiler::with_defaults();
    for entry in catalog() {
        profiler.register_item(entry).unwrap();
    }

    let start = Utc::now() - Duration::days(60);
    profiler
        .ingest_behavior_at("user_123", "item_001", 5.0, start)
        .unwrap();
    let fresh = profiler.profile("user_123").unwrap().preference_weights["smartphone"];

    // A later unrelated observation decays the old keyword weight
    profiler
        .ingest_behavior_at("user_123", "item_002", 3.0, start + Duration::days(20))
        .unwrap();
    let after_20 = profiler.profile("user_123").unwrap().preference_weights["smartphone"];
    assert!(after_20 < fresh);
    assert!((after_20 - fresh * 0.95f64.powf(20.0)).abs() < 1e-9);

    // Still older signal keeps shrinking with the next update
    profiler
        .ingest_behavior_at("user_123", "item_002", 3.0, start + Duration::days(40))
        .unwrap();
    let after_40 = profiler.profile("user_123").unwrap().preference_weights["smartphone"];
    assert!(after_40 < after_20);
}

#[test]
fn test_decayed_profile_still_prefers_learned_category() {
    let profiler = ContentProfiler::new(ContentConfig {
        similarity_threshold: 0.0,
        ..ContentConfig::default()
    });
    for entry in catalog() {
        profiler.register_item(entry).unwrap();
    }

    let start = Utc::now() - Duration::days(90);
    profiler
        .ingest_behavior_at("user_123", "item_001", 5.0, start)
        .unwrap();

    // Months later the technology affinity has decayed but not flipped
    let tech_score = profiler.score("user_123", "item_003");
    let sports_score = profiler.score("user_123", "item_002");
    assert!(tech_score > sports_score);
}

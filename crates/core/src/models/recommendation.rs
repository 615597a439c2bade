//! Final recommendation entity exposed to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ranked, explained recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: String,
    /// Final score; additive bonuses can push it above 1.0
    pub score: f64,
    /// Locale-agnostic reason tags joined in a fixed order
    pub reason: String,
    /// Tag of the algorithm that produced the score
    pub algorithm: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_serde_round_trip() {
        let rec = Recommendation {
            item_id: "item_001".to_string(),
            score: 1.12,
            reason: "history-based+trending".to_string(),
            algorithm: "hybrid_filtering".to_string(),
            confidence: 0.9,
            created_at: Utc::now(),
            category: "technology".to_string(),
        };

        let json = serde_json::to_string(&rec).unwrap();
        let back: Recommendation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.item_id, "item_001");
        assert!(back.score > 1.0);
        assert_eq!(back.algorithm, "hybrid_filtering");
    }
}

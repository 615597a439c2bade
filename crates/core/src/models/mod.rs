//! Domain models for items, users, behaviors, and recommendations

pub mod behavior;
pub mod item;
pub mod recommendation;
pub mod user;

pub use behavior::{BehaviorKind, BehaviorRecord, TimeRange};
pub use item::ItemRecord;
pub use recommendation::Recommendation;
pub use user::{SimilarUserRecord, UserRecord};

use serde::{Deserialize, Serialize};

/// A record flowing into the engine from a data source
///
/// Closed set of record kinds; consumers dispatch with exhaustive matching so
/// adding a kind forces every call site to handle it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Behavior(BehaviorRecord),
    Item(ItemRecord),
    User(UserRecord),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_record_serde_round_trip() {
        let record = Record::Behavior(BehaviorRecord {
            user_id: "user_123".to_string(),
            item_id: "item_001".to_string(),
            behavior: BehaviorKind::Rate,
            value: 4.5,
            timestamp: Utc::now(),
        });

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"kind\":\"behavior\""));

        let back: Record = serde_json::from_str(&json).unwrap();
        match back {
            Record::Behavior(b) => assert_eq!(b.item_id, "item_001"),
            _ => panic!("expected behavior record"),
        }
    }
}

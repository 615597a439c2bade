//! User behavior records and time ranges

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of interaction a user had with an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    View,
    Click,
    Rate,
    Purchase,
    Like,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::View => "view",
            BehaviorKind::Click => "click",
            BehaviorKind::Rate => "rate",
            BehaviorKind::Purchase => "purchase",
            BehaviorKind::Like => "like",
        }
    }
}

/// A single user-item interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub user_id: String,
    pub item_id: String,
    pub behavior: BehaviorKind,
    /// Interaction strength (a rating, a purchase amount, or 1.0)
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Inclusive time window for behavior queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window covering the last `days` days up to now
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Whether a timestamp falls inside the window (inclusive bounds)
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

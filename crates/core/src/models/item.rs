//! Item catalog records

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An item as delivered by a data source
///
/// Feature values are plain named weights; free-form attributes that do not
/// participate in scoring live in `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: String,
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Keywords describing the item; order-irrelevant
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Named feature weights used for content scoring
    #[serde(default)]
    pub features: HashMap<String, f64>,
    /// Non-scoring attributes (release date, storage tier, ...)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Source-assigned popularity in [0, 1]
    #[serde(default)]
    pub popularity: f64,
}

impl ItemRecord {
    /// Create a minimal record with just an id and category
    pub fn new(item_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            category: category.into(),
            title: String::new(),
            description: String::new(),
            keywords: Vec::new(),
            features: HashMap::new(),
            metadata: HashMap::new(),
            popularity: 0.0,
        }
    }

    /// Builder-style popularity setter
    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }

    /// Builder-style keyword setter
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Builder-style feature setter
    pub fn with_feature(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.features.insert(name.into(), weight);
        self
    }
}

//! User records

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A user as delivered by a data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    /// Categories the user has explicitly or implicitly preferred
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    /// Free-form demographic and stat attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            preferred_categories: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Builder-style preferred category setter
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.preferred_categories = categories;
        self
    }
}

/// A user together with a similarity score against a reference user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarUserRecord {
    pub user_id: String,
    pub similarity: f64,
}

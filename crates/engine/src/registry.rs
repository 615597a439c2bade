//! Static data-source registry
//!
//! Maps a source kind tag to a constructor function, resolved in process at
//! startup. Extensions register additional creators before building their
//! coordinator; there is no runtime code loading involved.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::info;

use recstack_core::error::RecError;
use recstack_core::Result;

use crate::recall::{RecallConfig, RecallCoordinator};
use crate::source::{DataSource, MemoryDataSource};

/// Known data-source kinds
///
/// Only `Memory` ships with a built-in creator; the other kinds build once a
/// creator has been registered for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Memory,
    Redis,
    Postgres,
    Elasticsearch,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Memory => "memory",
            SourceKind::Redis => "redis",
            SourceKind::Postgres => "postgres",
            SourceKind::Elasticsearch => "elasticsearch",
        }
    }
}

/// Declarative description of one data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Unique name used for provenance and error reporting
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl SourceConfig {
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Memory,
            name: name.into(),
            address: None,
            options: HashMap::new(),
        }
    }
}

/// Constructor function for one source kind
pub type SourceCreator = fn(&SourceConfig) -> Result<Arc<dyn DataSource>>;

fn create_memory_source(config: &SourceConfig) -> Result<Arc<dyn DataSource>> {
    Ok(Arc::new(MemoryDataSource::new(config.name.clone())) as Arc<dyn DataSource>)
}

static CREATORS: Lazy<RwLock<HashMap<SourceKind, SourceCreator>>> = Lazy::new(|| {
    let mut creators: HashMap<SourceKind, SourceCreator> = HashMap::new();
    creators.insert(SourceKind::Memory, create_memory_source);
    RwLock::new(creators)
});

/// Register a creator for a source kind, replacing any existing one
pub fn register_creator(kind: SourceKind, creator: SourceCreator) {
    CREATORS
        .write()
        .expect("source registry lock poisoned")
        .insert(kind, creator);
    info!(kind = kind.as_str(), "registered data source creator");
}

/// Build a single data source from its config
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn DataSource>> {
    if config.name.is_empty() {
        return Err(RecError::invalid_input("must not be empty", "source.name"));
    }

    let creator = {
        let creators = CREATORS.read().expect("source registry lock poisoned");
        creators.get(&config.kind).copied()
    };

    let creator = creator.ok_or_else(|| {
        RecError::configuration(
            format!(
                "no creator registered for source kind '{}'",
                config.kind.as_str()
            ),
            "source.kind",
        )
    })?;

    let source = creator(config)?;
    info!(kind = config.kind.as_str(), name = %config.name, "built data source");
    Ok(source)
}

/// Build every configured source and wrap them in a coordinator
pub fn build_coordinator(
    configs: &[SourceConfig],
    recall_config: RecallConfig,
) -> Result<RecallCoordinator> {
    let sources = configs
        .iter()
        .map(build_source)
        .collect::<Result<Vec<_>>>()?;
    Ok(RecallCoordinator::with_config(sources, recall_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_source() {
        let source = build_source(&SourceConfig::memory("primary")).unwrap();
        assert_eq!(source.name(), "primary");
    }

    #[test]
    fn test_build_rejects_empty_name() {
        let config = SourceConfig {
            kind: SourceKind::Memory,
            name: String::new(),
            address: None,
            options: HashMap::new(),
        };
        assert!(build_source(&config).is_err());
    }

    #[test]
    fn test_unregistered_kind_is_configuration_error() {
        let config = SourceConfig {
            kind: SourceKind::Postgres,
            name: "pg".to_string(),
            address: Some("localhost:5432".to_string()),
            options: HashMap::new(),
        };
        let err = build_source(&config).err().unwrap();
        assert!(matches!(err, RecError::ConfigurationError { .. }));
    }

    #[test]
    fn test_register_custom_creator() {
        register_creator(SourceKind::Elasticsearch, |config| {
            // Stand-in backed by memory; real integrations wire their client
            Ok(Arc::new(MemoryDataSource::new(config.name.clone())) as Arc<dyn DataSource>)
        });

        let config = SourceConfig {
            kind: SourceKind::Elasticsearch,
            name: "es".to_string(),
            address: None,
            options: HashMap::new(),
        };
        let source = build_source(&config).unwrap();
        assert_eq!(source.name(), "es");
    }

    #[test]
    fn test_build_coordinator_counts_sources() {
        let coordinator = build_coordinator(
            &[SourceConfig::memory("a"), SourceConfig::memory("b")],
            RecallConfig::default(),
        )
        .unwrap();
        assert_eq!(coordinator.source_count(), 2);
    }
}

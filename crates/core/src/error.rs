//! Error types for Recstack
//!
//! A single taxonomy covers the whole engine. Lookup-style accessors surface
//! `NotFound`; recommend-style calls return empty results instead. Failures of
//! individual data sources are isolated as `SourceFailure` and only escalate
//! to `AggregateFailure` when an entire fan-out produced nothing.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// The kind of entity a lookup failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Item,
    Profile,
    Source,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::User => "user",
            EntityKind::Item => "item",
            EntityKind::Profile => "profile",
            EntityKind::Source => "source",
        };
        f.write_str(name)
    }
}

/// Recstack error taxonomy
#[derive(Debug, Error)]
pub enum RecError {
    /// An entity referenced by id does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Caller-supplied input is malformed (empty id, negative rating, ...)
    #[error("invalid input for '{field}': {message}")]
    InvalidInput { message: String, field: String },

    /// A single data source faulted; isolated from its siblings
    #[error("data source '{source_name}' failed: {message}")]
    SourceFailure {
        source_name: String,
        message: String,
    },

    /// One or more sources failed during a fan-out operation
    #[error("{operation}: {} source(s) failed", .failures.len())]
    AggregateFailure {
        operation: String,
        /// Per-source error messages, keyed by source name
        failures: HashMap<String, String>,
    },

    /// Configuration could not be loaded or validated
    #[error("configuration error: {message}")]
    ConfigurationError {
        message: String,
        key: Option<String>,
    },
}

impl RecError {
    /// Create a `NotFound` error
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create an `InvalidInput` error for a named field
    pub fn invalid_input(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: field.into(),
        }
    }

    /// Create a `SourceFailure` error
    pub fn source_failure(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFailure {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an `AggregateFailure` from a per-source error map
    pub fn aggregate(operation: impl Into<String>, failures: HashMap<String, String>) -> Self {
        Self::AggregateFailure {
            operation: operation.into(),
            failures,
        }
    }

    /// Create a `ConfigurationError` tied to a configuration key
    pub fn configuration(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// True when the error represents a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecError::NotFound { .. })
    }
}

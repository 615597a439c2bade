//! Health report types for data-source aggregation
//!
//! The recall layer checks every registered data source in parallel and folds
//! the per-source results into one [`AggregatedHealth`] report. Components are
//! classified critical or non-critical so a single degraded source does not
//! mark the whole engine unhealthy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All components operational
    Healthy,
    /// Some non-critical components failing
    Degraded,
    /// Critical components failing, or every component down
    Unhealthy,
}

impl HealthStatus {
    /// Check if the status still allows serving recommendations
    pub fn is_ready(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name (a data source name)
    pub name: String,
    /// Health status
    pub status: HealthStatus,
    /// Check latency in milliseconds
    pub latency_ms: u64,
    /// Optional status message or error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Whether this component is critical for engine operation
    pub critical: bool,
}

impl ComponentHealth {
    /// Create a healthy component result
    pub fn healthy(name: impl Into<String>, latency_ms: u64, critical: bool) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            latency_ms,
            message: None,
            critical,
        }
    }

    /// Create an unhealthy component result
    pub fn unhealthy(
        name: impl Into<String>,
        latency_ms: u64,
        critical: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            critical,
        }
    }
}

/// Aggregated health status across all checked components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedHealth {
    /// Overall status
    pub status: HealthStatus,
    /// Individual component health checks
    pub components: Vec<ComponentHealth>,
    /// Engine version
    pub version: String,
    /// Timestamp of the health check
    pub timestamp: DateTime<Utc>,
    /// Total time to complete all checks (ms)
    pub total_latency_ms: u64,
}

impl AggregatedHealth {
    /// Determine overall status from component health checks
    ///
    /// A failing critical component, or every component failing at once,
    /// makes the aggregate unhealthy; any other failure degrades it.
    pub fn from_components(components: Vec<ComponentHealth>, total_latency_ms: u64) -> Self {
        let all_down = !components.is_empty()
            && components
                .iter()
                .all(|c| c.status == HealthStatus::Unhealthy);
        let status = if all_down
            || components
                .iter()
                .any(|c| c.critical && c.status == HealthStatus::Unhealthy)
        {
            HealthStatus::Unhealthy
        } else if components.iter().any(|c| c.status != HealthStatus::Healthy) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            components,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            total_latency_ms,
        }
    }

    /// Check if the engine can keep serving with the current source set
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }
}

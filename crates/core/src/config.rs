//! Shared configuration loading for Recstack components
//!
//! Every tunable component carries a config struct with sensible defaults and
//! a [`ConfigLoader`] implementation. Environment variables use the
//! `RECSTACK_` prefix. The override hierarchy is: defaults < .env < process
//! environment.
//!
//! # Example
//!
//! ```no_run
//! use recstack_core::config::{load_dotenv, ConfigLoader};
//! use recstack_core::observability::LogConfig;
//!
//! # fn example() -> Result<(), recstack_core::RecError> {
//! load_dotenv();
//! let log_config = LogConfig::from_env()?;
//! log_config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::RecError;

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration
/// from environment variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// Reads variables with the `RECSTACK_` prefix and constructs an instance
    /// with defaults for missing optional values.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a variable cannot be parsed.
    fn from_env() -> Result<Self, RecError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if any validation check fails.
    fn validate(&self) -> Result<(), RecError>;
}

/// Parse an environment variable with a fallback default
///
/// # Errors
///
/// Returns a `ConfigurationError` if the variable is set but cannot be
/// parsed into `T`.
pub fn parse_env_var<T>(key: &str, default: T) -> Result<T, RecError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| RecError::configuration(format!("failed to parse {key}: {e}"), key))
        })
        .unwrap_or(Ok(default))
}

/// Load a .env file if present
///
/// Convenience wrapper around dotenvy that stays silent when no .env file
/// exists.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }
}

/// Validate that a weight lies in `[0, 1]`
pub fn validate_unit_weight(value: f64, key: &str) -> Result<(), RecError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RecError::configuration(
            format!("{key} must be within [0, 1], got {value}"),
            key,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_parse_env_var_with_default() {
        let value: u32 = parse_env_var("RECSTACK_TEST_MISSING_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_var_with_value() {
        env::set_var("RECSTACK_TEST_PARSE_VAR", "7");
        let value: u32 = parse_env_var("RECSTACK_TEST_PARSE_VAR", 42).unwrap();
        assert_eq!(value, 7);
        env::remove_var("RECSTACK_TEST_PARSE_VAR");
    }

    #[test]
    fn test_parse_env_var_invalid_value() {
        env::set_var("RECSTACK_TEST_INVALID_VAR", "not-a-number");
        let result: Result<u32, _> = parse_env_var("RECSTACK_TEST_INVALID_VAR", 42);
        assert!(result.is_err());
        env::remove_var("RECSTACK_TEST_INVALID_VAR");
    }

    #[test]
    fn test_validate_unit_weight() {
        assert!(validate_unit_weight(0.0, "w").is_ok());
        assert!(validate_unit_weight(1.0, "w").is_ok());
        assert!(validate_unit_weight(-0.1, "w").is_err());
        assert!(validate_unit_weight(1.1, "w").is_err());
    }
}

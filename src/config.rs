//! Run configuration.
//!
//! A configuration is fixed for the whole run. Values are checked by
//! [`PregelConfig::validate`] before any buffer is allocated.

use serde::{Deserialize, Serialize};

use crate::error::{PregelError, Result};

/// Default superstep cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Default leaf size of fork-join bisection.
pub const DEFAULT_FORK_JOIN_THRESHOLD: usize = 1000;

/// Settings of one Pregel run.
///
/// ```rust
/// use pregel::PregelConfig;
///
/// let config = PregelConfig::builder()
///     .max_iterations(10)
///     .concurrency(4)
///     .use_fork_join(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_iterations, 10);
/// assert!(!config.is_asynchronous);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PregelConfig {
    /// Upper bound on the number of supersteps. Must be at least 1.
    pub max_iterations: usize,
    /// Worker threads used per superstep. Must be at least 1.
    pub concurrency: usize,
    /// Deliver messages through the asynchronous queue when no reducer is set.
    pub is_asynchronous: bool,
    /// Schedule with recursive fork-join bisection instead of fixed partitions.
    pub use_fork_join: bool,
    /// Largest vertex range a fork-join leaf processes without splitting.
    pub fork_join_threshold: usize,
}

impl Default for PregelConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            concurrency: num_cpus::get(),
            is_asynchronous: false,
            use_fork_join: false,
            fork_join_threshold: DEFAULT_FORK_JOIN_THRESHOLD,
        }
    }
}

impl PregelConfig {
    /// Starts from the defaults.
    pub fn builder() -> PregelConfigBuilder {
        PregelConfigBuilder::default()
    }

    /// Rejects values no run can start with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(PregelError::invalid_configuration(
                "max_iterations",
                "must be at least 1",
            ));
        }
        if self.concurrency == 0 {
            return Err(PregelError::invalid_configuration("concurrency", "must be at least 1"));
        }
        if self.fork_join_threshold == 0 {
            return Err(PregelError::invalid_configuration(
                "fork_join_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Builder for [`PregelConfig`].
#[derive(Debug, Clone, Default)]
pub struct PregelConfigBuilder {
    config: PregelConfig,
}

impl PregelConfigBuilder {
    /// Sets the superstep cap.
    #[must_use]
    pub fn max_iterations(mut self, value: usize) -> Self {
        self.config.max_iterations = value;
        self
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn concurrency(mut self, value: usize) -> Self {
        self.config.concurrency = value;
        self
    }

    /// Enables the asynchronous messenger.
    #[must_use]
    pub fn is_asynchronous(mut self, value: bool) -> Self {
        self.config.is_asynchronous = value;
        self
    }

    /// Enables fork-join scheduling.
    #[must_use]
    pub fn use_fork_join(mut self, value: bool) -> Self {
        self.config.use_fork_join = value;
        self
    }

    /// Sets the fork-join leaf size.
    #[must_use]
    pub fn fork_join_threshold(mut self, value: usize) -> Self {
        self.config.fork_join_threshold = value;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<PregelConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PregelConfig::default();
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(config.concurrency >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        for (builder, field) in [
            (PregelConfig::builder().max_iterations(0), "max_iterations"),
            (PregelConfig::builder().concurrency(0), "concurrency"),
            (PregelConfig::builder().fork_join_threshold(0), "fork_join_threshold"),
        ] {
            match builder.build() {
                Err(PregelError::InvalidConfiguration { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected configuration error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let config: PregelConfig =
            serde_json::from_str(r#"{"max_iterations": 3, "is_asynchronous": true}"#).unwrap();
        assert_eq!(config.max_iterations, 3);
        assert!(config.is_asynchronous);
        assert_eq!(config.fork_join_threshold, DEFAULT_FORK_JOIN_THRESHOLD);
        assert_eq!(config.concurrency, num_cpus::get());
    }
}

//! Scheduler configuration.
//!
//! Settings can be built in code with the `with_*` builder methods or loaded
//! from a TOML or JSON document. Every field has a default, so a document only
//! needs to name the settings it overrides.

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of workers in the pool.
pub const DEFAULT_WORKERS: usize = 4;

/// Default interval between scheduler ticks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default time a working assignment may wait for its workers.
pub const DEFAULT_JOB_DEADLINE_MS: u64 = 30_000;

/// Default time to wait for workers to stop on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 1_000;

/// Configuration for a [`Scheduler`](crate::project::scheduler::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Number of worker threads to spawn.
    pub workers: usize,
    /// Interval between ticks of the poll loop, in milliseconds.
    pub poll_interval_ms: u64,
    /// Deadline for a working assignment, in milliseconds. `None` waits forever.
    pub job_deadline_ms: Option<u64>,
    /// How long shutdown waits for each worker to stop, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            job_deadline_ms: Some(DEFAULT_JOB_DEADLINE_MS),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set or disable the per-assignment deadline.
    pub fn with_job_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.job_deadline_ms = deadline.map(|d| d.as_millis() as u64);
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Job deadline as a duration.
    pub fn job_deadline(&self) -> Option<Duration> {
        self.job_deadline_ms.map(Duration::from_millis)
    }

    /// Shutdown grace period as a duration.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Check that the configuration can drive a scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.job_deadline_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "job_deadline_ms must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a TOML document, filling missing fields with defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::new();
        assert_eq!(config.workers, 4);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.job_deadline(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::new()
            .with_workers(2)
            .with_poll_interval(Duration::from_millis(5))
            .with_job_deadline(None);

        assert_eq!(config.workers, 2);
        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(config.job_deadline(), None);
    }

    #[test]
    fn test_partial_toml_merges_over_defaults() {
        let config = SchedulerConfig::from_toml_str("workers = 8\n").unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.shutdown_grace_ms, DEFAULT_SHUTDOWN_GRACE_MS);
    }

    #[test]
    fn test_json_and_validation() {
        let config = SchedulerConfig::from_json_str(r#"{"poll_interval_ms": 10}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 10);

        let error = SchedulerConfig::from_json_str(r#"{"workers": 0}"#).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));

        let error = SchedulerConfig::from_toml_str("colour = 3").unwrap_err();
        assert!(matches!(error, ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "workers = 3\njob_deadline_ms = 500").unwrap();

        let config = SchedulerConfig::load(file.path()).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.job_deadline(), Some(Duration::from_millis(500)));
    }
}

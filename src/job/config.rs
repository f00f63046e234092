use crate::batch::MAX_BATCH_SIZE;
use crate::resilience::rate_limiter::DEFAULT_RATE_LIMIT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TARGET_COUNT: i64 = 1000;
pub const DEFAULT_BATCH_SIZE: usize = MAX_BATCH_SIZE;

/// Submission granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitMode {
    #[default]
    Single,
    Batch,
}

impl fmt::Display for UnitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitMode::Single => f.write_str("single"),
            UnitMode::Batch => f.write_str("batch"),
        }
    }
}

/// Parameters of one bulk job.
///
/// Counts are signed so that nonsense input (`-1`, `0`) can be accepted and
/// replaced by [`JobConfig::normalized`] instead of rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    /// How many records `run_generated` produces.
    pub target_count: i64,
    /// Launches allowed per `interval`.
    pub rate_per_interval: i64,
    pub interval: Duration,
    pub mode: UnitMode,
    pub batch_size: usize,
    pub max_inflight: Option<usize>,
    pub unit_timeout: Option<Duration>,
    /// Issuer stamped on the identities of created records.
    pub tenant: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl JobConfig {
    pub fn new() -> Self {
        Self {
            target_count: DEFAULT_TARGET_COUNT,
            rate_per_interval: DEFAULT_RATE_LIMIT as i64,
            interval: Duration::from_secs(1),
            mode: UnitMode::Single,
            batch_size: DEFAULT_BATCH_SIZE,
            max_inflight: None,
            unit_timeout: None,
            tenant: String::new(),
        }
    }

    pub fn with_target_count(mut self, n: i64) -> Self {
        self.target_count = n;
        self
    }

    pub fn with_rate_per_interval(mut self, n: i64) -> Self {
        self.rate_per_interval = n;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: UnitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_max_inflight(mut self, n: usize) -> Self {
        self.max_inflight = Some(n);
        self
    }

    pub fn with_unit_timeout(mut self, t: Duration) -> Self {
        self.unit_timeout = Some(t);
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Replace out-of-range values with their defaults, logging each
    /// substitution.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.target_count <= 0 {
            warn!(
                given = cfg.target_count,
                default = DEFAULT_TARGET_COUNT,
                "record count must be positive, using default"
            );
            cfg.target_count = DEFAULT_TARGET_COUNT;
        }
        if cfg.rate_per_interval <= 0 {
            warn!(
                given = cfg.rate_per_interval,
                default = DEFAULT_RATE_LIMIT,
                "rate limit must be positive, using default"
            );
            cfg.rate_per_interval = DEFAULT_RATE_LIMIT as i64;
        }
        if cfg.interval.is_zero() {
            warn!("rate interval must be non-zero, using one second");
            cfg.interval = Duration::from_secs(1);
        }
        if cfg.batch_size == 0 || cfg.batch_size > MAX_BATCH_SIZE {
            warn!(
                given = cfg.batch_size,
                default = DEFAULT_BATCH_SIZE,
                "batch size out of range, using default"
            );
            cfg.batch_size = DEFAULT_BATCH_SIZE;
        }
        if cfg.max_inflight == Some(0) {
            warn!("max in-flight of zero would stall the job, leaving it unbounded");
            cfg.max_inflight = None;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = JobConfig::new();
        assert_eq!(cfg.target_count, 1000);
        assert_eq!(cfg.rate_per_interval, 300);
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.mode, UnitMode::Single);
        assert_eq!(cfg.normalized(), cfg);
    }

    #[test]
    fn test_normalized_substitutes_defaults() {
        let cfg = JobConfig::new()
            .with_target_count(0)
            .with_rate_per_interval(-5)
            .with_batch_size(50)
            .with_max_inflight(0)
            .normalized();
        assert_eq!(cfg.target_count, DEFAULT_TARGET_COUNT);
        assert_eq!(cfg.rate_per_interval, 300);
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.max_inflight, None);

        let cfg = JobConfig::new().with_batch_size(0).normalized();
        assert_eq!(cfg.batch_size, 20);
    }

    #[test]
    fn test_normalized_keeps_valid_values() {
        let cfg = JobConfig::new()
            .with_target_count(7)
            .with_rate_per_interval(2)
            .with_batch_size(5)
            .with_max_inflight(3)
            .normalized();
        assert_eq!(cfg.target_count, 7);
        assert_eq!(cfg.rate_per_interval, 2);
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.max_inflight, Some(3));
    }

    #[test]
    fn test_unit_mode_serde() {
        assert_eq!(serde_json::to_string(&UnitMode::Batch).unwrap(), "\"batch\"");
        assert_eq!(UnitMode::Single.to_string(), "single");
    }
}

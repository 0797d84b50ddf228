use crate::error::{AgentError, Result};
use std::time::Duration;

/// Default ingestion endpoint (the server's script port)
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8888/track";

/// Buffer length that triggers an immediate flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 3;

/// Period of the recurring flush tick
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

/// Upper bound on buffered records before the oldest are evicted
pub const DEFAULT_MAX_BUFFERED: usize = 1000;

/// Consecutive 422 responses after which a batch is discarded
pub const DEFAULT_MAX_REJECTIONS: u32 = 5;

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// URL batches are POSTed to by [`Tracker::start_http`](crate::Tracker::start_http)
    pub endpoint: String,
    /// Flush as soon as the buffer grows to this many records
    pub flush_threshold: usize,
    /// Recurring flush period
    pub flush_interval: Duration,
    /// Memory bound for the buffer; oldest records are evicted beyond it
    pub max_buffered: usize,
    /// Delay before the second consecutive retry; doubles afterwards
    pub backoff_initial: Duration,
    /// Cap for the retry delay
    pub backoff_max: Duration,
    /// Discard a batch the server rejected this many times in a row (0 = never)
    pub max_rejections: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_buffered: DEFAULT_MAX_BUFFERED,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            max_rejections: DEFAULT_MAX_REJECTIONS,
        }
    }
}

impl AgentConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_max_buffered(mut self, max: usize) -> Self {
        self.max_buffered = max;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }

    pub fn with_max_rejections(mut self, max: u32) -> Self {
        self.max_rejections = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(AgentError::InvalidConfig(
                "flush threshold must be at least 1".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(AgentError::InvalidConfig(
                "flush interval must be non-zero".to_string(),
            ));
        }
        if self.max_buffered < self.flush_threshold {
            return Err(AgentError::InvalidConfig(format!(
                "max buffered ({}) must be >= flush threshold ({})",
                self.max_buffered, self.flush_threshold
            )));
        }
        if self.backoff_initial > self.backoff_max {
            return Err(AgentError::InvalidConfig(
                "initial backoff exceeds maximum backoff".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay to wait after `failures` consecutive failed flushes.
    ///
    /// The first retry is not delayed; from the second on the delay starts
    /// at `backoff_initial` and doubles up to `backoff_max`.
    pub fn retry_delay(&self, failures: u32) -> Duration {
        if failures < 2 {
            return Duration::ZERO;
        }
        let exp = (failures - 2).min(16);
        self.backoff_initial
            .saturating_mul(1u32 << exp)
            .min(self.backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_wire_contract() {
        let config = AgentConfig::default();
        assert_eq!(config.endpoint, "http://localhost:8888/track");
        assert_eq!(config.flush_threshold, 3);
        assert_eq!(config.flush_interval, Duration::from_millis(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = AgentConfig::default().with_flush_threshold(0);
        assert!(matches!(
            config.validate(),
            Err(AgentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_retry_delay_progression() {
        let config = AgentConfig::default()
            .with_backoff(Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(config.retry_delay(0), Duration::ZERO);
        assert_eq!(config.retry_delay(1), Duration::ZERO);
        assert_eq!(config.retry_delay(2), Duration::from_secs(1));
        assert_eq!(config.retry_delay(3), Duration::from_secs(2));
        assert_eq!(config.retry_delay(4), Duration::from_secs(4));
        assert_eq!(config.retry_delay(5), Duration::from_secs(5));
        assert_eq!(config.retry_delay(100), Duration::from_secs(5));
    }
}

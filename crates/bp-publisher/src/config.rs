use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Rate limiting policy for the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RateLimitConfig {
    /// At most one dispatch per interval
    FixedInterval { interval_ms: u64 },
    /// Up to `burst` dispatches back to back, at most `burst` per interval sustained
    Burst { interval_ms: u64, burst: usize },
}

impl RateLimitConfig {
    pub fn interval(&self) -> Duration {
        match self {
            RateLimitConfig::FixedInterval { interval_ms } => Duration::from_millis(*interval_ms),
            RateLimitConfig::Burst { interval_ms, .. } => Duration::from_millis(*interval_ms),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::Burst {
            interval_ms: 1000,
            burst: 2,
        }
    }
}

/// Configuration for a background publisher, fixed at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Number of priority levels; level 0 is served first
    pub num_levels: usize,
    /// Maximum queued events per level
    pub max_entries: usize,
    /// Dispatch rate limit
    pub rate_limit: RateLimitConfig,
    /// Pause between dispatcher ticks (`0` = yield without sleeping)
    pub tick_interval_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            num_levels: 2,
            max_entries: 8,
            rate_limit: RateLimitConfig::default(),
            tick_interval_ms: 2,
        }
    }
}

impl PublisherConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Clamp out-of-range values to the smallest usable configuration
    pub fn normalized(mut self) -> Self {
        if self.num_levels == 0 {
            warn!("num_levels of 0 requested, using 1");
            self.num_levels = 1;
        }
        if self.max_entries == 0 {
            warn!("max_entries of 0 requested, using 1");
            self.max_entries = 1;
        }
        if let RateLimitConfig::Burst { interval_ms, burst: 0 } = self.rate_limit {
            warn!("burst of 0 requested, using 1");
            self.rate_limit = RateLimitConfig::Burst { interval_ms, burst: 1 };
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PublisherConfig::default();
        assert_eq!(config.num_levels, 2);
        assert_eq!(config.max_entries, 8);
        assert_eq!(config.rate_limit.interval(), Duration::from_secs(1));
        assert_eq!(config.tick_interval(), Duration::from_millis(2));
    }

    #[test]
    fn test_normalized_clamps_zero_values() {
        let config = PublisherConfig {
            num_levels: 0,
            max_entries: 0,
            rate_limit: RateLimitConfig::Burst { interval_ms: 500, burst: 0 },
            tick_interval_ms: 0,
        }
        .normalized();

        assert_eq!(config.num_levels, 1);
        assert_eq!(config.max_entries, 1);
        assert_eq!(config.rate_limit, RateLimitConfig::Burst { interval_ms: 500, burst: 1 });
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: PublisherConfig = serde_json::from_str(
            r#"{"num_levels": 3, "rate_limit": {"policy": "fixed_interval", "interval_ms": 250}}"#,
        )
        .unwrap();

        assert_eq!(config.num_levels, 3);
        assert_eq!(config.max_entries, 8);
        assert_eq!(config.rate_limit, RateLimitConfig::FixedInterval { interval_ms: 250 });
    }
}

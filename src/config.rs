use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Support queue engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportQueueConfig {
    /// Queue-cache settings
    pub cache: CacheConfig,

    /// Durable session/rule store settings
    pub database: DatabaseConfig,

    /// Retry policy for cache operations
    pub retry: RetryConfig,

    /// Reconciliation schedules
    pub reconciler: ReconcilerConfig,
}

/// Queue-cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache connection URL
    pub url: String,

    /// Prefix applied to every queue key
    pub key_prefix: String,

    /// Deadline for the liveness probe
    pub probe_timeout: Duration,
}

/// Durable store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (":memory:" for in-memory)
    pub database_path: String,

    /// Maximum database connections
    pub max_connections: u32,
}

/// Retry policy for cache operations routed through the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt of a transient fault
    pub max_retries: u32,

    /// First backoff delay; doubles each retry
    pub base_delay: Duration,

    /// Upper bound on a single backoff delay
    pub max_delay: Duration,
}

/// Reconciliation schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Interval of the fast pass that refreshes durable queue positions
    pub position_sync_interval: Duration,

    /// Interval of the slow pass that re-inserts sessions missing from the cache
    pub repair_interval: Duration,
}

impl SupportQueueConfig {
    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.url.is_empty() {
            return Err("cache.url cannot be empty".to_string());
        }

        if self.cache.key_prefix.is_empty() {
            return Err("cache.key_prefix cannot be empty".to_string());
        }

        if self.cache.probe_timeout.is_zero() {
            return Err("cache.probe_timeout must be greater than 0".to_string());
        }

        if self.database.database_path.is_empty() {
            return Err("database.database_path cannot be empty".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("database.max_connections must be greater than 0".to_string());
        }

        if self.retry.base_delay.is_zero() {
            return Err("retry.base_delay must be greater than 0".to_string());
        }

        if self.retry.max_delay < self.retry.base_delay {
            return Err("retry.max_delay cannot be smaller than retry.base_delay".to_string());
        }

        if self.reconciler.position_sync_interval.is_zero() {
            return Err("reconciler.position_sync_interval must be greater than 0".to_string());
        }

        if self.reconciler.repair_interval.is_zero() {
            return Err("reconciler.repair_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for SupportQueueConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            database: DatabaseConfig::default(),
            retry: RetryConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "gamedesk".to_string(),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: "gamedesk_support.db".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(4000),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            position_sync_interval: Duration::from_secs(60),
            repair_interval: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SupportQueueConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_key_prefix() {
        let mut config = SupportQueueConfig::default();
        config.cache.key_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let mut config = SupportQueueConfig::default();
        config.retry.base_delay = Duration::from_millis(500);
        config.retry.max_delay = Duration::from_millis(100);
        assert!(config.validate().is_err());
    }
}

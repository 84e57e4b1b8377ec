//! Generic per-key rate limiting (spec ambient §10.6), applied independently
//! to Login attempts (keyed by remote IP), Matching session requests (keyed
//! by user id) and ServerDB registration attempts (keyed by peer id).
//!
//! A fixed-window counter per key behind a `RwLock<HashMap>`, generalized
//! from a room/join-specific two-counter shape to a single counter against
//! any hashable key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

/// Rate limiting configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub time_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            time_window: Duration::from_secs(60),
        }
    }
}

impl From<&crate::config::RateLimitConfig> for RateLimitConfig {
    fn from(cfg: &crate::config::RateLimitConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            time_window: Duration::from_secs(cfg.time_window_secs),
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    attempts: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn new() -> Self {
        Self {
            attempts: 0,
            window_start: Instant::now(),
        }
    }

    fn maybe_reset_window(&mut self, config: &RateLimitConfig) {
        if self.window_start.elapsed() >= config.time_window {
            self.attempts = 0;
            self.window_start = Instant::now();
        }
    }

    fn try_acquire(&mut self, config: &RateLimitConfig) -> bool {
        self.maybe_reset_window(config);
        if self.attempts < config.max_attempts {
            self.attempts += 1;
            true
        } else {
            false
        }
    }

    fn time_until_reset(&self, config: &RateLimitConfig) -> Duration {
        let elapsed = self.window_start.elapsed();
        config.time_window.saturating_sub(elapsed)
    }
}

/// A fixed-window rate limiter keyed by an arbitrary `Eq + Hash` key.
pub struct RateLimiter<K> {
    config: RateLimitConfig,
    entries: Arc<RwLock<HashMap<K, RateLimitEntry>>>,
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> RateLimiter<K> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check whether an attempt for `key` is allowed, consuming one unit of
    /// budget from its window if so.
    pub async fn check(&self, key: &K) -> Result<(), RateLimitError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.clone())
            .or_insert_with(RateLimitEntry::new);

        if entry.try_acquire(&self.config) {
            Ok(())
        } else {
            Err(RateLimitError::LimitExceeded {
                retry_after: entry.time_until_reset(&self.config),
            })
        }
    }

    /// Remove entries idle for longer than 2x the configured window.
    pub async fn cleanup_old_entries(&self) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let cleanup_threshold = self.config.time_window * 2;
        entries.retain(|_, entry| now.duration_since(entry.window_start) < cleanup_threshold);
    }

    /// Start a background task that periodically sweeps stale entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let rate_limiter = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(rate_limiter.config.time_window);
            loop {
                interval.tick().await;
                rate_limiter.cleanup_old_entries().await;
            }
        });
    }
}

#[derive(Debug, Clone)]
pub enum RateLimitError {
    LimitExceeded { retry_after: Duration },
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LimitExceeded { retry_after } => {
                write!(
                    f,
                    "rate limit exceeded, retry in {} seconds",
                    retry_after.as_secs()
                )
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            max_attempts: 2,
            time_window: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn first_n_attempts_succeed_then_limit_kicks_in() {
        let limiter: RateLimiter<String> = RateLimiter::new(test_config());
        let key = "203.0.113.7".to_string();

        assert!(limiter.check(&key).await.is_ok());
        assert!(limiter.check(&key).await.is_ok());
        assert!(limiter.check(&key).await.is_err());
    }

    #[tokio::test]
    async fn window_resets_after_elapsed_time() {
        let limiter: RateLimiter<String> = RateLimiter::new(test_config());
        let key = "203.0.113.7".to_string();

        assert!(limiter.check(&key).await.is_ok());
        assert!(limiter.check(&key).await.is_ok());
        assert!(limiter.check(&key).await.is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(limiter.check(&key).await.is_ok());
    }

    #[tokio::test]
    async fn distinct_keys_have_independent_budgets() {
        let limiter: RateLimiter<String> = RateLimiter::new(test_config());

        assert!(limiter.check(&"a".to_string()).await.is_ok());
        assert!(limiter.check(&"a".to_string()).await.is_ok());
        assert!(limiter.check(&"a".to_string()).await.is_err());

        assert!(limiter.check(&"b".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn cleanup_removes_stale_entries() {
        let config = RateLimitConfig {
            max_attempts: 1,
            time_window: Duration::from_millis(50),
        };
        let limiter: RateLimiter<String> = RateLimiter::new(config);
        let key = "peer-1".to_string();

        let _ = limiter.check(&key).await;
        assert_eq!(limiter.entries.read().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        limiter.cleanup_old_entries().await;

        assert_eq!(limiter.entries.read().await.len(), 0);
    }
}

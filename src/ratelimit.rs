use std::time::Duration;

use moka::future::Cache;
use tracing::warn;

/// A small per-key counter with TTL expiry, injected through `AppState` so
/// every test gets its own instance. The window slides on each hit, which is
/// strict enough for an abuse brake on a public form.
#[derive(Clone)]
pub struct RateLimiter {
    hits: Cache<String, u32>,
    max_hits: u32,
}

impl RateLimiter {
    pub fn new(max_hits: u32, window: Duration) -> Self {
        RateLimiter {
            hits: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(window)
                .build(),
            max_hits,
        }
    }

    /// Records a hit and reports whether the caller is still under the cap.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let count = self.hits.get(key).await.unwrap_or(0);
        if count >= self.max_hits {
            warn!(key, count, "Rate limit exceeded");
            return false;
        }
        self.hits.insert(key.to_string(), count + 1).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_cap_then_blocks() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(limiter.try_acquire("1.2.3.4").await);
        }
        assert!(!limiter.try_acquire("1.2.3.4").await);
        assert!(!limiter.try_acquire("1.2.3.4").await);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.try_acquire("1.2.3.4").await);
        assert!(!limiter.try_acquire("1.2.3.4").await);
        assert!(limiter.try_acquire("5.6.7.8").await);
    }
}

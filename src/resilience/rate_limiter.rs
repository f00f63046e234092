use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default permits per interval when the caller gives no usable value.
pub const DEFAULT_RATE_LIMIT: u32 = 300;

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub limit: u32,
    pub interval: Duration,
    /// Grants still inside the trailing window.
    pub granted_in_window: usize,
    /// Estimated wait time until a permit is available (ms), if currently full.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Permits granted per `interval`. Zero disables throttling.
    pub limit: u32,
    /// Length of the sliding window.
    pub interval: Duration,
}

impl RateLimiterConfig {
    /// Create a new config with default values (300 permits per second).
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_RATE_LIMIT,
            interval: Duration::from_secs(1),
        }
    }

    pub fn per_second(limit: u32) -> Self {
        Self::new().with_limit(limit)
    }

    /// Build a config from a caller-supplied ceiling where anything `<= 0`
    /// means "do not throttle".
    pub fn from_limit(limit: i64) -> Self {
        let limit = u32::try_from(limit.max(0)).unwrap_or(u32::MAX);
        Self::new().with_limit(limit)
    }

    pub fn unlimited() -> Self {
        Self::new().with_limit(0)
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == 0 || self.interval.is_zero()
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct State {
    /// Grant instants inside the trailing window, oldest first.
    grants: VecDeque<Instant>,
}

/// Sliding-window log rate limiter.
///
/// A permit is granted only while fewer than `limit` permits were granted in
/// the trailing `interval`, so no window of that length ever sees more than
/// `limit` grants. Waiters are not queued: whoever takes the lock after a
/// slot frees up wins it.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let capacity = if cfg.is_unlimited() {
            0
        } else {
            (cfg.limit as usize).min(4096)
        };
        Self {
            cfg,
            state: Mutex::new(State {
                grants: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(RateLimiterConfig::unlimited())
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn evict_expired(cfg: &RateLimiterConfig, st: &mut State, now: Instant) {
        while let Some(&oldest) = st.grants.front() {
            if now.duration_since(oldest) >= cfg.interval {
                st.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest grant leaves the window, or `None` if a slot is free.
    fn wait_for_slot(cfg: &RateLimiterConfig, st: &State, now: Instant) -> Option<Duration> {
        if st.grants.len() < cfg.limit as usize {
            return None;
        }
        st.grants
            .front()
            .map(|oldest| cfg.interval.saturating_sub(now.duration_since(*oldest)))
    }

    /// Acquire one permit, sleeping until the window has room.
    pub async fn acquire(&self) {
        if self.cfg.is_unlimited() {
            return;
        }

        loop {
            let wait = {
                let mut st = self.state.lock().await;
                let now = Instant::now();
                Self::evict_expired(&self.cfg, &mut st, now);
                match Self::wait_for_slot(&self.cfg, &st, now) {
                    None => {
                        st.grants.push_back(now);
                        return;
                    }
                    Some(wait) => wait,
                }
            };

            tokio::time::sleep(wait).await;
        }
    }

    /// Try to acquire a permit without waiting, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        if self.cfg.is_unlimited() {
            return true;
        }

        let mut st = self.state.lock().await;
        let now = Instant::now();
        Self::evict_expired(&self.cfg, &mut st, now);
        if Self::wait_for_slot(&self.cfg, &st, now).is_none() {
            st.grants.push_back(now);
            true
        } else {
            false
        }
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut st = self.state.lock().await;
        let now = Instant::now();
        Self::evict_expired(&self.cfg, &mut st, now);
        let estimated_wait_ms = if self.cfg.is_unlimited() {
            None
        } else {
            Self::wait_for_slot(&self.cfg, &st, now).map(|w| w.as_millis() as u64)
        };

        RateLimiterSnapshot {
            limit: self.cfg.limit,
            interval: self.cfg.interval,
            granted_in_window: st.grants.len(),
            estimated_wait_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rate_limiter_config_defaults() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.limit, 300);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert!(!config.is_unlimited());
    }

    #[test]
    fn test_rate_limiter_config_from_limit() {
        assert_eq!(RateLimiterConfig::from_limit(25).limit, 25);
        assert!(RateLimiterConfig::from_limit(0).is_unlimited());
        assert!(RateLimiterConfig::from_limit(-4).is_unlimited());
        assert_eq!(RateLimiterConfig::from_limit(i64::MAX).limit, u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_window_bound_under_contention() {
        let config = RateLimiterConfig::per_second(5);
        let interval = config.interval;
        let limiter = Arc::new(RateLimiter::new(config));

        let mut handles = Vec::new();
        for _ in 0..23 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }
        let mut grants = Vec::new();
        for h in handles {
            grants.push(h.await.unwrap());
        }
        grants.sort();

        for (i, start) in grants.iter().enumerate() {
            let in_window = grants[i..]
                .iter()
                .take_while(|t| t.duration_since(*start) < interval)
                .count();
            assert!(in_window <= 5, "window starting at grant {} saw {}", i, in_window);
        }
        // 23 grants at 5 per second need at least four full intervals.
        let span = grants[grants.len() - 1].duration_since(grants[0]);
        assert!(span >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_waits_for_oldest_grant() {
        let limiter = RateLimiter::new(RateLimiterConfig::per_second(2));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_unlimited_never_waits() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_limit(0));
        let start = Instant::now();
        for _ in 0..10_000 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(limiter.try_acquire().await);
        assert_eq!(limiter.snapshot().await.granted_in_window, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_try_acquire() {
        let limiter = RateLimiter::new(RateLimiterConfig::per_second(3));

        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);

        // Fourth should fail (window full)
        assert!(!limiter.try_acquire().await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_snapshot() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::new()
                .with_limit(2)
                .with_interval(Duration::from_millis(500)),
        );

        let empty = limiter.snapshot().await;
        assert_eq!(empty.granted_in_window, 0);
        assert!(empty.estimated_wait_ms.is_none());

        limiter.acquire().await;
        tokio::time::advance(Duration::from_millis(100)).await;
        limiter.acquire().await;

        let full = limiter.snapshot().await;
        assert_eq!(full.limit, 2);
        assert_eq!(full.granted_in_window, 2);
        assert_eq!(full.estimated_wait_ms, Some(400));
    }
}

//! Poll throttling: exponential backoff on consecutive failures and a
//! token-bucket rate limit. Both are shared across all poll loops of a
//! pool and must be thread-safe.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Exponential backoff driven by consecutive failures. The delay is
/// `min(maximum, initial * coefficient^(failures - 1))` and zero when
/// there are no failures.
pub struct BackoffThrottler {
    initial_interval: Duration,
    maximum_interval: Duration,
    coefficient: f64,
    consecutive_failures: AtomicU32,
}

impl BackoffThrottler {
    pub fn new(initial_interval: Duration, maximum_interval: Duration, coefficient: f64) -> Self {
        Self {
            initial_interval,
            maximum_interval,
            coefficient,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures == 0 {
            return Duration::ZERO;
        }
        let millis =
            self.initial_interval.as_millis() as f64 * self.coefficient.powi(failures as i32 - 1);
        let capped = millis.min(self.maximum_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    pub async fn throttle(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket allowing `rate_per_second` calls averaged over an
/// interval window. Callers block until a token is available.
pub struct RateThrottler {
    rate_per_second: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl RateThrottler {
    pub fn new(rate_per_second: f64, interval: Duration) -> Self {
        let burst = (rate_per_second * interval.as_secs_f64()).max(1.0);
        Self {
            rate_per_second,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token, sleeping until one accrues if the bucket is dry.
    pub async fn throttle(&self) {
        loop {
            let wait = {
                let mut state = self
                    .state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.burst);
                state.last_refill = now;
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate_per_second)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_zero_without_failures() {
        let throttler = BackoffThrottler::new(
            Duration::from_millis(100),
            Duration::from_secs(60),
            2.0,
        );
        assert_eq!(throttler.delay(), Duration::ZERO);
    }

    #[test]
    fn delay_grows_until_capped() {
        let throttler =
            BackoffThrottler::new(Duration::from_millis(10), Duration::from_secs(1), 2.0);

        let mut delays = Vec::new();
        for _ in 0..5 {
            throttler.failure();
            delays.push(throttler.delay());
        }
        let expected: Vec<Duration> = [10u64, 20, 40, 80, 160]
            .iter()
            .map(|millis| Duration::from_millis(*millis))
            .collect();
        assert_eq!(delays, expected);

        // Monotone non-decreasing until the cap.
        for _ in 0..20 {
            throttler.failure();
        }
        assert_eq!(throttler.delay(), Duration::from_secs(1));
    }

    #[test]
    fn success_resets_failures() {
        let throttler =
            BackoffThrottler::new(Duration::from_millis(10), Duration::from_secs(1), 2.0);
        for _ in 0..5 {
            throttler.failure();
        }
        assert!(throttler.delay() > Duration::ZERO);
        throttler.success();
        assert_eq!(throttler.delay(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_throttler_blocks_after_burst() {
        let throttler = RateThrottler::new(2.0, Duration::from_secs(1));
        let start = Instant::now();

        // Burst of two goes through immediately.
        throttler.throttle().await;
        throttler.throttle().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // The third call waits for a token to accrue at 2/s.
        throttler.throttle().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(450), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(600), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_throttler_bounds_average_rate() {
        let throttler = RateThrottler::new(10.0, Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..21 {
            throttler.throttle().await;
        }
        // 21 calls at 10/s with a burst of one: at least two seconds.
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}

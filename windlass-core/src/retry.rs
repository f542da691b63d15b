//! Retry options and the retry evaluator.
//!
//! One evaluator serves two callers: RPC reports (poll results,
//! completion/failure responses, history pagination) and user-level
//! workflow/activity retries. The rethrow rules are, in order: the
//! error kind is in `do_not_retry`; the attempt count reached
//! `maximum_attempts`; the elapsed time plus the next sleep would cross
//! `expiration` and more than `minimum_attempts` attempts were made.

use std::future::Future;
use std::time::Duration;

use crate::error::{WindlassError, WindlassResult};

const DEFAULT_BACKOFF_COEFFICIENT: f64 = 2.0;

/// When `maximum_interval` is unset the sleep is capped at
/// `initial_interval * DEFAULT_MAXIMUM_MULTIPLIER`.
const DEFAULT_MAXIMUM_MULTIPLIER: u32 = 100;

/// Error kinds that report/poll retries never retry.
pub const RPC_DO_NOT_RETRY: &[&str] = &[
    "BadRequestError",
    "EntityNotExistsError",
    "WorkflowExecutionAlreadyStartedError",
    "WorkflowExecutionAlreadyCompletedError",
    "DomainNotActiveError",
    "QueryFailedError",
    "AccessDeniedError",
];

/// Options controlling retry behavior.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Delay before the second attempt; later attempts scale by
    /// `backoff_coefficient`.
    pub initial_interval: Duration,
    /// Cap on the computed sleep. Unset means `initial_interval * 100`.
    pub maximum_interval: Option<Duration>,
    /// Defaults to 2.0 when left at 0.
    pub backoff_coefficient: f64,
    /// 0 means unbounded.
    pub maximum_attempts: u32,
    /// Expiration does not stop retrying until this many attempts ran.
    pub minimum_attempts: u32,
    /// Total wall-clock budget across attempts.
    pub expiration: Option<Duration>,
    /// Error kinds (per `WindlassError::kind`) that are rethrown
    /// immediately.
    pub do_not_retry: Vec<String>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            maximum_interval: None,
            backoff_coefficient: DEFAULT_BACKOFF_COEFFICIENT,
            maximum_attempts: 0,
            minimum_attempts: 0,
            expiration: None,
            do_not_retry: Vec::new(),
        }
    }
}

impl RetryOptions {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            ..Self::default()
        }
    }

    /// Defaults for reporting task results back to the service.
    pub fn for_reports() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            maximum_interval: Some(Duration::from_secs(1)),
            expiration: Some(Duration::from_secs(60)),
            do_not_retry: RPC_DO_NOT_RETRY.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_maximum_interval(mut self, interval: Duration) -> Self {
        self.maximum_interval = Some(interval);
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_maximum_attempts(mut self, attempts: u32) -> Self {
        self.maximum_attempts = attempts;
        self
    }

    pub fn with_minimum_attempts(mut self, attempts: u32) -> Self {
        self.minimum_attempts = attempts;
        self
    }

    pub fn with_do_not_retry<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.do_not_retry = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Sleep before attempt `attempt + 1`, given that `attempt` (1-based)
    /// failed: `min(cap, initial * coefficient^(attempt - 1))`.
    pub fn next_sleep(&self, attempt: u32) -> Duration {
        let coefficient = if self.backoff_coefficient == 0.0 {
            DEFAULT_BACKOFF_COEFFICIENT
        } else {
            self.backoff_coefficient
        };
        let sleep_millis =
            self.initial_interval.as_millis() as f64 * coefficient.powi(attempt as i32 - 1);
        let cap = self
            .maximum_interval
            .unwrap_or(self.initial_interval * DEFAULT_MAXIMUM_MULTIPLIER);
        let capped = sleep_millis.min(cap.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether `error`, raised on `attempt` after `elapsed`, should stop
    /// the retry loop.
    pub fn should_rethrow(
        &self,
        error: &WindlassError,
        attempt: u32,
        elapsed: Duration,
        next_sleep: Duration,
    ) -> bool {
        let error = error.retry_cause();
        if self.do_not_retry.iter().any(|k| k == error.kind()) {
            return true;
        }
        if self.maximum_attempts != 0 && attempt >= self.maximum_attempts {
            return true;
        }
        if let Some(expiration) = self.expiration {
            if elapsed + next_sleep >= expiration && attempt > self.minimum_attempts {
                return true;
            }
        }
        false
    }
}

/// Run `operation` until it succeeds or the options say to stop.
pub async fn retry<T, F, Fut>(options: &RetryOptions, mut operation: F) -> WindlassResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WindlassResult<T>>,
{
    let start = tokio::time::Instant::now();
    let mut attempt: u32 = 1;
    loop {
        let next_sleep = options.next_sleep(attempt);
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if options.should_rethrow(&error, attempt, start.elapsed(), next_sleep) {
                    return Err(error);
                }
            }
        }
        attempt += 1;
        tokio::time::sleep(next_sleep).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn busy() -> WindlassError {
        ServiceError::ServiceBusy("busy".into()).into()
    }

    #[test]
    fn sleep_grows_exponentially_and_caps() {
        let options = RetryOptions::new(Duration::from_millis(10))
            .with_maximum_interval(Duration::from_secs(1));
        assert_eq!(options.next_sleep(1), Duration::from_millis(10));
        assert_eq!(options.next_sleep(2), Duration::from_millis(20));
        assert_eq!(options.next_sleep(3), Duration::from_millis(40));
        assert_eq!(options.next_sleep(8), Duration::from_millis(1000));
        assert_eq!(options.next_sleep(20), Duration::from_millis(1000));
    }

    #[test]
    fn sleep_caps_at_hundred_times_initial_without_maximum() {
        let options = RetryOptions::new(Duration::from_millis(10));
        assert_eq!(options.next_sleep(30), Duration::from_millis(1000));
    }

    #[test]
    fn rethrows_on_do_not_retry_kind() {
        let options = RetryOptions::new(Duration::from_millis(10))
            .with_do_not_retry(["ServiceBusyError"]);
        assert!(options.should_rethrow(&busy(), 1, Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn rethrows_when_attempts_exhausted() {
        let options = RetryOptions::new(Duration::from_millis(10)).with_maximum_attempts(3);
        assert!(!options.should_rethrow(&busy(), 2, Duration::ZERO, Duration::ZERO));
        assert!(options.should_rethrow(&busy(), 3, Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn expiration_defers_to_minimum_attempts() {
        let options = RetryOptions::new(Duration::from_millis(10))
            .with_expiration(Duration::from_millis(100))
            .with_minimum_attempts(5);
        // Budget exhausted but the minimum attempt count was not reached.
        assert!(!options.should_rethrow(
            &busy(),
            3,
            Duration::from_millis(200),
            Duration::from_millis(40),
        ));
        assert!(options.should_rethrow(
            &busy(),
            6,
            Duration::from_millis(200),
            Duration::from_millis(40),
        ));
    }

    #[test]
    fn judges_the_cause_of_activity_failures() {
        let options =
            RetryOptions::new(Duration::from_millis(10)).with_do_not_retry(["CanceledError"]);
        let wrapped = WindlassError::ActivityFailure {
            reason: "wrapped".into(),
            cause: Some(Box::new(WindlassError::Canceled { details: None })),
        };
        assert!(options.should_rethrow(&wrapped, 1, Duration::ZERO, Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let options = RetryOptions::new(Duration::from_millis(10));
        let calls = AtomicU32::new(0);
        let result: WindlassResult<u32> = retry(&options, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 3 {
                Err(busy())
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_permanent_error() {
        let options = RetryOptions::for_reports();
        let calls = AtomicU32::new(0);
        let result: WindlassResult<()> = retry(&options, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::BadRequest("nope".into()).into())
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), "BadRequestError");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Fixed-size pool of identical poll loops.
//!
//! Each loop runs one `poll -> handle` cycle per iteration: check for
//! shutdown, apply the shared backoff delay, apply the rate limit,
//! wait out a suspension if one is active, then execute the cycle.
//! Failures advance the shared backoff and go to the uncaught-error
//! sink; they never stop the loop.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use windlass_core::{MetricsScope, WindlassError, WindlassResult};

use crate::metrics;
use crate::throttle::{BackoffThrottler, RateThrottler};

/// One kind of task: how to poll for it, how to process it, and how to
/// describe a processing failure.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    type Task: Send + Sync + 'static;

    /// One poll against the service. `None` means no task was available.
    async fn poll(&self) -> WindlassResult<Option<Self::Task>>;

    /// Process a polled task, reporting the result to the service.
    async fn handle(&self, task: &Self::Task) -> WindlassResult<()>;

    /// Attach task context to a processing failure before it reaches
    /// the uncaught-error sink.
    fn wrap_failure(&self, task: &Self::Task, error: WindlassError) -> WindlassError;
}

pub type UncaughtErrorHandler = Arc<dyn Fn(&WindlassError) + Send + Sync>;

/// Lifecycle shared by pollers and the workers built on them.
#[async_trait]
pub trait SuspendableWorker: Send + Sync {
    fn start(&self);
    fn is_running(&self) -> bool;

    /// Stops polling between iterations; in-flight work is not
    /// interrupted.
    fn suspend_polling(&self);
    fn resume_polling(&self);

    /// Graceful: finish the current iteration, start no new one.
    fn shutdown(&self);

    /// Forced: additionally interrupts blocking calls.
    fn shutdown_now(&self);

    /// Waits for every poll loop to exit. True when all exited within
    /// the timeout.
    async fn await_termination(&self, timeout: Duration) -> bool;

    async fn shutdown_and_await_termination(&self, timeout: Duration) -> bool;
}

#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Number of identical poll loops.
    pub poller_count: usize,
    /// Maximum polls per second across the pool, unlimited when unset.
    pub maximum_poll_rate_per_second: Option<f64>,
    /// Averaging window for the rate limit.
    pub poll_rate_interval: Duration,
    pub backoff_initial_interval: Duration,
    pub backoff_maximum_interval: Duration,
    pub backoff_coefficient: f64,
    /// Prefix for poll loop names in logs.
    pub poll_task_name_prefix: String,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            poller_count: 1,
            maximum_poll_rate_per_second: None,
            poll_rate_interval: Duration::from_secs(1),
            backoff_initial_interval: Duration::from_millis(100),
            backoff_maximum_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            poll_task_name_prefix: "poller".to_string(),
        }
    }
}

pub struct Poller<H: TaskHandler> {
    options: PollerOptions,
    identity: String,
    handler: Arc<H>,
    backoff: Arc<BackoffThrottler>,
    rate_throttler: Option<Arc<RateThrottler>>,
    suspend_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<dyn MetricsScope>,
    uncaught_error_handler: UncaughtErrorHandler,
}

impl<H: TaskHandler> Poller<H> {
    pub fn new(
        options: PollerOptions,
        identity: impl Into<String>,
        handler: Arc<H>,
        metrics: Arc<dyn MetricsScope>,
    ) -> Self {
        let backoff = Arc::new(BackoffThrottler::new(
            options.backoff_initial_interval,
            options.backoff_maximum_interval,
            options.backoff_coefficient,
        ));
        let rate_throttler = options
            .maximum_poll_rate_per_second
            .map(|rate| Arc::new(RateThrottler::new(rate, options.poll_rate_interval)));
        let (suspend_tx, _) = watch::channel(false);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            options,
            identity: identity.into(),
            handler,
            backoff,
            rate_throttler,
            suspend_tx,
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
            metrics,
            uncaught_error_handler: Arc::new(|error| {
                error!(error = %error, "uncaught error in poll task");
            }),
        }
    }

    pub fn with_uncaught_error_handler(mut self, handler: UncaughtErrorHandler) -> Self {
        self.uncaught_error_handler = handler;
        self
    }

    fn workers_lock(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<H: TaskHandler> SuspendableWorker for Poller<H> {
    fn start(&self) {
        info!(
            identity = %self.identity,
            poller_count = self.options.poller_count,
            "starting pollers"
        );
        let mut workers = self.workers_lock();
        for i in 0..self.options.poller_count {
            let name = format!("{}-{}", self.options.poll_task_name_prefix, i);
            let handle = tokio::spawn(run_poll_loop(
                name,
                self.handler.clone(),
                self.backoff.clone(),
                self.rate_throttler.clone(),
                self.suspend_tx.subscribe(),
                self.shutdown_tx.subscribe(),
                self.uncaught_error_handler.clone(),
            ));
            workers.push(handle);
            self.metrics.counter(metrics::POLLER_START_COUNTER, 1);
        }
    }

    fn is_running(&self) -> bool {
        let workers = self.workers_lock();
        !workers.is_empty() && workers.iter().any(|handle| !handle.is_finished())
    }

    fn suspend_polling(&self) {
        info!(identity = %self.identity, "suspending polling");
        self.suspend_tx.send_replace(true);
    }

    fn resume_polling(&self) {
        info!(identity = %self.identity, "resuming polling");
        self.suspend_tx.send_replace(false);
    }

    fn shutdown(&self) {
        info!(identity = %self.identity, "shutdown");
        self.shutdown_tx.send_replace(true);
    }

    fn shutdown_now(&self) {
        info!(identity = %self.identity, "shutdown now");
        self.shutdown_tx.send_replace(true);
        for handle in self.workers_lock().iter() {
            handle.abort();
        }
    }

    async fn await_termination(&self, timeout: Duration) -> bool {
        let handles: Vec<JoinHandle<()>> = self.workers_lock().drain(..).collect();
        if handles.is_empty() {
            return true;
        }
        let joined = tokio::time::timeout(timeout, futures::future::join_all(handles)).await;
        debug!(identity = %self.identity, "await termination done");
        joined.is_ok()
    }

    async fn shutdown_and_await_termination(&self, timeout: Duration) -> bool {
        self.shutdown_now();
        self.await_termination(timeout).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_poll_loop<H: TaskHandler>(
    name: String,
    handler: Arc<H>,
    backoff: Arc<BackoffThrottler>,
    rate_throttler: Option<Arc<RateThrottler>>,
    mut suspend_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
    uncaught_error_handler: UncaughtErrorHandler,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        backoff.throttle().await;
        if let Some(rate) = &rate_throttler {
            rate.throttle().await;
        }
        while *suspend_rx.borrow() {
            debug!(poller = %name, "poll loop suspended");
            if suspend_rx.changed().await.is_err() {
                return;
            }
        }
        if *shutdown_rx.borrow() {
            break;
        }
        match poll_once(handler.as_ref()).await {
            Ok(()) => backoff.success(),
            Err(error) => {
                backoff.failure();
                let shutting_down = *shutdown_rx.borrow();
                if !shutting_down && !matches!(error, WindlassError::Shutdown) {
                    (uncaught_error_handler)(&error);
                }
            }
        }
    }
    info!(poller = %name, "poll loop done");
}

async fn poll_once<H: TaskHandler>(handler: &H) -> WindlassResult<()> {
    let Some(task) = handler.poll().await? else {
        return Ok(());
    };
    handler
        .handle(&task)
        .await
        .map_err(|error| handler.wrap_failure(&task, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;
    use windlass_core::{NoopMetrics, ServiceError};

    struct ScriptedHandler {
        polls: AtomicU32,
        fail_first: u32,
        success_poll_delay: Duration,
        poll_times: Mutex<Vec<Instant>>,
        hang: bool,
    }

    impl ScriptedHandler {
        fn new(fail_first: u32, success_poll_delay: Duration) -> Self {
            Self {
                polls: AtomicU32::new(0),
                fail_first,
                success_poll_delay,
                poll_times: Mutex::new(Vec::new()),
                hang: false,
            }
        }

        fn hanging() -> Self {
            Self {
                polls: AtomicU32::new(0),
                fail_first: 0,
                success_poll_delay: Duration::ZERO,
                poll_times: Mutex::new(Vec::new()),
                hang: true,
            }
        }

        fn poll_count(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskHandler for ScriptedHandler {
        type Task = ();

        async fn poll(&self) -> WindlassResult<Option<()>> {
            self.poll_times
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(Instant::now());
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if n < self.fail_first {
                return Err(ServiceError::ServiceBusy("busy".into()).into());
            }
            tokio::time::sleep(self.success_poll_delay).await;
            Ok(None)
        }

        async fn handle(&self, _task: &()) -> WindlassResult<()> {
            Ok(())
        }

        fn wrap_failure(&self, _task: &(), error: WindlassError) -> WindlassError {
            error
        }
    }

    fn poller_options() -> PollerOptions {
        PollerOptions {
            poller_count: 1,
            backoff_initial_interval: Duration::from_millis(10),
            backoff_maximum_interval: Duration::from_secs(1),
            ..PollerOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failures_back_off_exponentially() {
        let handler = Arc::new(ScriptedHandler::new(5, Duration::from_millis(10)));
        let errors = Arc::new(AtomicU32::new(0));
        let errors_clone = errors.clone();
        let poller = Poller::new(
            poller_options(),
            "test-worker",
            handler.clone(),
            Arc::new(NoopMetrics),
        )
        .with_uncaught_error_handler(Arc::new(move |_| {
            errors_clone.fetch_add(1, Ordering::SeqCst);
        }));

        poller.start();
        tokio::time::sleep(Duration::from_millis(400)).await;
        poller.shutdown();
        assert!(poller.await_termination(Duration::from_secs(1)).await);

        // Five failed polls spaced 10, 20, 40, 80, 160 ms apart.
        let times = handler
            .poll_times
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        assert!(times.len() >= 6, "expected at least 6 polls, got {}", times.len());
        let gaps: Vec<Duration> = times.windows(2).take(5).map(|w| w[1] - w[0]).collect();
        let expected: Vec<Duration> = [10u64, 20, 40, 80, 160]
            .iter()
            .map(|millis| Duration::from_millis(*millis))
            .collect();
        assert_eq!(gaps, expected);

        // Failures reached the sink, and the loop survived them all.
        assert_eq!(errors.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn suspend_and_resume_round_trip() {
        let handler = Arc::new(ScriptedHandler::new(0, Duration::from_millis(10)));
        let poller = Poller::new(
            poller_options(),
            "test-worker",
            handler.clone(),
            Arc::new(NoopMetrics),
        );

        poller.start();
        assert!(poller.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before_suspend = handler.poll_count();
        assert!(before_suspend > 0);

        poller.suspend_polling();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let suspended_at = handler.poll_count();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handler.poll_count(), suspended_at);

        poller.resume_polling();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handler.poll_count() > suspended_at);
        assert!(poller.is_running());

        poller.shutdown();
        assert!(poller.await_termination(Duration::from_secs(1)).await);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_terminates_all_workers() {
        let handler = Arc::new(ScriptedHandler::new(0, Duration::from_millis(10)));
        let options = PollerOptions {
            poller_count: 4,
            ..poller_options()
        };
        let poller = Poller::new(options, "test-worker", handler, Arc::new(NoopMetrics));
        poller.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.shutdown();
        assert!(poller.await_termination(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_now_interrupts_blocking_poll() {
        let handler = Arc::new(ScriptedHandler::hanging());
        let poller = Poller::new(
            poller_options(),
            "test-worker",
            handler.clone(),
            Arc::new(NoopMetrics),
        );
        poller.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.poll_count(), 1);

        // Graceful shutdown cannot finish while the poll hangs.
        poller.shutdown_now();
        assert!(poller.await_termination(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn await_termination_before_start_is_immediate() {
        let handler = Arc::new(ScriptedHandler::new(0, Duration::from_millis(10)));
        let poller = Poller::new(
            poller_options(),
            "test-worker",
            handler,
            Arc::new(NoopMetrics),
        );
        assert!(!poller.is_running());
        assert!(poller.await_termination(Duration::from_millis(10)).await);
    }
}

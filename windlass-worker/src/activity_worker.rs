//! Activity task worker.
//!
//! Polls for activity tasks and hands them to the user-supplied
//! dispatcher. A dispatcher that surfaces cancellation (the `Canceled`
//! error variant) gets its task reported as canceled, not failed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use windlass_core::{retry, MetricsScope, WindlassError, WindlassResult};
use windlass_proto::service::*;
use windlass_proto::shared::TaskList;

use crate::metrics;
use crate::poller::{Poller, PollerOptions, SuspendableWorker, TaskHandler};
use crate::workflow_worker::{SharedService, SingleWorkerOptions};

/// Executes one activity invocation. The dispatcher owns argument
/// decoding, user function lookup, and heartbeat plumbing; the worker
/// only sees opaque result bytes or an error.
#[async_trait]
pub trait ActivityTaskDispatcher: Send + Sync {
    async fn execute(&self, task: &PollForActivityTaskResponse) -> WindlassResult<Vec<u8>>;
}

/// An activity task plus the poll-time stamp used for the end-to-end
/// latency measurement.
pub struct MeasuredActivityTask {
    pub task: PollForActivityTaskResponse,
    received_at: Instant,
}

pub(crate) struct ActivityTaskPollHandler {
    service: SharedService,
    domain: String,
    task_list: String,
    options: SingleWorkerOptions,
    dispatcher: Arc<dyn ActivityTaskDispatcher>,
}

impl ActivityTaskPollHandler {
    async fn send_reply(
        &self,
        task_token: &[u8],
        result: WindlassResult<Vec<u8>>,
    ) -> WindlassResult<()> {
        let scope = &self.options.metrics;
        let service = self.service.clone();
        match result {
            Ok(output) => {
                let request = RespondActivityTaskCompletedRequest {
                    task_token: task_token.to_vec(),
                    result: Some(output),
                    identity: self.options.identity.clone(),
                };
                retry(&self.options.report_completion_retry_options, || {
                    let service = service.clone();
                    let request = request.clone();
                    async move { service.respond_activity_task_completed(request).await }
                })
                .await?;
                scope.counter(metrics::ACTIVITY_TASK_COMPLETED_COUNTER, 1);
                Ok(())
            }
            Err(WindlassError::Canceled { details }) => {
                let request = RespondActivityTaskCanceledRequest {
                    task_token: task_token.to_vec(),
                    details,
                    identity: self.options.identity.clone(),
                };
                retry(&self.options.report_failure_retry_options, || {
                    let service = service.clone();
                    let request = request.clone();
                    async move { service.respond_activity_task_canceled(request).await }
                })
                .await?;
                scope.counter(metrics::ACTIVITY_TASK_CANCELED_COUNTER, 1);
                Ok(())
            }
            Err(error) => {
                let request = RespondActivityTaskFailedRequest {
                    task_token: task_token.to_vec(),
                    reason: Some(error.kind().to_string()),
                    details: Some(error.to_string().into_bytes()),
                    identity: self.options.identity.clone(),
                };
                retry(&self.options.report_failure_retry_options, || {
                    let service = service.clone();
                    let request = request.clone();
                    async move { service.respond_activity_task_failed(request).await }
                })
                .await?;
                scope.counter(metrics::ACTIVITY_TASK_FAILED_COUNTER, 1);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TaskHandler for ActivityTaskPollHandler {
    type Task = MeasuredActivityTask;

    async fn poll(&self) -> WindlassResult<Option<Self::Task>> {
        let scope = &self.options.metrics;
        scope.counter(metrics::ACTIVITY_POLL_COUNTER, 1);
        let poll_started = Instant::now();

        let request = PollForActivityTaskRequest {
            domain: self.domain.clone(),
            task_list: Some(TaskList::new(self.task_list.clone())),
            identity: self.options.identity.clone(),
        };
        debug!(domain = %self.domain, task_list = %self.task_list, "polling for activity task");

        match self.service.poll_for_activity_task(request).await {
            Ok(response) => {
                if response.task_token.is_empty() {
                    scope.counter(metrics::ACTIVITY_POLL_NO_TASK_COUNTER, 1);
                    return Ok(None);
                }
                scope.counter(metrics::ACTIVITY_POLL_SUCCEED_COUNTER, 1);
                scope.timer(metrics::ACTIVITY_POLL_LATENCY, poll_started.elapsed());
                Ok(Some(MeasuredActivityTask {
                    task: response,
                    received_at: poll_started,
                }))
            }
            Err(error) => {
                if error.is_transient() {
                    scope.counter(metrics::ACTIVITY_POLL_TRANSIENT_FAILED_COUNTER, 1);
                } else {
                    scope.counter(metrics::ACTIVITY_POLL_FAILED_COUNTER, 1);
                }
                Err(error)
            }
        }
    }

    async fn handle(&self, measured: &Self::Task) -> WindlassResult<()> {
        let scope = &self.options.metrics;
        let task = &measured.task;

        let queued_nanos = task.started_timestamp.saturating_sub(task.scheduled_timestamp);
        scope.timer(
            metrics::TASK_LIST_QUEUE_LATENCY,
            Duration::from_nanos(queued_nanos.max(0) as u64),
        );

        let execution_started = Instant::now();
        let result = self.dispatcher.execute(task).await;
        scope.timer(metrics::ACTIVITY_EXEC_LATENCY, execution_started.elapsed());

        let response_started = Instant::now();
        self.send_reply(&task.task_token, result).await?;
        scope.timer(metrics::ACTIVITY_RESP_LATENCY, response_started.elapsed());
        scope.timer(metrics::ACTIVITY_E2E_LATENCY, measured.received_at.elapsed());
        Ok(())
    }

    fn wrap_failure(&self, measured: &Self::Task, error: WindlassError) -> WindlassError {
        let task = &measured.task;
        let (workflow_id, run_id) = task
            .workflow_execution
            .as_ref()
            .map(|we| (we.workflow_id.as_str(), we.run_id.as_str()))
            .unwrap_or(("", ""));
        let activity_type = task
            .activity_type
            .as_ref()
            .map(|at| at.name.as_str())
            .unwrap_or("");
        WindlassError::Generic(format!(
            "failure processing activity task, workflow_id={}, run_id={}, activity_type={}, activity_id={}: {}",
            workflow_id, run_id, activity_type, task.activity_id, error
        ))
    }
}

/// Hosts the activity side of a worker: a poll pool wired to an
/// activity dispatcher.
pub struct ActivityWorker {
    options: SingleWorkerOptions,
    poller: Poller<ActivityTaskPollHandler>,
}

impl ActivityWorker {
    pub fn new(
        service: SharedService,
        domain: impl Into<String>,
        task_list: impl Into<String>,
        options: SingleWorkerOptions,
        dispatcher: Arc<dyn ActivityTaskDispatcher>,
    ) -> Self {
        let domain = domain.into();
        let task_list = task_list.into();
        let mut poller_options = options.poller_options.clone();
        poller_options.poll_task_name_prefix = format!(
            "poller-task-list-{}-domain-{}-activity",
            task_list, domain
        );
        let poll_handler = Arc::new(ActivityTaskPollHandler {
            service,
            domain,
            task_list,
            options: options.clone(),
            dispatcher,
        });
        let poller = Poller::new(
            poller_options,
            options.identity.clone(),
            poll_handler,
            options.metrics.clone(),
        );
        Self { options, poller }
    }
}

#[async_trait]
impl SuspendableWorker for ActivityWorker {
    fn start(&self) {
        self.poller.start();
        self.options
            .metrics
            .counter(metrics::WORKER_START_COUNTER, 1);
    }

    fn is_running(&self) -> bool {
        self.poller.is_running()
    }

    fn suspend_polling(&self) {
        self.poller.suspend_polling();
    }

    fn resume_polling(&self) {
        self.poller.resume_polling();
    }

    fn shutdown(&self) {
        self.poller.shutdown();
    }

    fn shutdown_now(&self) {
        self.poller.shutdown_now();
    }

    async fn await_termination(&self, timeout: Duration) -> bool {
        self.poller.await_termination(timeout).await
    }

    async fn shutdown_and_await_termination(&self, timeout: Duration) -> bool {
        self.poller.shutdown_and_await_termination(timeout).await
    }
}

//! Decision task worker.
//!
//! Polls for decision tasks, feeds each one to the decision handler
//! (the deterministic dispatcher that replays user workflow code), and
//! reports the outcome. Handler and pagination failures become
//! decision-task-failed reports so the service can re-dispatch; they
//! never take down the poll loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use windlass_core::{retry, MetricsScope, RetryOptions, WindlassError, WindlassResult};
use windlass_proto::service::*;
use windlass_proto::shared::*;

use crate::history::{DecisionTaskHistory, PagedHistoryIterator, ReplayHistoryIterator, MAXIMUM_PAGE_SIZE};
use crate::metrics;
use crate::poller::{Poller, PollerOptions, SuspendableWorker, TaskHandler};

pub type SharedService = Arc<dyn WorkflowService<Error = WindlassError>>;

/// Result of running one decision task through the decision handler.
#[derive(Debug)]
pub enum DecisionTaskOutcome {
    Completed {
        decisions: Vec<Decision>,
        execution_context: Option<Vec<u8>>,
    },
    Failed {
        cause: DecisionTaskFailedCause,
        details: Option<Vec<u8>>,
    },
    QueryCompleted {
        result: Result<Vec<u8>, String>,
    },
}

/// The deterministic workflow dispatcher. Consumes the task's history
/// and produces the next outgoing batch (or a query answer). Internals
/// are a separate subsystem; the worker only needs this contract.
#[async_trait]
pub trait DecisionHandler: Send + Sync {
    async fn handle_decision_task(
        &self,
        history: &mut dyn DecisionTaskHistory,
    ) -> WindlassResult<DecisionTaskOutcome>;
}

/// Options for one sub-worker (decision or activity side).
#[derive(Clone)]
pub struct SingleWorkerOptions {
    pub identity: String,
    pub poller_options: PollerOptions,
    pub report_completion_retry_options: RetryOptions,
    pub report_failure_retry_options: RetryOptions,
    /// Concurrency bound for the dispatcher implementation.
    pub task_executor_size: usize,
    pub enable_logging_in_replay: bool,
    pub metrics: Arc<dyn MetricsScope>,
}

impl Default for SingleWorkerOptions {
    fn default() -> Self {
        Self {
            identity: format!(
                "windlass-worker@{}-pid-{}",
                std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
                std::process::id()
            ),
            poller_options: PollerOptions::default(),
            report_completion_retry_options: RetryOptions::for_reports(),
            report_failure_retry_options: RetryOptions::for_reports(),
            task_executor_size: 100,
            enable_logging_in_replay: false,
            metrics: Arc::new(windlass_core::NoopMetrics),
        }
    }
}

pub(crate) struct DecisionTaskPollHandler {
    service: SharedService,
    domain: String,
    task_list: String,
    options: SingleWorkerOptions,
    handler: Arc<dyn DecisionHandler>,
}

impl DecisionTaskPollHandler {
    async fn execute(
        &self,
        task: &PollForDecisionTaskResponse,
    ) -> WindlassResult<DecisionTaskOutcome> {
        let mut history = PagedHistoryIterator::new(
            self.service.clone(),
            self.domain.clone(),
            task.clone(),
            self.options.metrics.clone(),
        )?;
        self.handler.handle_decision_task(&mut history).await
    }

    async fn send_reply(
        &self,
        task_token: &[u8],
        outcome: DecisionTaskOutcome,
    ) -> WindlassResult<()> {
        match outcome {
            DecisionTaskOutcome::Completed {
                decisions,
                execution_context,
            } => {
                let request = RespondDecisionTaskCompletedRequest {
                    task_token: task_token.to_vec(),
                    decisions,
                    execution_context,
                    identity: self.options.identity.clone(),
                };
                let service = self.service.clone();
                retry(&self.options.report_completion_retry_options, || {
                    let service = service.clone();
                    let request = request.clone();
                    async move {
                        service
                            .respond_decision_task_completed(request)
                            .await
                            .map(|_| ())
                    }
                })
                .await
            }
            DecisionTaskOutcome::Failed { cause, details } => {
                let request = RespondDecisionTaskFailedRequest {
                    task_token: task_token.to_vec(),
                    cause,
                    details,
                    identity: self.options.identity.clone(),
                };
                let service = self.service.clone();
                retry(&self.options.report_failure_retry_options, || {
                    let service = service.clone();
                    let request = request.clone();
                    async move { service.respond_decision_task_failed(request).await }
                })
                .await
            }
            DecisionTaskOutcome::QueryCompleted { result } => {
                let request = match result {
                    Ok(query_result) => RespondQueryTaskCompletedRequest {
                        task_token: task_token.to_vec(),
                        completed_type: QueryTaskCompletedType::Completed,
                        query_result: Some(query_result),
                        error_message: None,
                    },
                    Err(message) => RespondQueryTaskCompletedRequest {
                        task_token: task_token.to_vec(),
                        completed_type: QueryTaskCompletedType::Failed,
                        query_result: None,
                        error_message: Some(message),
                    },
                };
                // Queries are best effort and never retried.
                self.service.respond_query_task_completed(request).await
            }
        }
    }
}

#[async_trait]
impl TaskHandler for DecisionTaskPollHandler {
    type Task = PollForDecisionTaskResponse;

    async fn poll(&self) -> WindlassResult<Option<Self::Task>> {
        let scope = &self.options.metrics;
        scope.counter(metrics::DECISION_POLL_COUNTER, 1);
        let poll_started = Instant::now();

        let request = PollForDecisionTaskRequest {
            domain: self.domain.clone(),
            task_list: Some(TaskList::new(self.task_list.clone())),
            identity: self.options.identity.clone(),
        };
        debug!(domain = %self.domain, task_list = %self.task_list, "polling for decision task");

        match self.service.poll_for_decision_task(request).await {
            Ok(response) => {
                if response.task_token.is_empty() {
                    scope.counter(metrics::DECISION_POLL_NO_TASK_COUNTER, 1);
                    return Ok(None);
                }
                scope.counter(metrics::DECISION_POLL_SUCCEED_COUNTER, 1);
                scope.timer(metrics::DECISION_POLL_LATENCY, poll_started.elapsed());
                Ok(Some(response))
            }
            Err(error) => {
                if error.is_transient() {
                    scope.counter(metrics::DECISION_POLL_TRANSIENT_FAILED_COUNTER, 1);
                } else {
                    scope.counter(metrics::DECISION_POLL_FAILED_COUNTER, 1);
                }
                Err(error)
            }
        }
    }

    async fn handle(&self, task: &Self::Task) -> WindlassResult<()> {
        let scope = &self.options.metrics;

        let execution_started = Instant::now();
        let outcome = self.execute(task).await;
        scope.timer(metrics::DECISION_EXECUTION_LATENCY, execution_started.elapsed());

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(WindlassError::Shutdown) => return Err(WindlassError::Shutdown),
            Err(error) => {
                warn!(error = %error, "decision task processing failed, reporting failure");
                DecisionTaskOutcome::Failed {
                    cause: DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure,
                    details: Some(error.to_string().into_bytes()),
                }
            }
        };

        let response_started = Instant::now();
        self.send_reply(&task.task_token, outcome).await?;
        scope.timer(metrics::DECISION_RESPONSE_LATENCY, response_started.elapsed());
        scope.counter(metrics::DECISION_TASK_COMPLETED_COUNTER, 1);
        Ok(())
    }

    fn wrap_failure(&self, task: &Self::Task, error: WindlassError) -> WindlassError {
        let (workflow_id, run_id) = task
            .workflow_execution
            .as_ref()
            .map(|we| (we.workflow_id.as_str(), we.run_id.as_str()))
            .unwrap_or(("", ""));
        WindlassError::Generic(format!(
            "failure processing decision task, workflow_id={}, run_id={}: {}",
            workflow_id, run_id, error
        ))
    }
}

/// Hosts the decision side of a worker: a poll pool wired to a
/// decision handler through the paginated history iterator.
pub struct WorkflowWorker {
    service: SharedService,
    domain: String,
    options: SingleWorkerOptions,
    handler: Arc<dyn DecisionHandler>,
    poller: Poller<DecisionTaskPollHandler>,
}

impl WorkflowWorker {
    pub fn new(
        service: SharedService,
        domain: impl Into<String>,
        task_list: impl Into<String>,
        options: SingleWorkerOptions,
        handler: Arc<dyn DecisionHandler>,
    ) -> Self {
        let domain = domain.into();
        let task_list = task_list.into();
        let mut poller_options = options.poller_options.clone();
        poller_options.poll_task_name_prefix = format!(
            "poller-task-list-{}-domain-{}-workflow",
            task_list, domain
        );
        let poll_handler = Arc::new(DecisionTaskPollHandler {
            service: service.clone(),
            domain: domain.clone(),
            task_list,
            options: options.clone(),
            handler: handler.clone(),
        });
        let poller = Poller::new(
            poller_options,
            options.identity.clone(),
            poll_handler,
            options.metrics.clone(),
        );
        Self {
            service,
            domain,
            options,
            handler,
            poller,
        }
    }

    /// Replays a workflow's full history offline and answers a query
    /// against the reconstructed state, without polling.
    pub async fn query_workflow_execution(
        &self,
        execution: WorkflowExecution,
        query_type: impl Into<String>,
        query_args: Option<Vec<u8>>,
    ) -> WindlassResult<Vec<u8>> {
        let mut events = Vec::new();
        let mut next_page_token = None;
        loop {
            let response = self
                .service
                .get_workflow_execution_history(GetWorkflowExecutionHistoryRequest {
                    domain: self.domain.clone(),
                    execution: Some(execution.clone()),
                    maximum_page_size: MAXIMUM_PAGE_SIZE,
                    next_page_token,
                })
                .await?;
            if let Some(history) = response.history {
                events.extend(history.events);
            }
            next_page_token = response.next_page_token;
            if next_page_token.is_none() {
                break;
            }
        }

        let query = WorkflowQuery {
            query_type: query_type.into(),
            query_args,
        };
        let mut history = ReplayHistoryIterator::new(execution, events, Some(query))?;
        match self.handler.handle_decision_task(&mut history).await? {
            DecisionTaskOutcome::QueryCompleted { result } => {
                result.map_err(WindlassError::Generic)
            }
            other => Err(WindlassError::Generic(format!(
                "query returned unexpected response: {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl SuspendableWorker for WorkflowWorker {
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

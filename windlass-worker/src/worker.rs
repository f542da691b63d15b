//! Worker façade: one workflow sub-worker plus one activity sub-worker
//! for a single (domain, task list) pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use windlass_core::{MetricsScope, NoopMetrics, RetryOptions};

use crate::activity_worker::{ActivityTaskDispatcher, ActivityWorker};
use crate::poller::{PollerOptions, SuspendableWorker};
use crate::workflow_worker::{
    DecisionHandler, SharedService, SingleWorkerOptions, WorkflowWorker,
};

/// Worker configuration surface. Per-kind poller options and per-class
/// report retry options are split out so decision and activity traffic
/// can be tuned independently.
#[derive(Clone)]
pub struct WorkerOptions {
    pub identity: String,
    pub disable_workflow_worker: bool,
    pub disable_activity_worker: bool,
    pub max_concurrent_activity_execution_size: usize,
    pub max_concurrent_decision_task_execution_size: usize,
    pub workflow_poller_options: PollerOptions,
    pub activity_poller_options: PollerOptions,
    pub report_activity_completion_retry_options: RetryOptions,
    pub report_activity_failure_retry_options: RetryOptions,
    pub report_workflow_completion_retry_options: RetryOptions,
    pub report_workflow_failure_retry_options: RetryOptions,
    pub enable_logging_in_replay: bool,
    pub metrics: Arc<dyn MetricsScope>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            identity: format!(
                "windlass-worker@{}-pid-{}",
                std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
                std::process::id()
            ),
            disable_workflow_worker: false,
            disable_activity_worker: false,
            max_concurrent_activity_execution_size: 100,
            max_concurrent_decision_task_execution_size: 50,
            workflow_poller_options: PollerOptions::default(),
            activity_poller_options: PollerOptions::default(),
            report_activity_completion_retry_options: RetryOptions::for_reports(),
            report_activity_failure_retry_options: RetryOptions::for_reports(),
            report_workflow_completion_retry_options: RetryOptions::for_reports(),
            report_workflow_failure_retry_options: RetryOptions::for_reports(),
            enable_logging_in_replay: false,
            metrics: Arc::new(NoopMetrics),
        }
    }
}

impl WorkerOptions {
    fn workflow_worker_options(&self) -> SingleWorkerOptions {
        SingleWorkerOptions {
            identity: self.identity.clone(),
            poller_options: self.workflow_poller_options.clone(),
            report_completion_retry_options: self.report_workflow_completion_retry_options.clone(),
            report_failure_retry_options: self.report_workflow_failure_retry_options.clone(),
            task_executor_size: self.max_concurrent_decision_task_execution_size,
            enable_logging_in_replay: self.enable_logging_in_replay,
            metrics: self.metrics.clone(),
        }
    }

    fn activity_worker_options(&self) -> SingleWorkerOptions {
        SingleWorkerOptions {
            identity: self.identity.clone(),
            poller_options: self.activity_poller_options.clone(),
            report_completion_retry_options: self.report_activity_completion_retry_options.clone(),
            report_failure_retry_options: self.report_activity_failure_retry_options.clone(),
            task_executor_size: self.max_concurrent_activity_execution_size,
            enable_logging_in_replay: self.enable_logging_in_replay,
            metrics: self.metrics.clone(),
        }
    }
}

/// Hosts workflow and activity processing for one (domain, task list).
/// The same task list name is used for both decision and activity
/// polls. The worker is stateless between decision tasks.
pub struct Worker {
    domain: String,
    task_list: String,
    workflow_worker: Option<WorkflowWorker>,
    activity_worker: Option<ActivityWorker>,
    started: AtomicBool,
}

impl Worker {
    pub fn new(
        service: SharedService,
        domain: impl Into<String>,
        task_list: impl Into<String>,
        options: WorkerOptions,
        decision_handler: Option<Arc<dyn DecisionHandler>>,
        activity_dispatcher: Option<Arc<dyn ActivityTaskDispatcher>>,
    ) -> Self {
        let domain = domain.into();
        let task_list = task_list.into();

        let workflow_worker = match decision_handler {
            Some(handler) if !options.disable_workflow_worker => Some(WorkflowWorker::new(
                service.clone(),
                domain.clone(),
                task_list.clone(),
                options.workflow_worker_options(),
                handler,
            )),
            _ => None,
        };
        let activity_worker = match activity_dispatcher {
            Some(dispatcher) if !options.disable_activity_worker => Some(ActivityWorker::new(
                service,
                domain.clone(),
                task_list.clone(),
                options.activity_worker_options(),
                dispatcher,
            )),
            _ => None,
        };

        Self {
            domain,
            task_list,
            workflow_worker,
            activity_worker,
            started: AtomicBool::new(false),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn task_list(&self) -> &str {
        &self.task_list
    }

    pub fn workflow_worker(&self) -> Option<&WorkflowWorker> {
        self.workflow_worker.as_ref()
    }
}

#[async_trait]
impl SuspendableWorker for Worker {
    fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(domain = %self.domain, task_list = %self.task_list, "starting worker");
        if let Some(worker) = &self.workflow_worker {
            worker.start();
        }
        if let Some(worker) = &self.activity_worker {
            worker.start();
        }
    }

    fn is_running(&self) -> bool {
        self.workflow_worker
            .as_ref()
            .map(|w| w.is_running())
            .unwrap_or(false)
            || self
                .activity_worker
                .as_ref()
                .map(|w| w.is_running())
                .unwrap_or(false)
    }

    fn suspend_polling(&self) {
        if let Some(worker) = &self.workflow_worker {
            worker.suspend_polling();
        }
        if let Some(worker) = &self.activity_worker {
            worker.suspend_polling();
        }
    }

    fn resume_polling(&self) {
        if let Some(worker) = &self.workflow_worker {
            worker.resume_polling();
        }
        if let Some(worker) = &self.activity_worker {
            worker.resume_polling();
        }
    }

    fn shutdown(&self) {
        if let Some(worker) = &self.workflow_worker {
            worker.shutdown();
        }
        if let Some(worker) = &self.activity_worker {
            worker.shutdown();
        }
    }

    fn shutdown_now(&self) {
        if let Some(worker) = &self.workflow_worker {
            worker.shutdown_now();
        }
        if let Some(worker) = &self.activity_worker {
            worker.shutdown_now();
        }
    }

    async fn await_termination(&self, timeout: Duration) -> bool {
        let workflow_done = async {
            match &self.workflow_worker {
                Some(worker) => worker.await_termination(timeout).await,
                None => true,
            }
        };
        let activity_done = async {
            match &self.activity_worker {
                Some(worker) => worker.await_termination(timeout).await,
                None => true,
            }
        };
        let (workflow_done, activity_done) = tokio::join!(workflow_done, activity_done);
        workflow_done && activity_done
    }

    async fn shutdown_and_await_termination(&self, timeout: Duration) -> bool {
        self.shutdown_now();
        self.await_termination(timeout).await
    }
}

//! External client for workflow executions.
//!
//! Thin façade over the workflow service for code outside a worker:
//! start, signal, cancel, terminate, and query executions. Each
//! mutating call carries a fresh request id so the service can
//! deduplicate retried requests.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use windlass_core::{MetricsScope, NoopMetrics, WindlassError, WindlassResult};
use windlass_proto::service::*;
use windlass_proto::shared::*;

pub const WORKFLOW_START_COUNTER: &str = "workflow.start";
pub const WORKFLOW_SIGNAL_COUNTER: &str = "workflow.signal";
pub const WORKFLOW_CANCEL_COUNTER: &str = "workflow.cancel";
pub const WORKFLOW_TERMINATE_COUNTER: &str = "workflow.terminate";
pub const WORKFLOW_QUERY_COUNTER: &str = "workflow.query";

/// Options for starting a workflow execution.
#[derive(Debug, Clone)]
pub struct StartWorkflowOptions {
    pub workflow_id: String,
    pub task_list: String,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub retry_policy: Option<RetryPolicy>,
}

impl StartWorkflowOptions {
    pub fn new(workflow_id: impl Into<String>, task_list: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            task_list: task_list.into(),
            execution_start_to_close_timeout_seconds: 60 * 60 * 24,
            task_start_to_close_timeout_seconds: 10,
            retry_policy: None,
        }
    }
}

pub struct WorkflowClient {
    service: Arc<dyn WorkflowService<Error = WindlassError>>,
    domain: String,
    identity: String,
    metrics: Arc<dyn MetricsScope>,
}

impl WorkflowClient {
    pub fn new(
        service: Arc<dyn WorkflowService<Error = WindlassError>>,
        domain: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            service,
            domain: domain.into(),
            identity: identity.into(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsScope>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn start_request(
        &self,
        options: &StartWorkflowOptions,
        workflow_type: &str,
        input: Option<Vec<u8>>,
    ) -> StartWorkflowExecutionRequest {
        StartWorkflowExecutionRequest {
            domain: self.domain.clone(),
            workflow_id: options.workflow_id.clone(),
            workflow_type: Some(WorkflowType::new(workflow_type)),
            task_list: Some(TaskList::new(options.task_list.clone())),
            input,
            execution_start_to_close_timeout_seconds: options
                .execution_start_to_close_timeout_seconds,
            task_start_to_close_timeout_seconds: options.task_start_to_close_timeout_seconds,
            identity: self.identity.clone(),
            request_id: Uuid::new_v4().to_string(),
            retry_policy: options.retry_policy.clone(),
        }
    }

    /// Starts a new workflow execution and returns its identity.
    pub async fn start_workflow(
        &self,
        options: StartWorkflowOptions,
        workflow_type: &str,
        input: Option<Vec<u8>>,
    ) -> WindlassResult<WorkflowExecution> {
        let request = self.start_request(&options, workflow_type, input);
        let workflow_id = request.workflow_id.clone();
        let response = self.service.start_workflow_execution(request).await?;
        self.metrics.counter(WORKFLOW_START_COUNTER, 1);
        info!(workflow_id = %workflow_id, run_id = %response.run_id, workflow_type, "started workflow");
        Ok(WorkflowExecution::new(workflow_id, response.run_id))
    }

    /// Delivers a signal to a running execution. An empty `run_id`
    /// targets the currently running execution of the workflow id.
    pub async fn signal_workflow(
        &self,
        workflow_id: &str,
        run_id: Option<&str>,
        signal_name: &str,
        input: Option<Vec<u8>>,
    ) -> WindlassResult<()> {
        self.service
            .signal_workflow_execution(SignalWorkflowExecutionRequest {
                domain: self.domain.clone(),
                workflow_execution: Some(WorkflowExecution::new(
                    workflow_id,
                    run_id.unwrap_or_default(),
                )),
                signal_name: signal_name.to_string(),
                input,
                identity: self.identity.clone(),
                request_id: Uuid::new_v4().to_string(),
            })
            .await?;
        self.metrics.counter(WORKFLOW_SIGNAL_COUNTER, 1);
        Ok(())
    }

    /// Signals an execution, starting it first when it is not running.
    pub async fn signal_with_start_workflow(
        &self,
        options: StartWorkflowOptions,
        workflow_type: &str,
        input: Option<Vec<u8>>,
        signal_name: &str,
        signal_input: Option<Vec<u8>>,
    ) -> WindlassResult<WorkflowExecution> {
        let start_request = self.start_request(&options, workflow_type, input);
        let workflow_id = start_request.workflow_id.clone();
        let response = self
            .service
            .signal_with_start_workflow_execution(SignalWithStartWorkflowExecutionRequest {
                start_request,
                signal_name: signal_name.to_string(),
                signal_input,
            })
            .await?;
        self.metrics.counter(WORKFLOW_SIGNAL_COUNTER, 1);
        Ok(WorkflowExecution::new(workflow_id, response.run_id))
    }

    /// Requests cooperative cancellation of an execution.
    pub async fn request_cancel_workflow(
        &self,
        workflow_id: &str,
        run_id: Option<&str>,
    ) -> WindlassResult<()> {
        self.service
            .request_cancel_workflow_execution(RequestCancelWorkflowExecutionRequest {
                domain: self.domain.clone(),
                workflow_execution: Some(WorkflowExecution::new(
                    workflow_id,
                    run_id.unwrap_or_default(),
                )),
                identity: self.identity.clone(),
                request_id: Uuid::new_v4().to_string(),
            })
            .await?;
        self.metrics.counter(WORKFLOW_CANCEL_COUNTER, 1);
        Ok(())
    }

    /// Terminates an execution without giving it a chance to clean up.
    pub async fn terminate_workflow(
        &self,
        workflow_id: &str,
        run_id: Option<&str>,
        reason: Option<&str>,
        details: Option<Vec<u8>>,
    ) -> WindlassResult<()> {
        self.service
            .terminate_workflow_execution(TerminateWorkflowExecutionRequest {
                domain: self.domain.clone(),
                workflow_execution: Some(WorkflowExecution::new(
                    workflow_id,
                    run_id.unwrap_or_default(),
                )),
                reason: reason.map(|r| r.to_string()),
                details,
                identity: self.identity.clone(),
            })
            .await?;
        self.metrics.counter(WORKFLOW_TERMINATE_COUNTER, 1);
        Ok(())
    }

    /// Runs a read-only query against an execution's state.
    pub async fn query_workflow(
        &self,
        workflow_id: &str,
        run_id: Option<&str>,
        query_type: &str,
        query_args: Option<Vec<u8>>,
    ) -> WindlassResult<Vec<u8>> {
        let response = self
            .service
            .query_workflow(QueryWorkflowRequest {
                domain: self.domain.clone(),
                execution: Some(WorkflowExecution::new(
                    workflow_id,
                    run_id.unwrap_or_default(),
                )),
                query: Some(WorkflowQuery {
                    query_type: query_type.to_string(),
                    query_args,
                }),
            })
            .await?;
        self.metrics.counter(WORKFLOW_QUERY_COUNTER, 1);
        response
            .query_result
            .ok_or_else(|| WindlassError::Generic("query returned no result".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        starts: Mutex<Vec<StartWorkflowExecutionRequest>>,
        signals: Mutex<Vec<SignalWorkflowExecutionRequest>>,
        cancels: Mutex<Vec<RequestCancelWorkflowExecutionRequest>>,
        terminations: Mutex<Vec<TerminateWorkflowExecutionRequest>>,
        queries: Mutex<Vec<QueryWorkflowRequest>>,
    }

    #[async_trait]
    impl WorkflowService for RecordingService {
        type Error = WindlassError;

        async fn poll_for_decision_task(
            &self,
            _request: PollForDecisionTaskRequest,
        ) -> WindlassResult<PollForDecisionTaskResponse> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn respond_decision_task_completed(
            &self,
            _request: RespondDecisionTaskCompletedRequest,
        ) -> WindlassResult<RespondDecisionTaskCompletedResponse> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn respond_decision_task_failed(
            &self,
            _request: RespondDecisionTaskFailedRequest,
        ) -> WindlassResult<()> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn respond_query_task_completed(
            &self,
            _request: RespondQueryTaskCompletedRequest,
        ) -> WindlassResult<()> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn poll_for_activity_task(
            &self,
            _request: PollForActivityTaskRequest,
        ) -> WindlassResult<PollForActivityTaskResponse> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn respond_activity_task_completed(
            &self,
            _request: RespondActivityTaskCompletedRequest,
        ) -> WindlassResult<()> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn respond_activity_task_failed(
            &self,
            _request: RespondActivityTaskFailedRequest,
        ) -> WindlassResult<()> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn respond_activity_task_canceled(
            &self,
            _request: RespondActivityTaskCanceledRequest,
        ) -> WindlassResult<()> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn get_workflow_execution_history(
            &self,
            _request: GetWorkflowExecutionHistoryRequest,
        ) -> WindlassResult<GetWorkflowExecutionHistoryResponse> {
            Err(WindlassError::Generic("not supported".into()))
        }

        async fn start_workflow_execution(
            &self,
            request: StartWorkflowExecutionRequest,
        ) -> WindlassResult<StartWorkflowExecutionResponse> {
            self.starts.lock().unwrap().push(request);
            Ok(StartWorkflowExecutionResponse {
                run_id: "run-1".into(),
            })
        }

        async fn signal_workflow_execution(
            &self,
            request: SignalWorkflowExecutionRequest,
        ) -> WindlassResult<()> {
            self.signals.lock().unwrap().push(request);
            Ok(())
        }

        async fn signal_with_start_workflow_execution(
            &self,
            request: SignalWithStartWorkflowExecutionRequest,
        ) -> WindlassResult<StartWorkflowExecutionResponse> {
            self.starts.lock().unwrap().push(request.start_request);
            Ok(StartWorkflowExecutionResponse {
                run_id: "run-2".into(),
            })
        }

        async fn request_cancel_workflow_execution(
            &self,
            request: RequestCancelWorkflowExecutionRequest,
        ) -> WindlassResult<()> {
            self.cancels.lock().unwrap().push(request);
            Ok(())
        }

        async fn terminate_workflow_execution(
            &self,
            request: TerminateWorkflowExecutionRequest,
        ) -> WindlassResult<()> {
            self.terminations.lock().unwrap().push(request);
            Ok(())
        }

        async fn query_workflow(
            &self,
            request: QueryWorkflowRequest,
        ) -> WindlassResult<QueryWorkflowResponse> {
            self.queries.lock().unwrap().push(request);
            Ok(QueryWorkflowResponse {
                query_result: Some(b"answer".to_vec()),
            })
        }
    }

    fn client(service: Arc<RecordingService>) -> WorkflowClient {
        let shared: Arc<dyn WorkflowService<Error = WindlassError>> = service;
        WorkflowClient::new(shared, "orders", "client-1")
    }

    #[tokio::test]
    async fn start_workflow_fills_request_and_returns_execution() {
        let service = Arc::new(RecordingService::default());
        let execution = client(service.clone())
            .start_workflow(
                StartWorkflowOptions::new("wf-1", "tl"),
                "Order",
                Some(b"in".to_vec()),
            )
            .await
            .unwrap();

        assert_eq!(execution.workflow_id, "wf-1");
        assert_eq!(execution.run_id, "run-1");

        let starts = service.starts.lock().unwrap();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].domain, "orders");
        assert_eq!(starts[0].identity, "client-1");
        assert_eq!(starts[0].workflow_type.as_ref().unwrap().name, "Order");
        assert!(!starts[0].request_id.is_empty());
    }

    #[tokio::test]
    async fn each_start_carries_a_fresh_request_id() {
        let service = Arc::new(RecordingService::default());
        let c = client(service.clone());
        c.start_workflow(StartWorkflowOptions::new("wf-1", "tl"), "Order", None)
            .await
            .unwrap();
        c.start_workflow(StartWorkflowOptions::new("wf-2", "tl"), "Order", None)
            .await
            .unwrap();

        let starts = service.starts.lock().unwrap();
        assert_ne!(starts[0].request_id, starts[1].request_id);
    }

    #[tokio::test]
    async fn signal_and_cancel_target_the_execution() {
        let service = Arc::new(RecordingService::default());
        let c = client(service.clone());
        c.signal_workflow("wf-1", Some("run-1"), "poke", Some(b"hi".to_vec()))
            .await
            .unwrap();
        c.request_cancel_workflow("wf-1", None).await.unwrap();

        let signals = service.signals.lock().unwrap();
        assert_eq!(signals[0].signal_name, "poke");
        assert_eq!(
            signals[0].workflow_execution.as_ref().unwrap().run_id,
            "run-1"
        );
        let cancels = service.cancels.lock().unwrap();
        assert_eq!(
            cancels[0].workflow_execution.as_ref().unwrap().workflow_id,
            "wf-1"
        );
    }

    #[tokio::test]
    async fn query_returns_result_bytes() {
        let service = Arc::new(RecordingService::default());
        let result = client(service.clone())
            .query_workflow("wf-1", None, "state", None)
            .await
            .unwrap();
        assert_eq!(result, b"answer");
        assert_eq!(
            service.queries.lock().unwrap()[0]
                .query
                .as_ref()
                .unwrap()
                .query_type,
            "state"
        );
    }

    #[tokio::test]
    async fn terminate_carries_reason() {
        let service = Arc::new(RecordingService::default());
        client(service.clone())
            .terminate_workflow("wf-1", Some("run-1"), Some("stuck"), None)
            .await
            .unwrap();
        let terminations = service.terminations.lock().unwrap();
        assert_eq!(terminations[0].reason.as_deref(), Some("stuck"));
    }
}

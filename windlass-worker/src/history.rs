//! History access for decision tasks.
//!
//! A decision task carries the first page of the execution's history;
//! the rest is fetched lazily through `GetWorkflowExecutionHistory`.
//! Pagination runs under the wall-clock budget the workflow's started
//! event grants a single decision task: once
//! `task_start_to_close_timeout_seconds` elapses the task is lost
//! anyway, so iteration fails fast instead of fetching more pages.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use windlass_core::{retry, MetricsScope, RetryOptions, WindlassError, WindlassResult};
use windlass_proto::service::*;
use windlass_proto::shared::*;

use crate::metrics;

pub const MAXIMUM_PAGE_SIZE: i32 = 10_000;

/// A decision task plus lazy access to the full event history backing
/// it. Events come back in strict `event_id` order.
#[async_trait]
pub trait DecisionTaskHistory: Send {
    fn decision_task(&self) -> &PollForDecisionTaskResponse;
    fn started_attributes(&self) -> &WorkflowExecutionStartedEventAttributes;

    /// Next event, `None` when history is exhausted. Errors surface
    /// pagination failures and budget exhaustion.
    async fn next_event(&mut self) -> Option<WindlassResult<HistoryEvent>>;
}

fn started_attributes_of(history: Option<&History>) -> WindlassResult<WorkflowExecutionStartedEventAttributes> {
    let first = history.and_then(|h| h.events.first());
    match first {
        Some(event) => match &event.attributes {
            Some(EventAttributes::WorkflowExecutionStarted(attrs)) => Ok((**attrs).clone()),
            _ => Err(WindlassError::InvalidArgument(
                "first event in the history is not WorkflowExecutionStarted".to_string(),
            )),
        },
        None => Err(WindlassError::InvalidArgument(
            "decision task has an empty history".to_string(),
        )),
    }
}

/// Iterator over the live, paginated history of a polled decision task.
pub struct PagedHistoryIterator {
    service: Arc<dyn WorkflowService<Error = WindlassError>>,
    domain: String,
    task: PollForDecisionTaskResponse,
    started_attributes: WorkflowExecutionStartedEventAttributes,
    current: VecDeque<HistoryEvent>,
    next_page_token: Option<Vec<u8>>,
    started_at: Instant,
    metrics: Arc<dyn MetricsScope>,
}

impl PagedHistoryIterator {
    pub fn new(
        service: Arc<dyn WorkflowService<Error = WindlassError>>,
        domain: impl Into<String>,
        task: PollForDecisionTaskResponse,
        metrics: Arc<dyn MetricsScope>,
    ) -> WindlassResult<Self> {
        let started_attributes = started_attributes_of(task.history.as_ref())?;
        let current = task
            .history
            .as_ref()
            .map(|h| h.events.iter().cloned().collect())
            .unwrap_or_default();
        let next_page_token = task.next_page_token.clone();
        Ok(Self {
            service,
            domain: domain.into(),
            task,
            started_attributes,
            current,
            next_page_token,
            started_at: Instant::now(),
            metrics,
        })
    }

    fn task_timeout(&self) -> Duration {
        let seconds = self.started_attributes.task_start_to_close_timeout_seconds;
        Duration::from_secs(seconds.max(0) as u64)
    }

    async fn fetch_next_page(&mut self, next_page_token: Vec<u8>) -> WindlassResult<()> {
        let timeout = self.task_timeout();
        let elapsed = self.started_at.elapsed();
        if elapsed >= timeout {
            return Err(WindlassError::PaginationTimeout { timeout });
        }

        self.metrics
            .counter(metrics::WORKFLOW_GET_HISTORY_COUNTER, 1);
        let fetch_started = Instant::now();
        let retry_options = RetryOptions::new(Duration::from_millis(50))
            .with_maximum_interval(Duration::from_secs(1))
            .with_expiration(timeout - elapsed);
        let request = GetWorkflowExecutionHistoryRequest {
            domain: self.domain.clone(),
            execution: self.task.workflow_execution.clone(),
            maximum_page_size: MAXIMUM_PAGE_SIZE,
            next_page_token: Some(next_page_token),
        };
        let service = self.service.clone();
        let result = retry(&retry_options, || {
            let service = service.clone();
            let request = request.clone();
            async move { service.get_workflow_execution_history(request).await }
        })
        .await;

        match result {
            Ok(response) => {
                self.metrics
                    .counter(metrics::WORKFLOW_GET_HISTORY_SUCCEED_COUNTER, 1);
                self.metrics
                    .timer(metrics::WORKFLOW_GET_HISTORY_LATENCY, fetch_started.elapsed());
                if let Some(history) = response.history {
                    self.current.extend(history.events);
                }
                self.next_page_token = response.next_page_token;
                Ok(())
            }
            Err(error) => {
                self.metrics
                    .counter(metrics::WORKFLOW_GET_HISTORY_FAILED_COUNTER, 1);
                Err(error)
            }
        }
    }
}

#[async_trait]
impl DecisionTaskHistory for PagedHistoryIterator {
    fn decision_task(&self) -> &PollForDecisionTaskResponse {
        &self.task
    }

    fn started_attributes(&self) -> &WorkflowExecutionStartedEventAttributes {
        &self.started_attributes
    }

    async fn next_event(&mut self) -> Option<WindlassResult<HistoryEvent>> {
        loop {
            if let Some(event) = self.current.pop_front() {
                return Some(Ok(event));
            }
            let next_page_token = self.next_page_token.take()?;
            if let Err(error) = self.fetch_next_page(next_page_token).await {
                return Some(Err(error));
            }
        }
    }
}

/// Iterator over a pre-supplied event sequence, for offline
/// replay-and-query without polling. The synthesized decision task has
/// `started_event_id` and `previous_started_event_id` pinned past any
/// real event id.
#[derive(Debug)]
pub struct ReplayHistoryIterator {
    task: PollForDecisionTaskResponse,
    started_attributes: WorkflowExecutionStartedEventAttributes,
    events: VecDeque<HistoryEvent>,
}

impl ReplayHistoryIterator {
    pub fn new(
        execution: WorkflowExecution,
        events: Vec<HistoryEvent>,
        query: Option<WorkflowQuery>,
    ) -> WindlassResult<Self> {
        let history = History {
            events: events.clone(),
        };
        let started_attributes = started_attributes_of(Some(&history))?;
        let task = PollForDecisionTaskResponse {
            workflow_execution: Some(execution),
            workflow_type: started_attributes.workflow_type.clone(),
            started_event_id: i64::MAX,
            previous_started_event_id: i64::MAX,
            query,
            ..PollForDecisionTaskResponse::default()
        };
        Ok(Self {
            task,
            started_attributes,
            events: events.into(),
        })
    }
}

#[async_trait]
impl DecisionTaskHistory for ReplayHistoryIterator {
    fn decision_task(&self) -> &PollForDecisionTaskResponse {
        &self.task
    }

    fn started_attributes(&self) -> &WorkflowExecutionStartedEventAttributes {
        &self.started_attributes
    }

    async fn next_event(&mut self) -> Option<WindlassResult<HistoryEvent>> {
        self.events.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_event(task_timeout_seconds: i32) -> HistoryEvent {
        HistoryEvent::new(
            1,
            EventType::WorkflowExecutionStarted,
            Some(EventAttributes::WorkflowExecutionStarted(Box::new(
                WorkflowExecutionStartedEventAttributes {
                    workflow_type: Some(WorkflowType::new("Order")),
                    parent_workflow_execution: None,
                    task_list: Some(TaskList::new("tl")),
                    input: None,
                    execution_start_to_close_timeout_seconds: 60,
                    task_start_to_close_timeout_seconds: task_timeout_seconds,
                    identity: "starter".into(),
                    continued_execution_run_id: None,
                    retry_policy: None,
                    attempt: 0,
                },
            ))),
        )
    }

    #[tokio::test]
    async fn replay_iterator_requires_started_event() {
        let events = vec![HistoryEvent::new(1, EventType::DecisionTaskScheduled, None)];
        let result =
            ReplayHistoryIterator::new(WorkflowExecution::new("wf", "run"), events, None);
        assert!(matches!(
            result.unwrap_err(),
            WindlassError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn replay_iterator_yields_events_in_order() {
        let events = vec![
            started_event(10),
            HistoryEvent::new(2, EventType::DecisionTaskScheduled, None),
            HistoryEvent::new(3, EventType::DecisionTaskStarted, None),
        ];
        let mut iterator =
            ReplayHistoryIterator::new(WorkflowExecution::new("wf", "run"), events, None)
                .unwrap();
        assert_eq!(iterator.decision_task().started_event_id, i64::MAX);
        assert_eq!(iterator.decision_task().previous_started_event_id, i64::MAX);

        let mut ids = Vec::new();
        while let Some(event) = iterator.next_event().await {
            ids.push(event.unwrap().event_id);
        }
        assert_eq!(ids, [1, 2, 3]);
    }
}

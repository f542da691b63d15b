//! Shared types used across the windlass protocol.
//!
//! History events are strictly ordered by `event_id` and append-only;
//! each carries a type-specific attributes payload. Decisions are the
//! commands a worker returns from a decision task.

use serde::{Deserialize, Serialize};

/// Unique identifier for a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
}

impl WorkflowType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityType {
    pub name: String,
}

impl ActivityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Named queue that workers long-poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskList {
    pub name: String,
    pub kind: TaskListKind,
}

impl TaskList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TaskListKind::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TaskListKind {
    Normal = 0,
    Sticky = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum TimeoutType {
    StartToClose = 0,
    ScheduleToStart = 1,
    ScheduleToClose = 2,
    Heartbeat = 3,
}

/// Retry policy as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_interval_in_seconds: i32,
    pub backoff_coefficient: f64,
    pub maximum_interval_in_seconds: i32,
    pub maximum_attempts: i32,
    pub non_retryable_error_types: Vec<String>,
    pub expiration_interval_in_seconds: i32,
}

/// A single record in a workflow execution's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: i64,
    /// Nanoseconds since epoch.
    pub timestamp: i64,
    pub event_type: EventType,
    pub attributes: Option<EventAttributes>,
}

impl HistoryEvent {
    pub fn new(event_id: i64, event_type: EventType, attributes: Option<EventAttributes>) -> Self {
        Self {
            event_id,
            timestamp: 0,
            event_type,
            attributes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum EventType {
    WorkflowExecutionStarted = 0,
    WorkflowExecutionCompleted = 1,
    WorkflowExecutionFailed = 2,
    WorkflowExecutionTimedOut = 3,
    DecisionTaskScheduled = 4,
    DecisionTaskStarted = 5,
    DecisionTaskCompleted = 6,
    DecisionTaskTimedOut = 7,
    DecisionTaskFailed = 8,
    ActivityTaskScheduled = 9,
    ActivityTaskStarted = 10,
    ActivityTaskCompleted = 11,
    ActivityTaskFailed = 12,
    ActivityTaskTimedOut = 13,
    ActivityTaskCancelRequested = 14,
    RequestCancelActivityTaskFailed = 15,
    ActivityTaskCanceled = 16,
    TimerStarted = 17,
    TimerFired = 18,
    CancelTimerFailed = 19,
    TimerCanceled = 20,
    WorkflowExecutionCancelRequested = 21,
    WorkflowExecutionCanceled = 22,
    RequestCancelExternalWorkflowExecutionInitiated = 23,
    RequestCancelExternalWorkflowExecutionFailed = 24,
    ExternalWorkflowExecutionCancelRequested = 25,
    WorkflowExecutionContinuedAsNew = 26,
    WorkflowExecutionSignaled = 27,
    WorkflowExecutionTerminated = 28,
    SignalExternalWorkflowExecutionInitiated = 29,
    SignalExternalWorkflowExecutionFailed = 30,
    ExternalWorkflowExecutionSignaled = 31,
    StartChildWorkflowExecutionInitiated = 32,
    StartChildWorkflowExecutionFailed = 33,
    ChildWorkflowExecutionStarted = 34,
    ChildWorkflowExecutionCompleted = 35,
    ChildWorkflowExecutionFailed = 36,
    ChildWorkflowExecutionTimedOut = 37,
    ChildWorkflowExecutionCanceled = 38,
    ChildWorkflowExecutionTerminated = 39,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventAttributes {
    WorkflowExecutionStarted(Box<WorkflowExecutionStartedEventAttributes>),
    DecisionTaskScheduled(Box<DecisionTaskScheduledEventAttributes>),
    DecisionTaskStarted(Box<DecisionTaskStartedEventAttributes>),
    DecisionTaskCompleted(Box<DecisionTaskCompletedEventAttributes>),
    ActivityTaskScheduled(Box<ActivityTaskScheduledEventAttributes>),
    ActivityTaskStarted(Box<ActivityTaskStartedEventAttributes>),
    ActivityTaskCompleted(Box<ActivityTaskCompletedEventAttributes>),
    ActivityTaskFailed(Box<ActivityTaskFailedEventAttributes>),
    ActivityTaskTimedOut(Box<ActivityTaskTimedOutEventAttributes>),
    ActivityTaskCancelRequested(Box<ActivityTaskCancelRequestedEventAttributes>),
    RequestCancelActivityTaskFailed(Box<RequestCancelActivityTaskFailedEventAttributes>),
    ActivityTaskCanceled(Box<ActivityTaskCanceledEventAttributes>),
    TimerStarted(Box<TimerStartedEventAttributes>),
    TimerFired(Box<TimerFiredEventAttributes>),
    CancelTimerFailed(Box<CancelTimerFailedEventAttributes>),
    TimerCanceled(Box<TimerCanceledEventAttributes>),
    WorkflowExecutionSignaled(Box<WorkflowExecutionSignaledEventAttributes>),
    WorkflowExecutionCancelRequested(Box<WorkflowExecutionCancelRequestedEventAttributes>),
    StartChildWorkflowExecutionInitiated(Box<StartChildWorkflowExecutionInitiatedEventAttributes>),
    StartChildWorkflowExecutionFailed(Box<StartChildWorkflowExecutionFailedEventAttributes>),
    ChildWorkflowExecutionStarted(Box<ChildWorkflowExecutionStartedEventAttributes>),
    ChildWorkflowExecutionCompleted(Box<ChildWorkflowExecutionCompletedEventAttributes>),
    ChildWorkflowExecutionFailed(Box<ChildWorkflowExecutionFailedEventAttributes>),
    ChildWorkflowExecutionTimedOut(Box<ChildWorkflowExecutionTimedOutEventAttributes>),
    ChildWorkflowExecutionCanceled(Box<ChildWorkflowExecutionCanceledEventAttributes>),
    SignalExternalWorkflowExecutionInitiated(
        Box<SignalExternalWorkflowExecutionInitiatedEventAttributes>,
    ),
    SignalExternalWorkflowExecutionFailed(Box<SignalExternalWorkflowExecutionFailedEventAttributes>),
    ExternalWorkflowExecutionSignaled(Box<ExternalWorkflowExecutionSignaledEventAttributes>),
    RequestCancelExternalWorkflowExecutionInitiated(
        Box<RequestCancelExternalWorkflowExecutionInitiatedEventAttributes>,
    ),
    RequestCancelExternalWorkflowExecutionFailed(
        Box<RequestCancelExternalWorkflowExecutionFailedEventAttributes>,
    ),
    ExternalWorkflowExecutionCancelRequested(
        Box<ExternalWorkflowExecutionCancelRequestedEventAttributes>,
    ),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionStartedEventAttributes {
    pub workflow_type: Option<WorkflowType>,
    pub parent_workflow_execution: Option<WorkflowExecution>,
    pub task_list: Option<TaskList>,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub identity: String,
    pub continued_execution_run_id: Option<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub attempt: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskScheduledEventAttributes {
    pub task_list: Option<TaskList>,
    pub start_to_close_timeout_seconds: i32,
    pub attempt: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskStartedEventAttributes {
    pub scheduled_event_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskCompletedEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub identity: String,
    /// Opaque workflow context blob echoed back to the worker.
    pub execution_context: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskScheduledEventAttributes {
    pub activity_id: String,
    pub activity_type: Option<ActivityType>,
    pub task_list: Option<TaskList>,
    pub input: Option<Vec<u8>>,
    pub schedule_to_close_timeout_seconds: Option<i32>,
    pub schedule_to_start_timeout_seconds: Option<i32>,
    pub start_to_close_timeout_seconds: Option<i32>,
    pub heartbeat_timeout_seconds: Option<i32>,
    pub decision_task_completed_event_id: i64,
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskStartedEventAttributes {
    pub scheduled_event_id: i64,
    pub identity: String,
    pub attempt: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCompletedEventAttributes {
    pub result: Option<Vec<u8>>,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskFailedEventAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskTimedOutEventAttributes {
    pub details: Option<Vec<u8>>,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub timeout_type: TimeoutType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCancelRequestedEventAttributes {
    pub activity_id: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelActivityTaskFailedEventAttributes {
    pub activity_id: String,
    pub cause: Option<String>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCanceledEventAttributes {
    pub details: Option<Vec<u8>>,
    pub latest_cancel_requested_event_id: i64,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStartedEventAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout_seconds: i64,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerFiredEventAttributes {
    pub timer_id: String,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelTimerFailedEventAttributes {
    pub timer_id: String,
    pub cause: Option<String>,
    pub decision_task_completed_event_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerCanceledEventAttributes {
    pub timer_id: String,
    pub started_event_id: i64,
    pub decision_task_completed_event_id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionSignaledEventAttributes {
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionCancelRequestedEventAttributes {
    pub cause: Option<String>,
    pub external_workflow_execution: Option<WorkflowExecution>,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionInitiatedEventAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: Option<WorkflowType>,
    pub task_list: Option<TaskList>,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: Option<i32>,
    pub task_start_to_close_timeout_seconds: Option<i32>,
    pub decision_task_completed_event_id: i64,
    pub control: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionFailedEventAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: Option<WorkflowType>,
    pub cause: Option<String>,
    pub initiated_event_id: i64,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionStartedEventAttributes {
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
    pub workflow_type: Option<WorkflowType>,
    pub initiated_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionCompletedEventAttributes {
    pub result: Option<Vec<u8>>,
    pub workflow_execution: Option<WorkflowExecution>,
    pub workflow_type: Option<WorkflowType>,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionFailedEventAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub workflow_execution: Option<WorkflowExecution>,
    pub workflow_type: Option<WorkflowType>,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionTimedOutEventAttributes {
    pub timeout_type: TimeoutType,
    pub workflow_execution: Option<WorkflowExecution>,
    pub workflow_type: Option<WorkflowType>,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionCanceledEventAttributes {
    pub details: Option<Vec<u8>>,
    pub workflow_execution: Option<WorkflowExecution>,
    pub workflow_type: Option<WorkflowType>,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionInitiatedEventAttributes {
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    /// Worker-generated token identifying the signal decision.
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionFailedEventAttributes {
    pub cause: Option<String>,
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
    pub initiated_event_id: i64,
    pub control: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalWorkflowExecutionSignaledEventAttributes {
    pub initiated_event_id: i64,
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
    pub control: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionInitiatedEventAttributes {
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionFailedEventAttributes {
    pub cause: Option<String>,
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
    pub initiated_event_id: i64,
    pub control: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalWorkflowExecutionCancelRequestedEventAttributes {
    pub initiated_event_id: i64,
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
}

/// History of a workflow execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct History {
    pub events: Vec<HistoryEvent>,
}

/// Why a decision task was reported failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum DecisionTaskFailedCause {
    UnhandledDecision = 0,
    BadScheduleActivityAttributes = 1,
    BadStartTimerAttributes = 2,
    WorkflowWorkerUnhandledFailure = 3,
    BadContinueAsNewAttributes = 4,
}

/// Commands a worker emits from a decision task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum DecisionType {
    ScheduleActivityTask = 0,
    RequestCancelActivityTask = 1,
    StartTimer = 2,
    CancelTimer = 3,
    CompleteWorkflowExecution = 4,
    FailWorkflowExecution = 5,
    CancelWorkflowExecution = 6,
    ContinueAsNewWorkflowExecution = 7,
    StartChildWorkflowExecution = 8,
    SignalExternalWorkflowExecution = 9,
    RequestCancelExternalWorkflowExecution = 10,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_type: DecisionType,
    pub attributes: Option<DecisionAttributes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecisionAttributes {
    ScheduleActivityTask(Box<ScheduleActivityTaskDecisionAttributes>),
    RequestCancelActivityTask(Box<RequestCancelActivityTaskDecisionAttributes>),
    StartTimer(Box<StartTimerDecisionAttributes>),
    CancelTimer(Box<CancelTimerDecisionAttributes>),
    CompleteWorkflowExecution(Box<CompleteWorkflowExecutionDecisionAttributes>),
    FailWorkflowExecution(Box<FailWorkflowExecutionDecisionAttributes>),
    CancelWorkflowExecution(Box<CancelWorkflowExecutionDecisionAttributes>),
    ContinueAsNewWorkflowExecution(Box<ContinueAsNewWorkflowExecutionDecisionAttributes>),
    StartChildWorkflowExecution(Box<StartChildWorkflowExecutionDecisionAttributes>),
    SignalExternalWorkflowExecution(Box<SignalExternalWorkflowExecutionDecisionAttributes>),
    RequestCancelExternalWorkflowExecution(
        Box<RequestCancelExternalWorkflowExecutionDecisionAttributes>,
    ),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleActivityTaskDecisionAttributes {
    pub activity_id: String,
    pub activity_type: Option<ActivityType>,
    pub task_list: Option<TaskList>,
    pub input: Option<Vec<u8>>,
    pub schedule_to_close_timeout_seconds: Option<i32>,
    pub schedule_to_start_timeout_seconds: Option<i32>,
    pub start_to_close_timeout_seconds: Option<i32>,
    pub heartbeat_timeout_seconds: Option<i32>,
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelActivityTaskDecisionAttributes {
    pub activity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTimerDecisionAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelTimerDecisionAttributes {
    pub timer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteWorkflowExecutionDecisionAttributes {
    pub result: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailWorkflowExecutionDecisionAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelWorkflowExecutionDecisionAttributes {
    pub details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueAsNewWorkflowExecutionDecisionAttributes {
    pub workflow_type: Option<WorkflowType>,
    pub task_list: Option<TaskList>,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: Option<i32>,
    pub task_start_to_close_timeout_seconds: Option<i32>,
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: Option<WorkflowType>,
    pub task_list: Option<TaskList>,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: Option<i32>,
    pub task_start_to_close_timeout_seconds: Option<i32>,
    pub control: Option<String>,
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_execution: Option<WorkflowExecution>,
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: Option<String>,
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

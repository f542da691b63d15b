//! Fixed metric names emitted by the workers.

pub const WORKER_START_COUNTER: &str = "worker.start";
pub const POLLER_START_COUNTER: &str = "poller.start";

pub const DECISION_POLL_COUNTER: &str = "decision.poll.counter";
pub const DECISION_POLL_LATENCY: &str = "decision.poll.latency";
pub const DECISION_POLL_NO_TASK_COUNTER: &str = "decision.poll.no-task";
pub const DECISION_POLL_SUCCEED_COUNTER: &str = "decision.poll.succeed";
pub const DECISION_POLL_FAILED_COUNTER: &str = "decision.poll.failed";
pub const DECISION_POLL_TRANSIENT_FAILED_COUNTER: &str = "decision.poll.transient-failed";

pub const DECISION_EXECUTION_LATENCY: &str = "decision.execution-latency";
pub const DECISION_RESPONSE_LATENCY: &str = "decision.response-latency";
pub const DECISION_TASK_COMPLETED_COUNTER: &str = "decision.task-completed";

pub const ACTIVITY_POLL_COUNTER: &str = "activity.poll.counter";
pub const ACTIVITY_POLL_LATENCY: &str = "activity.poll.latency";
pub const ACTIVITY_POLL_NO_TASK_COUNTER: &str = "activity.poll.no-task";
pub const ACTIVITY_POLL_SUCCEED_COUNTER: &str = "activity.poll.succeed";
pub const ACTIVITY_POLL_FAILED_COUNTER: &str = "activity.poll.failed";
pub const ACTIVITY_POLL_TRANSIENT_FAILED_COUNTER: &str = "activity.poll.transient-failed";

pub const ACTIVITY_EXEC_LATENCY: &str = "activity.exec-latency";
pub const ACTIVITY_RESP_LATENCY: &str = "activity.resp-latency";
pub const ACTIVITY_E2E_LATENCY: &str = "activity.e2e-latency";
pub const ACTIVITY_TASK_COMPLETED_COUNTER: &str = "activity.task.completed";
pub const ACTIVITY_TASK_FAILED_COUNTER: &str = "activity.task.failed";
pub const ACTIVITY_TASK_CANCELED_COUNTER: &str = "activity.task.canceled";

pub const TASK_LIST_QUEUE_LATENCY: &str = "tasklist.queue-latency";

pub const WORKFLOW_GET_HISTORY_COUNTER: &str = "workflow.get-history.counter";
pub const WORKFLOW_GET_HISTORY_LATENCY: &str = "workflow.get-history.latency";
pub const WORKFLOW_GET_HISTORY_SUCCEED_COUNTER: &str = "workflow.get-history.succeed";
pub const WORKFLOW_GET_HISTORY_FAILED_COUNTER: &str = "workflow.get-history.failed";

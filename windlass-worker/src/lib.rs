//! Worker side of the windlass client.
//!
//! A worker long-polls the service for decision and activity tasks on
//! one (domain, task list) pair, dispatches them to user-supplied
//! handlers, and reports results back. Polling runs on a fixed pool of
//! identical poll loops with exponential backoff, optional rate
//! limiting, and cooperative suspension.

pub mod activity_worker;
pub mod history;
pub mod metrics;
pub mod poller;
pub mod throttle;
pub mod worker;
pub mod workflow_worker;

pub use activity_worker::{ActivityTaskDispatcher, ActivityWorker};
pub use history::{DecisionTaskHistory, PagedHistoryIterator, ReplayHistoryIterator};
pub use poller::{Poller, PollerOptions, SuspendableWorker, TaskHandler};
pub use throttle::{BackoffThrottler, RateThrottler};
pub use worker::{Worker, WorkerOptions};
pub use workflow_worker::{
    DecisionHandler, DecisionTaskOutcome, SingleWorkerOptions, WorkflowWorker,
};

//! Error types for the windlass client.
//!
//! Two layers: `ServiceError` mirrors the fault taxonomy of the remote
//! workflow service, and `WindlassError` is the crate-wide error that
//! everything else wraps. Every error exposes a stable `kind()` string
//! that retry policies match against, mirroring the error-type names
//! used on the wire.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Timeout classification attached to timeout errors and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutType {
    StartToClose,
    ScheduleToStart,
    ScheduleToClose,
    Heartbeat,
}

impl fmt::Display for TimeoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutType::StartToClose => write!(f, "START_TO_CLOSE"),
            TimeoutType::ScheduleToStart => write!(f, "SCHEDULE_TO_START"),
            TimeoutType::ScheduleToClose => write!(f, "SCHEDULE_TO_CLOSE"),
            TimeoutType::Heartbeat => write!(f, "HEARTBEAT"),
        }
    }
}

/// Errors returned by the remote workflow service.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("BadRequestError: {0}")]
    BadRequest(String),

    #[error("EntityNotExistsError: {0}")]
    EntityNotExists(String),

    #[error("WorkflowExecutionAlreadyStartedError: {0}")]
    WorkflowExecutionAlreadyStarted(String),

    #[error("WorkflowExecutionAlreadyCompletedError: {0}")]
    WorkflowExecutionAlreadyCompleted(String),

    #[error("DomainNotActiveError: {0}")]
    DomainNotActive(String),

    #[error("QueryFailedError: {0}")]
    QueryFailed(String),

    #[error("AccessDeniedError: {0}")]
    AccessDenied(String),

    #[error("ServiceBusyError: {0}")]
    ServiceBusy(String),

    #[error("InternalServiceError: {0}")]
    InternalService(String),
}

impl ServiceError {
    /// Transient faults are safe to retry; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::ServiceBusy(_) | ServiceError::InternalService(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "BadRequestError",
            ServiceError::EntityNotExists(_) => "EntityNotExistsError",
            ServiceError::WorkflowExecutionAlreadyStarted(_) => {
                "WorkflowExecutionAlreadyStartedError"
            }
            ServiceError::WorkflowExecutionAlreadyCompleted(_) => {
                "WorkflowExecutionAlreadyCompletedError"
            }
            ServiceError::DomainNotActive(_) => "DomainNotActiveError",
            ServiceError::QueryFailed(_) => "QueryFailedError",
            ServiceError::AccessDenied(_) => "AccessDeniedError",
            ServiceError::ServiceBusy(_) => "ServiceBusyError",
            ServiceError::InternalService(_) => "InternalServiceError",
        }
    }
}

/// Main windlass error type.
#[derive(Debug, Error)]
pub enum WindlassError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("CanceledError: details={details:?}")]
    Canceled { details: Option<Vec<u8>> },

    #[error("TimeoutError: timeout_type={timeout_type}")]
    Timeout {
        timeout_type: TimeoutType,
        details: Option<Vec<u8>>,
    },

    /// A workflow-visible activity failure. The retry evaluator consults
    /// the cause, not the wrapper.
    #[error("ActivityFailure: {reason}")]
    ActivityFailure {
        reason: String,
        cause: Option<Box<WindlassError>>,
    },

    /// A workflow-visible child workflow failure. Same cause rule as
    /// activity failures.
    #[error("ChildWorkflowFailure: workflow_id={workflow_id}: {reason}")]
    ChildWorkflowFailure {
        workflow_id: String,
        reason: String,
        cause: Option<Box<WindlassError>>,
    },

    /// User workflow code diverged from recorded history.
    #[error("NondeterministicWorkflowError: {0}")]
    Nondeterminism(String),

    #[error("InvalidArgumentError: {0}")]
    InvalidArgument(String),

    #[error("history pagination exceeded task-start-to-close timeout of {timeout:?}")]
    PaginationTimeout { timeout: Duration },

    /// The worker is shutting down and a blocking call was interrupted.
    #[error("ShutdownError: worker is shutting down")]
    Shutdown,

    #[error("SerializationError: {0}")]
    Serialization(String),

    #[error("{0}")]
    Generic(String),
}

pub type WindlassResult<T> = Result<T, WindlassError>;

impl WindlassError {
    /// Stable error-kind name used for `do_not_retry` matching.
    pub fn kind(&self) -> &'static str {
        match self {
            WindlassError::Service(e) => e.kind(),
            WindlassError::Canceled { .. } => "CanceledError",
            WindlassError::Timeout { .. } => "TimeoutError",
            WindlassError::ActivityFailure { .. } => "ActivityFailure",
            WindlassError::ChildWorkflowFailure { .. } => "ChildWorkflowFailure",
            WindlassError::Nondeterminism(_) => "NondeterministicWorkflowError",
            WindlassError::InvalidArgument(_) => "InvalidArgumentError",
            WindlassError::PaginationTimeout { .. } => "PaginationTimeoutError",
            WindlassError::Shutdown => "ShutdownError",
            WindlassError::Serialization(_) => "SerializationError",
            WindlassError::Generic(_) => "GenericError",
        }
    }

    /// Transient errors may be retried at the RPC layer.
    pub fn is_transient(&self) -> bool {
        match self {
            WindlassError::Service(e) => e.is_transient(),
            WindlassError::PaginationTimeout { .. } => true,
            _ => false,
        }
    }

    /// The error the retry evaluator should judge: activity and child
    /// workflow failures are judged by their cause when present.
    pub fn retry_cause(&self) -> &WindlassError {
        match self {
            WindlassError::ActivityFailure {
                cause: Some(cause), ..
            } => cause,
            WindlassError::ChildWorkflowFailure {
                cause: Some(cause), ..
            } => cause,
            other => other,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, WindlassError::Canceled { .. })
    }

    pub fn is_nondeterminism(&self) -> bool {
        matches!(self, WindlassError::Nondeterminism(_))
    }
}

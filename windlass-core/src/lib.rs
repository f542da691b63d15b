//! Core types for the windlass client.
//!
//! This crate holds the pieces shared by every other windlass crate:
//! the error taxonomy, retry options and the retry evaluator, and the
//! data converter used at the user-code boundary.

pub mod converter;
pub mod error;
pub mod metrics;
pub mod retry;

pub use converter::{DataConverter, EncodingError, JsonDataConverter};
pub use error::{ServiceError, TimeoutType, WindlassError, WindlassResult};
pub use metrics::{MetricsScope, NoopMetrics};
pub use retry::{retry, RetryOptions};

//! Wire-level types shared with the workflow service.
//!
//! These types mirror the service's schema: history events, decisions,
//! and the request/response pairs of the service interface. They carry
//! no behavior beyond construction helpers.

pub mod service;
pub mod shared;

pub use service::*;
pub use shared::*;

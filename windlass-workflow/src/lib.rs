//! Decision state machines and the replay bookkeeping that keeps
//! workflow code deterministic across replays.
//!
//! During a decision task the worker replays user workflow code from
//! the start of history. Every command the code emits is tracked by a
//! state machine keyed by a [`DecisionId`]; history events drive those
//! machines forward. Commands whose effects are already recorded in
//! history reach a terminal state and are not re-emitted; commands with
//! no recorded effect stay pending and go out in the next response.

pub mod decisions;
pub mod state_machine;

pub use decisions::{DecisionsHelper, FORCE_IMMEDIATE_DECISION_TIMER, MAXIMUM_DECISIONS_PER_COMPLETION};
pub use state_machine::{
    CancellationCallback, DecisionId, DecisionState, DecisionStateMachine, DecisionTarget,
};

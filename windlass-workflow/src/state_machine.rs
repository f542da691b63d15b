//! Per-target decision state machines.
//!
//! Every machine follows the same chart:
//!
//! ```text
//! Created -> DecisionSent -> Initiated [-> Started] -> Completed
//! ```
//!
//! with three cancellation branches (before initiated, after initiated,
//! after started) that converge on `CancellationDecisionSent` and then
//! `CompletedAfterCancellationDecisionSent`. A machine is done only in a
//! terminal state; `get_decision` returns the command that still needs
//! to go out in the current batch, if any.

use std::fmt;

use windlass_proto::shared::*;

/// Invoked synchronously when a cancellation lands before the decision
/// was ever sent, so user code can observe the cancellation in the same
/// replay pass.
pub type CancellationCallback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    Created,
    DecisionSent,
    CanceledBeforeInitiated,
    Initiated,
    Started,
    CanceledAfterInitiated,
    CanceledAfterStarted,
    CancellationDecisionSent,
    CompletedAfterCancellationDecisionSent,
    Completed,
}

/// What a decision acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionTarget {
    Activity,
    Timer,
    ExternalWorkflow,
    Signal,
    SelfExecution,
}

impl fmt::Display for DecisionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionTarget::Activity => write!(f, "ACTIVITY"),
            DecisionTarget::Timer => write!(f, "TIMER"),
            DecisionTarget::ExternalWorkflow => write!(f, "EXTERNAL_WORKFLOW"),
            DecisionTarget::Signal => write!(f, "SIGNAL"),
            DecisionTarget::SelfExecution => write!(f, "SELF"),
        }
    }
}

/// Identity of a decision within one replay pass. Keys come from user
/// supplied ids (activity id, timer id, workflow id) or, for signals, a
/// worker generated control token. The SELF target has no key and is a
/// singleton per decision task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionId {
    pub target: DecisionTarget,
    pub key: Option<String>,
}

impl DecisionId {
    pub fn new(target: DecisionTarget, key: impl Into<String>) -> Self {
        Self {
            target,
            key: Some(key.into()),
        }
    }

    pub fn self_execution() -> Self {
        Self {
            target: DecisionTarget::SelfExecution,
            key: None,
        }
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "DecisionId({}, {})", self.target, key),
            None => write!(f, "DecisionId({})", self.target),
        }
    }
}

pub trait DecisionStateMachine: Send {
    fn id(&self) -> &DecisionId;
    fn state(&self) -> DecisionState;
    fn is_done(&self) -> bool;

    /// The command to include in the outgoing batch, if this machine
    /// still has one pending.
    fn get_decision(&self) -> Option<Decision>;

    fn cancel(&mut self, immediate_cancellation_callback: Option<CancellationCallback>);

    fn handle_decision_task_started_event(&mut self);
    fn handle_initiated_event(&mut self);
    fn handle_initiation_failed_event(&mut self);
    fn handle_started_event(&mut self);
    fn handle_completion_event(&mut self);
    fn handle_cancellation_initiated_event(&mut self);
    fn handle_cancellation_event(&mut self);
    fn handle_cancellation_failure_event(&mut self);
}

/// Shared state and transitions. Per-target machines delegate here and
/// override only where their chart differs.
struct StateMachineBase {
    id: DecisionId,
    state: DecisionState,
    /// True once the original decision went out in a completed batch.
    /// Distinguishes a cancel that beat the send (terminal) from one
    /// that raced it (proceeds through the cancellation branch).
    decision_emitted: bool,
    state_history: Vec<DecisionState>,
}

impl StateMachineBase {
    fn new(id: DecisionId) -> Self {
        Self {
            id,
            state: DecisionState::Created,
            decision_emitted: false,
            state_history: vec![DecisionState::Created],
        }
    }

    fn transition_to(&mut self, state: DecisionState) {
        self.state_history.push(state);
        self.state = state;
    }

    fn is_done(&self) -> bool {
        matches!(
            self.state,
            DecisionState::Completed | DecisionState::CompletedAfterCancellationDecisionSent
        ) || (self.state == DecisionState::CanceledBeforeInitiated && !self.decision_emitted)
    }

    fn cancel(&mut self, callback: Option<CancellationCallback>) {
        match self.state {
            DecisionState::Created => {
                self.transition_to(DecisionState::CanceledBeforeInitiated);
                if let Some(callback) = callback {
                    callback();
                }
            }
            DecisionState::DecisionSent => {
                self.transition_to(DecisionState::CanceledBeforeInitiated);
            }
            DecisionState::Initiated => {
                self.transition_to(DecisionState::CanceledAfterInitiated);
            }
            DecisionState::Started => {
                self.transition_to(DecisionState::CanceledAfterStarted);
            }
            _ => {}
        }
    }

    fn handle_decision_task_started_event(&mut self) {
        match self.state {
            DecisionState::Created => {
                self.decision_emitted = true;
                self.transition_to(DecisionState::DecisionSent);
            }
            DecisionState::CanceledAfterInitiated | DecisionState::CanceledAfterStarted => {
                self.transition_to(DecisionState::CancellationDecisionSent);
            }
            _ => {}
        }
    }

    fn handle_initiated_event(&mut self) {
        match self.state {
            DecisionState::DecisionSent => self.transition_to(DecisionState::Initiated),
            // The cancel raced the initiated event; the cancel decision
            // still has to go out.
            DecisionState::CanceledBeforeInitiated => {
                self.transition_to(DecisionState::CanceledAfterInitiated)
            }
            _ => {}
        }
    }

    fn handle_initiation_failed_event(&mut self) {
        if matches!(
            self.state,
            DecisionState::DecisionSent
                | DecisionState::Initiated
                | DecisionState::CanceledBeforeInitiated
        ) {
            self.transition_to(DecisionState::Completed);
        }
    }

    fn handle_started_event(&mut self) {
        if self.state == DecisionState::Initiated {
            self.transition_to(DecisionState::Started);
        }
    }

    fn handle_completion_event(&mut self) {
        match self.state {
            DecisionState::Initiated
            | DecisionState::Started
            | DecisionState::CanceledAfterInitiated
            | DecisionState::CanceledAfterStarted => self.transition_to(DecisionState::Completed),
            DecisionState::CancellationDecisionSent => {
                self.transition_to(DecisionState::CompletedAfterCancellationDecisionSent)
            }
            _ => {}
        }
    }

    fn handle_cancellation_event(&mut self) {
        if self.state == DecisionState::CancellationDecisionSent {
            self.transition_to(DecisionState::Completed);
        }
    }

    fn handle_cancellation_failure_event(&mut self) {
        match self.state {
            // The cancel attempt failed; the operation is still live.
            DecisionState::CancellationDecisionSent => {
                self.transition_to(DecisionState::Initiated)
            }
            DecisionState::Initiated => self.transition_to(DecisionState::Completed),
            _ => {}
        }
    }
}

macro_rules! delegate_base {
    () => {
        fn id(&self) -> &DecisionId {
            &self.base.id
        }

        fn state(&self) -> DecisionState {
            self.base.state
        }

        fn is_done(&self) -> bool {
            self.base.is_done()
        }

        fn cancel(&mut self, callback: Option<CancellationCallback>) {
            self.base.cancel(callback);
        }

        fn handle_decision_task_started_event(&mut self) {
            self.base.handle_decision_task_started_event();
        }

        fn handle_initiated_event(&mut self) {
            self.base.handle_initiated_event();
        }

        fn handle_initiation_failed_event(&mut self) {
            self.base.handle_initiation_failed_event();
        }

        fn handle_started_event(&mut self) {
            self.base.handle_started_event();
        }

        fn handle_completion_event(&mut self) {
            self.base.handle_completion_event();
        }

        fn handle_cancellation_initiated_event(&mut self) {}

        fn handle_cancellation_event(&mut self) {
            self.base.handle_cancellation_event();
        }

        fn handle_cancellation_failure_event(&mut self) {
            self.base.handle_cancellation_failure_event();
        }
    };
}

pub struct ActivityDecisionStateMachine {
    base: StateMachineBase,
    schedule: ScheduleActivityTaskDecisionAttributes,
}

impl ActivityDecisionStateMachine {
    pub fn new(schedule: ScheduleActivityTaskDecisionAttributes) -> Self {
        let id = DecisionId::new(DecisionTarget::Activity, schedule.activity_id.clone());
        Self {
            base: StateMachineBase::new(id),
            schedule,
        }
    }
}

impl DecisionStateMachine for ActivityDecisionStateMachine {
    delegate_base!();

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::ScheduleActivityTask,
                attributes: Some(DecisionAttributes::ScheduleActivityTask(Box::new(
                    self.schedule.clone(),
                ))),
            }),
            DecisionState::CanceledAfterInitiated => Some(Decision {
                decision_type: DecisionType::RequestCancelActivityTask,
                attributes: Some(DecisionAttributes::RequestCancelActivityTask(Box::new(
                    RequestCancelActivityTaskDecisionAttributes {
                        activity_id: self.schedule.activity_id.clone(),
                    },
                ))),
            }),
            _ => None,
        }
    }
}

pub struct TimerDecisionStateMachine {
    base: StateMachineBase,
    start: StartTimerDecisionAttributes,
}

impl TimerDecisionStateMachine {
    pub fn new(start: StartTimerDecisionAttributes) -> Self {
        let id = DecisionId::new(DecisionTarget::Timer, start.timer_id.clone());
        Self {
            base: StateMachineBase::new(id),
            start,
        }
    }
}

impl DecisionStateMachine for TimerDecisionStateMachine {
    delegate_base!();

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::StartTimer,
                attributes: Some(DecisionAttributes::StartTimer(Box::new(self.start.clone()))),
            }),
            DecisionState::CanceledAfterInitiated => Some(Decision {
                decision_type: DecisionType::CancelTimer,
                attributes: Some(DecisionAttributes::CancelTimer(Box::new(
                    CancelTimerDecisionAttributes {
                        timer_id: self.start.timer_id.clone(),
                    },
                ))),
            }),
            _ => None,
        }
    }
}

pub struct ChildWorkflowDecisionStateMachine {
    base: StateMachineBase,
    start: StartChildWorkflowExecutionDecisionAttributes,
}

impl ChildWorkflowDecisionStateMachine {
    pub fn new(start: StartChildWorkflowExecutionDecisionAttributes) -> Self {
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, start.workflow_id.clone());
        Self {
            base: StateMachineBase::new(id),
            start,
        }
    }
}

impl DecisionStateMachine for ChildWorkflowDecisionStateMachine {
    delegate_base!();

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::StartChildWorkflowExecution,
                attributes: Some(DecisionAttributes::StartChildWorkflowExecution(Box::new(
                    self.start.clone(),
                ))),
            }),
            DecisionState::CanceledAfterInitiated | DecisionState::CanceledAfterStarted => {
                Some(Decision {
                    decision_type: DecisionType::RequestCancelExternalWorkflowExecution,
                    attributes: Some(DecisionAttributes::RequestCancelExternalWorkflowExecution(
                        Box::new(RequestCancelExternalWorkflowExecutionDecisionAttributes {
                            domain: self.start.domain.clone(),
                            workflow_id: self.start.workflow_id.clone(),
                            run_id: None,
                            control: self.start.control.clone(),
                            child_workflow_only: true,
                        }),
                    )),
                })
            }
            _ => None,
        }
    }
}

pub struct SignalDecisionStateMachine {
    base: StateMachineBase,
    signal: SignalExternalWorkflowExecutionDecisionAttributes,
    signal_id: String,
}

impl SignalDecisionStateMachine {
    /// `signal_id` is the worker generated control token, not the
    /// signal name: one workflow may send the same signal many times.
    pub fn new(
        signal_id: impl Into<String>,
        signal: SignalExternalWorkflowExecutionDecisionAttributes,
    ) -> Self {
        let signal_id = signal_id.into();
        let id = DecisionId::new(DecisionTarget::Signal, signal_id.clone());
        Self {
            base: StateMachineBase::new(id),
            signal,
            signal_id,
        }
    }

    pub fn signal_id(&self) -> &str {
        &self.signal_id
    }
}

impl DecisionStateMachine for SignalDecisionStateMachine {
    delegate_base!();

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::SignalExternalWorkflowExecution,
                attributes: Some(DecisionAttributes::SignalExternalWorkflowExecution(
                    Box::new(self.signal.clone()),
                )),
            }),
            _ => None,
        }
    }
}

/// Terminal decisions (complete, fail, cancel, continue-as-new) target
/// the execution itself. The decision is emitted as long as the machine
/// exists and the machine is always done: the service closes the
/// workflow, there is no follow-up event to wait for.
pub struct CompleteWorkflowStateMachine {
    id: DecisionId,
    decision: Decision,
}

impl CompleteWorkflowStateMachine {
    pub fn new(decision: Decision) -> Self {
        Self {
            id: DecisionId::self_execution(),
            decision,
        }
    }
}

impl DecisionStateMachine for CompleteWorkflowStateMachine {
    fn id(&self) -> &DecisionId {
        &self.id
    }

    fn state(&self) -> DecisionState {
        DecisionState::Created
    }

    fn is_done(&self) -> bool {
        true
    }

    fn get_decision(&self) -> Option<Decision> {
        Some(self.decision.clone())
    }

    fn cancel(&mut self, _callback: Option<CancellationCallback>) {}
    fn handle_decision_task_started_event(&mut self) {}
    fn handle_initiated_event(&mut self) {}
    fn handle_initiation_failed_event(&mut self) {}
    fn handle_started_event(&mut self) {}
    fn handle_completion_event(&mut self) {}
    fn handle_cancellation_initiated_event(&mut self) {}
    fn handle_cancellation_event(&mut self) {}
    fn handle_cancellation_failure_event(&mut self) {}
}

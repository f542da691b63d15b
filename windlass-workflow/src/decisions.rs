//! Registry of decision state machines for one decision task.
//!
//! The helper owns every machine created during a replay pass and the
//! bookkeeping that connects history events back to them. Emission
//! order is access order: a machine moves to the back of the line every
//! time anything touches it, so the batch returned to the service
//! reflects the order in which user code last touched each item. That
//! ordering is what keeps command batches stable across replays.

use std::collections::HashMap;

use tracing::debug;
use windlass_core::{WindlassError, WindlassResult};
use windlass_proto::shared::*;

use crate::state_machine::{
    ActivityDecisionStateMachine, CancellationCallback, ChildWorkflowDecisionStateMachine,
    CompleteWorkflowStateMachine, DecisionId, DecisionStateMachine, DecisionTarget,
    SignalDecisionStateMachine, TimerDecisionStateMachine,
};

/// The service rejects responses with more decisions than this.
pub const MAXIMUM_DECISIONS_PER_COMPLETION: usize = 10_000;

/// Timer id of the synthetic zero-duration timer appended when a batch
/// is truncated, forcing the service to schedule another decision task
/// immediately so the remaining decisions go out next.
pub const FORCE_IMMEDIATE_DECISION_TIMER: &str = "FORCE_IMMEDIATE_DECISION";

fn force_immediate_decision_timer() -> Decision {
    Decision {
        decision_type: DecisionType::StartTimer,
        attributes: Some(DecisionAttributes::StartTimer(Box::new(
            StartTimerDecisionAttributes {
                timer_id: FORCE_IMMEDIATE_DECISION_TIMER.to_string(),
                start_to_fire_timeout_seconds: 0,
            },
        ))),
    }
}

/// Decisions that terminate the workflow execution. At most one may be
/// emitted and it must be the last decision of the batch.
fn is_completion_decision(decision: &Decision) -> bool {
    matches!(
        decision.decision_type,
        DecisionType::CompleteWorkflowExecution
            | DecisionType::FailWorkflowExecution
            | DecisionType::CancelWorkflowExecution
            | DecisionType::ContinueAsNewWorkflowExecution
    )
}

pub struct DecisionsHelper {
    machines: HashMap<DecisionId, Box<dyn DecisionStateMachine>>,
    /// Emission order; entries are re-linked to the tail on access.
    order: Vec<DecisionId>,
    max_decisions_per_completion: usize,
    activity_scheduled_event_id_to_activity_id: HashMap<i64, String>,
    signal_initiated_event_id_to_signal_id: HashMap<i64, String>,
    workflow_context_data: Option<Vec<u8>>,
    workflow_context_from_last_completion: Option<Vec<u8>>,
    id_counter: u64,
}

impl Default for DecisionsHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionsHelper {
    pub fn new() -> Self {
        Self {
            machines: HashMap::new(),
            order: Vec::new(),
            max_decisions_per_completion: MAXIMUM_DECISIONS_PER_COMPLETION,
            activity_scheduled_event_id_to_activity_id: HashMap::new(),
            signal_initiated_event_id_to_signal_id: HashMap::new(),
            workflow_context_data: None,
            workflow_context_from_last_completion: None,
            id_counter: 0,
        }
    }

    pub fn with_max_decisions(mut self, max: usize) -> Self {
        self.max_decisions_per_completion = max;
        self
    }

    /// Worker-generated token for decisions without a user-supplied id
    /// (external signals and cancel requests).
    pub fn get_next_id(&mut self) -> String {
        self.id_counter += 1;
        self.id_counter.to_string()
    }

    fn add_decision(&mut self, machine: Box<dyn DecisionStateMachine>) {
        let id = machine.id().clone();
        if self.machines.insert(id.clone(), machine).is_some() {
            // Re-adding an existing id refreshes its emission position.
            if let Some(pos) = self.order.iter().position(|existing| *existing == id) {
                self.order.remove(pos);
            }
        }
        self.order.push(id);
    }

    /// Looks up a machine, refreshing its position to the tail of the
    /// emission order. An unknown id means user code diverged from
    /// recorded history.
    fn machine(&mut self, id: &DecisionId) -> WindlassResult<&mut Box<dyn DecisionStateMachine>> {
        let Some(pos) = self.order.iter().position(|existing| existing == id) else {
            return Err(WindlassError::Nondeterminism(format!(
                "Unknown {}. The possible causes are nondeterministic workflow definition code \
                 or an incompatible change to the workflow definition.",
                id
            )));
        };
        let moved = self.order.remove(pos);
        self.order.push(moved);
        match self.machines.get_mut(id) {
            Some(machine) => Ok(machine),
            None => Err(WindlassError::Nondeterminism(format!("Unknown {}", id))),
        }
    }

    // ---- activities ----

    pub fn schedule_activity_task(&mut self, schedule: ScheduleActivityTaskDecisionAttributes) {
        debug!(activity_id = %schedule.activity_id, "scheduling activity task");
        self.add_decision(Box::new(ActivityDecisionStateMachine::new(schedule)));
    }

    /// Returns true if the cancellation finished immediately because the
    /// schedule decision had not gone out yet.
    pub fn request_cancel_activity_task(
        &mut self,
        activity_id: &str,
        immediate_cancellation_callback: Option<CancellationCallback>,
    ) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::Activity, activity_id);
        let machine = self.machine(&id)?;
        machine.cancel(immediate_cancellation_callback);
        Ok(machine.is_done())
    }

    pub fn handle_activity_task_scheduled(&mut self, event: &HistoryEvent) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::ActivityTaskScheduled(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not an activity-scheduled event",
                    event.event_id
                )))
            }
        };
        self.activity_scheduled_event_id_to_activity_id
            .insert(event.event_id, attrs.activity_id.clone());
        let id = DecisionId::new(DecisionTarget::Activity, attrs.activity_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_initiated_event();
        Ok(machine.is_done())
    }

    pub fn handle_activity_task_closed(&mut self, activity_id: &str) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::Activity, activity_id);
        let machine = self.machine(&id)?;
        machine.handle_completion_event();
        Ok(machine.is_done())
    }

    /// Resolves completion-family events back to the user-visible
    /// activity id via the scheduling event recorded earlier.
    pub fn activity_id_for_scheduled_event(
        &self,
        scheduled_event_id: i64,
    ) -> WindlassResult<String> {
        self.activity_scheduled_event_id_to_activity_id
            .get(&scheduled_event_id)
            .cloned()
            .ok_or_else(|| {
                WindlassError::Nondeterminism(format!(
                    "no activity id recorded for scheduled event {}",
                    scheduled_event_id
                ))
            })
    }

    pub fn handle_activity_task_completed(&mut self, event: &HistoryEvent) -> WindlassResult<bool> {
        let scheduled_event_id = match &event.attributes {
            Some(EventAttributes::ActivityTaskCompleted(attrs)) => attrs.scheduled_event_id,
            Some(EventAttributes::ActivityTaskFailed(attrs)) => attrs.scheduled_event_id,
            Some(EventAttributes::ActivityTaskTimedOut(attrs)) => attrs.scheduled_event_id,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not an activity completion event",
                    event.event_id
                )))
            }
        };
        let activity_id = self.activity_id_for_scheduled_event(scheduled_event_id)?;
        self.handle_activity_task_closed(&activity_id)
    }

    pub fn handle_activity_task_cancel_requested(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::ActivityTaskCancelRequested(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not an activity cancel-requested event",
                    event.event_id
                )))
            }
        };
        let id = DecisionId::new(DecisionTarget::Activity, attrs.activity_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_cancellation_initiated_event();
        Ok(machine.is_done())
    }

    pub fn handle_activity_task_canceled(&mut self, event: &HistoryEvent) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::ActivityTaskCanceled(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not an activity-canceled event",
                    event.event_id
                )))
            }
        };
        let activity_id = self.activity_id_for_scheduled_event(attrs.scheduled_event_id)?;
        let id = DecisionId::new(DecisionTarget::Activity, activity_id);
        let machine = self.machine(&id)?;
        machine.handle_cancellation_event();
        Ok(machine.is_done())
    }

    pub fn handle_request_cancel_activity_task_failed(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::RequestCancelActivityTaskFailed(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not a request-cancel-activity-failed event",
                    event.event_id
                )))
            }
        };
        let id = DecisionId::new(DecisionTarget::Activity, attrs.activity_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_cancellation_failure_event();
        Ok(machine.is_done())
    }

    // ---- timers ----

    pub fn start_timer(&mut self, start: StartTimerDecisionAttributes) {
        debug!(timer_id = %start.timer_id, "starting timer");
        self.add_decision(Box::new(TimerDecisionStateMachine::new(start)));
    }

    pub fn cancel_timer(
        &mut self,
        timer_id: &str,
        immediate_cancellation_callback: Option<CancellationCallback>,
    ) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::Timer, timer_id);
        let machine = self.machine(&id)?;
        if machine.is_done() {
            // Cancellation callbacks are not deregistered and may race
            // the timer firing.
            return Ok(true);
        }
        machine.cancel(immediate_cancellation_callback);
        Ok(machine.is_done())
    }

    pub fn handle_timer_started(&mut self, event: &HistoryEvent) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::TimerStarted(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not a timer-started event",
                    event.event_id
                )))
            }
        };
        let id = DecisionId::new(DecisionTarget::Timer, attrs.timer_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_initiated_event();
        Ok(machine.is_done())
    }

    pub fn handle_timer_closed(&mut self, timer_id: &str) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::Timer, timer_id);
        let machine = self.machine(&id)?;
        machine.handle_completion_event();
        Ok(machine.is_done())
    }

    pub fn handle_timer_canceled(&mut self, event: &HistoryEvent) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::TimerCanceled(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not a timer-canceled event",
                    event.event_id
                )))
            }
        };
        let id = DecisionId::new(DecisionTarget::Timer, attrs.timer_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_cancellation_event();
        Ok(machine.is_done())
    }

    pub fn handle_cancel_timer_failed(&mut self, event: &HistoryEvent) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::CancelTimerFailed(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not a cancel-timer-failed event",
                    event.event_id
                )))
            }
        };
        let id = DecisionId::new(DecisionTarget::Timer, attrs.timer_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_cancellation_failure_event();
        Ok(machine.is_done())
    }

    // ---- child workflows and external cancellation ----

    pub fn start_child_workflow_execution(
        &mut self,
        start: StartChildWorkflowExecutionDecisionAttributes,
    ) {
        debug!(workflow_id = %start.workflow_id, "starting child workflow");
        self.add_decision(Box::new(ChildWorkflowDecisionStateMachine::new(start)));
    }

    pub fn handle_start_child_workflow_execution_initiated(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::StartChildWorkflowExecutionInitiated(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not a start-child-initiated event",
                    event.event_id
                )))
            }
        };
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, attrs.workflow_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_initiated_event();
        Ok(machine.is_done())
    }

    pub fn handle_start_child_workflow_execution_failed(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let attrs = match &event.attributes {
            Some(EventAttributes::StartChildWorkflowExecutionFailed(attrs)) => attrs,
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not a start-child-failed event",
                    event.event_id
                )))
            }
        };
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, attrs.workflow_id.clone());
        let machine = self.machine(&id)?;
        machine.handle_initiation_failed_event();
        Ok(machine.is_done())
    }

    pub fn handle_child_workflow_execution_started(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let workflow_id = match &event.attributes {
            Some(EventAttributes::ChildWorkflowExecutionStarted(attrs)) => attrs
                .workflow_execution
                .as_ref()
                .map(|we| we.workflow_id.clone()),
            _ => None,
        };
        let Some(workflow_id) = workflow_id else {
            return Err(WindlassError::InvalidArgument(format!(
                "event {} is not a child-started event",
                event.event_id
            )));
        };
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, workflow_id);
        let machine = self.machine(&id)?;
        machine.handle_started_event();
        Ok(machine.is_done())
    }

    pub fn handle_child_workflow_execution_closed(
        &mut self,
        workflow_id: &str,
    ) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, workflow_id);
        let machine = self.machine(&id)?;
        machine.handle_completion_event();
        Ok(machine.is_done())
    }

    pub fn handle_child_workflow_execution_canceled(
        &mut self,
        workflow_id: &str,
    ) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, workflow_id);
        let machine = self.machine(&id)?;
        machine.handle_cancellation_event();
        Ok(machine.is_done())
    }

    /// Returns true if the cancellation finished immediately.
    pub fn request_cancel_external_workflow_execution(
        &mut self,
        workflow_id: &str,
        immediate_cancellation_callback: Option<CancellationCallback>,
    ) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, workflow_id);
        let machine = self.machine(&id)?;
        machine.cancel(immediate_cancellation_callback);
        Ok(machine.is_done())
    }

    pub fn handle_request_cancel_external_workflow_execution_initiated(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<()> {
        let workflow_id = match &event.attributes {
            Some(EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(attrs)) => attrs
                .workflow_execution
                .as_ref()
                .map(|we| we.workflow_id.clone()),
            _ => None,
        };
        let Some(workflow_id) = workflow_id else {
            return Err(WindlassError::InvalidArgument(format!(
                "event {} is not a request-cancel-initiated event",
                event.event_id
            )));
        };
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, workflow_id);
        let machine = self.machine(&id)?;
        machine.handle_cancellation_initiated_event();
        Ok(())
    }

    pub fn handle_external_workflow_execution_cancel_requested(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let workflow_id = match &event.attributes {
            Some(EventAttributes::ExternalWorkflowExecutionCancelRequested(attrs)) => attrs
                .workflow_execution
                .as_ref()
                .map(|we| we.workflow_id.clone()),
            _ => None,
        };
        let Some(workflow_id) = workflow_id else {
            return Err(WindlassError::InvalidArgument(format!(
                "event {} is not a cancel-requested event",
                event.event_id
            )));
        };
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, workflow_id);
        let machine = self.machine(&id)?;
        machine.handle_cancellation_event();
        Ok(machine.is_done())
    }

    pub fn handle_request_cancel_external_workflow_execution_failed(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let workflow_id = match &event.attributes {
            Some(EventAttributes::RequestCancelExternalWorkflowExecutionFailed(attrs)) => attrs
                .workflow_execution
                .as_ref()
                .map(|we| we.workflow_id.clone()),
            _ => None,
        };
        let Some(workflow_id) = workflow_id else {
            return Err(WindlassError::InvalidArgument(format!(
                "event {} is not a request-cancel-failed event",
                event.event_id
            )));
        };
        let id = DecisionId::new(DecisionTarget::ExternalWorkflow, workflow_id);
        let machine = self.machine(&id)?;
        machine.handle_cancellation_failure_event();
        Ok(machine.is_done())
    }

    // ---- external signals ----

    /// `signal_id` is a worker-generated token (see [`Self::get_next_id`])
    /// carried in the decision's `control` field.
    pub fn signal_external_workflow_execution(
        &mut self,
        signal_id: String,
        signal: SignalExternalWorkflowExecutionDecisionAttributes,
    ) {
        debug!(signal_id = %signal_id, signal_name = %signal.signal_name, "signaling external workflow");
        self.add_decision(Box::new(SignalDecisionStateMachine::new(signal_id, signal)));
    }

    pub fn cancel_signal_external_workflow_execution(
        &mut self,
        signal_id: &str,
        immediate_cancellation_callback: Option<CancellationCallback>,
    ) -> WindlassResult<bool> {
        let id = DecisionId::new(DecisionTarget::Signal, signal_id);
        let machine = self.machine(&id)?;
        machine.cancel(immediate_cancellation_callback);
        Ok(machine.is_done())
    }

    pub fn handle_signal_external_workflow_execution_initiated(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<()> {
        let control = match &event.attributes {
            Some(EventAttributes::SignalExternalWorkflowExecutionInitiated(attrs)) => {
                attrs.control.clone()
            }
            _ => None,
        };
        let Some(signal_id) = control else {
            return Err(WindlassError::InvalidArgument(format!(
                "event {} is not a signal-initiated event with a control token",
                event.event_id
            )));
        };
        self.signal_initiated_event_id_to_signal_id
            .insert(event.event_id, signal_id.clone());
        let id = DecisionId::new(DecisionTarget::Signal, signal_id);
        let machine = self.machine(&id)?;
        machine.handle_initiated_event();
        Ok(())
    }

    pub fn signal_id_for_initiated_event(&self, initiated_event_id: i64) -> WindlassResult<String> {
        self.signal_initiated_event_id_to_signal_id
            .get(&initiated_event_id)
            .cloned()
            .ok_or_else(|| {
                WindlassError::Nondeterminism(format!(
                    "no signal id recorded for initiated event {}",
                    initiated_event_id
                ))
            })
    }

    pub fn handle_external_workflow_execution_signaled(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let initiated_event_id = match &event.attributes {
            Some(EventAttributes::ExternalWorkflowExecutionSignaled(attrs)) => {
                attrs.initiated_event_id
            }
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not an external-signaled event",
                    event.event_id
                )))
            }
        };
        let signal_id = self.signal_id_for_initiated_event(initiated_event_id)?;
        let id = DecisionId::new(DecisionTarget::Signal, signal_id);
        let machine = self.machine(&id)?;
        machine.handle_completion_event();
        Ok(machine.is_done())
    }

    pub fn handle_signal_external_workflow_execution_failed(
        &mut self,
        event: &HistoryEvent,
    ) -> WindlassResult<bool> {
        let initiated_event_id = match &event.attributes {
            Some(EventAttributes::SignalExternalWorkflowExecutionFailed(attrs)) => {
                attrs.initiated_event_id
            }
            _ => {
                return Err(WindlassError::InvalidArgument(format!(
                    "event {} is not a signal-failed event",
                    event.event_id
                )))
            }
        };
        let signal_id = self.signal_id_for_initiated_event(initiated_event_id)?;
        let id = DecisionId::new(DecisionTarget::Signal, signal_id);
        let machine = self.machine(&id)?;
        machine.handle_completion_event();
        Ok(machine.is_done())
    }

    // ---- terminal decisions ----

    pub fn complete_workflow_execution(&mut self, result: Option<Vec<u8>>) {
        let decision = Decision {
            decision_type: DecisionType::CompleteWorkflowExecution,
            attributes: Some(DecisionAttributes::CompleteWorkflowExecution(Box::new(
                CompleteWorkflowExecutionDecisionAttributes { result },
            ))),
        };
        self.add_decision(Box::new(CompleteWorkflowStateMachine::new(decision)));
    }

    pub fn fail_workflow_execution(&mut self, reason: String, details: Option<Vec<u8>>) {
        let decision = Decision {
            decision_type: DecisionType::FailWorkflowExecution,
            attributes: Some(DecisionAttributes::FailWorkflowExecution(Box::new(
                FailWorkflowExecutionDecisionAttributes {
                    reason: Some(reason),
                    details,
                },
            ))),
        };
        self.add_decision(Box::new(CompleteWorkflowStateMachine::new(decision)));
    }

    pub fn cancel_workflow_execution(&mut self, details: Option<Vec<u8>>) {
        let decision = Decision {
            decision_type: DecisionType::CancelWorkflowExecution,
            attributes: Some(DecisionAttributes::CancelWorkflowExecution(Box::new(
                CancelWorkflowExecutionDecisionAttributes { details },
            ))),
        };
        self.add_decision(Box::new(CompleteWorkflowStateMachine::new(decision)));
    }

    pub fn continue_as_new_workflow_execution(
        &mut self,
        attributes: ContinueAsNewWorkflowExecutionDecisionAttributes,
    ) {
        let decision = Decision {
            decision_type: DecisionType::ContinueAsNewWorkflowExecution,
            attributes: Some(DecisionAttributes::ContinueAsNewWorkflowExecution(Box::new(
                attributes,
            ))),
        };
        self.add_decision(Box::new(CompleteWorkflowStateMachine::new(decision)));
    }

    // ---- batch emission ----

    fn emission_limit(&self, pending: &[Decision]) -> (usize, bool) {
        let max = self.max_decisions_per_completion;
        if pending.len() > max {
            if is_completion_decision(&pending[max - 1]) {
                (max, false)
            } else {
                (max - 1, true)
            }
        } else {
            (pending.len(), false)
        }
    }

    /// The ordered decision batch to return to the service. Walks the
    /// machines in current emission order; machines whose decision was
    /// already sent, or withdrawn by cancellation, contribute nothing.
    pub fn get_decisions(&self) -> Vec<Decision> {
        let mut result: Vec<Decision> = self
            .order
            .iter()
            .filter_map(|id| self.machines.get(id))
            .filter_map(|machine| machine.get_decision())
            .collect();
        let (limit, force_immediate) = self.emission_limit(&result);
        if result.len() > limit {
            result.truncate(limit);
        }
        if force_immediate {
            result.push(force_immediate_decision_timer());
        }
        result
    }

    /// Marks the decisions that went out in the completed batch as sent.
    /// Only the machines whose decisions actually fit under the cap are
    /// marked; truncated ones stay pending for the next task.
    pub fn handle_decision_task_started_event(&mut self) {
        let mut pending_ids: Vec<DecisionId> = Vec::new();
        let mut pending_decisions: Vec<Decision> = Vec::new();
        for id in &self.order {
            if let Some(machine) = self.machines.get(id) {
                if let Some(decision) = machine.get_decision() {
                    pending_ids.push(id.clone());
                    pending_decisions.push(decision);
                }
            }
        }
        let (limit, _) = self.emission_limit(&pending_decisions);
        for id in pending_ids.into_iter().take(limit) {
            if let Some(machine) = self.machines.get_mut(&id) {
                machine.handle_decision_task_started_event();
            }
        }
    }

    pub fn all_done(&self) -> bool {
        self.machines.values().all(|machine| machine.is_done())
    }

    // ---- workflow context blob ----

    pub fn set_workflow_context_data(&mut self, data: Option<Vec<u8>>) {
        self.workflow_context_data = data;
    }

    /// The context to attach to the completion, or `None` when the
    /// current value equals what the service already holds.
    pub fn get_workflow_context_data_to_return(&self) -> Option<Vec<u8>> {
        if self.workflow_context_from_last_completion == self.workflow_context_data {
            None
        } else {
            self.workflow_context_data.clone()
        }
    }

    pub fn handle_decision_task_completed(
        &mut self,
        attributes: &DecisionTaskCompletedEventAttributes,
    ) {
        self.workflow_context_from_last_completion = attributes.execution_context.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn schedule_attrs(activity_id: &str) -> ScheduleActivityTaskDecisionAttributes {
        ScheduleActivityTaskDecisionAttributes {
            activity_id: activity_id.into(),
            activity_type: Some(ActivityType::new("Ship")),
            task_list: Some(TaskList::new("tl")),
            input: None,
            schedule_to_close_timeout_seconds: Some(60),
            schedule_to_start_timeout_seconds: Some(10),
            start_to_close_timeout_seconds: Some(30),
            heartbeat_timeout_seconds: None,
            retry_policy: None,
        }
    }

    fn timer_attrs(timer_id: &str) -> StartTimerDecisionAttributes {
        StartTimerDecisionAttributes {
            timer_id: timer_id.into(),
            start_to_fire_timeout_seconds: 30,
        }
    }

    fn activity_scheduled_event(event_id: i64, activity_id: &str) -> HistoryEvent {
        HistoryEvent::new(
            event_id,
            EventType::ActivityTaskScheduled,
            Some(EventAttributes::ActivityTaskScheduled(Box::new(
                ActivityTaskScheduledEventAttributes {
                    activity_id: activity_id.into(),
                    activity_type: Some(ActivityType::new("Ship")),
                    task_list: Some(TaskList::new("tl")),
                    input: None,
                    schedule_to_close_timeout_seconds: Some(60),
                    schedule_to_start_timeout_seconds: Some(10),
                    start_to_close_timeout_seconds: Some(30),
                    heartbeat_timeout_seconds: None,
                    decision_task_completed_event_id: event_id - 1,
                    retry_policy: None,
                },
            ))),
        )
    }

    fn activity_completed_event(event_id: i64, scheduled_event_id: i64) -> HistoryEvent {
        HistoryEvent::new(
            event_id,
            EventType::ActivityTaskCompleted,
            Some(EventAttributes::ActivityTaskCompleted(Box::new(
                ActivityTaskCompletedEventAttributes {
                    result: Some(b"ok".to_vec()),
                    scheduled_event_id,
                    started_event_id: scheduled_event_id + 1,
                    identity: "worker-1".into(),
                },
            ))),
        )
    }

    fn timer_id_of(decision: &Decision) -> &str {
        match &decision.attributes {
            Some(DecisionAttributes::StartTimer(attrs)) => &attrs.timer_id,
            _ => panic!("not a start-timer decision: {:?}", decision),
        }
    }

    #[test]
    fn pending_schedule_is_emitted_once() {
        let mut helper = DecisionsHelper::new();
        helper.schedule_activity_task(schedule_attrs("a1"));

        let decisions = helper.get_decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::ScheduleActivityTask
        );

        // After the batch goes out nothing is pending.
        helper.handle_decision_task_started_event();
        assert!(helper.get_decisions().is_empty());
    }

    #[test]
    fn replayed_activity_reaches_terminal_and_emits_nothing() {
        // Second decision task: user code re-schedules a1, history
        // already holds the scheduled and completed events.
        let mut helper = DecisionsHelper::new();
        helper.schedule_activity_task(schedule_attrs("a1"));
        helper.handle_decision_task_started_event();

        let done = helper
            .handle_activity_task_scheduled(&activity_scheduled_event(5, "a1"))
            .unwrap();
        assert!(!done);

        let done = helper
            .handle_activity_task_completed(&activity_completed_event(7, 5))
            .unwrap();
        assert!(done);
        assert!(helper.get_decisions().is_empty());
        assert!(helper.all_done());
    }

    #[test]
    fn unknown_decision_id_is_nondeterminism() {
        let mut helper = DecisionsHelper::new();
        helper.schedule_activity_task(schedule_attrs("a1"));
        helper.handle_decision_task_started_event();

        let err = helper
            .handle_activity_task_scheduled(&activity_scheduled_event(5, "a2"))
            .unwrap_err();
        assert!(err.is_nondeterminism());
        assert!(err.to_string().contains("Unknown DecisionId(ACTIVITY, a2)"));
    }

    #[test]
    fn scheduled_event_resolution_returns_original_id() {
        let mut helper = DecisionsHelper::new();
        helper.schedule_activity_task(schedule_attrs("a1"));
        helper.handle_decision_task_started_event();
        helper
            .handle_activity_task_scheduled(&activity_scheduled_event(5, "a1"))
            .unwrap();

        assert_eq!(helper.activity_id_for_scheduled_event(5).unwrap(), "a1");
        assert!(helper.activity_id_for_scheduled_event(6).is_err());
    }

    #[test]
    fn cancel_before_send_withdraws_decision_and_fires_callback() {
        let mut helper = DecisionsHelper::new();
        helper.schedule_activity_task(schedule_attrs("a1"));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let done = helper
            .request_cancel_activity_task(
                "a1",
                Some(Box::new(move || {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();

        assert!(done);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(helper.get_decisions().is_empty());
    }

    #[test]
    fn emission_follows_access_order() {
        let mut helper = DecisionsHelper::new();
        helper.start_timer(timer_attrs("t1"));
        helper.start_timer(timer_attrs("t2"));
        helper.handle_decision_task_started_event();
        for (event_id, timer_id) in [(5, "t1"), (6, "t2")] {
            let event = HistoryEvent::new(
                event_id,
                EventType::TimerStarted,
                Some(EventAttributes::TimerStarted(Box::new(
                    TimerStartedEventAttributes {
                        timer_id: timer_id.into(),
                        start_to_fire_timeout_seconds: 30,
                        decision_task_completed_event_id: 4,
                    },
                ))),
            );
            helper.handle_timer_started(&event).unwrap();
        }

        // Cancel t2 first, then t1: the cancel decisions come out in
        // the order the machines were last touched.
        helper.cancel_timer("t2", None).unwrap();
        helper.cancel_timer("t1", None).unwrap();

        let decisions = helper.get_decisions();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].decision_type, DecisionType::CancelTimer);
        let ids: Vec<&str> = decisions
            .iter()
            .map(|d| match &d.attributes {
                Some(DecisionAttributes::CancelTimer(attrs)) => attrs.timer_id.as_str(),
                _ => panic!("expected cancel-timer"),
            })
            .collect();
        assert_eq!(ids, ["t2", "t1"]);
    }

    #[test]
    fn identical_access_sequence_is_deterministic() {
        let run = || {
            let mut helper = DecisionsHelper::new();
            helper.start_timer(timer_attrs("t1"));
            helper.schedule_activity_task(schedule_attrs("a1"));
            helper.start_timer(timer_attrs("t2"));
            helper
                .get_decisions()
                .iter()
                .map(|d| format!("{:?}", d.decision_type))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn batch_is_capped_with_forced_timer() {
        let mut helper = DecisionsHelper::new();
        for i in 0..10_001 {
            helper.start_timer(timer_attrs(&format!("t{}", i)));
        }

        let decisions = helper.get_decisions();
        assert_eq!(decisions.len(), MAXIMUM_DECISIONS_PER_COMPLETION);
        let last = decisions.last().unwrap();
        assert_eq!(last.decision_type, DecisionType::StartTimer);
        assert_eq!(timer_id_of(last), FORCE_IMMEDIATE_DECISION_TIMER);
        match &last.attributes {
            Some(DecisionAttributes::StartTimer(attrs)) => {
                assert_eq!(attrs.start_to_fire_timeout_seconds, 0)
            }
            _ => panic!("expected start-timer attributes"),
        }
    }

    #[test]
    fn truncated_decisions_stay_pending_for_next_task() {
        let mut helper = DecisionsHelper::new().with_max_decisions(3);
        for i in 0..5 {
            helper.start_timer(timer_attrs(&format!("t{}", i)));
        }

        let decisions = helper.get_decisions();
        assert_eq!(decisions.len(), 3);
        assert_eq!(timer_id_of(&decisions[0]), "t0");
        assert_eq!(timer_id_of(&decisions[1]), "t1");
        assert_eq!(timer_id_of(&decisions[2]), FORCE_IMMEDIATE_DECISION_TIMER);

        // Only the emitted machines are marked sent.
        helper.handle_decision_task_started_event();
        let remaining = helper.get_decisions();
        assert_eq!(remaining.len(), 3);
        assert_eq!(timer_id_of(&remaining[0]), "t2");
        assert_eq!(timer_id_of(&remaining[1]), "t3");
        assert_eq!(timer_id_of(&remaining[2]), "t4");
    }

    #[test]
    fn completion_decision_at_cap_suppresses_forced_timer() {
        let mut helper = DecisionsHelper::new().with_max_decisions(3);
        helper.start_timer(timer_attrs("t0"));
        helper.start_timer(timer_attrs("t1"));
        helper.complete_workflow_execution(None);
        helper.start_timer(timer_attrs("t2"));

        let decisions = helper.get_decisions();
        assert_eq!(decisions.len(), 3);
        assert_eq!(
            decisions[2].decision_type,
            DecisionType::CompleteWorkflowExecution
        );
    }

    #[test]
    fn completion_decision_is_last_and_unique() {
        let mut helper = DecisionsHelper::new();
        helper.start_timer(timer_attrs("t1"));
        helper.complete_workflow_execution(Some(b"done".to_vec()));

        let decisions = helper.get_decisions();
        assert_eq!(decisions.len(), 2);
        let completions = decisions
            .iter()
            .filter(|d| is_completion_decision(d))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(
            decisions.last().unwrap().decision_type,
            DecisionType::CompleteWorkflowExecution
        );
    }

    #[test]
    fn self_decision_is_singleton() {
        let mut helper = DecisionsHelper::new();
        helper.complete_workflow_execution(None);
        helper.fail_workflow_execution("boom".into(), None);

        let decisions = helper.get_decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::FailWorkflowExecution
        );
    }

    #[test]
    fn workflow_context_returned_only_when_changed() {
        let mut helper = DecisionsHelper::new();
        assert_eq!(helper.get_workflow_context_data_to_return(), None);

        helper.set_workflow_context_data(Some(b"state-1".to_vec()));
        assert_eq!(
            helper.get_workflow_context_data_to_return(),
            Some(b"state-1".to_vec())
        );

        // The service echoes the same blob back.
        helper.handle_decision_task_completed(&DecisionTaskCompletedEventAttributes {
            scheduled_event_id: 1,
            started_event_id: 2,
            identity: "worker".into(),
            execution_context: Some(b"state-1".to_vec()),
        });
        assert_eq!(helper.get_workflow_context_data_to_return(), None);

        helper.set_workflow_context_data(Some(b"state-2".to_vec()));
        assert_eq!(
            helper.get_workflow_context_data_to_return(),
            Some(b"state-2".to_vec())
        );
    }

    #[test]
    fn signal_resolution_uses_control_token() {
        let mut helper = DecisionsHelper::new();
        let signal_id = helper.get_next_id();
        assert_eq!(signal_id, "1");
        helper.signal_external_workflow_execution(
            signal_id.clone(),
            SignalExternalWorkflowExecutionDecisionAttributes {
                domain: "dom".into(),
                workflow_execution: Some(WorkflowExecution::new("other-wf", "run")),
                signal_name: "poke".into(),
                input: None,
                control: Some(signal_id.clone()),
                child_workflow_only: false,
            },
        );
        helper.handle_decision_task_started_event();

        let initiated = HistoryEvent::new(
            8,
            EventType::SignalExternalWorkflowExecutionInitiated,
            Some(EventAttributes::SignalExternalWorkflowExecutionInitiated(
                Box::new(SignalExternalWorkflowExecutionInitiatedEventAttributes {
                    decision_task_completed_event_id: 7,
                    domain: "dom".into(),
                    workflow_execution: Some(WorkflowExecution::new("other-wf", "run")),
                    signal_name: "poke".into(),
                    input: None,
                    control: Some(signal_id.clone()),
                    child_workflow_only: false,
                }),
            )),
        );
        helper
            .handle_signal_external_workflow_execution_initiated(&initiated)
            .unwrap();
        assert_eq!(helper.signal_id_for_initiated_event(8).unwrap(), signal_id);

        let signaled = HistoryEvent::new(
            10,
            EventType::ExternalWorkflowExecutionSignaled,
            Some(EventAttributes::ExternalWorkflowExecutionSignaled(
                Box::new(ExternalWorkflowExecutionSignaledEventAttributes {
                    initiated_event_id: 8,
                    domain: "dom".into(),
                    workflow_execution: Some(WorkflowExecution::new("other-wf", "run")),
                    control: Some(signal_id),
                }),
            )),
        );
        let done = helper
            .handle_external_workflow_execution_signaled(&signaled)
            .unwrap();
        assert!(done);
    }

    #[test]
    fn cancel_timer_after_fired_is_noop() {
        let mut helper = DecisionsHelper::new();
        helper.start_timer(timer_attrs("t1"));
        helper.handle_decision_task_started_event();
        let started = HistoryEvent::new(
            5,
            EventType::TimerStarted,
            Some(EventAttributes::TimerStarted(Box::new(
                TimerStartedEventAttributes {
                    timer_id: "t1".into(),
                    start_to_fire_timeout_seconds: 30,
                    decision_task_completed_event_id: 4,
                },
            ))),
        );
        helper.handle_timer_started(&started).unwrap();
        helper.handle_timer_closed("t1").unwrap();

        let done = helper.cancel_timer("t1", None).unwrap();
        assert!(done);
        assert!(helper.get_decisions().is_empty());
    }

    #[test]
    fn duplicate_event_delivery_is_idempotent() {
        let mut helper = DecisionsHelper::new();
        helper.schedule_activity_task(schedule_attrs("a1"));
        helper.handle_decision_task_started_event();

        let scheduled = activity_scheduled_event(5, "a1");
        helper.handle_activity_task_scheduled(&scheduled).unwrap();
        // Duplicate delivery of the same event within one task.
        helper.handle_activity_task_scheduled(&scheduled).unwrap();

        let completed = activity_completed_event(7, 5);
        assert!(helper.handle_activity_task_completed(&completed).unwrap());
        assert!(helper.handle_activity_task_completed(&completed).unwrap());
        assert!(helper.get_decisions().is_empty());
    }
}

//! The node executor (`SPEC_FULL.md` §4.3) — drives one node to completion,
//! interruption, or error, handling the promise loop and the saga loop.

use std::sync::Arc;

use serde_json::Value;

use crate::error::TOO_MANY_PROMISES_MESSAGE;
use crate::event::{FullStepContext, StepContext, StepEvent, StepEventWithC};
use crate::interrupt::{Interrupt, NodeSignal};
use crate::node::{NodeDescriptor, SagaAction};
use crate::replay::ReplayDispatcher;
use crate::result::NodeOutcome;
use crate::session::RunSession;
use crate::context::WorkflowContext;

/// Per-node-execution cap on captured-promise iterations.
pub(crate) const MAX_PROMISES: usize = 1000;

enum InterruptOutcome {
    /// A captured promise resolved; restart the promise loop so replay picks
    /// up the newly synthesized event.
    Restart,
    Outcome(NodeOutcome),
}

/// Drives `node` to a [`NodeOutcome`] against `session`'s shared state.
///
/// `snapshot` is the persisted `(eventIdx, value)` checkpoint for this node,
/// if a prior run left its saga suspended mid-iteration.
pub(crate) async fn execute_node(
    node: &NodeDescriptor,
    persisted_events: &[StepEvent],
    incoming_events: &[StepEvent],
    snapshot: Option<(usize, Value)>,
    session: &Arc<RunSession>,
) -> NodeOutcome {
    let mut unsatisfied = Vec::new();
    for dep in &node.dependencies {
        let satisfied = session
            .result_of(dep)
            .map(|outcome| outcome.satisfies_dependency())
            .unwrap_or(false);
        if !satisfied {
            unsatisfied.push(dep.clone());
        }
    }
    if !unsatisfied.is_empty() {
        return NodeOutcome::Pending { nodes: unsatisfied };
    }

    let mut promise_count = 0usize;

    loop {
        if promise_count >= MAX_PROMISES {
            tracing::error!(node = %node.key, "promise loop saturated");
            return NodeOutcome::Err {
                error: TOO_MANY_PROMISES_MESSAGE.to_string(),
            };
        }

        let temp_new = session.temp_events_for(&node.key);
        let dispatcher = Arc::new(ReplayDispatcher::new(
            persisted_events,
            incoming_events,
            &temp_new,
        ));
        let ctx = WorkflowContext::new(node.key.clone(), dispatcher.clone(), session.clone());

        let mut value: Value;
        let mut idx: usize;

        if node.saga.is_some() && snapshot.is_some() {
            let (snap_idx, snap_value) = snapshot.as_ref().unwrap();
            dispatcher.fast_forward(*snap_idx);
            idx = *snap_idx;
            value = snap_value.clone();
        } else {
            match (node.compute)(ctx.clone()).await {
                Ok(v) => {
                    value = v;
                    idx = dispatcher.cursor();
                }
                Err(NodeSignal::Interrupt(interrupt)) => {
                    match handle_interrupt(interrupt, &mut promise_count, session, None).await {
                        InterruptOutcome::Restart => continue,
                        InterruptOutcome::Outcome(outcome) => return outcome,
                    }
                }
                Err(NodeSignal::Error(msg)) => {
                    tracing::warn!(node = %node.key, error = %msg, "node body error");
                    return NodeOutcome::Err { error: msg };
                }
            }
        }

        let Some(saga_fn) = node.saga.clone() else {
            tracing::debug!(node = %node.key, "node done");
            return NodeOutcome::Done { value };
        };

        loop {
            let event_idx = idx;
            match saga_fn(ctx.clone(), value.clone()).await {
                Ok((action, next_value)) => {
                    if session.opts.deadline_active() {
                        tokio::task::yield_now().await;
                    }
                    value = next_value;
                    idx = dispatcher.cursor();
                    match action {
                        SagaAction::Halt => {
                            tracing::debug!(node = %node.key, "saga halted");
                            return NodeOutcome::Done { value };
                        }
                        SagaAction::Cont => continue,
                    }
                }
                Err(NodeSignal::Interrupt(interrupt)) => {
                    let checkpoint = Some((value.clone(), event_idx));
                    match handle_interrupt(interrupt, &mut promise_count, session, checkpoint).await
                    {
                        InterruptOutcome::Restart => break,
                        InterruptOutcome::Outcome(outcome) => return outcome,
                    }
                }
                Err(NodeSignal::Error(msg)) => {
                    tracing::warn!(node = %node.key, error = %msg, "saga body error");
                    return NodeOutcome::Err { error: msg };
                }
            }
        }
        // Saga loop broke to restart the promise loop with a newly recorded
        // captured-promise event; fall through to the top of `loop`.
    }
}

/// Shared by both the compute-level and saga-level call sites: resolves an
/// [`Interrupt`] either into a restart signal (captured promise resolved) or
/// a final [`NodeOutcome`] (input boundary or promise rejection).
///
/// `saga_checkpoint`, when `Some`, supplies the pre-saga value and the event
/// count consumed before this saga iteration began — the snapshot payload
/// `SPEC_FULL.md` §3 requires for mid-saga interruption.
async fn handle_interrupt(
    interrupt: Interrupt,
    promise_count: &mut usize,
    session: &Arc<RunSession>,
    saga_checkpoint: Option<(Value, usize)>,
) -> InterruptOutcome {
    match interrupt {
        Interrupt::Input {
            full_key,
            schema,
            wait_until,
        } => {
            let step_key = full_key.last().cloned().unwrap_or_default();
            let step_ctx = StepContext {
                key: step_key,
                schema,
                ..StepContext::default()
            };
            let step = FullStepContext::new(full_key, &step_ctx);
            let (value, event_idx) = match saga_checkpoint {
                Some((v, idx)) => (Some(v), if idx != 0 { Some(idx) } else { None }),
                None => (None, None),
            };
            InterruptOutcome::Outcome(NodeOutcome::Intr {
                step,
                value,
                event_idx,
                wait_until,
            })
        }
        Interrupt::Promise {
            step_key,
            context,
            future,
        } => match future.await {
            Ok(v) => {
                let ts = crate::time::wall_clock_ms();
                let node_key = step_key.first().cloned().unwrap_or_default();
                let event = StepEvent::new(step_key, v, ts);
                session.push_temp_event(&node_key, event.clone());
                session.push_consumed(StepEventWithC::new(event, context));
                *promise_count += 1;
                InterruptOutcome::Restart
            }
            Err(msg) => InterruptOutcome::Outcome(NodeOutcome::Err { error: msg }),
        },
    }
}

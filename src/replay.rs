//! The replay step dispatcher (`SPEC_FULL.md` §4.2).
//!
//! One [`ReplayDispatcher`] is installed per promise-loop iteration. It owns
//! the concatenation `persisted ++ incoming ++ temp_new` for the node
//! currently executing and a cursor into it; `consume` is the sole place a
//! `step` call resolves to a replayed value, an interrupt, or a divergence.

use std::sync::Mutex;

use crate::event::{path_to_string, Path, StepContext, StepEvent};

/// Where a matched event came from — decides whether it still needs to be
/// recorded on the consumed-events buffer a commit appends to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventSource {
    /// Already in `events[n]` from an earlier commit — recording it again
    /// would duplicate it on every future run.
    Persisted,
    /// Supplied by the caller on this `run`/`dry_run` call — not yet in the
    /// log, so commit must append it.
    Incoming,
    /// Synthesized by a captured promise earlier in *this same* node
    /// execution — already pushed onto the consumed-events buffer at the
    /// moment it was synthesized (see `executor::handle_interrupt`).
    Synthesized,
}

/// What consuming one step against the log produced.
pub(crate) enum StepOutcome {
    /// The log had a matching event at the cursor; advance past it.
    Replayed {
        value: serde_json::Value,
        ts: i64,
        inputs_mismatch: bool,
        source: EventSource,
    },
    /// The cursor is at the end of the log: no recorded answer yet.
    Boundary,
    /// The log had an event at the cursor, but for a different path. A
    /// deterministic-replay violation.
    Diverged { got: Path },
}

/// Per-execution replacement for the context's `step` operation — the
/// "`StepResolver` passed through rather than mutating a shared field" the
/// redesign notes call for.
pub(crate) struct ReplayDispatcher {
    all_events: Vec<StepEvent>,
    persisted_len: usize,
    incoming_end: usize,
    idx: Mutex<usize>,
}

impl ReplayDispatcher {
    pub fn new(persisted: &[StepEvent], incoming: &[StepEvent], temp_new: &[StepEvent]) -> Self {
        let mut all = Vec::with_capacity(persisted.len() + incoming.len() + temp_new.len());
        all.extend(persisted.iter().cloned());
        all.extend(incoming.iter().cloned());
        all.extend(temp_new.iter().cloned());
        Self {
            all_events: all,
            persisted_len: persisted.len(),
            incoming_end: persisted.len() + incoming.len(),
            idx: Mutex::new(0),
        }
    }

    /// The number of events consumed so far — becomes a saga's `eventIdx`.
    pub fn cursor(&self) -> usize {
        *self.idx.lock().unwrap()
    }

    /// Jumps the cursor forward without inspecting the skipped events — used
    /// when resuming from a saga snapshot, which already accounts for them.
    pub fn fast_forward(&self, to: usize) {
        *self.idx.lock().unwrap() = to.min(self.all_events.len());
    }

    pub fn consume(&self, full_key: &Path, context: &StepContext) -> StepOutcome {
        let mut idx = self.idx.lock().unwrap();
        if *idx >= self.all_events.len() {
            return StepOutcome::Boundary;
        }
        let matched_idx = *idx;
        let event = &self.all_events[matched_idx];
        if &event.k == full_key {
            *idx += 1;
            let inputs_mismatch = match (&event_inputs(event), &context.inputs) {
                (Some(recorded), Some(current)) => recorded != current,
                _ => false,
            };
            let source = if matched_idx < self.persisted_len {
                EventSource::Persisted
            } else if matched_idx < self.incoming_end {
                EventSource::Incoming
            } else {
                EventSource::Synthesized
            };
            StepOutcome::Replayed {
                value: event.v.clone(),
                ts: event.ts,
                inputs_mismatch,
                source,
            }
        } else {
            StepOutcome::Diverged {
                got: event.k.clone(),
            }
        }
    }
}

/// Events carry no `inputs` of their own today (that metadata lives on the
/// enriching [`crate::event::StepEventWithC`]); kept as a seam so a future
/// wire revision that does can plug in without touching the dispatcher's
/// call sites.
fn event_inputs(_event: &StepEvent) -> Option<Vec<String>> {
    None
}

pub(crate) fn full_key_string(path: &Path) -> String {
    path_to_string(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn event(path: &[&str], value: i64) -> StepEvent {
        StepEvent::new(path.iter().map(|s| s.to_string()).collect(), Value::from(value), 0)
    }

    #[test]
    fn replays_a_persisted_event_without_flagging_it_for_commit() {
        let persisted = vec![event(&["a", "s"], 1)];
        let dispatcher = ReplayDispatcher::new(&persisted, &[], &[]);
        let outcome = dispatcher.consume(&vec!["a".to_string(), "s".to_string()], &StepContext::new("s"));
        match outcome {
            StepOutcome::Replayed { value, source, .. } => {
                assert_eq!(value, Value::from(1));
                assert_eq!(source, EventSource::Persisted);
            }
            _ => panic!("expected replayed"),
        }
    }

    #[test]
    fn an_incoming_event_is_flagged_for_commit() {
        let incoming = vec![event(&["a", "s"], 1)];
        let dispatcher = ReplayDispatcher::new(&[], &incoming, &[]);
        let outcome = dispatcher.consume(&vec!["a".to_string(), "s".to_string()], &StepContext::new("s"));
        match outcome {
            StepOutcome::Replayed { source, .. } => assert_eq!(source, EventSource::Incoming),
            _ => panic!("expected replayed"),
        }
    }

    #[test]
    fn reaching_the_end_of_the_log_is_a_boundary() {
        let dispatcher = ReplayDispatcher::new(&[], &[], &[]);
        assert!(matches!(
            dispatcher.consume(&vec!["a".to_string(), "s".to_string()], &StepContext::new("s")),
            StepOutcome::Boundary
        ));
    }

    #[test]
    fn a_mismatched_path_at_the_cursor_is_a_divergence() {
        let persisted = vec![event(&["a", "other"], 1)];
        let dispatcher = ReplayDispatcher::new(&persisted, &[], &[]);
        let outcome = dispatcher.consume(&vec!["a".to_string(), "s".to_string()], &StepContext::new("s"));
        assert!(matches!(outcome, StepOutcome::Diverged { got } if got == vec!["a".to_string(), "other".to_string()]));
    }

    #[test]
    fn fast_forward_clamps_to_the_log_length() {
        let persisted = vec![event(&["a", "s"], 1)];
        let dispatcher = ReplayDispatcher::new(&persisted, &[], &[]);
        dispatcher.fast_forward(50);
        assert_eq!(dispatcher.cursor(), 1);
    }
}

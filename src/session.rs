//! The explicit, non-null transient state of one active run.
//!
//! `SPEC_FULL.md` §9 flags the source pattern of nullable per-run fields
//! (`tempResults`, `tempRunOpts`, …) living directly on the workflow. A
//! [`RunSession`] exists only for the duration of one `dry_run` call — it is
//! constructed fresh in [`crate::workflow::Workflow::dry_run`] and dropped at
//! its end, so none of its fields need an `Option` to represent "no run
//! active".

use std::collections::HashMap;
use std::sync::RwLock;

use crate::event::{StepEvent, StepEventWithC};
use crate::node::NodeKey;
use crate::result::NodeOutcome;

/// Options accepted by `run`/`dry_run`.
#[derive(Default, Clone)]
pub struct RunOpts {
    /// Abandons the in-flight schedule once this many milliseconds elapse.
    pub timeout: Option<u64>,
    /// Overrides the wall clock `getNow()` resolves to — essential for
    /// deterministic tests and for compressing virtual time.
    pub now: Option<std::sync::Arc<dyn Fn() -> i64 + Send + Sync>>,
}

impl std::fmt::Debug for RunOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOpts")
            .field("timeout", &self.timeout)
            .field("now", &self.now.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl RunOpts {
    pub fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub fn with_now(mut self, now: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.now = Some(std::sync::Arc::new(now));
        self
    }

    /// §4.4: "yield between saga iterations when a deadline is active" —
    /// gated on a timeout actually being armed, not merely present in code.
    pub fn deadline_active(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn resolve_now(&self) -> i64 {
        match &self.now {
            Some(f) => f(),
            None => crate::time::wall_clock_ms(),
        }
    }
}

/// Owns every field that is transient across exactly one `dry_run` call.
pub(crate) struct RunSession {
    pub opts: RunOpts,
    pub temp_results: RwLock<HashMap<NodeKey, NodeOutcome>>,
    pub temp_new_events: RwLock<HashMap<NodeKey, Vec<StepEvent>>>,
    pub consumed_events: RwLock<Vec<StepEventWithC>>,
    pub warnings: RwLock<Vec<String>>,
}

impl RunSession {
    pub fn new(opts: RunOpts) -> Self {
        Self {
            opts,
            temp_results: RwLock::new(HashMap::new()),
            temp_new_events: RwLock::new(HashMap::new()),
            consumed_events: RwLock::new(Vec::new()),
            warnings: RwLock::new(Vec::new()),
        }
    }

    pub fn result_of(&self, node: &str) -> Option<NodeOutcome> {
        self.temp_results.read().unwrap().get(node).cloned()
    }

    pub fn set_result(&self, node: NodeKey, outcome: NodeOutcome) {
        self.temp_results.write().unwrap().insert(node, outcome);
    }

    pub fn push_temp_event(&self, node: &str, event: StepEvent) {
        self.temp_new_events
            .write()
            .unwrap()
            .entry(node.to_string())
            .or_default()
            .push(event);
    }

    pub fn temp_events_for(&self, node: &str) -> Vec<StepEvent> {
        self.temp_new_events
            .read()
            .unwrap()
            .get(node)
            .cloned()
            .unwrap_or_default()
    }

    pub fn push_consumed(&self, event: StepEventWithC) {
        self.consumed_events.write().unwrap().push(event);
    }

    pub fn push_warning(&self, warning: impl Into<String>) {
        self.warnings.write().unwrap().push(warning.into());
    }

    /// A point-in-time copy of the session's results, consumed events, and
    /// warnings — taken without consuming `self` because the session may
    /// still be shared (e.g. a timed-out schedule whose in-flight node
    /// execution hasn't finished dropping its `Arc` clones yet).
    pub fn snapshot(&self) -> (HashMap<NodeKey, NodeOutcome>, Vec<StepEventWithC>, Vec<String>) {
        (
            self.temp_results.read().unwrap().clone(),
            self.consumed_events.read().unwrap().clone(),
            self.warnings.read().unwrap().clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn deadline_active_tracks_whether_a_timeout_was_set() {
        assert!(!RunOpts::default().deadline_active());
        assert!(RunOpts::default().with_timeout(10).deadline_active());
    }

    #[test]
    fn resolve_now_honors_an_injected_clock() {
        let opts = RunOpts::default().with_now(|| 42);
        assert_eq!(opts.resolve_now(), 42);
    }

    #[test]
    fn set_result_is_visible_through_result_of() {
        let session = RunSession::new(RunOpts::default());
        assert!(session.result_of("a").is_none());
        session.set_result("a".to_string(), NodeOutcome::Done { value: Value::from(1) });
        assert!(session.result_of("a").unwrap().is_done());
    }

    #[test]
    fn snapshot_reflects_pushed_state_without_consuming_the_session() {
        let session = RunSession::new(RunOpts::default());
        session.push_warning("careful");
        let (results, _events, warnings) = session.snapshot();
        assert!(results.is_empty());
        assert_eq!(warnings, vec!["careful".to_string()]);
    }
}

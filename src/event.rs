//! The persisted event log's wire types.
//!
//! A [`StepEvent`] is the unit the engine replays against: a path (`k`), the
//! value the in-body effect call observed (`v`), and when it was recorded
//! (`ts`). [`StepContext`]/[`FullStepContext`] carry the metadata a step
//! *declared* rather than the value it produced.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::NodeKey;

/// A path is the owning node's key followed by the in-body step identifier.
///
/// `path[0]` is always the node key; `path[1..]` is the step's nesting inside
/// the node body (almost always a single segment, since this engine does not
/// nest workflows).
pub type Path = Vec<String>;

pub(crate) fn path_to_string(path: &[String]) -> String {
    path.join(".")
}

pub(crate) fn node_key_of(path: &Path) -> Option<&str> {
    path.first().map(String::as_str)
}

/// A persisted `(path, value, timestamp)` triple.
///
/// `v` is opaque to the engine — it is neither inspected nor validated here.
/// Validation of `v` against a step's declared schema is the node body's
/// responsibility (see [`crate::error::WorkflowError`] for how a mismatch
/// surfaces).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub k: Path,
    pub v: Value,
    pub ts: i64,
}

impl StepEvent {
    pub fn new(k: Path, v: Value, ts: i64) -> Self {
        Self { k, v, ts }
    }

    pub fn node_key(&self) -> Option<&str> {
        node_key_of(&self.k)
    }
}

/// The metadata a step declares about itself, keyed by its local (in-node)
/// identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl StepContext {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// [`StepContext`] with `key` replaced by the step's full path — what gets
/// surfaced to callers on an `intr` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullStepContext {
    pub path: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl FullStepContext {
    pub fn new(path: Path, ctx: &StepContext) -> Self {
        Self {
            path,
            title: ctx.title.clone(),
            description: ctx.description.clone(),
            deadline: ctx.deadline,
            extra: ctx.extra.clone(),
            inputs: ctx.inputs.clone(),
            schema: ctx.schema.clone(),
        }
    }
}

/// A consumed event enriched with the live [`StepContext`] it was matched
/// against — the shape `dryRun` returns for external persistence/auditing.
///
/// The `i` field is a slot for an embedder's auditing layer: the input paths
/// the originating step declared, left unpopulated by the engine itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEventWithC {
    pub k: Path,
    pub v: Value,
    pub ts: i64,
    pub c: StepContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i: Option<Vec<Path>>,
}

impl StepEventWithC {
    pub fn new(event: StepEvent, context: StepContext) -> Self {
        Self {
            k: event.k,
            v: event.v,
            ts: event.ts,
            c: context,
            i: None,
        }
    }

    pub fn event(&self) -> StepEvent {
        StepEvent::new(self.k.clone(), self.v.clone(), self.ts)
    }
}

/// Filters `events` down to those whose path begins with `node`.
///
/// Mirrors §4.5 step 2: the scheduler slices incoming events to the subset
/// addressed to the node currently being executed before invoking the
/// executor.
pub(crate) fn events_for_node<'a>(events: &'a [StepEvent], node: &NodeKey) -> Vec<&'a StepEvent> {
    events
        .iter()
        .filter(|e| e.node_key() == Some(node.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_events_by_their_owning_node() {
        let events = vec![
            StepEvent::new(vec!["a".into(), "x".into()], Value::from(1), 0),
            StepEvent::new(vec!["b".into(), "y".into()], Value::from(2), 1),
            StepEvent::new(vec!["a".into(), "z".into()], Value::from(3), 2),
        ];
        let for_a = events_for_node(&events, &"a".to_string());
        assert_eq!(for_a.len(), 2);
        assert!(for_a.iter().all(|e| e.node_key() == Some("a")));
    }

    #[test]
    fn node_key_is_the_first_path_segment() {
        let event = StepEvent::new(vec!["node".into(), "step".into()], Value::Null, 0);
        assert_eq!(event.node_key(), Some("node"));
    }
}

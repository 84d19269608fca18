//! The per-node result: `pending` | `done` | `err` | `intr`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::FullStepContext;
use crate::node::NodeKey;

/// A node's outcome for one `run`/`dryRun`.
///
/// Named `NodeOutcome` rather than `Result` to avoid shadowing
/// [`std::result::Result`]; the wire shape still uses `status` as the
/// discriminator, matching `SPEC_FULL.md` §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NodeOutcome {
    /// One or more dependencies unresolved.
    Pending { nodes: Vec<NodeKey> },
    /// The node completed successfully.
    Done { value: Value },
    /// The node body raised an error that was not an internal interrupt.
    Err { error: String },
    /// The node suspended.
    Intr {
        step: FullStepContext,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        event_idx: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        wait_until: Option<i64>,
    },
}

impl NodeOutcome {
    /// Whether a dependent may treat this as a satisfied dependency — `done`,
    /// or `intr` with a defined value (a saga's partial value, published
    /// while the saga is itself suspended). See `SPEC_FULL.md` §4.3 step 1;
    /// this rule is what lets downstream nodes progress against long-running
    /// sagas and must never be weakened.
    pub fn satisfies_dependency(&self) -> bool {
        match self {
            NodeOutcome::Done { .. } => true,
            NodeOutcome::Intr { value, .. } => value.is_some(),
            NodeOutcome::Pending { .. } | NodeOutcome::Err { .. } => false,
        }
    }

    /// The value a dependent sees via `context.get(k)`, if any.
    pub fn dependency_value(&self) -> Option<&Value> {
        match self {
            NodeOutcome::Done { value } => Some(value),
            NodeOutcome::Intr { value, .. } => value.as_ref(),
            NodeOutcome::Pending { .. } | NodeOutcome::Err { .. } => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, NodeOutcome::Done { .. })
    }

    pub fn is_err(&self) -> bool {
        matches!(self, NodeOutcome::Err { .. })
    }

    pub fn is_intr(&self) -> bool {
        matches!(self, NodeOutcome::Intr { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, NodeOutcome::Pending { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_satisfies_a_dependency() {
        let outcome = NodeOutcome::Done { value: Value::from(1) };
        assert!(outcome.satisfies_dependency());
        assert_eq!(outcome.dependency_value(), Some(&Value::from(1)));
    }

    #[test]
    fn intr_with_a_value_satisfies_a_dependency() {
        let outcome = NodeOutcome::Intr {
            step: FullStepContext::new(vec!["n".into(), "s".into()], &crate::event::StepContext::new("s")),
            value: Some(Value::from(2)),
            event_idx: Some(3),
            wait_until: None,
        };
        assert!(outcome.satisfies_dependency());
        assert_eq!(outcome.dependency_value(), Some(&Value::from(2)));
    }

    #[test]
    fn intr_without_a_value_does_not_satisfy_a_dependency() {
        let outcome = NodeOutcome::Intr {
            step: FullStepContext::new(vec!["n".into(), "s".into()], &crate::event::StepContext::new("s")),
            value: None,
            event_idx: None,
            wait_until: None,
        };
        assert!(!outcome.satisfies_dependency());
    }

    #[test]
    fn pending_and_err_never_satisfy_a_dependency() {
        assert!(!NodeOutcome::Pending { nodes: vec![] }.satisfies_dependency());
        assert!(!NodeOutcome::Err { error: "boom".into() }.satisfies_dependency());
    }
}

//! The DAG scheduler (`SPEC_FULL.md` §4.5): topological ordering and the
//! per-node dispatch loop that drives a full `dry_run`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::event::{events_for_node, StepEvent};
use crate::executor;
use crate::node::{NodeDescriptor, NodeKey};
use crate::session::RunSession;
use serde_json::Value;

/// Post-order DFS over dependencies, visiting `insertion_order` left to
/// right so ties are broken by node-creation order.
pub(crate) fn topological_order(
    insertion_order: &[NodeKey],
    by_key: &HashMap<NodeKey, NodeDescriptor>,
) -> Vec<NodeKey> {
    let mut visited = HashSet::with_capacity(insertion_order.len());
    let mut result = Vec::with_capacity(insertion_order.len());
    for key in insertion_order {
        visit(key, by_key, &mut visited, &mut result);
    }
    result
}

fn visit(
    key: &NodeKey,
    by_key: &HashMap<NodeKey, NodeDescriptor>,
    visited: &mut HashSet<NodeKey>,
    result: &mut Vec<NodeKey>,
) {
    if !visited.insert(key.clone()) {
        return;
    }
    if let Some(node) = by_key.get(key) {
        for dep in &node.dependencies {
            visit(dep, by_key, visited, result);
        }
    }
    result.push(key.clone());
}

/// Runs every node in `order`, storing each [`crate::result::NodeOutcome`]
/// into `session` as it completes. A node's failure never aborts the
/// schedule — later nodes simply observe it through the pending/satisfaction
/// rule in `executor::execute_node`.
pub(crate) async fn run_schedule(
    order: &[NodeKey],
    by_key: &HashMap<NodeKey, NodeDescriptor>,
    persisted: &HashMap<NodeKey, Vec<StepEvent>>,
    incoming: &[StepEvent],
    snapshots: &HashMap<NodeKey, (usize, Value)>,
    session: &Arc<RunSession>,
) {
    let empty: Vec<StepEvent> = Vec::new();
    for key in order {
        let Some(node) = by_key.get(key) else { continue };
        let persisted_for_node = persisted.get(key).unwrap_or(&empty);
        let incoming_for_node: Vec<StepEvent> = events_for_node(incoming, key)
            .into_iter()
            .cloned()
            .collect();
        let snapshot = snapshots.get(key).cloned();

        tracing::debug!(node = %key, "executing node");
        let outcome = executor::execute_node(
            node,
            persisted_for_node,
            &incoming_for_node,
            snapshot,
            session,
        )
        .await;
        tracing::debug!(node = %key, status = outcome_label(&outcome), "node executed");
        session.set_result(key.clone(), outcome);
    }
}

fn outcome_label(outcome: &crate::result::NodeOutcome) -> &'static str {
    use crate::result::NodeOutcome::*;
    match outcome {
        Pending { .. } => "pending",
        Done { .. } => "done",
        Err { .. } => "err",
        Intr { .. } => "intr",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WorkflowContext;
    use crate::node::{ComputeFn, NodeDescriptor};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn leaf(key: &str, deps: Vec<&str>) -> NodeDescriptor {
        let compute: ComputeFn = Arc::new(|_ctx: WorkflowContext| {
            Box::pin(async move { Ok(serde_json::Value::Null) })
        });
        NodeDescriptor {
            key: key.to_string(),
            dependencies: deps.into_iter().map(String::from).collect(),
            group: None,
            title: None,
            description: None,
            schema: None,
            compute,
            saga: None,
        }
    }

    #[test]
    fn topological_order_places_every_node_after_its_dependencies() {
        let nodes = vec![
            leaf("c", vec!["a", "b"]),
            leaf("a", vec![]),
            leaf("b", vec!["a"]),
        ];
        let insertion_order: Vec<String> = nodes.iter().map(|n| n.key.clone()).collect();
        let by_key: HashMap<NodeKey, NodeDescriptor> =
            nodes.into_iter().map(|n| (n.key.clone(), n)).collect();
        let order = topological_order(&insertion_order, &by_key);
        let pos = |k: &str| order.iter().position(|x| x == k).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("c"));
    }

    proptest! {
        /// For any chain `0 -> 1 -> .. -> n-1` built in a random insertion
        /// order, the topological order must still place every node after
        /// the one it depends on.
        #[test]
        fn chain_dependencies_always_precede_their_dependents(seed in 0u64..64) {
            let n = 6;
            let mut keys: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
            // Deterministic pseudo-shuffle of insertion order from `seed`,
            // avoiding `rand::thread_rng` so the case is reproducible.
            for i in (1..keys.len()).rev() {
                let j = (seed as usize).wrapping_mul(2654435761).wrapping_add(i) % (i + 1);
                keys.swap(i, j);
            }
            let nodes: Vec<NodeDescriptor> = (0..n)
                .map(|i| {
                    let deps = if i == 0 { vec![] } else { vec![format!("n{}", i - 1)] };
                    leaf(&format!("n{i}"), deps.iter().map(String::as_str).collect())
                })
                .collect();
            let by_key: HashMap<NodeKey, NodeDescriptor> =
                nodes.into_iter().map(|n| (n.key.clone(), n)).collect();
            let order = topological_order(&keys, &by_key);
            let pos = |k: &str| order.iter().position(|x| x == k).unwrap();
            for i in 1..n {
                prop_assert!(pos(&format!("n{}", i - 1)) < pos(&format!("n{i}")));
            }
        }
    }
}

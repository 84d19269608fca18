//! The run orchestrator (`SPEC_FULL.md` §4.6) — the `Workflow` type itself,
//! and the `dryRun`/`run`/`spawn`/`fork`/`topology` surface described in §6.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::{Result, WorkflowError};
use crate::event::{StepEvent, StepEventWithC};
use crate::node::{NodeDescriptor, NodeKey, NodeTopology};
use crate::result::NodeOutcome;
use crate::scheduler;
use crate::session::{RunOpts, RunSession};

/// The immutable half of a `Workflow` — its node set and derived orderings.
/// Wrapped once in an `Arc` so `spawn`/`fork` share it instead of re-deriving
/// the topological order on every call.
struct WorkflowShared {
    nodes: HashMap<NodeKey, NodeDescriptor>,
    insertion_order: Vec<NodeKey>,
    topo_order: Vec<NodeKey>,
    groups: Vec<String>,
}

/// A built, runnable DAG. See `SPEC_FULL.md` §3/§6.
///
/// `events`/`snapshots` are this instance's mutable, persisted state; `shared`
/// is the frozen node set every instance derived from the same `build` call
/// (directly or via `spawn`/`fork`) holds in common.
pub struct Workflow {
    shared: Arc<WorkflowShared>,
    events: RwLock<HashMap<NodeKey, Vec<StepEvent>>>,
    snapshots: RwLock<HashMap<NodeKey, (usize, Value)>>,
    is_running: AtomicBool,
}

/// The raw result of a `dry_run` call: per-node outcomes, the events this run
/// consumed (enriched with the `StepContext` each was matched against), any
/// `context_updated` warnings, and whether `opts.timeout` cut the run short.
#[derive(Debug, Clone)]
pub struct DryRunOutput {
    pub values: HashMap<NodeKey, NodeOutcome>,
    pub new_events: Vec<StepEventWithC>,
    pub warnings: Vec<String>,
    pub timeout: bool,
}

impl Workflow {
    pub(crate) fn new(nodes: Vec<NodeDescriptor>, groups: Vec<String>) -> Self {
        let insertion_order: Vec<NodeKey> = nodes.iter().map(|n| n.key.clone()).collect();
        let by_key: HashMap<NodeKey, NodeDescriptor> =
            nodes.into_iter().map(|n| (n.key.clone(), n)).collect();
        let topo_order = scheduler::topological_order(&insertion_order, &by_key);
        Self {
            shared: Arc::new(WorkflowShared {
                nodes: by_key,
                insertion_order,
                topo_order,
                groups,
            }),
            events: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            is_running: AtomicBool::new(false),
        }
    }

    /// Executes one pass of the schedule against `incoming` without
    /// committing anything to `self`'s persisted state. Fails with
    /// [`WorkflowError::ConcurrentRun`] if another `dry_run`/`run` is already
    /// in flight on this instance — §5's single-active-run invariant.
    pub async fn dry_run(&self, incoming: Vec<StepEvent>, opts: RunOpts) -> Result<DryRunOutput> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WorkflowError::ConcurrentRun);
        }

        tracing::info!(nodes = self.shared.topo_order.len(), "starting dry run");

        let persisted = self.events.read().unwrap().clone();
        let snapshots = self.snapshots.read().unwrap().clone();
        let timeout_ms = opts.timeout;
        let session = Arc::new(RunSession::new(opts));

        let schedule: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> =
            Box::pin(scheduler::run_schedule(
                &self.shared.topo_order,
                &self.shared.nodes,
                &persisted,
                &incoming,
                &snapshots,
                &session,
            ));

        let timed_out = match timeout_ms {
            Some(ms) => {
                tokio::select! {
                    _ = schedule => false,
                    _ = tokio::time::sleep(std::time::Duration::from_millis(ms)) => {
                        tracing::warn!("dry run timed out after {ms}ms");
                        true
                    }
                }
            }
            None => {
                schedule.await;
                false
            }
        };

        let (values, consumed, warnings) = session.snapshot();
        self.is_running.store(false, Ordering::SeqCst);

        tracing::info!(timeout = timed_out, "dry run finished");
        Ok(DryRunOutput {
            values,
            new_events: consumed,
            warnings,
            timeout: timed_out,
        })
    }

    /// `dry_run`, then commits: every consumed event is appended to its
    /// node's persisted log, and every `intr` result carrying an `event_idx`
    /// becomes that node's new saga snapshot. Raises [`WorkflowError::Timeout`]
    /// instead of committing if the schedule did not finish in time.
    pub async fn run(&self, incoming: Vec<StepEvent>, opts: RunOpts) -> Result<HashMap<NodeKey, NodeOutcome>> {
        let output = self.dry_run(incoming, opts).await?;
        if output.timeout {
            return Err(WorkflowError::Timeout);
        }

        {
            let mut events = self.events.write().unwrap();
            for consumed in &output.new_events {
                if let Some(node) = consumed.k.first() {
                    events.entry(node.clone()).or_default().push(consumed.event());
                }
            }
        }
        {
            let mut snapshots = self.snapshots.write().unwrap();
            for (key, outcome) in &output.values {
                if let NodeOutcome::Intr {
                    value: Some(value),
                    event_idx: Some(idx),
                    ..
                } = outcome
                {
                    snapshots.insert(key.clone(), (*idx, value.clone()));
                }
            }
        }

        Ok(output.values)
    }

    /// A fresh workflow over the same node set with no events or snapshots.
    pub fn spawn(&self) -> Workflow {
        Workflow {
            shared: self.shared.clone(),
            events: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            is_running: AtomicBool::new(false),
        }
    }

    /// A workflow over the same node set with a deep copy of this instance's
    /// events and snapshots — resolved per `SPEC_FULL.md` §9's fork open
    /// question. `HashMap::clone` already performs the deep copy here since
    /// neither `StepEvent` nor `Value` share state via reference counting.
    pub fn fork(&self) -> Workflow {
        Workflow {
            shared: self.shared.clone(),
            events: RwLock::new(self.events.read().unwrap().clone()),
            snapshots: RwLock::new(self.snapshots.read().unwrap().clone()),
            is_running: AtomicBool::new(false),
        }
    }

    /// A UI-renderable view of every node in topological order.
    pub fn topology(&self) -> Vec<NodeTopology> {
        self.shared
            .topo_order
            .iter()
            .filter_map(|key| self.shared.nodes.get(key))
            .map(|node| NodeTopology {
                node: node.key.clone(),
                schema: node.schema.clone(),
                dependencies: node.dependencies.clone(),
                title: node.title.clone(),
                description: node.description.clone(),
                is_saga: node.is_saga(),
            })
            .collect()
    }

    pub fn get_dependencies(&self, key: &str) -> Vec<NodeKey> {
        self.shared
            .nodes
            .get(key)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default()
    }

    pub fn topological_sort(&self) -> Vec<NodeKey> {
        self.shared.topo_order.clone()
    }

    pub fn groups(&self) -> &[String] {
        &self.shared.groups
    }

    pub fn insertion_order(&self) -> &[NodeKey] {
        &self.shared.insertion_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{NodeSpec, WorkflowBuilder};
    use crate::context::WorkflowContext;
    use std::sync::Arc;

    fn done(value: Value) -> crate::node::ComputeFn {
        Arc::new(move |_ctx: WorkflowContext| {
            let value = value.clone();
            Box::pin(async move { Ok(value) })
        })
    }

    #[tokio::test]
    async fn runs_a_linear_chain_in_order() {
        let workflow = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a"), done(Value::from(1)), None)
            .add_node(NodeSpec::new("b").depends_on(["a"]), done(Value::from(2)), None)
            .build()
            .unwrap();

        let result = workflow.run(vec![], RunOpts::default()).await.unwrap();
        assert!(result.get("a").unwrap().is_done());
        assert!(result.get("b").unwrap().is_done());
        assert_eq!(workflow.topological_sort(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn pending_node_waits_on_its_dependency() {
        let blocked: crate::node::ComputeFn = Arc::new(|ctx: WorkflowContext| {
            Box::pin(async move {
                ctx.step(crate::event::StepContext::new("wait")).map(|_| Value::Null)
            })
        });
        let workflow = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a"), blocked, None)
            .add_node(NodeSpec::new("b").depends_on(["a"]), done(Value::from(2)), None)
            .build()
            .unwrap();

        let result = workflow.run(vec![], RunOpts::default()).await.unwrap();
        assert!(result.get("a").unwrap().is_intr());
        match result.get("b").unwrap() {
            NodeOutcome::Pending { nodes } => assert_eq!(nodes, &vec!["a".to_string()]),
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let workflow = Arc::new(
            WorkflowBuilder::new()
                .add_node(NodeSpec::new("a"), done(Value::from(1)), None)
                .build()
                .unwrap(),
        );
        workflow.is_running.store(true, Ordering::SeqCst);
        let err = workflow.dry_run(vec![], RunOpts::default()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ConcurrentRun));
    }

    #[tokio::test]
    async fn fork_deep_copies_events_independently_of_the_source() {
        let workflow = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a"), done(Value::from(1)), None)
            .build()
            .unwrap();
        workflow.run(vec![], RunOpts::default()).await.unwrap();

        let forked = workflow.fork();
        forked.events.write().unwrap().clear();
        assert!(!workflow.events.read().unwrap().is_empty());
        assert!(forked.events.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawn_shares_nodes_but_starts_with_empty_events() {
        let workflow = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a"), done(Value::from(1)), None)
            .build()
            .unwrap();
        workflow.run(vec![], RunOpts::default()).await.unwrap();
        assert!(!workflow.events.read().unwrap().is_empty());

        let spawned = workflow.spawn();
        assert!(spawned.events.read().unwrap().is_empty());
        assert!(spawned.snapshots.read().unwrap().is_empty());
        assert_eq!(spawned.topological_sort(), workflow.topological_sort());

        let result = spawned.run(vec![], RunOpts::default()).await.unwrap();
        assert!(result["a"].is_done());
    }

    #[tokio::test]
    async fn a_slow_node_times_out_and_commits_nothing() {
        let should_block = Arc::new(AtomicBool::new(true));
        let gate = should_block.clone();
        let slow: crate::node::ComputeFn = Arc::new(move |_ctx: WorkflowContext| {
            let gate = gate.clone();
            Box::pin(async move {
                if gate.load(Ordering::SeqCst) {
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                }
                Ok(Value::from(1))
            })
        });
        let workflow = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a"), slow, None)
            .build()
            .unwrap();

        let err = workflow
            .run(vec![], RunOpts::default().with_timeout(10))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Timeout));
        assert!(workflow.events.read().unwrap().is_empty());
        assert!(!workflow.is_running.load(Ordering::SeqCst));

        should_block.store(false, Ordering::SeqCst);
        let result = workflow.run(vec![], RunOpts::default()).await.unwrap();
        assert!(result["a"].is_done());
    }
}

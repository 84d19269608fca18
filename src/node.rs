//! Node descriptors: the immutable, build-time half of the data model.
//!
//! A [`NodeDescriptor`] never changes after [`crate::builder::WorkflowBuilder::build`]
//! returns. Its `compute`/`saga` closures are the only place a crate user's
//! code runs; everything else in this crate exists to drive them to
//! completion, interruption, or error exactly once per distinct event
//! history.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::context::WorkflowContext;
use crate::interrupt::NodeSignal;

/// Identifies a node uniquely within one workflow.
pub type NodeKey = String;

/// A boxed, `Send`, `'static` future — the shape every async entry point in
/// this crate returns, matching the executor-type-alias idiom used
/// throughout the graph engine this crate descends from.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a `compute`/`saga` body returns to signal suspension instead of
/// throwing: `Ok` is a normal value, `Err` carries either an interrupt or an
/// ordinary body error. Building on [`std::result::Result`] rather than a
/// thrown exception keeps control flow a plain sum type the executor matches
/// on, per the interrupt-modeling note in `SPEC_FULL.md` §9.
pub type ComputeResult = std::result::Result<Value, NodeSignal>;

/// A node's compute body. Takes an owned, cheaply-`Clone`-able context
/// (rather than a borrow) so it composes with `'static` boxed futures the
/// same way the teacher's `NodeExecutor` type alias does.
pub type ComputeFn = Arc<dyn Fn(WorkflowContext) -> BoxFuture<ComputeResult> + Send + Sync>;

/// Whether a saga iteration wants another round or is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaAction {
    Cont,
    Halt,
}

/// What a saga iteration returns to signal suspension: same shape as
/// [`ComputeResult`], with the value slot replaced by `(action, next_value)`.
pub type SagaResult = std::result::Result<(SagaAction, Value), NodeSignal>;

/// A node's saga body: given the context and the current value, decides
/// whether to continue iterating and what the next value is.
pub type SagaFn = Arc<dyn Fn(WorkflowContext, Value) -> BoxFuture<SagaResult> + Send + Sync>;

/// Immutable after build. See `SPEC_FULL.md` §3 "Node descriptor".
#[derive(Clone)]
pub struct NodeDescriptor {
    pub key: NodeKey,
    pub dependencies: Vec<NodeKey>,
    pub group: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Value>,
    pub compute: ComputeFn,
    pub saga: Option<SagaFn>,
}

impl NodeDescriptor {
    pub fn is_saga(&self) -> bool {
        self.saga.is_some()
    }
}

impl std::fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .field("group", &self.group)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .field("compute", &"<fn>")
            .field("saga", &self.saga.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// A view of one node suitable for UI rendering — `Workflow::topology`'s
/// element type.
#[derive(Debug, Clone)]
pub struct NodeTopology {
    pub node: NodeKey,
    pub schema: Option<Value>,
    pub dependencies: Vec<NodeKey>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_saga: bool,
}

//! # durable-flow - Durable, Interruptible Workflows Over a Typed DAG
//!
//! A small orchestration engine for workflows that must survive process
//! restarts: a typed DAG of compute nodes that can suspend mid-body — on an
//! awaited external input, a deadline, or a captured side effect — and resume
//! later by replaying its own event log.
//!
//! ## Core Concepts
//!
//! ### 1. `WorkflowBuilder` - construction
//!
//! [`WorkflowBuilder`] accumulates [`NodeSpec`]s and validates the DAG
//! invariant once, at `build`: no duplicate keys, no dependency referencing a
//! node that has not been added yet.
//!
//! ### 2. Suspension as data, not exceptions
//!
//! A node's `compute`/`saga` body is a plain async closure returning
//! [`node::ComputeResult`]/[`node::SagaResult`] — ordinary [`std::result::Result`]s.
//! Calling [`WorkflowContext::step`], `capture`, `sleep`, or `wait_until`
//! either replays a past answer, or returns `Err(NodeSignal::Interrupt(..))` to
//! suspend. No panic or thrown sentinel ever crosses a node body boundary.
//!
//! ### 3. Replay-driven resumption
//!
//! Every `run`/`dry_run` call re-executes every node from the top of its
//! body, replaying the same sequence of recorded [`StepEvent`]s it produced
//! last time until it reaches the point where it previously suspended, then
//! makes new progress from there. This is why node bodies must be
//! deterministic apart from the effects they route through the context.
//!
//! ### 4. Sagas
//!
//! A node with a `saga` body iterates after its `compute` body resolves,
//! checkpointing `(event_idx, value)` at each interruption so a long-running
//! saga can resume mid-iteration instead of re-running earlier iterations.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use durable_flow::{WorkflowBuilder, NodeSpec, WorkflowContext, RunOpts};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! # async fn run() -> durable_flow::error::Result<()> {
//! let workflow = WorkflowBuilder::new()
//!     .add_node(
//!         NodeSpec::new("greet"),
//!         Arc::new(|_ctx: WorkflowContext| {
//!             Box::pin(async move { Ok(Value::from("hello")) })
//!         }),
//!         None,
//!     )
//!     .build()?;
//!
//! let results = workflow.run(vec![], RunOpts::default()).await?;
//! assert!(results["greet"].is_done());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`node`] - the immutable build-time data model (`NodeDescriptor`, compute/saga closures)
//! - [`event`] - the persisted event log's wire types (`StepEvent`, `StepContext`)
//! - [`result`] - the per-run `NodeOutcome` (`pending`/`done`/`err`/`intr`)
//! - [`interrupt`] - suspension modeled as an internal sum type
//! - [`error`] - the error taxonomy that escapes to callers
//! - [`builder`] - the `add_group`/`add_node`/`build` construction surface
//! - [`context`] - the `get`/`step`/`capture`/`now`/`random`/`sleep` node-body facade
//! - [`session`] - `RunOpts` and the explicit per-run transient state
//! - [`workflow`] - `Workflow` itself: `dry_run`/`run`/`spawn`/`fork`/`topology`

pub mod builder;
pub mod context;
pub mod error;
pub mod event;
pub mod interrupt;
pub mod node;
pub mod result;
pub mod session;
pub mod workflow;

pub(crate) mod executor;
pub(crate) mod replay;
pub(crate) mod scheduler;
pub(crate) mod time;

pub use builder::{NodeSpec, WorkflowBuilder};
pub use context::WorkflowContext;
pub use error::{Result, WorkflowError};
pub use event::{FullStepContext, Path, StepContext, StepEvent, StepEventWithC};
pub use interrupt::{Interrupt, NodeSignal};
pub use node::{
    ComputeFn, ComputeResult, NodeDescriptor, NodeKey, NodeTopology, SagaAction, SagaFn, SagaResult,
};
pub use result::NodeOutcome;
pub use session::RunOpts;
pub use workflow::{DryRunOutput, Workflow};

//! The workflow context facade (`SPEC_FULL.md` §4.4) — the operations a node
//! body calls: `get`, `step`, `capture`, `now`, `random`, `sleep`,
//! `waitUntil`.
//!
//! Per the redesign note in §9, `WorkflowContext` is a thin adapter holding a
//! reference to the active [`RunSession`] and this execution's
//! [`ReplayDispatcher`] — it does not own the DAG or the log, and the
//! scheduler does not implement this trait's surface on itself.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::replay_divergence_message;
use crate::event::{Path, StepContext};
use crate::interrupt::{CapturedFuture, Interrupt, NodeSignal};
use crate::node::{ComputeResult, NodeKey};
use crate::replay::{full_key_string, EventSource, ReplayDispatcher, StepOutcome};
use crate::session::RunSession;

/// Cheap to clone: every field is an `Arc` or small owned data, matching the
/// `Clone`-able shared-state struct idiom this crate's suspension model is
/// grounded on.
#[derive(Clone)]
pub struct WorkflowContext {
    node_key: NodeKey,
    current_keys: Path,
    dispatcher: Arc<ReplayDispatcher>,
    session: Arc<RunSession>,
}

impl WorkflowContext {
    pub(crate) fn new(
        node_key: NodeKey,
        dispatcher: Arc<ReplayDispatcher>,
        session: Arc<RunSession>,
    ) -> Self {
        let current_keys = vec![node_key.clone()];
        Self {
            node_key,
            current_keys,
            dispatcher,
            session,
        }
    }

    pub fn node_key(&self) -> &str {
        &self.node_key
    }

    fn full_key(&self, step_key: &str) -> Path {
        let mut path = self.current_keys.clone();
        path.push(step_key.to_string());
        path
    }

    /// `tempResults[k].value` for `done`/`intr` results; `None` otherwise.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.session
            .result_of(key)
            .and_then(|o| o.dependency_value().cloned())
    }

    /// Pure suspension primitive: replays if the log has an answer at this
    /// position, diverges if it has a different one, and raises
    /// [`Interrupt::Input`] at the boundary.
    pub fn step(&self, ctx: StepContext) -> ComputeResult {
        let full_key = self.full_key(&ctx.key);
        match self.dispatcher.consume(&full_key, &ctx) {
            StepOutcome::Replayed {
                value,
                ts,
                inputs_mismatch,
                source,
            } => {
                if inputs_mismatch {
                    self.session
                        .push_warning(format!("context_updated: {}", full_key_string(&full_key)));
                }
                if source == EventSource::Incoming {
                    let event = crate::event::StepEvent::new(full_key, value.clone(), ts);
                    self.session
                        .push_consumed(crate::event::StepEventWithC::new(event, ctx));
                }
                Ok(value)
            }
            StepOutcome::Boundary => Err(NodeSignal::Interrupt(Interrupt::Input {
                full_key,
                schema: ctx.schema.clone(),
                wait_until: None,
            })),
            StepOutcome::Diverged { got } => Err(NodeSignal::Error(replay_divergence_message(
                &full_key_string(&full_key),
                &full_key_string(&got),
            ))),
        }
    }

    /// Idempotent side effect. `f` is invoked at most once per distinct
    /// `(node, capture-path)` across the workflow instance's lifetime: once
    /// the event it synthesizes is persisted, every later replay finds it
    /// through `step` and never calls `f` again.
    ///
    /// Every capture funnels through [`Interrupt::Promise`] rather than
    /// branching on whether `f` resolves synchronously — `f`'s future
    /// resolving immediately costs one extra promise-loop iteration
    /// (budgeted generously at `MAX_PROMISES`) but keeps one code path for
    /// both the synchronous and asynchronous cases the spec distinguishes.
    /// See `DESIGN.md` for why this simplification is safe.
    pub async fn capture<F, Fut>(&self, ctx: StepContext, f: F) -> ComputeResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Value, String>> + Send + 'static,
    {
        let step_key = format!("capture:{}", ctx.key);
        let inner = StepContext {
            key: step_key,
            schema: ctx.schema.clone(),
            ..StepContext::default()
        };
        match self.step(inner) {
            Ok(value) => Ok(value),
            Err(NodeSignal::Interrupt(Interrupt::Input { full_key, .. })) => {
                let future: CapturedFuture = Box::pin(f());
                Err(NodeSignal::Interrupt(Interrupt::Promise {
                    step_key: full_key,
                    context: ctx,
                    future,
                }))
            }
            Err(other) => Err(other),
        }
    }

    /// `capture({key:"now", ...}, wallClock)` — a deterministically
    /// replayable timestamp honoring `RunOpts::now` if set.
    pub async fn now(&self) -> ComputeResult {
        let now_override = self.session.opts.now.clone();
        self.capture(StepContext::new("now"), move || async move {
            let millis = match now_override {
                Some(f) => f(),
                None => crate::time::wall_clock_ms(),
            };
            Ok(Value::from(millis))
        })
        .await
    }

    /// `capture({key:"random", ...}, uniformRandom)` — deterministically
    /// replayable entropy.
    pub async fn random(&self) -> ComputeResult {
        self.capture(StepContext::new("random"), || async {
            use rand::Rng;
            let sample = rand::thread_rng().gen::<f64>();
            Ok(Value::from(sample))
        })
        .await
    }

    /// `waitUntil(now() + ms, {key: "sleep", ...ctx})`.
    pub async fn sleep(&self, millis: i64, ctx: Option<StepContext>) -> ComputeResult {
        let now = self.now().await?;
        let now_ms = now.as_i64().unwrap_or(0);
        let step_ctx = ctx.unwrap_or_else(|| StepContext::new("sleep"));
        self.wait_until(now_ms + millis, Some(step_ctx))
    }

    /// If the live clock (`getNow()`, honoring `RunOpts::now`) is already
    /// past `deadline`, proceeds; otherwise raises [`Interrupt::Input`]
    /// carrying `wait_until`.
    pub fn wait_until(&self, deadline: i64, ctx: Option<StepContext>) -> ComputeResult {
        let now = self.session.opts.resolve_now();
        if now >= deadline {
            return Ok(Value::Null);
        }
        let step_ctx = ctx.unwrap_or_else(|| StepContext::new("waitUntil"));
        let full_key = self.full_key(&step_ctx.key);
        Err(NodeSignal::Interrupt(Interrupt::Input {
            full_key,
            schema: step_ctx.schema.clone(),
            wait_until: Some(deadline),
        }))
    }
}

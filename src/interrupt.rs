//! Suspension modeled as data, not exceptions.
//!
//! `SPEC_FULL.md` §9 flags the source pattern of throwing typed sentinels
//! (`InputInterrupt`, `PromiseInterrupt`) for control flow as needing
//! re-architecture. Here an [`Interrupt`] is a plain enum returned inside a
//! [`std::result::Result`] from the context's effect operations; the
//! executor matches on it directly. No panic, no `catch_unwind`, no thrown
//! sentinel ever crosses a node body boundary.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::event::{Path, StepContext};

/// A future representing one captured side effect, awaited by the executor's
/// promise loop. `'static` because it is handed off across an iteration
/// boundary rather than borrowed for the duration of one poll.
pub type CapturedFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, String>> + Send>>;

/// Why a node body suspended.
pub enum Interrupt {
    /// `step`/`waitUntil` reached the end of the replayed event log (or a
    /// deadline that has not yet passed). The executor converts this
    /// directly into an `intr` [`crate::result::NodeOutcome`].
    Input {
        full_key: Path,
        schema: Option<Value>,
        wait_until: Option<i64>,
    },
    /// `capture` needs to actually run its side effect. The executor awaits
    /// `future`, synthesizes an event from the result, and restarts the
    /// node's promise loop so replay picks the new event up.
    Promise {
        step_key: Path,
        context: StepContext,
        future: CapturedFuture,
    },
}

impl std::fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupt::Input {
                full_key,
                wait_until,
                ..
            } => f
                .debug_struct("Interrupt::Input")
                .field("full_key", full_key)
                .field("wait_until", wait_until)
                .finish(),
            Interrupt::Promise { step_key, .. } => f
                .debug_struct("Interrupt::Promise")
                .field("step_key", step_key)
                .finish(),
        }
    }
}

/// What a `compute`/`saga` body propagates with `?` instead of throwing:
/// either a suspension request or an ordinary error message.
#[derive(Debug)]
pub enum NodeSignal {
    Interrupt(Interrupt),
    Error(String),
}

impl NodeSignal {
    pub fn error(message: impl Into<String>) -> Self {
        NodeSignal::Error(message.into())
    }
}

impl std::fmt::Display for NodeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSignal::Interrupt(i) => write!(f, "unresolved interrupt: {i:?}"),
            NodeSignal::Error(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for NodeSignal {}

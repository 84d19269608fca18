//! Error types for workflow construction and execution.
//!
//! Only the taxonomy kinds that *escape to the caller* (`SPEC_FULL.md` §7)
//! live here as [`WorkflowError`] variants — build errors and the
//! concurrent-run/timeout errors raised from `run`/`dryRun`. Replay
//! divergence, body exceptions, and promise-loop saturation are local to a
//! node and are carried as [`crate::result::NodeOutcome::Err`] payloads
//! instead, per §7's policy that they "do not poison the whole run".

use thiserror::Error;

/// The exact message `run` raises when a `dryRun` it delegates to times out.
pub const TIMEOUT_MESSAGE: &str = "Timeout";

/// The exact message the executor returns once a node execution exhausts
/// `MAX_PROMISES` captured-promise iterations.
pub const TOO_MANY_PROMISES_MESSAGE: &str = "Too many promises in a single step!";

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that can escape `WorkflowBuilder::build`, `Workflow::run`, or
/// `Workflow::dry_run`.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A node key was registered twice.
    #[error("duplicate node key '{key}'")]
    DuplicateNode { key: String },

    /// `add_node` referenced a dependency that has not been added yet.
    #[error("node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    /// `dryRun` was entered while another run was already active on this
    /// instance.
    #[error("a run is already active on this workflow instance")]
    ConcurrentRun,

    /// `run` delegated to `dryRun`, which hit `opts.timeout` before the
    /// schedule completed.
    #[error("{TIMEOUT_MESSAGE}")]
    Timeout,
}

impl WorkflowError {
    pub fn duplicate_node(key: impl Into<String>) -> Self {
        WorkflowError::DuplicateNode { key: key.into() }
    }

    pub fn unknown_dependency(node: impl Into<String>, dependency: impl Into<String>) -> Self {
        WorkflowError::UnknownDependency {
            node: node.into(),
            dependency: dependency.into(),
        }
    }
}

/// Builds the exact replay-divergence message `SPEC_FULL.md` §4.2 specifies.
pub(crate) fn replay_divergence_message(expected: &str, got: &str) -> String {
    format!("Expected event {expected} but got {got} instead")
}

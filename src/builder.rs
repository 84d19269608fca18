//! The node/group construction surface (`SPEC_FULL.md` §6).
//!
//! Deliberately thin: `add_group`/`add_node` are an immutable
//! record-accumulator (the spec calls this collaborator trivial and scopes
//! it out of the engine's engineering depth). All the validation this module
//! performs is the DAG invariant `build` enforces once, at the end.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{Result, WorkflowError};
use crate::node::{ComputeFn, NodeDescriptor, NodeKey, SagaFn};
use crate::workflow::Workflow;

/// Accumulates node and group declarations before `build` validates and
/// freezes them into a [`Workflow`].
#[derive(Default)]
pub struct WorkflowBuilder {
    groups: Vec<String>,
    nodes: Vec<NodeDescriptor>,
}

/// The declarative fields of a node, separated from its `compute`/`saga`
/// closures so `add_node` reads as one call per node regardless of how much
/// metadata it carries.
#[derive(Default)]
pub struct NodeSpec {
    pub key: NodeKey,
    pub dependencies: Vec<NodeKey>,
    pub group: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Value>,
}

impl NodeSpec {
    pub fn new(key: impl Into<NodeKey>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = impl Into<NodeKey>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarative group registration; no behavior beyond the name itself.
    pub fn add_group(mut self, name: impl Into<String>) -> Self {
        self.groups.push(name.into());
        self
    }

    pub fn add_node(mut self, spec: NodeSpec, compute: ComputeFn, saga: Option<SagaFn>) -> Self {
        self.nodes.push(NodeDescriptor {
            key: spec.key,
            dependencies: spec.dependencies,
            group: spec.group,
            title: spec.title,
            description: spec.description,
            schema: spec.schema,
            compute,
            saga,
        });
        self
    }

    /// Validates the DAG invariant — no duplicate keys, and every dependency
    /// must already have been added by an earlier `add_node` call — then
    /// freezes the result into a [`Workflow`].
    pub fn build(self) -> Result<Workflow> {
        let mut seen: HashSet<NodeKey> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if seen.contains(&node.key) {
                return Err(WorkflowError::duplicate_node(node.key.clone()));
            }
            for dep in &node.dependencies {
                if !seen.contains(dep) {
                    return Err(WorkflowError::unknown_dependency(
                        node.key.clone(),
                        dep.clone(),
                    ));
                }
            }
            seen.insert(node.key.clone());
        }

        Ok(Workflow::new(self.nodes, self.groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WorkflowContext;

    fn noop() -> ComputeFn {
        std::sync::Arc::new(|_ctx: WorkflowContext| Box::pin(async move { Ok(Value::Null) }))
    }

    #[test]
    fn rejects_a_duplicate_node_key() {
        let err = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a"), noop(), None)
            .add_node(NodeSpec::new("a"), noop(), None)
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateNode { key } if key == "a"));
    }

    #[test]
    fn rejects_a_dependency_that_was_never_added() {
        let err = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a").depends_on(["ghost"]), noop(), None)
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownDependency { node, dependency }
            if node == "a" && dependency == "ghost"));
    }

    #[test]
    fn rejects_a_node_depending_on_itself() {
        let err = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a").depends_on(["a"]), noop(), None)
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownDependency { .. }));
    }

    #[test]
    fn accepts_dependencies_declared_in_an_earlier_add_node_call() {
        let workflow = WorkflowBuilder::new()
            .add_node(NodeSpec::new("a"), noop(), None)
            .add_node(NodeSpec::new("b").depends_on(["a"]), noop(), None)
            .build();
        assert!(workflow.is_ok());
    }
}

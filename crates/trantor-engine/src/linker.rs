//! Cross-stack reads.
//!
//! A stack may read the exported outputs of another stack. Every reference
//! is fetched before the reading stack submits anything, so a missing stack
//! or output fails the run with nothing changed.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use trantor_core::{StackGraph, StackName, StackOutputRef};
use trantor_state::{StateError, StateStore};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("stack '{0}' has no recorded state")]
    UnresolvedStack(String),

    #[error("stack '{stack}' does not export '{output}'")]
    UnresolvedOutput { stack: String, output: String },

    #[error("state store: {0}")]
    State(#[from] StateError),
}

/// Resolved values of a graph's cross-stack references.
pub type StackOutputs = BTreeMap<StackOutputRef, Value>;

#[derive(Clone)]
pub struct StackLinker {
    store: StateStore,
}

impl StackLinker {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn read_output(&self, stack: &StackName, output: &str) -> Result<Value, LinkError> {
        let key = stack.to_string();
        let state = self
            .store
            .get_stack(&key)?
            .ok_or_else(|| LinkError::UnresolvedStack(key.clone()))?;
        let value = state
            .outputs
            .get(output)
            .cloned()
            .ok_or_else(|| LinkError::UnresolvedOutput {
                stack: key.clone(),
                output: output.to_string(),
            })?;
        debug!(stack = %key, %output, "read stack output");
        Ok(value)
    }

    /// Fetch every cross-stack reference the graph makes.
    pub fn resolve_all(&self, graph: &StackGraph) -> Result<StackOutputs, LinkError> {
        let mut outputs = StackOutputs::new();
        for reference in graph.stack_refs() {
            if outputs.contains_key(reference) {
                continue;
            }
            let value = self.read_output(&reference.stack, &reference.output)?;
            outputs.insert(reference.clone(), value);
        }
        Ok(outputs)
    }
}

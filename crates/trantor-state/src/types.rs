//! Persisted records of applied stacks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trantor_core::{Attributes, ResourceKind};

// ── Stack ──────────────────────────────────────────────────────────

/// What a stack looked like after its last successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackState {
    /// Full stack name (`org/project/stack`).
    pub name: String,
    /// Resolved exports, readable by other stacks.
    pub outputs: BTreeMap<String, Value>,
    /// Unix timestamp (seconds) of the last completed run.
    pub updated_at: u64,
}

impl StackState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outputs: BTreeMap::new(),
            updated_at: 0,
        }
    }

    pub fn table_key(&self) -> String {
        self.name.clone()
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}

// ── Resource ───────────────────────────────────────────────────────

/// One realized resource, written as soon as the provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRecord {
    pub stack: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Inputs the resource was last applied with.
    pub inputs: Value,
    /// Hex SHA-256 of the canonical inputs.
    pub spec_hash: String,
    /// Attributes reported by the provider.
    pub outputs: Attributes,
    /// Resources this one depended on when applied; deletion runs in reverse.
    pub dependencies: Vec<String>,
    pub provider: Option<String>,
    pub updated_at: u64,
}

impl ResourceRecord {
    /// Build the composite key for the resources table.
    pub fn table_key(&self) -> String {
        resource_key(&self.stack, &self.name)
    }
}

pub fn resource_key(stack: &str, resource: &str) -> String {
    format!("{stack}:{resource}")
}

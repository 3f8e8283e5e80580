//! Plan, apply and destroy.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, info, warn};
use trantor_core::resolve::{resolve, resolve_map};
use trantor_core::{Attributes, OutputLookup, Resource, StackGraph, StackName, StackOutputRef};
use trantor_state::{ResourceRecord, StackState, StateStore};

use crate::error::{EngineError, EngineResult};
use crate::hash::spec_hash;
use crate::linker::{StackLinker, StackOutputs};
use crate::plan::{Plan, PlanAction, PlanStep};
use crate::provider::{Provider, ResourceRequest};

/// Outcome of a successful `up`.
#[derive(Debug, Clone)]
pub struct UpResult {
    /// Action taken per resource, in the order it happened.
    pub actions: Vec<(String, PlanAction)>,
    pub outputs: BTreeMap<String, Value>,
}

impl UpResult {
    pub fn count(&self, action: PlanAction) -> usize {
        self.actions.iter().filter(|(_, a)| *a == action).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DestroyResult {
    /// Deleted resources, dependents first.
    pub deleted: Vec<String>,
}

/// Realized attributes plus prefetched cross-stack outputs.
struct Realized<'a> {
    resources: BTreeMap<String, Attributes>,
    stacks: &'a StackOutputs,
}

impl OutputLookup for Realized<'_> {
    fn resource_outputs(&self, resource: &str) -> Option<&Attributes> {
        self.resources.get(resource)
    }

    fn stack_output(&self, reference: &StackOutputRef) -> Option<&Value> {
        self.stacks.get(reference)
    }
}

pub struct Engine<P> {
    store: StateStore,
    linker: StackLinker,
    provider: P,
}

impl<P: Provider> Engine<P> {
    pub fn new(store: StateStore, provider: P) -> Self {
        Self {
            linker: StackLinker::new(store.clone()),
            store,
            provider,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Compare the declared graph with the recorded state. Nothing is applied.
    pub fn preview(&self, graph: &StackGraph) -> EngineResult<Plan> {
        let order = graph.topological_order()?;
        let stacks = self.linker.resolve_all(graph)?;
        let stack = graph.stack().to_string();
        let recorded = self.recorded(&stack)?;
        let mut realized = Realized {
            resources: BTreeMap::new(),
            stacks: &stacks,
        };

        let mut steps = Vec::with_capacity(order.len());
        for resource in order {
            let inputs = resolve_inputs(resource, &realized)?;
            let action = match recorded.get(&resource.name) {
                None => PlanAction::Create,
                Some(record) if record.kind != resource.kind => PlanAction::Replace,
                Some(record)
                    if !inputs.unknown
                        && record.kind == resource.kind
                        && record.spec_hash == spec_hash(resource.kind, &inputs.value) =>
                {
                    realized
                        .resources
                        .insert(resource.name.clone(), record.outputs.clone());
                    PlanAction::Same
                }
                Some(_) => PlanAction::Update,
            };
            steps.push(PlanStep {
                name: resource.name.clone(),
                kind: resource.kind,
                action,
                inputs: inputs.value,
                unknown: inputs.unknown,
            });
        }

        let stale: Vec<&ResourceRecord> = recorded
            .values()
            .filter(|r| graph.get(&r.name).is_none())
            .collect();
        for record in deletion_order(stale) {
            steps.push(PlanStep {
                name: record.name.clone(),
                kind: record.kind,
                action: PlanAction::Delete,
                inputs: record.inputs.clone(),
                unknown: false,
            });
        }

        let mut outputs = BTreeMap::new();
        for (name, value) in graph.exports() {
            let resolved = resolve(value, &realized).map_err(|source| EngineError::Resolve {
                name: format!("export '{name}'"),
                source,
            })?;
            outputs.insert(name.clone(), resolved.value);
        }

        let plan = Plan {
            stack,
            steps,
            outputs,
        };
        info!(stack = %plan.stack, summary = %plan.summary(), "preview computed");
        Ok(plan)
    }

    /// Apply the graph: create, update and delete until recorded state matches.
    pub fn up(&self, graph: &StackGraph) -> EngineResult<UpResult> {
        let order = graph.topological_order()?;
        // Cross-stack reads fail the run before anything is submitted.
        let stacks = self.linker.resolve_all(graph)?;
        let stack = graph.stack().to_string();
        let recorded = self.recorded(&stack)?;
        let mut realized = Realized {
            resources: BTreeMap::new(),
            stacks: &stacks,
        };
        info!(%stack, resources = order.len(), recorded = recorded.len(), "applying stack");

        let mut actions = Vec::new();
        for resource in order {
            let inputs = resolve_inputs(resource, &realized)?;
            if inputs.unknown {
                return Err(EngineError::Unknown(resource.name.clone()));
            }
            let hash = spec_hash(resource.kind, &inputs.value);
            let prior = recorded.get(&resource.name);

            if let Some(record) = prior.filter(|r| r.kind == resource.kind && r.spec_hash == hash) {
                debug!(resource = %resource.name, "unchanged");
                realized
                    .resources
                    .insert(resource.name.clone(), record.outputs.clone());
                actions.push((resource.name.clone(), PlanAction::Same));
                continue;
            }

            let request = ResourceRequest {
                stack: &stack,
                name: &resource.name,
                kind: resource.kind,
                inputs: &inputs.value,
                connection: resource
                    .provider
                    .as_deref()
                    .and_then(|p| realized.resources.get(p)),
            };
            let (action, result) = match prior {
                None => (PlanAction::Create, self.provider.create(&request)),
                Some(record) if record.kind != resource.kind => {
                    info!(
                        resource = %resource.name,
                        from = %record.kind.type_token(),
                        to = %resource.kind.type_token(),
                        "kind changed, replacing"
                    );
                    self.delete_records(&stack, vec![record])?;
                    (PlanAction::Replace, self.provider.create(&request))
                }
                Some(record) => (
                    PlanAction::Update,
                    self.provider.update(&request, &record.outputs),
                ),
            };
            let outputs = result.map_err(|source| {
                warn!(resource = %resource.name, %action, error = %source, "provider failed, halting run");
                EngineError::Provider {
                    resource: resource.name.clone(),
                    source,
                }
            })?;

            self.store.put_resource(&ResourceRecord {
                stack: stack.clone(),
                name: resource.name.clone(),
                kind: resource.kind,
                inputs: inputs.value,
                spec_hash: hash,
                outputs: outputs.clone(),
                dependencies: resource.dependencies().into_iter().map(str::to_string).collect(),
                provider: resource.provider.clone(),
                updated_at: epoch_secs(),
            })?;
            debug!(resource = %resource.name, %action, "applied");
            realized.resources.insert(resource.name.clone(), outputs);
            actions.push((resource.name.clone(), action));
        }

        let stale: Vec<&ResourceRecord> = recorded
            .values()
            .filter(|r| graph.get(&r.name).is_none())
            .collect();
        for name in self.delete_records(&stack, stale)? {
            actions.push((name, PlanAction::Delete));
        }

        let mut state = StackState::new(&stack);
        for (name, value) in graph.exports() {
            let resolved = resolve(value, &realized).map_err(|source| EngineError::Resolve {
                name: format!("export '{name}'"),
                source,
            })?;
            if resolved.unknown {
                return Err(EngineError::Unknown(format!("export '{name}'")));
            }
            state.outputs.insert(name.clone(), resolved.value);
        }
        state.updated_at = epoch_secs();
        self.store.put_stack(&state)?;

        let result = UpResult {
            actions,
            outputs: state.outputs,
        };
        info!(
            %stack,
            created = result.count(PlanAction::Create),
            updated = result.count(PlanAction::Update),
            deleted = result.count(PlanAction::Delete),
            unchanged = result.count(PlanAction::Same),
            "stack applied"
        );
        Ok(result)
    }

    /// Delete every recorded resource of `stack`, then its state.
    pub fn destroy(&self, stack: &StackName) -> EngineResult<DestroyResult> {
        let stack = stack.to_string();
        let records = self.store.list_resources(&stack)?;
        info!(%stack, resources = records.len(), "destroying stack");
        let deleted = self.delete_records(&stack, records.iter().collect())?;
        self.store.delete_stack(&stack)?;
        info!(%stack, deleted = deleted.len(), "stack destroyed");
        Ok(DestroyResult { deleted })
    }

    fn recorded(&self, stack: &str) -> EngineResult<BTreeMap<String, ResourceRecord>> {
        Ok(self
            .store
            .list_resources(stack)?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect())
    }

    fn delete_records(&self, stack: &str, records: Vec<&ResourceRecord>) -> EngineResult<Vec<String>> {
        let mut deleted = Vec::new();
        for record in deletion_order(records) {
            self.provider.delete(record).map_err(|source| {
                warn!(resource = %record.name, error = %source, "provider failed to delete, halting run");
                EngineError::Provider {
                    resource: record.name.clone(),
                    source,
                }
            })?;
            self.store.delete_resource(stack, &record.name)?;
            debug!(resource = %record.name, "deleted");
            deleted.push(record.name.clone());
        }
        Ok(deleted)
    }
}

fn resolve_inputs(
    resource: &Resource,
    lookup: &dyn OutputLookup,
) -> EngineResult<trantor_core::Resolved> {
    resolve_map(&resource.properties, lookup).map_err(|source| EngineError::Resolve {
        name: resource.name.clone(),
        source,
    })
}

/// Order records so that every resource is deleted before the ones it
/// depends on. Ties go by name.
fn deletion_order(records: Vec<&ResourceRecord>) -> Vec<&ResourceRecord> {
    let mut remaining: BTreeMap<&str, &ResourceRecord> =
        records.into_iter().map(|r| (r.name.as_str(), r)).collect();
    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let needed: BTreeSet<&str> = remaining
            .values()
            .copied()
            .flat_map(|r| r.dependencies.iter().map(String::as_str))
            .collect();
        let mut ready: Vec<&str> = remaining
            .keys()
            .copied()
            .filter(|name| !needed.contains(name))
            .collect();
        if ready.is_empty() {
            // Recorded dependencies form a cycle; fall back to name order.
            ready = remaining.keys().copied().collect();
        }
        for name in ready {
            if let Some(record) = remaining.remove(name) {
                order.push(record);
            }
        }
    }
    order
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trantor_core::ResourceKind;

    use crate::local::{LocalProvider, Operation};

    fn record(name: &str, deps: &[&str]) -> ResourceRecord {
        ResourceRecord {
            stack: "a/b".to_string(),
            name: name.to_string(),
            kind: ResourceKind::Subnet,
            inputs: json!({}),
            spec_hash: String::new(),
            outputs: Attributes::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            provider: None,
            updated_at: 0,
        }
    }

    #[test]
    fn dependents_are_deleted_first() {
        let vpc = record("vpc", &[]);
        let subnet = record("subnet", &["vpc"]);
        let assoc = record("assoc", &["subnet", "rt"]);
        let rt = record("rt", &["vpc"]);
        let order: Vec<&str> = deletion_order(vec![&vpc, &subnet, &assoc, &rt])
            .into_iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(order, vec!["assoc", "rt", "subnet", "vpc"]);
    }

    #[test]
    fn changed_kind_replaces_the_recorded_resource() {
        let store = StateStore::open_in_memory().unwrap();
        let engine = Engine::new(store, LocalProvider::new());
        let stack = StackName::new("foundation", "day-app").unwrap();

        let mut graph = StackGraph::new(stack.clone());
        graph
            .add(Resource::new(ResourceKind::ConfigMap, "day-config").with("data", "a=1"))
            .unwrap();
        engine.up(&graph).unwrap();

        let mut graph = StackGraph::new(stack.clone());
        graph
            .add(Resource::new(ResourceKind::Namespace, "day-config").with("name", "day-config"))
            .unwrap();
        let plan = engine.preview(&graph).unwrap();
        assert_eq!(plan.step("day-config").unwrap().action, PlanAction::Replace);

        let result = engine.up(&graph).unwrap();
        assert_eq!(result.actions, vec![("day-config".to_string(), PlanAction::Replace)]);
        let record = engine
            .store()
            .get_resource("foundation/day-app", "day-config")
            .unwrap()
            .unwrap();
        assert_eq!(record.kind, ResourceKind::Namespace);

        let calls = engine.provider().calls();
        let ops: Vec<Operation> = calls.iter().map(|c| c.operation).collect();
        assert_eq!(ops, vec![Operation::Create, Operation::Delete, Operation::Create]);
        assert!(engine.up(&graph).unwrap().actions.iter().all(|(_, a)| *a == PlanAction::Same));
    }

    #[test]
    fn dependencies_outside_the_set_are_ignored() {
        let ingress = record("ingress", &["namespace"]);
        let order = deletion_order(vec![&ingress]);
        assert_eq!(order.len(), 1);
    }
}

//! End-to-end engine tests: plan + apply against an in-memory provider and
//! state store

use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use stackform::{
    Action, Applier, ApplySummary, EngineError, Plan, PlanBuilder, ProviderError,
    ProviderRegistry, ResolvedOutput, ResourceNode, ResourceProvider, StateStore,
};

/// Provider that records every call and can be told to fail specific ids.
/// Outputs are a pure function of identity and attributes: the `rev`
/// attribute, when present, is baked into the produced `uri`.
#[derive(Clone, Default)]
struct TestProvider {
    calls: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<HashSet<String>>>,
}

impl TestProvider {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn fail_on(&self, id: &str) {
        self.fail.lock().unwrap().insert(id.to_string());
    }

    fn heal(&self, id: &str) {
        self.fail.lock().unwrap().remove(id);
    }
}

impl ResourceProvider for TestProvider {
    fn apply(
        &self,
        _kind: &str,
        id: &str,
        attributes: &BTreeMap<String, serde_json::Value>,
    ) -> Result<ResolvedOutput, ProviderError> {
        self.calls.lock().unwrap().push(format!("apply:{id}"));
        if self.fail.lock().unwrap().contains(id) {
            return Err(ProviderError::new("simulated backend failure"));
        }

        let mut output = ResolvedOutput::new();
        output.insert("arn".to_string(), json!(format!("arn:test:{id}")));
        if let Some(rev) = attributes.get("rev").and_then(|v| v.as_str()) {
            output.insert("uri".to_string(), json!(format!("{id}:{rev}")));
        }
        Ok(output)
    }

    fn delete(&self, _kind: &str, id: &str) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(format!("delete:{id}"));
        Ok(())
    }
}

fn registry_with(provider: &TestProvider) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for kind in ["image-build", "managed-runtime", "policy-attachment"] {
        registry.register(kind, Box::new(provider.clone()));
    }
    registry
}

fn image(rev: &str) -> ResourceNode {
    ResourceNode::new("image", "image-build")
        .attr("directory", "./agent")
        .attr("rev", rev)
}

fn runtime() -> ResourceNode {
    ResourceNode::new("runtime", "managed-runtime")
        .attr("runtime_name", "agent")
        .reference("image_uri", "image", "uri")
}

fn plan_for(nodes: &[ResourceNode], store: &dyn StateStore) -> Plan {
    let state = store.load().unwrap();
    PlanBuilder::new(nodes, &state).build().unwrap()
}

fn apply(
    nodes: &[ResourceNode],
    store: &dyn StateStore,
    registry: &ProviderRegistry,
) -> Result<ApplySummary, EngineError> {
    let plan = plan_for(nodes, store);
    Applier::new(registry, store).apply(&plan, nodes)
}

fn action_ids(plan: &Plan, action: fn(&Action) -> bool) -> Vec<&str> {
    plan.actions
        .iter()
        .filter(|a| action(&a.action))
        .map(|a| a.id.as_str())
        .collect()
}

#[test]
fn first_apply_creates_in_dependency_order() {
    let provider = TestProvider::default();
    let registry = registry_with(&provider);
    let store = stackform::MemoryStateStore::new();
    // Declaration order deliberately inverted; the plan must not be
    let nodes = vec![runtime(), image("v1")];

    let plan = plan_for(&nodes, &store);
    assert_eq!(
        action_ids(&plan, |a| matches!(a, Action::Create)),
        vec!["image", "runtime"]
    );

    let summary = apply(&nodes, &store, &registry).unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(provider.calls(), vec!["apply:image", "apply:runtime"]);

    // Downstream saw the upstream output, not the placeholder
    let state = store.load().unwrap();
    assert_eq!(
        state.get("runtime").unwrap().attributes["image_uri"],
        json!("image:v1")
    );
}

#[test]
fn reapply_with_no_changes_is_all_no_change() {
    let provider = TestProvider::default();
    let registry = registry_with(&provider);
    let store = stackform::MemoryStateStore::new();
    let nodes = vec![image("v1"), runtime()];

    apply(&nodes, &store, &registry).unwrap();
    provider.clear_calls();

    let plan = plan_for(&nodes, &store);
    assert!(!plan.has_changes());
    assert_eq!(plan.unchanged(), 2);

    let summary = Applier::new(&registry, &store).apply(&plan, &nodes).unwrap();
    assert_eq!(summary.total_changes(), 0);
    assert_eq!(summary.unchanged, 2);
    assert!(provider.calls().is_empty(), "providers must not be invoked");
}

#[test]
fn failure_is_monotonic_and_resumable() {
    let provider = TestProvider::default();
    let registry = registry_with(&provider);
    let store = stackform::MemoryStateStore::new();
    let nodes = vec![image("v1"), runtime()];

    provider.fail_on("runtime");
    let err = apply(&nodes, &store, &registry).unwrap_err();
    match err {
        EngineError::Provider { node, message } => {
            assert_eq!(node, "runtime");
            assert!(message.contains("simulated backend failure"));
        }
        other => panic!("expected provider error, got {other}"),
    }

    // The successful upstream apply was durably recorded before the failure
    let state = store.load().unwrap();
    assert!(state.get("image").is_some());
    assert!(state.get("runtime").is_none());

    // Next run re-invokes only the failed node
    provider.heal("runtime");
    provider.clear_calls();
    let summary = apply(&nodes, &store, &registry).unwrap();
    assert_eq!(provider.calls(), vec!["apply:runtime"]);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.unchanged, 1);
}

#[test]
fn teardown_deletes_dependents_before_dependencies() {
    let provider = TestProvider::default();
    let registry = registry_with(&provider);
    let store = stackform::MemoryStateStore::new();
    let nodes = vec![image("v1"), runtime()];

    apply(&nodes, &store, &registry).unwrap();
    provider.clear_calls();

    // Empty declaration orphans both records
    let empty: Vec<ResourceNode> = Vec::new();
    let plan = plan_for(&empty, &store);
    assert_eq!(
        action_ids(&plan, |a| matches!(a, Action::Delete)),
        vec!["runtime", "image"]
    );

    let summary = Applier::new(&registry, &store).apply(&plan, &empty).unwrap();
    assert_eq!(summary.deleted, 2);
    assert_eq!(provider.calls(), vec!["delete:runtime", "delete:image"]);
    assert!(store.load().unwrap().records.is_empty());
}

#[test]
fn upstream_change_propagates_in_the_same_run() {
    let provider = TestProvider::default();
    let registry = registry_with(&provider);
    let store = stackform::MemoryStateStore::new();

    // Run 1: create both
    let nodes_v1 = vec![image("v1"), runtime()];
    apply(&nodes_v1, &store, &registry).unwrap();

    // Run 2: no changes anywhere
    assert!(!plan_for(&nodes_v1, &store).has_changes());

    // Run 3: the image revision changes. The image's new output is unknown
    // until it applies, so the runtime plans as changed too and both update
    // in this run.
    let nodes_v2 = vec![image("v2"), runtime()];
    let plan = plan_for(&nodes_v2, &store);
    assert_eq!(
        action_ids(&plan, |a| matches!(a, Action::Update { .. })),
        vec!["image", "runtime"]
    );
    provider.clear_calls();
    Applier::new(&registry, &store).apply(&plan, &nodes_v2).unwrap();
    assert_eq!(provider.calls(), vec!["apply:image", "apply:runtime"]);

    // The runtime was applied with the live (new) image output
    let state = store.load().unwrap();
    assert_eq!(
        state.get("runtime").unwrap().attributes["image_uri"],
        json!("image:v2")
    );

    // Run 4: the identical declaration replans as all-NoChange
    let plan = plan_for(&nodes_v2, &store);
    assert!(!plan.has_changes(), "replan after success must be a no-op");
    assert_eq!(plan.unchanged(), 2);
}

#[test]
fn unregistered_kind_fails_before_any_provider_call() {
    let registry = ProviderRegistry::new();
    let store = stackform::MemoryStateStore::new();
    let nodes = vec![image("v1")];

    let err = apply(&nodes, &store, &registry).unwrap_err();
    match err {
        EngineError::UnknownKind { node, kind } => {
            assert_eq!(node, "image");
            assert_eq!(kind, "image-build");
        }
        other => panic!("expected unknown kind error, got {other}"),
    }
    assert!(store.load().unwrap().records.is_empty());
}

//! Plan computation
//!
//! The [`PlanBuilder`] walks the declared set in dependency order and diffs
//! each node's effective attributes against the last-applied state record.
//! References substitute the recorded upstream output, except when the
//! upstream is itself planned Create/Update this run: its output is not
//! known until it applies, so the reference resolves to the
//! [`UNKNOWN_OUTPUT`](crate::node::UNKNOWN_OUTPUT) placeholder and the
//! dependent plans as changed. The applier re-substitutes with live outputs
//! before any provider call, so the whole chain converges in one run.

use crate::error::GraphError;
use crate::graph::DependencyGraph;
use crate::node::{resolve_attributes, ResourceNode};
use crate::plan::{Action, Change, Plan, PlannedAction};
use crate::state::State;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Computes a [`Plan`] from a declared node set and a state snapshot
pub struct PlanBuilder<'a> {
    nodes: &'a [ResourceNode],
    state: &'a State,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(nodes: &'a [ResourceNode], state: &'a State) -> Self {
        Self { nodes, state }
    }

    /// Build the plan: Create/Update/NoChange in dependency order, then
    /// Delete for orphaned records in reverse dependency order.
    pub fn build(&self) -> Result<Plan, GraphError> {
        let graph = DependencyGraph::build(self.nodes)?;
        let order = graph.topological_order()?;
        let by_id: HashMap<&str, &ResourceNode> =
            self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut actions = Vec::with_capacity(order.len());
        let mut changed_upstreams: HashSet<&str> = HashSet::new();
        for id in &order {
            let node = by_id[id.as_str()];
            let effective = self.effective_attributes(node, &changed_upstreams);

            let action = match self.state.get(id) {
                None => Action::Create,
                Some(record) => {
                    let mut changes = Vec::new();
                    if record.kind != node.kind {
                        changes.push(Change {
                            attribute: "kind".to_string(),
                            old_value: record.kind.clone(),
                            new_value: node.kind.clone(),
                        });
                    }
                    changes.extend(diff_attributes(&record.attributes, &effective));

                    if changes.is_empty() {
                        Action::NoChange
                    } else {
                        Action::Update { changes }
                    }
                }
            };

            if !matches!(action, Action::NoChange) {
                changed_upstreams.insert(id.as_str());
            }
            actions.push(PlannedAction {
                id: id.clone(),
                kind: node.kind.clone(),
                action,
            });
        }

        for id in self.orphan_order(&by_id)? {
            let kind = self
                .state
                .get(&id)
                .map(|r| r.kind.clone())
                .unwrap_or_default();
            actions.push(PlannedAction {
                id,
                kind,
                action: Action::Delete,
            });
        }

        Ok(Plan { actions })
    }

    /// Substitute references from last-recorded upstream outputs. Upstreams
    /// already planned Create/Update this run have no trustworthy recorded
    /// output, so their references stay unresolved (the placeholder), which
    /// marks the dependent as changed.
    fn effective_attributes(
        &self,
        node: &ResourceNode,
        changed_upstreams: &HashSet<&str>,
    ) -> BTreeMap<String, Value> {
        resolve_attributes(&node.attributes, |id, output| {
            if changed_upstreams.contains(id) {
                return None;
            }
            self.state.get(id).and_then(|r| r.output.get(output)).cloned()
        })
    }

    /// Records with no declared counterpart, ordered dependents-first from
    /// the dependencies recorded at apply time
    fn orphan_order(
        &self,
        declared: &HashMap<&str, &ResourceNode>,
    ) -> Result<Vec<String>, GraphError> {
        let orphans: BTreeSet<&str> = self
            .state
            .records
            .keys()
            .map(String::as_str)
            .filter(|id| !declared.contains_key(id))
            .collect();
        if orphans.is_empty() {
            return Ok(Vec::new());
        }

        let mut graph = DiGraph::<String, ()>::new();
        let mut indices = HashMap::new();
        for &id in &orphans {
            indices.insert(id, graph.add_node(id.to_string()));
        }
        for &id in &orphans {
            if let Some(record) = self.state.get(id) {
                for dep in &record.dependencies {
                    if let Some(&dep_idx) = indices.get(dep.as_str()) {
                        graph.add_edge(dep_idx, indices[id], ());
                    }
                }
            }
        }

        // Recorded dependencies come from acyclic declarations; a cycle here
        // means the state file was edited by hand.
        let order = toposort(&graph, None).map_err(|cycle| GraphError::Cycle {
            nodes: vec![graph[cycle.node_id()].clone()],
        })?;

        Ok(order.into_iter().rev().map(|idx| graph[idx].clone()).collect())
    }
}

/// Per-attribute structural diff over the union of both key sets
fn diff_attributes(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> Vec<Change> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let mut changes = Vec::new();

    for key in keys {
        match (old.get(key), new.get(key)) {
            (Some(o), Some(n)) if o == n => {}
            (old_value, new_value) => changes.push(Change {
                attribute: key.clone(),
                old_value: render(old_value),
                new_value: render(new_value),
            }),
        }
    }

    changes
}

fn render(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(none)".to_string(),
    }
}

//! Dependency graph construction and ordering
//!
//! Builds a directed graph from a declared node set by following references,
//! then produces a topological order for the planner and applier. Pure
//! computation: no side effects, no provider or state access.

use crate::error::GraphError;
use crate::node::ResourceNode;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Directed acyclic graph over declared resource identities
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from a declared node set.
    ///
    /// Fails with [`GraphError::UnresolvedReference`] when a reference or
    /// `depends_on` entry points outside the set. Cycles are not detected
    /// here; they surface in [`topological_order`](Self::topological_order).
    pub fn build(nodes: &[ResourceNode]) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::with_capacity(nodes.len());

        for node in nodes {
            let idx = graph.add_node(node.id.clone());
            indices.insert(node.id.clone(), idx);
        }

        // Edge direction: dependency -> dependent, so toposort yields
        // dependencies first.
        for node in nodes {
            let dependent = indices[&node.id];
            for dep in node.dependencies() {
                let Some(&dependency) = indices.get(dep) else {
                    return Err(GraphError::UnresolvedReference {
                        node: node.id.clone(),
                        missing: dep.to_string(),
                    });
                };
                graph.add_edge(dependency, dependent, ());
            }
        }

        Ok(Self { graph, indices })
    }

    /// Number of declared identities
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Identities in dependency order: every node appears after all nodes it
    /// references. Fails with [`GraphError::Cycle`] naming the participating
    /// identities when no valid order exists.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => Err(GraphError::Cycle {
                nodes: self.cycle_members(cycle.node_id()),
            }),
        }
    }

    /// Name the strongly connected component containing `start` (the cycle
    /// toposort tripped over), sorted for stable error messages.
    fn cycle_members(&self, start: NodeIndex) -> Vec<String> {
        for component in tarjan_scc(&self.graph) {
            if component.contains(&start)
                && (component.len() > 1 || self.graph.contains_edge(start, start))
            {
                let mut nodes: Vec<String> =
                    component.iter().map(|&idx| self.graph[idx].clone()).collect();
                nodes.sort();
                return nodes;
            }
        }
        vec![self.graph[start].clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn node(id: &str, deps: &[&str]) -> ResourceNode {
        let mut n = ResourceNode::new(id, "test");
        for dep in deps {
            n = n.depends_on(*dep);
        }
        n
    }

    #[test]
    fn orders_dependencies_before_dependents() {
        let nodes = vec![
            node("policy", &["runtime"]),
            node("runtime", &["image"]),
            node("image", &[]),
        ];

        let order = DependencyGraph::build(&nodes)
            .unwrap()
            .topological_order()
            .unwrap();

        assert_eq!(order, vec!["image", "runtime", "policy"]);
    }

    #[test]
    fn cycle_names_every_participant() {
        let nodes = vec![node("a", &["b"]), node("b", &["c"]), node("c", &["a"])];

        let err = DependencyGraph::build(&nodes)
            .unwrap()
            .topological_order()
            .unwrap_err();

        match err {
            GraphError::Cycle { nodes } => assert_eq!(nodes, vec!["a", "b", "c"]),
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let nodes = vec![node("a", &["a"])];

        let err = DependencyGraph::build(&nodes)
            .unwrap()
            .topological_order()
            .unwrap_err();

        match err {
            GraphError::Cycle { nodes } => assert_eq!(nodes, vec!["a"]),
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn unresolved_reference_names_both_ends() {
        let nodes = vec![node("runtime", &["image"])];

        let err = DependencyGraph::build(&nodes).unwrap_err();
        match err {
            GraphError::UnresolvedReference { node, missing } => {
                assert_eq!(node, "runtime");
                assert_eq!(missing, "image");
            }
            other => panic!("expected unresolved reference, got {other}"),
        }
    }

    proptest! {
        /// Any acyclic node set orders every node exactly once, each after
        /// all of its dependencies.
        #[test]
        fn topological_order_is_valid_for_random_dags(
            n in 1usize..10,
            edges in proptest::collection::vec((0usize..10, 0usize..10), 0..30),
        ) {
            let mut nodes: Vec<ResourceNode> = (0..n)
                .map(|i| ResourceNode::new(format!("n{i}"), "test"))
                .collect();
            // Only forward edges (dep index < dependent index) keeps the set acyclic
            let mut deps: Vec<Vec<usize>> = vec![Vec::new(); n];
            for (a, b) in edges {
                if a < b && b < n {
                    deps[b].push(a);
                }
            }
            for (i, ds) in deps.iter().enumerate() {
                for &d in ds {
                    nodes[i] = nodes[i].clone().depends_on(format!("n{d}"));
                }
            }

            let order = DependencyGraph::build(&nodes)
                .unwrap()
                .topological_order()
                .unwrap();

            prop_assert_eq!(order.len(), n);
            let position: std::collections::HashMap<&str, usize> = order
                .iter()
                .enumerate()
                .map(|(pos, id)| (id.as_str(), pos))
                .collect();
            for (i, ds) in deps.iter().enumerate() {
                for &d in ds {
                    let dep = format!("n{d}");
                    let dependent = format!("n{i}");
                    prop_assert!(position[dep.as_str()] < position[dependent.as_str()]);
                }
            }
        }
    }
}

//! Graph data model: nodes, edges, validation, and execution ordering
//!
//! A submitted graph is a pair of node and edge lists plus an optional
//! environment-variable map applied for the duration of execution. The wire
//! shape matches what graph editors produce:
//!
//! ```json
//! {
//!   "nodes": [ { "id": "n1", "type": "function",
//!                "data": { "functionName": "add", "a": "5" } } ],
//!   "edges": [ { "source": "v1", "sourceHandle": "output",
//!                "target": "n1", "targetHandle": "b" } ],
//!   "env_vars": { "API_KEY": "..." }
//! }
//! ```
//!
//! Handles are named ports: function nodes use parameter names for inputs
//! and declared return names for outputs, list nodes use `input-N`, view
//! nodes use `input`. A missing or null `sourceHandle`/`targetHandle`
//! defaults to `output`/`input`.
//!
//! # Validation and ordering
//!
//! [`Graph::validate`] enforces the structural invariants before any node
//! runs: unique node ids, known kind tags, edges referencing existing
//! nodes, and at most one inbound edge per `(target, handle)` pair (list
//! targets are exempt since each `input-N` handle is distinct).
//!
//! [`Graph::execution_order`] is Kahn's algorithm: in-degrees are computed
//! from the edge set, zero-in-degree nodes seed the work list, and nodes are
//! emitted in pop order while successors are decremented. Ready nodes
//! tie-break by submission order, so a given graph always replays in the
//! same order. An emitted count short of the node count means a cycle, which
//! fails the whole execution.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{GraphError, Result};

/// Node kind tag
///
/// `progressFunction` and `streamFunction` are the internal sub-kinds graph
/// editors attach to operations whose schema carries the matching kind flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Variable,
    List,
    View,
    Function,
    ProgressFunction,
    StreamFunction,
    /// Anything else; rejected by validation with a structural error
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    pub fn is_function(&self) -> bool {
        matches!(
            self,
            NodeKind::Function | NodeKind::ProgressFunction | NodeKind::StreamFunction
        )
    }

    /// Kind tag as reported in `node_name` for non-function nodes
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Variable => "variable",
            NodeKind::List => "list",
            NodeKind::View => "view",
            NodeKind::Function => "function",
            NodeKind::ProgressFunction => "progressFunction",
            NodeKind::StreamFunction => "streamFunction",
            NodeKind::Unknown => "unknown",
        }
    }
}

/// One node of a submitted graph
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    /// Stable id, unique within the graph
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Kind-specific data blob; parsed by the matching runner
    #[serde(default)]
    pub data: Value,
}

/// Directed connection between an output handle and an input handle
#[derive(Debug, Clone, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "sourceHandle", default)]
    source_handle: Option<String>,
    #[serde(rename = "targetHandle", default)]
    target_handle: Option<String>,
}

impl Edge {
    /// Source output port; `output` when the editor sent none
    pub fn source_handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or("output")
    }

    /// Target input port; `input` when the editor sent none
    pub fn target_handle(&self) -> &str {
        self.target_handle.as_deref().unwrap_or("input")
    }
}

/// A submitted graph: nodes, edges, and an optional env-var window
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Applied process-wide for the duration of the execution
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

impl Graph {
    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Inbound edge feeding `(target, handle)`, if any
    pub fn inbound(&self, target: &str, handle: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target == target && e.target_handle() == handle)
    }

    /// All inbound edges of a node, in submission order
    pub fn inbound_all<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == target)
    }

    /// Enforce the structural invariants (spec'd above)
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if node.kind == NodeKind::Unknown {
                return Err(GraphError::Validation(format!(
                    "node '{}' has an unrecognized type",
                    node.id
                )));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::Validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut taken_inputs = HashSet::new();
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(GraphError::Validation(format!(
                        "edge references unknown node '{endpoint}'"
                    )));
                }
            }
            // List targets are exempt: every input-N handle is distinct anyway.
            if !taken_inputs.insert((edge.target.as_str(), edge.target_handle())) {
                return Err(GraphError::Validation(format!(
                    "input handle '{}' of node '{}' has more than one inbound edge",
                    edge.target_handle(),
                    edge.target
                )));
            }
        }
        Ok(())
    }

    /// Kahn ordering over the edge set; `Err(Cycle)` when not a DAG
    pub fn execution_order(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            *in_degree.entry(edge.target.as_str()).or_default() += 1;
            successors
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }

        let mut ready: VecDeque<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| in_degree[id] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id.to_string());
            for succ in successors.get(id).into_iter().flatten() {
                let degree = in_degree.get_mut(succ).expect("validated node id");
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*succ);
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(GraphError::Cycle);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(value: Value) -> Graph {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn handles_default_when_absent_or_null() {
        let g = graph(json!({
            "nodes": [ { "id": "a", "type": "view" }, { "id": "b", "type": "view" } ],
            "edges": [ { "source": "a", "target": "b", "sourceHandle": null } ]
        }));
        assert_eq!(g.edges[0].source_handle(), "output");
        assert_eq!(g.edges[0].target_handle(), "input");
    }

    #[test]
    fn unknown_node_type_fails_validation() {
        let g = graph(json!({
            "nodes": [ { "id": "a", "type": "teleporter", "data": {} } ],
            "edges": []
        }));
        assert!(matches!(g.validate(), Err(GraphError::Validation(_))));
    }

    #[test]
    fn edge_to_missing_node_fails_validation() {
        let g = graph(json!({
            "nodes": [ { "id": "a", "type": "variable", "data": { "value": 1 } } ],
            "edges": [ { "source": "a", "target": "ghost", "targetHandle": "input" } ]
        }));
        let err = g.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn double_feed_of_one_handle_fails_validation() {
        let g = graph(json!({
            "nodes": [
                { "id": "a", "type": "variable", "data": { "value": 1 } },
                { "id": "b", "type": "variable", "data": { "value": 2 } },
                { "id": "v", "type": "view" }
            ],
            "edges": [
                { "source": "a", "target": "v", "targetHandle": "input" },
                { "source": "b", "target": "v", "targetHandle": "input" }
            ]
        }));
        assert!(g.validate().is_err());
    }

    #[test]
    fn list_targets_take_many_edges() {
        let g = graph(json!({
            "nodes": [
                { "id": "a", "type": "variable", "data": { "value": 1 } },
                { "id": "b", "type": "variable", "data": { "value": 2 } },
                { "id": "l", "type": "list", "data": { "inputCount": 2 } }
            ],
            "edges": [
                { "source": "a", "target": "l", "targetHandle": "input-0" },
                { "source": "b", "target": "l", "targetHandle": "input-1" }
            ]
        }));
        assert!(g.validate().is_ok());
    }

    #[test]
    fn order_is_topological_and_submission_stable() {
        let g = graph(json!({
            "nodes": [
                { "id": "v1", "type": "variable", "data": { "value": 1 } },
                { "id": "v2", "type": "variable", "data": { "value": 2 } },
                { "id": "sum", "type": "function", "data": { "functionName": "add" } },
                { "id": "out", "type": "view" }
            ],
            "edges": [
                { "source": "v1", "target": "sum", "targetHandle": "a" },
                { "source": "v2", "target": "sum", "targetHandle": "b" },
                { "source": "sum", "target": "out", "targetHandle": "input" }
            ]
        }));
        assert_eq!(g.execution_order().unwrap(), vec!["v1", "v2", "sum", "out"]);
    }

    #[test]
    fn cycles_are_rejected() {
        let g = graph(json!({
            "nodes": [
                { "id": "a", "type": "function", "data": { "functionName": "f" } },
                { "id": "b", "type": "function", "data": { "functionName": "g" } }
            ],
            "edges": [
                { "source": "a", "target": "b", "targetHandle": "x" },
                { "source": "b", "target": "a", "targetHandle": "x" }
            ]
        }));
        assert!(matches!(g.execution_order(), Err(GraphError::Cycle)));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(json!({
            "nodes": [ { "id": "a", "type": "function", "data": { "functionName": "f" } } ],
            "edges": [ { "source": "a", "target": "a", "targetHandle": "x" } ]
        }));
        assert!(matches!(g.execution_order(), Err(GraphError::Cycle)));
    }
}

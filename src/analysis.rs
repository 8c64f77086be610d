//! Reference graph analysis
//!
//! Projects a loaded schema onto a directed graph (one node per schema
//! node, edges for keyword containment and `$ref`) and finds the recursive
//! groups: strongly connected components with more than one member, or a
//! single member referring to itself.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::keyword::KeywordKind;
use crate::schema::Schema;

// =============================================================================
// Edges
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Child schema held by a keyword
    Contains(KeywordKind),
    /// `$ref` to its target
    Ref,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains(kind) => write!(f, "{}", kind.key()),
            Self::Ref => write!(f, "$ref"),
        }
    }
}

// =============================================================================
// Graph
// =============================================================================

/// Schema nodes keyed by unique URI
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl ReferenceGraph {
    /// Walk everything reachable from `root`, following references
    pub fn from_schema(root: &Schema) -> Self {
        let mut graph = Self::default();
        graph.visit(root);
        graph
    }

    fn visit(&mut self, schema: &Schema) -> NodeIndex {
        let uri = schema.unique_uri().to_string();
        if let Some(existing) = self.index.get(&uri) {
            return *existing;
        }
        let node = self.graph.add_node(uri.clone());
        self.index.insert(uri, node);

        if let Some(reference) = schema.as_ref_schema() {
            if let Some(target) = reference.target() {
                let target = self.visit(&target);
                self.graph.add_edge(node, target, EdgeKind::Ref);
            }
            return node;
        }

        for (kind, keyword) in schema.keywords() {
            for (_, child) in keyword.subschemas() {
                let child = self.visit(child);
                self.graph.add_edge(node, child, EdgeKind::Contains(kind));
            }
        }
        node
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.index.contains_key(uri)
    }

    /// URIs the node at `uri` points to, with the edge kind
    pub fn outgoing(&self, uri: &str) -> Vec<(String, EdgeKind)> {
        let Some(node) = self.index.get(uri) else {
            return Vec::new();
        };
        let mut edges: Vec<(String, EdgeKind)> = self
            .graph
            .edges_directed(*node, Direction::Outgoing)
            .map(|e| (self.graph[e.target()].clone(), *e.weight()))
            .collect();
        edges.sort_by(|a, b| a.0.cmp(&b.0));
        edges
    }

    /// Recursive groups, each sorted, ordered by first member
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<String>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || self
                        .graph
                        .edges_directed(scc[0], Direction::Outgoing)
                        .any(|e| e.target() == scc[0])
            })
            .map(|scc| {
                let mut members: Vec<String> = scc.into_iter().map(|n| self.graph[n].clone()).collect();
                members.sort();
                members
            })
            .collect();
        groups.sort();
        groups
    }

    pub fn is_recursive(&self) -> bool {
        !self.cycles().is_empty()
    }

    /// Graphviz rendering; `$ref` edges dashed
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph ReferenceGraph {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, fontname=\"Helvetica\", fontsize=10];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n\n");

        for node in self.graph.node_indices() {
            output.push_str(&format!("  n{} [label=\"{}\"];\n", node.index(), escape(&self.graph[node])));
        }
        output.push('\n');

        for edge in self.graph.edge_references() {
            let style = match edge.weight() {
                EdgeKind::Ref => ", style=dashed",
                EdgeKind::Contains(_) => "",
            };
            output.push_str(&format!(
                "  n{} -> n{} [label=\"{}\"{}];\n",
                edge.source().index(),
                edge.target().index(),
                escape(&edge.weight().to_string()),
                style
            ));
        }

        output.push_str("}\n");
        output
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

//! The undirected, node-unique link graph accumulated by a single crawl task.

use serde::Serialize;
use std::collections::HashSet;

/// Node-link JSON document matching the `{directed, multigraph, graph, nodes,
/// edges}` shape the graph codec writes to disk.
#[derive(Debug, Serialize)]
pub struct GraphDocument {
    pub directed: bool,
    pub multigraph: bool,
    pub graph: serde_json::Map<String, serde_json::Value>,
    pub nodes: Vec<NodeEntry>,
    pub edges: Vec<EdgeEntry>,
}

#[derive(Debug, Serialize)]
pub struct NodeEntry {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct EdgeEntry {
    pub source: String,
    pub target: String,
}

/// In-memory undirected graph owned exclusively by its crawl task.
///
/// Invariants: every edge endpoint is also a node; no self-loops; no
/// parallel edges (an unordered pair is stored once regardless of the order
/// `add_edge` was called in).
#[derive(Debug, Default)]
pub struct Graph {
    nodes: indexmap::IndexSet<String>,
    edges: HashSet<(String, String)>,
}

fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `url` as a node. No-op if already present.
    pub fn add_node(&mut self, url: &str) {
        self.nodes.insert(url.to_string());
    }

    /// Adds an undirected edge between two distinct nodes, inserting both as
    /// nodes if missing. A self-loop (`from == to`) is silently rejected.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.add_node(from);
        self.add_node(to);
        self.edges.insert(canonical_pair(from, to));
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|s| s.as_str())
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// Renders the graph as the on-disk node-link document shape.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            directed: false,
            multigraph: false,
            graph: serde_json::Map::new(),
            nodes: self.nodes.iter().map(|id| NodeEntry { id: id.clone() }).collect(),
            edges: self
                .edges
                .iter()
                .map(|(source, target)| EdgeEntry {
                    source: source.clone(),
                    target: target.clone(),
                })
                .collect(),
        }
    }
}

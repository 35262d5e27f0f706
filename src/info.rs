//! Graph Info Updater (`spec.md` §4.6): an in-memory `host -> GraphInfo`
//! cache kept fresh by lazily recomputing from persisted graph files.

use crate::codec::load_graph_document;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Cached metadata for one host's persisted graph.
#[derive(Debug, Clone)]
pub struct GraphInfo {
    pub host: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub teleport_nodes: Vec<String>,
    pub last_modified: SystemTime,
}

/// Selects which nodes are flagged as long-range jump candidates for the
/// consuming game layer. `spec.md` §4.6 leaves the exact heuristic
/// parameterized; this crate ships a degree-based default behind the same
/// trait-object seam used for the compressor registry (`codec.rs`).
pub trait TeleportHeuristic: Send + Sync {
    fn select(&self, nodes: &[String], edges: &[(String, String)], top_k: usize) -> Vec<String>;
}

/// Ranks nodes by degree (number of incident edges) and returns the top-k.
pub struct DegreeHeuristic;

impl TeleportHeuristic for DegreeHeuristic {
    fn select(&self, nodes: &[String], edges: &[(String, String)], top_k: usize) -> Vec<String> {
        let mut degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for (a, b) in edges {
            *degree.entry(a.as_str()).or_insert(0) += 1;
            *degree.entry(b.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, usize)> = degree.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().take(top_k).map(|(n, _)| n.to_string()).collect()
    }
}

/// Maintains `host -> GraphInfo` for every persisted graph under a root
/// directory, recomputing entries whose backing file changed since the
/// last sweep.
pub struct GraphInfoUpdater {
    graph_root: PathBuf,
    cache: RwLock<IndexMap<String, GraphInfo>>,
    heuristic: Box<dyn TeleportHeuristic>,
    teleport_top_k: usize,
    max_files_per_tick: usize,
}

impl GraphInfoUpdater {
    pub fn new(graph_root: impl Into<PathBuf>) -> Self {
        Self {
            graph_root: graph_root.into(),
            cache: RwLock::new(IndexMap::new()),
            heuristic: Box::new(DegreeHeuristic),
            teleport_top_k: 5,
            max_files_per_tick: 50,
        }
    }

    pub fn with_heuristic(mut self, heuristic: Box<dyn TeleportHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_max_files_per_tick(mut self, max: usize) -> Self {
        self.max_files_per_tick = max;
        self
    }

    /// Returns the cached entry for `host`, if any.
    pub async fn get(&self, host: &str) -> Option<GraphInfo> {
        self.cache.read().await.get(host).cloned()
    }

    /// Lists every host currently tracked.
    pub async fn all_hosts(&self) -> Vec<String> {
        self.cache.read().await.keys().cloned().collect()
    }

    /// Recomputes entries whose file mtime is newer than the cached
    /// `last_modified` (or that are missing entirely), bounded to at most
    /// `max_files_per_tick` files so one sweep can't starve the event loop.
    #[tracing::instrument(skip(self))]
    pub async fn update_info(&self) -> anyhow::Result<usize> {
        if !self.graph_root.exists() {
            return Ok(0);
        }

        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(&self.graph_root)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                candidates.push(path);
            }
        }

        let mut updated = 0;
        for path in candidates.into_iter().take(self.max_files_per_tick) {
            if self.refresh_one(&path).await? {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn refresh_one(&self, path: &Path) -> anyhow::Result<bool> {
        let host = host_from_path(path);
        let mtime = std::fs::metadata(path)?.modified()?;

        {
            let cache = self.cache.read().await;
            if let Some(existing) = cache.get(&host) {
                if existing.last_modified >= mtime {
                    return Ok(false);
                }
            }
        }

        let document = match load_graph_document(path) {
            Ok(doc) => doc,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to decode graph file, skipping refresh");
                return Ok(false);
            }
        };

        let nodes: Vec<String> = document.nodes.into_iter().map(|n| n.id).collect();
        let edges: Vec<(String, String)> = document
            .edges
            .into_iter()
            .map(|e| (e.source, e.target))
            .collect();
        let teleport_nodes = self.heuristic.select(&nodes, &edges, self.teleport_top_k);

        let info = GraphInfo {
            host: host.clone(),
            node_count: nodes.len(),
            edge_count: edges.len(),
            teleport_nodes,
            last_modified: mtime,
        };

        self.cache.write().await.insert(host, info);
        Ok(true)
    }
}

/// Derives the host key from a graph file's name, stripping the
/// compressor's extension (e.g. `example.test.gz` -> `example.test`).
fn host_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{compress_graph, Compressor};
    use crate::graph::Graph;

    #[tokio::test]
    async fn update_info_populates_cache_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = Graph::new();
        graph.add_edge("https://example.test/a", "https://example.test/b");
        compress_graph(&graph, dir.path(), "example.test", Compressor::Gzip).unwrap();

        let updater = GraphInfoUpdater::new(dir.path());
        let updated = updater.update_info().await.unwrap();
        assert_eq!(updated, 1);

        let info = updater.get("example.test").await.unwrap();
        assert_eq!(info.node_count, 2);
        assert_eq!(info.edge_count, 1);
    }

    #[tokio::test]
    async fn missing_host_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let updater = GraphInfoUpdater::new(dir.path());
        assert!(updater.get("nope.test").await.is_none());
    }

    #[test]
    fn degree_heuristic_ranks_by_incident_edges() {
        let nodes = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let edges = vec![("a".to_string(), "b".to_string()), ("a".to_string(), "c".to_string())];
        let top = DegreeHeuristic.select(&nodes, &edges, 1);
        assert_eq!(top, vec!["a".to_string()]);
    }
}

//! Graph Watcher (`spec.md` §4.7): a cooperative scheduler that sweeps the
//! graph directory on a fixed cadence, feeding both the Info Updater and
//! the Cleaner.

use crate::codec::load_graph_document;
use crate::info::GraphInfoUpdater;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

type ScheduledFn = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Runs every function in `fns` in sequence, once per `interval` tick,
/// until cancelled. Functions are awaited one after another — not
/// concurrently — so a slow sweep delays but never overlaps the next.
pub async fn run_scheduled_functions(fns: Vec<ScheduledFn>, interval_period: Duration) {
    let mut ticker = interval(interval_period);
    loop {
        ticker.tick().await;
        for f in &fns {
            f().await;
        }
    }
}

/// Deletes graph files that fail to decompress/decode or that decode to at
/// most one node (`spec.md` §4.7).
pub struct GraphCleaner {
    graph_root: PathBuf,
}

impl GraphCleaner {
    pub fn new(graph_root: impl Into<PathBuf>) -> Self {
        Self {
            graph_root: graph_root.into(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> anyhow::Result<usize> {
        if !self.graph_root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.graph_root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                continue;
            }
            if should_remove(&path) {
                tracing::info!(path = %path.display(), "removing malformed/empty graph file");
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn should_remove(path: &Path) -> bool {
    match load_graph_document(path) {
        Ok(document) => document.nodes.len() <= 1,
        Err(_) => true,
    }
}

/// Convenience constructor wiring the two C7-registered functions
/// (`cleaner.sweep`, `info_updater.update_info`) into the scheduler's
/// closure list.
pub fn default_scheduled_fns(cleaner: Arc<GraphCleaner>, updater: Arc<GraphInfoUpdater>) -> Vec<ScheduledFn> {
    let cleaner_fn: ScheduledFn = {
        let cleaner = cleaner.clone();
        Box::new(move || {
            let cleaner = cleaner.clone();
            Box::pin(async move {
                if let Err(error) = cleaner.sweep().await {
                    tracing::warn!(%error, "graph cleaner sweep failed");
                }
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
    };
    let updater_fn: ScheduledFn = {
        let updater = updater.clone();
        Box::new(move || {
            let updater = updater.clone();
            Box::pin(async move {
                if let Err(error) = updater.update_info().await {
                    tracing::warn!(%error, "graph info updater sweep failed");
                }
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
    };
    vec![cleaner_fn, updater_fn]
}

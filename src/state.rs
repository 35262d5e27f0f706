//! Shared State (`spec.md` §4.8): the process-wide handle binding the task
//! queue, the info updater, and the graph root together.
//!
//! Deliberately not a `lazy_static`/global singleton: `SharedState::new`
//! and `SharedState::shutdown` are meant to be called from the host
//! process's own startup/teardown hook, per §4.8's scoped-acquisition
//! idiom (mirrors `ClientFactory::with_client` in `client.rs`).

use crate::codec::Compressor;
use crate::info::GraphInfoUpdater;
use crate::queue::TaskQueue;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Deployment profile selected by the host's `ENV` variable. Out-of-scope
/// behaviorally (`spec.md` §1) — carried here only so the crate can label
/// its own logs with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Process-wide handle bound to the host server's lifetime.
///
/// Holds the compressor choice, the task queue, the info updater, the
/// graph root path, the environment tag, and the active-course map — the
/// last of those is an out-of-core concern per `spec.md` §3, held here
/// with no behavior since the game layer that populates it is out of
/// scope for this crate.
pub struct SharedState {
    pub compressor: Compressor,
    pub graph_root: PathBuf,
    pub environment: Environment,
    pub task_queue: Arc<TaskQueue>,
    pub info_updater: Arc<GraphInfoUpdater>,
    active_courses: RwLock<HashMap<String, String>>,
}

impl SharedState {
    pub fn new(
        compressor: Compressor,
        graph_root: impl Into<PathBuf>,
        environment: Environment,
        queue_capacity: usize,
    ) -> Arc<Self> {
        let graph_root = graph_root.into();
        Arc::new(Self {
            compressor,
            task_queue: Arc::new(TaskQueue::new(queue_capacity)),
            info_updater: Arc::new(GraphInfoUpdater::new(graph_root.clone())),
            graph_root,
            environment,
            active_courses: RwLock::new(HashMap::new()),
        })
    }

    /// Records which host a game session is currently exploring.
    pub async fn bind_session(&self, session_id: impl Into<String>, host: impl Into<String>) {
        self.active_courses.write().await.insert(session_id.into(), host.into());
    }

    /// Looks up the host a session is bound to, if any.
    pub async fn session_host(&self, session_id: &str) -> Option<String> {
        self.active_courses.read().await.get(session_id).cloned()
    }

    /// Drops a session's binding on disconnect/completion.
    pub async fn unbind_session(&self, session_id: &str) {
        self.active_courses.write().await.remove(session_id);
    }

    /// Host-driven teardown hook. Releases nothing beyond dropping the
    /// `Arc` contents since every held resource (channels, caches) cleans
    /// itself up on drop; kept as an explicit call so the host's shutdown
    /// sequence has a single, named place to hang future cleanup off of.
    pub async fn shutdown(self: Arc<Self>) {
        tracing::info!("shared state shutting down");
    }
}

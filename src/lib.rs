//! An async, single-domain web crawler that accumulates undirected link
//! graphs and persists them as compressed JSON, fronted by a bounded task
//! queue and watched by a background info updater.
//!
//! The crate is the core of a larger system: the HTTP surface that
//! enqueues URLs and reads graph metadata, configuration loading, and the
//! game-logic layer that consumes graphs all live outside this crate and
//! are expected to embed it via [`state::SharedState`].

pub mod client;
pub mod codec;
pub mod crawler;
pub mod error;
pub mod graph;
pub mod info;
pub mod queue;
pub mod robots;
pub mod state;
pub mod urlutil;
pub mod watcher;

pub use codec::Compressor;
pub use crawler::{CrawlOutcome, Crawler, CrawlerBuilder, CrawlerConfig};
pub use error::{CrawlError, CrawlErrorKind};
pub use graph::Graph;
pub use info::{GraphInfo, GraphInfoUpdater, TeleportHeuristic};
pub use queue::{CrawlTask, EnqueueOutcome, TaskQueue};
pub use robots::RobotsPolicy;
pub use state::{Environment, SharedState};
pub use watcher::{default_scheduled_fns, run_scheduled_functions, GraphCleaner};

//! Typed failure classes for a single crawl task.
//!
//! The traversal never lets one of these escape to the caller mid-crawl:
//! transient and parse failures are logged and swallowed per URL, while
//! `HttpStatus`/`Fatal` abort the owning task. `anyhow::Error` is still the
//! crate's public boundary type; this enum exists so failures can be grouped
//! by kind for the end-of-task log summary in `crawler.rs`.
//!
//! Admission-time rejections (queue full, duplicate task) are not part of
//! this enum: `queue.rs`'s `EnqueueOutcome` already carries that as a
//! synchronous status rather than an error, so a `QueueFull`/`Duplicate`
//! variant here would just be a second, never-constructed way to say the
//! same thing.

use std::fmt;

/// A classified failure arising from crawling a single task.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Network-level failure presumed transient (timeout, reset, DNS flake),
    /// exhausted after the transport's own retry budget.
    #[error("transient network error: {0}")]
    Transient(String),

    /// The setup HEAD request returned a non-2xx status.
    #[error("http status {0} on setup request")]
    HttpStatus(reqwest::StatusCode),

    /// HTML/robots content could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Bad configuration supplied at admission time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unrecoverable condition; the task's graph is not persisted.
    #[error("fatal crawl failure: {0}")]
    Fatal(String),
}

/// Coarse kind used to group errors for the aggregate end-of-task log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlErrorKind {
    Transient,
    HttpStatus,
    Parse,
    Config,
    Fatal,
}

impl CrawlError {
    pub fn kind(&self) -> CrawlErrorKind {
        match self {
            CrawlError::Transient(_) => CrawlErrorKind::Transient,
            CrawlError::HttpStatus(_) => CrawlErrorKind::HttpStatus,
            CrawlError::Parse(_) => CrawlErrorKind::Parse,
            CrawlError::Config(_) => CrawlErrorKind::Config,
            CrawlError::Fatal(_) => CrawlErrorKind::Fatal,
        }
    }
}

impl fmt::Display for CrawlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CrawlErrorKind::Transient => "transient",
            CrawlErrorKind::HttpStatus => "http-status",
            CrawlErrorKind::Parse => "parse",
            CrawlErrorKind::Config => "config",
            CrawlErrorKind::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

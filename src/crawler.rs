//! Crawler Engine (`spec.md` §4.3): frontier traversal, same-origin link
//! extraction, and graph accumulation for one crawl task.

use crate::client::{ClientFactory, ClientFactoryConfig};
use crate::error::{CrawlError, CrawlErrorKind};
use crate::graph::Graph;
use crate::robots::RobotsPolicy;
use crate::urlutil::{is_cdn_cgi, is_excluded, netloc, resolve};
use mime::Mime;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

const DEFAULT_MAX_DEPTH: usize = 5;
const DEFAULT_REQUEST_LIMIT: usize = 16;

/// Configuration for one crawl task. Immutable once the task starts.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub max_depth: usize,
    pub request_limit: usize,
    pub respect_robots: bool,
    /// Sniffed-MIME allowlist for fetched bodies. Empty means unfiltered.
    /// Kept from the teacher crate's `infer`/`mime`-based content guard.
    pub allowed_mimes: Vec<Mime>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::client::CRAWLER_USER_AGENT.to_string(),
            accept_language: "en, el-GR;q=0.9".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            request_limit: DEFAULT_REQUEST_LIMIT,
            respect_robots: true,
            allowed_mimes: Vec::new(),
        }
    }
}

/// Builder for [`Crawler`], mirroring the teacher crate's configuration
/// ergonomics.
pub struct CrawlerBuilder {
    config: CrawlerConfig,
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlerBuilder {
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn with_request_limit(mut self, limit: usize) -> Self {
        self.config.request_limit = limit;
        self
    }

    pub fn with_user_agent<S: AsRef<str>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.as_ref().into();
        self
    }

    pub fn with_accept_language<S: AsRef<str>>(mut self, accept_language: S) -> Self {
        self.config.accept_language = accept_language.as_ref().into();
        self
    }

    pub fn with_robots(mut self, respect_robots: bool) -> Self {
        self.config.respect_robots = respect_robots;
        self
    }

    /// Restricts fetched bodies to a sniffed-MIME allowlist. Kept from the
    /// teacher crate's content guard.
    pub fn with_allowed_mimes(mut self, mime_types: Vec<Mime>) -> Self {
        self.config.allowed_mimes = mime_types;
        self
    }

    pub fn build(self) -> Crawler {
        Crawler::from_config(self.config)
    }
}

/// Summary of a finished `build_graph` call: the accumulated graph plus
/// error counts grouped by kind, per `spec.md` §7's "grouped log entries".
pub struct CrawlOutcome {
    pub graph: Graph,
    pub errors_by_kind: HashMap<CrawlErrorKind, usize>,
}

/// Frontier traversal, link extraction, and graph accumulation for a single
/// origin.
pub struct Crawler {
    config: CrawlerConfig,
    client_factory: ClientFactory,
}

impl Crawler {
    fn from_config(config: CrawlerConfig) -> Self {
        let client_factory = ClientFactory::new(ClientFactoryConfig {
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        });
        Self {
            config,
            client_factory,
        }
    }

    pub fn new() -> Self {
        Self::from_config(CrawlerConfig::default())
    }

    /// Issues a HEAD request against `start_url`. Returns `false` (skip the
    /// task) on any non-2xx status, per `spec.md` §4.3.
    #[tracing::instrument(skip(self))]
    pub async fn pre_crawl_setup(&self, start_url: &str) -> anyhow::Result<bool> {
        let scoped = self.client_factory.with_client(start_url)?;
        let response = scoped.client().head(start_url).send().await?;
        let negotiated_http2 = response.version() == http::Version::HTTP_2;
        tracing::debug!(status = %response.status(), negotiated_http2, "pre-crawl HEAD complete");
        Ok(response.status().is_success())
    }

    /// Traverses same-origin links from `start_url` up to `max_depth`,
    /// bounded in flight by a semaphore of size `request_limit`.
    ///
    /// `max_depth = 0` yields a single-node graph with no edges.
    #[tracing::instrument(skip(self))]
    pub async fn build_graph(&self, start_url: &str) -> anyhow::Result<CrawlOutcome> {
        let start = Url::parse(start_url)?;
        let origin_netloc = netloc(&start);
        let origin = format!("{}://{}", start.scheme(), start.authority());

        let scoped = self.client_factory.with_client(start_url)?;

        let robots = if self.config.respect_robots {
            RobotsPolicy::fetch(scoped.client(), &origin, &self.config.user_agent).await
        } else {
            RobotsPolicy::permissive(&self.config.user_agent)
        };

        let graph = Arc::new(Mutex::new(Graph::new()));
        let visited: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        let frontier: Arc<Mutex<Vec<(Url, usize)>>> =
            Arc::new(Mutex::new(vec![(start.clone(), 0)]));
        let semaphore = Arc::new(Semaphore::new(self.config.request_limit.max(1)));
        let errors: Arc<Mutex<HashMap<CrawlErrorKind, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            loop {
                let next = frontier.lock().await.pop();
                let Some((url, depth)) = next else { break };

                if depth > self.config.max_depth {
                    continue;
                }

                {
                    let mut visited_guard = visited.lock().await;
                    if visited_guard.contains(url.as_str()) {
                        continue;
                    }
                    visited_guard.insert(url.as_str().to_string());
                }

                graph.lock().await.add_node(url.as_str());

                if is_excluded(&url) {
                    tracing::debug!(url = %url, "excluded suffix, node kept as leaf");
                    continue;
                }

                let permit = semaphore.clone().acquire_owned().await?;
                let task_client = scoped.client().clone();
                let graph = graph.clone();
                let frontier = frontier.clone();
                let errors = errors.clone();
                let origin_netloc = origin_netloc.clone();
                let robots_allowed = robots.allowed(url.as_str());
                let max_depth = self.config.max_depth;
                let allowed_mimes = self.config.allowed_mimes.clone();

                in_flight.spawn(async move {
                    let _permit = permit;
                    if let Err(error) = expand_one(
                        &task_client,
                        &url,
                        depth,
                        max_depth,
                        &origin_netloc,
                        robots_allowed,
                        &allowed_mimes,
                        &graph,
                        &frontier,
                    )
                    .await
                    {
                        tracing::debug!(url = %url, %error, "url pruned");
                        *errors.lock().await.entry(error.kind()).or_insert(0) += 1;
                    }
                });
            }

            if in_flight.is_empty() {
                break;
            }
            in_flight.join_next().await;
        }

        let graph = Arc::try_unwrap(graph)
            .map_err(|_| anyhow::anyhow!("graph still has outstanding references"))?
            .into_inner();
        let errors_by_kind = Arc::try_unwrap(errors)
            .map_err(|_| anyhow::anyhow!("error map still has outstanding references"))?
            .into_inner();

        if !errors_by_kind.is_empty() {
            tracing::warn!(?errors_by_kind, "crawl finished with pruned subtrees");
        }

        Ok(CrawlOutcome {
            graph,
            errors_by_kind,
        })
    }

    /// Writes the accumulated graph to disk via the graph codec. Skipped
    /// (returns `Ok(None)`) when the graph has at most one node.
    pub fn compress_graph(
        &self,
        graph: &Graph,
        graph_root: &std::path::Path,
        host: &str,
        compressor: crate::codec::Compressor,
    ) -> anyhow::Result<Option<std::path::PathBuf>> {
        Ok(crate::codec::compress_graph(graph, graph_root, host, compressor)?)
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetches one URL and, if it expands cleanly, pushes same-origin children
/// onto the shared frontier and records edges in the graph.
///
/// Robots compliance is checked here — after the fetch has already
/// happened — so it suppresses link extraction rather than the request
/// itself (`spec.md` §4.3, §9: an accepted, documented non-goal to "fix").
async fn expand_one(
    client: &reqwest_middleware::ClientWithMiddleware,
    url: &Url,
    depth: usize,
    max_depth: usize,
    origin_netloc: &str,
    robots_allowed: bool,
    allowed_mimes: &[Mime],
    graph: &Arc<Mutex<Graph>>,
    frontier: &Arc<Mutex<Vec<(Url, usize)>>>,
) -> Result<(), CrawlError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| CrawlError::Transient(e.to_string()))?;

    if response.status() == StatusCode::TOO_MANY_REQUESTS || response.status().is_server_error() {
        return Err(CrawlError::HttpStatus(response.status()));
    }
    if !response.status().is_success() {
        return Ok(());
    }

    if response.headers().get("cf-mitigated").and_then(|v| v.to_str().ok()) == Some("challenge") {
        tracing::debug!(url = %url, "cloudflare mitigation detected, skipping");
        return Ok(());
    }

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("html"))
        .unwrap_or(false);
    if !is_html {
        return Ok(());
    }

    if !robots_allowed {
        tracing::debug!(url = %url, "robots disallow, suppressing extraction");
        return Ok(());
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| CrawlError::Transient(e.to_string()))?;

    if !allowed_mimes.is_empty() {
        let passes = infer::get(bytes.as_ref())
            .map(|kind| {
                Mime::from_str(kind.mime_type())
                    .map(|mime| allowed_mimes.contains(&mime))
                    .unwrap_or(true)
            })
            .unwrap_or(true);
        if !passes {
            tracing::debug!(url = %url, "sniffed mime rejected by allowlist");
            return Ok(());
        }
    }

    // Lossy rather than strict UTF-8 decoding: a server that omits/misreports
    // its charset shouldn't prune an otherwise-good subtree over a few
    // mis-decoded bytes (`spec.md` §4.1's "default content encoding detected
    // from the response body when the server omits a charset").
    let body = String::from_utf8_lossy(&bytes).into_owned();

    let links = extract_links(&body).map_err(CrawlError::Parse)?;

    // A target beyond max_depth is neither added to the graph nor enqueued
    // — it must not be observable at all (`spec.md` §8 boundary behavior:
    // `max_depth = 0` yields a single node and zero edges).
    if depth + 1 > max_depth {
        return Ok(());
    }

    let mut graph_guard = graph.lock().await;
    let mut frontier_guard = frontier.lock().await;
    for href in links {
        let Some(target) = resolve(url, &href) else {
            continue;
        };
        if is_cdn_cgi(&target) {
            continue;
        }
        if netloc(&target) != origin_netloc {
            continue;
        }
        graph_guard.add_edge(url.as_str(), target.as_str());
        frontier_guard.push((target, depth + 1));
    }

    Ok(())
}

/// Extracts `<a href>` targets from `content` in link order.
fn extract_links(content: &str) -> Result<Vec<String>, String> {
    let document = Html::parse_document(content);
    let selector = Selector::parse("a").map_err(|error| format!("{error:?}"))?;

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href").map(|href| href.to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hrefs_in_order() {
        let html = r#"<html><body><a href="/a">a</a><a href="/b">b</a></body></html>"#;
        let links = extract_links(html).unwrap();
        assert_eq!(links, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn ignores_anchors_without_href() {
        let html = r#"<html><body><a name="top">top</a><a href="/a">a</a></body></html>"#;
        let links = extract_links(html).unwrap();
        assert_eq!(links, vec!["/a".to_string()]);
    }

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.respect_robots);
    }
}

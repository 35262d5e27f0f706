//! Scoped HTTP client acquisition (`spec.md` §4.1).
//!
//! `ClientFactory::with_client` hands out an HTTP/2-capable client wrapped
//! in a guard that is released on every exit path — normal return, error,
//! cancellation, or panic — by virtue of being plain RAII `Drop`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Stable, versioned identity sent as the crawler's `User-Agent`.
pub const CRAWLER_USER_AGENT: &str = concat!("GraphWalker/", env!("CARGO_PKG_VERSION"));

const DEFAULT_ACCEPT: &str = "text/html,application/json,application/xml;q=0.9";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en, el-GR;q=0.9";
const MAX_REDIRECTS: usize = 10;
const TRANSPORT_RETRIES: u32 = 3;

/// Construction parameters shared by every client the factory hands out.
#[derive(Debug, Clone)]
pub struct ClientFactoryConfig {
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for ClientFactoryConfig {
    fn default() -> Self {
        Self {
            user_agent: CRAWLER_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

/// Builds HTTP/2-capable clients scoped to a single crawl task.
pub struct ClientFactory {
    config: ClientFactoryConfig,
    active: Arc<AtomicUsize>,
}

impl ClientFactory {
    pub fn new(config: ClientFactoryConfig) -> Self {
        Self {
            config,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of clients currently checked out. Exposed for tests and for
    /// the host process to sanity-check that scopes are being released.
    pub fn active_clients(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Acquires a client scoped to `base_url`. The returned guard releases
    /// on drop regardless of how the scope exits.
    #[tracing::instrument(skip(self))]
    pub fn with_client(&self, base_url: &str) -> anyhow::Result<ScopedClient> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&self.config.accept_language)?,
        );
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.config.user_agent)?);

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(TRANSPORT_RETRIES);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(%base_url, "client acquired");

        Ok(ScopedClient {
            client,
            base_url: base_url.to_string(),
            active: self.active.clone(),
        })
    }
}

/// A client checked out for the lifetime of one crawl task.
///
/// Dropping the guard (normal return, early `?`, cancellation, or panic
/// unwind) releases the checkout. Borrow the inner client with
/// [`ScopedClient::client`].
pub struct ScopedClient {
    client: ClientWithMiddleware,
    base_url: String,
    active: Arc<AtomicUsize>,
}

impl ScopedClient {
    pub fn client(&self) -> &ClientWithMiddleware {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Strips headers that are illegal once the connection has negotiated
    /// HTTP/2 (`spec.md` §4.3: `pre_crawl_setup`). Kept as a no-op hook on
    /// the guard since `reqwest` manages connection headers itself; callers
    /// that build raw requests should omit `Keep-Alive`/`Connection` headers
    /// when `negotiated_http2` is true.
    pub fn strip_http1_only_headers(headers: &mut HeaderMap, negotiated_http2: bool) {
        if negotiated_http2 {
            for name in ["keep-alive", "connection"] {
                if let Ok(name) = HeaderName::try_from(name) {
                    headers.remove(name);
                }
            }
        }
    }
}

impl Drop for ScopedClient {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(base_url = %self.base_url, "client released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_releases_on_drop() {
        let factory = ClientFactory::new(ClientFactoryConfig::default());
        {
            let _guard = factory.with_client("https://example.test").unwrap();
            assert_eq!(factory.active_clients(), 1);
        }
        assert_eq!(factory.active_clients(), 0);
    }

    #[test]
    fn strip_headers_only_under_http2() {
        let mut headers = HeaderMap::new();
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));

        ScopedClient::strip_http1_only_headers(&mut headers, false);
        assert!(headers.contains_key("keep-alive"));

        ScopedClient::strip_http1_only_headers(&mut headers, true);
        assert!(!headers.contains_key("keep-alive"));
        assert!(!headers.contains_key("connection"));
    }
}

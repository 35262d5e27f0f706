//! Per-task `robots.txt` policy.
//!
//! One `RobotsPolicy` is fetched per crawl task — unlike the teacher's
//! cross-domain `robots_cache`, this design has no cross-task sharing
//! (`spec.md` §4.2: "no cross-task sharing").

use reqwest_middleware::ClientWithMiddleware;
use robotstxt::DefaultMatcher;

/// Parsed `robots.txt` rules for one origin, or a permissive fallback.
pub struct RobotsPolicy {
    content: Option<String>,
    crawl_delay: Option<u64>,
    user_agent: String,
}

impl RobotsPolicy {
    /// Fetches `origin/robots.txt`. Any non-200 response or network failure
    /// yields a permissive policy (all paths allowed) per `spec.md` §4.2.
    #[tracing::instrument(skip(client))]
    pub async fn fetch(client: &ClientWithMiddleware, origin: &str, user_agent: &str) -> Self {
        let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

        let content = match client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                tracing::debug!(status = %response.status(), "robots.txt fetch non-200, permissive fallback");
                None
            }
            Err(error) => {
                tracing::debug!(%error, "robots.txt fetch failed, permissive fallback");
                None
            }
        };

        let crawl_delay = content.as_deref().and_then(parse_crawl_delay);

        Self {
            content,
            crawl_delay,
            user_agent: user_agent.to_string(),
        }
    }

    /// A policy that allows everything, used when the caller opts out of
    /// `robots.txt` checks entirely.
    pub fn permissive(user_agent: &str) -> Self {
        Self {
            content: None,
            crawl_delay: None,
            user_agent: user_agent.to_string(),
        }
    }

    /// Whether `url` may be fetched under this policy's rules for `*`.
    pub fn allowed(&self, url: &str) -> bool {
        match &self.content {
            Some(content) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(content, &self.user_agent, url)
            }
            None => true,
        }
    }

    pub fn crawl_delay(&self) -> Option<u64> {
        self.crawl_delay
    }
}

fn parse_crawl_delay(content: &str) -> Option<u64> {
    content
        .lines()
        .filter_map(|line| {
            if line.to_ascii_lowercase().contains("crawl-delay") {
                line.split(':').nth(1)?.trim().parse().ok()
            } else {
                None
            }
        })
        .next()
}

//! URL normalization and filtering helpers shared by the crawler engine.
//!
//! Normalization strips fragments but keeps query strings; trailing-slash
//! variants are treated as distinct URLs (`spec.md` §4.3 — a documented
//! non-goal, not a bug).

use reqwest::Url;

/// Suffixes that suppress fetching a URL; the node is still added to the
/// graph and remains a leaf (`spec.md` §4.3 step 2).
pub const EXCLUDED_SUFFIXES: &[&str] = &[
    ".pdf", ".xml", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".css", ".js", ".zip", ".ico",
];

/// Network location (host[:port]) used for the same-origin check.
pub fn netloc(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

/// Strips the fragment component of `url`, preserving the query string.
pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Whether `url`'s path ends in one of the exclusion suffixes.
pub fn is_excluded(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    EXCLUDED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Whether `url` should never be followed regardless of origin (`spec.md`
/// §4.3 step 4: "Reject any path containing cdn-cgi").
pub fn is_cdn_cgi(url: &Url) -> bool {
    url.path().contains("cdn-cgi")
}

/// Resolves `href` against `base`, stripping the fragment. `None` if the
/// href is not a parseable absolute or relative URL.
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    base.join(href).ok().map(strip_fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn netloc_ignores_path_and_scheme() {
        assert_eq!(netloc(&url("https://example.test/a/b?x=1")), "example.test");
        assert_eq!(netloc(&url("http://example.test/a/b?x=1")), "example.test");
    }

    #[test]
    fn www_and_bare_host_are_distinct_netlocs() {
        assert_ne!(netloc(&url("https://www.example.test/")), netloc(&url("https://example.test/")));
    }

    #[test]
    fn strip_fragment_keeps_query() {
        let stripped = strip_fragment(url("https://example.test/a?x=1#section"));
        assert_eq!(stripped.as_str(), "https://example.test/a?x=1");
    }

    #[test]
    fn trailing_slash_variants_are_distinct() {
        assert_ne!(url("https://example.test/a"), url("https://example.test/a/"));
    }

    #[test]
    fn excluded_suffixes_are_case_insensitive() {
        assert!(is_excluded(&url("https://example.test/report.PDF")));
        assert!(!is_excluded(&url("https://example.test/page")));
    }

    #[test]
    fn cdn_cgi_paths_are_rejected() {
        assert!(is_cdn_cgi(&url("https://example.test/cdn-cgi/l/email-protection")));
        assert!(!is_cdn_cgi(&url("https://example.test/about")));
    }
}

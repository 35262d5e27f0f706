//! End-to-end crawl scenarios against a mock HTTP server, covering the
//! literal scenarios from `spec.md` §8. Grounded on the mock-server idiom
//! `cyrup-ai-kodegen-tools-citescrape/tests/common/mod.rs` uses for its own
//! crawl tests — the teacher crate has no test suite of its own to imitate
//! here.

use graphwalker::{Compressor, CrawlerBuilder};

fn html_mock(server: &mut mockito::ServerGuard, path: &str, body: &str) -> mockito::Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(body)
        .create()
}

fn host_of(url: &str) -> String {
    let parsed = reqwest::Url::parse(url).unwrap();
    graphwalker::urlutil::netloc(&parsed)
}

#[tokio::test]
async fn trivial_site_has_one_node_and_is_not_persisted() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", "<html><body>no links here</body></html>");

    let crawler = CrawlerBuilder::new().with_max_depth(5).build();
    let start = format!("{}/", server.url());
    let outcome = crawler.build_graph(&start).await.unwrap();

    assert_eq!(outcome.graph.node_count(), 1);
    assert_eq!(outcome.graph.edge_count(), 0);

    let dir = tempfile::tempdir().unwrap();
    let written = crawler
        .compress_graph(&outcome.graph, dir.path(), &host_of(&start), Compressor::Gzip)
        .unwrap();
    assert!(written.is_none());
}

#[tokio::test]
async fn two_page_loop_persists_one_edge_and_is_readable_via_info_updater() {
    let mut server = mockito::Server::new_async().await;
    let _a = html_mock(&mut server, "/a", r#"<html><body><a href="/b">b</a></body></html>"#);
    let _b = html_mock(&mut server, "/b", r#"<html><body><a href="/a">a</a></body></html>"#);

    let crawler = CrawlerBuilder::new().with_max_depth(5).build();
    let start = format!("{}/a", server.url());
    let outcome = crawler.build_graph(&start).await.unwrap();

    assert_eq!(outcome.graph.node_count(), 2);
    assert_eq!(outcome.graph.edge_count(), 1);

    let dir = tempfile::tempdir().unwrap();
    let host = host_of(&start);
    let path = crawler
        .compress_graph(&outcome.graph, dir.path(), &host, Compressor::Gzip)
        .unwrap()
        .expect("two-node graph is persisted");
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{host}.gz"));

    let updater = graphwalker::GraphInfoUpdater::new(dir.path());
    updater.update_info().await.unwrap();
    let info = updater.get(&host).await.expect("info entry present after sweep");
    assert_eq!(info.node_count, 2);
    assert_eq!(info.edge_count, 1);
}

#[tokio::test]
async fn external_link_is_filtered_and_never_fetched() {
    let mut server = mockito::Server::new_async().await;
    let _a = html_mock(
        &mut server,
        "/a",
        r#"<html><body><a href="https://other.test/x">external</a><a href="/b">b</a></body></html>"#,
    );
    let _b = html_mock(&mut server, "/b", "<html><body>leaf</body></html>");

    let crawler = CrawlerBuilder::new().with_max_depth(5).build();
    let start = format!("{}/a", server.url());
    let outcome = crawler.build_graph(&start).await.unwrap();

    let nodes: Vec<&str> = outcome.graph.nodes().collect();
    assert!(nodes.iter().any(|n| n.ends_with("/b")));
    assert!(!nodes.iter().any(|n| n.contains("other.test")));
    assert_eq!(outcome.graph.edge_count(), 1);
}

#[tokio::test]
async fn depth_cap_stops_expansion_past_max_depth() {
    let mut server = mockito::Server::new_async().await;
    let _0 = html_mock(&mut server, "/0", r#"<a href="/1">1</a>"#);
    let _1 = html_mock(&mut server, "/1", r#"<a href="/2">2</a>"#);
    let _2 = html_mock(&mut server, "/2", r#"<a href="/3">3</a>"#);
    let _3 = html_mock(&mut server, "/3", r#"<a href="/4">4</a>"#);
    let _4 = html_mock(&mut server, "/4", "leaf");

    let crawler = CrawlerBuilder::new().with_max_depth(2).build();
    let start = format!("{}/0", server.url());
    let outcome = crawler.build_graph(&start).await.unwrap();

    let nodes: std::collections::HashSet<String> = outcome.graph.nodes().map(|s| s.to_string()).collect();
    let base = server.url();
    assert_eq!(
        nodes,
        std::collections::HashSet::from([
            format!("{base}/0"),
            format!("{base}/1"),
            format!("{base}/2"),
        ])
    );
    assert_eq!(outcome.graph.edge_count(), 2);
}

#[tokio::test]
async fn robots_disallowed_page_is_a_leaf_but_still_a_node() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /admin/\n")
        .create();
    let _a = html_mock(
        &mut server,
        "/a",
        r#"<html><body><a href="/admin/x">admin</a></body></html>"#,
    );
    let _admin = html_mock(
        &mut server,
        "/admin/x",
        r#"<html><body><a href="/secret">secret</a></body></html>"#,
    );
    let _secret = html_mock(&mut server, "/secret", "leaf");

    let crawler = CrawlerBuilder::new().with_max_depth(5).with_robots(true).build();
    let start = format!("{}/a", server.url());
    let outcome = crawler.build_graph(&start).await.unwrap();

    let nodes: Vec<String> = outcome.graph.nodes().map(|s| s.to_string()).collect();
    let base = server.url();
    assert!(nodes.contains(&format!("{base}/admin/x")));
    assert!(
        !nodes.contains(&format!("{base}/secret")),
        "no links should be extracted from a robots-disallowed page"
    );
}

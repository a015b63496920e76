//! Integration tests for the spider
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full run cycle end-to-end.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_spider::config::{BrowserConfig, Config};
use sumi_spider::crawler::{
    BrowserFetcher, BrowserlessDriver, FetchError, FetchFn, FetchedResource, ResourceFetcher,
    ResponseMiddleware,
};
use sumi_spider::output::{read_items, RunStatistics};
use sumi_spider::{ItemSaver, Response, Spider, SpiderError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration without delays
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.user_agent.crawler_name = "TestBot".to_string();
    config.user_agent.crawler_version = "1.0.0".to_string();
    config
}

/// Mounts an HTML page at `page_path`
async fn mount_page(server: &MockServer, page_path: &str, body: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, status: u16, body: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn run(spider: Spider) -> Result<RunStatistics, SpiderError> {
    tokio::time::timeout(Duration::from_secs(20), spider.run())
        .await
        .expect("spider run did not finish")
}

/// Handler following every link of every page
async fn follow_all(response: Response, _items: ItemSaver) -> anyhow::Result<()> {
    for link in response.links() {
        response.follow(&link).await?;
    }
    Ok(())
}

/// Serves a fixed body per host without touching the network
struct CannedFetcher {
    pages: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl ResourceFetcher for CannedFetcher {
    async fn acquire(&self, url: &url::Url) -> Result<FetchedResource, FetchError> {
        let host = url.host_str().unwrap_or_default();
        let body = self
            .pages
            .iter()
            .find(|(page_host, _)| *page_host == host)
            .map(|(_, body)| *body)
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })?;

        Ok(FetchedResource {
            url: url.clone(),
            status: Some(200),
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
            elapsed: Duration::from_millis(1),
        })
    }
}

fn url_set(urls: &[&str]) -> HashSet<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

#[tokio::test]
async fn test_seed_and_followed_urls_are_reported_as_written() {
    let handler = |response: Response, _items: ItemSaver| async move {
        if response.url().host_str() == Some("a.com") {
            response.follow("http://b.com").await?;
        }
        anyhow::Ok(())
    };

    let spider = Spider::new(["http://a.com"], handler, create_test_config())
        .unwrap()
        .with_fetcher(CannedFetcher {
            pages: vec![("a.com", "<p>a</p>"), ("b.com", "<p>b</p>")],
        });
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.reachable_urls, url_set(&["http://a.com", "http://b.com"]));
    assert_eq!(stats.followed_urls, url_set(&["http://b.com"]));
    assert_eq!(stats.request_counter, 2);
    assert!(stats.unreachable_urls.is_empty());
    assert!(stats.robots_excluded_urls.is_empty());
}

#[tokio::test]
async fn test_followed_url_is_fetched() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;
    let a_url = server_a.uri();
    let b_url = server_b.uri();

    mount_page(&server_a, "/", "<html><body>a</body></html>", 1).await;
    mount_page(&server_b, "/", "<html><body>b</body></html>", 1).await;

    let follow_target = server_b.uri();
    let handler = move |response: Response, _items: ItemSaver| {
        let follow_target = follow_target.clone();
        async move {
            if response.text().contains(">a<") {
                response.follow(&follow_target).await?;
            }
            anyhow::Ok(())
        }
    };

    let spider = Spider::new([server_a.uri()], handler, create_test_config()).unwrap();
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.reachable_urls.len(), 2);
    assert!(stats.reachable_urls.contains(&a_url));
    assert!(stats.reachable_urls.contains(&b_url));
    assert_eq!(stats.followed_urls.len(), 1);
    assert!(stats.followed_urls.contains(&b_url));
    assert_eq!(stats.request_counter, 2);
    assert!(stats.unreachable_urls.is_empty());
    assert!(stats.robots_excluded_urls.is_empty());
}

#[tokio::test]
async fn test_robots_unauthorized_excludes_host() {
    let server = MockServer::start().await;
    mount_robots(&server, 401, "", 1).await;
    mount_page(&server, "/", "<html></html>", 0).await;

    let mut config = create_test_config();
    config.crawler.follow_robots_txt = true;

    let spider = Spider::new([server.uri()], follow_all, config).unwrap();
    let stats = run(spider).await.unwrap();

    assert!(stats.robots_excluded_urls.contains(&server.uri()));
    assert!(stats.reachable_urls.is_empty());
    assert_eq!(stats.request_counter, 0);
}

#[tokio::test]
async fn test_robots_fetched_once_per_host() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 200, "User-agent: *\nCrawl-delay: 0.05", 1).await;
    mount_page(
        &server,
        "/",
        &format!(r#"<a href="{base}/p1">1</a><a href="{base}/p2">2</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/p1", r#"<a href="/p2">2</a>"#, 1).await;
    mount_page(&server, "/p2", r#"<a href="/">home</a>"#, 1).await;

    let cache = tempfile::tempdir().unwrap();
    let mut config = create_test_config();
    config.crawler.follow_robots_txt = true;
    config.crawler.robots_cache_folder = Some(cache.path().to_path_buf());

    let spider = Spider::new([format!("{}/", server.uri())], follow_all, config).unwrap();
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.reachable_urls.len(), 3);
    assert_eq!(stats.request_counter, 3);

    let stored: Vec<_> = std::fs::read_dir(cache.path()).unwrap().collect();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_robots_disallow_excludes_host() {
    let server = MockServer::start().await;
    mount_robots(&server, 200, "User-agent: *\nDisallow: /", 1).await;
    mount_page(&server, "/", "<html></html>", 0).await;

    let mut config = create_test_config();
    config.crawler.follow_robots_txt = true;

    let spider = Spider::new([server.uri()], follow_all, config).unwrap();
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.robots_excluded_urls.len(), 1);
    assert_eq!(stats.request_counter, 0);
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let server = MockServer::start().await;
    mount_robots(&server, 401, "", 0).await;
    mount_page(&server, "/", "<html></html>", 1).await;

    let spider = Spider::new([server.uri()], follow_all, create_test_config()).unwrap();
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.reachable_urls.len(), 1);
}

#[tokio::test]
async fn test_error_status_is_unreachable() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/missing">gone</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let spider = Spider::new([server.uri()], follow_all, create_test_config()).unwrap();
    let stats = run(spider).await.unwrap();

    let missing = format!("{}/missing", server.uri());
    assert!(stats.unreachable_urls.contains(&missing));
    assert!(stats.followed_urls.contains(&missing));
    assert_eq!(stats.reachable_urls.len(), 1);
    assert_eq!(stats.request_counter, 1);
}

#[tokio::test]
async fn test_connection_failure_is_unreachable() {
    let spider = Spider::new(["http://127.0.0.1:9/"], follow_all, create_test_config()).unwrap();
    let stats = run(spider).await.unwrap();

    assert!(stats.unreachable_urls.contains("http://127.0.0.1:9/"));
    assert_eq!(stats.request_counter, 0);
    assert_eq!(stats.average_fetch_time, Duration::ZERO);
}

#[tokio::test]
async fn test_duplicate_links_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/x">1</a><a href="/x#again">2</a><a href="/">self</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/x", r#"<a href="/">back</a><a href="/x">self</a>"#, 1).await;

    let seed = format!("{}/", server.uri());
    let spider = Spider::new([seed], follow_all, create_test_config()).unwrap();
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.reachable_urls.len(), 2);
    assert_eq!(stats.request_counter, 2);
}

#[tokio::test]
async fn test_handler_error_aborts_run() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html></html>", 1).await;

    let handler = |_response: Response, _items: ItemSaver| async move {
        Err::<(), _>(anyhow::anyhow!("cannot parse page"))
    };

    let spider = Spider::new([server.uri()], handler, create_test_config()).unwrap();
    let result = run(spider).await;

    match result {
        Err(SpiderError::Handler { url, source }) => {
            assert_eq!(url, server.uri());
            assert_eq!(source.to_string(), "cannot parse page");
        }
        other => panic!("expected handler error, got {:?}", other.map(|s| s.request_counter)),
    }
}

#[tokio::test]
async fn test_handler_error_ignored() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", &format!(r#"<a href="{base}/next">next</a>"#), 1).await;
    mount_page(&server, "/next", "<html></html>", 1).await;

    let handler = |response: Response, _items: ItemSaver| async move {
        for link in response.links() {
            response.follow(&link).await?;
        }
        Err::<(), _>(anyhow::anyhow!("always failing"))
    };

    let mut config = create_test_config();
    config.crawler.ignore_errors = true;

    let spider = Spider::new([server.uri()], handler, config).unwrap();
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.reachable_urls.len(), 2);
    assert_eq!(stats.request_counter, 2);
}

#[tokio::test]
async fn test_file_seed() {
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("page.html");
    std::fs::write(&page, "<html><head><title>Local</title></head></html>").unwrap();
    let url = url::Url::from_file_path(&page).unwrap().to_string();

    let titles = Arc::new(Mutex::new(Vec::new()));
    let seen = titles.clone();
    let handler = move |response: Response, _items: ItemSaver| {
        let seen = seen.clone();
        async move {
            if let Some(title) = response.title() {
                seen.lock().unwrap().push(title);
            }
            anyhow::Ok(())
        }
    };

    let spider = Spider::new([url.as_str()], handler, create_test_config()).unwrap();
    let stats = run(spider).await.unwrap();

    assert!(stats.reachable_urls.contains(&url));
    assert_eq!(titles.lock().unwrap().as_slice(), ["Local"]);
}

#[tokio::test]
async fn test_missing_file_seed_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::from_file_path(dir.path().join("missing.html"))
        .unwrap()
        .to_string();

    let spider = Spider::new([url.as_str()], follow_all, create_test_config()).unwrap();
    let stats = run(spider).await.unwrap();

    assert!(stats.unreachable_urls.contains(&url));
}

#[tokio::test]
async fn test_items_are_saved_and_processed() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(
        &server,
        "/",
        &format!(r#"<title>Home</title><a href="{base}/skip">skip</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/skip", "<title>Skip</title>", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let backup = dir.path().join("items.mp");
    let mut config = create_test_config();
    config.crawler.backup_filename = Some(backup.clone());

    let handler = |response: Response, items: ItemSaver| async move {
        items
            .save_item(&serde_json::json!({
                "url": response.url().as_str(),
                "title": response.title(),
            }))
            .await?;
        for link in response.links() {
            response.follow(&link).await?;
        }
        anyhow::Ok(())
    };

    let spider = Spider::new([server.uri()], handler, config)
        .unwrap()
        .item_processor(|item: serde_json::Value| {
            if item["title"] == "Skip" {
                None
            } else {
                Some(item)
            }
        });
    let stats = run(spider).await.unwrap();
    assert_eq!(stats.request_counter, 2);

    let items = read_items(&backup).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Home");
}

#[tokio::test]
async fn test_response_middleware_wraps_fetch() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/two">2</a>"#, 1).await;
    mount_page(&server, "/two", "<html></html>", 1).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counting: ResponseMiddleware = {
        let calls = calls.clone();
        Arc::new(move |inner: FetchFn| -> FetchFn {
            let calls = calls.clone();
            Arc::new(move |url: url::Url| {
                calls.fetch_add(1, Ordering::SeqCst);
                inner(url)
            })
        })
    };

    let spider = Spider::new([server.uri()], follow_all, create_test_config())
        .unwrap()
        .response_middleware(counting);
    run(spider).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_browser_fetcher_run() {
    let browser = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Rendered</title>"))
        .expect(1)
        .mount(&browser)
        .await;

    let driver = BrowserlessDriver::new(&BrowserConfig {
        endpoint: browser.uri(),
        token: None,
        find_timeout: 2000,
    })
    .unwrap();

    let titles = Arc::new(Mutex::new(Vec::new()));
    let seen = titles.clone();
    let handler = move |response: Response, _items: ItemSaver| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().extend(response.title());
            anyhow::Ok(())
        }
    };

    let spider = Spider::new(["https://example.com/"], handler, create_test_config())
        .unwrap()
        .with_fetcher(BrowserFetcher::new(driver));
    let stats = run(spider).await.unwrap();

    assert!(stats.reachable_urls.contains("https://example.com/"));
    assert_eq!(titles.lock().unwrap().as_slice(), ["Rendered"]);
}

#[tokio::test]
async fn test_statistics_timing() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html></html>", 1).await;

    let spider = Spider::new([server.uri()], follow_all, create_test_config())
        .unwrap()
        .name("timing");
    let stats = run(spider).await.unwrap();

    assert_eq!(stats.name, "timing");
    assert!(stats.total_time >= stats.average_fetch_time);
    assert!(stats.finished_at >= stats.started_at);
}

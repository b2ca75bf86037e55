use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use topic_harvester::config::{
    load_config, Config, CrawlerConfig, DomainEntry, OutputConfig, RelevanceMode, Target,
    TargetSource, UserAgentConfig,
};
use topic_harvester::crawler::{run_harvest, AcceptAll, Harvester};
use topic_harvester::output::{JsonFileSink, RecordSink};
use topic_harvester::HarvestError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with fast retries
fn create_test_config(concurrency: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            concurrency,
            request_timeout: 2000,
            max_attempts: 3,
            base_delay: 10,
            max_delay: 100,
            jitter: false,
            max_depth: 1,
            relevance: RelevanceMode::Topic,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            json_path: "./test_output.json".to_string(),
        },
        targets: vec![],
        blacklist: vec![],
    }
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html")
}

async fn mount_page(server: &MockServer, p: &str, body: impl Into<String>, expected: u64) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(html(body))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_seed_and_related_pages() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        "/home",
        r#"<html><head><title>Home</title></head><body>
            <a href="/mobile/plans">Plans</a>
            <a href="/about">About us</a>
            <a href="https://other.ch/x">Partner</a>
            <a href="javascript:void(0)">Mobile menu</a>
        </body></html>"#,
        1,
    )
    .await;
    mount_page(
        &server,
        "/mobile/plans",
        r#"<html><head><title>Mobile Plans</title>
            <meta name="description" content="Our plans"></head>
            <body><p>Unlimited data</p></body></html>"#,
        1,
    )
    .await;
    mount_page(&server, "/about", "<html><body>About</body></html>", 0).await;

    let harvester = Harvester::new(&create_test_config(4)).expect("Failed to create harvester");
    let targets = vec![Target::new(format!("{}/home", base_url), "Mobile")];

    let report = harvester.run(&targets, CancellationToken::new()).await;

    let urls: HashSet<_> = report.records.iter().map(|r| r.url.clone()).collect();
    assert_eq!(report.records.len(), 2);
    assert!(urls.contains(&format!("{}/home", base_url)));
    assert!(urls.contains(&format!("{}/mobile/plans", base_url)));

    let plans = report
        .records
        .iter()
        .find(|r| r.url.ends_with("/mobile/plans"))
        .unwrap();
    assert_eq!(plans.title, "Mobile Plans");
    assert_eq!(plans.description, "Our plans");
    assert_eq!(plans.body, "Unlimited data");
    assert_eq!(plans.source, "Mobile");

    // The javascript: candidate is rejected before any fetch
    assert_eq!(report.summary.invalid_urls, 1);
    assert_eq!(report.summary.pages, 2);
    assert_eq!(report.summary.visited, 2);
}

#[tokio::test]
async fn test_fifty_urls_with_ten_workers() {
    let server = MockServer::start().await;

    let links: String = (0..50)
        .map(|i| format!(r#"<a href="/mobile/{}">Offer {}</a>"#, i, i))
        .collect();
    mount_page(&server, "/index", format!("<body>{}</body>", links), 1).await;
    for i in 0..50 {
        mount_page(
            &server,
            &format!("/mobile/{}", i),
            format!("<html><head><title>Offer {}</title></head></html>", i),
            1,
        )
        .await;
    }

    let harvester = Harvester::new(&create_test_config(10)).unwrap();
    let targets = vec![Target::new(format!("{}/index", server.uri()), "mobile")];

    let report = harvester.run(&targets, CancellationToken::new()).await;

    let unique: HashSet<_> = report.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(report.records.len(), 51);
    assert_eq!(unique.len(), 51);
    assert_eq!(report.summary.visited, 51);
    assert_eq!(report.summary.invalid_urls, 0);
}

#[tokio::test]
async fn test_equivalent_urls_fetched_once() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        "/home",
        format!(
            r#"<body>
                <a href="/mobile/page?b=2&a=1">One</a>
                <a href="/mobile/page?a=1&b=2#details">Two</a>
                <a href="{}/mobile/page?a=1&b=2">Three</a>
            </body>"#,
            base_url
        ),
        1,
    )
    .await;
    mount_page(&server, "/mobile/page", "<body>Page</body>", 1).await;

    let harvester = Harvester::new(&create_test_config(4)).unwrap();
    let targets = vec![
        Target::new(format!("{}/home", base_url), "mobile"),
        Target::new(format!("{}/home#top", base_url), "mobile"),
    ];

    let report = harvester.run(&targets, CancellationToken::new()).await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.summary.visited, 2);
    assert!(report.summary.duplicates >= 1);
}

#[tokio::test]
async fn test_failed_url_not_refetched() {
    let server = MockServer::start().await;

    mount_page(&server, "/seed-a", r#"<a href="/mobile/gone">Gone</a>"#, 1).await;
    mount_page(&server, "/seed-b", r#"<a href="/mobile/gone">Gone</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/mobile/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let harvester = Harvester::new(&create_test_config(1)).unwrap();
    let targets = vec![
        Target::new(format!("{}/seed-a", server.uri()), "mobile"),
        Target::new(format!("{}/seed-b", server.uri()), "mobile"),
    ];

    let report = harvester.run(&targets, CancellationToken::new()).await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.summary.invalid_urls, 1);
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mobile/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/mobile/flaky",
        "<html><head><title>Back</title></head></html>",
        1,
    )
    .await;

    let harvester = Harvester::new(&create_test_config(2)).unwrap();
    let targets = vec![Target::new(format!("{}/mobile/flaky", server.uri()), "mobile")];

    let report = harvester.run(&targets, CancellationToken::new()).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].title, "Back");
    assert_eq!(report.summary.invalid_urls, 0);
}

#[tokio::test]
async fn test_blacklisted_candidates_dropped() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/home",
        r#"<a href="https://ads.tracker.example/mobile">Mobile ad</a>
           <a href="/mobile/ok">Mobile</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/mobile/ok", "<body>ok</body>", 1).await;

    let mut config = create_test_config(2);
    config.blacklist = vec![DomainEntry {
        domain: "*.tracker.example".to_string(),
    }];
    let harvester = Harvester::new(&config).unwrap();
    let targets = vec![Target::new(format!("{}/home", server.uri()), "mobile")];

    let report = harvester.run(&targets, CancellationToken::new()).await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.summary.invalid_urls, 0);
}

#[tokio::test]
async fn test_accept_all_filter() {
    let server = MockServer::start().await;

    mount_page(&server, "/home", r#"<a href="/about">About</a>"#, 1).await;
    mount_page(&server, "/about", "<body>About</body>", 1).await;

    let harvester = Harvester::new(&create_test_config(2))
        .unwrap()
        .with_filter(Arc::new(AcceptAll));
    let targets = vec![Target::new(format!("{}/home", server.uri()), "mobile")];

    let report = harvester.run(&targets, CancellationToken::new()).await;
    assert_eq!(report.records.len(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    mount_page(&server, "/home", "<body>Home</body>", 0).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let harvester = Harvester::new(&create_test_config(2)).unwrap();
    let targets = vec![Target::new(format!("{}/home", server.uri()), "mobile")];

    let report = harvester.run(&targets, cancel).await;

    assert!(report.records.is_empty());
    assert!(report.summary.cancelled);
    assert_eq!(report.summary.abandoned, 1);
    assert_eq!(report.summary.invalid_urls, 0);
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_partial_results() {
    let server = MockServer::start().await;

    let links: String = (0..20)
        .map(|i| format!(r#"<a href="/mobile/{}">Offer</a>"#, i))
        .collect();
    mount_page(&server, "/home", format!("<body>{}</body>", links), 1).await;
    Mock::given(method("GET"))
        .respond_with(html("<body>Slow offer</body>").set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let harvester = Harvester::new(&create_test_config(2)).unwrap();
    let targets = vec![Target::new(format!("{}/home", server.uri()), "mobile")];

    let report = harvester.run(&targets, cancel).await;

    assert!(report.summary.cancelled);
    assert!(report.records.len() < 21);
    assert!(report.summary.abandoned > 0);
    // Interrupted jobs are not permanent failures
    assert_eq!(report.summary.invalid_urls, 0);
}

struct FailingRegistry;

impl TargetSource for FailingRegistry {
    fn targets(&self) -> Result<Vec<Target>, HarvestError> {
        Err(HarvestError::Registry("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_registry_failure_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harvester = Harvester::new(&create_test_config(2)).unwrap();
    let result = harvester
        .harvest(&FailingRegistry, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(HarvestError::Registry(_))));
}

#[tokio::test]
async fn test_config_file_to_json_artifact() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/en/home",
        r#"<html><head><title>Home</title></head>
           <body><a href="/en/mobile">Mobile</a></body></html>"#,
        1,
    )
    .await;
    mount_page(
        &server,
        "/en/mobile",
        r#"<html><head><title>Mobile</title></head><body>Plans</body></html>"#,
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("data_objects.json");

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[crawler]
concurrency = 3
request-timeout = 2000
base-delay = 10
max-delay = 100

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
json-path = "{}"

[[target]]
url = "{}/en/home"
topic = "Mobile"
"#,
        json_path.display(),
        server.uri()
    )
    .unwrap();
    file.flush().unwrap();

    let config = load_config(file.path()).unwrap();
    let report = run_harvest(&config, CancellationToken::new()).await.unwrap();

    JsonFileSink::new(&config.output.json_path)
        .write(&report.records, &report.summary)
        .unwrap();

    let content = std::fs::read_to_string(&json_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    let entries = value.as_array().unwrap();

    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert!(entry["url"].as_str().unwrap().starts_with(&server.uri()));
        assert!(entry["data"]["title"].is_string());
        assert_eq!(entry["data"]["description"], "");
        assert_eq!(entry["source"], "Mobile");
        assert!(entry["scraped_at"].is_string());
        assert!(entry["version"].is_string());
    }
}

#[tokio::test]
async fn test_bad_target_url_counted_not_fatal() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/en/home",
        "<html><head><title>Home</title></head><body>Welcome</body></html>",
        1,
    )
    .await;

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[crawler]
concurrency = 2
request-timeout = 2000

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
json-path = "unused.json"

[[target]]
url = "{}/en/home"
topic = "Mobile"

[[target]]
url = "javascript:void(0)"
topic = "Mobile"
"#,
        server.uri()
    )
    .unwrap();
    file.flush().unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.targets.len(), 2);

    let report = run_harvest(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].title, "Home");
    assert_eq!(report.summary.targets, 2);
    assert_eq!(report.summary.invalid_urls, 1);
}

/// Serves `/home` linking to `/mobile/0..links` and holds every response for
/// `delay`. Returns the base URL and the peak number of requests in progress.
async fn start_slow_server(links: usize, delay: Duration) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let home: String = (0..links)
        .map(|i| format!(r#"<a href="/mobile/{}">Item {}</a>"#, i, i))
        .collect();
    let home = Arc::new(format!("<html><body>{}</body></html>", home));

    let peak_seen = Arc::clone(&peak);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let home = Arc::clone(&home);

            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;

                let request = String::from_utf8_lossy(&request);
                let target = request.split_whitespace().nth(1).unwrap_or("/");
                let body = if target == "/home" {
                    home.as_str().to_string()
                } else {
                    format!("<html><body>Page {}</body></html>", target)
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;

                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    (format!("http://{}", addr), peak_seen)
}

#[tokio::test]
async fn test_in_flight_requests_bounded_by_concurrency() {
    let (base_url, peak) = start_slow_server(12, Duration::from_millis(200)).await;

    let harvester = Harvester::new(&create_test_config(3)).unwrap();
    let targets = vec![Target::new(format!("{}/home", base_url), "mobile")];

    let report = harvester.run(&targets, CancellationToken::new()).await;

    assert_eq!(report.records.len(), 13);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "{} requests were in flight at once", peak);
    assert!(peak > 1, "requests never overlapped");
}

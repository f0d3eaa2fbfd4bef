//! End-to-end tests driving a real listener over TCP.
//!
//! Covers the greeting endpoint, the metrics scrape, unknown paths, and the
//! no-lost-updates property of the request counter.

use std::net::SocketAddr;
use std::time::Duration;

use hello_devops::handler::{AppState, build_router};
use hello_devops::metrics::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Get an available port for testing.
fn get_available_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a server with a fresh registry and wait until it accepts
/// connections. The returned sender keeps the accept loop alive; dropping it
/// stops the server.
async fn start_server() -> (String, mpsc::Sender<()>) {
    let port = get_available_port();
    let (server, shutdown_tx) = hello_devops::new_server(port, build_router(AppState { metrics: Metrics::new() }));
    tokio::spawn(server.run());

    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return (format!("http://{addr}"), shutdown_tx);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server did not start listening on {addr}");
}

#[tokio::test]
async fn home_returns_greeting() {
    let (base, _shutdown_tx) = start_server().await;

    let response = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "unexpected content-type: {content_type}");
    assert_eq!(response.text().await.unwrap(), "Hello, DevOps!");
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let (base, _shutdown_tx) = start_server().await;

    let response = reqwest::get(format!("{base}/unknown-path")).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn scrape_before_any_traffic_reports_no_samples() {
    let (base, _shutdown_tx) = start_server().await;

    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("# HELP requests Number of requests served"));
    assert!(body.contains("# TYPE requests counter"));
    // a counter with no label combination yet is absent from the output
    assert!(!body.contains("requests_total{"), "unexpected sample in fresh scrape: {body}");
}

#[tokio::test]
async fn scrape_after_three_hits_reports_three() {
    let (base, _shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let response = client.get(format!("{base}/")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let body = client.get(format!("{base}/metrics")).send().await.unwrap().text().await.unwrap();
    assert!(body.contains("requests_total{endpoint=\"/\"} 3"), "unexpected scrape: {body}");
}

#[tokio::test]
async fn concurrent_hits_lose_no_updates() {
    const N: usize = 50;
    let (base, _shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let mut tasks = JoinSet::new();
    for _ in 0..N {
        let client = client.clone();
        let url = format!("{base}/");
        tasks.spawn(async move { client.get(url).send().await.unwrap().status().as_u16() });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), 200);
    }

    let body = client.get(format!("{base}/metrics")).send().await.unwrap().text().await.unwrap();
    let expected = format!("requests_total{{endpoint=\"/\"}} {N}");
    assert!(body.contains(&expected), "expected `{expected}` in scrape: {body}");
}

#[tokio::test]
async fn exposition_output_is_well_formed() {
    let (base, _shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    client.get(format!("{base}/")).send().await.unwrap();
    let body = client.get(format!("{base}/metrics")).send().await.unwrap().text().await.unwrap();

    assert!(body.ends_with("# EOF\n"), "missing EOF terminator: {body}");
    for line in body.lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix("# ") {
            assert!(
                comment.starts_with("HELP ") || comment.starts_with("TYPE ") || comment == "EOF",
                "unexpected comment line: {line}"
            );
            continue;
        }
        // sample lines are `name{labels} value`
        let (name_and_labels, value) = line.rsplit_once(' ').unwrap_or_else(|| panic!("malformed sample line: {line}"));
        assert!(!name_and_labels.is_empty(), "malformed sample line: {line}");
        assert!(value.parse::<f64>().is_ok(), "non-numeric sample value: {line}");
    }
}

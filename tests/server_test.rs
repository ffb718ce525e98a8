//! HTTP tests against a live server on an ephemeral port.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use tradeq::dispatch::{DispatchConfig, FailurePolicy};
use tradeq::model::{Trade, TradeResult};
use tradeq::processor::TradeProcessor;
use tradeq::server::{AppState, handler::NDJSON, serve};

struct TestServer {
    base: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn start(max: usize, policy: FailurePolicy) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(
        TradeProcessor::new(Duration::from_millis(20)),
        DispatchConfig::new(max).unwrap().with_failure_policy(policy),
    );
    let (tx, rx) = oneshot::channel();
    tokio::spawn(serve(listener, state, async {
        let _ = rx.await;
    }));
    TestServer {
        base: format!("http://{addr}"),
        shutdown: Some(tx),
    }
}

fn parse_lines(body: &str) -> Vec<Value> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn health_reports_ok() {
    let server = start(2, FailurePolicy::FailFast).await;
    let resp = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn processes_trade_array_in_per_id_order() {
    let server = start(5, FailurePolicy::FailFast).await;
    let ids = [
        ("T-0001", "AAPL"),
        ("T-0001", "AAPL"),
        ("T-0002", "MSFT"),
        ("T-0004", "NVDA"),
        ("T-0005", "TSLA"),
        ("T-0003", "GOOG"),
        ("T-0006", "AMZN"),
        ("T-0002", "MSFT"),
        ("T-0008", "META"),
        ("T-0008", "META"),
    ];
    // Quantity tags submission order; price 1.0 makes it the notional.
    let trades: Vec<Trade> = ids
        .iter()
        .enumerate()
        .map(|(i, (id, symbol))| Trade::new(*id, *symbol, (i + 1) as f64, 1.0))
        .collect();

    let resp = reqwest::Client::new()
        .post(format!("{}/trades/process", server.base))
        .json(&trades)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap(),
        NDJSON
    );

    let body = resp.text().await.unwrap();
    let results: Vec<TradeResult> = body
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(results.len(), 10);

    let mut by_id: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in &results {
        by_id.entry(r.id.as_str()).or_default().push(r.notional);
    }
    assert_eq!(by_id["T-0001"], vec![1.0, 2.0]);
    assert_eq!(by_id["T-0002"], vec![3.0, 8.0]);
    assert_eq!(by_id["T-0008"], vec![9.0, 10.0]);
    assert!(results.iter().all(|r| r.status.to_string() == "PROCESSED"));
    assert_eq!(
        results.iter().find(|r| r.id == "T-0004").unwrap().symbol,
        "NVDA"
    );
}

#[tokio::test]
async fn ndjson_body_streams_results() {
    let server = start(2, FailurePolicy::FailFast).await;
    let body = concat!(
        r#"{"id":"T-1","symbol":"AAPL","quantity":2.0,"price":10.0}"#,
        "\n\n",
        r#"{"id":"T-2","symbol":"MSFT","quantity":1.0,"price":5.5}"#,
        "\n",
    );

    let resp = reqwest::Client::new()
        .post(format!("{}/trades/process", server.base))
        .header(reqwest::header::CONTENT_TYPE, NDJSON)
        .body(body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let lines = parse_lines(&resp.text().await.unwrap());
    assert_eq!(lines.len(), 2);
    let notional = |id: &str| {
        lines
            .iter()
            .find(|l| l["id"] == id)
            .and_then(|l| l["notional"].as_f64())
            .unwrap()
    };
    assert_eq!(notional("T-1"), 20.0);
    assert_eq!(notional("T-2"), 5.5);
}

#[tokio::test]
async fn malformed_ndjson_line_ends_with_error() {
    let server = start(2, FailurePolicy::Isolate).await;
    let body = concat!(
        r#"{"id":"T-1","symbol":"AAPL","quantity":1.0,"price":1.0}"#,
        "\n",
        "this is not a trade\n",
        r#"{"id":"T-2","symbol":"MSFT","quantity":1.0,"price":1.0}"#,
        "\n",
    );

    let resp = reqwest::Client::new()
        .post(format!("{}/trades/process", server.base))
        .header(reqwest::header::CONTENT_TYPE, NDJSON)
        .body(body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let lines = parse_lines(&resp.text().await.unwrap());
    let last = lines.last().unwrap();
    assert!(last["error"].is_string(), "last line: {last}");
    assert!(lines.iter().all(|l| l["id"] != "T-2"));
}

#[tokio::test]
async fn fail_fast_body_ends_with_processing_error() {
    let server = start(1, FailurePolicy::FailFast).await;
    // A single slot runs the trades one after another in submission order.
    let trades = vec![
        Trade::new("T-1", "AAPL", 1.0, 1.0),
        Trade::new("T-2", "MSFT", f64::MAX, 10.0),
        Trade::new("T-3", "GOOG", 1.0, 1.0),
        Trade::new("T-4", "NVDA", 1.0, 1.0),
    ];

    let resp = reqwest::Client::new()
        .post(format!("{}/trades/process", server.base))
        .json(&trades)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let lines = parse_lines(&resp.text().await.unwrap());
    assert_eq!(lines.len(), 2, "lines: {lines:?}");
    assert_eq!(lines[0]["id"], "T-1");
    let error = lines[1]["error"].as_str().unwrap();
    assert!(error.contains("T-2"), "{error}");
    assert!(error.contains("not finite"), "{error}");
}

#[tokio::test]
async fn isolate_body_continues_after_processing_error() {
    let server = start(1, FailurePolicy::Isolate).await;
    let trades = vec![
        Trade::new("T-1", "AAPL", 1.0, 1.0),
        Trade::new("T-2", "MSFT", f64::MAX, 10.0),
        Trade::new("T-3", "GOOG", 3.0, 1.0),
    ];

    let resp = reqwest::Client::new()
        .post(format!("{}/trades/process", server.base))
        .json(&trades)
        .send()
        .await
        .unwrap();

    let lines = parse_lines(&resp.text().await.unwrap());
    assert_eq!(lines.len(), 3, "lines: {lines:?}");
    assert!(lines[1]["error"].as_str().unwrap().contains("T-2"));
    assert_eq!(lines[2]["id"], "T-3");
    assert_eq!(lines[2]["notional"], 3.0);
}

#[tokio::test]
async fn malformed_array_is_rejected() {
    let server = start(2, FailurePolicy::FailFast).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/trades/process", server.base))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(r#"[{"id":"T-1"}]"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_array_yields_empty_body() {
    let server = start(2, FailurePolicy::FailFast).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/trades/process", server.base))
        .json(&Vec::<Trade>::new())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(resp.text().await.unwrap().is_empty());
}

//! Request handlers for the trade endpoints.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt as _, TryStreamExt as _};
use serde::Serialize;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use super::AppState;
use crate::error::Error;
use crate::model::{Trade, WorkItem};

pub const NDJSON: &str = "application/x-ndjson";

/// Upper bound for a buffered JSON array request body.
const MAX_JSON_BODY: usize = 16 * 1024 * 1024;
const MAX_LINE: usize = 64 * 1024;

#[derive(Serialize)]
struct ErrorLine {
    error: String,
}

/// `POST /trades/process`
///
/// Accepts either a JSON array of trades or newline-delimited JSON. NDJSON
/// bodies are parsed as they stream in, so trades are dispatched before the
/// upload finishes. Results stream back as NDJSON in completion order. A
/// failed trade is written as an `{"error": ...}` line; under fail-fast, and
/// for any inbound failure, that line is the last one in the body.
pub async fn process_trades(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let results = if is_ndjson(&headers) {
        debug!("dispatching streamed ndjson body");
        state.dispatcher.dispatch(ndjson_trades(body))
    } else {
        let bytes = match axum::body::to_bytes(body, MAX_JSON_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("failed to read body: {e}"))
                    .into_response();
            }
        };
        let trades: Vec<Trade> = match serde_json::from_slice(&bytes) {
            Ok(trades) => trades,
            Err(e) => {
                warn!(error = %e, "rejecting malformed trade array");
                return (StatusCode::BAD_REQUEST, format!("invalid trade array: {e}"))
                    .into_response();
            }
        };
        debug!(count = trades.len(), "dispatching trade array");
        let items = trades
            .into_iter()
            .map(|trade| Ok::<_, Error>(WorkItem::from(trade)));
        state.dispatcher.dispatch(futures::stream::iter(items))
    };

    let body = results.map(|result| {
        let line = match result {
            Ok(trade_result) => ndjson_line(&trade_result),
            Err(e) => ndjson_line(&ErrorLine {
                error: e.to_string(),
            }),
        };
        Ok::<_, std::convert::Infallible>(line)
    });

    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(body)).into_response()
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

fn is_ndjson(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(NDJSON) || ct.starts_with("application/jsonl"))
}

/// Decode a streaming NDJSON body into work items, one trade per line.
///
/// Blank lines are skipped. A line that does not parse fails the stream.
pub fn ndjson_trades(body: Body) -> impl Stream<Item = Result<WorkItem<Trade>, Error>> + Send {
    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
    FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE))
        .try_filter(|line| futures::future::ready(!line.trim().is_empty()))
        .map(|line| -> Result<WorkItem<Trade>, Error> {
            let line = line.map_err(|e| Error::Other(format!("failed to read line: {e}")))?;
            let trade: Trade = serde_json::from_str(&line)?;
            Ok(WorkItem::from(trade))
        })
}

fn ndjson_line<T: Serialize>(value: &T) -> Bytes {
    let mut line = serde_json::to_vec(value)
        .unwrap_or_else(|e| format!(r#"{{"error":"failed to encode result: {e}"}}"#).into_bytes());
    line.push(b'\n');
    Bytes::from(line)
}

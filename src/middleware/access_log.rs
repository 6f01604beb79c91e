//! Access logging.
//!
//! [`log_access`] emits a `started` event before the wrapped handler runs
//! and a `completed` event once it returns. The completion event comes from
//! a drop guard, so it is also written when the client disconnects and
//! the request future is dropped.
//!
//! Severity follows the status class: 5xx is `ERROR`, 4xx is `WARN`, and
//! anything else is `INFO`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Level;

use super::request_id::request_id_of;

#[must_use]
pub fn status_level(status: StatusCode) -> Level {
    match status.as_u16() {
        500.. => Level::ERROR,
        400..=499 => Level::WARN,
        _ => Level::INFO,
    }
}

pub async fn log_access(request: Request, next: Next) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.to_string());

    let mut completion = Completion {
        request_id: request_id_of(&request),
        method: request.method().clone(),
        uri: request.uri().clone(),
        start: Instant::now(),
        status: None,
    };

    tracing::info!(
        remote_addr = %remote_addr,
        request_id = %completion.request_id,
        method = %completion.method,
        uri = %completion.uri,
        "started {} {}",
        completion.method,
        completion.uri
    );

    let response = next.run(request).await;
    completion.status = Some(response.status());
    response
}

struct Completion {
    request_id: String,
    method: Method,
    uri: Uri,
    start: Instant,
    status: Option<StatusCode>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        match self.status {
            Some(status) => log_completed(&self.request_id, status, elapsed),
            None => tracing::warn!(
                request_id = %self.request_id,
                method = %self.method,
                uri = %self.uri,
                latency_ms = millis(elapsed),
                "cancelled after {elapsed:?}, client went away"
            ),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}

fn log_completed(request_id: &str, status: StatusCode, elapsed: Duration) {
    let code = status.as_u16();
    let text = status.canonical_reason().unwrap_or("");
    let latency_ms = millis(elapsed);

    // tracing levels must be known at the call site
    match status_level(status) {
        Level::ERROR => tracing::error!(
            request_id = %request_id,
            status = code,
            latency_ms,
            "completed with {code} {text} in {elapsed:?}"
        ),
        Level::WARN => tracing::warn!(
            request_id = %request_id,
            status = code,
            latency_ms,
            "completed with {code} {text} in {elapsed:?}"
        ),
        _ => tracing::info!(
            request_id = %request_id,
            status = code,
            latency_ms,
            "completed with {code} {text} in {elapsed:?}"
        ),
    }
}

//! Middleware wrapped around every route.
//!
//! Layer order, outermost first:
//!
//! 1. [`request_id::tag_request`] assigns the correlation id.
//! 2. [`access_log::log_access`] records start and completion.
//! 3. [`catch_panic`] turns a handler panic into a JSON 500.
//! 4. CORS, allowing every origin.
//! 5. [`json_payload_too_large`] rewrites the body limit's rejection.
//! 6. The request body limit.
//! 7. [`auth::require_credential`], on private routes only.
//!
//! See [`server::build_router`](crate::server::build_router) for the wiring.

pub mod access_log;
pub mod auth;
pub mod request_id;

use std::any::Any;

use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use crate::respond;

fn panic_message(err: &(dyn Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = %panic_message(&*err), "handler panicked");
    respond::error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

#[must_use]
pub fn catch_panic() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response)
}

/// `Access-Control-Allow-Origin: *` on every response, with preflight
/// support for the methods and headers the route table uses.
#[must_use]
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static(request_id::REQUEST_ID_HEADER)])
}

/// Replace the body limit's plain-text 413 with the JSON error envelope.
/// A 413 that is already JSON (relayed from the dispatcher) passes through.
pub async fn json_payload_too_large(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if is_json {
        return response;
    }
    respond::error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
}

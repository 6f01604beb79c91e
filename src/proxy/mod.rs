//! Reverse-proxy dispatch.
//!
//! Each route is served by a [`Dispatcher`] bound to one upstream. The
//! [`forward`] handler relays the inbound method, headers and body to that
//! upstream and streams its status, headers and body back unchanged.
//! Neither direction is buffered.
//!
//! Failures never leave the client hanging: a bad upstream URI becomes a
//! 500, a refused connection or an expired timeout becomes a 502, and a
//! streamed request body that outgrows the limit becomes a 413. Once the
//! upstream headers are relayed, a body that stalls for longer than the
//! timeout is cut off.

pub mod body;
pub mod headers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::uri::InvalidUri;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::middleware::request_id::request_id_of;
use crate::respond;
use crate::server::HttpClient;
use crate::upstream::{Service, Upstream};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("cannot build {service} upstream URI: {source}")]
    InvalidUri {
        service: Service,
        #[source]
        source: InvalidUri,
    },

    #[error("cannot build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("{service} upstream unreachable: {source}")]
    Unreachable {
        service: Service,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("{service} upstream did not respond within {timeout:?}")]
    Timeout { service: Service, timeout: Duration },

    #[error("request body for {service} upstream exceeded the size limit")]
    BodyTooLarge { service: Service },
}

impl ProxyError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUri { .. } | Self::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unreachable { .. } | Self::Timeout { .. } => StatusCode::BAD_GATEWAY,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Client-facing message; internal detail stays in the logs.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidUri { .. } | Self::Request(_) => "internal server error",
            Self::Unreachable { .. } => "upstream unreachable",
            Self::Timeout { .. } => "upstream timed out",
            Self::BodyTooLarge { .. } => "request body too large",
        }
    }

    fn from_send(service: Service, source: hyper_util::client::legacy::Error) -> Self {
        if is_length_limit(&source) {
            Self::BodyTooLarge { service }
        } else {
            Self::Unreachable { service, source }
        }
    }
}

/// Whether the body limit tripped somewhere down `err`'s source chain.
/// A chunked body has no declared length, so the limit only fires while
/// the client streams it to the upstream.
fn is_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        respond::error(self.status(), self.public_message())
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: HttpClient,
    upstream: Arc<Upstream>,
    timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(client: HttpClient, upstream: Arc<Upstream>, timeout: Duration) -> Self {
        Self {
            client,
            upstream,
            timeout,
        }
    }

    #[must_use]
    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// Forward `request` and return the upstream response with its body
    /// still streaming. `timeout` bounds the wait for response headers and
    /// then every gap between body frames.
    pub async fn dispatch(&self, request: Request) -> Result<Response, ProxyError> {
        let service = self.upstream.service();
        let request_id = request_id_of(&request);
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let (parts, body) = request.into_parts();

        let uri = self
            .upstream
            .request_uri(parts.uri.path(), parts.uri.query())
            .map_err(|source| ProxyError::InvalidUri { service, source })?;

        let forwarded_headers = headers::build_forwarded_headers(
            &parts.headers,
            client_ip.as_deref(),
            &self.upstream,
            &request_id,
        );

        let mut builder = hyper::Request::builder().method(parts.method).uri(uri);
        if let Some(h) = builder.headers_mut() {
            *h = forwarded_headers;
        }
        let outbound = builder.body(body)?;

        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.client.request(outbound))
            .await
            .map_err(|_| ProxyError::Timeout {
                service,
                timeout: self.timeout,
            })?
            .map_err(|source| ProxyError::from_send(service, source))?;

        tracing::debug!(
            request_id = %request_id,
            upstream = %self.upstream.authority(),
            status = response.status().as_u16(),
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "upstream responded"
        );

        let (mut parts, body) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(
            parts,
            body::idle_bounded(body, self.timeout, service),
        ))
    }
}

pub async fn forward(State(dispatcher): State<Dispatcher>, request: Request) -> Response {
    let request_id = request_id_of(&request);

    match dispatcher.dispatch(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                upstream = %dispatcher.upstream(),
                error = %e,
                "proxy dispatch failed"
            );
            e.into_response()
        }
    }
}

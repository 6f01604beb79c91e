//! Header construction for forwarded requests and relayed responses.
//!
//! [`build_forwarded_headers`] clones the client headers, strips
//! hop-by-hop headers, rewrites `Host` to the upstream authority, and
//! adds proxy metadata (`X-Forwarded-For`, `X-Real-IP`,
//! `X-Forwarded-Host`, `X-Forwarded-Proto`, `Via`, `X-Request-ID`).

use std::sync::LazyLock;

use axum::http::header::{CONNECTION, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::upstream::Upstream;

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Remove hop-by-hop headers, including any listed in `Connection`.
///
/// `content-length` is kept: bodies are streamed through unchanged.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| name.trim().parse::<HeaderName>().ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: Option<&str>,
    upstream: &Upstream,
    request_id: &str,
) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);

    if let Ok(val) = HeaderValue::from_str(upstream.authority()) {
        headers.insert(HOST, val);
    }

    // X-Forwarded-For: append to chain
    if let Some(client_ip) = client_ip {
        let xff = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map_or_else(
                || client_ip.to_string(),
                |existing| format!("{existing}, {client_ip}"),
            );
        if let Ok(val) = HeaderValue::from_str(&xff) {
            headers.insert("x-forwarded-for", val);
        }

        // X-Real-IP (first IP in chain)
        let real_ip = xff.split(',').next().unwrap_or(client_ip).trim();
        if let Ok(val) = HeaderValue::from_str(real_ip) {
            headers.insert("x-real-ip", val);
        }
    }

    if let Some(original_host) = original.get(HOST) {
        headers.insert("x-forwarded-host", original_host.clone());
    }

    // The gateway itself only listens on plain HTTP.
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    headers.insert("via", HeaderValue::from_static("1.1 gatehouse"));

    if let Ok(val) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, val);
    }

    headers
}

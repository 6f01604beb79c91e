//! Axum server setup, gateway state, and graceful shutdown.
//!
//! Contains [`GatewayState`] (route table, resolved upstreams, HTTP client
//! and credential verifier, all built once at startup), [`build_router`]
//! for turning the route table into an Axum router wrapped in the fixed
//! middleware stack, [`build_http_client`] for the connection-pooled hyper
//! client, and [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{on, MethodRouter};
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::model::Config;
use crate::error::GatewayError;
use crate::middleware::auth::{self, AuthGate, CredentialVerifier};
use crate::middleware::{self as mw, access_log, request_id};
use crate::proxy::{self, Dispatcher};
use crate::respond;
use crate::routes::RouteTable;
use crate::upstream::Upstreams;

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Body>;

pub struct GatewayState {
    pub routes: RouteTable,
    pub upstreams: Upstreams,
    pub http_client: HttpClient,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub timeout: Duration,
    pub max_body: usize,
}

impl GatewayState {
    /// Resolve every upstream `routes` needs from `config`. Fails on the
    /// first missing or malformed address.
    pub fn from_config(
        config: &Config,
        routes: RouteTable,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self, GatewayError> {
        let upstreams = Upstreams::resolve(&config.upstreams, &routes)?;
        Ok(Self {
            routes,
            upstreams,
            http_client: build_http_client(),
            verifier,
            timeout: Duration::from_millis(config.proxy.timeout_ms),
            max_body: config.proxy.max_body,
        })
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

/// Build the router for every entry in the route table.
///
/// Entries sharing a path are merged into one method router. A method
/// that is not registered for a known path gets the 404 fallback, and
/// private entries are wrapped in the authentication gate.
pub fn build_router(state: &GatewayState) -> Router {
    let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();

    for entry in state.routes.entries() {
        let Some(upstream) = state.upstreams.get(entry.service) else {
            tracing::warn!(path = %entry.path, service = %entry.service, "no upstream resolved, route skipped");
            continue;
        };
        let Some(filter) = entry.method_filter() else {
            continue;
        };

        let dispatcher = Dispatcher::new(
            state.http_client.clone(),
            Arc::clone(upstream),
            state.timeout,
        );
        let mut method_router: MethodRouter = on(filter, proxy::forward).with_state(dispatcher);

        if entry.is_private() {
            let gate = AuthGate::new(Arc::clone(&state.verifier), entry.required_roles());
            method_router =
                method_router.route_layer(from_fn_with_state(gate, auth::require_credential));
        }

        let merged = match by_path.remove(&entry.path) {
            Some(existing) => existing.merge(method_router),
            None => method_router,
        };
        by_path.insert(entry.path.clone(), merged);
    }

    let router = by_path
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            router.route(&path, method_router.fallback(respond::not_found))
        });

    with_middleware(router, state.max_body)
}

/// Wrap `router` in the gateway's fixed middleware stack. Each
/// `Router::layer` call wraps everything added before it, so the layers
/// below run bottom to top: request id outermost, body limit innermost.
pub fn with_middleware(router: Router, max_body: usize) -> Router {
    router
        .fallback(respond::not_found)
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(from_fn(mw::json_payload_too_large))
        .layer(mw::cors())
        .layer(mw::catch_panic())
        .layer(from_fn(access_log::log_access))
        .layer(from_fn(request_id::tag_request))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

//! `gatehouse run`: start the gateway.
//!
//! Loads configuration from a file (explicit or auto-detected) or falls
//! back to defaults, applies CLI and environment overrides, validates the
//! result, then serves the standard route table until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::{self, validation};
use crate::error::GatewayError;
use crate::logging;
use crate::middleware::auth::PresenceVerifier;
use crate::routes::RouteTable;
use crate::server::{self, GatewayState};

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    let (config, source_name) = load_config(&args).await?;

    logging::init(
        config.log_level,
        logging::resolve_format(args.pretty, args.json),
    );

    let routes = RouteTable::standard();
    validation::validate(&config, &routes)
        .map_err(|errors| GatewayError::ConfigValidation { errors })?;

    let addr = validation::parse_bind_addr(&config.bind_addr).map_err(|reason| {
        GatewayError::BindAddress {
            addr: config.bind_addr.clone(),
            reason,
        }
    })?;

    let state = GatewayState::from_config(&config, routes, Arc::new(PresenceVerifier))?;
    for entry in state.routes.entries() {
        if let Some(upstream) = state.upstreams.get(entry.service) {
            tracing::debug!(path = %entry.path, upstream = %upstream, "route registered");
        }
    }
    let route_count = state.routes.len();
    let router = server::build_router(&state);

    // Hostnames resolve here.
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .map_err(|e| GatewayError::BindAddress {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
    let local = listener.local_addr().map_err(|e| GatewayError::BindAddress {
        addr: addr.clone(),
        reason: e.to_string(),
    })?;

    tracing::info!(
        addr = %local,
        routes = route_count,
        config = source_name,
        "gatehouse started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    tracing::info!("gatehouse stopped");
    Ok(())
}

/// Load the file config (or defaults) and layer the CLI/env overrides on
/// top. Returns the config with the name of the source it came from.
pub async fn load_config(args: &RunArgs) -> Result<(Config, &'static str), GatewayError> {
    let (mut config, source_name) = match config::resolve_source(args.config.as_deref()).await? {
        Some(source) => (source.load().await?, source.name()),
        None => (Config::default(), "defaults"),
    };
    args.apply_overrides(&mut config);
    Ok((config, source_name))
}

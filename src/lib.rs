//! Gatehouse is the API gateway in front of the auth, user and basket
//! services.
//!
//! It accepts client HTTP requests, tags each with a fresh request id,
//! logs it, rejects unauthenticated calls to `/private/*` routes, and
//! streams everything else to the backend service that owns the route.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, init, routes).
//! - [`config`] -- Configuration loading and validation via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`error`] -- Process-level error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`middleware`] -- Request id tagging, access logging, the
//!   authentication gate, CORS and panic recovery.
//! - [`proxy`] -- Streaming request forwarding and header rewriting.
//! - [`respond`] -- JSON response helpers.
//! - [`routes`] -- The route table: path, methods, upstream and access.
//! - [`server`] -- Axum router construction, shared state, HTTP client, and
//!   graceful shutdown.
//! - [`upstream`] -- Backend services and their resolved addresses.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `toml` | TOML config file support _(enabled by default)_ |
//! | `yaml` | YAML config file support |
//! | `json` | JSON config file support |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod respond;
pub mod routes;
pub mod server;
pub mod upstream;

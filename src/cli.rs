//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, init, routes), and their associated
//! argument structs. Every `run` flag has an environment variable
//! equivalent for container deployments, and running with no subcommand
//! is the same as `gatehouse run`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::model::Config;
use crate::config::sources::Format;
use crate::error::GatewayError;
use crate::upstream::Service;

#[derive(Parser)]
#[command(
    name = "gatehouse",
    version,
    about = "API gateway for the auth, user and basket services",
    propagate_version = true,
    args_conflicts_with_subcommands = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        gatehouse init                       Create a starter config\n  \
        gatehouse                            Start with ./gatehouse.toml\n  \
        gatehouse run -c prod.toml           Start with a specific config\n  \
        gatehouse routes                     Show the route table"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway (the default)
    Run(RunArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Generate a starter config file
    Init(InitArgs),

    /// Print the route table
    Routes,
}

// Flattened into `Cli` as well, so no command-level attributes here.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Config file path (.toml, .yaml, .json)
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address (host:port, or :port for all interfaces)
    #[arg(short, long, env = "BIND_ADDR")]
    pub bind: Option<String>,

    /// Log level
    #[arg(short, long, env = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Upstreams --
    /// Auth service address
    #[arg(long, env = "AUTH_SERVICE_ADDR", help_heading = "Upstreams")]
    pub auth_addr: Option<String>,

    /// User service address
    #[arg(long, env = "USER_SERVICE_ADDR", help_heading = "Upstreams")]
    pub user_addr: Option<String>,

    /// Basket service address
    #[arg(long, env = "BASKET_SERVICE_ADDR", help_heading = "Upstreams")]
    pub basket_addr: Option<String>,

    // -- Tuning --
    /// Upstream response timeout in milliseconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", help_heading = "Tuning")]
    pub timeout: Option<u64>,

    /// Max request body size in bytes
    #[arg(long, env = "MAX_BODY_SIZE", help_heading = "Tuning")]
    pub max_body: Option<usize>,
}

impl RunArgs {
    /// Apply every flag (or env var) that was given on top of `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.bind_addr.clone_from(bind);
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        for (service, addr) in [
            (Service::Auth, &self.auth_addr),
            (Service::User, &self.user_addr),
            (Service::Basket, &self.basket_addr),
        ] {
            if let Some(addr) = addr {
                config.upstreams.set(service, addr.clone());
            }
        }
        if let Some(timeout) = self.timeout {
            config.proxy.timeout_ms = timeout;
        }
        if let Some(max_body) = self.max_body {
            config.proxy.max_body = max_body;
        }
    }
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        gatehouse init                            Minimal config (toml)\n  \
        gatehouse init --full                     Every option, documented\n  \
        gatehouse init -f yaml -o gatehouse.yaml  YAML format")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "toml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include full documentation as comments
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "gatehouse.toml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    /// The serde backend for this format, if it was compiled in.
    pub fn backend(self) -> Result<Format, GatewayError> {
        Format::from_extension(self.extension())
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

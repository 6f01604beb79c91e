//! `gatehouse init`: generate a starter configuration file.
//!
//! The minimal config is the default [`Config`] with local upstream
//! addresses, serialized in the requested format. `--full` writes a
//! documented template instead.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::config::model::{Config, UpstreamAddrs};
use crate::error::GatewayError;

pub fn execute(args: &InitArgs) -> Result<(), GatewayError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("gatehouse.{}", args.format.extension())));

    if output.exists() {
        return Err(GatewayError::FileExists { path: output });
    }

    let content = if args.full {
        full_template(args.format).to_string()
    } else {
        minimal(args.format)?
    };

    std::fs::write(&output, content)?;
    println!("Created {}", output.display());
    Ok(())
}

/// Defaults plus an address for every upstream on localhost.
#[must_use]
pub fn starter_config() -> Config {
    Config {
        upstreams: UpstreamAddrs {
            auth: Some("127.0.0.1:8081".into()),
            user: Some("127.0.0.1:8082".into()),
            basket: Some("127.0.0.1:8083".into()),
        },
        ..Config::default()
    }
}

fn minimal(format: ConfigFormat) -> Result<String, GatewayError> {
    let backend = format.backend()?;
    backend
        .serialize(&starter_config())
        .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string())))
}

const fn full_template(format: ConfigFormat) -> &'static str {
    match format {
        ConfigFormat::Toml => TOML_FULL,
        ConfigFormat::Yaml => YAML_FULL,
        ConfigFormat::Json => JSON_FULL,
    }
}

const TOML_FULL: &str = r#"# Gatehouse config
#
# Every value except the upstream addresses is shown at its default.
# Each setting can also be given on the command line or in the
# environment (see `gatehouse run --help`).

# Listen address as host:port ("localhost:8080" works); a bare ":port"
# binds all interfaces.
bind_addr = ":8080"

# trace | debug | info | warn | error
log_level = "debug"

# Backend services, as host:port or a full http(s) URL. All three are
# required by the built-in route table.
[upstreams]
auth = "127.0.0.1:8081"
user = "127.0.0.1:8082"
basket = "127.0.0.1:8083"

[proxy]
# How long to wait for an upstream's response headers before answering 502,
# and the longest pause allowed inside a relayed response body.
timeout_ms = 5000
# Largest accepted request body in bytes; larger bodies get 413.
max_body = 1048576
"#;

const YAML_FULL: &str = r#"# Gatehouse config
#
# Every value except the upstream addresses is shown at its default.
# Each setting can also be given on the command line or in the
# environment (see `gatehouse run --help`).

# Listen address; a bare ":port" binds all interfaces.
bind_addr: ":8080"

# trace | debug | info | warn | error
log_level: debug

# Backend services, as host:port or a full http(s) URL. All three are
# required by the built-in route table.
upstreams:
  auth: "127.0.0.1:8081"
  user: "127.0.0.1:8082"
  basket: "127.0.0.1:8083"

proxy:
  # How long to wait for an upstream's response headers before answering 502.
  timeout_ms: 5000
  # Largest accepted request body in bytes; larger bodies get 413.
  max_body: 1048576
"#;

const JSON_FULL: &str = r#"{
  "bind_addr": ":8080",
  "log_level": "debug",
  "upstreams": {
    "auth": "127.0.0.1:8081",
    "user": "127.0.0.1:8082",
    "basket": "127.0.0.1:8083"
  },
  "proxy": {
    "timeout_ms": 5000,
    "max_body": 1048576
  }
}
"#;

//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a [`Config`] (after overrides) for
//! problems that would otherwise surface only at request time: an
//! unparseable bind address, malformed or missing upstream addresses, and
//! zero-valued proxy limits. It collects every problem rather than
//! stopping at the first, each with an optional suggestion.

use super::model::Config;
use crate::error::ValidationError;
use crate::routes::RouteTable;
use crate::upstream::{Service, Upstream};

/// Normalize a bind address to `host:port`. A bare `:port` binds every
/// interface. The host may be a name (`localhost`), resolved when the
/// listener binds; IPv6 literals need brackets.
pub fn parse_bind_addr(addr: &str) -> Result<String, String> {
    let addr = addr.trim();
    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(format!("'{addr}' has no port"));
    };
    if port.parse::<u16>().is_err() {
        return Err(format!("'{port}' in '{addr}' is not a port number"));
    }
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    let bracketed = host.starts_with('[') && host.ends_with(']');
    if host.contains(':') && !bracketed {
        return Err(format!("'{addr}' needs brackets around the IPv6 host"));
    }
    Ok(format!("{host}:{port}"))
}

pub fn validate(config: &Config, routes: &RouteTable) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(msg) = parse_bind_addr(&config.bind_addr) {
        errors.push(ValidationError {
            section: "(root)".into(),
            field: "bind_addr".into(),
            message: msg,
            suggestion: Some("use a form like 'localhost:8080', '127.0.0.1:8080' or ':8080'".into()),
        });
    }

    for service in Service::ALL {
        let required = routes.services().any(|s| s == service);
        match config.upstreams.get(service) {
            Some(addr) => {
                if let Err(msg) = Upstream::parse(service, addr) {
                    errors.push(ValidationError {
                        section: "upstreams".into(),
                        field: service.name().into(),
                        message: msg,
                        suggestion: Some("expected host:port or an http(s) URL".into()),
                    });
                }
            }
            None if required => errors.push(ValidationError {
                section: "upstreams".into(),
                field: service.name().into(),
                message: "no address configured".into(),
                suggestion: Some(format!(
                    "set upstreams.{0} or pass --{0}-addr",
                    service.name()
                )),
            }),
            None => {}
        }
    }

    if config.proxy.timeout_ms == 0 {
        errors.push(ValidationError {
            section: "proxy".into(),
            field: "timeout_ms".into(),
            message: "must be greater than zero".into(),
            suggestion: None,
        });
    }

    if config.proxy.max_body == 0 {
        errors.push(ValidationError {
            section: "proxy".into(),
            field: "max_body".into(),
            message: "must be greater than zero".into(),
            suggestion: None,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config, routes: &RouteTable) -> String {
    let mut lines = vec![
        format!("  bind:    {}", config.bind_addr),
        format!("  timeout: {}ms", config.proxy.timeout_ms),
        format!("  {} routes\n", routes.len()),
    ];

    for entry in routes.entries() {
        let target = config
            .upstreams
            .get(entry.service)
            .and_then(|addr| Upstream::parse(entry.service, addr).ok())
            .map_or_else(|| "unresolved".to_string(), |u| u.base().to_string());
        let methods: Vec<&str> = entry.methods.iter().map(|m| m.as_str()).collect();
        let access = if entry.is_private() { "private" } else { "public" };

        lines.push(format!(
            "  {} {}  -> {} ({access})",
            methods.join(","),
            entry.path,
            target
        ));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}

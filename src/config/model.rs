//! Serde data structures for the Gatehouse configuration file.
//!
//! Contains [`Config`] (the root), [`UpstreamAddrs`] and [`ProxySettings`].
//! All types derive `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing.

use serde::{Deserialize, Serialize};

use crate::cli::LogLevel;
use crate::upstream::Service;

const fn default_timeout_ms() -> u64 {
    5000
}

const fn default_max_body() -> usize {
    1_048_576
}

fn default_bind_addr() -> String {
    ":8080".to_string()
}

const fn default_log_level() -> LogLevel {
    LogLevel::Debug
}

fn is_default_proxy(v: &ProxySettings) -> bool {
    v.timeout_ms == default_timeout_ms() && v.max_body == default_max_body()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default)]
    pub upstreams: UpstreamAddrs,

    #[serde(default, skip_serializing_if = "is_default_proxy")]
    pub proxy: ProxySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
            upstreams: UpstreamAddrs::default(),
            proxy: ProxySettings::default(),
        }
    }
}

/// Raw `host:port` (or URL) strings for each backend service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamAddrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket: Option<String>,
}

impl UpstreamAddrs {
    #[must_use]
    pub fn get(&self, service: Service) -> Option<&str> {
        match service {
            Service::Auth => self.auth.as_deref(),
            Service::User => self.user.as_deref(),
            Service::Basket => self.basket.as_deref(),
        }
    }

    pub fn set(&mut self, service: Service, addr: String) {
        match service {
            Service::Auth => self.auth = Some(addr),
            Service::User => self.user = Some(addr),
            Service::Basket => self.basket = Some(addr),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxySettings {
    /// Upper bound on waiting for upstream response headers, in milliseconds.
    /// Once headers are relayed, also the longest gap allowed between body
    /// frames before the relayed body is cut off.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Inbound request body limit in bytes.
    #[serde(default = "default_max_body")]
    pub max_body: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_body: default_max_body(),
        }
    }
}

//! Backend services and their resolved network addresses.
//!
//! Configured addresses are opaque `host:port` strings (a full `http://`
//! or `https://` URL is also accepted). [`Upstream::parse`] turns one into
//! a base URL with a valid authority, and [`Upstreams::resolve`] does so
//! for every service the route table references, failing at startup
//! rather than at request time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::uri::{InvalidUri, Uri};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::model::UpstreamAddrs;
use crate::error::GatewayError;
use crate::routes::RouteTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Auth,
    User,
    Basket,
}

impl Service {
    pub const ALL: [Self; 3] = [Self::Auth, Self::User, Self::Basket];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::User => "user",
            Self::Basket => "basket",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Upstream {
    service: Service,
    base: Url,
    authority: String,
}

impl Upstream {
    /// Parse a configured address. The error is a human-readable reason.
    pub fn parse(service: Service, addr: &str) -> Result<Self, String> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err("address is empty".into());
        }

        let candidate = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };

        let base = Url::parse(&candidate).map_err(|e| format!("not a valid address ({e})"))?;

        let scheme = base.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(format!(
                "unsupported scheme '{scheme}' (expected http or https)"
            ));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err("address must not carry a query or fragment".into());
        }

        let host = base
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| "address has no host".to_string())?;
        let authority = base
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));

        Ok(Self {
            service,
            base,
            authority,
        })
    }

    #[must_use]
    pub const fn service(&self) -> Service {
        self.service
    }

    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// `host[:port]`, used to rewrite the forwarded `Host` header.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Join the inbound path (and query) onto this upstream's base URL.
    pub fn request_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, InvalidUri> {
        let joined = join_path(self.base.path(), path);
        let uri = match query {
            Some(q) => format!(
                "{}://{}{joined}?{q}",
                self.base.scheme(),
                self.authority
            ),
            None => format!("{}://{}{joined}", self.base.scheme(), self.authority),
        };
        uri.parse()
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.service, self.base)
    }
}

fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Resolved upstreams, keyed by service. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Upstreams {
    by_service: HashMap<Service, Arc<Upstream>>,
}

impl Upstreams {
    /// Resolve every service referenced by `routes`. A referenced service
    /// with no address, or with an unparseable one, is an error.
    pub fn resolve(addrs: &UpstreamAddrs, routes: &RouteTable) -> Result<Self, GatewayError> {
        let mut by_service = HashMap::new();

        for service in routes.services() {
            if by_service.contains_key(&service) {
                continue;
            }
            let addr = addrs
                .get(service)
                .ok_or(GatewayError::MissingUpstream(service.name()))?;
            let upstream =
                Upstream::parse(service, addr).map_err(|reason| GatewayError::UpstreamAddress {
                    service: service.name(),
                    addr: addr.to_string(),
                    reason,
                })?;
            by_service.insert(service, Arc::new(upstream));
        }

        Ok(Self { by_service })
    }

    #[must_use]
    pub fn get(&self, service: Service) -> Option<&Arc<Upstream>> {
        self.by_service.get(&service)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_service.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_service.is_empty()
    }
}

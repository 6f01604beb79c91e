//! The static route table.
//!
//! A [`RouteTable`] is an ordered list of [`RouteEntry`] values mapping a
//! path and a set of methods to a backend [`Service`]. Entries under
//! [`PRIVATE_PREFIX`] require a credential. The table is built once at
//! startup and shared read-only by every request.

use std::collections::HashSet;

use axum::http::Method;
use axum::routing::MethodFilter;

use crate::error::GatewayError;
use crate::upstream::Service;

pub const PRIVATE_PREFIX: &str = "/private";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Requires a credential whose claims carry every listed role.
    Private { roles: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub path: String,
    pub methods: Vec<Method>,
    pub service: Service,
    pub access: Access,
}

impl RouteEntry {
    #[must_use]
    pub fn public(path: &str, methods: &[Method], service: Service) -> Self {
        Self {
            path: path.to_string(),
            methods: methods.to_vec(),
            service,
            access: Access::Public,
        }
    }

    /// A route under [`PRIVATE_PREFIX`]; `sub_path` is relative to it.
    #[must_use]
    pub fn private(sub_path: &str, methods: &[Method], service: Service) -> Self {
        Self {
            path: format!("{PRIVATE_PREFIX}{sub_path}"),
            methods: methods.to_vec(),
            service,
            access: Access::Private { roles: Vec::new() },
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        if let Access::Private { roles: ref mut r } = self.access {
            *r = roles.iter().map(|s| (*s).to_string()).collect();
        }
        self
    }

    #[must_use]
    pub const fn is_private(&self) -> bool {
        matches!(self.access, Access::Private { .. })
    }

    #[must_use]
    pub fn required_roles(&self) -> &[String] {
        match &self.access {
            Access::Public => &[],
            Access::Private { roles } => roles,
        }
    }

    /// Combined axum method filter, `None` if any method is unsupported.
    #[must_use]
    pub fn method_filter(&self) -> Option<MethodFilter> {
        let mut filters = self
            .methods
            .iter()
            .map(|m| MethodFilter::try_from(m.clone()).ok());
        let first = filters.next()??;
        filters.try_fold(first, |acc, f| f.map(|f| acc.or(f)))
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build a table from arbitrary entries, rejecting malformed paths,
    /// empty or unsupported method sets, and duplicate (path, method) pairs.
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, GatewayError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !entry.path.starts_with('/') {
                return Err(GatewayError::InvalidRoute {
                    path: entry.path.clone(),
                    reason: "path must start with '/'".into(),
                });
            }
            if entry.method_filter().is_none() {
                return Err(GatewayError::InvalidRoute {
                    path: entry.path.clone(),
                    reason: "route needs at least one supported method".into(),
                });
            }
            for method in &entry.methods {
                if !seen.insert((entry.path.as_str(), method)) {
                    return Err(GatewayError::InvalidRoute {
                        path: entry.path.clone(),
                        reason: format!("{method} is registered twice"),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// The gateway's public and private routes.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            entries: vec![
                RouteEntry::public("/login", &[Method::POST], Service::Auth),
                RouteEntry::public("/signup", &[Method::POST], Service::Auth),
                RouteEntry::private("/profile", &[Method::GET, Method::PUT], Service::User),
                RouteEntry::private("/basket", &[Method::GET, Method::PUT], Service::Basket),
            ],
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Services referenced by the table, in first-use order, possibly repeated.
    pub fn services(&self) -> impl Iterator<Item = Service> + '_ {
        self.entries.iter().map(|e| e.service)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per route: methods, path, access and target service.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                let methods: Vec<&str> = e.methods.iter().map(Method::as_str).collect();
                let access = match &e.access {
                    Access::Public => "public".to_string(),
                    Access::Private { roles } if roles.is_empty() => "private".to_string(),
                    Access::Private { roles } => format!("private [{}]", roles.join(", ")),
                };
                format!(
                    "{:<10} {:<20} {:<10} -> {}",
                    methods.join(","),
                    e.path,
                    access,
                    e.service
                )
            })
            .collect()
    }
}

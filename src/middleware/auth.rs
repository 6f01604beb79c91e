//! Authentication gate for private routes.
//!
//! [`require_credential`] reads the `Authorization` header of the inbound
//! request. Without one the request is answered with 401 and the wrapped
//! handler never runs. With one, the token is handed to the injected
//! [`CredentialVerifier`] and the resulting [`Claims`] are checked against
//! the route's required roles before the chain continues.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::request_id::request_id_of;
use crate::respond;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    pub subject: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("not authenticated")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("missing required role '{0}'")]
    MissingRole(String),
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            Self::MissingRole(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        respond::error(self.status(), self.to_string())
    }
}

/// Turns a raw credential into claims. Implementations own all policy
/// about signatures, expiry and issuers; the gate only checks roles.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Accepts any non-empty credential and grants no roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceVerifier;

impl CredentialVerifier for PresenceVerifier {
    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }
        Ok(Claims::default())
    }
}

/// Extract the credential from request headers, dropping a `Bearer` scheme.
pub fn credential(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::InvalidCredential("header is not visible ASCII".into()))?
        .trim();

    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        None if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn CredentialVerifier>,
    required_roles: Arc<[String]>,
}

impl AuthGate {
    #[must_use]
    pub fn new(verifier: Arc<dyn CredentialVerifier>, required_roles: &[String]) -> Self {
        Self {
            verifier,
            required_roles: required_roles.into(),
        }
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = credential(headers)?;
        let claims = self.verifier.verify(token)?;

        if let Some(missing) = self
            .required_roles
            .iter()
            .find(|role| !claims.roles.contains(role))
        {
            return Err(AuthError::MissingRole(missing.clone()));
        }
        Ok(claims)
    }
}

pub async fn require_credential(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.check(request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id_of(&request),
                path = %request.uri().path(),
                error = %e,
                "request rejected by authentication gate"
            );
            e.into_response()
        }
    }
}

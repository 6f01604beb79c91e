//! Process-level error types for Gatehouse.
//!
//! Defines [`GatewayError`] (startup, config and CLI failures) and
//! [`ValidationError`] for config validation problems. Request-time
//! failures live next to the code that produces them:
//! [`ProxyError`](crate::proxy::ProxyError) and
//! [`AuthError`](crate::middleware::auth::AuthError).

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub section: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.section, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid bind address '{addr}': {reason}")]
    BindAddress { addr: String, reason: String },

    #[error("Invalid {service} upstream address '{addr}': {reason}")]
    UpstreamAddress {
        service: &'static str,
        addr: String,
        reason: String,
    },

    #[error("No address configured for the {0} upstream")]
    MissingUpstream(&'static str),

    #[error("Invalid route {path}: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

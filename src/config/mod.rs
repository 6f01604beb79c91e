//! Configuration loading and validation.
//!
//! Defines the [`ConfigSource`] trait for pluggable config backends and
//! the file discovery used by `gatehouse run`. Submodules provide the data
//! model, validation logic, and concrete source implementations.

pub mod model;
pub mod sources;
pub mod validation;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::GatewayError;
use model::Config;
use sources::file_source::FileSource;
use sources::Format;

/// File names looked up in the working directory when no `--config` is given.
pub const AUTO_DETECT_CANDIDATES: &[&str] = &[
    "gatehouse.toml",
    "gatehouse.yaml",
    "gatehouse.yml",
    "gatehouse.json",
];

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<Config, GatewayError>;
}

/// Pick the config source: the explicit path if given, otherwise the first
/// auto-detected file, otherwise none (defaults plus overrides apply).
pub async fn resolve_source(
    explicit: Option<&Path>,
) -> Result<Option<Box<dyn ConfigSource>>, GatewayError> {
    if let Some(path) = explicit {
        return create_file_source(path).map(Some);
    }

    for name in AUTO_DETECT_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path).map(Some);
        }
    }

    Ok(None)
}

pub fn create_file_source(path: &Path) -> Result<Box<dyn ConfigSource>, GatewayError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let format = Format::from_extension(ext)?;
    Ok(Box::new(FileSource::new(path.to_path_buf(), format)))
}

//! Async file-based config source.
//!
//! [`FileSource`] implements [`ConfigSource`] for any supported
//! [`Format`]. It reads the file asynchronously via Tokio; validation
//! happens later, once CLI and environment overrides are applied.

use std::path::PathBuf;

use async_trait::async_trait;

use super::Format;
use crate::config::model::Config;
use crate::config::ConfigSource;
use crate::error::GatewayError;

pub struct FileSource {
    path: PathBuf,
    format: Format,
}

impl FileSource {
    #[must_use]
    pub const fn new(path: PathBuf, format: Format) -> Self {
        Self { path, format }
    }

    async fn read_content(&self) -> Result<String, GatewayError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewayError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                GatewayError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.format.name()
    }

    async fn load(&self) -> Result<Config, GatewayError> {
        let content = self.read_content().await?;

        self.format
            .deserialize(&content)
            .map_err(|source| GatewayError::ConfigParse {
                path: self.path.display().to_string(),
                source,
            })
    }
}

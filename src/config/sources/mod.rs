//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! [`Format`] maps file extensions to a serde backend (TOML, YAML, JSON,
//! each behind its cargo feature); [`FileSource`](file_source::FileSource)
//! reads a file and hands it to the matching format.

pub mod file_source;

use crate::config::model::Config;
use crate::error::GatewayError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    #[cfg(feature = "toml")]
    Toml,
    #[cfg(feature = "yaml")]
    Yaml,
    #[cfg(feature = "json")]
    Json,
}

impl Format {
    /// Resolve a file extension, failing for formats not compiled in.
    pub fn from_extension(ext: &str) -> Result<Self, GatewayError> {
        match ext {
            #[cfg(feature = "toml")]
            "toml" => Ok(Self::Toml),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Ok(Self::Yaml),
            #[cfg(feature = "json")]
            "json" => Ok(Self::Json),
            other => Err(GatewayError::UnsupportedFormat(other.to_string())),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "toml")]
            Self::Toml => "toml",
            #[cfg(feature = "yaml")]
            Self::Yaml => "yaml",
            #[cfg(feature = "json")]
            Self::Json => "json",
        }
    }

    pub fn deserialize(self, content: &str) -> Result<Config, BoxError> {
        match self {
            #[cfg(feature = "toml")]
            Self::Toml => toml::from_str(content).map_err(|e| Box::new(e) as BoxError),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yml::from_str(content).map_err(|e| Box::new(e) as BoxError),
            #[cfg(feature = "json")]
            Self::Json => serde_json::from_str(content).map_err(|e| Box::new(e) as BoxError),
        }
    }

    pub fn serialize(self, config: &Config) -> Result<String, BoxError> {
        match self {
            #[cfg(feature = "toml")]
            Self::Toml => toml::to_string_pretty(config).map_err(|e| Box::new(e) as BoxError),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yml::to_string(config).map_err(|e| Box::new(e) as BoxError),
            #[cfg(feature = "json")]
            Self::Json => serde_json::to_string_pretty(config).map_err(|e| Box::new(e) as BoxError),
        }
    }
}

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, GatewayError> {
    Format::from_extension(ext)?
        .deserialize(content)
        .map_err(|source| GatewayError::ConfigParse {
            path: path_display.to_string(),
            source,
        })
}

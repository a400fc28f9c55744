use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required section `{0}`")]
    MissingSection(&'static str),

    #[error("invalid value for `{field}`: {message}")]
    InvalidValue { field: String, message: String },

    #[error("unsupported config format for {path} (expected .yaml, .yml, .toml or .json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("unknown object reference `{path}` in the {registry} registry")]
    UnknownReference { path: String, registry: &'static str },

    #[error("failed to instantiate object reference `{path}`: {source}")]
    Instantiate {
        path: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue { field: field.into(), message: message.into() }
    }
}

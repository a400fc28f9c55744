use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("record error: {0}")]
    Records(String),

    #[error("split error: {0}")]
    Split(String),

    #[error("batch error: {0}")]
    Batch(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Config(#[from] hourglass_config::ConfigError),

    #[error(transparent)]
    Model(#[from] hourglass_model::ModelError),

    #[error(transparent)]
    Recorder(#[from] burn::record::RecorderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Wraps the failing stage's error with the stage name; the original
    /// error context stays reachable through the source chain.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("handler error: {0}")]
    Handler(String),

    #[error(transparent)]
    Config(#[from] hourglass_config::ConfigError),

    #[error(transparent)]
    Model(#[from] hourglass_model::ModelError),

    #[error(transparent)]
    Training(#[from] hourglass_training::TrainingError),
}

impl PipelineError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

use thiserror::Error;

pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid network geometry: {0}")]
    Geometry(String),
}

impl ModelError {
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry(message.into())
    }
}

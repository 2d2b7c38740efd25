//! Error types for the instrument core

use thiserror::Error;

/// Result type for core operations
pub type AdiResult<T> = Result<T, AdiError>;

#[derive(Error, Debug)]
pub enum AdiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Initialization failed ({stage}): {reason}")]
    Init { stage: &'static str, reason: String },
}

impl AdiError {
    pub fn init(stage: &'static str, err: &anyhow::Error) -> Self {
        AdiError::Init {
            stage,
            reason: format!("{err:#}"),
        }
    }
}

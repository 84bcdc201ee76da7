use thiserror::Error;

use crate::module::InvocationError;
use crate::runner::types::LifecyclePhase;

#[derive(Error, Debug)]
pub enum MarkrunError {
    #[error("{phase} 失败: {fixture}::{method}: {source}")]
    Lifecycle {
        fixture: String,
        method: String,
        phase: LifecyclePhase,
        #[source]
        source: InvocationError,
    },

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

// Add conversion from anyhow::Error
impl From<anyhow::Error> for MarkrunError {
    fn from(err: anyhow::Error) -> Self {
        MarkrunError::Other(err.to_string())
    }
}

impl From<toml::de::Error> for MarkrunError {
    fn from(err: toml::de::Error) -> Self {
        MarkrunError::Config(err.to_string())
    }
}

/// Result type for markrun crate
pub type Result<T> = std::result::Result<T, MarkrunError>;

use thiserror::Error;

use crate::lineups::Side;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("document structure changed: {0}")]
    Structural(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("http {status} for {url}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{side} lineup has {len} players, expected 9")]
    LineupLength { side: Side, len: usize },

    #[error("invalid selector {0}")]
    Selector(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Http { .. }
                | PipelineError::Request(_)
                | PipelineError::Parse(_)
                | PipelineError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

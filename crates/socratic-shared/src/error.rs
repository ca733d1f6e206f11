//! Error types for the shared domain.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SocraticError {
    #[error("Edit out of range: offset {offset} in document of {len} bytes")]
    EditOutOfRange { offset: usize, len: usize },

    #[error("Offset {0} is not on a character boundary")]
    NotCharBoundary(usize),

    #[error("Score store error: {0}")]
    ScoreStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

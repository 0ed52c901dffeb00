use thiserror::Error;

/// Errors produced by the relay protocol layer.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

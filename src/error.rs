use thiserror::Error;

/// Errors raised while reading or writing feature data
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input did not follow the ASCII format
    #[error("Parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

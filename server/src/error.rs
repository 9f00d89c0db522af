use crate::matrix::{LetterWeightsError, MatrixParseError};
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop the server before it accepts any connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("failed to read dictionary {}: {source}", path.display())]
    Dictionary {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read matrix file {}: {source}", path.display())]
    MatrixFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:{line}: {source}", path.display())]
    MatrixLine {
        path: PathBuf,
        line: usize,
        source: MatrixParseError,
    },
    #[error("failed to build letter distribution: {0}")]
    LetterWeights(#[from] LetterWeightsError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

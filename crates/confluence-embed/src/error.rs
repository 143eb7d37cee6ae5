use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the local-file helpers. The resolver itself cannot fail.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to read page body '{}': {source}", .path.display())]
    ReadBody { path: PathBuf, source: io::Error },

    #[error("failed to read page body from stdin: {0}")]
    ReadStdin(io::Error),

    #[error("page body is not valid UTF-8")]
    InvalidEncoding,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type EmbedResult<T> = Result<T, EmbedError>;

use std::io;

use thiserror::Error;

/// Errors produced while building, training, saving or loading models.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A persisted model is malformed. No partial model is ever returned.
    #[error("invalid model format at line {line}: {message}")]
    Format { line: usize, message: String },

    /// Unsupported solver name, thread count or other configuration problem.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A hyper-parameter setter rejected its value.
    #[error("{0}")]
    InvalidParameter(String),

    /// Malformed training input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format<S: Into<String>>(line: usize, message: S) -> Self {
        Error::Format {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn parameter<S: Into<String>>(message: S) -> Self {
        Error::InvalidParameter(message.into())
    }

    pub(crate) fn input<S: Into<String>>(message: S) -> Self {
        Error::InvalidInput(message.into())
    }
}

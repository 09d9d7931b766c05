//! Error types for chatmark operations.

use thiserror::Error;

/// Errors that can end a conversion run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported site: {0}")]
    UnsupportedSite(String),

    #[error("no messages found in the conversation")]
    NoMessages,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for hermes-store

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid construction parameters (caller bug, never retried)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A writer invariant was violated; the output must not be opened
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Store corruption: {0}")]
    Corruption(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(u32),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

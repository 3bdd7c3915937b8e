//! Error types for BurrowKV
//!
//! One error enum serves both sides of the boundary. The engine produces the
//! storage-flavoured variants and the boundary folds them into status codes;
//! the client layer decodes those codes exactly once (see `client::status`)
//! and only ever surfaces the recoverable variants below. Status codes the
//! client does not recognize never become a `BurrowError`: they abort the
//! operation chain with a panic.

use std::path::PathBuf;

use thiserror::Error;

use crate::transaction::ReaderState;

/// Result type alias using BurrowError
pub type Result<T> = std::result::Result<T, BurrowError>;

/// Unified error type for BurrowKV operations
#[derive(Debug, Error)]
pub enum BurrowError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Key / Data Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    /// A non-empty read produced no bytes: the offset is at or past the end.
    #[error("End of data")]
    EndOfData,

    // -------------------------------------------------------------------------
    // Write Integrity Errors
    // -------------------------------------------------------------------------
    /// The engine reported its write-failure sentinel.
    #[error("Write failed: engine reported an unknown error")]
    WriteFailed,

    /// The engine reported a byte count other than the length handed to it.
    #[error("Write count mismatch: expected {expected} bytes, engine reported {written}")]
    WriteCountMismatch { expected: usize, written: usize },

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Reader is {actual:?}, operation requires {expected:?}")]
    ReaderState {
        expected: ReaderState,
        actual: ReaderState,
    },

    #[error("Failed to open store at {path:?} (status {status})")]
    Open { path: PathBuf, status: u32 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BurrowError {
    /// The referenced key does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BurrowError::KeyNotFound)
    }

    /// A read ran off the end of the stored value.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, BurrowError::EndOfData)
    }

    /// Internal-consistency failures: the engine broke its side of the
    /// contract and the affected handle should not be trusted further.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BurrowError::WriteCountMismatch { .. } | BurrowError::WalCorruption(_)
        )
    }
}

impl From<bincode::Error> for BurrowError {
    fn from(err: bincode::Error) -> Self {
        BurrowError::Serialization(err.to_string())
    }
}

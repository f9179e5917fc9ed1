//! Error types for the colbridge core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern:
//! [`StoreError`] is what the wide-column store collaborator reports, and
//! [`Error`] is what the adapter surfaces to its caller.

use crate::client::Capability;
use thiserror::Error;

/// Result type alias for colbridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for colbridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Staging a mutation failed (unknown table, writer creation error, bad request)
    #[error("Write to table '{table}' failed: {source}")]
    Write {
        table: String,
        #[source]
        source: StoreError,
    },

    /// A flush could not complete for one or more tables
    #[error("Flush failed for {failed_tables} table(s), first failure on '{table}': {source}")]
    Flush {
        table: String,
        failed_tables: usize,
        #[source]
        source: StoreError,
    },

    /// A point read or scan failed at the store layer
    #[error("Read from table '{table}' failed: {source}")]
    Read {
        table: String,
        #[source]
        source: StoreError,
    },

    /// The mutation buffer has been shut down
    #[error("Mutation buffer is closed")]
    BufferClosed,

    /// The target store cannot provide this capability
    #[error("Unsupported operation: {0}")]
    Unsupported(Capability),

    /// `next_row()` called on a row iterator with no more input
    #[error("Row iterator exhausted")]
    IteratorExhausted,

    /// Table does not exist in the store
    #[error("Table does not exist: {0}")]
    TableNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task backing a deferred call did not complete
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by the wide-column store collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Writer was already closed
    #[error("Batch writer is closed")]
    WriterClosed,

    /// Store or tablet unavailable (timeouts land here too)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Mutation rejected before reaching the store
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    /// Encoded whole-row value could not be decoded
    #[error("Corrupt row encoding: {0}")]
    CorruptRow(String),
}

impl Error {
    /// Table name this error is attributed to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Error::Write { table, .. } | Error::Flush { table, .. } | Error::Read { table, .. } => {
                Some(table)
            }
            Error::TableNotFound(table) => Some(table),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

use thiserror::Error;

use romshelf_core::{CatalogError, ScanError, StoreError};

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Scan failed before any work started
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Collection database error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog client could not be built
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

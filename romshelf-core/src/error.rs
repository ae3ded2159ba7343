//! Error taxonomy for the reconciliation engine.
//!
//! Per-file errors (`ScanError::Io`, `ResolveError`, `StoreError` during
//! commit) are accumulated into the scan result and never abort a run;
//! only an invalid scan root fails fast.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while walking and hashing files.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A file could not be opened or a read failed mid-stream. Per-file,
    /// non-fatal: the file is skipped and recorded.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan root is missing or not a directory. Fatal to the run,
    /// checked before any work starts.
    #[error("invalid scan root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_root(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the external metadata catalog.
///
/// Defined here (not in the client crate) so the `Catalog` trait can be
/// implemented without pulling an HTTP stack into every consumer.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unreachable: {0}")]
    Unreachable(String),

    #[error("rate limited by catalog")]
    RateLimited,

    #[error("catalog server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("malformed catalog response: {0}")]
    Malformed(String),
}

/// Errors from resolving a single file against the catalog. Per-file,
/// non-fatal: the file is recorded as unresolved and the run continues.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("catalog lookup timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Errors from the persistence collaborator. During commit these are
/// per-item: a failed item is reported and does not block the rest of
/// the batch.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn backend(msg: impl ToString) -> Self {
        Self::Backend(msg.to_string())
    }
}

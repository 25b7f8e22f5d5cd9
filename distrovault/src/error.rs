//! Error types for catalog and acquisition operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur while acquiring or cataloging distributions.
///
/// Only conditions with no safe local recovery surface here. A corrupt
/// catalog file or an unreachable registry degrade to "use what we have"
/// inside the store and reconciler and never reach the caller.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The remote registry could not be fetched or parsed.
    ///
    /// The reconciler recovers from this by keeping the existing catalog;
    /// it only surfaces when a registry client is invoked directly.
    #[error("registry unavailable: {0}")]
    Registry(String),

    /// DNS, connect, TLS or mid-transfer failure. Retriable by the caller.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// More consecutive redirects than the configured hop limit.
    #[error("redirect limit of {limit} exceeded fetching {url}")]
    RedirectLoop { url: String, limit: usize },

    /// No data arrived within the stall window. The partial file is
    /// removed before this is raised.
    #[error("no data received from {url} within {stall_secs}s")]
    Timeout { url: String, stall_secs: u64 },

    /// Downloaded bytes do not match the expected digest. The destination
    /// file is removed before this is raised.
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// The transfer was cancelled through its cancellation token. A partial
    /// destination file may remain; discarding it is the caller's job.
    #[error("download of {url} was cancelled")]
    Cancelled { url: String },

    /// A container could not be unpacked into a usable archive.
    #[error("failed to extract {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// A distribution name failed validation before any I/O was attempted.
    #[error("invalid distribution name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// No catalog entry with the given name.
    #[error("distribution not found: {0}")]
    NotFound(String),

    /// The entry exists but carries no download URL for this architecture.
    #[error("distribution {name} has no download source for this architecture")]
    NoSource { name: String },

    /// A conflicting operation holds the cooperative lock.
    #[error("a {operation} is already in progress")]
    Busy { operation: &'static str },

    /// Filesystem failure outside the recoverable cases above.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VaultError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

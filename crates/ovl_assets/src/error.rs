//! Error types for overlay and resolution operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses
//! [`Error`] as the error type. Lookups that can legitimately miss (resource
//! ids, package metadata) return sentinels (`None`, cookie `0`, `false`)
//! rather than errors; the exceptions are named-entry opens, which fail hard
//! with [`Error::EntryNotFound`].

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while composing or resolving resource packages.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (reading package descriptors, asset entries).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a package descriptor or idmap.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation attempted after the manager's native resource set was torn
    /// down. Nothing can be recovered; a new manager must be created.
    #[error("asset manager has been closed")]
    Closed,

    /// A cookie does not refer to a live package slot.
    #[error("invalid cookie: {0}")]
    InvalidCookie(u32),

    /// A string index is out of range for the cookie's string block.
    #[error("string index {index} out of range for cookie {cookie}")]
    StringIndex { cookie: u32, index: usize },

    /// A named asset entry does not exist in any attached package.
    #[error("asset entry not found: {0}")]
    EntryNotFound(String),

    /// A package directory is missing or its descriptor is malformed.
    #[error("invalid package: {0}")]
    InvalidPackage(Utf8PathBuf),

    /// The package metadata service could not be reached, or a package the
    /// operation requires is unknown to it. Fatal to the current
    /// attach/detach attempt only.
    #[error("package metadata unavailable: {0}")]
    Metadata(String),

    /// A theme attach was requested on a manager whose base (application)
    /// package cannot be resolved.
    #[error("no resolvable base package")]
    NoBasePackage,

    /// Catch-all for errors reported by a resource-table engine.
    #[error("{0}")]
    Engine(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Engine(s)
    }
}

//! Error types for modelc-deps

use std::path::PathBuf;

use thiserror::Error;

use crate::spec::Provenance;

/// A single dependency that could not be loaded.
///
/// Carries the provenance and the specifier exactly as declared so a failure
/// can be reproduced from the report alone.
#[derive(Error, Debug)]
#[error("failed to load dependency '{specifier}' from {provenance}: {kind}")]
pub struct DependencyError {
    /// Where the specifier was declared
    pub provenance: Provenance,
    /// The specifier as written in configuration
    pub specifier: String,
    /// What went wrong
    #[source]
    pub kind: DependencyErrorKind,
}

impl DependencyError {
    pub fn new(provenance: Provenance, specifier: impl Into<String>, kind: DependencyErrorKind) -> Self {
        DependencyError {
            provenance,
            specifier: specifier.into(),
            kind,
        }
    }
}

/// Reasons a dependency failed to load
#[derive(Error, Debug)]
pub enum DependencyErrorKind {
    /// Specifier is empty or cannot be interpreted
    #[error("invalid dependency specifier: {0}")]
    InvalidSpecifier(String),

    /// Malformed `data:` url
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),

    /// `data:` url declares a charset we cannot decode
    #[error("unsupported charset: {0}")]
    UnsupportedEncoding(String),

    /// Local file could not be read
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Url scheme is neither local nor fetchable
    #[error("unsupported url scheme '{0}'")]
    UnsupportedScheme(String),

    /// Remote fetch failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Retrieved bytes are not JSON
    #[error("not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// JSON does not have the shape of a definition document
    #[error("not a definition document: {0}")]
    InvalidDocument(String),

    /// The resolution task died before producing a result
    #[error("resolution aborted: {0}")]
    Aborted(String),
}

/// Errors from a [`crate::RemoteFetcher`]
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(err.to_string())
    }
}

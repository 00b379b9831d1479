//! Error taxonomy for a build run.
//!
//! Every variant is fatal to the run that produced it and guarantees the hash
//! state was not written. Per-dependency failures are not here: they are
//! recovered inside the resolver (see [`modelc_deps::DependencyError`]).

use std::path::PathBuf;

use modelc_deps::DependencyError;
use serde_json::Value;
use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum FrontendError {
    /// A filesystem read or write failed (project root, manifest, IR, state file).
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some source files could not be read; building would silently drop them.
    #[error("{} source path(s) could not be read: {}", .paths.len(), .paths.join(", "))]
    UnreadableSources { paths: Vec<String> },

    /// The project manifest is not valid JSON or lacks required fields.
    #[error("invalid project manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The hash-state file exists but is not a path -> digest object.
    #[error("invalid hash state file {path:?}: {source}")]
    HashState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The engine rejected the request payload.
    #[error("compilation engine could not decode the request: {body}")]
    Decode { body: Value },

    /// The engine's build step failed (e.g. a type error).
    #[error("build failed: {body}")]
    Build { body: Value },

    /// The engine could not be reached or answered out of protocol.
    #[error("compilation engine failure: {0}")]
    Engine(String),

    /// Dependencies were required but none of the declared ones loaded.
    #[error("none of the {declared} declared dependencies could be loaded")]
    DependenciesUnavailable {
        declared: usize,
        failures: Vec<DependencyError>,
    },
}

impl FrontendError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FrontendError::Io {
            path: path.into(),
            source,
        }
    }

    /// Machine-readable body of an engine rejection, if this is one.
    pub fn engine_body(&self) -> Option<&Value> {
        match self {
            FrontendError::Decode { body } | FrontendError::Build { body } => Some(body),
            _ => None,
        }
    }
}

impl From<EngineError> for FrontendError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Decode { body } => FrontendError::Decode { body },
            EngineError::Build { body } => FrontendError::Build { body },
            EngineError::Transport(detail) => FrontendError::Engine(detail),
        }
    }
}

/// Result type for front-end operations.
pub type Result<T> = std::result::Result<T, FrontendError>;

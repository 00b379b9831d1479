//! modelc-deps: dependency definition loading for modelc
//!
//! Loads the external package definitions a project declares. A specifier is
//! an embedded `data:` url, a local path (or `file:` url), a network locator,
//! or a structured remote descriptor. Batches are resolved concurrently and
//! each item fails on its own.

pub mod data_url;
pub mod document;
pub mod error;
pub mod fakes;
pub mod fetch;
pub mod resolver;
pub mod spec;

pub use data_url::DataUrl;
pub use document::DefinitionDocument;
pub use error::{DependencyError, DependencyErrorKind, FetchError};
pub use fetch::{HttpFetcher, RemoteFetcher};
pub use resolver::{DependencyResolver, Resolution, ResolvedDependency};
pub use spec::{DependencyConfig, DependencySpec, Provenance, RemoteDescriptor, RemoteSource};

/// Result type for single-dependency operations
pub type Result<T> = std::result::Result<T, DependencyError>;

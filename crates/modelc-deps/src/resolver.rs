//! Best-effort batch resolution of dependency specifiers.
//!
//! Every specifier is resolved in its own task. A failing or panicking item is
//! logged and reported in [`Resolution::failures`]; it never aborts the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::data_url::{is_data_url, DataUrl};
use crate::document::DefinitionDocument;
use crate::error::{DependencyError, DependencyErrorKind};
use crate::fetch::RemoteFetcher;
use crate::spec::{DependencySpec, Provenance, RemoteDescriptor, RemoteSource};

/// A successfully loaded dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDependency {
    pub provenance: Provenance,
    /// The specifier as declared
    pub specifier: String,
    pub document: DefinitionDocument,
}

/// Outcome of a batch: successes and failures, in no particular order.
#[derive(Debug, Default)]
pub struct Resolution {
    pub resolved: Vec<ResolvedDependency>,
    pub failures: Vec<DependencyError>,
}

impl Resolution {
    /// True when nothing failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of specifiers that were attempted.
    pub fn attempted(&self) -> usize {
        self.resolved.len() + self.failures.len()
    }

    pub fn documents(&self) -> Vec<DefinitionDocument> {
        self.resolved.iter().map(|d| d.document.clone()).collect()
    }
}

/// Loads dependency definitions from data urls, local files and remote locators.
///
/// Relative local paths are resolved against `base_dir` (usually the project
/// directory).
#[derive(Clone)]
pub struct DependencyResolver {
    base_dir: PathBuf,
    fetcher: Arc<dyn RemoteFetcher>,
}

impl DependencyResolver {
    pub fn new(base_dir: impl Into<PathBuf>, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        DependencyResolver {
            base_dir: base_dir.into(),
            fetcher,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Same fetcher, different base directory.
    pub fn rebased(&self, base_dir: impl Into<PathBuf>) -> Self {
        DependencyResolver {
            base_dir: base_dir.into(),
            fetcher: Arc::clone(&self.fetcher),
        }
    }

    /// Resolve all `specs` concurrently.
    #[instrument(skip(self, specs), fields(count = specs.len()))]
    pub async fn resolve_all(&self, specs: Vec<DependencySpec>) -> Resolution {
        let (origins, handles): (Vec<_>, Vec<_>) = specs
            .into_iter()
            .map(|spec| {
                let origin = (spec.provenance(), spec.specifier());
                let resolver = self.clone();
                let handle = tokio::spawn(async move { resolver.resolve(spec).await });
                (origin, handle)
            })
            .unzip();

        let mut resolution = Resolution::default();
        for ((provenance, specifier), joined) in origins.into_iter().zip(join_all(handles).await) {
            let outcome = joined.unwrap_or_else(|e| {
                Err(DependencyError::new(
                    provenance,
                    specifier.clone(),
                    DependencyErrorKind::Aborted(e.to_string()),
                ))
            });
            match outcome {
                Ok(dependency) => {
                    info!(
                        provenance = %dependency.provenance,
                        specifier = %dependency.specifier,
                        "loaded dependency"
                    );
                    resolution.resolved.push(dependency);
                }
                Err(err) => {
                    warn!(
                        event = "dependency.failed",
                        provenance = %err.provenance,
                        specifier = %err.specifier,
                        error = %err.kind,
                        "error loading dependency"
                    );
                    resolution.failures.push(err);
                }
            }
        }
        resolution
    }

    /// Resolve a single specifier.
    pub async fn resolve(&self, spec: DependencySpec) -> Result<ResolvedDependency, DependencyError> {
        let provenance = spec.provenance();
        let specifier = spec.specifier();
        debug!(provenance = %provenance, specifier = %specifier, "loading dependency");

        let bytes = match &spec {
            DependencySpec::Included(s)
            | DependencySpec::LocalDependency(s)
            | DependencySpec::RemoteDependency(RemoteSource::Locator(s)) => self.load_str(s).await,
            DependencySpec::RemoteDependency(RemoteSource::Descriptor(d)) => {
                self.load_descriptor(d).await
            }
        };

        let document = bytes
            .and_then(|b| DefinitionDocument::from_slice(&b))
            .map_err(|kind| DependencyError::new(provenance, specifier.clone(), kind))?;

        Ok(ResolvedDependency {
            provenance,
            specifier,
            document,
        })
    }

    /// Try, in order: embedded data url, local locator, network locator.
    async fn load_str(&self, input: &str) -> Result<Vec<u8>, DependencyErrorKind> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DependencyErrorKind::InvalidSpecifier(
                "empty specifier".to_string(),
            ));
        }

        if is_data_url(input) {
            let data = DataUrl::parse(input)?;
            return Ok(data.decode_text()?.into_bytes());
        }

        match Url::parse(input) {
            // Single-letter schemes are Windows drive letters, not urls.
            Ok(url) if url.scheme().len() > 1 => self.load_url(&url).await,
            _ => self.read_local(&self.base_dir.join(input)).await,
        }
    }

    async fn load_descriptor(&self, descriptor: &RemoteDescriptor) -> Result<Vec<u8>, DependencyErrorKind> {
        let location = descriptor.location();
        let url = Url::parse(&location)
            .map_err(|e| DependencyErrorKind::InvalidSpecifier(format!("{location}: {e}")))?;
        self.load_url(&url).await
    }

    async fn load_url(&self, url: &Url) -> Result<Vec<u8>, DependencyErrorKind> {
        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| {
                    DependencyErrorKind::InvalidSpecifier(format!("{url} is not a local file path"))
                })?;
                self.read_local(&path).await
            }
            "http" | "https" => Ok(self.fetcher.fetch(url).await?),
            other => Err(DependencyErrorKind::UnsupportedScheme(other.to_string())),
        }
    }

    async fn read_local(&self, path: &Path) -> Result<Vec<u8>, DependencyErrorKind> {
        tokio::fs::read(path)
            .await
            .map_err(|source| DependencyErrorKind::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::StaticFetcher;

    const DOC: &str = r#"{"formatVersion":3,"distribution":["Library",["acme"],{},{}]}"#;

    fn resolver(base: &Path, fetcher: StaticFetcher) -> DependencyResolver {
        DependencyResolver::new(base, Arc::new(fetcher))
    }

    #[tokio::test]
    async fn test_relative_path_resolves_against_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor/base.json"), DOC).unwrap();

        let resolved = resolver(dir.path(), StaticFetcher::new())
            .resolve(DependencySpec::LocalDependency(" vendor/base.json ".to_string()))
            .await
            .unwrap();
        assert_eq!(resolved.provenance, Provenance::LocalDependencies);
        assert_eq!(resolved.document.distribution_kind(), "Library");
    }

    #[tokio::test]
    async fn test_file_url_is_read_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.json");
        std::fs::write(&path, DOC).unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let resolved = resolver(Path::new("/nonexistent"), StaticFetcher::new())
            .resolve(DependencySpec::Included(url.to_string()))
            .await
            .unwrap();
        assert_eq!(resolved.document.format_version(), 3);
    }

    #[tokio::test]
    async fn test_missing_local_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver(dir.path(), StaticFetcher::new())
            .resolve(DependencySpec::LocalDependency("missing.json".to_string()))
            .await
            .unwrap_err();
        match err.kind {
            DependencyErrorKind::Io { path, .. } => assert!(path.ends_with("missing.json")),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_data_url_is_tried_first() {
        let spec = format!("data:application/json,{}", DOC);
        let resolved = resolver(Path::new("."), StaticFetcher::new())
            .resolve(DependencySpec::RemoteDependency(RemoteSource::Locator(spec)))
            .await
            .unwrap();
        assert_eq!(resolved.provenance, Provenance::Dependencies);
    }

    #[tokio::test]
    async fn test_http_locator_uses_fetcher() {
        let fetcher = StaticFetcher::new().with_document("https://repo.example/lib.json", DOC);
        let resolved = resolver(Path::new("."), fetcher)
            .resolve(DependencySpec::RemoteDependency(RemoteSource::Locator(
                "https://repo.example/lib.json".to_string(),
            )))
            .await
            .unwrap();
        assert_eq!(resolved.specifier, "https://repo.example/lib.json");
    }

    #[tokio::test]
    async fn test_descriptor_fetches_expanded_location() {
        let fetcher = StaticFetcher::new().with_document(
            "https://raw.githubusercontent.com/acme/models/main/modelc-ir.json",
            DOC,
        );
        let spec = DependencySpec::RemoteDependency(RemoteSource::Descriptor(
            RemoteDescriptor::Github {
                owner: "acme".to_string(),
                repo: "models".to_string(),
                reference: "main".to_string(),
                path: "modelc-ir.json".to_string(),
                base_url: None,
            },
        ));
        assert!(resolver(Path::new("."), fetcher).resolve(spec).await.is_ok());
    }

    #[tokio::test]
    async fn test_unfetchable_scheme_is_rejected() {
        let err = resolver(Path::new("."), StaticFetcher::new())
            .resolve(DependencySpec::Included("ftp://mirror.example/lib.json".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, DependencyErrorKind::UnsupportedScheme(s) if s == "ftp"));
    }

    #[tokio::test]
    async fn test_empty_specifier_is_rejected() {
        let err = resolver(Path::new("."), StaticFetcher::new())
            .resolve(DependencySpec::Included("   ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, DependencyErrorKind::InvalidSpecifier(_)));
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_a_dependency_error() {
        let err = resolver(Path::new("."), StaticFetcher::new())
            .resolve(DependencySpec::Included("data:,not-json".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.provenance, Provenance::Includes);
        assert!(matches!(err.kind, DependencyErrorKind::Parse(_)));
    }
}

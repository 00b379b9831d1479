//! Batch resolution: failures stay isolated to the item that failed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modelc_deps::fakes::StaticFetcher;
use modelc_deps::{
    DependencyConfig, DependencyErrorKind, DependencyResolver, DependencySpec, FetchError,
    HttpFetcher, Provenance, RemoteFetcher, RemoteSource,
};
use url::Url;

const LIB_A: &str = r#"{"formatVersion":3,"distribution":["Library",["acme","a"],{},{}]}"#;
const LIB_C: &str = r#"{"formatVersion":3,"distribution":["Library",["acme","c"],{},{}]}"#;

fn write_lib(dir: &std::path::Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).expect("write lib");
}

#[tokio::test]
async fn unreachable_locator_drops_only_that_item() {
    let dir = tempfile::tempdir().unwrap();
    write_lib(dir.path(), "a.json", LIB_A);
    write_lib(dir.path(), "c.json", LIB_C);

    let resolver = DependencyResolver::new(dir.path(), Arc::new(StaticFetcher::new()));
    let specs = vec![
        DependencySpec::LocalDependency("a.json".to_string()),
        DependencySpec::RemoteDependency(RemoteSource::Locator(
            "https://unreachable.invalid/b.json".to_string(),
        )),
        DependencySpec::Included("c.json".to_string()),
    ];

    let resolution = resolver.resolve_all(specs).await;

    assert_eq!(resolution.resolved.len(), 2);
    assert_eq!(resolution.failures.len(), 1);
    assert_eq!(resolution.attempted(), 3);
    assert!(!resolution.is_complete());

    let failure = &resolution.failures[0];
    assert_eq!(failure.provenance, Provenance::Dependencies);
    assert_eq!(failure.specifier, "https://unreachable.invalid/b.json");
    assert!(matches!(failure.kind, DependencyErrorKind::Fetch(_)));

    let mut loaded: Vec<_> = resolution
        .resolved
        .iter()
        .map(|d| (d.provenance, d.specifier.clone()))
        .collect();
    loaded.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        loaded,
        vec![
            (Provenance::LocalDependencies, "a.json".to_string()),
            (Provenance::Includes, "c.json".to_string()),
        ]
    );
}

#[tokio::test]
async fn refused_connection_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    write_lib(dir.path(), "a.json", LIB_A);

    let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5)).expect("http client");
    let resolver = DependencyResolver::new(dir.path(), Arc::new(fetcher));
    let specs = vec![
        DependencySpec::LocalDependency("a.json".to_string()),
        DependencySpec::RemoteDependency(RemoteSource::Locator(
            "http://127.0.0.1:9/never.json".to_string(),
        )),
    ];

    let resolution = resolver.resolve_all(specs).await;
    assert_eq!(resolution.resolved.len(), 1);
    assert_eq!(resolution.failures.len(), 1);
    assert_eq!(resolution.failures[0].specifier, "http://127.0.0.1:9/never.json");
}

#[tokio::test]
async fn every_failure_mode_is_collected() {
    let dir = tempfile::tempdir().unwrap();
    write_lib(dir.path(), "broken.json", "{ not json");
    write_lib(dir.path(), "wrong-shape.json", r#"{"name":"x"}"#);

    let resolver = DependencyResolver::new(dir.path(), Arc::new(StaticFetcher::new()));
    let specs = vec![
        DependencySpec::Included("broken.json".to_string()),
        DependencySpec::Included("wrong-shape.json".to_string()),
        DependencySpec::Included("absent.json".to_string()),
        DependencySpec::Included("data:application/json;base64,%%%".to_string()),
        DependencySpec::Included("gopher://old.example/lib".to_string()),
    ];

    let resolution = resolver.resolve_all(specs).await;
    assert!(resolution.resolved.is_empty());
    assert_eq!(resolution.failures.len(), 5);
    assert!(resolution
        .failures
        .iter()
        .all(|f| f.provenance == Provenance::Includes));
}

#[tokio::test]
async fn empty_batch_resolves_to_nothing() {
    let resolver = DependencyResolver::new(".", Arc::new(StaticFetcher::new()));
    let resolution = resolver.resolve_all(Vec::new()).await;
    assert_eq!(resolution.attempted(), 0);
    assert!(resolution.is_complete());
}

#[tokio::test]
async fn config_specs_resolve_with_mixed_sources() {
    let dir = tempfile::tempdir().unwrap();
    write_lib(dir.path(), "local.json", LIB_A);

    let config: DependencyConfig = serde_json::from_value(serde_json::json!({
        "localDependencies": ["local.json"],
        "dependencies": [
            format!("data:application/json,{}", LIB_C),
            { "type": "url", "url": "https://repo.example/remote.json" }
        ]
    }))
    .unwrap();

    let fetcher =
        Arc::new(StaticFetcher::new().with_document("https://repo.example/remote.json", LIB_A));
    let resolver = DependencyResolver::new(dir.path(), fetcher.clone());
    let resolution = resolver.resolve_all(config.to_specs()).await;

    assert_eq!(resolution.resolved.len(), 3);
    assert!(resolution.is_complete());
    assert_eq!(
        fetcher.requests(),
        vec!["https://repo.example/remote.json".to_string()]
    );
}

/// Panics for one url, serves the rest from a [`StaticFetcher`].
struct FaultyFetcher {
    faulty: String,
    inner: StaticFetcher,
}

#[async_trait]
impl RemoteFetcher for FaultyFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        if url.as_str() == self.faulty {
            panic!("fetcher crashed on {url}");
        }
        self.inner.fetch(url).await
    }
}

#[tokio::test]
async fn crashed_fetch_becomes_an_aborted_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_lib(dir.path(), "a.json", LIB_A);

    let fetcher = FaultyFetcher {
        faulty: "https://repo.example/crash.json".to_string(),
        inner: StaticFetcher::new().with_document("https://repo.example/c.json", LIB_C),
    };
    let resolver = DependencyResolver::new(dir.path(), Arc::new(fetcher));
    let specs = vec![
        DependencySpec::LocalDependency("a.json".to_string()),
        DependencySpec::RemoteDependency(RemoteSource::Locator(
            "https://repo.example/crash.json".to_string(),
        )),
        DependencySpec::Included("https://repo.example/c.json".to_string()),
    ];

    let resolution = resolver.resolve_all(specs).await;

    assert_eq!(resolution.resolved.len(), 2);
    assert_eq!(resolution.failures.len(), 1);
    let failure = &resolution.failures[0];
    assert_eq!(failure.provenance, Provenance::Dependencies);
    assert_eq!(failure.specifier, "https://repo.example/crash.json");
    assert!(matches!(failure.kind, DependencyErrorKind::Aborted(_)));
}

#[tokio::test]
async fn rebased_resolver_reads_from_its_own_directory() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write_lib(second.path(), "lib.json", LIB_A);

    let fetcher = Arc::new(StaticFetcher::new());
    let resolver = DependencyResolver::new(first.path(), fetcher.clone());
    let moved = resolver.rebased(second.path());
    assert_eq!(resolver.base_dir(), first.path());
    assert_eq!(moved.base_dir(), second.path());

    let specs = || {
        vec![
            DependencySpec::LocalDependency("lib.json".to_string()),
            DependencySpec::Included(format!("data:application/json,{LIB_C}")),
        ]
    };
    assert_eq!(resolver.resolve_all(specs()).await.failures.len(), 1);
    assert!(moved.resolve_all(specs()).await.is_complete());
    assert!(fetcher.requests().is_empty());
}

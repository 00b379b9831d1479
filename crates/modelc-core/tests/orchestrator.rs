//! End-to-end build runs against the scripted engine.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use modelc_core::fakes::{Scripted, ScriptedEngine};
use modelc_core::{
    preview, BuildConfig, BuildStrategy, CompileRequest, FileDelta, FrontendError,
    HashStateStore, Orchestrator,
};
use modelc_deps::fakes::StaticFetcher;
use modelc_deps::DependencyResolver;
use serde_json::json;

const LIB: &str = r#"{"formatVersion":3,"distribution":["Library",["acme","lib"],{},{}]}"#;

struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    fn new(manifest: serde_json::Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("modelc.json"),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        Project { dir }
    }

    fn simple() -> Self {
        Self::new(json!({ "name": "acme.app", "sourceDirectory": "src" }))
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn source(&self, rel: &str, content: &str) {
        let path = self.root().join("src").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn remove(&self, rel: &str) {
        fs::remove_file(self.root().join("src").join(rel)).unwrap();
    }

    fn config(&self) -> BuildConfig {
        BuildConfig::for_project(self.root())
    }
}

fn orchestrator(engine: Arc<ScriptedEngine>) -> Orchestrator {
    Orchestrator::new(
        engine,
        DependencyResolver::new(".", Arc::new(StaticFetcher::new())),
    )
}

#[tokio::test]
async fn first_build_is_from_scratch_and_persists() {
    let project = Project::simple();
    project.source("Orders.src", "module Orders");
    project.source("sub/Items.src", "module Items");

    let engine = Arc::new(ScriptedEngine::new().then(Scripted::Completed(json!({ "ir": 1 }))));
    let outcome = orchestrator(engine.clone())
        .make(&project.config())
        .await
        .unwrap();

    assert_eq!(outcome.strategy, BuildStrategy::FromScratch);
    assert_eq!(outcome.summary.inserted, 2);
    assert_eq!(outcome.representation, json!({ "ir": 1 }));

    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    match &requests[0] {
        CompileRequest::BuildFromScratch(req) => {
            assert_eq!(req.file_snapshot.len(), 2);
            assert_eq!(req.file_snapshot["sub/Items.src"], "module Items");
            assert_eq!(req.package_info["name"], "acme.app");
        }
        other => panic!("expected from-scratch request, got {}", other.kind()),
    }

    let state = HashStateStore::new(project.config().hash_state_path)
        .load()
        .await
        .unwrap();
    assert_eq!(state.len(), 2);
    let written: serde_json::Value =
        serde_json::from_slice(&fs::read(project.config().ir_path).unwrap()).unwrap();
    assert_eq!(written, json!({ "ir": 1 }));
}

#[tokio::test]
async fn unchanged_tree_is_a_noop_without_writes() {
    let project = Project::simple();
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new());
    let orch = orchestrator(engine.clone());
    let first = orch.make(&project.config()).await.unwrap();

    let hash_path = project.config().hash_state_path;
    let ir_path = project.config().ir_path;
    let hash_before = fs::read(&hash_path).unwrap();
    let ir_before = fs::read(&ir_path).unwrap();
    let mtime_before = fs::metadata(&hash_path).unwrap().modified().unwrap();

    let second = orch.make(&project.config()).await.unwrap();

    assert_eq!(second.strategy, BuildStrategy::NoOp);
    assert_eq!(second.representation, first.representation);
    assert_eq!(second.summary.unchanged, 1);
    assert_eq!(engine.call_count(), 1);
    assert_eq!(fs::read(&hash_path).unwrap(), hash_before);
    assert_eq!(fs::read(&ir_path).unwrap(), ir_before);
    assert_eq!(fs::metadata(&hash_path).unwrap().modified().unwrap(), mtime_before);
}

#[tokio::test]
async fn edits_trigger_an_incremental_build_with_deltas() {
    let project = Project::simple();
    project.source("A.src", "module A");
    project.source("B.src", "module B");
    project.source("C.src", "module C");

    let engine = Arc::new(
        ScriptedEngine::new()
            .then(Scripted::Completed(json!({ "v": 1 })))
            .then(Scripted::Completed(json!({ "v": 2 }))),
    );
    let orch = orchestrator(engine.clone());
    orch.make(&project.config()).await.unwrap();

    project.source("A.src", "module A exposing (x)");
    project.remove("B.src");
    project.source("D.src", "module D");

    let outcome = orch.make(&project.config()).await.unwrap();
    assert_eq!(outcome.strategy, BuildStrategy::Incremental);
    assert_eq!(outcome.representation, json!({ "v": 2 }));

    let requests = engine.requests();
    match &requests[1] {
        CompileRequest::BuildIncrementally(req) => {
            assert_eq!(req.prior_representation, json!({ "v": 1 }));
            assert_eq!(req.file_changes.len(), 3);
            assert_eq!(
                req.file_changes["A.src"],
                FileDelta::Update("module A exposing (x)".to_string())
            );
            assert_eq!(req.file_changes["B.src"], FileDelta::Delete);
            assert_eq!(req.file_changes["D.src"], FileDelta::Insert("module D".to_string()));
            assert!(!req.file_changes.contains_key("C.src"));
        }
        other => panic!("expected incremental request, got {}", other.kind()),
    }

    let state = HashStateStore::new(project.config().hash_state_path)
        .load()
        .await
        .unwrap();
    let mut paths: Vec<_> = state.paths().cloned().collect();
    paths.sort();
    assert_eq!(paths, vec!["A.src", "C.src", "D.src"]);
}

#[tokio::test]
async fn engine_failure_leaves_state_untouched() {
    let project = Project::simple();
    project.source("A.src", "module A");

    let diagnostics = json!([{ "module": "A", "message": "type mismatch" }]);
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(Scripted::Completed(json!({ "v": 1 })))
            .then(Scripted::BuildFailed(diagnostics.clone())),
    );
    let orch = orchestrator(engine.clone());
    orch.make(&project.config()).await.unwrap();
    let hash_before = fs::read(project.config().hash_state_path).unwrap();

    project.source("A.src", "module A broken");
    let err = orch.make(&project.config()).await.unwrap_err();

    match &err {
        FrontendError::Build { body } => assert_eq!(*body, diagnostics),
        other => panic!("expected build error, got {other}"),
    }
    assert_eq!(fs::read(project.config().hash_state_path).unwrap(), hash_before);
    let ir: serde_json::Value =
        serde_json::from_slice(&fs::read(project.config().ir_path).unwrap()).unwrap();
    assert_eq!(ir, json!({ "v": 1 }));
}

#[tokio::test]
async fn first_build_failure_writes_nothing() {
    let project = Project::simple();
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new().then(Scripted::DecodeFailed(json!("bad"))));
    let err = orchestrator(engine)
        .make(&project.config())
        .await
        .unwrap_err();

    assert!(matches!(err, FrontendError::Decode { .. }));
    assert!(!project.config().hash_state_path.exists());
    assert!(!project.config().ir_path.exists());
}

#[tokio::test]
async fn transport_failure_is_an_engine_error() {
    let project = Project::simple();
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new().then(Scripted::Unreachable("gone".to_string())));
    let err = orchestrator(engine)
        .make(&project.config())
        .await
        .unwrap_err();
    assert!(matches!(err, FrontendError::Engine(_)));
    assert!(!project.config().hash_state_path.exists());
}

#[tokio::test]
async fn disabling_incremental_rebuilds_everything() {
    let project = Project::simple();
    project.source("A.src", "module A");
    project.source("B.src", "module B");

    let engine = Arc::new(ScriptedEngine::new());
    let orch = orchestrator(engine.clone());
    orch.make(&project.config()).await.unwrap();

    let outcome = orch
        .make(&project.config().with_incremental(false))
        .await
        .unwrap();
    assert_eq!(outcome.strategy, BuildStrategy::FromScratch);
    assert_eq!(outcome.summary.inserted, 2);
    assert_eq!(engine.call_count(), 2);
}

#[tokio::test]
async fn missing_hash_state_forces_from_scratch() {
    let project = Project::simple();
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new());
    let orch = orchestrator(engine.clone());
    orch.make(&project.config()).await.unwrap();
    fs::remove_file(project.config().hash_state_path).unwrap();

    let outcome = orch.make(&project.config()).await.unwrap();
    assert_eq!(outcome.strategy, BuildStrategy::FromScratch);
}

#[tokio::test]
async fn corrupt_prior_representation_forces_from_scratch() {
    let project = Project::simple();
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new());
    let orch = orchestrator(engine.clone());
    orch.make(&project.config()).await.unwrap();
    fs::write(project.config().ir_path, "{ truncated").unwrap();

    let outcome = orch.make(&project.config()).await.unwrap();
    assert_eq!(outcome.strategy, BuildStrategy::FromScratch);
    assert!(matches!(
        engine.requests()[1],
        CompileRequest::BuildFromScratch(_)
    ));
}

#[tokio::test]
async fn dependencies_are_sent_and_failures_reported() {
    let project = Project::new(json!({
        "name": "acme.app",
        "sourceDirectory": "src",
        "localDependencies": ["lib.json", "missing.json"]
    }));
    fs::write(project.root().join("lib.json"), LIB).unwrap();
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new());
    let outcome = orchestrator(engine.clone())
        .make(&project.config())
        .await
        .unwrap();

    assert_eq!(outcome.dependencies_resolved, 1);
    assert_eq!(outcome.dependency_failures.len(), 1);
    assert_eq!(outcome.dependency_failures[0].specifier, "missing.json");
    match &engine.requests()[0] {
        CompileRequest::BuildFromScratch(req) => {
            assert_eq!(req.dependencies.len(), 1);
            assert_eq!(req.dependencies[0].distribution_kind(), "Library");
        }
        other => panic!("unexpected request {}", other.kind()),
    }
}

#[tokio::test]
async fn required_dependencies_that_all_fail_abort_the_build() {
    let project = Project::new(json!({
        "name": "acme.app",
        "sourceDirectory": "src",
        "localDependencies": ["missing.json"]
    }));
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new());
    let err = orchestrator(engine.clone())
        .make(&project.config().with_require_dependencies(true))
        .await
        .unwrap_err();

    match err {
        FrontendError::DependenciesUnavailable { declared, failures } => {
            assert_eq!(declared, 1);
            assert_eq!(failures.len(), 1);
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(engine.call_count(), 0);
    assert!(!project.config().hash_state_path.exists());
}

#[tokio::test]
async fn preview_reports_without_building() {
    let project = Project::simple();
    project.source("A.src", "module A");

    let engine = Arc::new(ScriptedEngine::new());
    let orch = orchestrator(engine.clone());

    let plan = preview(&project.config()).await.unwrap();
    assert_eq!(plan.strategy, BuildStrategy::FromScratch);
    assert_eq!(plan.summary.inserted, 1);

    orch.make(&project.config()).await.unwrap();
    project.source("B.src", "module B");

    let plan = preview(&project.config()).await.unwrap();
    assert_eq!(plan.strategy, BuildStrategy::Incremental);
    assert_eq!(plan.summary.inserted, 1);
    assert_eq!(plan.summary.unchanged, 1);
    assert_eq!(engine.call_count(), 1);
}

#[tokio::test]
async fn missing_manifest_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(ScriptedEngine::new());
    let err = orchestrator(engine)
        .make(&BuildConfig::for_project(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, FrontendError::Io { .. }));
}

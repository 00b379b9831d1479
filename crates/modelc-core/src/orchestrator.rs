//! Build orchestration: pick the cheapest correct strategy, drive the engine,
//! persist state.
//!
//! ```text
//! Init -> { FromScratch | Incremental | NoOp } -> Persisted | Failed
//! ```
//!
//! Only a successful engine build writes anything: the new representation
//! first, then the hash state. `NoOp` and every failure leave both files
//! untouched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use modelc_deps::{DependencyError, DependencyResolver, Resolution};
use serde::Serialize;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::atomic::write_representation;
use crate::changes::{detect, ChangeSet, ChangeSummary, SnapshotScope};
use crate::engine::{
    CompilationEngine, CompileOptions, CompileRequest, FromScratchRequest, IncrementalRequest,
    IntermediateRepresentation,
};
use crate::error::{FrontendError, Result};
use crate::hash_state::{HashState, HashStateStore};
use crate::manifest::ProjectManifest;
use crate::obs;

pub const MANIFEST_FILE: &str = "modelc.json";
pub const IR_FILE: &str = "modelc-ir.json";
pub const HASH_STATE_FILE: &str = "modelc-hashes.json";

/// Where a build reads and writes, and how it behaves.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub project_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub ir_path: PathBuf,
    pub hash_state_path: PathBuf,
    /// When false every build is from scratch.
    pub incremental: bool,
    /// Extra dependency handles on top of the manifest's.
    pub includes: Vec<String>,
    pub options: CompileOptions,
    /// Fail when dependencies are declared but none could be loaded.
    pub require_dependencies: bool,
    /// Write the representation 4-space indented instead of compact.
    pub indent_json: bool,
}

impl BuildConfig {
    /// Defaults for a project directory: all files live next to the manifest.
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        BuildConfig {
            manifest_path: project_dir.join(MANIFEST_FILE),
            ir_path: project_dir.join(IR_FILE),
            hash_state_path: project_dir.join(HASH_STATE_FILE),
            project_dir,
            incremental: true,
            includes: Vec::new(),
            options: CompileOptions::default(),
            require_dependencies: false,
            indent_json: false,
        }
    }

    pub fn with_ir_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ir_path = path.into();
        self
    }

    pub fn with_hash_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hash_state_path = path.into();
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn with_includes(mut self, includes: Vec<String>) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_require_dependencies(mut self, require: bool) -> Self {
        self.require_dependencies = require;
        self
    }

    pub fn with_indent_json(mut self, indent: bool) -> Self {
        self.indent_json = indent;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildStrategy {
    /// Whole tree plus dependencies.
    FromScratch,
    /// Deltas plus dependencies plus the prior representation.
    Incremental,
    /// Nothing changed; the prior representation stands.
    NoOp,
}

impl BuildStrategy {
    /// `prior_available`: a usable prior representation and hash state both exist.
    pub fn select(prior_available: bool, has_changes: bool) -> Self {
        match (prior_available, has_changes) {
            (false, _) => BuildStrategy::FromScratch,
            (true, true) => BuildStrategy::Incremental,
            (true, false) => BuildStrategy::NoOp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStrategy::FromScratch => "FromScratch",
            BuildStrategy::Incremental => "Incremental",
            BuildStrategy::NoOp => "NoOp",
        }
    }
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything gathered before the engine is called.
#[derive(Debug)]
pub struct BuildState {
    pub prior: HashState,
    pub changes: ChangeSet,
    pub resolution: Resolution,
    pub prior_representation: Option<IntermediateRepresentation>,
    pub strategy: BuildStrategy,
}

/// A successful build.
#[derive(Debug)]
pub struct BuildOutcome {
    pub build_id: String,
    pub strategy: BuildStrategy,
    pub summary: ChangeSummary,
    pub representation: IntermediateRepresentation,
    pub dependencies_resolved: usize,
    /// Dependencies that were declared but could not be loaded.
    pub dependency_failures: Vec<DependencyError>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// What a build would do right now, without doing it.
#[derive(Debug)]
pub struct BuildPreview {
    pub strategy: BuildStrategy,
    pub summary: ChangeSummary,
    pub changes: ChangeSet,
}

/// Drives builds against one engine.
pub struct Orchestrator {
    engine: Arc<dyn CompilationEngine>,
    resolver: DependencyResolver,
}

impl Orchestrator {
    /// `resolver` is rebased onto each build's project directory.
    pub fn new(engine: Arc<dyn CompilationEngine>, resolver: DependencyResolver) -> Self {
        Orchestrator { engine, resolver }
    }

    /// Run one build.
    pub async fn make(&self, config: &BuildConfig) -> Result<BuildOutcome> {
        let build_id = Uuid::new_v4().to_string();
        let span = obs::build_span(&build_id);
        let result = self.run(config, &build_id).instrument(span.clone()).await;
        if let Err(err) = &result {
            let _entered = span.enter();
            obs::emit_build_failed(&build_id, err);
        }
        result
    }

    async fn run(&self, config: &BuildConfig, build_id: &str) -> Result<BuildOutcome> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let manifest = ProjectManifest::load(&config.manifest_path).await?;
        obs::emit_build_started(build_id, &manifest.name, config.incremental);

        let state = self.gather(config, &manifest).await?;
        let summary = state.changes.summary();
        obs::emit_changes_detected(state.strategy.as_str(), &summary);

        let BuildState {
            changes,
            resolution,
            prior_representation,
            strategy,
            ..
        } = state;
        let dependencies = resolution.documents();

        let representation = match (strategy, prior_representation) {
            (BuildStrategy::NoOp, Some(prior)) => {
                obs::emit_build_noop(summary.unchanged);
                prior
            }
            (BuildStrategy::Incremental, Some(prior)) => {
                let request = CompileRequest::BuildIncrementally(IncrementalRequest {
                    options: config.options.clone(),
                    package_info: manifest.package_info(),
                    dependencies,
                    file_changes: changes.to_delta_map(),
                    prior_representation: prior,
                });
                self.compile_and_persist(config, &request, &changes).await?
            }
            _ => {
                let request = CompileRequest::BuildFromScratch(FromScratchRequest {
                    options: config.options.clone(),
                    package_info: manifest.package_info(),
                    dependencies,
                    file_snapshot: changes.to_snapshot_map(SnapshotScope::FullTree),
                });
                self.compile_and_persist(config, &request, &changes).await?
            }
        };

        let duration_ms = clock.elapsed().as_millis() as u64;
        obs::emit_build_finished(build_id, strategy.as_str(), duration_ms, resolution.resolved.len());

        Ok(BuildOutcome {
            build_id: build_id.to_string(),
            strategy,
            summary,
            representation,
            dependencies_resolved: resolution.resolved.len(),
            dependency_failures: resolution.failures,
            started_at,
            duration_ms,
        })
    }

    /// Load prior state, then detect changes and resolve dependencies concurrently.
    async fn gather(&self, config: &BuildConfig, manifest: &ProjectManifest) -> Result<BuildState> {
        let (prior, prior_representation) = load_prior(config).await?;

        let specs = manifest.dependency_config(&config.includes).to_specs();
        let declared = specs.len();
        let resolver = self.resolver.rebased(&config.project_dir);
        let source_root = manifest.source_root(&config.project_dir);

        let (changes, resolution) =
            tokio::join!(detect(&prior, &source_root), resolver.resolve_all(specs));
        let changes = changes?;

        if !changes.unreadable.is_empty() {
            return Err(FrontendError::UnreadableSources {
                paths: changes.unreadable_paths(),
            });
        }
        if config.require_dependencies && declared > 0 && resolution.resolved.is_empty() {
            return Err(FrontendError::DependenciesUnavailable {
                declared,
                failures: resolution.failures,
            });
        }

        let strategy =
            BuildStrategy::select(prior_representation.is_some(), changes.has_any_change());
        Ok(BuildState {
            prior,
            changes,
            resolution,
            prior_representation,
            strategy,
        })
    }

    async fn compile_and_persist(
        &self,
        config: &BuildConfig,
        request: &CompileRequest,
        changes: &ChangeSet,
    ) -> Result<IntermediateRepresentation> {
        let representation = self.engine.compile(request).await?;
        write_representation(&config.ir_path, &representation, config.indent_json).await?;
        HashStateStore::new(&config.hash_state_path)
            .save(&changes.to_content_hashes())
            .await?;
        Ok(representation)
    }
}

/// Detect changes and pick a strategy for `config`.
///
/// Calls no engine, resolves no dependencies and writes nothing.
pub async fn preview(config: &BuildConfig) -> Result<BuildPreview> {
    let manifest = ProjectManifest::load(&config.manifest_path).await?;
    let (prior, prior_representation) = load_prior(config).await?;
    let changes = detect(&prior, &manifest.source_root(&config.project_dir)).await?;
    let strategy = BuildStrategy::select(prior_representation.is_some(), changes.has_any_change());
    Ok(BuildPreview {
        strategy,
        summary: changes.summary(),
        changes,
    })
}

/// Prior hash state and representation, when an incremental build is possible.
///
/// Both files must exist and the representation must parse; otherwise the
/// prior state is empty and the build starts from scratch.
async fn load_prior(config: &BuildConfig) -> Result<(HashState, Option<IntermediateRepresentation>)> {
    if !config.incremental {
        debug!("incremental builds disabled");
        return Ok((HashState::new(), None));
    }

    let store = HashStateStore::new(&config.hash_state_path);
    let representation = read_prior_representation(&config.ir_path).await?;
    match representation {
        Some(ir) if store.exists().await? => Ok((store.load().await?, Some(ir))),
        _ => Ok((HashState::new(), None)),
    }
}

async fn read_prior_representation(path: &Path) -> Result<Option<IntermediateRepresentation>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(FrontendError::io(path, source)),
    };
    match serde_json::from_slice(&bytes) {
        Ok(ir) => Ok(Some(ir)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "prior representation is not valid JSON, rebuilding from scratch");
            Ok(None)
        }
    }
}

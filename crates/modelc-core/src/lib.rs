//! modelc-core: incremental build front end for the model compiler
//!
//! Detects which source files changed since the last successful build, loads
//! declared dependency definitions, and drives the compilation engine with the
//! cheapest correct strategy: a full build, an incremental build, or nothing.

pub mod atomic;
pub mod changes;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod hash;
pub mod hash_state;
pub mod manifest;
pub mod obs;
pub mod orchestrator;
pub mod scan;
pub mod telemetry;

pub use changes::{
    detect, ChangeSet, ChangeSummary, FileChange, FileDelta, SnapshotScope, SourceSnapshot,
};
pub use engine::{
    CompilationEngine, CompileOptions, CompileRequest, EngineCommand, EngineError, EngineMessage,
    FromScratchRequest, IncrementalRequest, IntermediateRepresentation, ProcessEngine,
};
pub use error::{FrontendError, Result};
pub use hash::ContentHash;
pub use hash_state::{HashState, HashStateStore};
pub use manifest::ProjectManifest;
pub use orchestrator::{
    preview, BuildConfig, BuildOutcome, BuildPreview, BuildState, BuildStrategy, Orchestrator,
    HASH_STATE_FILE, IR_FILE, MANIFEST_FILE,
};
pub use scan::{scan, ScanError, ScanOutput, ScannedFile};
pub use telemetry::{init_tracing, LogFormat};

//! Request/response contract with the compilation engine.
//!
//! The engine parses, type-checks and produces the intermediate
//! representation. This crate only decides what to send it and interprets its
//! terminal answer.

pub mod process;

use std::collections::BTreeMap;

use async_trait::async_trait;
use modelc_deps::DefinitionDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::changes::FileDelta;

pub use process::{EngineCommand, ProcessEngine};

/// Opaque compiled output, passed through and persisted as JSON.
pub type IntermediateRepresentation = Value;

/// Options forwarded with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub types_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_to_modules: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FromScratchRequest {
    pub options: CompileOptions,
    pub package_info: Value,
    pub dependencies: Vec<DefinitionDocument>,
    /// Every file on disk, path -> content.
    pub file_snapshot: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalRequest {
    pub options: CompileOptions,
    pub package_info: Value,
    pub dependencies: Vec<DefinitionDocument>,
    /// Inserted, updated and deleted files only.
    pub file_changes: BTreeMap<String, FileDelta>,
    pub prior_representation: IntermediateRepresentation,
}

/// One build request. Serialized with a `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompileRequest {
    BuildFromScratch(FromScratchRequest),
    BuildIncrementally(IncrementalRequest),
}

impl CompileRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            CompileRequest::BuildFromScratch(_) => "buildFromScratch",
            CompileRequest::BuildIncrementally(_) => "buildIncrementally",
        }
    }

    pub fn options(&self) -> &CompileOptions {
        match self {
            CompileRequest::BuildFromScratch(r) => &r.options,
            CompileRequest::BuildIncrementally(r) => &r.options,
        }
    }
}

/// Failure answer from the engine, or failure to get one.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not decode the request.
    #[error("request rejected by engine: {body}")]
    Decode { body: Value },

    /// The build itself failed; `body` carries the engine's diagnostics.
    #[error("engine build failed: {body}")]
    Build { body: Value },

    #[error("engine transport: {0}")]
    Transport(String),
}

/// Messages an engine emits while handling one request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineMessage {
    Progress { message: String },
    BuildCompleted { ir: IntermediateRepresentation },
    DecodeFailed { error: Value },
    BuildFailed { error: Value },
}

impl EngineMessage {
    /// Terminal messages end the exchange; `None` for progress.
    pub fn into_outcome(self) -> Option<Result<IntermediateRepresentation, EngineError>> {
        match self {
            EngineMessage::Progress { .. } => None,
            EngineMessage::BuildCompleted { ir } => Some(Ok(ir)),
            EngineMessage::DecodeFailed { error } => Some(Err(EngineError::Decode { body: error })),
            EngineMessage::BuildFailed { error } => Some(Err(EngineError::Build { body: error })),
        }
    }
}

/// The compilation engine, as seen by the orchestrator.
#[async_trait]
pub trait CompilationEngine: Send + Sync {
    async fn compile(
        &self,
        request: &CompileRequest,
    ) -> Result<IntermediateRepresentation, EngineError>;
}

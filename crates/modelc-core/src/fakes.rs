//! In-memory engine for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::{CompilationEngine, CompileRequest, EngineError, IntermediateRepresentation};

/// Scripted response of a [`ScriptedEngine`].
#[derive(Debug, Clone)]
pub enum Scripted {
    Completed(Value),
    DecodeFailed(Value),
    BuildFailed(Value),
    Unreachable(String),
}

/// Engine that records every request and answers from a queue.
///
/// Once the queue is empty every request completes with a small IR naming the
/// request kind.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<CompileRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, response: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl CompilationEngine for ScriptedEngine {
    async fn compile(
        &self,
        request: &CompileRequest,
    ) -> Result<IntermediateRepresentation, EngineError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        match next {
            Some(Scripted::Completed(ir)) => Ok(ir),
            Some(Scripted::DecodeFailed(body)) => Err(EngineError::Decode { body }),
            Some(Scripted::BuildFailed(body)) => Err(EngineError::Build { body }),
            Some(Scripted::Unreachable(detail)) => Err(EngineError::Transport(detail)),
            None => Ok(json!({ "formatVersion": 3, "builtBy": request.kind() })),
        }
    }
}

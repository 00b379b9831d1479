//! Out-of-process engine speaking newline-delimited JSON.
//!
//! Each request spawns the configured command, writes the request as one JSON
//! line to its stdin and reads messages from its stdout until a terminal one
//! arrives. Stderr is inherited so engine diagnostics reach the user.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tracing::debug;

use super::{CompilationEngine, CompileRequest, EngineError, EngineMessage, IntermediateRepresentation};
use crate::obs;

/// How to launch the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Upper bound on one request, spawn to terminal message.
    pub timeout: Option<Duration>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        EngineCommand {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Engine handle backed by a child process per request. No retries.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    command: EngineCommand,
}

impl ProcessEngine {
    pub fn new(command: EngineCommand) -> Self {
        ProcessEngine { command }
    }

    pub fn command(&self) -> &EngineCommand {
        &self.command
    }

    async fn exchange(&self, mut payload: Vec<u8>) -> Result<IntermediateRepresentation, EngineError> {
        let program = self.command.program.display().to_string();
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Transport(format!("failed to start {program}: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Transport("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Transport("engine stdout unavailable".to_string()))?;

        payload.push(b'\n');
        // The engine may answer before it has drained stdin.
        let writer = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        });

        let outcome = read_messages(stdout).await;
        if let Ok(Some(_)) | Err(_) = &outcome {
            writer.abort();
        }
        if let Some(outcome) = outcome? {
            return outcome;
        }
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(EngineError::Transport(format!(
                    "failed to send request to {program}: {e}"
                )))
            }
            Err(e) => {
                return Err(EngineError::Transport(format!(
                    "request writer for {program} stopped: {e}"
                )))
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Transport(format!("failed to wait for {program}: {e}")))?;
        Err(EngineError::Transport(format!(
            "{program} exited ({status}) without a result"
        )))
    }
}

/// Read until a terminal message. `Ok(None)` when stdout closes first.
async fn read_messages(
    stdout: ChildStdout,
) -> Result<Option<Result<IntermediateRepresentation, EngineError>>, EngineError> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| EngineError::Transport(format!("failed to read engine output: {e}")))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message: EngineMessage = serde_json::from_str(line)
            .map_err(|e| EngineError::Transport(format!("malformed engine message: {e}")))?;
        if let EngineMessage::Progress { message } = &message {
            obs::emit_engine_progress(message);
            continue;
        }
        return Ok(message.into_outcome());
    }
    Ok(None)
}

#[async_trait]
impl CompilationEngine for ProcessEngine {
    async fn compile(
        &self,
        request: &CompileRequest,
    ) -> Result<IntermediateRepresentation, EngineError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| EngineError::Transport(format!("failed to encode request: {e}")))?;
        debug!(kind = request.kind(), bytes = payload.len(), "sending request to engine");

        match self.command.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(payload))
                .await
                .map_err(|_| {
                    EngineError::Transport(format!("engine timed out after {}ms", limit.as_millis()))
                })?,
            None => self.exchange(payload).await,
        }
    }
}

//! Structured lifecycle events for a build.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Verbosity follows `MODELC_LOG` / `RUST_LOG` (see [`crate::telemetry`]).

use tracing::{info, warn};

use crate::changes::ChangeSummary;

/// Span tagging everything logged during one build with its id.
///
/// Attach with [`tracing::Instrument`] so it survives across awaits.
pub fn build_span(build_id: &str) -> tracing::Span {
    tracing::info_span!("modelc.build", build_id = %build_id)
}

pub fn emit_build_started(build_id: &str, project: &str, incremental: bool) {
    info!(
        event = "build.started",
        build_id = %build_id,
        project = %project,
        incremental = incremental,
    );
}

/// Emitted before the engine is invoked.
pub fn emit_changes_detected(strategy: &str, summary: &ChangeSummary) {
    info!(
        event = "changes.detected",
        strategy = %strategy,
        inserted = summary.inserted,
        updated = summary.updated,
        deleted = summary.deleted,
        unchanged = summary.unchanged,
        "{summary}"
    );
}

pub fn emit_build_noop(unchanged: usize) {
    info!(
        event = "build.noop",
        unchanged = unchanged,
        "no source changes, nothing to build"
    );
}

pub fn emit_build_finished(build_id: &str, strategy: &str, duration_ms: u64, dependencies: usize) {
    info!(
        event = "build.finished",
        build_id = %build_id,
        strategy = %strategy,
        duration_ms = duration_ms,
        dependencies = dependencies,
    );
}

pub fn emit_build_failed(build_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "build.failed", build_id = %build_id, error = %error);
}

pub fn emit_engine_progress(message: &str) {
    info!(event = "engine.progress", "{message}");
}

//! Structured lifecycle events for review runs.
//!
//! - [`file_span`] scopes every event of one file to its path and content id.
//! - `emit_*` functions log one event each at `info!` (failures at `warn!`),
//!   tagged with a stable `event` field for log filtering.

use tracing::{info, warn};

use crate::domain::error::ErrorKind;

/// Span scoping every event of one file review to its path and content id.
/// Attach it to the review future with `Instrument`.
pub fn file_span(file: &str, content_id: &str) -> tracing::Span {
    tracing::info_span!("tribunal.file", file = %file, content_id = %content_id)
}

pub fn emit_file_started(file: &str, language: &str, total_chunks: usize) {
    info!(event = "file.started", file = %file, language = %language, total_chunks);
}

pub fn emit_chunk_planned(file: &str, chunk: usize, total: usize, start_line: u32, end_line: u32) {
    info!(
        event = "chunk.planned",
        file = %file,
        chunk,
        total,
        start_line,
        end_line,
    );
}

pub fn emit_chunk_reviewed(file: &str, chunk: usize, winner_index: usize, winner_agent: &str, findings: usize) {
    info!(
        event = "chunk.reviewed",
        file = %file,
        chunk,
        winner_index,
        winner_agent = %winner_agent,
        findings,
    );
}

pub fn emit_chunk_failed(file: &str, chunk: usize, kind: ErrorKind, error: &dyn std::fmt::Display) {
    warn!(event = "chunk.failed", file = %file, chunk, kind = %kind, error = %error);
}

/// Emit event: an agent attempt failed and will be retried after `delay_ms`.
pub fn emit_invocation_retry(
    agent: &str,
    attempt: u32,
    max_attempts: u32,
    delay_ms: u64,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "invocation.retry",
        agent = %agent,
        attempt,
        max_attempts,
        delay_ms,
        error = %error,
    );
}

pub fn emit_report_persisted(file: &str, json_path: &str, markdown_path: &str) {
    info!(event = "report.persisted", file = %file, json = %json_path, markdown = %markdown_path);
}

pub fn emit_file_finished(file: &str, duration_ms: u64, reviewed: usize, failed: usize, reused: bool) {
    info!(
        event = "file.finished",
        file = %file,
        duration_ms,
        reviewed,
        failed,
        reused,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_inside_file_span() {
        let _entered = file_span("src/a.cpp", "0123456789abcdef").entered();
        emit_file_started("src/a.cpp", "cpp", 3);
        emit_chunk_failed("src/a.cpp", 2, ErrorKind::Transient, &"timeout");
    }
}

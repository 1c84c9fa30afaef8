//! Structured file reports and their persistence.
//!
//! Each reviewed file yields two artifacts in the results directory:
//!
//! - `<safe_name>.<content_id>.json`: the structured [`FileReport`],
//! - `<safe_name>.<content_id>.md`: the rendered Markdown report,
//!
//! where `safe_name` is the relative path with separators replaced by `__`.
//! Both are written atomically (temp file in the destination directory,
//! then rename).

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::domain::error::{Result, ReviewError};
use crate::domain::identity::ContentId;
use crate::domain::review::WorkerReview;
use crate::domain::source::Language;
use crate::domain::verdict::{ArbitrationVerdict, ChunkFailure, ChunkSummary};

/// Version of the structured report layout.
pub const SCHEMA_VERSION: &str = "1.0";

/// A chunk that went through arbitration, with its raw inputs for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedChunk {
    pub summary: ChunkSummary,
    /// Worker reviews in worker order.
    pub reviews: Vec<WorkerReview>,
    pub verdict: ArbitrationVerdict,
}

/// Outcome of one chunk, in chunk order within a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Reviewed(ReviewedChunk),
    Failed(ChunkFailure),
}

/// Terminal per-file artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub file_path: String,
    pub language: Language,
    pub content_id: ContentId,
    pub threshold_lines: usize,
    pub chunk_lines: usize,
    pub chunks: Vec<ChunkOutcome>,
    /// Why the agent-written summary was not used, if one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_error: Option<String>,
    /// Rendered Markdown report.
    pub report_path: PathBuf,
}

impl FileReport {
    pub fn summaries(&self) -> Vec<ChunkSummary> {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                ChunkOutcome::Reviewed(r) => Some(r.summary.clone()),
                ChunkOutcome::Failed(_) => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<ChunkFailure> {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                ChunkOutcome::Failed(f) => Some(f.clone()),
                ChunkOutcome::Reviewed(_) => None,
            })
            .collect()
    }

    pub fn reviewed_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c, ChunkOutcome::Reviewed(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.chunks.len() - self.reviewed_count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }
}

/// Deterministic artifact locations for one file version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

impl ArtifactPaths {
    pub fn new(results_dir: &Path, relative_path: &str, content_id: &ContentId) -> Self {
        let stem = format!("{}.{}", safe_name(relative_path), content_id);
        Self {
            json: results_dir.join(format!("{stem}.json")),
            markdown: results_dir.join(format!("{stem}.md")),
        }
    }
}

/// Flatten a relative path into one file name (`src/a/b.cpp` becomes
/// `src__a__b.cpp`).
pub fn safe_name(relative_path: &str) -> String {
    relative_path
        .trim_start_matches("./")
        .replace(['/', '\\'], "__")
}

/// Write the structured report as pretty JSON.
pub fn write_report_json(path: &Path, report: &FileReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    write_atomic(path, content.as_bytes())
}

pub fn write_report_md(path: &Path, markdown: &str) -> Result<()> {
    write_atomic(path, markdown.as_bytes())
}

pub fn read_report_json(path: &Path) -> Result<FileReport> {
    let raw = std::fs::read_to_string(path).map_err(|e| ReviewError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| ReviewError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ReviewError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| ReviewError::io(path, e))?;
    tmp.persist(path).map_err(|e| ReviewError::io(path, e.error))?;
    Ok(())
}

//! Per-file review orchestration.
//!
//! For one file: plan chunks, review every chunk (worker fan-out, then
//! arbitration), synthesize the report, persist both artifacts. Chunks of a
//! file run concurrently and are reported in chunk order. A failed chunk is
//! recorded in the report instead of failing the file; only unreadable
//! sources and unwritable artifacts fail a file. Files in a batch run one
//! after another, and a failed file never stops the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, instrument, warn, Instrument};
use tribunal_llm::CompletionBackend;
use uuid::Uuid;

use crate::arbiter::{summarize_verdict, Arbitrator};
use crate::chunking::{Chunk, ChunkPlanner};
use crate::config::ReviewConfig;
use crate::dispatch::WorkerDispatch;
use crate::domain::error::Result;
use crate::domain::identity::ContentId;
use crate::domain::source::{Language, SourceFile};
use crate::domain::verdict::ChunkFailure;
use crate::invoker::RetryingInvoker;
use crate::obs::{self, file_span};
use crate::report::{
    read_report_json, write_report_json, write_report_md, ArtifactPaths, ChunkOutcome, FileReport,
    ReviewedChunk, SCHEMA_VERSION,
};
use crate::synth::{SynthesisInput, Synthesizer};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub file_path: String,
    pub content_id: ContentId,
    pub artifacts: ArtifactPaths,
    pub reviewed_chunks: usize,
    pub failed_chunks: usize,
    /// Artifacts from an earlier run were kept instead of re-reviewing.
    pub reused: bool,
}

impl FileOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_chunks == 0
    }
}

/// One batch entry: the input path and its outcome or terminal error.
#[derive(Debug)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub result: Result<FileOutcome>,
}

/// Result of a batch run, in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub entries: Vec<BatchEntry>,
    pub duration_ms: u64,
}

impl BatchSummary {
    /// Files whose every chunk was reviewed.
    pub fn complete_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, Ok(o) if o.is_complete()))
            .count()
    }

    /// Files with failed chunks but persisted reports.
    pub fn partial_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, Ok(o) if !o.is_complete()))
            .count()
    }

    /// Files that produced no report.
    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.complete_count() == self.entries.len()
    }
}

/// The review pipeline, built once from a validated [`ReviewConfig`].
pub struct ReviewPipeline {
    config: ReviewConfig,
    planner: ChunkPlanner,
    dispatch: WorkerDispatch,
    arbitrator: Arbitrator,
    synthesizer: Synthesizer,
    run_id: Uuid,
}

impl ReviewPipeline {
    /// Validate `config` and wire every stage to `backend`.
    ///
    /// All stages share one invoker, so `max_concurrent_invocations` bounds
    /// outstanding agent calls across the whole run.
    pub fn new(config: ReviewConfig, backend: Arc<dyn CompletionBackend>) -> Result<Self> {
        config.validate()?;
        let planner = config.planner()?;
        let invoker = RetryingInvoker::new(
            backend,
            config.retry.clone(),
            config.max_concurrent_invocations,
        );

        let dispatch = WorkerDispatch::new(invoker.clone(), config.workers.clone());
        let arbitrator = Arbitrator::new(invoker.clone(), config.supervisor.clone())
            .with_rerun_on_invalid(config.rerun_on_invalid_verdict);
        let synthesizer = match &config.synthesizer {
            Some(agent) => Synthesizer::with_narrator(invoker, agent.clone()),
            None => Synthesizer::new(),
        };

        Ok(Self {
            config,
            planner,
            dispatch,
            arbitrator,
            synthesizer,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Review each path in order; `root` determines relative paths.
    pub async fn run_batch(&self, root: &Path, paths: &[PathBuf]) -> BatchSummary {
        let start = Instant::now();
        info!(run_id = %self.run_id, files = paths.len(), "Starting review batch");

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let result = self.review_path(path, root).await;
            if let Err(err) = &result {
                warn!(file = %path.display(), kind = %err.kind(), error = %err, "File review failed");
            }
            entries.push(BatchEntry {
                path: path.clone(),
                result,
            });
        }

        let summary = BatchSummary {
            run_id: self.run_id,
            entries,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            run_id = %self.run_id,
            complete = summary.complete_count(),
            partial = summary.partial_count(),
            failed = summary.failed_count(),
            duration_ms = summary.duration_ms,
            "Review batch finished"
        );
        summary
    }

    /// Read `path` and review it.
    pub async fn review_path(&self, path: &Path, root: &Path) -> Result<FileOutcome> {
        let file = SourceFile::read(path, root)?;
        self.review_file(&file).await
    }

    /// Review one file and persist its artifacts.
    pub async fn review_file(&self, file: &SourceFile) -> Result<FileOutcome> {
        let content_id = file.content_id();
        let span = file_span(&file.relative_path, content_id.as_str());
        self.review_file_inner(file, content_id).instrument(span).await
    }

    async fn review_file_inner(&self, file: &SourceFile, content_id: ContentId) -> Result<FileOutcome> {
        let start = Instant::now();
        let artifacts =
            ArtifactPaths::new(&self.config.results_dir, &file.relative_path, &content_id);

        if self.config.reuse_existing {
            if let Some(outcome) = self.reusable(file, &content_id, &artifacts) {
                obs::emit_file_finished(
                    &file.relative_path,
                    start.elapsed().as_millis() as u64,
                    outcome.reviewed_chunks,
                    0,
                    true,
                );
                return Ok(outcome);
            }
        }

        let chunks = self.planner.plan(file);
        obs::emit_file_started(&file.relative_path, file.language.as_str(), chunks.len());
        for chunk in &chunks {
            obs::emit_chunk_planned(
                &file.relative_path,
                chunk.index,
                chunk.total,
                chunk.start_line,
                chunk.end_line(),
            );
        }

        let results = join_all(chunks.iter().map(|chunk| self.review_chunk(chunk, file.language))).await;

        let mut outcomes = Vec::with_capacity(chunks.len());
        for (chunk, result) in chunks.iter().zip(results) {
            match result {
                Ok(reviewed) => {
                    obs::emit_chunk_reviewed(
                        &file.relative_path,
                        chunk.index,
                        reviewed.summary.winner_index,
                        &reviewed.summary.winner_agent,
                        reviewed.summary.winning_review.findings.len(),
                    );
                    outcomes.push(ChunkOutcome::Reviewed(reviewed));
                }
                Err(err) => {
                    obs::emit_chunk_failed(&file.relative_path, chunk.index, err.kind(), &err);
                    outcomes.push(ChunkOutcome::Failed(ChunkFailure::new(chunk, &err)));
                }
            }
        }

        let mut report = FileReport {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            run_id: self.run_id,
            file_path: file.relative_path.clone(),
            language: file.language,
            content_id: content_id.clone(),
            threshold_lines: self.planner.threshold_lines(),
            chunk_lines: self.planner.chunk_lines(),
            chunks: outcomes,
            narrative_error: None,
            report_path: artifacts.markdown.clone(),
        };

        let summaries = report.summaries();
        let failures = report.failures();
        let synthesis = self
            .synthesizer
            .synthesize(&SynthesisInput {
                file_path: &file.relative_path,
                language: file.language,
                content_id: &content_id,
                summaries: &summaries,
                failures: &failures,
            })
            .await;
        report.narrative_error = synthesis.narrative_error;

        // The JSON report is written last; its presence marks a finished run.
        write_report_md(&artifacts.markdown, &synthesis.markdown)?;
        write_report_json(&artifacts.json, &report)?;
        obs::emit_report_persisted(
            &file.relative_path,
            &artifacts.json.to_string_lossy(),
            &artifacts.markdown.to_string_lossy(),
        );

        let outcome = FileOutcome {
            file_path: file.relative_path.clone(),
            content_id,
            artifacts,
            reviewed_chunks: report.reviewed_count(),
            failed_chunks: report.failed_count(),
            reused: false,
        };
        obs::emit_file_finished(
            &file.relative_path,
            start.elapsed().as_millis() as u64,
            outcome.reviewed_chunks,
            outcome.failed_chunks,
            false,
        );
        Ok(outcome)
    }

    /// Worker fan-out then arbitration for one chunk.
    #[instrument(skip(self, chunk), fields(chunk = chunk.index, start_line = chunk.start_line))]
    pub async fn review_chunk(&self, chunk: &Chunk, language: Language) -> Result<ReviewedChunk> {
        let reviews = self.dispatch.dispatch(chunk, language).await?;
        let verdict = self.arbitrator.arbitrate(&reviews).await?;
        let summary = summarize_verdict(chunk, &reviews, &verdict)?;
        Ok(ReviewedChunk {
            summary,
            reviews,
            verdict,
        })
    }

    /// Every reviewed chunk of `report` was judged over the configured
    /// workers, in the configured order.
    fn same_workers(&self, report: &FileReport) -> bool {
        let expected: Vec<&str> = self.dispatch.workers().iter().map(|w| w.id.as_str()).collect();
        report.chunks.iter().all(|outcome| match outcome {
            ChunkOutcome::Reviewed(chunk) => chunk
                .reviews
                .iter()
                .map(|r| r.agent_id.as_str())
                .eq(expected.iter().copied()),
            ChunkOutcome::Failed(_) => true,
        })
    }

    /// Outcome from a prior run, if its artifacts can stand for this content
    /// and for the current chunking and worker settings.
    fn reusable(
        &self,
        file: &SourceFile,
        content_id: &ContentId,
        artifacts: &ArtifactPaths,
    ) -> Option<FileOutcome> {
        if !artifacts.json.is_file() || !artifacts.markdown.is_file() {
            return None;
        }
        let report = match read_report_json(&artifacts.json) {
            Ok(report) => report,
            Err(err) => {
                warn!(file = %file.relative_path, error = %err, "Ignoring unreadable prior report");
                return None;
            }
        };
        if report.content_id != *content_id || report.has_failures() {
            return None;
        }
        if report.threshold_lines != self.planner.threshold_lines()
            || report.chunk_lines != self.planner.chunk_lines()
            || !self.same_workers(&report)
        {
            info!(file = %file.relative_path, "Prior report used different settings, reviewing again");
            return None;
        }
        info!(file = %file.relative_path, "Reusing prior review artifacts");
        Some(FileOutcome {
            file_path: file.relative_path.clone(),
            content_id: content_id.clone(),
            artifacts: artifacts.clone(),
            reviewed_chunks: report.reviewed_count(),
            failed_chunks: 0,
            reused: true,
        })
    }
}

//! Tribunal Core Library
//!
//! Multi-agent code review pipeline: files are split into line-addressed
//! chunks, each chunk is reviewed concurrently by several worker agents, a
//! supervisor agent arbitrates between their reviews, and the winning
//! reviews are synthesized into one report per file.

pub mod arbiter;
pub mod chunking;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod extract;
pub mod invoker;
pub mod obs;
pub mod overlay;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod synth;
pub mod telemetry;

pub use arbiter::{summarize_verdict, Arbitrator};
pub use chunking::{Chunk, ChunkPlanner};
pub use config::{AgentConfig, ChunkingConfig, ReviewConfig};
pub use dispatch::WorkerDispatch;
pub use domain::{
    ArbitrationVerdict, Category, CategoryCounts, ChunkFailure, ChunkSummary, ContentId, ErrorKind,
    Finding, Language, Result, ReviewError, ReviewPayload, ReviewScore, Severity, SourceFile,
    ValidationError, VerdictPayload, WorkerReview,
};
pub use extract::{decode_payload, extract_payload};
pub use invoker::{RetryPolicy, RetryingInvoker};
pub use overlay::{overlay, overlay_chunk, parse_marker};
pub use pipeline::{BatchEntry, BatchSummary, FileOutcome, ReviewPipeline};
pub use report::{ArtifactPaths, ChunkOutcome, FileReport, ReviewedChunk};
pub use synth::{render_markdown, Synthesis, SynthesisInput, Synthesizer};
pub use telemetry::init_tracing;

pub use tribunal_llm::{CompletionBackend, CompletionRequest, LlmError};

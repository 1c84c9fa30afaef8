//! Concurrent fan-out of one chunk to every reviewer agent.
//!
//! Results land in a slot array addressed by worker position, so the output
//! is index-aligned with the worker list no matter which call finishes
//! first. Any worker failure fails the chunk; the arbitrator needs the
//! complete review set.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, instrument};
use tribunal_llm::CompletionRequest;

use crate::chunking::Chunk;
use crate::config::AgentConfig;
use crate::domain::error::{Result, ReviewError};
use crate::domain::review::{ReviewPayload, WorkerReview};
use crate::domain::source::Language;
use crate::extract::decode_payload;
use crate::invoker::RetryingInvoker;
use crate::prompts::worker_prompt;

/// Sends chunks to the configured reviewer agents.
#[derive(Clone)]
pub struct WorkerDispatch {
    invoker: RetryingInvoker,
    workers: Arc<Vec<AgentConfig>>,
}

impl WorkerDispatch {
    pub fn new(invoker: RetryingInvoker, workers: Vec<AgentConfig>) -> Self {
        Self {
            invoker,
            workers: Arc::new(workers),
        }
    }

    pub fn workers(&self) -> &[AgentConfig] {
        &self.workers
    }

    /// Review `chunk` with every worker concurrently.
    ///
    /// Returns one validated review per worker, in worker order. Every call
    /// is allowed to resolve before a failure is reported; when several
    /// workers fail, the error of the earliest worker is returned.
    #[instrument(
        skip(self, chunk),
        fields(file = %chunk.file_path, chunk = chunk.index, workers = self.workers.len())
    )]
    pub async fn dispatch(&self, chunk: &Chunk, language: Language) -> Result<Vec<WorkerReview>> {
        let prompt = worker_prompt(chunk, language);
        let lines = chunk.line_range();

        let mut join_set = JoinSet::new();
        for (idx, worker) in self.workers.iter().enumerate() {
            let invoker = self.invoker.clone();
            let request =
                CompletionRequest::new(&worker.id, &worker.model, worker.temperature, prompt.clone());
            let lines = lines.clone();
            join_set.spawn(async move {
                let agent_id = request.agent_id.clone();
                let outcome = invoker
                    .invoke_decoded(&request, |raw| {
                        decode_payload::<ReviewPayload>(raw)
                            .map(|payload| payload.into_review(&agent_id))
                            .map_err(|e| e.to_string())
                    })
                    .await
                    .and_then(|review| {
                        review.validate(lines)?;
                        Ok(review)
                    });
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<Result<WorkerReview>>> =
            (0..self.workers.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (idx, outcome) =
                joined.map_err(|e| ReviewError::Internal(format!("worker task join error: {e}")))?;
            debug!(worker = idx + 1, ok = outcome.is_ok(), "Worker resolved");
            slots[idx] = Some(outcome);
        }

        let mut reviews = Vec::with_capacity(slots.len());
        for (worker, slot) in self.workers.iter().zip(slots) {
            let outcome = slot.ok_or_else(|| {
                ReviewError::Internal(format!("missing result for worker '{}'", worker.id))
            })?;
            reviews.push(outcome?);
        }
        Ok(reviews)
    }
}

//! Supervisor arbitration over the worker reviews of one chunk.

use tracing::{instrument, warn};
use tribunal_llm::CompletionRequest;

use crate::chunking::Chunk;
use crate::config::AgentConfig;
use crate::domain::error::{Result, ReviewError, ValidationError};
use crate::domain::review::WorkerReview;
use crate::domain::verdict::{ArbitrationVerdict, ChunkSummary, VerdictPayload};
use crate::extract::decode_payload;
use crate::invoker::RetryingInvoker;
use crate::prompts::supervisor_prompt;

/// Asks the supervisor agent to pick a winner among worker reviews.
#[derive(Clone)]
pub struct Arbitrator {
    invoker: RetryingInvoker,
    supervisor: AgentConfig,
    rerun_on_invalid: bool,
}

impl Arbitrator {
    pub fn new(invoker: RetryingInvoker, supervisor: AgentConfig) -> Self {
        Self {
            invoker,
            supervisor,
            rerun_on_invalid: false,
        }
    }

    /// Re-run the supervisor call once when its verdict fails validation.
    pub fn with_rerun_on_invalid(mut self, rerun: bool) -> Self {
        self.rerun_on_invalid = rerun;
        self
    }

    /// Judge `reviews` (in worker order) and return a validated verdict.
    ///
    /// A verdict that decodes but fails validation is terminal unless the
    /// re-run option is enabled, in which case exactly one more call is made.
    #[instrument(skip(self, reviews), fields(supervisor = %self.supervisor.id, reviews = reviews.len()))]
    pub async fn arbitrate(&self, reviews: &[WorkerReview]) -> Result<ArbitrationVerdict> {
        if reviews.is_empty() {
            return Err(ValidationError::EmptyReviewSet.into());
        }

        let request = CompletionRequest::new(
            &self.supervisor.id,
            &self.supervisor.model,
            self.supervisor.temperature,
            supervisor_prompt(reviews),
        );

        let mut verdict = match self.judge(&request, reviews.len()).await {
            Err(ReviewError::Validation(err)) if self.rerun_on_invalid => {
                warn!(error = %err, "Verdict failed validation, re-running arbitration once");
                self.judge(&request, reviews.len()).await?
            }
            other => other?,
        };

        if verdict.winning_review_text.trim().is_empty() {
            if let Some(winner) = verdict.winner_index.checked_sub(1).and_then(|i| reviews.get(i)) {
                verdict.winning_review_text = winner.to_prompt_text();
            }
        }
        Ok(verdict)
    }

    async fn judge(&self, request: &CompletionRequest, reviews: usize) -> Result<ArbitrationVerdict> {
        let payload = self
            .invoker
            .invoke_decoded(request, |raw| {
                decode_payload::<VerdictPayload>(raw).map_err(|e| e.to_string())
            })
            .await?;
        Ok(payload.validate(reviews)?)
    }
}

/// The part of a verdict the synthesizer needs, plus the winning review.
pub fn summarize_verdict(
    chunk: &Chunk,
    reviews: &[WorkerReview],
    verdict: &ArbitrationVerdict,
) -> Result<ChunkSummary> {
    let winner = verdict
        .winner_index
        .checked_sub(1)
        .and_then(|i| reviews.get(i))
        .cloned()
        .ok_or(ValidationError::WinnerOutOfRange {
            winner: verdict.winner_index as i64,
            reviews: reviews.len(),
        })?;

    Ok(ChunkSummary {
        file_path: chunk.file_path.clone(),
        chunk_index: chunk.index,
        total_chunks: chunk.total,
        start_line: chunk.start_line,
        end_line: chunk.end_line(),
        winner_index: verdict.winner_index,
        winner_agent: winner.agent_id.clone(),
        scores: verdict.scores.clone(),
        merged_takeaways: verdict.merged_takeaways.clone(),
        winning_review_text: verdict.winning_review_text.clone(),
        winning_review: winner,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::review::CategoryCounts;
    use crate::invoker::RetryPolicy;
    use tribunal_llm::fakes::{ScriptStep, ScriptedBackend};

    fn reviews() -> Vec<WorkerReview> {
        ["first", "second"]
            .iter()
            .enumerate()
            .map(|(i, summary)| WorkerReview {
                agent_id: format!("w{}", i + 1),
                summary: summary.to_string(),
                findings: vec![],
                counts: CategoryCounts::default(),
            })
            .collect()
    }

    fn verdict_json(winner: i64, score_count: usize, text: &str) -> String {
        let scores: Vec<String> = (1..=score_count)
            .map(|i| {
                format!(
                    r#"{{"review_index":{i},"accuracy":7,"completeness":6,"clarity":8,"insightfulness":5,"notes":""}}"#
                )
            })
            .collect();
        format!(
            r#"{{"analysis":"compared","scores":[{}],"winner_index":{winner},
            "merged_takeaways":["Check bounds","check   BOUNDS","Free the buffer"],
            "winning_review_text":"{text}"}}"#,
            scores.join(",")
        )
    }

    fn arbitrator(backend: Arc<ScriptedBackend>) -> Arbitrator {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        Arbitrator::new(
            RetryingInvoker::new(backend, policy, 4),
            AgentConfig::new("supervisor", "gpt-4o", 0.1),
        )
    }

    fn chunk() -> Chunk {
        Chunk {
            file_path: "a.cpp".to_string(),
            index: 2,
            total: 3,
            start_line: 401,
            text: "x\ny\n".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_verdict_selects_winner() {
        let backend = Arc::new(
            ScriptedBackend::new().script("supervisor", vec![ScriptStep::reply(verdict_json(2, 2, "w2 text"))]),
        );
        let verdict = arbitrator(backend).arbitrate(&reviews()).await.unwrap();
        let summary = summarize_verdict(&chunk(), &reviews(), &verdict).unwrap();

        assert_eq!(summary.winner_index, 2);
        assert_eq!(summary.winner_agent, "w2");
        assert_eq!(summary.winning_review.summary, "second");
        assert_eq!(summary.start_line, 401);
        assert_eq!(summary.end_line, 402);
        assert_eq!(summary.merged_takeaways, vec!["Check bounds", "Free the buffer"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_prompt_labels_reviews() {
        let backend = Arc::new(
            ScriptedBackend::new().script("supervisor", vec![ScriptStep::reply(verdict_json(1, 2, "t"))]),
        );
        arbitrator(backend.clone()).arbitrate(&reviews()).await.unwrap();
        let prompt = &backend.calls()[0].prompt;
        assert!(prompt.contains("--- Review 1 ---"));
        assert!(prompt.contains("--- Review 2 ---"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_winner_is_rejected_without_retry() {
        for winner in [0, -1, 3] {
            let backend = Arc::new(
                ScriptedBackend::new()
                    .with_responder(move |_| ScriptStep::reply(verdict_json(winner, 2, "t"))),
            );
            let err = arbitrator(backend.clone())
                .arbitrate(&reviews())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ReviewError::Validation(ValidationError::WinnerOutOfRange { .. })
            ));
            assert_eq!(backend.call_count("supervisor"), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_count_mismatch_is_rejected() {
        let backend = Arc::new(
            ScriptedBackend::new().with_responder(|_| ScriptStep::reply(verdict_json(1, 1, "t"))),
        );
        let err = arbitrator(backend).arbitrate(&reviews()).await.unwrap_err();
        assert!(matches!(
            err,
            ReviewError::Validation(ValidationError::ScoreCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_on_invalid_makes_one_more_call() {
        let backend = Arc::new(ScriptedBackend::new().script(
            "supervisor",
            vec![
                ScriptStep::reply(verdict_json(5, 2, "t")),
                ScriptStep::reply(verdict_json(1, 2, "t")),
            ],
        ));
        let verdict = arbitrator(backend.clone())
            .with_rerun_on_invalid(true)
            .arbitrate(&reviews())
            .await
            .unwrap();
        assert_eq!(verdict.winner_index, 1);
        assert_eq!(backend.call_count("supervisor"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_winning_text_is_filled_from_review() {
        let backend = Arc::new(
            ScriptedBackend::new().script("supervisor", vec![ScriptStep::reply(verdict_json(1, 2, ""))]),
        );
        let verdict = arbitrator(backend).arbitrate(&reviews()).await.unwrap();
        assert!(verdict.winning_review_text.contains("first"));
    }

    #[tokio::test]
    async fn test_empty_review_set_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new());
        let err = arbitrator(backend.clone()).arbitrate(&[]).await.unwrap_err();
        assert!(matches!(
            err,
            ReviewError::Validation(ValidationError::EmptyReviewSet)
        ));
        assert!(backend.calls().is_empty());
    }
}

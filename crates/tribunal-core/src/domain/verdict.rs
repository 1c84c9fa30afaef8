//! Supervisor verdicts and the per-chunk summaries built from them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::domain::error::{ErrorKind, ReviewError, ValidationError};
use crate::domain::review::WorkerReview;

/// Inclusive lower bound for every score criterion.
pub const SCORE_MIN: f64 = 0.0;
/// Inclusive upper bound for every score criterion.
pub const SCORE_MAX: f64 = 10.0;

/// Supervisor's assessment of one input review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewScore {
    /// 1-based position of the review in the supervisor prompt.
    pub review_index: i64,
    pub accuracy: f64,
    pub completeness: f64,
    pub clarity: f64,
    pub insightfulness: f64,
    #[serde(default)]
    pub notes: String,
}

impl ReviewScore {
    fn criteria(&self) -> [(&'static str, f64); 4] {
        [
            ("accuracy", self.accuracy),
            ("completeness", self.completeness),
            ("clarity", self.clarity),
            ("insightfulness", self.insightfulness),
        ]
    }

    /// Unweighted mean of the four criteria.
    pub fn mean(&self) -> f64 {
        self.criteria().iter().map(|(_, v)| v).sum::<f64>() / 4.0
    }
}

/// Supervisor output as the wire contract defines it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictPayload {
    pub analysis: String,
    pub scores: Vec<ReviewScore>,
    pub winner_index: i64,
    #[serde(default)]
    pub merged_takeaways: Vec<String>,
    #[serde(default)]
    pub winning_review_text: String,
}

impl VerdictPayload {
    /// Check the payload against the number of reviews it judged.
    ///
    /// `winner_index` must lie in `1..=reviews`, and `scores` must hold
    /// exactly one in-bounds entry per review. Takeaways are deduplicated,
    /// keeping first occurrences in order.
    pub fn validate(self, reviews: usize) -> Result<ArbitrationVerdict, ValidationError> {
        if reviews == 0 {
            return Err(ValidationError::EmptyReviewSet);
        }
        if self.winner_index < 1 || self.winner_index > reviews as i64 {
            return Err(ValidationError::WinnerOutOfRange {
                winner: self.winner_index,
                reviews,
            });
        }
        if self.scores.len() != reviews {
            return Err(ValidationError::ScoreCountMismatch {
                expected: reviews,
                actual: self.scores.len(),
            });
        }

        let mut seen = HashSet::new();
        for score in &self.scores {
            if score.review_index < 1
                || score.review_index > reviews as i64
                || !seen.insert(score.review_index)
            {
                return Err(ValidationError::ScoreIndexMismatch {
                    index: score.review_index,
                    reviews,
                });
            }
            for (criterion, value) in score.criteria() {
                if !value.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                    return Err(ValidationError::ScoreOutOfBounds {
                        review_index: score.review_index,
                        criterion: criterion.to_string(),
                        value,
                        min: SCORE_MIN,
                        max: SCORE_MAX,
                    });
                }
            }
        }

        let mut scores = self.scores;
        scores.sort_by_key(|s| s.review_index);

        Ok(ArbitrationVerdict {
            analysis: self.analysis,
            scores,
            winner_index: self.winner_index as usize,
            merged_takeaways: dedupe_takeaways(self.merged_takeaways),
            winning_review_text: self.winning_review_text,
        })
    }
}

/// A validated verdict. `winner_index` is 1-based and always in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationVerdict {
    pub analysis: String,
    /// One entry per input review, ordered by `review_index`.
    pub scores: Vec<ReviewScore>,
    pub winner_index: usize,
    pub merged_takeaways: Vec<String>,
    pub winning_review_text: String,
}

/// Drop blank and repeated takeaways (whitespace and case insensitive).
pub fn dedupe_takeaways(takeaways: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    takeaways
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| {
            let key = t
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            seen.insert(key)
        })
        .collect()
}

/// Everything the synthesizer needs from one arbitrated chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub file_path: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_line: u32,
    pub end_line: u32,
    pub winner_index: usize,
    pub winner_agent: String,
    pub scores: Vec<ReviewScore>,
    pub merged_takeaways: Vec<String>,
    pub winning_review_text: String,
    /// Structured form of the winning review; authoritative for this chunk.
    pub winning_review: WorkerReview,
}

/// A chunk that produced no summary, kept visible in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub file_path: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_line: u32,
    pub end_line: u32,
    pub kind: ErrorKind,
    pub message: String,
}

impl ChunkFailure {
    pub fn new(chunk: &Chunk, error: &ReviewError) -> Self {
        Self {
            file_path: chunk.file_path.clone(),
            chunk_index: chunk.index,
            total_chunks: chunk.total,
            start_line: chunk.start_line,
            end_line: chunk.end_line(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(index: i64, value: f64) -> ReviewScore {
        ReviewScore {
            review_index: index,
            accuracy: value,
            completeness: value,
            clarity: value,
            insightfulness: value,
            notes: String::new(),
        }
    }

    fn payload(winner: i64, scores: Vec<ReviewScore>) -> VerdictPayload {
        VerdictPayload {
            analysis: "review 2 is more specific".to_string(),
            scores,
            winner_index: winner,
            merged_takeaways: vec![],
            winning_review_text: "text".to_string(),
        }
    }

    #[test]
    fn test_verdict_decodes_wire_keys() {
        let raw = r#"{
            "analysis": "a",
            "scores": [{"review_index": 1, "accuracy": 7.5, "completeness": 6,
                        "clarity": 8, "insightfulness": 5, "notes": "ok"}],
            "winner_index": 1,
            "merged_takeaways": ["x"],
            "winning_review_text": "w"
        }"#;
        let parsed: VerdictPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.scores[0].accuracy, 7.5);
        assert_eq!(parsed.winner_index, 1);
    }

    #[test]
    fn test_validate_accepts_consistent_verdict() {
        let verdict = payload(2, vec![score(2, 8.0), score(1, 6.0)])
            .validate(2)
            .unwrap();
        assert_eq!(verdict.winner_index, 2);
        assert_eq!(verdict.scores[0].review_index, 1);
        assert_eq!(verdict.scores[1].review_index, 2);
    }

    #[test]
    fn test_validate_rejects_winner_zero_negative_and_too_large() {
        for winner in [0, -1, 3] {
            let err = payload(winner, vec![score(1, 5.0), score(2, 5.0)])
                .validate(2)
                .unwrap_err();
            assert_eq!(
                err,
                ValidationError::WinnerOutOfRange { winner, reviews: 2 }
            );
        }
    }

    #[test]
    fn test_validate_rejects_score_count_mismatch() {
        let err = payload(1, vec![score(1, 5.0)]).validate(2).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ScoreCountMismatch {
                expected: 2,
                actual: 1
            }
        );

        let err = payload(1, vec![score(1, 5.0), score(2, 5.0), score(3, 5.0)])
            .validate(2)
            .unwrap_err();
        assert!(matches!(err, ValidationError::ScoreCountMismatch { .. }));
    }

    #[test]
    fn test_validate_rejects_duplicate_score_index() {
        let err = payload(1, vec![score(1, 5.0), score(1, 6.0)])
            .validate(2)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ScoreIndexMismatch { index: 1, .. }
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_score() {
        let err = payload(1, vec![score(1, 11.0), score(2, 5.0)])
            .validate(2)
            .unwrap_err();
        assert!(matches!(err, ValidationError::ScoreOutOfBounds { .. }));
    }

    #[test]
    fn test_dedupe_takeaways_keeps_first_occurrence() {
        let merged = dedupe_takeaways(vec![
            "Use RAII for the file handle".to_string(),
            "  use raii for the   file handle ".to_string(),
            "".to_string(),
            "Avoid copying the vector".to_string(),
        ]);
        assert_eq!(
            merged,
            vec![
                "Use RAII for the file handle".to_string(),
                "Avoid copying the vector".to_string()
            ]
        );
    }

    #[test]
    fn test_score_mean() {
        let s = ReviewScore {
            review_index: 1,
            accuracy: 8.0,
            completeness: 6.0,
            clarity: 4.0,
            insightfulness: 2.0,
            notes: String::new(),
        };
        assert_eq!(s.mean(), 5.0);
    }
}

//! Error taxonomy for the review pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Decoded output that is syntactically valid but semantically inconsistent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("winner_index {winner} is outside 1..={reviews}")]
    WinnerOutOfRange { winner: i64, reviews: usize },

    #[error("expected {expected} score entries, got {actual}")]
    ScoreCountMismatch { expected: usize, actual: usize },

    #[error("score review_index {index} is duplicated or outside 1..={reviews}")]
    ScoreIndexMismatch { index: i64, reviews: usize },

    #[error("score {criterion}={value} for review {review_index} is outside [{min}, {max}]")]
    ScoreOutOfBounds {
        review_index: i64,
        criterion: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("counts.{category} is {declared} but {actual} finding(s) carry that type")]
    CountMismatch {
        category: String,
        declared: u32,
        actual: u32,
    },

    #[error("finding references line {line}, outside chunk lines {start}..={end}")]
    LineOutOfRange { line: u32, start: u32, end: u32 },

    #[error("cannot arbitrate an empty review set")]
    EmptyReviewSet,
}

/// Review pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Transport or provider failure that survived every retry.
    #[error("agent '{agent}' failed after {attempts} attempt(s): {reason}")]
    Transient {
        agent: String,
        attempts: u32,
        reason: String,
    },

    /// Output could not be decoded, including after the repair round-trip.
    #[error("agent '{agent}' returned undecodable output (repair attempted: {repaired}): {reason}")]
    Decode {
        agent: String,
        repaired: bool,
        reason: String,
    },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pipeline task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReviewError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable classification used in persisted reports and logs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::Transient { .. } => ErrorKind::Transient,
            ReviewError::Decode { .. } => ErrorKind::Decode,
            ReviewError::Validation(_) => ErrorKind::Validation,
            ReviewError::Io { .. } => ErrorKind::Io,
            ReviewError::InvalidConfig(_) => ErrorKind::Config,
            ReviewError::Serialization(_) => ErrorKind::Serialization,
            ReviewError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Coarse error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Decode,
    Validation,
    Io,
    Config,
    Serialization,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Decode => "decode",
            ErrorKind::Validation => "validation",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Result type for review pipeline operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

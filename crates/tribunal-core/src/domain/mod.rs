//! Domain model for the review pipeline.

pub mod error;
pub mod identity;
pub mod review;
pub mod source;
pub mod verdict;

pub use error::{ErrorKind, Result, ReviewError, ValidationError};
pub use identity::ContentId;
pub use review::{Category, CategoryCounts, Finding, ReviewPayload, Severity, WorkerReview};
pub use source::{Language, SourceFile};
pub use verdict::{ArbitrationVerdict, ChunkFailure, ChunkSummary, ReviewScore, VerdictPayload};

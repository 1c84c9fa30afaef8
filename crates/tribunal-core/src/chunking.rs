//! Line-bounded chunk planning.
//!
//! A file at or under the threshold becomes one chunk. Larger files are cut
//! into contiguous windows of at most `chunk_lines` lines. Chunks keep their
//! line terminators, so concatenating chunk texts in order reproduces the
//! file byte for byte regardless of its newline convention.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, ReviewError};
use crate::domain::source::SourceFile;

/// A contiguous slice of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Relative path of the owning file.
    pub file_path: String,
    /// 1-based position within the file.
    pub index: usize,
    /// Number of chunks the file was split into.
    pub total: usize,
    /// Original line number of the first line.
    pub start_line: u32,
    /// Raw text, line terminators included.
    pub text: String,
}

impl Chunk {
    pub fn line_count(&self) -> u32 {
        count_lines(&self.text)
    }

    /// Original line number of the last line (equals `start_line` when empty).
    pub fn end_line(&self) -> u32 {
        self.start_line + self.line_count().saturating_sub(1)
    }

    /// Original line numbers covered by this chunk.
    pub fn line_range(&self) -> RangeInclusive<u32> {
        self.start_line..=self.end_line()
    }
}

/// Splits files into chunks according to a threshold and a window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    threshold_lines: usize,
    chunk_lines: usize,
}

impl ChunkPlanner {
    /// `chunk_lines` must be non-zero; `threshold_lines` may be anything.
    pub fn new(threshold_lines: usize, chunk_lines: usize) -> Result<Self> {
        if chunk_lines == 0 {
            return Err(ReviewError::InvalidConfig(
                "chunk_lines must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            threshold_lines,
            chunk_lines,
        })
    }

    pub fn threshold_lines(&self) -> usize {
        self.threshold_lines
    }

    pub fn chunk_lines(&self) -> usize {
        self.chunk_lines
    }

    pub fn plan(&self, file: &SourceFile) -> Vec<Chunk> {
        self.plan_text(&file.relative_path, &file.text)
    }

    /// Plan chunks for `text`. Always returns at least one chunk.
    pub fn plan_text(&self, file_path: &str, text: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();

        if lines.len() <= self.threshold_lines {
            return vec![Chunk {
                file_path: file_path.to_string(),
                index: 1,
                total: 1,
                start_line: 1,
                text: text.to_string(),
            }];
        }

        let total = lines.len().div_ceil(self.chunk_lines);
        lines
            .chunks(self.chunk_lines)
            .enumerate()
            .map(|(i, window)| Chunk {
                file_path: file_path.to_string(),
                index: i + 1,
                total,
                start_line: (i * self.chunk_lines) as u32 + 1,
                text: window.concat(),
            })
            .collect()
    }
}

/// Number of lines in `text`; a trailing line without a terminator counts.
pub fn count_lines(text: &str) -> u32 {
    text.split_inclusive('\n').count() as u32
}

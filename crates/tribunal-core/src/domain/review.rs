//! Worker reviews and their findings.
//!
//! Field names follow the worker wire contract (`type`, `snippet`, `diff`),
//! so the same types decode agent output and serialize into reports.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::domain::error::ValidationError;

/// Finding category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Bug,
    Performance,
    Style,
    Maintainability,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Bug,
        Category::Performance,
        Category::Style,
        Category::Maintainability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Performance => "performance",
            Category::Style => "style",
            Category::Maintainability => "maintainability",
        }
    }

    /// Section heading used in rendered reports.
    pub fn heading(&self) -> &'static str {
        match self {
            Category::Bug => "Bugs",
            Category::Performance => "Performance",
            Category::Style => "Style & Readability",
            Category::Maintainability => "Maintainability",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Impact weight used to prioritise actions.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 3,
            Severity::High => 7,
            Severity::Critical => 15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue reported by a worker, anchored to original line numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(default)]
    pub title: String,
    pub severity: Severity,
    #[serde(default)]
    pub lines: BTreeSet<u32>,
    #[serde(rename = "snippet", default)]
    pub excerpt: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub suggestion: String,
    /// Unified diff; empty when the worker offered none.
    #[serde(rename = "diff", default)]
    pub patch: String,
}

impl Finding {
    /// Compact line reference such as `L12`, `L12-L14` or `L3, L9-L10`.
    pub fn line_label(&self) -> String {
        if self.lines.is_empty() {
            return "n/a".to_string();
        }
        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for &line in &self.lines {
            match ranges.last_mut() {
                Some((_, end)) if *end + 1 == line => *end = line,
                _ => ranges.push((line, line)),
            }
        }
        ranges
            .into_iter()
            .map(|(start, end)| {
                if start == end {
                    format!("L{start}")
                } else {
                    format!("L{start}-L{end}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// First referenced line, used for stable ordering.
    pub fn first_line(&self) -> u32 {
        self.lines.iter().next().copied().unwrap_or(0)
    }
}

/// Declared number of findings per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub bug: u32,
    pub performance: u32,
    pub style: u32,
    pub maintainability: u32,
}

impl CategoryCounts {
    /// Count `findings` per category.
    pub fn tally<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            *counts.slot_mut(finding.category) += 1;
        }
        counts
    }

    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Bug => self.bug,
            Category::Performance => self.performance,
            Category::Style => self.style,
            Category::Maintainability => self.maintainability,
        }
    }

    fn slot_mut(&mut self, category: Category) -> &mut u32 {
        match category {
            Category::Bug => &mut self.bug,
            Category::Performance => &mut self.performance,
            Category::Style => &mut self.style,
            Category::Maintainability => &mut self.maintainability,
        }
    }

    pub fn total(&self) -> u32 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Worker output exactly as the wire contract defines it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub counts: CategoryCounts,
}

impl ReviewPayload {
    pub fn into_review(self, agent_id: &str) -> WorkerReview {
        WorkerReview {
            agent_id: agent_id.to_string(),
            summary: self.summary,
            findings: self.findings,
            counts: self.counts,
        }
    }
}

/// A decoded review attributed to the agent that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReview {
    pub agent_id: String,
    pub summary: String,
    pub findings: Vec<Finding>,
    pub counts: CategoryCounts,
}

impl WorkerReview {
    /// Check the structural invariants against the chunk's line range.
    ///
    /// `counts` must match the findings per category, and every referenced
    /// line must fall inside `lines`.
    pub fn validate(&self, lines: RangeInclusive<u32>) -> Result<(), ValidationError> {
        let actual = CategoryCounts::tally(&self.findings);
        for category in Category::ALL {
            let declared = self.counts.get(category);
            let found = actual.get(category);
            if declared != found {
                return Err(ValidationError::CountMismatch {
                    category: category.to_string(),
                    declared,
                    actual: found,
                });
            }
        }

        for finding in &self.findings {
            if let Some(&line) = finding.lines.iter().find(|l| !lines.contains(*l)) {
                return Err(ValidationError::LineOutOfRange {
                    line,
                    start: *lines.start(),
                    end: *lines.end(),
                });
            }
        }
        Ok(())
    }

    /// Render as plain text for the supervisor prompt.
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string_pretty(&ReviewPayloadRef {
            summary: &self.summary,
            findings: &self.findings,
            counts: &self.counts,
        })
        .unwrap_or_else(|_| self.summary.clone())
    }
}

#[derive(Serialize)]
struct ReviewPayloadRef<'a> {
    summary: &'a str,
    findings: &'a [Finding],
    counts: &'a CategoryCounts,
}

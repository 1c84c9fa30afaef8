//! File-level synthesis of arbitrated chunk summaries.
//!
//! The Markdown report is rendered deterministically from the winning
//! reviews; each winner is authoritative for its chunk and nothing is
//! re-scored here. An optional narrator agent may write the executive
//! summary. If it fails, the deterministic summary is used and the failure
//! is listed in the report.

use std::fmt::Write as _;

use tracing::{instrument, warn};
use tribunal_llm::CompletionRequest;

use crate::config::AgentConfig;
use crate::domain::identity::ContentId;
use crate::domain::review::{Category, CategoryCounts, Finding};
use crate::domain::source::Language;
use crate::domain::verdict::{ChunkFailure, ChunkSummary};
use crate::invoker::RetryingInvoker;
use crate::prompts::synthesizer_prompt;

/// Cap on entries in the prioritized action list.
pub const MAX_ACTIONS: usize = 10;

/// Everything known about one file once its chunks are arbitrated.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub file_path: &'a str,
    pub language: Language,
    pub content_id: &'a ContentId,
    /// In chunk order.
    pub summaries: &'a [ChunkSummary],
    /// In chunk order.
    pub failures: &'a [ChunkFailure],
}

/// Rendered report plus the narrator failure, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub markdown: String,
    pub narrative_error: Option<String>,
}

#[derive(Clone, Default)]
pub struct Synthesizer {
    narrator: Option<(RetryingInvoker, AgentConfig)>,
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_narrator(invoker: RetryingInvoker, agent: AgentConfig) -> Self {
        Self {
            narrator: Some((invoker, agent)),
        }
    }

    #[instrument(skip(self, input), fields(file = %input.file_path, chunks = input.summaries.len()))]
    pub async fn synthesize(&self, input: &SynthesisInput<'_>) -> Synthesis {
        let mut narrative_error = None;
        let mut narrative = None;

        if let (Some((invoker, agent)), false) = (&self.narrator, input.summaries.is_empty()) {
            match self.narrate(invoker, agent, input).await {
                Ok(text) => narrative = Some(text),
                Err(reason) => {
                    warn!(reason = %reason, "Narrative synthesis failed, using deterministic summary");
                    narrative_error = Some(reason);
                }
            }
        }

        Synthesis {
            markdown: render_markdown(input, narrative.as_deref(), narrative_error.as_deref()),
            narrative_error,
        }
    }

    async fn narrate(
        &self,
        invoker: &RetryingInvoker,
        agent: &AgentConfig,
        input: &SynthesisInput<'_>,
    ) -> Result<String, String> {
        let prompt = synthesizer_prompt(input.file_path, input.summaries).map_err(|e| e.to_string())?;
        let request = CompletionRequest::new(&agent.id, &agent.model, agent.temperature, prompt);
        let text = invoker.invoke(&request).await.map_err(|e| e.to_string())?;
        let text = text.trim();
        if text.is_empty() {
            return Err(format!("agent '{}' returned an empty narrative", agent.id));
        }
        Ok(text.to_string())
    }
}

/// Render the file report. Output depends only on the arguments.
pub fn render_markdown(
    input: &SynthesisInput<'_>,
    narrative: Option<&str>,
    narrative_error: Option<&str>,
) -> String {
    let findings: Vec<&Finding> = input
        .summaries
        .iter()
        .flat_map(|s| s.winning_review.findings.iter())
        .collect();
    let counts = CategoryCounts::tally(findings.iter().copied());
    let total_chunks = input.summaries.len() + input.failures.len();

    let mut out = String::new();
    let _ = writeln!(out, "# Code Review: `{}`\n", input.file_path);
    let _ = writeln!(out, "- Language: {}", input.language);
    let _ = writeln!(out, "- Content id: `{}`", input.content_id);
    let _ = writeln!(
        out,
        "- Chunks: {} ({} reviewed, {} failed)\n",
        total_chunks,
        input.summaries.len(),
        input.failures.len()
    );

    out.push_str("## Executive Summary\n\n");
    match narrative {
        Some(text) => {
            out.push_str(text);
            out.push_str("\n\n");
        }
        None => {
            let _ = writeln!(
                out,
                "{} finding(s) across {} reviewed chunk(s): {} bug, {} performance, {} style, {} maintainability.",
                counts.total(),
                input.summaries.len(),
                counts.bug,
                counts.performance,
                counts.style,
                counts.maintainability
            );
            if let Some(worst) = findings.iter().map(|f| f.severity).max() {
                let _ = writeln!(out, "Highest severity: {worst}.");
            }
            if !input.failures.is_empty() {
                let _ = writeln!(
                    out,
                    "{} chunk(s) could not be reviewed; see Failed Chunks.",
                    input.failures.len()
                );
            }
            out.push('\n');
        }
    }
    for summary in input.summaries {
        let _ = writeln!(
            out,
            "- Chunk {}/{} (L{}-L{}, winner: review {} by `{}`): {}",
            summary.chunk_index,
            summary.total_chunks,
            summary.start_line,
            summary.end_line,
            summary.winner_index,
            summary.winner_agent,
            one_line(&summary.winning_review.summary)
        );
    }
    if !input.summaries.is_empty() {
        out.push('\n');
    }

    out.push_str("## Findings by Category\n\n");
    for category in Category::ALL {
        let _ = writeln!(out, "### {}\n", category.heading());
        let mut in_category: Vec<&Finding> = findings
            .iter()
            .copied()
            .filter(|f| f.category == category)
            .collect();
        in_category.sort_by_key(|f| f.first_line());
        if in_category.is_empty() {
            out.push_str("_None reported._\n\n");
            continue;
        }
        for finding in in_category {
            let _ = writeln!(
                out,
                "- **[{}] {}** ({}): {}",
                finding.severity,
                title_of(finding),
                finding.line_label(),
                one_line(&finding.explanation)
            );
            if !finding.suggestion.trim().is_empty() {
                let _ = writeln!(out, "  - Suggestion: {}", one_line(&finding.suggestion));
            }
        }
        out.push('\n');
    }

    out.push_str("## Prioritized Actions\n\n");
    let actions = prioritized(&findings);
    if actions.is_empty() {
        out.push_str("_No actions._\n\n");
    } else {
        for (rank, finding) in actions.iter().take(MAX_ACTIONS).enumerate() {
            let action = if finding.suggestion.trim().is_empty() {
                title_of(finding)
            } else {
                one_line(&finding.suggestion)
            };
            let _ = writeln!(
                out,
                "{}. [{}] {} ({})",
                rank + 1,
                finding.severity,
                action,
                finding.line_label()
            );
        }
        if actions.len() > MAX_ACTIONS {
            let _ = writeln!(
                out,
                "\n_{} lower-priority item(s) omitted; see Findings by Category._",
                actions.len() - MAX_ACTIONS
            );
        }
        out.push('\n');
    }

    let takeaways: Vec<&ChunkSummary> = input
        .summaries
        .iter()
        .filter(|s| !s.merged_takeaways.is_empty())
        .collect();
    if !takeaways.is_empty() {
        out.push_str("## Cross-Review Takeaways\n\n");
        for summary in takeaways {
            let _ = writeln!(
                out,
                "**Chunk {}/{} (L{}-L{})**\n",
                summary.chunk_index, summary.total_chunks, summary.start_line, summary.end_line
            );
            for takeaway in &summary.merged_takeaways {
                let _ = writeln!(out, "- {}", one_line(takeaway));
            }
            out.push('\n');
        }
    }

    if let Some(finding) = actions.iter().find(|f| !f.patch.trim().is_empty()) {
        out.push_str("## Illustrative Patch\n\n");
        let _ = writeln!(out, "{} ({})\n", title_of(finding), finding.line_label());
        let _ = writeln!(out, "```diff\n{}\n```\n", finding.patch.trim_end());
    }

    if !input.failures.is_empty() {
        out.push_str("## Failed Chunks\n\n");
        for failure in input.failures {
            let _ = writeln!(
                out,
                "- Chunk {}/{} (L{}-L{}): {} error: {}",
                failure.chunk_index,
                failure.total_chunks,
                failure.start_line,
                failure.end_line,
                failure.kind,
                one_line(&failure.message)
            );
        }
        out.push('\n');
    }

    if let Some(reason) = narrative_error {
        out.push_str("## Synthesis Notes\n\n");
        let _ = writeln!(out, "- Narrative summary unavailable: {}\n", one_line(reason));
    }

    out
}

/// Findings by descending severity weight, then by first line.
fn prioritized<'a>(findings: &[&'a Finding]) -> Vec<&'a Finding> {
    let mut sorted = findings.to_vec();
    sorted.sort_by(|a, b| {
        b.severity
            .weight()
            .cmp(&a.severity.weight())
            .then(a.first_line().cmp(&b.first_line()))
    });
    sorted
}

fn title_of(finding: &Finding) -> String {
    if finding.title.trim().is_empty() {
        format!("{} issue", finding.category)
    } else {
        one_line(&finding.title)
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::error::ErrorKind;
    use crate::domain::review::{Severity, WorkerReview};
    use crate::invoker::RetryPolicy;
    use tribunal_llm::fakes::{ScriptStep, ScriptedBackend};

    fn finding(category: Category, severity: Severity, line: u32, title: &str, patch: &str) -> Finding {
        Finding {
            category,
            title: title.to_string(),
            severity,
            lines: [line].into_iter().collect(),
            excerpt: String::new(),
            explanation: format!("explains {title}"),
            suggestion: format!("fix {title}"),
            patch: patch.to_string(),
        }
    }

    fn summary(index: usize, start: u32, findings: Vec<Finding>) -> ChunkSummary {
        let counts = CategoryCounts::tally(&findings);
        ChunkSummary {
            file_path: "src/a.cpp".to_string(),
            chunk_index: index,
            total_chunks: 3,
            start_line: start,
            end_line: start + 399,
            winner_index: 1,
            winner_agent: "worker1".to_string(),
            scores: vec![],
            merged_takeaways: vec![format!("takeaway {index}")],
            winning_review_text: String::new(),
            winning_review: WorkerReview {
                agent_id: "worker1".to_string(),
                summary: format!("chunk {index} summary"),
                findings,
                counts,
            },
        }
    }

    fn failure() -> ChunkFailure {
        ChunkFailure {
            file_path: "src/a.cpp".to_string(),
            chunk_index: 2,
            total_chunks: 3,
            start_line: 401,
            end_line: 800,
            kind: ErrorKind::Transient,
            message: "agent 'worker2' failed after 4 attempt(s)".to_string(),
        }
    }

    fn fixture() -> (Vec<ChunkSummary>, Vec<ChunkFailure>, ContentId) {
        let summaries = vec![
            summary(
                1,
                1,
                vec![
                    finding(Category::Style, Severity::Low, 30, "naming", ""),
                    finding(Category::Bug, Severity::Medium, 12, "off by one", ""),
                ],
            ),
            summary(
                3,
                801,
                vec![finding(
                    Category::Bug,
                    Severity::Critical,
                    900,
                    "use after free",
                    "--- a\n+++ b\n-delete p;\n",
                )],
            ),
        ];
        (summaries, vec![failure()], ContentId::compute(&["src/a.cpp", "x"]))
    }

    #[test]
    fn test_render_is_deterministic_and_complete() {
        let (summaries, failures, id) = fixture();
        let input = SynthesisInput {
            file_path: "src/a.cpp",
            language: Language::Cpp,
            content_id: &id,
            summaries: &summaries,
            failures: &failures,
        };
        let md = render_markdown(&input, None, None);
        assert_eq!(md, render_markdown(&input, None, None));

        assert!(md.starts_with("# Code Review: `src/a.cpp`"));
        assert!(md.contains("- Chunks: 3 (2 reviewed, 1 failed)"));
        assert!(md.contains("3 finding(s) across 2 reviewed chunk(s): 2 bug, 0 performance, 1 style"));
        assert!(md.contains("Highest severity: critical."));
        assert!(md.contains("### Bugs"));
        assert!(md.contains("- **[critical] use after free** (L900)"));
        assert!(md.contains("takeaway 3"));
        assert!(md.contains("## Failed Chunks"));
        assert!(md.contains("- Chunk 2/3 (L401-L800): transient error:"));
        assert!(md.contains("```diff\n--- a\n+++ b\n-delete p;\n```"));
        assert!(!md.contains("## Synthesis Notes"));
    }

    #[test]
    fn test_actions_ordered_by_severity_then_line() {
        let (summaries, failures, id) = fixture();
        let input = SynthesisInput {
            file_path: "src/a.cpp",
            language: Language::Cpp,
            content_id: &id,
            summaries: &summaries,
            failures: &failures,
        };
        let md = render_markdown(&input, None, None);
        let first = md.find("1. [critical] fix use after free (L900)").unwrap();
        let second = md.find("2. [medium] fix off by one (L12)").unwrap();
        let third = md.find("3. [low] fix naming (L30)").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_bug_findings_sorted_by_line_within_category() {
        let (summaries, failures, id) = fixture();
        let input = SynthesisInput {
            file_path: "src/a.cpp",
            language: Language::Cpp,
            content_id: &id,
            summaries: &summaries,
            failures: &failures,
        };
        let md = render_markdown(&input, None, None);
        let early = md.find("off by one** (L12)").unwrap();
        let late = md.find("use after free** (L900)").unwrap();
        assert!(early < late);
    }

    #[tokio::test(start_paused = true)]
    async fn test_narrator_failure_falls_back_and_is_reported() {
        let (summaries, failures, id) = fixture();
        let backend = Arc::new(ScriptedBackend::new().with_responder(|_| ScriptStep::fail("quota")));
        let policy = RetryPolicy {
            jitter: false,
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let synth = Synthesizer::with_narrator(
            RetryingInvoker::new(backend, policy, 1),
            AgentConfig::new("writer", "gpt-4o", 0.3),
        );
        let input = SynthesisInput {
            file_path: "src/a.cpp",
            language: Language::Cpp,
            content_id: &id,
            summaries: &summaries,
            failures: &failures,
        };
        let out = synth.synthesize(&input).await;
        assert!(out.narrative_error.as_deref().unwrap().contains("quota"));
        assert!(out.markdown.contains("3 finding(s)"));
        assert!(out.markdown.contains("## Synthesis Notes"));
    }

    #[tokio::test]
    async fn test_narrator_text_becomes_executive_summary() {
        let (summaries, failures, id) = fixture();
        let backend = Arc::new(
            ScriptedBackend::new().with_responder(|_| ScriptStep::reply("The file leaks memory.")),
        );
        let synth = Synthesizer::with_narrator(
            RetryingInvoker::new(backend, RetryPolicy::default(), 1),
            AgentConfig::new("writer", "gpt-4o", 0.3),
        );
        let input = SynthesisInput {
            file_path: "src/a.cpp",
            language: Language::Cpp,
            content_id: &id,
            summaries: &summaries,
            failures: &failures,
        };
        let out = synth.synthesize(&input).await;
        assert_eq!(out.narrative_error, None);
        assert!(out.markdown.contains("## Executive Summary\n\nThe file leaks memory."));
        assert!(!out.markdown.contains("3 finding(s)"));
    }
}

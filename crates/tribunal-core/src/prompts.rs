//! Prompt rendering for worker, supervisor and synthesizer agents.
//!
//! The wording is a fixed contract with the agents; only the context fields
//! (language, file, chunk position, overlaid code, reviews) vary.

use crate::chunking::Chunk;
use crate::domain::error::Result;
use crate::domain::review::WorkerReview;
use crate::domain::source::Language;
use crate::domain::verdict::ChunkSummary;
use crate::overlay::overlay_chunk;

pub const WORKER_SCHEMA: &str = r#"Return ONLY valid JSON with this structure (no prose outside JSON):

{
  "summary": "one-paragraph overview of key issues and themes",
  "findings": [
    {
      "type": "bug | performance | style | maintainability",
      "title": "short title",
      "severity": "low | medium | high | critical",
      "lines": [12, 13],
      "snippet": "small relevant code excerpt (<= 10 lines)",
      "explanation": "why this is an issue",
      "suggestion": "actionable fix or improvement",
      "diff": "optional unified diff patch (empty string if not applicable)"
    }
  ],
  "counts": {"bug": 0, "performance": 0, "style": 0, "maintainability": 0}
}

"lines" must use the original line numbers shown in the L#### markers.
"counts" must equal the number of findings of each type."#;

pub const SUPERVISOR_SCHEMA: &str = r#"Return ONLY valid JSON with this structure (no prose outside JSON):

{
  "analysis": "brief comparison across reviews",
  "scores": [
    {
      "review_index": 1,
      "accuracy": 0.0,
      "completeness": 0.0,
      "clarity": 0.0,
      "insightfulness": 0.0,
      "notes": "brief justification"
    }
  ],
  "winner_index": 1,
  "merged_takeaways": [
    "concise bullet capturing the best, non-duplicated insights across reviews"
  ],
  "winning_review_text": "the full text of the winning review"
}

Provide exactly one "scores" entry per review. Scores range from 0 to 10.
"winner_index" is the 1-based number of the best review."#;

/// Worker prompt for one chunk, specialised by language.
pub fn worker_prompt(chunk: &Chunk, language: Language) -> String {
    let preamble = match language {
        Language::Cpp => {
            "You are an expert C++ reviewer (C++17/20). Apply the C++ Core Guidelines, RAII, \
             const-correctness, exception safety, performance (allocations, copies, move \
             semantics) and readability.\n\
             Focus additionally on correctness (UB, lifetimes, thread-safety, iterator \
             invalidation) and API design (value categories, noexcept, ODR, header hygiene)."
                .to_string()
        }
        Language::Python => {
            "You are an expert Python reviewer. Apply PEP 8 and PEP 20, type hints, error \
             handling, performance (avoid quadratic loops and eager I/O) and maintainability."
                .to_string()
        }
        other => format!(
            "You are an expert code reviewer for {other} code. Analyze the code for \
             1) bugs and errors, 2) performance, 3) style and readability, \
             4) maintainability and best practices."
        ),
    };

    format!(
        "{preamble}\n\n\
         Context:\n\
         - Language: {language}\n\
         - File: {file}\n\
         - Chunk: {index}/{total}\n\n\
         IMPORTANT:\n\
         - Every code line is prefixed with its original line number (L####). Use those numbers.\n\
         - Be specific and actionable.\n\
         - Follow the JSON schema strictly.\n\n\
         {schema}\n\n\
         --- CODE START ---\n\
         {code}\n\
         --- CODE END ---\n",
        file = chunk.file_path,
        index = chunk.index,
        total = chunk.total,
        schema = WORKER_SCHEMA,
        code = overlay_chunk(chunk),
    )
}

/// Reviews labelled `--- Review N ---` in input order, 1-based.
pub fn review_blocks(reviews: &[WorkerReview]) -> String {
    reviews
        .iter()
        .enumerate()
        .map(|(i, review)| format!("--- Review {} ---\n{}\n\n", i + 1, review.to_prompt_text()))
        .collect()
}

pub fn supervisor_prompt(reviews: &[WorkerReview]) -> String {
    format!(
        "You are a Staff Software Engineer evaluating {count} AI code reviews of the SAME code chunk.\n\
         Pick the best review and synthesize cross-review takeaways.\n\n\
         Judge the reviews on internal consistency, specificity and plausibility.\n\n\
         Criteria:\n\
         - Accuracy\n\
         - Completeness (bugs, performance, style)\n\
         - Clarity\n\
         - Insightfulness\n\n\
         Return STRICT JSON as per schema.\n\n\
         {schema}\n\n\
         --- REVIEWS START ---\n\
         {blocks}\
         --- REVIEWS END ---\n",
        count = reviews.len(),
        schema = SUPERVISOR_SCHEMA,
        blocks = review_blocks(reviews),
    )
}

/// Narrative prompt over the arbitrated chunk summaries of one file.
pub fn synthesizer_prompt(file_path: &str, summaries: &[ChunkSummary]) -> Result<String> {
    let mut blobs = String::new();
    for summary in summaries {
        blobs.push_str(&serde_json::to_string(summary)?);
        blobs.push('\n');
    }
    Ok(format!(
        "You are a Principal Engineer writing the executive summary of a review of {file_path}, \
         merging the BEST per-chunk reviews and their takeaways.\n\n\
         Write a concise executive summary in Markdown for humans (at most three paragraphs). \
         Do not re-score the reviews and keep every line reference as given.\n\n\
         --- CHUNK SUMMARIES (JSON, one per chunk) ---\n\
         {blobs}\
         --- END ---\n"
    ))
}

//! Original line-number markers for chunk text.
//!
//! Every line is rendered as `L<number>: <line>`, where `<number>` is the
//! original 1-based line number zero-padded to at least [`MIN_MARKER_WIDTH`]
//! digits (`L0042: return x;`). Blank lines get markers too. Line content is
//! never altered; only the terminator is normalised to `\n`.

use crate::chunking::Chunk;

/// Minimum digit count of a line marker.
pub const MIN_MARKER_WIDTH: usize = 4;

/// Prefix every line of `text` with its original line number.
pub fn overlay(text: &str, start_line: u32) -> String {
    let line_count = text.split_inclusive('\n').count() as u32;
    if line_count == 0 {
        return String::new();
    }
    let last = start_line + line_count - 1;
    let width = MIN_MARKER_WIDTH.max(last.to_string().len());

    text.split_inclusive('\n')
        .zip(start_line..)
        .map(|(line, number)| format!("L{number:0width$}: {}", strip_terminator(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn overlay_chunk(chunk: &Chunk) -> String {
    overlay(&chunk.text, chunk.start_line)
}

/// Split one overlaid line back into its line number and original content.
pub fn parse_marker(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix('L')?;
    let (digits, content) = rest.split_once(": ")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, content))
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

//! Hints for steps whose literal target was not found.
//!
//! When a snapshot no longer matches, the usual cause is a small drift in
//! one line (whitespace, a renamed identifier, an edited comment). Pointing
//! at the most similar line in the current buffer makes that drift visible.

use crate::step::Step;

/// Lines scoring below this are not worth showing.
pub const MIN_SIMILARITY: f64 = 0.6;

/// The buffer line that best resembles a missing search literal.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMiss {
    /// 1-based line number in the buffer.
    pub line_number: usize,
    pub line: String,
    /// The line of the search literal it was compared with.
    pub expected: String,
    /// Normalized Levenshtein similarity in `[0, 1]`.
    pub similarity: f64,
}

/// Find the closest buffer line to the first line of `search` that is
/// absent from the buffer.
pub fn nearest_line(buffer: &str, search: &str) -> Option<NearMiss> {
    // Lines of the literal that still appear verbatim are not the drift
    let expected = search
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .find(|l| !buffer.lines().any(|b| b.trim() == *l))?;

    buffer
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let similarity = strsim::normalized_levenshtein(line.trim(), expected);
            (idx, line, similarity)
        })
        .filter(|(_, _, similarity)| *similarity >= MIN_SIMILARITY)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(idx, line, similarity)| NearMiss {
            line_number: idx + 1,
            line: line.to_string(),
            expected: expected.to_string(),
            similarity,
        })
}

/// Near-miss hint for a step, when it searches for a literal.
pub fn explain_miss(step: &Step, buffer: &str) -> Option<NearMiss> {
    step.kind
        .search_literal()
        .and_then(|search| nearest_line(buffer, search))
}

//! Overlapping fixed-size text splitter.
//!
//! Splits lesson body text into chunks of a target character budget, with a
//! fixed number of trailing characters re-included at the start of each
//! subsequent chunk so that information spanning a boundary is carried by
//! both sides. Splits prefer a sentence or line boundary when one falls
//! within a small tolerance of the target length, else hard-split at the
//! character budget.

/// Fraction of the chunk size searched backwards for a sentence boundary.
const BOUNDARY_TOLERANCE_DIVISOR: usize = 5;

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Each chunk is an exact slice of the input, so concatenating the chunks in
/// order and removing the `overlap`-character duplicates reconstructs the
/// original text. An `overlap` of at least `chunk_size` is clamped down to
/// guarantee forward progress.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let overlap = overlap.min(chunk_size - 1);
    let tolerance = chunk_size / BOUNDARY_TOLERANCE_DIVISOR;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end < chars.len() {
            sentence_cut(&chars, start, hard_end, tolerance).unwrap_or(hard_end)
        } else {
            hard_end
        };

        chunks.push(chars[start..end].iter().collect());

        if end == chars.len() {
            break;
        }

        let next = end.saturating_sub(overlap);
        // Guarantee progress even for degenerate overlap/chunk combinations.
        start = if next > start { next } else { end };
    }

    chunks
}

/// Find the latest sentence or line boundary in `(end - tolerance, end]`.
///
/// A boundary is the position just after sentence-ending punctuation followed
/// by whitespace, or just after a newline. Returns None when no boundary
/// falls within the tolerance window.
fn sentence_cut(chars: &[char], start: usize, end: usize, tolerance: usize) -> Option<usize> {
    let floor = end.saturating_sub(tolerance).max(start + 1);

    for cut in (floor..=end).rev() {
        if chars[cut - 1] == '\n' {
            return Some(cut);
        }
        if cut >= 2
            && matches!(chars[cut - 2], '.' | '!' | '?')
            && chars[cut - 1].is_whitespace()
        {
            return Some(cut);
        }
    }

    None
}

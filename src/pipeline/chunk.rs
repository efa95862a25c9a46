//! Chunking: split document text into pieces that fit a model context.
//!
//! Greedy left-to-right. Each chunk takes as much text as fits within
//! `max_chars` characters, then backs off to the best boundary inside a
//! lookback window at the end of that span: a paragraph break first, then a
//! sentence end, then any whitespace. Only when the window holds none of
//! these is the text cut at the hard limit.
//!
//! Boundary whitespace is trimmed from each chunk; nothing else is dropped,
//! so the chunks joined back together reproduce the document modulo
//! whitespace.

use crate::pipeline::extract::Document;

/// Fraction of `max_chars` searched backwards for a break point.
const LOOKBACK_DIVISOR: usize = 5;

/// Sentence terminators recognised as break points when followed by whitespace.
const SENTENCE_ENDS: [char; 3] = ['.', '?', '!'];

/// A contiguous slice of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-indexed position in the chunk sequence.
    pub index: usize,
    /// Trimmed chunk text; never empty.
    pub text: String,
    /// Byte offset of `text` within the source text.
    pub offset: usize,
    /// Page the chunk starts on, when known.
    pub page: Option<usize>,
}

impl Chunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split a document, attaching a page hint to every chunk.
pub fn chunk_document(document: &Document, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = chunk_text(document.text(), max_chars);
    for chunk in &mut chunks {
        chunk.page = document.page_at(chunk.offset);
    }
    chunks
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Deterministic: the same input always yields the same chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let lookback = max_chars / LOOKBACK_DIVISOR;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let rest = &text[start..];
        let end = match rest.char_indices().nth(max_chars) {
            // Remainder fits.
            None => text.len(),
            Some((hard, _)) => {
                let window_start = rest
                    .char_indices()
                    .nth(max_chars - lookback)
                    .map_or(hard, |(i, _)| i);
                start + find_break(&rest[..hard], window_start).unwrap_or(hard)
            }
        };

        push_trimmed(&mut chunks, text, start, end);
        start = end;
    }

    chunks
}

/// Best break position (exclusive end) within `span[window_start..]`.
fn find_break(span: &str, window_start: usize) -> Option<usize> {
    let window = &span[window_start..];

    if let Some(pos) = window.rfind("\n\n") {
        return Some(window_start + pos + 2);
    }

    let mut sentence_end = None;
    let mut whitespace_end = None;
    let mut prev: Option<char> = None;
    for (i, c) in window.char_indices() {
        if c.is_whitespace() {
            let end = window_start + i + c.len_utf8();
            whitespace_end = Some(end);
            if prev.is_some_and(|p| SENTENCE_ENDS.contains(&p)) {
                sentence_end = Some(end);
            }
        }
        prev = Some(c);
    }

    sentence_end.or(whitespace_end).filter(|&end| end > 0)
}

fn push_trimmed(chunks: &mut Vec<Chunk>, text: &str, start: usize, end: usize) {
    let piece = &text[start..end];
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return;
    }
    let leading = piece.len() - piece.trim_start().len();
    chunks.push(Chunk {
        index: chunks.len(),
        text: trimmed.to_string(),
        offset: start + leading,
        page: None,
    });
}

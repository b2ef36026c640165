/// Text chunk
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Chunk text
    pub text: String,

    /// Start byte offset in original text
    pub start: usize,

    /// End byte offset in original text
    pub end: usize,
}

/// Approximate characters per token for English abstracts
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunks by token count (approximate)
///
/// Chunks overlap by `overlap` tokens and prefer to end on a sentence boundary.
/// Offsets always fall on UTF-8 character boundaries.
pub fn chunk_text(text: &str, max_tokens: usize, overlap: usize) -> Vec<TextChunk> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    // Overlap must leave room for progress
    let overlap_chars = (overlap * CHARS_PER_TOKEN).min(max_chars / 2);
    let text_len = text.len();

    if text_len <= max_chars {
        return vec![TextChunk {
            text: text.to_string(),
            start: 0,
            end: text_len,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text_len {
        let end = floor_char_boundary(text, (start + max_chars).min(text_len));

        let actual_end = if end < text_len {
            find_break_point(text, start, end)
        } else {
            end
        };

        chunks.push(TextChunk {
            text: text[start..actual_end].to_string(),
            start,
            end: actual_end,
        });

        if actual_end >= text_len {
            break;
        }

        // Move to next chunk with overlap
        let next = floor_char_boundary(text, actual_end.saturating_sub(overlap_chars));
        start = if next > start { next } else { actual_end };
    }

    chunks
}

/// Largest char boundary not greater than `idx`
fn floor_char_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Find a good breaking point (sentence boundary)
fn find_break_point(text: &str, start: usize, ideal_end: usize) -> usize {
    // Look for sentence endings within the last 20% of the chunk
    let search_start = floor_char_boundary(text, start + ((ideal_end - start) * 80 / 100));
    let search_text = &text[search_start..ideal_end];

    let sentence_endings = [". ", ".\n", "! ", "!\n", "? ", "?\n"];

    let best = sentence_endings
        .iter()
        .filter_map(|ending| search_text.rfind(ending).map(|idx| idx + ending.len()))
        .max();

    match best {
        Some(offset) if search_start + offset > start => search_start + offset,
        _ => ideal_end,
    }
}

/// Split text by paragraphs
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

//! Size-tiered text chunking for document ingestion.
//!
//! Chunk size and overlap scale with document length: short documents get
//! small chunks, long documents get larger chunks with proportionally larger
//! overlap. Splitting prefers paragraph breaks, then lines, then sentences,
//! then words, and falls back to a hard character split only when a single
//! token exceeds the chunk size. Lengths are measured in characters so
//! multilingual text never splits inside a code point.

/// Separators tried from coarsest to finest.
const SEPARATORS: &[&str] = &["\n\n", "\n", ".", " "];

/// Chunk size and overlap (in characters) for a document of `text_len` chars.
pub fn chunk_params(text_len: usize) -> (usize, usize) {
    if text_len < 3000 {
        // Short documents (resumes, letters)
        (600, 100)
    } else if text_len < 15000 {
        // Medium documents (10-20 page policy documents)
        (800, 150)
    } else {
        // Large documents (full scheme guidelines)
        (1000, 200)
    }
}

/// Split a document into retrieval-sized chunks with overlap between
/// neighbors. Empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let (chunk_size, overlap) = chunk_params(text.chars().count());
    let pieces = split_pieces(text, chunk_size, SEPARATORS);
    merge_with_overlap(&pieces, chunk_size, overlap)
}

/// Break text into pieces of at most `max_len` chars, using the coarsest
/// separator that works and recursing to finer ones for oversized parts.
fn split_pieces(text: &str, max_len: usize, separators: &[&str]) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    match separators.first() {
        Some(sep) => {
            let mut pieces = Vec::new();
            for part in split_keeping_separator(text, sep) {
                if part.chars().count() <= max_len {
                    pieces.push(part);
                } else {
                    pieces.extend(split_pieces(&part, max_len, &separators[1..]));
                }
            }
            pieces
        }
        None => {
            // No separator fits: hard split on character boundaries
            let chars: Vec<char> = text.chars().collect();
            chars
                .chunks(max_len)
                .map(|window| window.iter().collect())
                .collect()
        }
    }
}

/// Split on `sep`, keeping the separator attached to the preceding part so
/// that concatenating the parts reconstructs the input.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find(sep) {
        let end = idx + sep.len();
        parts.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Greedily pack pieces into chunks of at most `chunk_size` chars, carrying
/// the last `overlap` chars of each finished chunk into the next one.
fn merge_with_overlap(pieces: &[String], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        let current_len = current.chars().count();
        if current_len > 0 && current_len + piece.chars().count() > chunk_size {
            let carry = char_tail(&current, overlap);
            push_trimmed(&mut chunks, &current);
            current = carry;
        }
        current.push_str(piece);
    }
    push_trimmed(&mut chunks, &current);

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// The last `n` characters of `s`.
fn char_tail(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        return s.to_string();
    }
    s.chars().skip(count - n).collect()
}

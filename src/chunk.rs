//! Recursive, boundary-preferring text chunker.
//!
//! Splits extracted document text into overlapping windows of at most
//! [`CHUNK_SIZE`] characters, with [`CHUNK_OVERLAP`] characters shared
//! between consecutive chunks. Splitting prefers larger semantic
//! boundaries first — paragraph, then line, then sentence, then word —
//! and only falls back to a hard character cut when a single atom
//! cannot be split any other way.
//!
//! # Guarantees
//!
//! - No chunk exceeds `CHUNK_SIZE` characters, except where one
//!   unsplittable atom (e.g. a single enormous word) is longer than that.
//! - Chunks are returned in document order.
//! - Whitespace-only chunks are never emitted.

/// Target chunk size, in characters.
pub const CHUNK_SIZE: usize = 1000;

/// Characters of overlap carried between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 200;

/// Separator ladder, largest semantic boundary first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split `text` into ordered, overlapping chunks.
pub fn split_text(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    split_recursive(text, &SEPARATORS, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on the first separator from the ladder that occurs in `text`,
/// merging small pieces back up to the size limit and recursing into
/// pieces that are still too large.
fn split_recursive(text: &str, separators: &[&str], size: usize, overlap: usize) -> Vec<String> {
    if char_len(text) <= size {
        return vec![text.to_string()];
    }

    let mut chosen: Option<(&str, &[&str])> = None;
    for (i, sep) in separators.iter().enumerate() {
        if text.contains(sep) {
            chosen = Some((sep, &separators[i + 1..]));
            break;
        }
    }

    let (sep, remaining) = match chosen {
        Some(pair) => pair,
        // No separator left applies; hard cut.
        None => return hard_split(text, size, overlap),
    };

    let pieces = split_keep_separator(text, sep);

    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for piece in pieces {
        if char_len(&piece) > size {
            if !pending.is_empty() {
                chunks.extend(merge_pieces(&pending, size, overlap));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.extend(hard_split(&piece, size, overlap));
            } else {
                chunks.extend(split_recursive(&piece, remaining, size, overlap));
            }
        } else {
            pending.push(piece);
        }
    }
    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, size, overlap));
    }
    chunks
}

/// Split on `sep`, keeping the separator attached to the preceding piece
/// so that joining pieces back together reconstructs the original text.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(sep) {
        let end = pos + sep.len();
        pieces.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

/// Greedily accumulate pieces into chunks of at most `size` characters,
/// retaining a tail of up to `overlap` characters when a chunk is flushed
/// so consecutive chunks share context.
fn merge_pieces(pieces: &[String], size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        if total + len > size && !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());
            // Shrink the window down to the overlap budget, and further if
            // the incoming piece still would not fit.
            while total > overlap || (total + len > size && total > 0) {
                let front = window.pop_front().expect("window is non-empty while total > 0");
                total -= char_len(front);
            }
        }
        window.push_back(piece);
        total += len;
    }

    if !window.is_empty() {
        chunks.push(window.iter().copied().collect::<String>());
    }
    chunks
}

/// Last-resort character windows: `size` characters each, advancing by
/// `size - overlap` so consecutive windows overlap.
fn hard_split(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let step = size.saturating_sub(overlap).max(1);
    let indices: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let n = indices.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < n {
        let end = start + size;
        let byte_start = indices[start];
        let byte_end = if end < n { indices[end] } else { text.len() };
        chunks.push(text[byte_start..byte_end].to_string());
        if end >= n {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("A short note.");
        assert_eq!(chunks, vec!["A short note.".to_string()]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(split_text("").is_empty());
        assert!(split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn no_chunk_exceeds_target_size() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(200);
        let chunks = split_text(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(
                c.chars().count() <= CHUNK_SIZE,
                "chunk of {} chars exceeds limit",
                c.chars().count()
            );
        }
    }

    #[test]
    fn paragraph_boundaries_preferred() {
        let para = "word ".repeat(150).trim().to_string(); // ~750 chars
        let text = format!("{}\n\n{}", para, para);
        let chunks = split_text(&text);
        // Each paragraph fits a chunk on its own; the split lands between them.
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].contains("\n\n"));
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "alpha beta gamma delta ".repeat(200);
        let chunks = split_text(&text);
        assert!(chunks.len() > 1);
        // The tail of chunk N reappears at the head of chunk N+1.
        let tail: String = chunks[0]
            .chars()
            .skip(chunks[0].chars().count().saturating_sub(40))
            .collect();
        assert!(
            chunks[1].contains(tail.trim()),
            "expected overlap between consecutive chunks"
        );
    }

    #[test]
    fn oversized_atom_hard_split() {
        let atom = "x".repeat(2500);
        let chunks = split_text(&atom);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= CHUNK_SIZE));
        // Hard-split windows overlap too.
        assert!(chunks[1].starts_with('x'));
    }

    #[test]
    fn multibyte_utf8_is_boundary_safe() {
        let text = "日本語のテキスト。".repeat(300);
        let chunks = split_text(&text);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_SIZE);
        }
    }

    #[test]
    fn deterministic() {
        let text = "First paragraph.\n\nSecond paragraph with more words in it.\n\n".repeat(50);
        assert_eq!(split_text(&text), split_text(&text));
    }
}

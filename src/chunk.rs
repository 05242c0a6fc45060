//! Sliding-window text chunker.
//!
//! Splits document body text into overlapping segments of roughly
//! `target_size` characters. Before cutting, the window is scanned backward
//! for the last sentence terminator (`". "`) or newline so chunks avoid
//! splitting mid-sentence; consecutive chunks share up to `overlap`
//! characters of context.

/// Split text into overlapping, boundary-aware chunks.
///
/// Text that fits within `target_size` comes back as a single trimmed
/// chunk. Zero-length chunks are dropped after trimming. A zero
/// `target_size` is treated as 1. Concatenating the returned chunks with
/// overlaps removed reconstructs the source text without gaps.
pub fn chunk_text(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    // A zero window would never advance the cursor.
    let target_size = target_size.max(1);
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= target_size {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    // A cut point is only accepted beyond half the window, so the next
    // start (end - overlap) stays ahead of the current one as long as
    // overlap is below target_size / 2.
    let overlap = overlap.min(target_size / 2);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = start + target_size;

        if end < chars.len() {
            let search_end = (end + overlap).min(chars.len());
            if let Some(break_at) = last_boundary(&chars[start..search_end]) {
                if break_at > target_size / 2 {
                    end = start + break_at + 1;
                }
            }
        }

        let cut = end.min(chars.len());
        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Last index of a sentence terminator (the `.` of `". "`) or newline in
/// the window, scanning backward.
fn last_boundary(window: &[char]) -> Option<usize> {
    for i in (0..window.len()).rev() {
        if window[i] == '\n' {
            return Some(i);
        }
        if window[i] == '.' && window.get(i + 1) == Some(&' ') {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("  Hello, world!  ", 100, 20);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(chunk_text("   \n\n  ", 100, 20).is_empty());
    }

    #[test]
    fn long_text_produces_multiple_chunks() {
        let text = "word ".repeat(300); // 1500 chars
        let chunks = chunk_text(&text, 500, 100);
        assert!(chunks.len() >= 2, "got {} chunks", chunks.len());
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "abcdefghij".repeat(50); // 500 chars, no boundaries
        let chunks = chunk_text(&text, 200, 40);
        assert!(chunks.len() >= 2);
        // With no sentence boundaries the cut is raw, so each chunk after
        // the first repeats the previous chunk's last `overlap` characters.
        let first = &chunks[0];
        let second = &chunks[1];
        let tail: String = first.chars().skip(first.chars().count() - 40).collect();
        assert!(second.starts_with(&tail));
    }

    #[test]
    fn prefers_sentence_boundaries() {
        // One period late in the window, past half of target_size.
        let mut text = "x".repeat(180);
        text.push_str(". ");
        text.push_str(&"y".repeat(300));
        let chunks = chunk_text(&text, 200, 50);
        assert!(chunks[0].ends_with('.'), "chunk was: {:?}", chunks[0]);
    }

    #[test]
    fn ignores_early_boundaries() {
        // Period before half the window must not shorten the chunk there.
        let mut text = "x".repeat(20);
        text.push_str(". ");
        text.push_str(&"y".repeat(500));
        let chunks = chunk_text(&text, 200, 50);
        assert!(chunks[0].chars().count() > 100);
    }

    #[test]
    fn newline_counts_as_boundary() {
        let mut text = "x".repeat(180);
        text.push('\n');
        text.push_str(&"y".repeat(300));
        let chunks = chunk_text(&text, 200, 50);
        // The newline is trimmed off, so the first chunk is exactly the xs.
        assert_eq!(chunks[0], "x".repeat(180));
    }

    #[test]
    fn covers_entire_text() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(80);
        let chunks = chunk_text(&text, 400, 80);
        // Every chunk's text must appear in the source, and the final chunk
        // must reach the end of the source.
        for chunk in &chunks {
            assert!(text.contains(chunk.as_str()));
        }
        let last = chunks.last().unwrap();
        assert!(text.trim_end().ends_with(last.as_str()));
    }

    #[test]
    fn three_thousand_chars_yield_at_least_three_chunks() {
        let text = "All pricing details are listed in section four. ".repeat(63); // ~3000
        let chunks = chunk_text(&text, 1000, 200);
        assert!(chunks.len() >= 3, "got {} chunks", chunks.len());
    }

    #[test]
    fn zero_target_size_terminates() {
        let chunks = chunk_text("abc", 0, 0);
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "héllo wörld. ".repeat(100);
        let chunks = chunk_text(&text, 200, 50);
        assert!(!chunks.is_empty());
    }
}

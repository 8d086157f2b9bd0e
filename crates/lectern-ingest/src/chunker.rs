//! Recursive text splitting.
//!
//! Text is cut at the coarsest separator that yields pieces no longer than
//! the chunk size (paragraphs, then lines, sentences, words, characters),
//! and the pieces are packed into chunks that share up to `chunk_overlap`
//! characters with their predecessor. Chunks are slices of the input, so
//! joining the non-overlapping parts reproduces the original text.

use lectern_config::TextConfig;
use std::collections::VecDeque;
use std::ops::Range;

/// Separators tried in order, coarsest first. The empty separator means
/// splitting between characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum size of each chunk in characters.
    pub chunk_size: usize,
    /// Maximum number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn from_text_config(config: &TextConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// Content chunker for splitting text.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl Chunker {
    /// Create a new chunker with the given configuration.
    pub fn new(config: ChunkConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: config.chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.to_vec(),
        }
    }

    /// Byte ranges of the chunks of `text`.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut pieces = Vec::new();
        self.split(text, 0, text.len(), 0, &mut pieces);
        self.merge(&pieces)
    }

    /// Split text into chunks.
    pub fn chunk_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.spans(text).into_iter().map(|r| &text[r]).collect()
    }

    fn split(&self, text: &str, start: usize, end: usize, level: usize, out: &mut Vec<Piece>) {
        if start >= end {
            return;
        }
        let slice = &text[start..end];
        let chars = slice.chars().count();
        if chars <= self.chunk_size {
            out.push(Piece { start, end, chars });
            return;
        }

        let level = (level..self.separators.len())
            .find(|&l| {
                let sep = self.separators[l];
                sep.is_empty() || slice.contains(sep)
            })
            .unwrap_or(self.separators.len());

        let Some(&sep) = self.separators.get(level).filter(|s| !s.is_empty()) else {
            self.split_chars(slice, start, out);
            return;
        };

        let mut segment_start = start;
        for (i, _) in slice.match_indices(sep) {
            let segment_end = start + i + sep.len();
            self.split(text, segment_start, segment_end, level + 1, out);
            segment_start = segment_end;
        }
        self.split(text, segment_start, end, level + 1, out);
    }

    fn split_chars(&self, slice: &str, offset: usize, out: &mut Vec<Piece>) {
        let mut piece_start = 0;
        let mut count = 0;
        for (i, _) in slice.char_indices() {
            if count == self.chunk_size {
                out.push(Piece {
                    start: offset + piece_start,
                    end: offset + i,
                    chars: count,
                });
                piece_start = i;
                count = 0;
            }
            count += 1;
        }
        if count > 0 {
            out.push(Piece {
                start: offset + piece_start,
                end: offset + slice.len(),
                chars: count,
            });
        }
    }

    fn merge(&self, pieces: &[Piece]) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            if total + piece.chars > self.chunk_size {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    spans.push(first.start..last.end);
                }
                while total > self.chunk_overlap || (total > 0 && total + piece.chars > self.chunk_size) {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.chars,
                        None => break,
                    }
                }
            }
            window.push_back(*piece);
            total += piece.chars;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            spans.push(first.start..last.end);
        }
        spans
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    /// Rebuild the input from chunk spans, skipping overlapped prefixes.
    fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for span in spans {
            assert!(span.start <= covered, "gap before {:?}", span);
            out.push_str(&text[covered.max(span.start)..span.end]);
            covered = span.end;
        }
        out
    }

    fn lecture_notes() -> String {
        let mut text = String::new();
        for week in 1..=12 {
            text.push_str(&format!("Week {}\n\n", week));
            for i in 0..9 {
                text.push_str(&format!(
                    "Sentence {} explains how loops and recursion relate to week {} topics. ",
                    i, week
                ));
            }
            text.push_str("\nSummary line for the week.\n\n");
        }
        text
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let text = "A loop repeats work.";
        assert_eq!(Chunker::default().chunk_text(text), vec![text]);
        assert!(Chunker::default().chunk_text("").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_cover_text() {
        let text = lecture_notes();
        let chunker = chunker(300, 60);
        let spans = chunker.spans(&text);

        assert!(spans.len() > 1);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans.last().unwrap().end, text.len());
        for span in &spans {
            assert!(text[span.clone()].chars().count() <= 300);
        }
        for pair in spans.windows(2) {
            assert!(pair[1].start > pair[0].start);
            assert!(pair[1].end > pair[0].end);
            assert!(pair[1].start <= pair[0].end);
            let shared = text[pair[1].start..pair[0].end].chars().count();
            assert!(shared <= 60);
        }
        assert_eq!(reconstruct(&text, &spans), text);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "a".repeat(600);
        let second = "b".repeat(600);
        let text = format!("{}\n\n{}", first, second);

        let chunks = chunker(1000, 200).chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}\n\n", first));
        assert_eq!(chunks[1], second);
    }

    #[test]
    fn test_hard_split_without_separators() {
        let text = "x".repeat(2500);
        let spans = chunker(1000, 200).spans(&text);
        assert_eq!(spans, vec![0..1000, 1000..2000, 2000..2500]);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "é".repeat(450) + " " + &"日本".repeat(300);
        let spans = chunker(100, 20).spans(&text);
        for span in &spans {
            assert!(text.is_char_boundary(span.start) && text.is_char_boundary(span.end));
            assert!(text[span.clone()].chars().count() <= 100);
        }
        assert_eq!(reconstruct(&text, &spans), text);
    }

    #[test]
    fn test_overlap_is_clamped() {
        let chunker = chunker(10, 50);
        let spans = chunker.spans("one two three four five six seven eight nine ten");
        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
    }
}

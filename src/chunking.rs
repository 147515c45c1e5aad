//! Chunking utilities for splitting the extracted document into overlapping
//! windows that are embedded one by one.
//!
//! Splitting is recursive: the text is cut on paragraph breaks first, and
//! only pieces that are still too long are cut again on line breaks, then
//! spaces, then single characters. Adjacent small pieces are merged back
//! together up to the chunk size, and each new chunk re-uses up to
//! `chunk_overlap` characters from the tail of the previous one.
//!
//! All sizes are measured in characters (Unicode scalar values), never bytes.

use std::collections::VecDeque;

use crate::{config::validate_chunking, error::Result};

/// Separators tried in order of preference.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of text from the source document.
///
/// Produced by [`TextSplitter::split`]. The text is always an exact slice of
/// the source starting at `start_offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic identifier derived from the position, `chunk_<i>`.
    pub id: String,
    /// The chunk text content.
    pub text: String,
    /// Zero-based position of this chunk in reading order.
    pub sequence_index: usize,
    /// Byte offset where this chunk starts in the original text.
    pub start_offset: usize,
}

/// Identifier of the chunk at `index`.
///
/// # Examples
///
/// ```
/// use planrag::chunking::chunk_id;
///
/// assert_eq!(chunk_id(0), "chunk_0");
/// assert_eq!(chunk_id(12), "chunk_12");
/// ```
pub fn chunk_id(index: usize) -> String {
    format!("chunk_{index}")
}

/// A contiguous byte range of the source text and its length in characters.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// Recursive, boundary-preferring text splitter.
///
/// # Examples
///
/// ```
/// use planrag::chunking::TextSplitter;
///
/// let splitter = TextSplitter::new(1000, 200).unwrap();
///
/// // Short text returns a single chunk
/// let chunks = splitter.split("Hello, world!");
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text, "Hello, world!");
/// assert_eq!(chunks[0].id, "chunk_0");
///
/// // Long text gets split, every chunk within the size limit
/// let text = "word ".repeat(500);
/// let chunks = splitter.split(&text);
/// assert!(chunks.len() >= 2);
/// assert!(chunks.iter().all(|c| c.text.chars().count() <= 1000));
///
/// // Overlap must be smaller than the chunk size
/// assert!(TextSplitter::new(100, 100).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into ordered chunks. Empty or whitespace-only input
    /// yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let mut spans = Vec::new();
        self.split_range(text, 0, text.len(), &SEPARATORS, &mut spans);

        spans
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| Chunk {
                id: chunk_id(index),
                text: text[start..end].to_string(),
                sequence_index: index,
                start_offset: start,
            })
            .collect()
    }

    fn split_range(
        &self,
        text: &str,
        start: usize,
        end: usize,
        separators: &[&str],
        out: &mut Vec<(usize, usize)>,
    ) {
        let segment = &text[start..end];

        // Coarsest separator present in this segment; the empty separator
        // always matches and ends the recursion.
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                finer = &[];
                break;
            }
            if segment.contains(candidate) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut small = Vec::new();
        for piece in pieces(text, start, end, separator) {
            if piece.chars < self.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                self.merge(text, &small, out);
                small.clear();
            }
            if finer.is_empty() {
                push_trimmed(text, piece.start, piece.end, out);
            } else {
                self.split_range(text, piece.start, piece.end, finer, out);
            }
        }

        if !small.is_empty() {
            self.merge(text, &small, out);
        }
    }

    /// Greedily merge adjacent pieces into chunks of at most `chunk_size`
    /// characters, carrying up to `chunk_overlap` characters forward.
    fn merge(&self, text: &str, pieces: &[Piece], out: &mut Vec<(usize, usize)>) {
        let mut current: VecDeque<Piece> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            if total + piece.chars > self.chunk_size {
                if let (Some(first), Some(last)) = (current.front(), current.back()) {
                    push_trimmed(text, first.start, last.end, out);
                }
                while total > self.chunk_overlap
                    || (total > 0 && total + piece.chars > self.chunk_size)
                {
                    match current.pop_front() {
                        Some(dropped) => total -= dropped.chars,
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += piece.chars;
        }

        if let (Some(first), Some(last)) = (current.front(), current.back()) {
            push_trimmed(text, first.start, last.end, out);
        }
    }
}

/// Cut `text[start..end]` at every occurrence of `separator`, keeping the
/// separator at the front of the following piece. The empty separator cuts
/// between characters.
fn pieces(text: &str, start: usize, end: usize, separator: &str) -> Vec<Piece> {
    let segment = &text[start..end];

    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(offset, c)| Piece {
                start: start + offset,
                end: start + offset + c.len_utf8(),
                chars: 1,
            })
            .collect();
    }

    let mut cuts: Vec<usize> =
        segment.match_indices(separator).map(|(i, _)| i).collect();
    cuts.push(segment.len());

    let mut result = Vec::with_capacity(cuts.len());
    let mut from = 0;
    for cut in cuts {
        if cut > from {
            result.push(Piece {
                start: start + from,
                end: start + cut,
                chars: segment[from..cut].chars().count(),
            });
        }
        from = cut;
    }
    result
}

/// Record `text[start..end]` with surrounding whitespace removed, unless
/// nothing but whitespace remains.
fn push_trimmed(
    text: &str,
    start: usize,
    end: usize,
    out: &mut Vec<(usize, usize)>,
) {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = slice.len() - slice.trim_start().len();
    let chunk_start = start + lead;
    out.push((chunk_start, chunk_start + trimmed.len()));
}

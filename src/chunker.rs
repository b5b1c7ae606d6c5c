use crate::parser::{self, FileType};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4000;

/// A word-boundary-respecting slice of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub text: String,
    /// Byte offset of `text` in the full document.
    pub offset: usize,
    /// 1-based line of the chunk's first byte.
    #[serde(default = "first_position")]
    pub line: usize,
    /// 1-based column (in chars) of the chunk's first byte.
    #[serde(default = "first_position")]
    pub column: usize,
    /// Chunk-local byte ranges exempt from checking.
    #[serde(default)]
    pub skip_regions: Vec<Range<usize>>,
}

fn first_position() -> usize {
    1
}

impl Chunk {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Split the whole of `text` without skip regions.
pub fn chunk(text: &str, max_chunk_size: usize) -> Vec<Chunk> {
    split(text, 0..text.len(), max_chunk_size, &[])
}

/// Split the whole document, attaching the skip regions its file type implies.
pub fn chunk_document(text: &str, max_chunk_size: usize, file_type: FileType) -> Vec<Chunk> {
    let regions = parser::skip_regions(file_type, text);
    split(text, 0..text.len(), max_chunk_size, &regions)
}

/// Split `text[window]` into chunks of at most `max_chunk_size` bytes,
/// breaking only right after whitespace.
///
/// Offsets stay document-global. `skip_regions` are document-global and get
/// clipped and rebased onto each chunk. A chunk only exceeds the limit when a
/// single run of non-whitespace is longer than it.
pub fn split(
    text: &str,
    window: Range<usize>,
    max_chunk_size: usize,
    skip_regions: &[Range<usize>],
) -> Vec<Chunk> {
    let max = max_chunk_size.max(1);
    let end = window.end.min(text.len());
    let mut start = window.start.min(end);
    let (mut line, mut column) = position_at(text, start);
    let mut chunks = Vec::new();

    loop {
        let boundary = if end - start <= max {
            end
        } else {
            find_boundary(text, start, start + max, end)
        };

        let piece = &text[start..boundary];
        chunks.push(Chunk {
            text: piece.to_string(),
            offset: start,
            line,
            column,
            skip_regions: local_regions(skip_regions, start..boundary),
        });
        advance(&mut line, &mut column, piece);

        if boundary >= end {
            break;
        }
        start = boundary;
    }

    chunks
}

fn find_boundary(text: &str, start: usize, tentative: usize, end: usize) -> usize {
    let mut tentative = tentative.min(end);
    while !text.is_char_boundary(tentative) {
        tentative -= 1;
    }

    if let Some((i, c)) = text[start..tentative]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
    {
        return start + i + c.len_utf8();
    }

    match text[tentative..end]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
    {
        Some((i, c)) => tentative + i + c.len_utf8(),
        None => end,
    }
}

fn local_regions(regions: &[Range<usize>], span: Range<usize>) -> Vec<Range<usize>> {
    regions
        .iter()
        .filter_map(|r| {
            let s = r.start.max(span.start);
            let e = r.end.min(span.end);
            (s < e).then(|| (s - span.start)..(e - span.start))
        })
        .collect()
}

/// 1-based line and char column of `offset`.
pub(crate) fn position_at(text: &str, offset: usize) -> (usize, usize) {
    let (mut line, mut column) = (1, 1);
    advance(&mut line, &mut column, &text[..offset]);
    (line, column)
}

pub(crate) fn advance(line: &mut usize, column: &mut usize, text: &str) {
    for c in text.chars() {
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_empty_text_yields_one_empty_chunk() {
        let chunks = chunk("", 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk("hello world", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
    }

    #[test]
    fn test_breaks_after_whitespace() {
        let text = "alpha beta gamma delta";
        let chunks = chunk(text, 8);
        assert_eq!(joined(&chunks), text);
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.text.ends_with(' '), "chunk {:?} splits a word", c.text);
        }
        assert_eq!(chunks[0].text, "alpha ");
        assert_eq!(chunks[1].offset, 6);
    }

    #[test]
    fn test_long_word_falls_forward() {
        let text = "supercalifragilistic word";
        let chunks = chunk(text, 5);
        assert_eq!(chunks[0].text, "supercalifragilistic ");
        assert_eq!(chunks[1].text, "word");
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "héllo wörld ñandú café";
        let chunks = chunk(text, 7);
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_positions_track_lines() {
        let text = "one two\nthree four\nfive";
        let chunks = chunk(text, 6);
        for c in &chunks {
            assert_eq!((c.line, c.column), position_at(text, c.offset));
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.text, "five");
        assert_eq!((last.line, last.column), (3, 1));
    }

    #[test]
    fn test_window_keeps_global_offsets() {
        let text = "first line\nsecond line\nthird line";
        let chunks = split(text, 11..23, 100, &[]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "second line\n");
        assert_eq!(chunks[0].offset, 11);
        assert_eq!((chunks[0].line, chunks[0].column), (2, 1));
    }

    #[test]
    fn test_skip_regions_are_rebased() {
        let text = "aaa bbb ccc ddd";
        let chunks = split(text, 0..text.len(), 8, &[2..10]);
        assert_eq!(chunks[0].text, "aaa bbb ");
        assert_eq!(chunks[0].skip_regions, vec![2..8]);
        assert_eq!(chunks[1].skip_regions, vec![0..2]);
    }
}

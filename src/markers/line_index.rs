use std::ops::{Range, RangeInclusive};

/// Offset ↔ line/column conversion over one snapshot of a document.
///
/// Lines and columns are 1-based; columns count chars. Offsets are bytes.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Line containing `offset` (clamped to the text).
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.text.len());
        self.line_starts.partition_point(|&start| start <= offset)
    }

    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let start = self.line_starts[line - 1];
        let column = self.text[start..offset].chars().count() + 1;
        (line, column)
    }

    /// Byte offset of a line/column, `None` when it lies outside the text.
    pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self.line_end(line);
        let line_text = &self.text[start..end];
        let skip = column.checked_sub(1)?;
        match line_text.char_indices().nth(skip) {
            Some((i, _)) => Some(start + i),
            None if skip == line_text.chars().count() => Some(end),
            None => None,
        }
    }

    /// Bytes of `lines`, including the newline that ends the last one.
    pub fn line_span(&self, lines: RangeInclusive<usize>) -> Range<usize> {
        let last = (*lines.end()).clamp(1, self.line_count());
        let first = (*lines.start()).clamp(1, last);
        let start = self.line_starts[first - 1];
        let end = self
            .line_starts
            .get(last)
            .copied()
            .unwrap_or(self.text.len());
        start..end
    }

    /// Lines covering `range`, widened by `context` lines on each side.
    pub fn window(&self, range: Range<usize>, context: usize) -> RangeInclusive<usize> {
        let first = self.line_of(range.start).saturating_sub(context).max(1);
        let last = (self.line_of(range.end.max(range.start)) + context).min(self.line_count());
        first..=last
    }

    /// Text of one line without its newline; empty past the end.
    pub fn line_text(&self, line: usize) -> &'a str {
        match line.checked_sub(1).and_then(|i| self.line_starts.get(i)) {
            Some(&start) => &self.text[start..self.line_end(line)],
            None => "",
        }
    }

    fn line_end(&self, line: usize) -> usize {
        match self.line_starts.get(line) {
            Some(&next) => next - 1,
            None => self.text.len(),
        }
    }
}

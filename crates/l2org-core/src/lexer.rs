//! Line-based lexer for the block parser.
//!
//! The lexer hands out one physical line at a time, borrowing from the input.
//! Constructs that span lines (citation key lists, section titles,
//! environments) are scanned on the raw input by the parser, which then moves
//! the lexer forward with [`Lexer::advance_to`]. When that lands in the middle
//! of a line, the rest of the line comes back as a *continued* line so the
//! parser does not mistake it for a line start.

use std::ops::Range;

use crate::span::Span;
use memchr::memchr;

/// A single line from the input with its source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// The line text (without the line terminator).
    pub text: &'a str,
    /// The terminator that ended the line: `"\n"`, `"\r\n"` or `""` at end of input.
    pub terminator: &'a str,
    /// Byte span of `text` in the original input.
    pub span: Span,
    /// True when the line starts after a construct that ended mid-line.
    pub continued: bool,
}

impl<'a> Line<'a> {
    /// Check if this line contains only whitespace.
    #[inline(always)]
    pub fn is_blank(&self) -> bool {
        self.text.bytes().all(|b| b == b' ' || b == b'\t')
    }

    /// The line text without leading whitespace.
    #[inline(always)]
    pub fn trimmed_start(&self) -> &'a str {
        self.text.trim_start()
    }

    /// Byte offset of the first non-blank character.
    #[inline]
    pub fn content_offset(&self) -> u32 {
        self.span.start + (self.text.len() - self.trimmed_start().len()) as u32
    }

    /// Byte offset just past the line terminator.
    #[inline(always)]
    pub fn end_offset(&self) -> u32 {
        self.span.end + self.terminator.len() as u32
    }

    /// The line text including its terminator.
    #[inline]
    pub fn with_terminator(&self, input: &'a str) -> &'a str {
        &input[self.span.start as usize..self.end_offset() as usize]
    }
}

/// Peek/consume access to the lines of a LaTeX source.
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    offset: usize,
    /// Exclusive end of the window being lexed.
    end: usize,
    peeked: Option<Line<'a>>,
}

impl<'a> Lexer<'a> {
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self::bounded(input, 0..input.len())
    }

    /// Lex only `range` of `input`. Spans stay relative to the whole input.
    pub fn bounded(input: &'a str, range: Range<usize>) -> Self {
        let end = range.end.min(input.len());
        Self {
            input,
            bytes: input.as_bytes(),
            offset: range.start.min(end),
            end,
            peeked: None,
        }
    }

    /// Exclusive end offset of the lexed window.
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Current byte offset (start of the next unread line).
    #[inline(always)]
    pub fn offset(&self) -> u32 {
        match &self.peeked {
            Some(line) => line.span.start,
            None => self.offset as u32,
        }
    }

    /// Check if all input has been consumed.
    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.peeked.is_none() && self.offset >= self.end
    }

    /// Peek at the next line without consuming it.
    #[inline]
    pub fn peek_line(&mut self) -> Option<&Line<'a>> {
        if self.peeked.is_none() {
            self.peeked = self.read_line();
        }
        self.peeked.as_ref()
    }

    /// Consume and return the next line.
    #[inline]
    pub fn next_line(&mut self) -> Option<Line<'a>> {
        if let Some(line) = self.peeked.take() {
            return Some(line);
        }
        self.read_line()
    }

    /// Move the read position to `offset`, dropping any peeked line.
    ///
    /// `offset` must be a char boundary at or after the current position.
    /// Offsets produced by scanning for ASCII delimiters always are.
    pub fn advance_to(&mut self, offset: u32) {
        let current = self.offset() as usize;
        self.peeked = None;
        self.offset = (offset as usize).min(self.end).max(current);
    }

    /// The remaining unconsumed input of the window, starting with any peeked line.
    #[inline]
    pub fn remaining(&self) -> &'a str {
        &self.input[self.offset() as usize..self.end]
    }

    fn read_line(&mut self) -> Option<Line<'a>> {
        if self.offset >= self.end {
            return None;
        }

        let start = self.offset;
        let continued = start > 0 && self.bytes[start - 1] != b'\n';

        let newline = memchr(b'\n', &self.bytes[start..self.end]).map(|pos| start + pos);
        let (text_end, line_end) = match newline {
            Some(nl) if nl > start && self.bytes[nl - 1] == b'\r' => (nl - 1, nl + 1),
            Some(nl) => (nl, nl + 1),
            None => (self.end, self.end),
        };

        self.offset = line_end;

        Some(Line {
            text: &self.input[start..text_end],
            terminator: &self.input[text_end..line_end],
            span: Span::from_offsets(start, text_end),
            continued,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_lines_and_keeps_terminators() {
        let mut lexer = Lexer::new("one\r\ntwo\nthree");
        let one = lexer.next_line().unwrap();
        assert_eq!(one.text, "one");
        assert_eq!(one.terminator, "\r\n");
        let two = lexer.next_line().unwrap();
        assert_eq!((two.text, two.terminator), ("two", "\n"));
        let three = lexer.next_line().unwrap();
        assert_eq!((three.text, three.terminator), ("three", ""));
        assert!(lexer.is_eof());
        assert!(lexer.next_line().is_none());
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("a\nb\n");
        assert_eq!(lexer.peek_line().map(|l| l.text), Some("a"));
        assert_eq!(lexer.offset(), 0);
        assert_eq!(lexer.next_line().map(|l| l.text), Some("a"));
        assert_eq!(lexer.offset(), 2);
    }

    #[test]
    fn advance_mid_line_yields_continued_line() {
        let input = "see \\cite{a,\nb} here\nnext\n";
        let mut lexer = Lexer::new(input);
        lexer.next_line();
        let close = input.find('}').unwrap() as u32 + 1;
        lexer.advance_to(close);
        let rest = lexer.next_line().unwrap();
        assert_eq!(rest.text, " here");
        assert!(rest.continued);
        let next = lexer.next_line().unwrap();
        assert_eq!(next.text, "next");
        assert!(!next.continued);
    }

    #[test]
    fn bounded_window_stops_early() {
        let input = "\\begin{quote}\nquoted\n\\end{quote}\n";
        let body_start = "\\begin{quote}".len();
        let body_end = input.find("\\end").unwrap();
        let mut lexer = Lexer::bounded(input, body_start..body_end);
        let first = lexer.next_line().unwrap();
        assert_eq!(first.text, "");
        assert!(first.continued);
        let second = lexer.next_line().unwrap();
        assert_eq!(second.text, "quoted");
        assert_eq!(second.span.start as usize, body_start + 1);
        assert!(lexer.next_line().is_none());
    }

    #[test]
    fn blank_line_detection() {
        let mut lexer = Lexer::new("  \t\nx");
        assert!(lexer.next_line().unwrap().is_blank());
        assert!(!lexer.next_line().unwrap().is_blank());
    }
}

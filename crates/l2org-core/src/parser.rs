//! Block parser for LaTeX sources.
//!
//! Borrows directly from input. Parsing is line driven: each physical line
//! start is checked for a block construct (preamble, comment, environment,
//! heading, bibliography, layout command), and anything else is running text
//! that is split around citation macros. Structural problems are recorded as
//! recoverable diagnostics and parsing continues.

use std::borrow::Cow;
use std::collections::BTreeSet;

use memchr::{memchr, memchr2};

use crate::ast::{
    Bibliography, BibliographyStyle, Block, CowStr, Document, Environment, EnvironmentKind,
    Heading, LatexLine, List, ListItem, ListKind, Plaintext, Preamble, PreambleEntry,
};
use crate::cite::{scan_citation, CiteScan};
use crate::config::ConversionConfig;
use crate::error::{ParseError, ParseErrors};
use crate::inline::parse_inlines;
use crate::lexer::{Line, Lexer};
use crate::scan::{
    braced_group, collapse_whitespace, environment_end, matching_brace, matching_bracket,
    skip_blanks, skip_whitespace, strip_command,
};
use crate::span::Span;

/// Sectioning commands and their outline levels.
const SECTIONS: [(&str, u8); 6] = [
    ("chapter", 1),
    ("section", 1),
    ("subsection", 2),
    ("subsubsection", 3),
    ("paragraph", 4),
    ("subparagraph", 5),
];

/// Commands whose whole line is kept for the LaTeX exporter only.
const LAYOUT_COMMANDS: [&str; 8] = [
    "setcounter",
    "setlength",
    "newlength",
    "addtolength",
    "raggedleft",
    "raggedright",
    "raggedcolumns",
    "newtheorem",
];

/// Environments whose body is not LaTeX, so `\begin` inside them does not nest.
const VERBATIM_ENVIRONMENTS: [&str; 4] = ["verbatim", "Verbatim", "lstlisting", "minted"];

const BEGIN_DOCUMENT: &str = "\\begin{document}";

#[inline]
fn nests(name: &str) -> bool {
    !VERBATIM_ENVIRONMENTS.contains(&name)
}

/// Result type for parsing that includes recovered errors.
#[derive(Debug)]
pub struct ParseResult<'a> {
    /// The parsed document.
    pub document: Document<'a>,
    /// Diagnostics encountered during parsing.
    pub errors: ParseErrors,
}

impl<'a> ParseResult<'a> {
    /// Check if parsing completed without diagnostics.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// LaTeX block parser with error recovery.
pub struct Parser {
    exclude_env: BTreeSet<String>,
    /// Errors collected during the current parse.
    errors: ParseErrors,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(&ConversionConfig::default())
    }
}

impl Parser {
    /// Create a parser honouring the exclusion list of `config`.
    #[inline]
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            exclude_env: config.exclude_env.clone(),
            errors: ParseErrors::new(),
        }
    }

    /// Parse `input`, collecting diagnostics alongside the document.
    ///
    /// Each call starts from scratch; the parser keeps no state between runs.
    pub fn parse<'a>(&mut self, input: &'a str) -> ParseResult<'a> {
        self.errors = ParseErrors::new();
        let mut lexer = Lexer::new(input);
        let blocks = self.parse_blocks(&mut lexer, input, true);
        ParseResult {
            document: Document {
                blocks,
                span: Span::from_offsets(0, input.len()),
            },
            errors: std::mem::take(&mut self.errors),
        }
    }

    /// Parse raw bytes. Fails only when the input is not valid UTF-8.
    pub fn parse_bytes<'a>(&mut self, input: &'a [u8]) -> Result<ParseResult<'a>, ParseError> {
        let text = std::str::from_utf8(input)
            .map_err(|err| ParseError::invalid_encoding(err.valid_up_to()))?;
        Ok(self.parse(text))
    }

    /// Record an error during parsing.
    #[inline]
    fn record_error(&mut self, error: ParseError) {
        tracing::debug!("{}", error);
        self.errors.push(error);
    }

    fn parse_blocks<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        top_level: bool,
    ) -> Vec<Block<'a>> {
        let mut blocks = Vec::with_capacity(16);

        while let Some(line) = lexer.peek_line().copied() {
            if !line.continued {
                if let Some(block) = self.parse_line_start(lexer, input, &line, top_level) {
                    blocks.push(block);
                    continue;
                }
            }
            self.parse_text_line(lexer, input, &line, &mut blocks);
        }

        blocks
    }

    /// Try the block constructs that must start a line.
    ///
    /// On `None` the lexer is left on `line`.
    fn parse_line_start<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        line: &Line<'a>,
        top_level: bool,
    ) -> Option<Block<'a>> {
        let trimmed = line.trimmed_start();
        match trimmed.as_bytes().first() {
            Some(b'%') => return Some(latex_line(lexer, line)),
            Some(b'\\') => {}
            _ => return None,
        }

        if top_level && strip_command(trimmed, "documentclass").is_some() {
            return Some(self.parse_preamble(lexer, input));
        }
        if strip_command(trimmed, "begin").is_some() {
            let begin = line.content_offset() as usize;
            return self.parse_environment(lexer, input, line.span.start as usize, begin);
        }
        if let Some(n) = strip_command(trimmed, "end") {
            return self.parse_end_document(lexer, input, line, n);
        }
        for (command, level) in SECTIONS {
            if let Some(n) = strip_command(trimmed, command) {
                return self.parse_section(lexer, input, line, command, level, n);
            }
        }
        if let Some(n) = strip_command(trimmed, "textbf") {
            return parse_bold_heading(lexer, input, line, n);
        }
        if let Some(n) = strip_command(trimmed, "bibliographystyle") {
            return self.parse_bibliography_style(lexer, input, line, n);
        }
        if let Some(n) = strip_command(trimmed, "bibliography") {
            return self.parse_bibliography(lexer, input, line, n);
        }
        if LAYOUT_COMMANDS
            .iter()
            .any(|command| strip_command(trimmed, command).is_some())
        {
            return Some(latex_line(lexer, line));
        }

        None
    }

    /// Consume the rest of the line after a construct ending at `end`.
    ///
    /// A blank rest, terminator included, is returned as the construct's line
    /// end. When text follows, the lexer stops at `end` so the text is read as
    /// a continued line, and a synthesized `"\n"` is returned.
    fn finish_line<'a>(&self, lexer: &mut Lexer<'a>, input: &'a str, end: usize) -> CowStr<'a> {
        match blank_rest_end(input.as_bytes(), end, lexer.end()) {
            Some(next) => {
                lexer.advance_to(next as u32);
                Cow::Borrowed(&input[end..next])
            }
            None => {
                lexer.advance_to(end as u32);
                Cow::Borrowed("\n")
            }
        }
    }

    /// Parse the environment whose `\begin` is at `begin`; its source starts
    /// at `start`, which is either the line start or `begin` itself.
    fn parse_environment<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        start: usize,
        begin: usize,
    ) -> Option<Block<'a>> {
        let bytes = input.as_bytes();
        let limit = lexer.end();
        let after_begin = begin + strip_command(&input[begin..limit], "begin")?;

        let open = skip_blanks(bytes, after_begin, limit);
        if bytes.get(open) != Some(&b'{') {
            return None;
        }
        let Some(close) = matching_brace(bytes, open, limit) else {
            let line_end = memchr(b'\n', &bytes[begin..limit]).map_or(limit, |nl| begin + nl);
            self.record_error(ParseError::unclosed_brace(
                "environment name",
                Span::from_offsets(begin, line_end),
            ));
            return None;
        };

        let name = input[open + 1..close].trim();
        if name.is_empty() {
            return None;
        }
        let body_start = close + 1;
        if name == "document" {
            self.finish_line(lexer, input, body_start);
            return Some(Block::DocumentMarker(Span::from_offsets(begin, body_start)));
        }

        let mut text_follows = false;
        let (source_end, body_end, terminated, line_end) =
            match environment_end(input, body_start, limit, name, nests(name)) {
                Some((end_start, end_end)) => {
                    text_follows = blank_rest_end(bytes, end_end, limit).is_none();
                    let line_end = self.finish_line(lexer, input, end_end);
                    (end_end, end_start, true, line_end)
                }
                None => {
                    self.record_error(ParseError::unclosed_environment(
                        name,
                        Span::from_offsets(begin, body_start),
                    ));
                    lexer.advance_to(limit as u32);
                    (limit, limit, false, Cow::Borrowed(""))
                }
            };

        let excluded = self.exclude_env.contains(name);
        let kind = if excluded || !terminated {
            EnvironmentKind::Literal
        } else {
            self.environment_kind(input, name, body_start, body_end)
        };

        tracing::debug!(
            "Environment {} at bytes {}..{} ({})",
            name,
            start,
            source_end,
            if excluded { "excluded" } else { "included" }
        );

        Some(Block::Environment(Environment {
            name: Cow::Borrowed(name),
            source: Cow::Borrowed(&input[start..source_end]),
            body: Cow::Borrowed(&input[body_start..body_end]),
            excluded,
            terminated,
            line_end,
            starts_mid_line: start == begin && !at_line_start(bytes, begin),
            text_follows,
            kind,
            span: Span::from_offsets(start, source_end),
        }))
    }

    fn environment_kind<'a>(
        &mut self,
        input: &'a str,
        name: &str,
        body_start: usize,
        body_end: usize,
    ) -> EnvironmentKind<'a> {
        if let Some(kind) = ListKind::from_env(name) {
            return match self.parse_list(input, kind, body_start, body_end) {
                Some(list) => EnvironmentKind::List(list),
                None => EnvironmentKind::Literal,
            };
        }
        match name {
            "verbatim" => EnvironmentKind::Verbatim,
            "quote" | "quotation" => {
                EnvironmentKind::Quote(self.parse_range(input, body_start, body_end))
            }
            _ => EnvironmentKind::Literal,
        }
    }

    /// Split a list body at its top-level `\item` markers.
    ///
    /// Returns `None` when the body has content before the first item, which
    /// org lists cannot express.
    fn parse_list<'a>(
        &mut self,
        input: &'a str,
        kind: ListKind,
        start: usize,
        end: usize,
    ) -> Option<List<'a>> {
        let markers = item_markers(input, start, end);
        let first = *markers.first()?;
        if !input[start..first].trim().is_empty() {
            return None;
        }

        let mut items = Vec::with_capacity(markers.len());
        for (i, &marker) in markers.iter().enumerate() {
            let item_end = markers.get(i + 1).copied().unwrap_or(end);
            items.push(self.parse_item(input, marker, item_end));
        }
        Some(List { kind, items })
    }

    fn parse_item<'a>(&mut self, input: &'a str, marker: usize, end: usize) -> ListItem<'a> {
        let bytes = input.as_bytes();
        let mut pos = skip_blanks(bytes, marker + "\\item".len(), end);
        let mut term = None;

        if bytes.get(pos) == Some(&b'[') {
            if let Some(close) = matching_bracket(bytes, pos, end) {
                term = Some(parse_inlines(&input[pos + 1..close], (pos + 1) as u32));
                pos = skip_blanks(bytes, close + 1, end);
            }
        }

        ListItem {
            term,
            blocks: self.parse_range(input, pos, end),
            span: Span::from_offsets(marker, end),
        }
    }

    /// Parse `input[start..end]` as nested content.
    fn parse_range<'a>(&mut self, input: &'a str, start: usize, end: usize) -> Vec<Block<'a>> {
        let mut lexer = Lexer::bounded(input, start..end);
        self.parse_blocks(&mut lexer, input, false)
    }

    fn parse_end_document<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        line: &Line<'a>,
        after_end: usize,
    ) -> Option<Block<'a>> {
        let begin = line.content_offset() as usize;
        let group = braced_group(input.as_bytes(), begin + after_end, line.span.end as usize)?;
        if input[group.inner()].trim() != "document" {
            return None;
        }
        self.finish_line(lexer, input, group.after());
        Some(Block::DocumentMarker(Span::from_offsets(begin, group.after())))
    }

    fn parse_section<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        line: &Line<'a>,
        command: &'static str,
        level: u8,
        after_name: usize,
    ) -> Option<Block<'a>> {
        let bytes = input.as_bytes();
        let limit = lexer.end();
        let begin = line.content_offset() as usize;
        let line_span = Span::new(begin as u32, line.span.end);

        let mut pos = begin + after_name;
        let starred = bytes.get(pos) == Some(&b'*');
        if starred {
            pos += 1;
        }
        pos = skip_whitespace(bytes, pos, limit);

        let mut short_title = None;
        if bytes.get(pos) == Some(&b'[') {
            let Some(close) = matching_bracket(bytes, pos, limit) else {
                self.record_error(ParseError::unclosed_brace("section short title", line_span));
                return None;
            };
            short_title = Some(collapse_whitespace(&input[pos + 1..close]));
            pos = skip_whitespace(bytes, close + 1, limit);
        }

        if bytes.get(pos) != Some(&b'{') {
            return None;
        }
        let Some(close) = matching_brace(bytes, pos, limit) else {
            self.record_error(ParseError::unclosed_brace("section title", line_span));
            return None;
        };

        self.finish_line(lexer, input, close + 1);
        tracing::debug!("Heading \\{} at bytes {}..{}", command, begin, close + 1);

        Some(Block::Heading(Heading {
            level,
            command: Cow::Borrowed(command),
            title: parse_inlines(&input[pos + 1..close], (pos + 1) as u32),
            short_title,
            starred,
            span: Span::from_offsets(begin, close + 1),
        }))
    }

    fn parse_bibliography<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        line: &Line<'a>,
        after_name: usize,
    ) -> Option<Block<'a>> {
        let begin = line.content_offset() as usize;
        let group = braced_group(input.as_bytes(), begin + after_name, line.span.end as usize)?;
        let files: Vec<CowStr<'a>> = input[group.inner()]
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(Cow::Borrowed)
            .collect();
        if files.is_empty() {
            return None;
        }

        let line_end = self.finish_line(lexer, input, group.after());
        Some(Block::Bibliography(Bibliography {
            files,
            line_end,
            span: Span::from_offsets(begin, group.after()),
        }))
    }

    fn parse_bibliography_style<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        line: &Line<'a>,
        after_name: usize,
    ) -> Option<Block<'a>> {
        let begin = line.content_offset() as usize;
        let group = braced_group(input.as_bytes(), begin + after_name, line.span.end as usize)?;
        let style = input[group.inner()].trim();
        if style.is_empty() {
            return None;
        }

        let line_end = self.finish_line(lexer, input, group.after());
        Some(Block::BibliographyStyle(BibliographyStyle {
            style: Cow::Borrowed(style),
            line_end,
            span: Span::from_offsets(begin, group.after()),
        }))
    }

    /// Lines from `\documentclass` through `\begin{document}`.
    fn parse_preamble<'a>(&mut self, lexer: &mut Lexer<'a>, input: &'a str) -> Block<'a> {
        let start = lexer.offset() as usize;
        let mut entries = Vec::with_capacity(8);
        let mut end = None;

        while let Some(line) = lexer.peek_line().copied() {
            let begin = line.content_offset() as usize;
            if let Some(pos) = line.trimmed_start().find(BEGIN_DOCUMENT) {
                let before = input[begin..begin + pos].trim_end();
                if !before.is_empty() {
                    entries.push(PreambleEntry::Header(Cow::Borrowed(before)));
                }
                let after = begin + pos + BEGIN_DOCUMENT.len();
                self.finish_line(lexer, input, after);
                end = Some(after);
                break;
            }
            if line.is_blank() {
                lexer.next_line();
                continue;
            }
            let entry = self.parse_preamble_entry(lexer, input, &line);
            entries.push(entry);
        }

        let end = end.unwrap_or_else(|| {
            let limit = lexer.end();
            self.record_error(ParseError::unterminated_preamble(Span::from_offsets(start, limit)));
            limit
        });

        tracing::debug!("Preamble with {} entries at bytes {}..{}", entries.len(), start, end);
        Block::Preamble(Preamble {
            entries,
            span: Span::from_offsets(start, end),
        })
    }

    fn parse_preamble_entry<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        line: &Line<'a>,
    ) -> PreambleEntry<'a> {
        let bytes = input.as_bytes();
        let limit = lexer.end();
        let trimmed = line.trimmed_start();
        let begin = line.content_offset() as usize;

        if let Some(n) = strip_command(trimmed, "documentclass") {
            let mut pos = skip_whitespace(bytes, begin + n, limit);
            let mut options = None;
            if bytes.get(pos) == Some(&b'[') {
                if let Some(close) = matching_bracket(bytes, pos, limit) {
                    let text = collapse_whitespace(&input[pos + 1..close]);
                    options = (!text.is_empty()).then_some(text);
                    pos = skip_whitespace(bytes, close + 1, limit);
                }
            }
            if let Some(group) = braced_group(bytes, pos, limit) {
                self.finish_line(lexer, input, group.after());
                return PreambleEntry::Class {
                    name: collapse_whitespace(&input[group.inner()]),
                    options,
                };
            }
        }

        for command in ["title", "author", "date", "email"] {
            let Some(n) = strip_command(trimmed, command) else {
                continue;
            };
            let mut pos = skip_blanks(bytes, begin + n, limit);
            if bytes.get(pos) == Some(&b'[') {
                if let Some(close) = matching_bracket(bytes, pos, limit) {
                    pos = skip_blanks(bytes, close + 1, limit);
                }
            }
            match braced_group(bytes, pos, limit) {
                Some(group) => {
                    self.finish_line(lexer, input, group.after());
                    let value = collapse_whitespace(&input[group.inner()]);
                    return match command {
                        "title" => PreambleEntry::Title(value),
                        "author" => PreambleEntry::Author(value),
                        "date" => PreambleEntry::Date(value),
                        _ => PreambleEntry::Email(value),
                    };
                }
                None if bytes.get(pos) == Some(&b'{') => {
                    self.record_error(ParseError::unclosed_brace(command, line.span));
                }
                None => {}
            }
            break;
        }

        lexer.next_line();
        PreambleEntry::Header(Cow::Borrowed(line.text.trim()))
    }

    /// Running text: split the line around citation macros and environments.
    fn parse_text_line<'a>(
        &mut self,
        lexer: &mut Lexer<'a>,
        input: &'a str,
        line: &Line<'a>,
        blocks: &mut Vec<Block<'a>>,
    ) {
        lexer.next_line();
        let bytes = input.as_bytes();
        let line_start = line.span.start as usize;
        let text_end = line.span.end as usize;
        let mut run_start = line_start;
        let mut pos = line_start;
        // A line-start `\begin` has already been tried by `parse_line_start`.
        let tried_begin = (!line.continued).then(|| line.content_offset() as usize);

        while let Some(offset) = memchr2(b'\\', b'%', &bytes[pos..text_end]) {
            let at = pos + offset;
            if bytes[at] == b'%' {
                break;
            }
            if tried_begin != Some(at) && strip_command(&input[at..text_end], "begin").is_some() {
                if let Some(block) = self.parse_environment(lexer, input, at, at) {
                    if at > run_start {
                        blocks.push(plaintext(input, run_start, at));
                    }
                    let block_end = block.span().end as usize;
                    blocks.push(block);
                    if block_end >= text_end
                        || blank_rest_end(bytes, block_end, lexer.end()).is_some()
                    {
                        return;
                    }
                    run_start = block_end;
                    pos = block_end;
                    continue;
                }
            }
            match scan_citation(input, at, lexer.end()) {
                CiteScan::Found(citation) => {
                    if at > run_start {
                        blocks.push(plaintext(input, run_start, at));
                    }
                    let cite_end = citation.span.end as usize;
                    tracing::debug!("Citation {:?} at bytes {}..{}", citation.keys, at, cite_end);
                    blocks.push(Block::Citation(citation));
                    if cite_end > text_end {
                        lexer.advance_to(cite_end as u32);
                        return;
                    }
                    run_start = cite_end;
                    pos = cite_end;
                }
                CiteScan::Unclosed(span) => {
                    self.record_error(ParseError::unclosed_brace("citation", span));
                    pos = at + 1;
                }
                CiteScan::NotCitation => {
                    let escaped =
                        at + 1 < text_end && !bytes[at + 1].is_ascii_alphabetic();
                    pos = if escaped { at + 2 } else { at + 1 };
                }
            }
        }

        let line_end = line.end_offset() as usize;
        if run_start < line_end {
            blocks.push(plaintext(input, run_start, line_end));
        }
    }
}

/// Offset past the line break when only blanks follow `end` on its line.
fn blank_rest_end(bytes: &[u8], end: usize, limit: usize) -> Option<usize> {
    let blank_end = skip_blanks(bytes, end, limit);
    match bytes.get(blank_end) {
        _ if blank_end >= limit => Some(limit),
        Some(b'\n') => Some(blank_end + 1),
        Some(b'\r') if bytes.get(blank_end + 1) == Some(&b'\n') => Some(blank_end + 2),
        _ => None,
    }
}

/// Whether only blanks precede `pos` on its line.
fn at_line_start(bytes: &[u8], pos: usize) -> bool {
    bytes[..pos]
        .iter()
        .rev()
        .take_while(|&&b| b != b'\n')
        .all(|&b| matches!(b, b' ' | b'\t'))
}

fn plaintext(input: &str, start: usize, end: usize) -> Block<'_> {
    let raw = &input[start..end];
    Block::Plaintext(Plaintext {
        raw: Cow::Borrowed(raw),
        content: parse_inlines(raw, start as u32),
        span: Span::from_offsets(start, end),
    })
}

fn latex_line<'a>(lexer: &mut Lexer<'a>, line: &Line<'a>) -> Block<'a> {
    lexer.next_line();
    Block::LatexLine(LatexLine {
        text: Cow::Borrowed(line.text),
        line_end: Cow::Borrowed(line.terminator),
        span: line.span,
    })
}

/// A line consisting only of `\textbf{...}` is a paragraph-level heading.
fn parse_bold_heading<'a>(
    lexer: &mut Lexer<'a>,
    input: &'a str,
    line: &Line<'a>,
    after_name: usize,
) -> Option<Block<'a>> {
    let begin = line.content_offset() as usize;
    let line_end = line.span.end as usize;
    let group = braced_group(input.as_bytes(), begin + after_name, line_end)?;
    if !input[group.after()..line_end].trim().is_empty() {
        return None;
    }
    let inner = group.inner();
    if input[inner.clone()].trim().is_empty() {
        return None;
    }

    lexer.next_line();
    Some(Block::Heading(Heading {
        level: 4,
        command: Cow::Borrowed("textbf"),
        title: parse_inlines(&input[inner.clone()], inner.start as u32),
        short_title: None,
        starred: false,
        span: Span::from_offsets(begin, group.after()),
    }))
}

/// Offsets of the `\item` commands of a list body, skipping nested environments.
fn item_markers(input: &str, start: usize, end: usize) -> Vec<usize> {
    let bytes = input.as_bytes();
    let mut markers = Vec::new();
    let mut pos = start;

    while let Some(offset) = memchr(b'\\', &bytes[pos..end]) {
        let at = pos + offset;
        let rest = &input[at..end];
        if let Some(n) = strip_command(rest, "begin") {
            if let Some(group) = braced_group(bytes, at + n, end) {
                let name = input[group.inner()].trim();
                if let Some((_, close)) =
                    environment_end(input, group.after(), end, name, nests(name))
                {
                    pos = close;
                    continue;
                }
            }
        } else if strip_command(rest, "item").is_some() {
            markers.push(at);
        }
        pos = if at + 1 < end && bytes[at + 1] == b'\\' {
            at + 2
        } else {
            at + 1
        };
    }

    markers
}

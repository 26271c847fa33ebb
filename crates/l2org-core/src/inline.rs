//! Inline parser for running text.
//!
//! Scans for the bytes that can start markup (`\`, `$`, `~`, `{`) with
//! `memchr` and borrows everything else directly from the input. Parsing is
//! greedy and left to right; a construct that does not close stays literal.

use std::borrow::Cow;

use memchr::{memchr, memchr3, memmem, memrchr};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{
    Break, BreakKind, Inline, Link, Math, RefKind, Reference, Style, Styled, Symbol, Text,
};
use crate::cite::{is_cite_command, scan_citation, CiteScan};
use crate::scan::{braced_group, command_name_end, matching_brace, skip_blanks};
use crate::span::Span;

/// Math that org displays fine as plain text: `$<$`, `$^{13}$`, `$x_1$`.
static TRIVIAL_MATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[<>]|[0-9A-Za-z]*[\^_]\{?[0-9]+\}?[0-9A-Za-z]?)$")
        .expect("Invalid trivial math regex")
});

/// Parse inline elements of `text`, which starts at `base_offset` in the source.
pub fn parse_inlines(text: &str, base_offset: u32) -> Vec<Inline<'_>> {
    if text.is_empty() {
        return Vec::new();
    }
    InlineParser::new(text, base_offset).parse()
}

fn style_command(name: &str) -> Option<Style> {
    match name {
        "textbf" | "bf" => Some(Style::Bold),
        "textit" | "emph" | "textsl" | "textsc" | "it" | "em" | "sc" => Some(Style::Italic),
        "uline" | "underline" => Some(Style::Underline),
        "texttt" => Some(Style::Monospace),
        "textrm" | "textup" | "textnormal" => Some(Style::Roman),
        _ => None,
    }
}

/// Declarations valid inside a group, as in `{\bf text}`.
fn style_declaration(name: &str) -> Option<Style> {
    match name {
        "bf" | "bfseries" => Some(Style::Bold),
        "it" | "em" | "sl" | "sc" | "itshape" => Some(Style::Italic),
        "tt" | "ttfamily" => Some(Style::Monospace),
        _ => None,
    }
}

fn symbol_command(name: &str) -> Option<&'static str> {
    match name {
        "ldots" | "dots" => Some("..."),
        "LaTeX" => Some("LaTeX"),
        "TeX" => Some("TeX"),
        "BibTeX" => Some("BibTeX"),
        "textperthousand" => Some("\u{2030}"),
        "textasciitilde" => Some("~"),
        _ => None,
    }
}

fn removed_command(name: &str) -> bool {
    matches!(
        name,
        "noindent"
            | "centering"
            | "vfill"
            | "hfill"
            | "newline"
            | "newpage"
            | "clearpage"
            | "pagebreak"
            | "appendix"
            | "tiny"
            | "scriptsize"
            | "footnotesize"
            | "small"
            | "normalsize"
            | "large"
            | "Large"
            | "LARGE"
            | "huge"
            | "Huge"
    )
}

struct InlineParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    base_offset: u32,
}

impl<'a> InlineParser<'a> {
    #[inline]
    fn new(text: &'a str, base_offset: u32) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            base_offset,
        }
    }

    fn parse(&mut self) -> Vec<Inline<'a>> {
        let mut inlines = Vec::with_capacity(8);
        let mut text_start = 0;

        while self.pos < self.bytes.len() {
            let next_special = self.find_next_special();
            if next_special >= self.bytes.len() {
                break;
            }

            self.pos = next_special;
            let parsed = match self.bytes[self.pos] {
                b'\\' => self.try_parse_command(&mut inlines, &mut text_start),
                b'$' => self.try_parse_dollar_math(&mut inlines, &mut text_start),
                b'~' => self.parse_tie(&mut inlines, &mut text_start),
                b'{' => self.try_parse_declaration_group(&mut inlines, &mut text_start),
                _ => false,
            };

            if !parsed {
                self.pos += 1;
            }
        }

        if text_start < self.bytes.len() {
            inlines.push(self.make_text(text_start, self.bytes.len()));
        }

        inlines
    }

    #[inline(always)]
    fn find_next_special(&self) -> usize {
        let remaining = &self.bytes[self.pos..];
        let common = memchr3(b'\\', b'$', b'~', remaining);
        let brace = memchr(b'{', remaining);
        match (common, brace) {
            (Some(a), Some(b)) => self.pos + a.min(b),
            (Some(a), None) => self.pos + a,
            (None, Some(b)) => self.pos + b,
            (None, None) => self.bytes.len(),
        }
    }

    #[inline(always)]
    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.base_offset + start as u32, self.base_offset + end as u32)
    }

    #[inline(always)]
    fn make_text(&self, start: usize, end: usize) -> Inline<'a> {
        Inline::Text(Text {
            content: Cow::Borrowed(&self.text[start..end]),
            span: self.span(start, end),
        })
    }

    /// Flush pending text, push `node` and continue at `next`.
    #[inline]
    fn emit(
        &mut self,
        inlines: &mut Vec<Inline<'a>>,
        text_start: &mut usize,
        node: Inline<'a>,
        next: usize,
    ) -> bool {
        if *text_start < self.pos {
            inlines.push(self.make_text(*text_start, self.pos));
        }
        inlines.push(node);
        self.pos = next;
        *text_start = next;
        true
    }

    fn symbol(
        &mut self,
        inlines: &mut Vec<Inline<'a>>,
        text_start: &mut usize,
        text: &'static str,
        next: usize,
    ) -> bool {
        let node = Inline::Symbol(Symbol {
            text,
            span: self.span(self.pos, next),
        });
        self.emit(inlines, text_start, node, next)
    }

    fn parse_nested(&self, start: usize, end: usize) -> Vec<Inline<'a>> {
        InlineParser::new(&self.text[start..end], self.base_offset + start as u32).parse()
    }

    fn try_parse_command(&mut self, inlines: &mut Vec<Inline<'a>>, text_start: &mut usize) -> bool {
        let start = self.pos;
        let len = self.bytes.len();
        let Some(&next) = self.bytes.get(start + 1) else {
            return false;
        };

        match next {
            b'\\' => {
                let mut end = start + 2;
                if self.bytes.get(end) == Some(&b'*') {
                    end += 1;
                }
                return self.symbol(inlines, text_start, " ", end);
            }
            b'&' => return self.symbol(inlines, text_start, "&", start + 2),
            b'%' => return self.symbol(inlines, text_start, "%", start + 2),
            b' ' => return self.symbol(inlines, text_start, " ", start + 2),
            b'(' => return self.try_parse_delimited_math(inlines, text_start, b"\\)", false),
            b'[' => return self.try_parse_delimited_math(inlines, text_start, b"\\]", true),
            b if !b.is_ascii_alphabetic() => {
                // Escaped character such as `\$` or `\{`: keep both bytes as text.
                self.pos = start + 2;
                return true;
            }
            _ => {}
        }

        let name_end = command_name_end(self.bytes, start + 1, len);
        let name = &self.text[start + 1..name_end];

        if is_cite_command(name) && !self.in_comment(start) {
            if let CiteScan::Found(mut citation) = scan_citation(self.text, start, len) {
                let end = citation.span.end as usize;
                citation.span = self.span(start, end);
                return self.emit(inlines, text_start, Inline::Citation(citation), end);
            }
        }

        if let Some(style) = style_command(name) {
            if let Some(group) = braced_group(self.bytes, name_end, len) {
                let inner = group.inner();
                let node = Inline::Styled(Styled {
                    style,
                    content: self.parse_nested(inner.start, inner.end),
                    span: self.span(start, group.after()),
                });
                return self.emit(inlines, text_start, node, group.after());
            }
        } else if let Some(kind) = RefKind::from_command(name) {
            if let Some(group) = braced_group(self.bytes, name_end, len) {
                let node = Inline::Reference(Reference {
                    kind,
                    target: Cow::Borrowed(self.text[group.inner()].trim()),
                    span: self.span(start, group.after()),
                });
                return self.emit(inlines, text_start, node, group.after());
            }
        } else if name == "url" {
            if let Some(group) = braced_group(self.bytes, name_end, len) {
                let node = Inline::Link(Link {
                    url: Cow::Borrowed(self.text[group.inner()].trim()),
                    label: None,
                    span: self.span(start, group.after()),
                });
                return self.emit(inlines, text_start, node, group.after());
            }
        } else if name == "href" {
            let url = braced_group(self.bytes, name_end, len);
            let label = url.and_then(|u| braced_group(self.bytes, u.after(), len));
            if let (Some(url), Some(label)) = (url, label) {
                let inner = label.inner();
                let node = Inline::Link(Link {
                    url: Cow::Borrowed(self.text[url.inner()].trim()),
                    label: Some(self.parse_nested(inner.start, inner.end)),
                    span: self.span(start, label.after()),
                });
                return self.emit(inlines, text_start, node, label.after());
            }
        } else if let Some(text) = symbol_command(name) {
            let end = if self.text[name_end..].starts_with("{}") {
                name_end + 2
            } else {
                name_end
            };
            return self.symbol(inlines, text_start, text, end);
        } else if removed_command(name) {
            let end = skip_blanks(self.bytes, name_end, len);
            return self.layout_break(inlines, text_start, BreakKind::Removed, end);
        } else if matches!(name, "bigskip" | "medskip" | "smallskip") {
            let end = self.skip_line_end(skip_blanks(self.bytes, name_end, len));
            return self.layout_break(inlines, text_start, BreakKind::Paragraph, end);
        } else if matches!(name, "hspace" | "vspace" | "addvspace") {
            let mut arg = name_end;
            if self.bytes.get(arg) == Some(&b'*') {
                arg += 1;
            }
            if let Some(group) = braced_group(self.bytes, arg, len) {
                let end = skip_blanks(self.bytes, group.after(), len);
                if name == "hspace" {
                    return self.layout_break(inlines, text_start, BreakKind::Removed, end);
                }
                let end = self.skip_line_end(end);
                return self.layout_break(inlines, text_start, BreakKind::Paragraph, end);
            }
        }

        // Unknown command: keep it verbatim.
        self.pos = name_end;
        true
    }

    /// Whether `pos` follows an unescaped `%` on its line.
    fn in_comment(&self, pos: usize) -> bool {
        let line_start = memrchr(b'\n', &self.bytes[..pos]).map_or(0, |nl| nl + 1);
        let mut search = line_start;
        while let Some(offset) = memchr(b'%', &self.bytes[search..pos]) {
            let at = search + offset;
            if at == 0 || self.bytes[at - 1] != b'\\' {
                return true;
            }
            search = at + 1;
        }
        false
    }

    /// A paragraph break ends the line it is on.
    #[inline]
    fn skip_line_end(&self, pos: usize) -> usize {
        let rest = &self.bytes[pos..];
        if rest.starts_with(b"\r\n") {
            pos + 2
        } else if rest.starts_with(b"\n") {
            pos + 1
        } else {
            pos
        }
    }

    fn layout_break(
        &mut self,
        inlines: &mut Vec<Inline<'a>>,
        text_start: &mut usize,
        kind: BreakKind,
        next: usize,
    ) -> bool {
        let node = Inline::Break(Break {
            kind,
            span: self.span(self.pos, next),
        });
        self.emit(inlines, text_start, node, next)
    }

    fn try_parse_delimited_math(
        &mut self,
        inlines: &mut Vec<Inline<'a>>,
        text_start: &mut usize,
        close: &[u8],
        display: bool,
    ) -> bool {
        let content_start = self.pos + 2;
        let Some(offset) = memmem::find(&self.bytes[content_start..], close) else {
            return false;
        };
        let content_end = content_start + offset;
        let node = Inline::Math(Math {
            content: Cow::Borrowed(&self.text[content_start..content_end]),
            display,
            span: self.span(self.pos, content_end + 2),
        });
        self.emit(inlines, text_start, node, content_end + 2)
    }

    fn try_parse_dollar_math(&mut self, inlines: &mut Vec<Inline<'a>>, text_start: &mut usize) -> bool {
        let start = self.pos;

        if self.bytes.get(start + 1) == Some(&b'$') {
            let content_start = start + 2;
            let Some(offset) = memmem::find(&self.bytes[content_start..], b"$$") else {
                return false;
            };
            let content_end = content_start + offset;
            let node = Inline::Math(Math {
                content: Cow::Borrowed(&self.text[content_start..content_end]),
                display: true,
                span: self.span(start, content_end + 2),
            });
            return self.emit(inlines, text_start, node, content_end + 2);
        }

        let content_start = start + 1;
        let mut search = content_start;
        let close = loop {
            let Some(offset) = memchr(b'$', &self.bytes[search..]) else {
                return false;
            };
            let candidate = search + offset;
            if self.bytes[candidate - 1] != b'\\' {
                break candidate;
            }
            search = candidate + 1;
        };

        let content = &self.text[content_start..close];
        let span = self.span(start, close + 1);
        let node = if content == "\\sim" {
            Inline::Symbol(Symbol { text: "~", span })
        } else if TRIVIAL_MATH.is_match(content) {
            Inline::Text(Text {
                content: Cow::Borrowed(content),
                span,
            })
        } else {
            Inline::Math(Math {
                content: Cow::Borrowed(content),
                display: false,
                span,
            })
        };
        self.emit(inlines, text_start, node, close + 1)
    }

    /// `~` is a no-break space, except before a cross reference.
    fn parse_tie(&mut self, inlines: &mut Vec<Inline<'a>>, text_start: &mut usize) -> bool {
        let rest = &self.text[self.pos + 1..];
        let rest = rest.strip_prefix('(').unwrap_or(rest);
        let before_reference = ["\\ref{", "\\eqref{", "\\autoref{", "\\pageref{"]
            .iter()
            .any(|prefix| rest.starts_with(prefix));
        let text = if before_reference { " " } else { "\u{a0}" };
        let next = self.pos + 1;
        self.symbol(inlines, text_start, text, next)
    }

    /// `{\bf text}` style declaration groups.
    fn try_parse_declaration_group(
        &mut self,
        inlines: &mut Vec<Inline<'a>>,
        text_start: &mut usize,
    ) -> bool {
        let start = self.pos;
        let len = self.bytes.len();
        if self.bytes.get(start + 1) != Some(&b'\\') {
            return false;
        }
        let name_end = command_name_end(self.bytes, start + 2, len);
        let Some(style) = style_declaration(&self.text[start + 2..name_end]) else {
            return false;
        };
        let Some(close) = matching_brace(self.bytes, start, len) else {
            return false;
        };
        let content_start = skip_blanks(self.bytes, name_end, close);
        let node = Inline::Styled(Styled {
            style,
            content: self.parse_nested(content_start, close),
            span: self.span(start, close + 1),
        });
        self.emit(inlines, text_start, node, close + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(inlines: &[Inline]) -> Vec<String> {
        inlines
            .iter()
            .map(|i| match i {
                Inline::Text(t) => format!("T({})", t.content),
                Inline::Styled(s) => format!("S({:?},{})", s.style, texts(&s.content).join("")),
                Inline::Math(m) => format!("M({},{})", m.content, m.display),
                Inline::Link(l) => format!("L({})", l.url),
                Inline::Reference(r) => format!("R({:?},{})", r.kind, r.target),
                Inline::Symbol(s) => format!("Y({})", s.text),
                Inline::Citation(c) => format!("C({},{})", c.command, c.keys.join(";")),
                Inline::Break(b) => format!("B({:?})", b.kind),
            })
            .collect()
    }

    #[test]
    fn plain_text_is_one_node() {
        let inlines = parse_inlines("Just words.\n", 0);
        assert_eq!(texts(&inlines), vec!["T(Just words.\n)"]);
    }

    #[test]
    fn nested_styles() {
        let inlines = parse_inlines("a \\textbf{b \\emph{c}} d", 0);
        assert_eq!(
            texts(&inlines),
            vec!["T(a )", "S(Bold,T(b )S(Italic,T(c)))", "T( d)"]
        );
    }

    #[test]
    fn declaration_groups() {
        let inlines = parse_inlines("{\\bf bold} and {\\it it}", 0);
        assert_eq!(
            texts(&inlines),
            vec!["S(Bold,T(bold))", "T( and )", "S(Italic,T(it))"]
        );
    }

    #[test]
    fn plain_groups_stay_literal() {
        let inlines = parse_inlines("{x}", 0);
        assert_eq!(texts(&inlines), vec!["T({x})"]);
    }

    #[test]
    fn math_and_trivial_math() {
        let inlines = parse_inlines("$x+y$ and $^{13}$C and $<$", 0);
        assert_eq!(
            texts(&inlines),
            vec!["M(x+y,false)", "T( and )", "T(^{13})", "T(C and )", "T(<)"]
        );
    }

    #[test]
    fn escaped_dollar_is_not_math() {
        let inlines = parse_inlines("costs \\$5 or \\$6", 0);
        assert_eq!(texts(&inlines), vec!["T(costs \\$5 or \\$6)"]);
    }

    #[test]
    fn tie_before_reference_is_plain_space() {
        let inlines = parse_inlines("Figure~\\ref{fig:a} and A~B", 0);
        assert_eq!(
            texts(&inlines),
            vec!["T(Figure)", "Y( )", "R(Ref,fig:a)", "T( and A)", "Y(\u{a0})", "T(B)"]
        );
    }

    #[test]
    fn layout_commands_break_or_vanish() {
        let inlines = parse_inlines("\\noindent Text\\vspace{2mm} more", 0);
        assert_eq!(
            texts(&inlines),
            vec!["B(Removed)", "T(Text)", "B(Paragraph)", "T(more)"]
        );
    }

    #[test]
    fn paragraph_break_ends_its_line() {
        let inlines = parse_inlines("\\bigskip\nNext", 0);
        assert_eq!(texts(&inlines), vec!["B(Paragraph)", "T(Next)"]);
    }

    #[test]
    fn unknown_commands_pass_through() {
        let inlines = parse_inlines("\\foo{bar} \\SI{5}{m}", 0);
        assert_eq!(texts(&inlines), vec!["T(\\foo{bar} \\SI{5}{m})"]);
    }

    #[test]
    fn spans_are_offset() {
        let inlines = parse_inlines("x \\emph{y}", 100);
        match &inlines[1] {
            Inline::Styled(s) => assert_eq!(s.span, Span::new(102, 110)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn citations_in_titles() {
        let inlines = parse_inlines("Results of \\citet{smith} and \\textbf{see \\cite{a, b}}", 0);
        assert_eq!(
            texts(&inlines),
            vec!["T(Results of )", "C(citet,smith)", "T( and )", "S(Bold,T(see )C(cite,a;b))"]
        );
    }

    #[test]
    fn citation_spans_are_offset() {
        let inlines = parse_inlines("x \\cite{k}", 40);
        match &inlines[1] {
            Inline::Citation(c) => assert_eq!(c.span, Span::new(42, 50)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn commented_citations_stay_text() {
        let inlines = parse_inlines("50\\% \\cite{a} % \\cite{b}", 0);
        assert_eq!(
            texts(&inlines),
            vec!["T(50)", "Y(%)", "T( )", "C(cite,a)", "T( % \\cite{b})"]
        );
    }
}

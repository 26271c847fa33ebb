//! Block to org-mode mapping.
//!
//! Every block maps to exactly one fragment; the converted file is the
//! concatenation of the fragments in source order. Environments without an
//! org counterpart are wrapped in a LaTeX export block whose body is the
//! original source, byte for byte.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::ast::{
    Block, BreakKind, Citation, Document, Environment, EnvironmentKind, Heading, Inline, List,
    ListKind, Preamble, PreambleEntry, Style,
};
use crate::config::ConversionConfig;
use crate::convert::bibliography_file_name;
use crate::inline::parse_inlines;
use crate::scan::collapse_whitespace;

pub const EXPORT_BEGIN: &str = "#+BEGIN_EXPORT latex";
pub const EXPORT_END: &str = "#+END_EXPORT";
pub const LATEX_KEYWORD: &str = "#+latex: ";
/// Comment line marking a line break that is not in the LaTeX source.
pub const JOIN_MARKER: &str = "# l2org:join";

#[inline]
fn org_marker(text: &str) -> bool {
    text.starts_with('*') || text.starts_with("#+")
}

#[inline]
fn split_indent(line: &str) -> (&str, &str) {
    let rest = line.trim_start_matches([' ', '\t']);
    line.split_at(line.len() - rest.len())
}

/// Prefix a comma to a block line that org would read as a heading or keyword.
pub fn escape_line(line: &str) -> Cow<'_, str> {
    let (indent, rest) = split_indent(line);
    if org_marker(rest.trim_start_matches(',')) {
        Cow::Owned(format!("{},{}", indent, rest))
    } else {
        Cow::Borrowed(line)
    }
}

/// Undo [`escape_line`].
pub fn unescape_line(line: &str) -> Cow<'_, str> {
    let (indent, rest) = split_indent(line);
    match rest.strip_prefix(',') {
        Some(unescaped) if org_marker(unescaped.trim_start_matches(',')) => {
            Cow::Owned(format!("{}{}", indent, unescaped))
        }
        _ => Cow::Borrowed(line),
    }
}

/// Wrap LaTeX `source` in an export block followed by `line_end`.
pub fn export_block(source: &str, line_end: &str) -> String {
    let mut out = String::with_capacity(
        EXPORT_BEGIN.len() + source.len() + EXPORT_END.len() + line_end.len() + 2,
    );
    out.push_str(EXPORT_BEGIN);
    out.push('\n');
    for line in source.split('\n') {
        out.push_str(&escape_line(line));
        out.push('\n');
    }
    out.push_str(EXPORT_END);
    out.push_str(line_end);
    out
}

/// Render inline content as org markup.
pub fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    write_inlines(inlines, &mut out);
    out
}

fn write_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&text.content),
            Inline::Styled(styled) => {
                let inner = render_inlines(&styled.content);
                let marker = match styled.style {
                    Style::Bold => "*",
                    Style::Italic => "/",
                    Style::Underline => "_",
                    Style::Monospace => "=",
                    Style::Roman => "",
                };
                if inner.trim().is_empty() {
                    out.push_str(&inner);
                } else {
                    out.push_str(marker);
                    out.push_str(&inner);
                    out.push_str(marker);
                }
            }
            Inline::Math(math) => {
                let (open, close) = if math.display {
                    ("\\[", "\\]")
                } else {
                    ("\\(", "\\)")
                };
                out.push_str(open);
                out.push_str(&math.content);
                out.push_str(close);
            }
            Inline::Link(link) => match &link.label {
                Some(label) => {
                    let _ = write!(out, "[[{}][{}]]", link.url, render_inlines(label).trim());
                }
                None => {
                    let _ = write!(out, "[[{}]]", link.url);
                }
            },
            Inline::Reference(reference) => {
                out.push_str(reference.kind.link_type());
                out.push(':');
                out.push_str(&reference.target);
            }
            Inline::Symbol(symbol) => out.push_str(symbol.text),
            Inline::Citation(citation) => out.push_str(&citation_link(citation)),
            Inline::Break(brk) => match brk.kind {
                BreakKind::Removed => {}
                BreakKind::Paragraph if out.is_empty() || out.ends_with('\n') => out.push('\n'),
                BreakKind::Paragraph => out.push_str("\n\n"),
            },
        }
    }
}

/// org-ref v3 citation link.
pub fn citation_link(citation: &Citation) -> String {
    let keys = citation
        .keys
        .iter()
        .map(|key| format!("&{}", key))
        .collect::<Vec<_>>()
        .join(";");
    let command = &citation.command;
    match (&citation.prenote, &citation.postnote) {
        (None, None) => format!("[[{}:{}]]", command, keys),
        (pre, post) => format!(
            "[[{}:{};{};{}]]",
            command,
            pre.as_deref().unwrap_or(""),
            keys,
            post.as_deref().unwrap_or("")
        ),
    }
}

/// Maps parsed blocks to org fragments.
#[derive(Debug, Clone)]
pub struct Mapper {
    latex_preview: bool,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(&ConversionConfig::default())
    }
}

impl Mapper {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            latex_preview: config.latex_preview,
        }
    }

    /// One fragment per top-level block, in order.
    pub fn map_document(&self, document: &Document) -> Vec<String> {
        let fragments: Vec<String> = document
            .blocks
            .iter()
            .map(|block| self.map_block(block))
            .collect();
        tracing::trace!("Mapped {} blocks", fragments.len());
        fragments
    }

    pub fn map_block(&self, block: &Block) -> String {
        match block {
            Block::Plaintext(text) => render_inlines(&text.content),
            Block::Heading(heading) => map_heading(heading),
            Block::Citation(citation) => citation_link(citation),
            Block::Environment(env) => self.map_environment(env),
            Block::Preamble(preamble) => self.map_preamble(preamble),
            Block::LatexLine(line) => format!("{}{}{}", LATEX_KEYWORD, line.text, line.line_end),
            Block::Bibliography(bib) => {
                let files = bib
                    .files
                    .iter()
                    .map(|file| bibliography_file_name(file))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("bibliography:{}{}", files, bib.line_end)
            }
            Block::BibliographyStyle(style) => {
                format!("bibliographystyle:{}{}", style.style, style.line_end)
            }
            Block::DocumentMarker(_) => String::new(),
        }
    }

    /// Nested content. Join markers only matter at the top level.
    fn map_blocks(&self, blocks: &[Block]) -> String {
        let out: String = blocks.iter().map(|block| self.map_block(block)).collect();
        if !out.contains(JOIN_MARKER) {
            return out;
        }
        out.split_inclusive('\n')
            .filter(|line| line.trim_end() != JOIN_MARKER)
            .collect()
    }

    fn map_environment(&self, env: &Environment) -> String {
        if env.excluded {
            let mut out = String::with_capacity(env.source.len() + env.line_end.len());
            out.push_str(&env.source);
            if !env.text_follows {
                out.push_str(&env.line_end);
            }
            return out;
        }

        // Org blocks start on their own line; the extractor drops marked breaks.
        let mut out = String::new();
        if env.starts_mid_line {
            out.push('\n');
            if env.is_wrapped() {
                out.push_str(JOIN_MARKER);
                out.push('\n');
            }
        }

        match &env.kind {
            EnvironmentKind::Literal => {
                out.push_str(&export_block(&env.source, &env.line_end));
                if env.text_follows {
                    out.push_str(JOIN_MARKER);
                    out.push('\n');
                }
            }
            EnvironmentKind::Verbatim => {
                out.push_str("#+begin_src text\n");
                for line in verbatim_lines(&env.body) {
                    out.push_str(&escape_line(line));
                    out.push('\n');
                }
                out.push_str("#+end_src");
                out.push_str(&env.line_end);
            }
            EnvironmentKind::Quote(blocks) => {
                let inner = self.map_blocks(blocks);
                out.push_str("#+begin_quote\n");
                let inner = inner.trim();
                if !inner.is_empty() {
                    out.push_str(inner);
                    out.push('\n');
                }
                out.push_str("#+end_quote");
                out.push_str(&env.line_end);
            }
            EnvironmentKind::List(list) => {
                out.push_str(&self.map_list(list));
                out.push_str(&env.line_end);
            }
        }
        out
    }

    /// List items, without a trailing line break.
    fn map_list(&self, list: &List) -> String {
        let mut lines: Vec<String> = Vec::new();

        for (i, item) in list.items.iter().enumerate() {
            let mut marker = match list.kind {
                ListKind::Enumerate => format!("{}. ", i + 1),
                ListKind::Itemize | ListKind::Description => "- ".to_string(),
            };
            let pad = " ".repeat(marker.len());
            if let Some(term) = &item.term {
                let _ = write!(marker, "{} :: ", collapse_whitespace(&render_inlines(term)));
            }

            let body = self.map_blocks(&item.blocks);
            let mut body_lines = body.trim().lines();
            match body_lines.next() {
                Some(first) => lines.push(format!("{}{}", marker, first)),
                None => lines.push(marker.trim_end().to_string()),
            }
            for line in body_lines {
                if line.trim().is_empty() {
                    lines.push(String::new());
                } else {
                    lines.push(format!("{}{}", pad, line));
                }
            }
        }

        lines.join("\n")
    }

    fn map_preamble(&self, preamble: &Preamble) -> String {
        let mut out = String::new();
        if self.latex_preview {
            out.push_str("#+startup: latexpreview\n");
        }

        for entry in &preamble.entries {
            match entry {
                PreambleEntry::Class { name, options } => {
                    let _ = writeln!(out, "#+latex_class: {}", name);
                    if let Some(options) = options {
                        let _ = writeln!(out, "#+latex_class_options: [{}]", options);
                    }
                }
                PreambleEntry::Title(text) => keyword(&mut out, "title", text),
                PreambleEntry::Author(text) => keyword(&mut out, "author", text),
                PreambleEntry::Date(text) => keyword(&mut out, "date", text),
                PreambleEntry::Email(text) => keyword(&mut out, "email", text),
                PreambleEntry::Header(text) => {
                    let _ = writeln!(out, "#+latex_header: {}", text);
                }
            }
        }

        out
    }
}

fn keyword(out: &mut String, name: &str, value: &str) {
    let rendered = render_inlines(&parse_inlines(value, 0));
    let _ = writeln!(out, "#+{}: {}", name, collapse_whitespace(&rendered));
}

fn map_heading(heading: &Heading) -> String {
    let title = render_inlines(&heading.title);
    let mut out = format!(
        "{} {}\n",
        "*".repeat(heading.level as usize),
        collapse_whitespace(&title)
    );

    if heading.starred || heading.short_title.is_some() {
        out.push_str(":PROPERTIES:\n");
        if heading.starred {
            out.push_str(":UNNUMBERED: t\n");
        }
        if let Some(short) = &heading.short_title {
            let _ = writeln!(out, ":ALT_TITLE: {}", short);
        }
        out.push_str(":END:\n");
    }

    out
}

/// Lines of a verbatim body, without the break after `\begin` and the
/// indentation before `\end`.
fn verbatim_lines(body: &str) -> impl Iterator<Item = &str> {
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);
    let body = body.trim_end_matches([' ', '\t']);
    let body = body
        .strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body);
    body.split('\n')
        .filter(move |_| !body.is_empty())
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn convert(input: &str) -> String {
        let result = Parser::default().parse(input);
        Mapper::default().map_document(&result.document).concat()
    }

    #[test]
    fn styles_map_to_org_markers() {
        assert_eq!(
            convert("\\textbf{b} \\emph{i} \\underline{u} \\texttt{t} \\textrm{r}\n"),
            "*b* /i/ _u_ =t= r\n"
        );
    }

    #[test]
    fn math_delimiters() {
        assert_eq!(convert("$a$ and $$b$$\n"), "\\(a\\) and \\[b\\]\n");
    }

    #[test]
    fn links_and_references() {
        assert_eq!(
            convert("See~\\ref{fig:x}, \\url{https://a.org} \\href{https://b.org}{B}\n"),
            "See ref:fig:x, [[https://a.org]] [[https://b.org][B]]\n"
        );
    }

    #[test]
    fn citation_notes() {
        assert_eq!(convert("\\cite{a,b}"), "[[cite:&a;&b]]");
        assert_eq!(convert("\\citep[p.~5]{a}"), "[[citep:;&a;p.~5]]");
        assert_eq!(convert("\\citep[see][]{a}"), "[[citep:see;&a;]]");
        assert_eq!(convert("\\citep[see][p. 2]{a}"), "[[citep:see;&a;p. 2]]");
    }

    #[test]
    fn heading_drawer() {
        assert_eq!(
            convert("\\section*[Short]{Long\n  title}\n"),
            "* Long title\n:PROPERTIES:\n:UNNUMBERED: t\n:ALT_TITLE: Short\n:END:\n"
        );
    }

    #[test]
    fn verbatim_is_escaped() {
        assert_eq!(
            convert("\\begin{verbatim}\n* not a heading\ncode\n\\end{verbatim}\n"),
            "#+begin_src text\n,* not a heading\ncode\n#+end_src\n"
        );
    }

    #[test]
    fn empty_styles_leave_no_markers() {
        assert_eq!(convert("a\\textbf{}b\n"), "ab\n");
    }

    #[test]
    fn citations_in_titles_and_terms() {
        assert_eq!(
            convert("\\section{Results of \\citet{smith}}\n"),
            "* Results of [[citet:&smith]]\n"
        );
        assert_eq!(convert("\\textbf{See \\cite{a,b}}\n"), "**** See [[cite:&a;&b]]\n");
        assert_eq!(
            convert("\\begin{description}\n\\item[\\cite{k}] x\n\\end{description}\n"),
            "- [[cite:&k]] :: x\n"
        );
    }

    #[test]
    fn export_lines_are_comma_escaped() {
        assert_eq!(
            export_block("\\begin{x}\n* star\n  #+key\n,* kept\n\\end{x}", ""),
            "#+BEGIN_EXPORT latex\n\\begin{x}\n,* star\n  ,#+key\n,,* kept\n\\end{x}\n#+END_EXPORT"
        );
        assert_eq!(unescape_line("  ,#+key"), "  #+key");
        assert_eq!(unescape_line(",,* kept"), ",* kept");
        assert_eq!(unescape_line(",plain"), ",plain");
    }

    #[test]
    fn mid_line_environments_are_marked() {
        assert_eq!(
            convert("a \\begin{x}y\\end{x} b\n"),
            "a \n# l2org:join\n#+BEGIN_EXPORT latex\n\\begin{x}y\\end{x}\n#+END_EXPORT\n# l2org:join\n b\n"
        );
    }

    #[test]
    fn vertical_space_is_one_blank_line() {
        assert_eq!(convert("one\n\\vspace{1em}\ntwo\n"), "one\n\ntwo\n");
    }
}

//! Syntax tree produced by the LaTeX parser.
//!
//! The tree is flat at the top: a [`Document`] is an ordered list of
//! [`Block`]s, and concatenating the org fragment of every block yields the
//! converted file. Nesting only happens inside natively converted
//! environments (list items and quotes hold their own blocks).
//!
//! Text borrows from the input through [`CowStr`].

use crate::span::Span;

/// Borrowed or owned string type for zero-copy parsing.
pub type CowStr<'a> = std::borrow::Cow<'a, str>;

/// A parsed LaTeX document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    /// Blocks in source order.
    pub blocks: Vec<Block<'a>>,
    /// Span covering the entire input.
    pub span: Span,
}

impl<'a> Document<'a> {
    /// All citations in the document, including those nested in lists and quotes.
    pub fn citations(&self) -> Vec<&Citation<'a>> {
        let mut out = Vec::new();
        collect_citations(&self.blocks, &mut out);
        out
    }

    /// Bibliography files named by `\bibliography` commands.
    pub fn bibliography_files(&self) -> impl Iterator<Item = (&str, Span)> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Bibliography(bib) => Some(bib),
            _ => None,
        })
        .flat_map(|bib| bib.files.iter().map(move |f| (f.as_ref(), bib.span)))
    }
}

fn collect_citations<'d, 'a>(blocks: &'d [Block<'a>], out: &mut Vec<&'d Citation<'a>>) {
    for block in blocks {
        match block {
            Block::Citation(c) => out.push(c),
            Block::Plaintext(p) => collect_inline_citations(&p.content, out),
            Block::Heading(h) => collect_inline_citations(&h.title, out),
            Block::Environment(env) => match &env.kind {
                EnvironmentKind::List(list) => {
                    for item in &list.items {
                        if let Some(term) = &item.term {
                            collect_inline_citations(term, out);
                        }
                        collect_citations(&item.blocks, out);
                    }
                }
                EnvironmentKind::Quote(inner) => collect_citations(inner, out),
                _ => {}
            },
            _ => {}
        }
    }
}

fn collect_inline_citations<'d, 'a>(inlines: &'d [Inline<'a>], out: &mut Vec<&'d Citation<'a>>) {
    for inline in inlines {
        match inline {
            Inline::Citation(c) => out.push(c),
            Inline::Styled(styled) => collect_inline_citations(&styled.content, out),
            Inline::Link(Link {
                label: Some(label), ..
            }) => collect_inline_citations(label, out),
            _ => {}
        }
    }
}

/// Block-level nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Block<'a> {
    /// Running text up to the end of a line (or up to the next citation).
    Plaintext(Plaintext<'a>),
    /// Sectioning command.
    Heading(Heading<'a>),
    /// Citation macro such as `\cite{a,b}`.
    Citation(Citation<'a>),
    /// `\begin{name} ... \end{name}`.
    Environment(Environment<'a>),
    /// Lines from `\documentclass` through `\begin{document}`.
    Preamble(Preamble<'a>),
    /// A line kept for the LaTeX exporter only (comments, layout commands).
    LatexLine(LatexLine<'a>),
    /// `\bibliography{...}`.
    Bibliography(Bibliography<'a>),
    /// `\bibliographystyle{...}`.
    BibliographyStyle(BibliographyStyle<'a>),
    /// `\begin{document}` or `\end{document}` outside a preamble.
    DocumentMarker(Span),
}

impl Block<'_> {
    pub fn span(&self) -> Span {
        match self {
            Block::Plaintext(b) => b.span,
            Block::Heading(b) => b.span,
            Block::Citation(b) => b.span,
            Block::Environment(b) => b.span,
            Block::Preamble(b) => b.span,
            Block::LatexLine(b) => b.span,
            Block::Bibliography(b) => b.span,
            Block::BibliographyStyle(b) => b.span,
            Block::DocumentMarker(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext<'a> {
    /// Source text, including the line terminator when the run ends a line.
    pub raw: CowStr<'a>,
    /// Parsed inline content of `raw`.
    pub content: Vec<Inline<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heading<'a> {
    /// Outline level, 1 for `\chapter` and `\section`.
    pub level: u8,
    /// Command name without backslash (`section`, `textbf`, ...).
    pub command: CowStr<'a>,
    /// Title inline content.
    pub title: Vec<Inline<'a>>,
    /// Optional `[short]` title used in tables of contents.
    pub short_title: Option<CowStr<'a>>,
    /// `\section*` style unnumbered heading.
    pub starred: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Citation<'a> {
    /// Macro name without backslash, including a trailing `*`.
    pub command: CowStr<'a>,
    /// Citation keys in source order.
    pub keys: Vec<CowStr<'a>>,
    pub prenote: Option<CowStr<'a>>,
    pub postnote: Option<CowStr<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment<'a> {
    pub name: CowStr<'a>,
    /// Text from `\begin{name}` through `\end{name}`, byte for byte.
    pub source: CowStr<'a>,
    /// Text between the `\begin{name}` and `\end{name}` markers.
    pub body: CowStr<'a>,
    /// Named in the `exclude_env` configuration.
    pub excluded: bool,
    /// False when the input ended before `\end{name}`.
    pub terminated: bool,
    /// Line terminator consumed after `\end{name}`, or a synthesized `"\n"`
    /// when text follows on the same line.
    pub line_end: CowStr<'a>,
    /// `\begin{name}` is preceded by text on its line.
    pub starts_mid_line: bool,
    /// Text follows `\end{name}` on its line.
    pub text_follows: bool,
    pub kind: EnvironmentKind<'a>,
    pub span: Span,
}

impl Environment<'_> {
    /// Whether this environment is emitted inside a LaTeX export block.
    pub fn is_wrapped(&self) -> bool {
        !self.excluded && matches!(self.kind, EnvironmentKind::Literal)
    }
}

/// How an environment's body is represented.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentKind<'a> {
    /// Kept as LaTeX source (wrapped or, when excluded, raw).
    Literal,
    /// `verbatim` body.
    Verbatim,
    /// `itemize`, `enumerate` or `description`.
    List(List<'a>),
    /// `quote` or `quotation` content.
    Quote(Vec<Block<'a>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Itemize,
    Enumerate,
    Description,
}

impl ListKind {
    pub fn from_env(name: &str) -> Option<Self> {
        match name {
            "itemize" => Some(ListKind::Itemize),
            "enumerate" => Some(ListKind::Enumerate),
            "description" => Some(ListKind::Description),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct List<'a> {
    pub kind: ListKind,
    pub items: Vec<ListItem<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem<'a> {
    /// `\item[term]` label, used by description lists.
    pub term: Option<Vec<Inline<'a>>>,
    pub blocks: Vec<Block<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preamble<'a> {
    pub entries: Vec<PreambleEntry<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreambleEntry<'a> {
    Class {
        name: CowStr<'a>,
        options: Option<CowStr<'a>>,
    },
    Title(CowStr<'a>),
    Author(CowStr<'a>),
    Date(CowStr<'a>),
    Email(CowStr<'a>),
    /// Any other non-blank preamble line.
    Header(CowStr<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatexLine<'a> {
    /// The line text without terminator.
    pub text: CowStr<'a>,
    pub line_end: CowStr<'a>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bibliography<'a> {
    /// File names as written, without forcing an extension.
    pub files: Vec<CowStr<'a>>,
    pub line_end: CowStr<'a>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BibliographyStyle<'a> {
    pub style: CowStr<'a>,
    pub line_end: CowStr<'a>,
    pub span: Span,
}

/// Inline nodes within running text and titles.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline<'a> {
    /// Literal text.
    Text(Text<'a>),
    /// `\textbf{...}`, `{\em ...}` and friends.
    Styled(Styled<'a>),
    /// `$...$`, `\(...\)`, `$$...$$`, `\[...\]`.
    Math(Math<'a>),
    /// `\url` or `\href`.
    Link(Link<'a>),
    /// `\label`, `\ref` and related cross references.
    Reference(Reference<'a>),
    /// Citation macro inside a title or term.
    Citation(Citation<'a>),
    /// A command or character replaced by fixed text.
    Symbol(Symbol),
    /// Layout command with no org counterpart.
    Break(Break),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text<'a> {
    pub content: CowStr<'a>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Underline,
    Monospace,
    /// `\textrm`: content kept, markup removed.
    Roman,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Styled<'a> {
    pub style: Style,
    pub content: Vec<Inline<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Math<'a> {
    pub content: CowStr<'a>,
    pub display: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link<'a> {
    pub url: CowStr<'a>,
    pub label: Option<Vec<Inline<'a>>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Label,
    Ref,
    Eqref,
    Pageref,
    Autoref,
}

impl RefKind {
    pub fn from_command(name: &str) -> Option<Self> {
        match name {
            "label" => Some(RefKind::Label),
            "ref" => Some(RefKind::Ref),
            "eqref" => Some(RefKind::Eqref),
            "pageref" => Some(RefKind::Pageref),
            "autoref" => Some(RefKind::Autoref),
            _ => None,
        }
    }

    /// org-ref link type.
    pub fn link_type(self) -> &'static str {
        match self {
            RefKind::Label => "label",
            RefKind::Ref => "ref",
            RefKind::Eqref => "eqref",
            RefKind::Pageref => "pageref",
            RefKind::Autoref => "autoref",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference<'a> {
    pub kind: RefKind,
    pub target: CowStr<'a>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub text: &'static str,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// Dropped, e.g. `\noindent` or `\newpage`.
    Removed,
    /// Vertical space, rendered as a blank line.
    Paragraph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Break {
    pub kind: BreakKind,
    pub span: Span,
}

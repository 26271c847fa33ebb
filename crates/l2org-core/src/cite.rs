//! Citation macros.
//!
//! Recognizes `\cite`-family macros with up to two optional arguments:
//!
//! ```text
//! \cite{a,b}            keys only
//! \citep[p.~5]{a}       one optional argument: postnote
//! \citep[see][ch. 2]{a} two optional arguments: prenote, postnote
//! ```
//!
//! The key group may span lines. org-ref v3 rendering lives in the mapper.

use std::borrow::Cow;

use crate::ast::{Citation, CowStr};
use crate::scan::{
    collapse_whitespace, command_name_end, matching_brace, matching_bracket, skip_whitespace,
};
use crate::span::Span;

/// Result of probing a backslash for a citation macro.
#[derive(Debug, Clone, PartialEq)]
pub enum CiteScan<'a> {
    Found(Citation<'a>),
    /// A citation macro whose argument groups never close.
    Unclosed(Span),
    NotCitation,
}

/// Whether `name` (without backslash) is a citation macro.
pub fn is_cite_command(name: &str) -> bool {
    name.starts_with("cite") || name.starts_with("Cite")
}

/// Probe `input[start..]`, where `input[start]` is a backslash.
pub fn scan_citation(input: &str, start: usize, end: usize) -> CiteScan<'_> {
    let bytes = input.as_bytes();
    if bytes.get(start) != Some(&b'\\') {
        return CiteScan::NotCitation;
    }

    let name_end = command_name_end(bytes, start + 1, end);
    let mut command_end = name_end;
    if !is_cite_command(&input[start + 1..name_end]) {
        return CiteScan::NotCitation;
    }
    if bytes.get(command_end) == Some(&b'*') {
        command_end += 1;
    }
    let command = &input[start + 1..command_end];

    let mut optional: Vec<&str> = Vec::with_capacity(2);
    let mut pos = skip_whitespace(bytes, command_end, end);
    while optional.len() < 2 && bytes.get(pos) == Some(&b'[') {
        let Some(close) = matching_bracket(bytes, pos, end) else {
            return CiteScan::Unclosed(Span::from_offsets(start, end));
        };
        optional.push(&input[pos + 1..close]);
        pos = skip_whitespace(bytes, close + 1, end);
    }

    if bytes.get(pos) != Some(&b'{') {
        return CiteScan::NotCitation;
    }
    let Some(close) = matching_brace(bytes, pos, end) else {
        return CiteScan::Unclosed(Span::from_offsets(start, end));
    };

    let keys: Vec<CowStr<'_>> = input[pos + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(Cow::Borrowed)
        .collect();
    if keys.is_empty() {
        return CiteScan::NotCitation;
    }

    let (prenote, postnote) = match optional.as_slice() {
        [] => (None, None),
        [post] => (None, note(post)),
        [pre, post, ..] => (note(pre), note(post)),
    };

    CiteScan::Found(Citation {
        command: Cow::Borrowed(command),
        keys,
        prenote,
        postnote,
        span: Span::from_offsets(start, close + 1),
    })
}

/// Normalize an optional argument; empty arguments carry no note.
fn note(text: &str) -> Option<CowStr<'_>> {
    let note = collapse_whitespace(text);
    if note.is_empty() {
        None
    } else {
        Some(note)
    }
}

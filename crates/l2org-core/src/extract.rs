//! Recover LaTeX from converted org text.
//!
//! LaTeX export blocks are unwrapped to their bodies and `#+latex:` lines to
//! their text. A join marker line removes the line break before it. Every
//! other line is kept as is. For documents made only of wrapped environments
//! and plain text this reproduces the LaTeX input.

use std::borrow::Cow;

use crate::mapper::{unescape_line, EXPORT_BEGIN, EXPORT_END, JOIN_MARKER, LATEX_KEYWORD};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    /// Text of a `#+latex:` line, terminator included.
    Keyword(&'a str),
    /// Unescaped export block body and whatever followed `#+END_EXPORT` on its line.
    Export { body: Cow<'a, str>, tail: &'a str },
    Join,
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn is_export_begin(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXPORT_BEGIN)
}

fn unescape_body(body: &str) -> Cow<'_, str> {
    if !body.contains(',') {
        return Cow::Borrowed(body);
    }
    let mut out = String::with_capacity(body.len());
    for (i, line) in body.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&unescape_line(line));
    }
    Cow::Owned(out)
}

fn segments(org: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut offset = 0;
    // (start of the BEGIN line, start of the body)
    let mut open: Option<(usize, usize)> = None;

    for line in org.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        match open {
            None if is_export_begin(line) => open = Some((start, offset)),
            None if line.trim_end() == JOIN_MARKER => out.push(Segment::Join),
            None => match line.strip_prefix(LATEX_KEYWORD) {
                Some(text) => out.push(Segment::Keyword(text)),
                None => out.push(Segment::Text(line)),
            },
            Some((_, body_start)) if starts_with_ignore_case(line.trim_start(), EXPORT_END) => {
                let body = &org[body_start..start];
                out.push(Segment::Export {
                    body: unescape_body(body.strip_suffix('\n').unwrap_or(body)),
                    tail: &line.trim_start()[EXPORT_END.len()..],
                });
                open = None;
            }
            Some(_) => {}
        }
    }

    // An export block that never ends is left untouched.
    if let Some((begin, _)) = open {
        out.push(Segment::Text(&org[begin..]));
    }

    out
}

/// Convert org text back to LaTeX.
pub fn org_to_latex(org: &str) -> String {
    let mut out = String::with_capacity(org.len());
    for segment in segments(org) {
        match segment {
            Segment::Text(text) | Segment::Keyword(text) => out.push_str(text),
            Segment::Export { body, tail } => {
                out.push_str(&body);
                out.push_str(tail);
            }
            Segment::Join => {
                if out.ends_with('\n') {
                    out.pop();
                }
            }
        }
    }
    out
}

/// Bodies of all LaTeX export blocks, in order.
pub fn export_blocks(org: &str) -> Vec<Cow<'_, str>> {
    segments(org)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Export { body, .. } => Some(body),
            _ => None,
        })
        .collect()
}

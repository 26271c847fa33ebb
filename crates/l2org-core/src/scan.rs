//! Byte-level helpers for LaTeX argument groups.
//!
//! All positions are byte offsets into the slice passed in. Delimiters are
//! ASCII, so every returned offset is a char boundary.

use std::borrow::Cow;

use memchr::memmem;

/// Find the `}` matching the `{` at `open`, honouring nesting and `\{` `\}` escapes.
pub fn matching_brace(bytes: &[u8], open: usize, end: usize) -> Option<usize> {
    matching(bytes, open, end, b'{', b'}')
}

/// Find the `]` matching the `[` at `open`. Brace groups inside are skipped.
pub fn matching_bracket(bytes: &[u8], open: usize, end: usize) -> Option<usize> {
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let mut depth = 0usize;
    let mut pos = open;
    while pos < end {
        match bytes[pos] {
            b'\\' => pos += 1,
            b'{' => pos = matching_brace(bytes, pos, end)?,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

fn matching(bytes: &[u8], open: usize, end: usize, left: u8, right: u8) -> Option<usize> {
    if bytes.get(open) != Some(&left) {
        return None;
    }
    let mut depth = 0usize;
    let mut pos = open;
    while pos < end {
        let b = bytes[pos];
        if b == b'\\' {
            pos += 2;
            continue;
        }
        if b == left {
            depth += 1;
        } else if b == right {
            depth -= 1;
            if depth == 0 {
                return Some(pos);
            }
        }
        pos += 1;
    }
    None
}

/// Skip spaces and tabs.
#[inline]
pub fn skip_blanks(bytes: &[u8], mut pos: usize, end: usize) -> usize {
    while pos < end && matches!(bytes[pos], b' ' | b'\t') {
        pos += 1;
    }
    pos
}

/// Skip spaces, tabs and line breaks.
#[inline]
pub fn skip_whitespace(bytes: &[u8], mut pos: usize, end: usize) -> usize {
    while pos < end && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// End of the ASCII-letter command name starting at `pos`.
#[inline]
pub fn command_name_end(bytes: &[u8], mut pos: usize, end: usize) -> usize {
    while pos < end && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    pos
}

/// If `text` starts with `\name` followed by a non-letter, return the offset past the name.
pub fn strip_command(text: &str, name: &str) -> Option<usize> {
    let rest = text.strip_prefix('\\')?.strip_prefix(name)?;
    match rest.as_bytes().first() {
        Some(b) if b.is_ascii_alphabetic() => None,
        _ => Some(name.len() + 1),
    }
}

/// Collapse runs of whitespace (including line breaks) to single spaces.
pub fn collapse_whitespace(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    if trimmed.contains(['\n', '\r', '\t']) || trimmed.contains("  ") {
        Cow::Owned(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// A braced argument: `{content}` with the positions of both braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    pub open: usize,
    pub close: usize,
}

impl Group {
    /// Content range between the braces.
    pub fn inner(&self) -> std::ops::Range<usize> {
        self.open + 1..self.close
    }

    /// Offset just past the closing brace.
    pub fn after(&self) -> usize {
        self.close + 1
    }
}

/// Parse a braced group at `pos` after optional blanks.
pub fn braced_group(bytes: &[u8], pos: usize, end: usize) -> Option<Group> {
    let open = skip_blanks(bytes, pos, end);
    let close = matching_brace(bytes, open, end)?;
    Some(Group { open, close })
}

/// Locate the `\end{name}` closing the environment whose body starts at `from`.
///
/// Returns `(end_marker_start, end_marker_end)`. Same-name environments nest
/// unless `nests` is false, as for verbatim bodies.
pub fn environment_end(
    input: &str,
    from: usize,
    end: usize,
    name: &str,
    nests: bool,
) -> Option<(usize, usize)> {
    let begin_marker = format!("\\begin{{{}}}", name);
    let end_marker = format!("\\end{{{}}}", name);
    let haystack = &input.as_bytes()[..end];
    let end_finder = memmem::Finder::new(end_marker.as_bytes());
    let begin_finder = memmem::Finder::new(begin_marker.as_bytes());

    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let next_end = pos + end_finder.find(&haystack[pos..])?;
        let next_begin = if nests {
            begin_finder.find(&haystack[pos..next_end]).map(|p| pos + p)
        } else {
            None
        };
        match next_begin {
            Some(begin) => {
                depth += 1;
                pos = begin + begin_marker.len();
            }
            None => {
                depth -= 1;
                if depth == 0 {
                    return Some((next_end, next_end + end_marker.len()));
                }
                pos = next_end + end_marker.len();
            }
        }
    }
}

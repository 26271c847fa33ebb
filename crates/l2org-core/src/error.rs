use std::fmt;
use std::path::PathBuf;

use crate::span::Span;

/// Categories of parse diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input bytes are not valid UTF-8
    InvalidEncoding,
    /// `\begin{name}` without a matching `\end{name}`
    UnclosedEnvironment,
    /// Brace group of a heading or citation never closes
    UnclosedBrace,
    /// `\documentclass` without `\begin{document}`
    UnterminatedPreamble,
    /// A `\bibliography` file could not be found
    MissingBibliography,
}

/// A parse diagnostic with location and recovery information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable error message
    pub message: String,
    /// Source location where the problem was found
    pub span: Option<Span>,
    pub kind: ParseErrorKind,
    /// Whether conversion continues after this error
    pub recoverable: bool,
}

impl ParseError {
    /// The input could not be decoded; `valid_up_to` is the length of the valid prefix.
    pub fn invalid_encoding(valid_up_to: usize) -> Self {
        Self {
            message: format!("input is not valid UTF-8 (valid up to byte {})", valid_up_to),
            span: Some(Span::from_offsets(valid_up_to, valid_up_to + 1)),
            kind: ParseErrorKind::InvalidEncoding,
            recoverable: false,
        }
    }

    pub fn unclosed_environment(name: &str, span: Span) -> Self {
        Self {
            message: format!("environment '{}' is never closed", name),
            span: Some(span),
            kind: ParseErrorKind::UnclosedEnvironment,
            recoverable: true,
        }
    }

    pub fn unclosed_brace(context: &str, span: Span) -> Self {
        Self {
            message: format!("unclosed brace in {}", context),
            span: Some(span),
            kind: ParseErrorKind::UnclosedBrace,
            recoverable: true,
        }
    }

    pub fn unterminated_preamble(span: Span) -> Self {
        Self {
            message: "preamble has no \\begin{document}".to_string(),
            span: Some(span),
            kind: ParseErrorKind::UnterminatedPreamble,
            recoverable: true,
        }
    }

    pub fn missing_bibliography(file: &str, span: Span) -> Self {
        Self {
            message: format!("bibliography file '{}' not found", file),
            span: Some(span),
            kind: ParseErrorKind::MissingBibliography,
            recoverable: true,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(span) = self.span {
            write!(f, " at bytes {}..{}", span.start, span.end)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Diagnostics collected while parsing one document.
#[derive(Debug, Clone, Default)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    /// Count the diagnostics of one kind.
    pub fn count(&self, kind: ParseErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(|e| !e.recoverable)
    }
}

impl Extend<ParseError> for ParseErrors {
    fn extend<T: IntoIterator<Item = ParseError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Errors that abort a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("bibliography file {path} not found")]
    MissingBibliography { path: PathBuf },

    #[error("input and output are the same file: {path}")]
    SameFile { path: PathBuf },
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_span() {
        let err = ParseError::unclosed_environment("figure", Span::new(3, 9));
        assert_eq!(err.to_string(), "environment 'figure' is never closed at bytes 3..9");
    }

    #[test]
    fn encoding_errors_are_fatal() {
        let mut errors = ParseErrors::new();
        errors.push(ParseError::unclosed_brace("citation", Span::new(0, 1)));
        assert!(!errors.has_fatal());
        errors.push(ParseError::invalid_encoding(12));
        assert!(errors.has_fatal());
        assert_eq!(errors.count(ParseErrorKind::InvalidEncoding), 1);
    }
}

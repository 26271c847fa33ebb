//! File-level conversion.
//!
//! [`Converter`] runs parse, map and write for one input and reports what it
//! did. All recoverable problems end up in the report's diagnostics; only
//! unreadable input, undecodable text, unwritable output and (when strict)
//! missing bibliography files abort.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::ast::{Block, Document, EnvironmentKind};
use crate::config::ConversionConfig;
use crate::error::{ConvertError, ParseError, ParseErrors, Result};
use crate::mapper::Mapper;
use crate::parser::Parser;
use crate::span::Span;
use crate::writer;

/// Counts of the top-level blocks of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub blocks: usize,
    pub headings: usize,
    /// Citations anywhere in the document, including lists and quotes.
    pub citations: usize,
    pub wrapped_environments: usize,
    pub excluded_environments: usize,
    /// Lists, quotes and verbatim blocks converted to org syntax.
    pub native_environments: usize,
    pub latex_lines: usize,
}

impl DocumentStats {
    pub fn from_document(document: &Document) -> Self {
        let mut stats = DocumentStats {
            blocks: document.blocks.len(),
            citations: document.citations().len(),
            ..Default::default()
        };
        for block in &document.blocks {
            match block {
                Block::Heading(_) => stats.headings += 1,
                Block::LatexLine(_) => stats.latex_lines += 1,
                Block::Environment(env) if env.excluded => stats.excluded_environments += 1,
                Block::Environment(env) => match env.kind {
                    EnvironmentKind::Literal => stats.wrapped_environments += 1,
                    _ => stats.native_environments += 1,
                },
                _ => {}
            }
        }
        stats
    }
}

/// Result of converting text in memory.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub org: String,
    /// Number of input lines.
    pub lines: usize,
    pub stats: DocumentStats,
    /// Files named by `\bibliography`, as written, with the command's span.
    pub bibliography: Vec<(String, Span)>,
    pub errors: ParseErrors,
}

/// Summary of a file conversion.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub lines: usize,
    pub bytes_written: usize,
    pub stats: DocumentStats,
    pub diagnostics: ParseErrors,
}

/// Default output path: `x.tex` becomes `x.org`, any other name gets `.org` appended.
pub fn default_output_path(input: &Path) -> PathBuf {
    match input.extension().and_then(|ext| ext.to_str()) {
        Some("tex") | Some("org") => input.with_extension("org"),
        _ => {
            let mut name = input.as_os_str().to_os_string();
            name.push(".org");
            PathBuf::from(name)
        }
    }
}

/// File name of a `\bibliography` entry, which may omit the extension.
pub fn bibliography_file_name(entry: &str) -> String {
    if entry.ends_with(".bib") {
        entry.to_string()
    } else {
        format!("{}.bib", entry)
    }
}

pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ConvertError::io(path, source))
}

fn count_lines(input: &str) -> usize {
    let newlines = memchr::memchr_iter(b'\n', input.as_bytes()).count();
    newlines + usize::from(!input.is_empty() && !input.ends_with('\n'))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Converts LaTeX sources to org-mode.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: ConversionConfig,
    mapper: Mapper,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        let mapper = Mapper::new(&config);
        Self { config, mapper }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn convert_str(&self, input: &str) -> Conversion {
        let result = Parser::new(&self.config).parse(input);
        let document = &result.document;
        let fragments = self.mapper.map_document(document);
        debug_assert_eq!(fragments.len(), document.blocks.len());

        Conversion {
            org: writer::concat(&fragments),
            lines: count_lines(input),
            stats: DocumentStats::from_document(document),
            bibliography: document
                .bibliography_files()
                .map(|(file, span)| (file.to_string(), span))
                .collect(),
            errors: result.errors,
        }
    }

    /// Convert raw bytes; fails only on invalid UTF-8.
    pub fn convert_bytes(&self, input: &[u8]) -> std::result::Result<Conversion, ParseError> {
        let text = std::str::from_utf8(input)
            .map_err(|err| ParseError::invalid_encoding(err.valid_up_to()))?;
        Ok(self.convert_str(text))
    }

    /// Look for the `\bibliography` files of `input` next to it.
    ///
    /// A missing file is an error with `strict_bibliography`, otherwise a
    /// diagnostic.
    pub fn check_bibliography(
        &self,
        input: &Path,
        entries: &[(String, Span)],
        diagnostics: &mut ParseErrors,
    ) -> Result<()> {
        let base = input.parent().unwrap_or_else(|| Path::new(""));
        for (entry, span) in entries {
            let path = base.join(bibliography_file_name(entry));
            if path.is_file() {
                continue;
            }
            if self.config.strict_bibliography {
                return Err(ConvertError::MissingBibliography { path });
            }
            diagnostics.push(ParseError::missing_bibliography(entry, *span));
        }
        Ok(())
    }

    /// Convert `input` and write the result to `output`, or to
    /// [`default_output_path`] when no output is given.
    pub fn convert_file(&self, input: &Path, output: Option<&Path>) -> Result<ConversionReport> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input));
        if same_file(input, &output) {
            return Err(ConvertError::SameFile { path: output });
        }

        tracing::info!("Converting {} to {}", input.display(), output.display());
        let raw = read_source(input)?;
        let conversion = self
            .convert_bytes(&raw)
            .map_err(|source| ConvertError::Parse {
                path: input.to_path_buf(),
                source,
            })?;

        let mut diagnostics = conversion.errors;
        self.check_bibliography(input, &conversion.bibliography, &mut diagnostics)?;

        for diagnostic in diagnostics.iter() {
            tracing::warn!("{}: {}", input.display(), diagnostic);
        }

        let bytes_written = writer::write_org(&output, &[conversion.org])?;
        tracing::info!("{} lines processed", conversion.lines);

        Ok(ConversionReport {
            input: input.to_path_buf(),
            output,
            lines: conversion.lines,
            bytes_written,
            stats: conversion.stats,
            diagnostics,
        })
    }
}

//! Integration tests for file conversion and configuration loading.

use std::fs;
use std::path::PathBuf;

use l2org_core::{ConversionConfig, ConvertError, Converter, ParseErrorKind, CONFIG_FILE_NAME};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_default_output_next_to_input() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "paper.tex", b"\\section{A}\nText \\cite{k}.\n");

    let report = Converter::default().convert_file(&input, None).unwrap();

    assert_eq!(report.output, dir.path().join("paper.org"));
    assert_eq!(report.lines, 2);
    let org = fs::read_to_string(&report.output).unwrap();
    assert_eq!(org, "* A\nText [[cite:&k]].\n");
    assert_eq!(report.bytes_written, org.len());
}

#[test]
fn test_explicit_output_path() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "paper.tex", b"text\n");
    let output = dir.path().join("out.org");

    let report = Converter::default()
        .convert_file(&input, Some(&output))
        .unwrap();

    assert_eq!(report.output, output);
    assert_eq!(fs::read_to_string(&output).unwrap(), "text\n");
    assert!(!dir.path().join("paper.org").exists());
}

#[test]
fn test_existing_output_is_replaced() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "paper.tex", b"new\n");
    let output = write(&dir, "paper.org", b"old content that is longer\n");

    Converter::default().convert_file(&input, None).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "new\n");
}

#[test]
fn test_same_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "notes.org", b"text\n");

    let err = Converter::default().convert_file(&input, None).unwrap_err();

    assert!(matches!(err, ConvertError::SameFile { .. }));
    assert_eq!(fs::read_to_string(&input).unwrap(), "text\n");
}

// ============================================================================
// Input Error Tests
// ============================================================================

#[test]
fn test_missing_input_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Converter::default()
        .convert_file(&dir.path().join("absent.tex"), None)
        .unwrap_err();
    assert!(matches!(err, ConvertError::Io { .. }));
}

#[test]
fn test_invalid_utf8_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "bad.tex", b"caf\xe9\n");

    let err = Converter::default().convert_file(&input, None).unwrap_err();

    match err {
        ConvertError::Parse { source, .. } => {
            assert_eq!(source.kind, ParseErrorKind::InvalidEncoding)
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!dir.path().join("bad.org").exists());
}

// ============================================================================
// Bibliography Tests
// ============================================================================

#[test]
fn test_missing_bibliography_is_diagnostic() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "paper.tex", b"\\bibliography{refs}\n");

    let report = Converter::default().convert_file(&input, None).unwrap();

    assert_eq!(
        report.diagnostics.count(ParseErrorKind::MissingBibliography),
        1
    );
    assert_eq!(
        fs::read_to_string(&report.output).unwrap(),
        "bibliography:refs.bib\n"
    );
}

#[test]
fn test_present_bibliography_is_accepted() {
    let dir = TempDir::new().unwrap();
    write(&dir, "refs.bib", b"@book{k, title={T}}\n");
    let input = write(&dir, "paper.tex", b"\\bibliography{refs}\n");

    let report = Converter::default().convert_file(&input, None).unwrap();

    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_strict_bibliography_fails() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "paper.tex", b"\\bibliography{refs}\n");
    let config = ConversionConfig {
        strict_bibliography: true,
        ..Default::default()
    };

    let err = Converter::new(config).convert_file(&input, None).unwrap_err();

    match err {
        ConvertError::MissingBibliography { path } => {
            assert_eq!(path, dir.path().join("refs.bib"))
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!dir.path().join("paper.org").exists());
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_discovered_config_excludes_environments() {
    let dir = TempDir::new().unwrap();
    write(&dir, CONFIG_FILE_NAME, b"exclude_env = [\"tabular\"]\n");
    let source = "\\begin{tabular}{c}\nx\n\\end{tabular}\n";
    let input = write(&dir, "paper.tex", source.as_bytes());

    let config = ConversionConfig::discover(&input).unwrap().unwrap();
    assert!(config.is_excluded("tabular"));

    let report = Converter::new(config).convert_file(&input, None).unwrap();
    assert_eq!(fs::read_to_string(&report.output).unwrap(), source);
}

#[test]
fn test_no_config_to_discover() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "paper.tex", b"");
    assert!(ConversionConfig::discover(&input).unwrap().is_none());
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.toml", b"exclude_env = \"table\"\n");

    let err = ConversionConfig::load(&path).unwrap_err();

    assert!(matches!(err, ConvertError::Config { .. }));
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn test_unknown_config_keys_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "l2org.toml", b"exclude_environments = []\n");
    assert!(ConversionConfig::load(&path).is_err());
}

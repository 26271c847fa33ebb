//! l2org - convert LaTeX files to org-mode
//!
//! Usage:
//!   l2org [OPTIONS] <INFILE>
//!
//! Writes `<INFILE>` with a `.org` extension unless `-o` is given. `--check`
//! reports diagnostics without writing, `--json` dumps the parsed blocks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use l2org_core::ast::{Block, BreakKind, EnvironmentKind, Inline, ListKind, PreambleEntry, Style};
use l2org_core::{ConversionConfig, Converter, Document, ParseErrors, Parser};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(ClapParser)]
#[command(name = "l2org")]
#[command(about = "Convert LaTeX documents to org-mode with org-ref citations")]
#[command(version)]
struct Cli {
    /// LaTeX file to convert
    infile: PathBuf,

    /// Name of the output org file (defaults to the input name with .org)
    #[arg(short, long = "outfile")]
    outfile: Option<PathBuf>,

    /// Environments to pass through as raw LaTeX (comma separated)
    #[arg(short = 'e', long = "exclude-env", value_delimiter = ',')]
    exclude_env: Vec<String>,

    /// Configuration file (defaults to l2org.toml next to the input)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail when a \bibliography file is missing
    #[arg(long)]
    strict_bibliography: bool,

    /// Do not emit #+startup: latexpreview
    #[arg(long)]
    no_latex_preview: bool,

    /// Print the parsed block structure as JSON instead of converting
    #[arg(long, conflicts_with = "check")]
    json: bool,

    /// Parse and report diagnostics without writing output
    #[arg(long)]
    check: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("l2org={0},l2org_core={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = resolve_config(cli)?;

    if cli.json {
        return cmd_json(&cli.infile, &config);
    }
    if cli.check {
        return cmd_check(&cli.infile, config);
    }

    let converter = Converter::new(config);
    let report = converter
        .convert_file(&cli.infile, cli.outfile.as_deref())
        .with_context(|| format!("failed to convert '{}'", cli.infile.display()))?;

    println!("Output file: {}", report.output.display());
    println!("{} lines processed", report.lines);
    Ok(ExitCode::SUCCESS)
}

/// Defaults, then the configuration file, then flags.
fn resolve_config(cli: &Cli) -> Result<ConversionConfig> {
    let config = match &cli.config {
        Some(path) => ConversionConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => ConversionConfig::discover(&cli.infile)?.unwrap_or_default(),
    };

    let mut config = config.with_excluded(cli.exclude_env.iter().map(|e| e.trim().to_string()));
    config.exclude_env.retain(|name| !name.is_empty());
    if cli.strict_bibliography {
        config.strict_bibliography = true;
    }
    if cli.no_latex_preview {
        config.latex_preview = false;
    }

    tracing::debug!("Configuration: {:?}", config);
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    let bytes = l2org_core::convert::read_source(path)?;
    String::from_utf8(bytes).map_err(|err| {
        let source = l2org_core::ParseError::invalid_encoding(err.utf8_error().valid_up_to());
        anyhow::Error::new(source).context(format!("cannot decode '{}'", path.display()))
    })
}

// =============================================================================
// Check Command
// =============================================================================

fn cmd_check(infile: &Path, config: ConversionConfig) -> Result<ExitCode> {
    let input = read_input(infile)?;
    let converter = Converter::new(config);
    let conversion = converter.convert_str(&input);

    let mut diagnostics = conversion.errors;
    converter.check_bibliography(infile, &conversion.bibliography, &mut diagnostics)?;

    let stats = conversion.stats;
    println!("Blocks:        {}", stats.blocks);
    println!("  Headings:    {}", stats.headings);
    println!("  Citations:   {}", stats.citations);
    println!("  Wrapped:     {}", stats.wrapped_environments);
    println!("  Excluded:    {}", stats.excluded_environments);
    println!("  Native:      {}", stats.native_environments);
    println!("  LaTeX lines: {}", stats.latex_lines);
    println!("Lines:         {}", conversion.lines);

    if diagnostics.is_empty() {
        println!("Valid: no problems found");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} problem(s) found", diagnostics.len());
        for diagnostic in diagnostics.iter() {
            eprintln!("  - {}", diagnostic);
        }
        Ok(ExitCode::FAILURE)
    }
}

// =============================================================================
// JSON Output
// =============================================================================

fn cmd_json(infile: &Path, config: &ConversionConfig) -> Result<ExitCode> {
    let input = read_input(infile)?;
    let result = Parser::new(config).parse(&input);
    let json_doc = convert_document(&result.document, &result.errors);
    println!("{}", serde_json::to_string_pretty(&json_doc)?);
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    blocks: Vec<JsonBlock<'a>>,
    errors: Vec<JsonError<'a>>,
}

#[derive(Serialize)]
struct JsonError<'a> {
    message: &'a str,
    span: Option<(u32, u32)>,
    recoverable: bool,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum JsonBlock<'a> {
    Plaintext {
        raw: &'a str,
        content: Vec<JsonInline<'a>>,
    },
    Heading {
        level: u8,
        command: &'a str,
        starred: bool,
        short_title: Option<&'a str>,
        title: Vec<JsonInline<'a>>,
    },
    Citation {
        command: &'a str,
        keys: Vec<&'a str>,
        prenote: Option<&'a str>,
        postnote: Option<&'a str>,
    },
    Environment {
        name: &'a str,
        kind: &'static str,
        excluded: bool,
        terminated: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        items: Vec<JsonListItem<'a>>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        blocks: Vec<JsonBlock<'a>>,
    },
    Preamble {
        entries: Vec<JsonPreambleEntry<'a>>,
    },
    LatexLine {
        text: &'a str,
    },
    Bibliography {
        files: Vec<&'a str>,
    },
    BibliographyStyle {
        style: &'a str,
    },
    DocumentMarker,
}

#[derive(Serialize)]
struct JsonListItem<'a> {
    term: Option<Vec<JsonInline<'a>>>,
    blocks: Vec<JsonBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum JsonPreambleEntry<'a> {
    Class {
        name: &'a str,
        options: Option<&'a str>,
    },
    Title {
        value: &'a str,
    },
    Author {
        value: &'a str,
    },
    Date {
        value: &'a str,
    },
    Email {
        value: &'a str,
    },
    Header {
        value: &'a str,
    },
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum JsonInline<'a> {
    Text {
        content: &'a str,
    },
    Styled {
        style: &'static str,
        content: Vec<JsonInline<'a>>,
    },
    Math {
        display: bool,
        content: &'a str,
    },
    Link {
        url: &'a str,
        label: Option<Vec<JsonInline<'a>>>,
    },
    Reference {
        kind: &'static str,
        target: &'a str,
    },
    Symbol {
        text: &'static str,
    },
    Citation {
        command: &'a str,
        keys: Vec<&'a str>,
        prenote: Option<&'a str>,
        postnote: Option<&'a str>,
    },
    Break {
        paragraph: bool,
    },
}

fn convert_document<'a>(doc: &'a Document, errors: &'a ParseErrors) -> JsonDocument<'a> {
    JsonDocument {
        blocks: doc.blocks.iter().map(convert_block).collect(),
        errors: errors
            .iter()
            .map(|e| JsonError {
                message: &e.message,
                span: e.span.map(|s| (s.start, s.end)),
                recoverable: e.recoverable,
            })
            .collect(),
    }
}

fn convert_block<'a>(block: &'a Block) -> JsonBlock<'a> {
    match block {
        Block::Plaintext(p) => JsonBlock::Plaintext {
            raw: &p.raw,
            content: p.content.iter().map(convert_inline).collect(),
        },
        Block::Heading(h) => JsonBlock::Heading {
            level: h.level,
            command: &h.command,
            starred: h.starred,
            short_title: h.short_title.as_deref(),
            title: h.title.iter().map(convert_inline).collect(),
        },
        Block::Citation(c) => JsonBlock::Citation {
            command: &c.command,
            keys: c.keys.iter().map(|k| k.as_ref()).collect(),
            prenote: c.prenote.as_deref(),
            postnote: c.postnote.as_deref(),
        },
        Block::Environment(env) => {
            let (kind, items, blocks) = match &env.kind {
                EnvironmentKind::Literal => ("literal", Vec::new(), Vec::new()),
                EnvironmentKind::Verbatim => ("verbatim", Vec::new(), Vec::new()),
                EnvironmentKind::Quote(blocks) => {
                    ("quote", Vec::new(), blocks.iter().map(convert_block).collect())
                }
                EnvironmentKind::List(list) => {
                    let kind = match list.kind {
                        ListKind::Itemize => "itemize",
                        ListKind::Enumerate => "enumerate",
                        ListKind::Description => "description",
                    };
                    let items = list
                        .items
                        .iter()
                        .map(|item| JsonListItem {
                            term: item
                                .term
                                .as_ref()
                                .map(|term| term.iter().map(convert_inline).collect()),
                            blocks: item.blocks.iter().map(convert_block).collect(),
                        })
                        .collect();
                    (kind, items, Vec::new())
                }
            };
            JsonBlock::Environment {
                name: &env.name,
                kind,
                excluded: env.excluded,
                terminated: env.terminated,
                items,
                blocks,
            }
        }
        Block::Preamble(p) => JsonBlock::Preamble {
            entries: p
                .entries
                .iter()
                .map(|entry| match entry {
                    PreambleEntry::Class { name, options } => JsonPreambleEntry::Class {
                        name,
                        options: options.as_deref(),
                    },
                    PreambleEntry::Title(value) => JsonPreambleEntry::Title { value },
                    PreambleEntry::Author(value) => JsonPreambleEntry::Author { value },
                    PreambleEntry::Date(value) => JsonPreambleEntry::Date { value },
                    PreambleEntry::Email(value) => JsonPreambleEntry::Email { value },
                    PreambleEntry::Header(value) => JsonPreambleEntry::Header { value },
                })
                .collect(),
        },
        Block::LatexLine(l) => JsonBlock::LatexLine { text: &l.text },
        Block::Bibliography(b) => JsonBlock::Bibliography {
            files: b.files.iter().map(|f| f.as_ref()).collect(),
        },
        Block::BibliographyStyle(s) => JsonBlock::BibliographyStyle { style: &s.style },
        Block::DocumentMarker(_) => JsonBlock::DocumentMarker,
    }
}

fn convert_inline<'a>(inline: &'a Inline) -> JsonInline<'a> {
    match inline {
        Inline::Text(t) => JsonInline::Text {
            content: &t.content,
        },
        Inline::Styled(s) => JsonInline::Styled {
            style: match s.style {
                Style::Bold => "bold",
                Style::Italic => "italic",
                Style::Underline => "underline",
                Style::Monospace => "monospace",
                Style::Roman => "roman",
            },
            content: s.content.iter().map(convert_inline).collect(),
        },
        Inline::Math(m) => JsonInline::Math {
            display: m.display,
            content: &m.content,
        },
        Inline::Link(l) => JsonInline::Link {
            url: &l.url,
            label: l
                .label
                .as_ref()
                .map(|label| label.iter().map(convert_inline).collect()),
        },
        Inline::Reference(r) => JsonInline::Reference {
            kind: r.kind.link_type(),
            target: &r.target,
        },
        Inline::Symbol(s) => JsonInline::Symbol { text: s.text },
        Inline::Citation(c) => JsonInline::Citation {
            command: &c.command,
            keys: c.keys.iter().map(|k| k.as_ref()).collect(),
            prenote: c.prenote.as_deref(),
            postnote: c.postnote.as_deref(),
        },
        Inline::Break(b) => JsonInline::Break {
            paragraph: b.kind == BreakKind::Paragraph,
        },
    }
}

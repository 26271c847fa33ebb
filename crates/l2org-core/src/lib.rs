//! # l2org core
//!
//! Converts LaTeX documents to org-mode.
//!
//! Section commands become org headings, emphasis becomes org emphasis and
//! citation macros become org-ref v3 links. Environments with no org
//! counterpart are wrapped verbatim in LaTeX export blocks, so exporting the
//! org file back to LaTeX reproduces them byte for byte.
//!
//! ## Quick Start
//!
//! ```rust
//! use l2org_core::{ConversionConfig, Converter};
//!
//! let input = "\\section{Results}\nAs shown in \\cite{foo,bar}.\n";
//! let conversion = Converter::new(ConversionConfig::default()).convert_str(input);
//!
//! assert_eq!(conversion.org, "* Results\nAs shown in [[cite:&foo;&bar]].\n");
//! ```
//!
//! ## Round Trip
//!
//! ```rust
//! use l2org_core::{extract::org_to_latex, Converter};
//!
//! let input = "Intro.\n\\begin{table}\n\\centering\n\\end{table}\n";
//! let org = Converter::default().convert_str(input).org;
//!
//! assert!(org.contains("#+BEGIN_EXPORT latex\n\\begin{table}"));
//! assert_eq!(org_to_latex(&org), input);
//! ```

pub mod ast;
pub mod cite;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod inline;
pub mod lexer;
pub mod mapper;
pub mod parser;
pub mod scan;
pub mod span;
pub mod writer;

pub use ast::{Block, Document, Inline};
pub use config::{ConversionConfig, CONFIG_FILE_NAME};
pub use convert::{default_output_path, Conversion, ConversionReport, Converter, DocumentStats};
pub use error::{ConvertError, ParseError, ParseErrorKind, ParseErrors};
pub use mapper::Mapper;
pub use parser::{ParseResult, Parser};

//! Conversion settings.
//!
//! Settings come from built-in defaults, an optional `l2org.toml` file and
//! command-line flags, in increasing order of precedence. Only the first two
//! are handled here; the binary applies its flags on top.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConvertError, Result};

/// File name looked up next to the input when no config path is given.
pub const CONFIG_FILE_NAME: &str = "l2org.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    /// Environments passed through as raw LaTeX instead of being wrapped
    /// or converted.
    pub exclude_env: BTreeSet<String>,
    /// Emit `#+startup: latexpreview` for documents with a preamble.
    pub latex_preview: bool,
    /// Treat a missing `\bibliography` file as an error.
    pub strict_bibliography: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            exclude_env: BTreeSet::new(),
            latex_preview: true,
            strict_bibliography: false,
        }
    }
}

impl ConversionConfig {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConvertError::io(path, source))?;
        Self::from_toml_str(&contents).map_err(|source| ConvertError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `l2org.toml` from the directory of `input`, if there is one.
    pub fn discover(input: &Path) -> Result<Option<Self>> {
        let path = Self::discovery_path(input);
        if !path.is_file() {
            return Ok(None);
        }
        tracing::debug!("Using configuration {}", path.display());
        Self::load(&path).map(Some)
    }

    /// Where [`ConversionConfig::discover`] looks for a configuration file.
    pub fn discovery_path(input: &Path) -> PathBuf {
        input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(CONFIG_FILE_NAME)
    }

    /// Add environments to the exclusion list.
    pub fn with_excluded<I, S>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_env.extend(envs.into_iter().map(Into::into));
        self
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_env.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConversionConfig::default();
        assert!(config.exclude_env.is_empty());
        assert!(config.latex_preview);
        assert!(!config.strict_bibliography);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ConversionConfig::from_toml_str("exclude_env = [\"tikzpicture\"]\n").unwrap();
        assert!(config.is_excluded("tikzpicture"));
        assert!(!config.is_excluded("table"));
        assert!(config.latex_preview);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(ConversionConfig::from_toml_str("exclude_envs = []\n").is_err());
    }

    #[test]
    fn test_with_excluded_merges() {
        let config = ConversionConfig::from_toml_str("exclude_env = [\"a\"]")
            .unwrap()
            .with_excluded(["b"]);
        assert_eq!(
            config.exclude_env.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_discovery_path_is_next_to_input() {
        assert_eq!(
            ConversionConfig::discovery_path(Path::new("paper/main.tex")),
            Path::new("paper").join(CONFIG_FILE_NAME)
        );
        assert_eq!(
            ConversionConfig::discovery_path(Path::new("main.tex")),
            PathBuf::from(CONFIG_FILE_NAME)
        );
    }
}

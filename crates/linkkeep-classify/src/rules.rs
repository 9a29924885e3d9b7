//! Classification rules and their Markdown file format.
//!
//! A rules file is plain Markdown. Every `## Heading` opens a category and
//! every `- bullet` beneath it adds a pattern:
//!
//! ```markdown
//! ## Desktop
//! - ~/Desktop/**/*
//!
//! ## Services
//! - /srv/*
//! ```
//!
//! Anything else in the file is ignored.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors raised while reading a rules file.
#[derive(Debug, Error)]
pub enum RulesError {
    /// The file could not be read.
    #[error("Failed to read rules {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered mapping from category name to glob patterns.
///
/// Declaration order matters: the first category with a matching pattern
/// wins, and patterns are tried in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationRules {
    rules: IndexMap<String, Vec<String>>,
}

impl ClassificationRules {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append patterns to a category, declaring it if needed.
    pub fn add<I, S>(&mut self, category: impl Into<String>, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .entry(category.into())
            .or_default()
            .extend(patterns.into_iter().map(Into::into));
    }

    /// Builder-style [`add`](Self::add).
    pub fn with_rule<I, S>(mut self, category: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(category, patterns);
        self
    }

    /// Parse the Markdown rules format.
    pub fn parse_markdown(text: &str) -> Self {
        let mut rules = Self::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if let Some(heading) = line.strip_prefix("## ") {
                let heading = heading.trim();
                if heading.is_empty() {
                    current = None;
                } else {
                    rules.rules.entry(heading.to_string()).or_default();
                    current = Some(heading.to_string());
                }
                continue;
            }

            if let (Some(pattern), Some(category)) = (line.strip_prefix("- "), current.as_ref()) {
                let pattern = pattern.trim();
                if !pattern.is_empty() {
                    rules.add(category.clone(), [pattern]);
                }
            }
        }

        rules
    }

    /// Read and parse a rules file.
    pub fn read_markdown(path: &Path) -> Result<Self, RulesError> {
        let text = std::fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_markdown(&text))
    }

    /// Read a rules file, falling back to an empty rule set on any error.
    pub fn load_markdown(path: &Path) -> Self {
        Self::read_markdown(path).unwrap_or_else(|err| {
            warn!("{err}; every link will be unclassified");
            Self::new()
        })
    }

    /// Iterate categories and their patterns in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Category names in declaration order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Default rules file location (`~/.config/lk/projects.md`).
pub fn default_rules_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("lk").join("projects.md"))
}

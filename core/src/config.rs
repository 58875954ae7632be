use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How a query term is matched against index terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermMatch {
    /// Only the identical index term.
    Exact,
    /// The identical term and every index term that starts with it.
    #[default]
    Prefix,
}

impl fmt::Display for TermMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TermMatch::Exact => "exact",
            TermMatch::Prefix => "prefix",
        })
    }
}

impl FromStr for TermMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(TermMatch::Exact),
            "prefix" => Ok(TermMatch::Prefix),
            other => Err(format!("unknown term match mode: {other}")),
        }
    }
}

/// Documents written between flushes during bulk indexing, unless configured.
pub const DEFAULT_FLUSH_EVERY: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Directory holding the sled database.
    pub db_path: PathBuf,
    pub term_match: TermMatch,
    /// Shorter autocomplete prefixes return no suggestions.
    pub autocomplete_min_prefix: usize,
    /// Documents written between flushes during bulk indexing.
    pub flush_every: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./search-index"),
            term_match: TermMatch::Prefix,
            autocomplete_min_prefix: 2,
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

impl SearchConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn with_db_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.db_path = path.as_ref().to_path_buf();
        self
    }
}

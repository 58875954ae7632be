pub mod config;
pub mod engine;
pub mod indexer;
pub mod stemmer;
pub mod store;
pub mod tokenizer;

pub use config::{SearchConfig, TermMatch};
pub use engine::SearchEngine;
pub use indexer::{player_document, team_document, DataSource, Indexer, PlayerRecord, TeamRecord};
pub use store::DocumentStore;
pub use tokenizer::Analyzer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type DocId = u64;
pub type Metadata = serde_json::Map<String, serde_json::Value>;
/// Exact-match metadata filters, all of which must hold.
pub type Filters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Player,
    Team,
}

impl DocType {
    pub const ALL: [DocType; 2] = [DocType::Player, DocType::Team];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Player => "player",
            DocType::Team => "team",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "player" | "players" => Ok(DocType::Player),
            "team" | "teams" => Ok(DocType::Team),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// A searchable entity as handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_type: DocType,
    pub entity_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(doc_type: DocType, entity_id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { doc_type, entity_id: entity_id.into(), title: title.into(), content: content.into(), metadata: Metadata::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A document as persisted, with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub doc_id: DocId,
    pub doc_type: DocType,
    pub entity_id: String,
    pub title: String,
    pub content: String,
    pub metadata: Metadata,
    pub indexed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub doc_type: DocType,
    pub entity_id: String,
    pub title: String,
    pub metadata: Metadata,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    pub fn empty(query: &str) -> Self { Self { query: query.to_string(), count: 0, results: Vec::new() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion: String,
    pub entity_id: String,
    pub doc_type: DocType,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteResponse {
    pub prefix: String,
    pub count: usize,
    pub suggestions: Vec<Suggestion>,
}

impl AutocompleteResponse {
    pub fn empty(prefix: &str) -> Self { Self { prefix: prefix.to_string(), count: 0, suggestions: Vec::new() } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularSearch {
    pub query: String,
    pub search_count: u64,
    pub result_count: u64,
    pub last_searched_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_terms: usize,
    pub total_index_entries: usize,
    pub documents_by_type: BTreeMap<String, usize>,
}

/// Outcome of a rebuild. Failures are reported here instead of raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildStats {
    pub players_indexed: usize,
    pub teams_indexed: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Current time as RFC 3339, as stored in document rows and reported for
/// search statistics.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_parses_and_displays() {
        assert_eq!("player".parse::<DocType>(), Ok(DocType::Player));
        assert_eq!("Teams".parse::<DocType>(), Ok(DocType::Team));
        assert!("coach".parse::<DocType>().is_err());
        assert_eq!(DocType::Team.to_string(), "team");
    }

    #[test]
    fn doc_type_serializes_lowercase() {
        let json = serde_json::to_string(&DocType::Player).unwrap();
        assert_eq!(json, "\"player\"");
    }

    #[test]
    fn rebuild_stats_omit_missing_error() {
        let stats = RebuildStats { players_indexed: 3, teams_indexed: 0, success: true, error: None };
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("error").is_none());
    }
}

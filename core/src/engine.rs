//! Ranked search, autocomplete and query statistics over a [`DocumentStore`].
//!
//! Everything here is a best-effort read path: storage errors are logged and
//! turned into empty results.

use crate::config::SearchConfig;
use crate::store::DocumentStore;
use crate::tokenizer::Analyzer;
use crate::{AutocompleteResponse, DocId, DocType, Filters, IndexStats, Metadata, PopularSearch, SearchHit, SearchResponse, Suggestion};
use anyhow::Result;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone, Copy)]
struct Candidate {
    freq_sum: u64,
    matched_terms: u32,
}

impl Candidate {
    /// sum(matched frequencies) / (1 + distinct matched query terms)
    fn score(&self) -> f64 { self.freq_sum as f64 / (1.0 + self.matched_terms as f64) }
}

#[derive(Clone)]
pub struct SearchEngine {
    store: DocumentStore,
    analyzer: Analyzer,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: DocumentStore, config: SearchConfig) -> Self {
        Self { store, analyzer: Analyzer::new(), config }
    }

    pub fn store(&self) -> &DocumentStore { &self.store }

    pub fn config(&self) -> &SearchConfig { &self.config }

    /// Documents containing at least one query term, best first.
    pub fn search(&self, query: &str, doc_type: Option<DocType>, filters: Option<&Filters>, limit: usize) -> SearchResponse {
        if query.trim().is_empty() {
            return SearchResponse::empty(query);
        }
        let terms = self.analyzer.query_terms(query);
        if terms.is_empty() {
            return SearchResponse::empty(query);
        }

        let results = match self.rank(&terms, doc_type, filters, limit) {
            Ok(results) => results,
            Err(err) => {
                tracing::error!(query, error = %format!("{err:#}"), "search failed");
                return SearchResponse::empty(query);
            }
        };
        if let Err(err) = self.store.record_search(query, results.len()) {
            tracing::warn!(query, error = %format!("{err:#}"), "failed to record search statistics");
        }
        tracing::debug!(query, terms = terms.len(), hits = results.len(), "search complete");
        SearchResponse { query: query.to_string(), count: results.len(), results }
    }

    fn rank(&self, terms: &[String], doc_type: Option<DocType>, filters: Option<&Filters>, limit: usize) -> Result<Vec<SearchHit>> {
        let mut candidates: HashMap<DocId, Candidate> = HashMap::new();
        for term in terms {
            // a query term counts once per document even if it expanded to several index terms
            let mut seen = HashSet::new();
            for (doc_id, freq) in self.store.postings_for(term, self.config.term_match)? {
                let candidate = candidates.entry(doc_id).or_default();
                candidate.freq_sum += freq as u64;
                if seen.insert(doc_id) {
                    candidate.matched_terms += 1;
                }
            }
        }

        let mut scored: Vec<(DocId, f64)> = candidates.into_iter().map(|(id, c)| (id, c.score())).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

        let mut results = Vec::new();
        for (doc_id, score) in scored {
            if results.len() >= limit {
                break;
            }
            // postings can outlive their row for an instant while a document is re-indexed
            let Some(doc) = self.store.document(doc_id)? else { continue };
            if doc_type.is_some_and(|t| t != doc.doc_type) {
                continue;
            }
            if filters.is_some_and(|f| !metadata_matches(&doc.metadata, f)) {
                continue;
            }
            results.push(SearchHit {
                doc_id,
                doc_type: doc.doc_type,
                entity_id: doc.entity_id,
                title: doc.title,
                metadata: doc.metadata,
                relevance_score: score,
            });
        }
        Ok(results)
    }

    /// Distinct titles starting with `prefix`, case-insensitively, in
    /// alphabetical order.
    pub fn autocomplete(&self, prefix: &str, doc_type: Option<DocType>, limit: usize) -> AutocompleteResponse {
        let trimmed = prefix.trim();
        if trimmed.chars().count() < self.config.autocomplete_min_prefix {
            return AutocompleteResponse::empty(prefix);
        }
        match self.suggestions(trimmed, doc_type, limit) {
            Ok(suggestions) => AutocompleteResponse { prefix: prefix.to_string(), count: suggestions.len(), suggestions },
            Err(err) => {
                tracing::error!(prefix, error = %format!("{err:#}"), "autocomplete failed");
                AutocompleteResponse::empty(prefix)
            }
        }
    }

    fn suggestions(&self, prefix: &str, doc_type: Option<DocType>, limit: usize) -> Result<Vec<Suggestion>> {
        let mut seen_titles = HashSet::new();
        let mut suggestions = Vec::new();
        for doc_id in self.store.scan_titles(prefix) {
            if suggestions.len() >= limit {
                break;
            }
            let Some(doc) = self.store.document(doc_id?)? else { continue };
            if doc_type.is_some_and(|t| t != doc.doc_type) || !seen_titles.insert(doc.title.clone()) {
                continue;
            }
            suggestions.push(Suggestion { suggestion: doc.title, entity_id: doc.entity_id, doc_type: doc.doc_type, metadata: doc.metadata });
        }
        Ok(suggestions)
    }

    pub fn get_popular_searches(&self, limit: usize) -> Vec<PopularSearch> {
        self.store.popular_searches(limit).unwrap_or_else(|err| {
            tracing::error!(error = %format!("{err:#}"), "failed to load popular searches");
            Vec::new()
        })
    }

    pub fn get_index_stats(&self) -> IndexStats {
        self.store.get_index_stats().unwrap_or_else(|err| {
            tracing::error!(error = %format!("{err:#}"), "failed to compute index stats");
            IndexStats::default()
        })
    }
}

/// Every filter must equal the metadata value exactly. String values compare
/// by their text, other scalars by their JSON rendering.
pub fn metadata_matches(metadata: &Metadata, filters: &Filters) -> bool {
    filters.iter().all(|(key, expected)| match metadata.get(key) {
        Some(Value::String(s)) => s == expected,
        None | Some(Value::Null) => false,
        Some(other) => other.to_string() == *expected,
    })
}

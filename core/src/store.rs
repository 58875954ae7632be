//! Document store and inverted index on sled.
//!
//! Trees:
//! - `documents`: doc_id (u64 BE) -> JSON [`StoredDocument`]
//! - `doc_keys`: `{doc_type}\0{entity_id}` -> doc_id
//! - `postings`: `{term}\0{doc_id BE}` -> frequency (u32 BE)
//! - `doc_terms`: doc_id -> bincode [`IndexedTerms`], what to retract on re-index
//! - `titles`: `{lowercase title}\0{doc_id BE}` -> empty, for autocomplete
//! - `search_stats`: raw query -> bincode [`SearchStat`]
//!
//! Replacing a document touches the first five trees in one transaction, so
//! readers never see a document with a mix of old and new postings.

use crate::config::{SearchConfig, TermMatch};
use crate::tokenizer::Analyzer;
use crate::{now_rfc3339, DocId, DocType, Document, IndexStats, PopularSearch, StoredDocument};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError, TransactionalTree};
use sled::{Batch, Db, Transactional, Tree};
use std::collections::BTreeMap;

const DOCUMENTS: &str = "documents";
const DOC_KEYS: &str = "doc_keys";
const POSTINGS: &str = "postings";
const DOC_TERMS: &str = "doc_terms";
const TITLES: &str = "titles";
const SEARCH_STATS: &str = "search_stats";

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexedTerms {
    title_key: Vec<u8>,
    terms: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SearchStat {
    search_count: u64,
    result_count: u64,
    last_searched_ms: i64,
}

#[derive(Clone)]
pub struct DocumentStore {
    db: Db,
    documents: Tree,
    doc_keys: Tree,
    postings: Tree,
    doc_terms: Tree,
    titles: Tree,
    stats: Tree,
    analyzer: Analyzer,
}

impl DocumentStore {
    pub fn open(config: &SearchConfig) -> Result<Self> {
        let db = sled::open(&config.db_path).with_context(|| format!("opening index at {}", config.db_path.display()))?;
        Self::from_db(db)
    }

    /// A store backed by a throwaway database, removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open().context("opening temporary index")?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self> {
        Ok(Self {
            documents: db.open_tree(DOCUMENTS)?,
            doc_keys: db.open_tree(DOC_KEYS)?,
            postings: db.open_tree(POSTINGS)?,
            doc_terms: db.open_tree(DOC_TERMS)?,
            titles: db.open_tree(TITLES)?,
            stats: db.open_tree(SEARCH_STATS)?,
            analyzer: Analyzer::new(),
            db,
        })
    }

    /// Insert or replace a document keyed by `(doc_type, entity_id)`.
    /// Returns the persistent id, or `None` when nothing could be written.
    pub fn add_document(&self, doc: &Document) -> Option<DocId> {
        match self.try_add_document(doc) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::error!(doc_type = %doc.doc_type, entity_id = %doc.entity_id, error = %format!("{err:#}"), "failed to index document");
                None
            }
        }
    }

    pub fn try_add_document(&self, doc: &Document) -> Result<DocId> {
        let freqs = self.analyzer.term_frequencies(&doc.content);
        let key = doc_key(doc.doc_type, &doc.entity_id);
        let fresh_id = self.db.generate_id()?;
        let indexed_at = now_rfc3339();

        let trees = (&self.documents, &self.doc_keys, &self.postings, &self.doc_terms, &self.titles);
        let doc_id = trees
            .transaction(|(documents, doc_keys, postings, doc_terms, titles)| -> ConflictableTransactionResult<DocId, anyhow::Error> {
                let doc_id = match doc_keys.get(&key)? {
                    Some(raw) => decode_id(&raw).map_err(ConflictableTransactionError::Abort)?,
                    None => fresh_id,
                };
                let id = doc_id.to_be_bytes();
                retract(doc_id, postings, doc_terms, titles)?;

                let row = StoredDocument {
                    doc_id,
                    doc_type: doc.doc_type,
                    entity_id: doc.entity_id.clone(),
                    title: doc.title.clone(),
                    content: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                    indexed_at: indexed_at.clone(),
                };
                documents.insert(&id[..], serde_json::to_vec(&row).map_err(abort)?)?;
                doc_keys.insert(key.as_slice(), &id[..])?;

                let mut batch = Batch::default();
                for (term, freq) in &freqs {
                    batch.insert(posting_key(term, doc_id), freq.to_be_bytes().to_vec());
                }
                postings.apply_batch(&batch)?;

                let title_key = title_key(&doc.title, doc_id);
                titles.insert(title_key.as_slice(), Vec::<u8>::new())?;
                let entry = IndexedTerms { title_key, terms: freqs.keys().cloned().collect() };
                doc_terms.insert(&id[..], bincode::serialize(&entry).map_err(abort)?)?;
                Ok(doc_id)
            })
            .map_err(tx_error)?;

        tracing::debug!(doc_id, doc_type = %doc.doc_type, entity_id = %doc.entity_id, terms = freqs.len(), "indexed document");
        Ok(doc_id)
    }

    /// Index every document; a failed document does not stop the rest.
    /// Returns how many were indexed.
    pub fn add_documents_batch(&self, docs: &[Document]) -> usize {
        docs.iter().filter(|doc| self.add_document(doc).is_some()).count()
    }

    /// Remove a document and its postings. Returns whether it existed.
    pub fn delete_document(&self, doc_type: DocType, entity_id: &str) -> bool {
        match self.remove_by_key(&doc_key(doc_type, entity_id)) {
            Ok(existed) => existed,
            Err(err) => {
                tracing::error!(%doc_type, entity_id, error = %format!("{err:#}"), "failed to delete document");
                false
            }
        }
    }

    /// Remove every document of `doc_type`, or the whole index including
    /// search statistics when no type is given.
    pub fn clear_index(&self, doc_type: Option<DocType>) -> bool {
        let result = match doc_type {
            Some(doc_type) => self.clear_type(doc_type).map(|removed| {
                tracing::info!(%doc_type, removed, "cleared documents");
            }),
            None => self.clear_all().map(|()| tracing::info!("cleared entire index")),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(doc_type = ?doc_type, error = %format!("{err:#}"), "failed to clear index");
                false
            }
        }
    }

    pub fn get_index_stats(&self) -> Result<IndexStats> {
        let mut documents_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for item in self.doc_keys.iter() {
            let (key, _) = item?;
            let doc_type = key.split(|b| *b == 0).next().unwrap_or_default();
            *documents_by_type.entry(String::from_utf8_lossy(doc_type).into_owned()).or_insert(0) += 1;
        }

        let mut total_terms = 0;
        let mut total_index_entries = 0;
        let mut last_term: Option<Vec<u8>> = None;
        for item in self.postings.iter() {
            let (key, _) = item?;
            total_index_entries += 1;
            let (term, _) = split_posting_key(&key).ok_or_else(|| anyhow!("corrupt posting key"))?;
            if last_term.as_deref() != Some(term) {
                total_terms += 1;
                last_term = Some(term.to_vec());
            }
        }

        Ok(IndexStats { total_documents: self.documents.len(), total_terms, total_index_entries, documents_by_type })
    }

    pub fn get_document(&self, doc_type: DocType, entity_id: &str) -> Result<Option<StoredDocument>> {
        match self.doc_keys.get(doc_key(doc_type, entity_id))? {
            Some(raw) => self.document(decode_id(&raw)?),
            None => Ok(None),
        }
    }

    pub fn document(&self, doc_id: DocId) -> Result<Option<StoredDocument>> {
        match self.documents.get(doc_id.to_be_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw).context("decoding document row")?)),
            None => Ok(None),
        }
    }

    /// `(doc_id, frequency)` for every posting of `term`. In prefix mode this
    /// also covers every index term that starts with `term`.
    pub fn postings_for(&self, term: &str, mode: TermMatch) -> Result<Vec<(DocId, u32)>> {
        let mut prefix = term.as_bytes().to_vec();
        if mode == TermMatch::Exact {
            prefix.push(0);
        }
        let mut out = Vec::new();
        for item in self.postings.scan_prefix(prefix) {
            let (key, value) = item?;
            let (_, doc_id) = split_posting_key(&key).ok_or_else(|| anyhow!("corrupt posting key"))?;
            let freq = <[u8; 4]>::try_from(&value[..]).map_err(|_| anyhow!("corrupt posting frequency"))?;
            out.push((doc_id, u32::from_be_bytes(freq)));
        }
        Ok(out)
    }

    /// Document ids whose lowercased title starts with `prefix` lowercased,
    /// in title order.
    pub fn scan_titles(&self, prefix: &str) -> impl Iterator<Item = Result<DocId>> + '_ {
        self.titles.scan_prefix(prefix.to_lowercase().into_bytes()).map(|item| {
            let (key, _) = item?;
            if key.len() < 9 {
                return Err(anyhow!("corrupt title key"));
            }
            decode_id(&key[key.len() - 8..])
        })
    }

    /// Count one execution of `query` that returned `result_count` results.
    pub fn record_search(&self, query: &str, result_count: usize) -> Result<()> {
        let now_ms = (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        self.stats.update_and_fetch(query.as_bytes(), |old| {
            let mut stat: SearchStat = old.and_then(|raw| bincode::deserialize(raw).ok()).unwrap_or_default();
            stat.search_count += 1;
            stat.result_count = result_count as u64;
            stat.last_searched_ms = now_ms;
            bincode::serialize(&stat).ok()
        })?;
        Ok(())
    }

    /// Queries by how often they were searched, most recent first on ties.
    pub fn popular_searches(&self, limit: usize) -> Result<Vec<PopularSearch>> {
        let mut stats = Vec::new();
        for item in self.stats.iter() {
            let (key, value) = item?;
            let stat: SearchStat = bincode::deserialize(&value).context("decoding search statistic")?;
            stats.push((String::from_utf8_lossy(&key).into_owned(), stat));
        }
        stats.sort_by(|a, b| {
            b.1.search_count.cmp(&a.1.search_count).then(b.1.last_searched_ms.cmp(&a.1.last_searched_ms))
        });
        Ok(stats
            .into_iter()
            .take(limit)
            .map(|(query, stat)| PopularSearch {
                query,
                search_count: stat.search_count,
                result_count: stat.result_count,
                last_searched_at: format_millis(stat.last_searched_ms),
            })
            .collect())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn clear_type(&self, doc_type: DocType) -> Result<usize> {
        let mut prefix = doc_type.as_str().as_bytes().to_vec();
        prefix.push(0);
        let keys: Vec<_> = self.doc_keys.scan_prefix(prefix).keys().collect::<sled::Result<_>>()?;
        let mut removed = 0;
        for key in keys {
            if self.remove_by_key(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn clear_all(&self) -> Result<()> {
        for tree in [&self.documents, &self.doc_keys, &self.postings, &self.doc_terms, &self.titles, &self.stats] {
            tree.clear()?;
        }
        self.db.flush()?;
        Ok(())
    }

    fn remove_by_key(&self, key: &[u8]) -> Result<bool> {
        let trees = (&self.documents, &self.doc_keys, &self.postings, &self.doc_terms, &self.titles);
        trees
            .transaction(|(documents, doc_keys, postings, doc_terms, titles)| -> ConflictableTransactionResult<bool, anyhow::Error> {
                let Some(raw) = doc_keys.remove(key)? else { return Ok(false) };
                let doc_id = decode_id(&raw).map_err(ConflictableTransactionError::Abort)?;
                documents.remove(&doc_id.to_be_bytes()[..])?;
                retract(doc_id, postings, doc_terms, titles)?;
                Ok(true)
            })
            .map_err(tx_error)
    }
}

/// Delete a document's postings and title entry inside a transaction.
fn retract(doc_id: DocId, postings: &TransactionalTree, doc_terms: &TransactionalTree, titles: &TransactionalTree) -> ConflictableTransactionResult<(), anyhow::Error> {
    if let Some(raw) = doc_terms.remove(&doc_id.to_be_bytes()[..])? {
        let entry: IndexedTerms = bincode::deserialize(&raw).map_err(abort)?;
        let mut batch = Batch::default();
        for term in &entry.terms {
            batch.remove(posting_key(term, doc_id));
        }
        postings.apply_batch(&batch)?;
        titles.remove(entry.title_key.as_slice())?;
    }
    Ok(())
}

fn doc_key(doc_type: DocType, entity_id: &str) -> Vec<u8> {
    format!("{}\0{}", doc_type, entity_id).into_bytes()
}

fn posting_key(term: &str, doc_id: DocId) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 9);
    key.extend_from_slice(term.as_bytes());
    key.push(0);
    key.extend_from_slice(&doc_id.to_be_bytes());
    key
}

fn split_posting_key(key: &[u8]) -> Option<(&[u8], DocId)> {
    if key.len() < 9 || key[key.len() - 9] != 0 {
        return None;
    }
    let (term, rest) = key.split_at(key.len() - 9);
    let id: [u8; 8] = rest[1..].try_into().ok()?;
    Some((term, u64::from_be_bytes(id)))
}

fn title_key(title: &str, doc_id: DocId) -> Vec<u8> {
    let mut key = title.to_lowercase().into_bytes();
    key.push(0);
    key.extend_from_slice(&doc_id.to_be_bytes());
    key
}

fn decode_id(raw: &[u8]) -> Result<DocId> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| anyhow!("corrupt document id"))?;
    Ok(u64::from_be_bytes(bytes))
}

fn format_millis(ms: i64) -> String {
    time::OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok())
        .unwrap_or_default()
}

fn abort<E: Into<anyhow::Error>>(err: E) -> ConflictableTransactionError<anyhow::Error> {
    ConflictableTransactionError::Abort(err.into())
}

fn tx_error(err: TransactionError<anyhow::Error>) -> anyhow::Error {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => anyhow::Error::new(err).context("index transaction failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posting_keys_split_back() {
        let key = posting_key("mahom", 42);
        let (term, id) = split_posting_key(&key).unwrap();
        assert_eq!(term, b"mahom");
        assert_eq!(id, 42);
        assert!(split_posting_key(b"short").is_none());
    }

    #[test]
    fn exact_postings_do_not_leak_into_longer_terms() {
        let store = DocumentStore::temporary().unwrap();
        store.add_document(&Document::new(DocType::Player, "1", "Pat", "pat")).unwrap();
        store.add_document(&Document::new(DocType::Player, "2", "Patrick", "patrick")).unwrap();
        assert_eq!(store.postings_for("pat", TermMatch::Exact).unwrap().len(), 1);
        assert_eq!(store.postings_for("pat", TermMatch::Prefix).unwrap().len(), 2);
    }

    #[test]
    fn stats_count_and_overwrite() {
        let store = DocumentStore::temporary().unwrap();
        store.record_search("mahomes", 3).unwrap();
        store.record_search("mahomes", 1).unwrap();
        let popular = store.popular_searches(10).unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].search_count, 2);
        assert_eq!(popular[0].result_count, 1);
        assert!(!popular[0].last_searched_at.is_empty());
    }
}

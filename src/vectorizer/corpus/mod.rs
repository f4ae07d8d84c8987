use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::vectorizer::token::TokenFrequency;

/// source of corpus identities
static NEXT_CORPUS_ID: AtomicU64 = AtomicU64::new(1);

/// random per process, so identities from another run never match
static PROCESS_NONCE: OnceLock<u64> = OnceLock::new();

fn process_nonce() -> u64 {
    *PROCESS_NONCE.get_or_init(rand::random::<u64>)
}

/// Identity of one corpus state.
///
/// `process` is drawn at random once per process, `corpus` is unique per
/// `Corpus` instance within it (clones get a new one) and `generation` is
/// bumped on every membership change. Statistics record the snapshot they
/// were computed from and are rejected against any other.
///
/// Snapshots are not serializable; stored statistics go through
/// [`crate::ModelData`], which re-attaches them by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId {
    pub process: u64,
    pub corpus: u64,
    pub generation: u64,
}

impl SnapshotId {
    /// Fail with `StaleStatistics` unless `self` is `expected`
    pub fn ensure(self, expected: SnapshotId) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(Error::StaleStatistics {
                expected,
                found: self,
            })
        }
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}/corpus#{}@gen{}", self.process as u32, self.corpus, self.generation)
    }
}

/// One article's filtered token sequence, tagged with a stable key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// string or integer in JSON input
    #[serde(alias = "id", deserialize_with = "key_from_string_or_number")]
    pub key: String,
    pub tokens: Vec<String>,
}

impl Document {
    pub fn new<K, T>(key: K, tokens: &[T]) -> Self
    where
        K: Into<String>,
        T: AsRef<str>,
    {
        Document {
            key: key.into(),
            tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }

    pub fn token_frequency(&self) -> TokenFrequency {
        TokenFrequency::from_tokens(&self.tokens)
    }
}

fn key_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Key::deserialize(deserializer)? {
        Key::Text(key) => key,
        Key::Unsigned(n) => n.to_string(),
        Key::Signed(n) => n.to_string(),
    })
}

/// Ordered collection of documents plus document-frequency counts.
///
/// Documents keep their insertion order, and removal preserves the order of
/// the rest. Each document is reduced to its [`TokenFrequency`] on insertion.
#[derive(Debug)]
pub struct Corpus {
    id: u64,
    /// insert count, for update notify
    add_num: u64,
    /// remove count, for update notify
    sub_num: u64,
    documents: IndexMap<String, TokenFrequency>,
    /// number of documents containing each term
    term_counts: IndexMap<Box<str>, u64>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Corpus {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_CORPUS_ID.fetch_add(1, Ordering::Relaxed),
            add_num: self.add_num,
            sub_num: self.sub_num,
            documents: self.documents.clone(),
            term_counts: self.term_counts.clone(),
        }
    }
}

impl Corpus {
    /// Create an empty corpus
    pub fn new() -> Self {
        Self {
            id: NEXT_CORPUS_ID.fetch_add(1, Ordering::Relaxed),
            add_num: 0,
            sub_num: 0,
            documents: IndexMap::new(),
            term_counts: IndexMap::new(),
        }
    }

    /// Build a corpus from keyed documents, in order
    pub fn from_documents<I>(documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut corpus = Self::new();
        for doc in documents {
            corpus.add_document(doc)?;
        }
        Ok(corpus)
    }

    /// Build a corpus from bare token lists.
    /// Documents are keyed `doc0`, `doc1`, ... by position.
    pub fn from_token_lists<I, D, T>(lists: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[T]>,
        T: AsRef<str>,
    {
        let mut corpus = Self::new();
        for (i, tokens) in lists.into_iter().enumerate() {
            let freq = TokenFrequency::from_tokens(tokens.as_ref());
            corpus.insert_freq(format!("doc{}", i), freq);
        }
        corpus
    }

    /// Add a document; its key must not already be present
    pub fn add_document(&mut self, doc: Document) -> Result<()> {
        let freq = doc.token_frequency();
        self.add_freq(doc.key, freq)
    }

    /// Add already-counted tokens under `key`
    pub fn add_freq(&mut self, key: impl Into<String>, freq: TokenFrequency) -> Result<()> {
        let key = key.into();
        if self.documents.contains_key(&key) {
            return Err(Error::DuplicateDocument { key });
        }
        self.insert_freq(key, freq);
        Ok(())
    }

    fn insert_freq(&mut self, key: String, freq: TokenFrequency) {
        if freq.is_empty() {
            warn!("document {:?} has no tokens", key);
        } else {
            debug!("adding document {:?}: {} tokens, {} distinct", key, freq.token_sum(), freq.token_num());
        }
        self.add_num += 1;
        for term in freq.token_set_ref_str() {
            *self.term_counts.entry(term.into()).or_insert(0) += 1;
        }
        self.documents.insert(key, freq);
    }

    /// Remove a document, returning its token counts
    pub fn remove_document(&mut self, key: &str) -> Result<TokenFrequency> {
        let freq = self
            .documents
            .shift_remove(key)
            .ok_or_else(|| Error::UnknownDocument { key: key.to_string() })?;
        self.sub_num += 1;
        for term in freq.token_set_ref_str() {
            if let Some(count) = self.term_counts.get_mut(term) {
                if *count > 1 {
                    *count -= 1;
                } else {
                    self.term_counts.shift_remove(term);
                }
            }
        }
        debug!("removed document {:?}, {} left", key, self.documents.len());
        Ok(freq)
    }

    /// Get the number of documents in the corpus
    #[inline]
    pub fn doc_num(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Generation number, bumped by every add and remove
    #[inline]
    pub fn gen_num(&self) -> u64 {
        self.add_num + self.sub_num
    }

    /// Identity of the current corpus state
    #[inline]
    pub fn snapshot(&self) -> SnapshotId {
        SnapshotId {
            process: process_nonce(),
            corpus: self.id,
            generation: self.gen_num(),
        }
    }

    /// Number of documents containing `term` at least once
    #[inline]
    pub fn document_frequency(&self, term: &str) -> u64 {
        self.term_counts.get(term).copied().unwrap_or(0)
    }

    /// Get the current vocabulary size (number of unique terms)
    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.term_counts.len()
    }

    pub fn get(&self, key: &str) -> Option<&TokenFrequency> {
        self.documents.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.documents.contains_key(key)
    }

    /// Document keys in corpus order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(|k| k.as_str())
    }

    /// (key, counts) in corpus order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenFrequency)> {
        self.documents.iter().map(|(k, f)| (k.as_str(), f))
    }

    /// (key, counts) by position, for parallel iteration
    pub fn get_index(&self, index: usize) -> Option<(&str, &TokenFrequency)> {
        self.documents.get_index(index).map(|(k, f)| (k.as_str(), f))
    }

    /// Distinct terms in first-occurrence order over the documents
    fn terms(&self) -> impl Iterator<Item = &str> {
        self.term_counts.keys().map(|t| t.as_ref())
    }
}

/// The fixed, ordered set of distinct terms of one corpus snapshot.
///
/// Position `i` of every document vector and of the IDF table refers to
/// `term(i)`. Order is the first occurrence of each term when walking the
/// documents in corpus order, so it is reproducible for the same corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    terms: IndexSet<Box<str>>,
    snapshot: SnapshotId,
}

impl Vocabulary {
    /// Collect the distinct terms of `corpus`
    pub fn build(corpus: &Corpus) -> Self {
        let mut terms: IndexSet<Box<str>> = IndexSet::with_capacity(corpus.vocab_size());
        for (_, freq) in corpus.iter() {
            for term in freq.token_set_ref_str() {
                if !terms.contains(term) {
                    terms.insert(term.into());
                }
            }
        }
        debug_assert!(corpus.terms().all(|t| terms.contains(t)));
        debug!("vocabulary of {} terms for {}", terms.len(), corpus.snapshot());
        Vocabulary {
            terms,
            snapshot: corpus.snapshot(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Vector position of `term`
    #[inline]
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.terms.get_index_of(term)
    }

    #[inline]
    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get_index(index).map(|t| t.as_ref())
    }

    #[inline]
    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    /// Terms in vector order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.as_ref())
    }

    #[inline]
    pub fn snapshot(&self) -> SnapshotId {
        self.snapshot
    }

    /// Fail unless this vocabulary was built from the current state of `corpus`
    pub fn ensure_fresh(&self, corpus: &Corpus) -> Result<()> {
        self.snapshot.ensure(corpus.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Corpus {
        Corpus::from_token_lists(vec![vec!["a", "b"], vec!["a"], vec!["b", "b", "c"]])
    }

    #[test]
    fn document_frequency_counts_documents_not_tokens() {
        let corpus = sample();
        assert_eq!(corpus.doc_num(), 3);
        assert_eq!(corpus.document_frequency("a"), 2);
        assert_eq!(corpus.document_frequency("b"), 2);
        assert_eq!(corpus.document_frequency("c"), 1);
        assert_eq!(corpus.document_frequency("z"), 0);
        assert_eq!(corpus.keys().collect::<Vec<_>>(), vec!["doc0", "doc1", "doc2"]);
    }

    #[test]
    fn vocabulary_is_first_occurrence_ordered() {
        let corpus = sample();
        let vocab = Vocabulary::build(&corpus);
        assert_eq!(vocab.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(vocab.index_of("c"), Some(2));
        assert_eq!(vocab.term(1), Some("b"));
        assert!(vocab.ensure_fresh(&corpus).is_ok());
        assert_eq!(Vocabulary::build(&corpus).iter().collect::<Vec<_>>(), vocab.iter().collect::<Vec<_>>());
    }

    #[test]
    fn mutation_invalidates_snapshot() {
        let mut corpus = sample();
        let vocab = Vocabulary::build(&corpus);
        let before = corpus.snapshot();

        corpus.add_document(Document::new("extra", &["d"])).unwrap();
        assert_ne!(corpus.snapshot(), before);
        assert!(matches!(
            vocab.ensure_fresh(&corpus),
            Err(Error::StaleStatistics { .. })
        ));

        corpus.remove_document("extra").unwrap();
        assert_eq!(corpus.document_frequency("d"), 0);
        // generation keeps counting, so the old vocabulary stays stale
        assert!(vocab.ensure_fresh(&corpus).is_err());
    }

    #[test]
    fn clones_do_not_share_identity() {
        let corpus = sample();
        let vocab = Vocabulary::build(&corpus);
        let copy = corpus.clone();
        assert_ne!(copy.snapshot(), corpus.snapshot());
        assert!(vocab.ensure_fresh(&copy).is_err());
    }

    #[test]
    fn snapshot_from_another_process_is_stale() {
        let corpus = sample();
        let here = corpus.snapshot();
        let elsewhere = SnapshotId {
            process: here.process.wrapping_add(1),
            ..here
        };
        assert!(matches!(
            elsewhere.ensure(here),
            Err(Error::StaleStatistics { .. })
        ));
        assert_eq!(Corpus::new().snapshot().process, here.process);
    }

    #[test]
    fn json_ids_may_be_numbers() {
        let docs: Vec<Document> = serde_json::from_str(
            r#"[
                { "id": 17, "tokens": ["rust"] },
                { "id": -3, "tokens": [] },
                { "key": "b", "tokens": ["go"] }
            ]"#,
        )
        .unwrap();
        let keys: Vec<&str> = docs.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["17", "-3", "b"]);

        let corpus = Corpus::from_documents(docs).unwrap();
        assert!(corpus.contains("17"));
        assert!(serde_json::from_str::<Document>(r#"{ "id": [1], "tokens": [] }"#).is_err());
    }

    #[test]
    fn duplicate_and_unknown_keys_are_rejected() {
        let mut corpus = Corpus::new();
        corpus.add_document(Document::new("x", &["a"])).unwrap();
        assert!(matches!(
            corpus.add_document(Document::new("x", &["b"])),
            Err(Error::DuplicateDocument { .. })
        ));
        assert!(matches!(
            corpus.remove_document("y"),
            Err(Error::UnknownDocument { .. })
        ));
    }
}

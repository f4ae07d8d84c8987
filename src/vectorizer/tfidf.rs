use indexmap::IndexMap;
use log::debug;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::vectorizer::corpus::{Corpus, SnapshotId, Vocabulary};
use crate::vectorizer::token::TokenFrequency;

/// TF-IDF weighting strategy.
///
/// Associated functions only; the engine is selected by type parameter
/// (`Vectorizer<E>`, `CorpusAssembly<E>`), never instantiated.
pub trait TFIDFEngine {
    /// Term frequency weight of a term seen `count` times in a document
    /// whose most frequent term is seen `max_freq` times
    fn tf(count: u32, max_freq: u32) -> f64;

    /// Inverse document frequency of a term found in `doc_freq` of `doc_num` documents
    fn idf(doc_num: u64, doc_freq: u64) -> f64;

    /// TF row of a document over `vocab`, in vocabulary order
    ///
    /// # Arguments
    /// * `freq` - token counts of the document
    /// * `vocab` - vocabulary giving the dimension order
    fn tf_vec(freq: &TokenFrequency, vocab: &Vocabulary) -> Vec<f64> {
        let max_freq = freq.max_frequency();
        vocab
            .iter()
            .map(|term| Self::tf(freq.raw_frequency(term), max_freq))
            .collect()
    }

    /// IDF row of `vocab` against `corpus`, in vocabulary order
    fn idf_vec(corpus: &Corpus, vocab: &Vocabulary) -> Vec<f64> {
        let doc_num = corpus.doc_num() as u64;
        vocab
            .iter()
            .map(|term| Self::idf(doc_num, corpus.document_frequency(term)))
            .collect()
    }
}

/// デフォルトのTF-IDFエンジン
///
/// - TF: augmented frequency `0.5 + 0.5 * f / max_f`
/// - IDF: `log10(N / (1 + df))`, negative for terms present in every document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultTFIDFEngine;

impl TFIDFEngine for DefaultTFIDFEngine {
    #[inline]
    fn tf(count: u32, max_freq: u32) -> f64 {
        TokenFrequency::augmented_tf_calc(count, max_freq)
    }

    #[inline]
    fn idf(doc_num: u64, doc_freq: u64) -> f64 {
        (doc_num as f64 / (1.0 + doc_freq as f64)).log10()
    }
}

/// Count of exact occurrences of `term` in a token sequence
pub fn raw_frequency<T>(term: &str, document: &[T]) -> u32
where
    T: AsRef<str>,
{
    document.iter().filter(|t| t.as_ref() == term).count() as u32
}

/// Highest raw frequency of any term in `document`; 1 for an empty document
pub fn max_frequency<T>(document: &[T]) -> u32
where
    T: AsRef<str>,
{
    TokenFrequency::from_tokens(document).max_frequency()
}

/// `0.5 + 0.5 * raw_frequency(term, document) / max_freq`
pub fn augmented_term_frequency<T>(term: &str, document: &[T], max_freq: u32) -> f64
where
    T: AsRef<str>,
{
    TokenFrequency::augmented_tf_calc(raw_frequency(term, document), max_freq)
}

/// `log10(N / (1 + df(term)))` over `corpus`.
/// Fails for an empty corpus, where the value would be `-inf`.
pub fn inverse_document_frequency(term: &str, corpus: &Corpus) -> Result<f64> {
    if corpus.is_empty() {
        return Err(Error::invalid_parameter("corpus", "IDF of an empty corpus is undefined"));
    }
    Ok(DefaultTFIDFEngine::idf(
        corpus.doc_num() as u64,
        corpus.document_frequency(term),
    ))
}

/// Augmented TF of `term` in `document` times its IDF in `corpus`
pub fn tf_idf<T>(term: &str, document: &[T], corpus: &Corpus) -> Result<f64>
where
    T: AsRef<str>,
{
    let max_freq = max_frequency(document);
    Ok(augmented_term_frequency(term, document, max_freq) * inverse_document_frequency(term, corpus)?)
}

/// IDF value of every vocabulary term, for one corpus snapshot.
///
/// This is the memo of IDF values: it is keyed on the snapshot it was built
/// from, and every consumer checks that snapshot before reading it.
/// Storage goes through [`crate::ModelData`] instead of serializing the table.
#[derive(Debug, Clone, PartialEq)]
pub struct IdfTable {
    /// IDF Vector, dense and in vocabulary order
    values: Vec<f64>,
    /// document count
    doc_num: u64,
    snapshot: SnapshotId,
}

impl IdfTable {
    /// Compute IDF values for `vocab` from `corpus`
    pub fn compute<E: TFIDFEngine>(corpus: &Corpus, vocab: &Vocabulary) -> Result<Self> {
        vocab.ensure_fresh(corpus)?;
        let values = E::idf_vec(corpus, vocab);
        debug!("computed {} IDF values over {} documents", values.len(), corpus.doc_num());
        Ok(Self {
            values,
            doc_num: corpus.doc_num() as u64,
            snapshot: corpus.snapshot(),
        })
    }

    /// Rebuild a table loaded from storage.
    /// `snapshot` must be the corpus snapshot the values were computed for.
    pub(crate) fn from_parts(values: Vec<f64>, doc_num: u64, snapshot: SnapshotId) -> Self {
        Self {
            values,
            doc_num,
            snapshot,
        }
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// IDF of `term`, if it is part of `vocab`
    pub fn lookup(&self, vocab: &Vocabulary, term: &str) -> Option<f64> {
        vocab.index_of(term).and_then(|i| self.get(i))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn doc_num(&self) -> u64 {
        self.doc_num
    }

    #[inline]
    pub fn snapshot(&self) -> SnapshotId {
        self.snapshot
    }

    /// Fail unless this table belongs to `vocab`'s snapshot and has its length
    pub fn ensure_matches(&self, vocab: &Vocabulary) -> Result<()> {
        self.snapshot.ensure(vocab.snapshot())?;
        if self.values.len() != vocab.len() {
            return Err(Error::DimensionMismatch {
                expected: vocab.len(),
                found: self.values.len(),
            });
        }
        Ok(())
    }
}

/// Augmented TF row of every document, keyed by document key.
#[derive(Debug, Clone, PartialEq)]
pub struct TfTable {
    rows: IndexMap<String, Vec<f64>>,
    snapshot: SnapshotId,
}

impl TfTable {
    /// Compute the TF row of every document of `corpus`
    pub fn compute<E: TFIDFEngine>(corpus: &Corpus, vocab: &Vocabulary) -> Result<Self> {
        vocab.ensure_fresh(corpus)?;
        let rows = corpus
            .iter()
            .map(|(key, freq)| (key.to_string(), E::tf_vec(freq, vocab)))
            .collect();
        Ok(Self {
            rows,
            snapshot: corpus.snapshot(),
        })
    }

    /// Same as [`TfTable::compute`], one rayon task per document
    pub fn par_compute<E: TFIDFEngine>(corpus: &Corpus, vocab: &Vocabulary) -> Result<Self> {
        vocab.ensure_fresh(corpus)?;
        let rows: Vec<(String, Vec<f64>)> = (0..corpus.doc_num())
            .into_par_iter()
            .filter_map(|i| corpus.get_index(i))
            .map(|(key, freq)| (key.to_string(), E::tf_vec(freq, vocab)))
            .collect();
        debug!("computed TF rows for {} documents", rows.len());
        Ok(Self {
            rows: rows.into_iter().collect(),
            snapshot: corpus.snapshot(),
        })
    }

    /// Rebuild a table loaded from storage
    pub(crate) fn from_parts<I>(rows: I, snapshot: SnapshotId) -> Self
    where
        I: IntoIterator<Item = (String, Vec<f64>)>,
    {
        Self {
            rows: rows.into_iter().collect(),
            snapshot,
        }
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.rows.get(key).map(|row| row.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.rows.iter().map(|(k, row)| (k.as_str(), row.as_slice()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn snapshot(&self) -> SnapshotId {
        self.snapshot
    }

    /// Fail unless this table covers every document of `corpus` with rows of `vocab`'s length
    pub fn ensure_matches(&self, corpus: &Corpus, vocab: &Vocabulary) -> Result<()> {
        self.snapshot.ensure(corpus.snapshot())?;
        self.snapshot.ensure(vocab.snapshot())?;
        for key in corpus.keys() {
            let row = self
                .rows
                .get(key)
                .ok_or_else(|| Error::UnknownDocument { key: key.to_string() })?;
            if row.len() != vocab.len() {
                return Err(Error::DimensionMismatch {
                    expected: vocab.len(),
                    found: row.len(),
                });
            }
        }
        Ok(())
    }
}

pub mod assembly;
pub mod corpus;
pub mod evaluate;
pub mod serde;
pub mod tfidf;
pub mod token;

use std::marker::PhantomData;

use ::serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::math::vector::normalize_in_place;
use crate::vectorizer::corpus::{Corpus, Document, Vocabulary};
use crate::vectorizer::tfidf::{DefaultTFIDFEngine, IdfTable, TFIDFEngine};
use crate::vectorizer::token::TokenFrequency;

/// What to do with a TF-IDF vector whose norm is zero.
///
/// This happens when every vocabulary term has an IDF of exactly 0, e.g. a
/// corpus of two documents with no shared term (`log10(2 / 2) == 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroNormPolicy {
    /// Fail with `Error::DegenerateVector`
    #[default]
    Error,
    /// Emit the all-zero vector unnormalized
    ZeroVector,
}

/// Maps documents to L2-normalized TF-IDF vectors over a fixed vocabulary.
///
/// `E` selects the weighting; the default is augmented TF with
/// `log10(N / (1 + df))` IDF.
#[derive(Debug, Clone, Copy)]
pub struct Vectorizer<E = DefaultTFIDFEngine> {
    zero_norm: ZeroNormPolicy,
    _marker: PhantomData<E>,
}

impl<E> Default for Vectorizer<E>
where
    E: TFIDFEngine,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Vectorizer<E>
where
    E: TFIDFEngine,
{
    pub fn new() -> Self {
        Self::with_zero_norm(ZeroNormPolicy::default())
    }

    pub fn with_zero_norm(zero_norm: ZeroNormPolicy) -> Self {
        Self {
            zero_norm,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn zero_norm(&self) -> ZeroNormPolicy {
        self.zero_norm
    }

    /// Vectorize a token sequence against `corpus`.
    ///
    /// Computes a fresh IDF table; when vectorizing many documents against
    /// the same snapshot use [`Vectorizer::vectorize_freq`] with a shared table.
    pub fn vectorize<T>(&self, document: &[T], corpus: &Corpus, vocab: &Vocabulary) -> Result<Vec<f64>>
    where
        T: AsRef<str>,
    {
        let idf = IdfTable::compute::<E>(corpus, vocab)?;
        self.vectorize_freq("", &TokenFrequency::from_tokens(document), vocab, &idf)
    }

    /// Vectorize a keyed document with a precomputed IDF table
    pub fn vectorize_document(&self, doc: &Document, vocab: &Vocabulary, idf: &IdfTable) -> Result<Vec<f64>> {
        self.vectorize_freq(&doc.key, &doc.token_frequency(), vocab, idf)
    }

    /// Vectorize token counts with a precomputed IDF table.
    /// `key` only labels errors.
    pub fn vectorize_freq(
        &self,
        key: &str,
        freq: &TokenFrequency,
        vocab: &Vocabulary,
        idf: &IdfTable,
    ) -> Result<Vec<f64>> {
        idf.ensure_matches(vocab)?;
        let tf = E::tf_vec(freq, vocab);
        weigh(key, &tf, idf.values(), self.zero_norm)
    }
}

/// Multiply a TF row by the IDF row and normalize the product
pub(crate) fn weigh(key: &str, tf: &[f64], idf: &[f64], zero_norm: ZeroNormPolicy) -> Result<Vec<f64>> {
    if tf.len() != idf.len() {
        return Err(Error::DimensionMismatch {
            expected: idf.len(),
            found: tf.len(),
        });
    }
    let mut vec: Vec<f64> = tf.iter().zip(idf.iter()).map(|(t, i)| t * i).collect();
    let len = normalize_in_place(&mut vec);
    if len == 0.0 && zero_norm == ZeroNormPolicy::Error {
        return Err(Error::DegenerateVector { key: key.to_string() });
    }
    Ok(vec)
}

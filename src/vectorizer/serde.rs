use std::io::{Read, Write};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vectorizer::assembly::{CorpusModel, DocumentMatrix};
use crate::vectorizer::corpus::{Corpus, Vocabulary};
use crate::vectorizer::tfidf::{DefaultTFIDFEngine, IdfTable, TFIDFEngine, TfTable};
use crate::vectorizer::ZeroNormPolicy;

/// Storage form of a [`CorpusModel`].
///
/// Snapshot identities only live as long as the process, so they are not
/// stored. A loaded `ModelData` is attached to a corpus again with
/// [`ModelData::into_model`] (or its tables with [`ModelData::idf_table`] and
/// [`ModelData::tf_table`]), which checks that the corpus has the same
/// vocabulary, in the same order, and the same documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    /// Vocabulary in vector order
    pub terms: Vec<String>,
    /// document count the IDF values were computed over
    pub doc_num: u64,
    pub idf: Vec<f64>,
    pub tf: Vec<(String, Vec<f64>)>,
    pub vectors: Vec<(String, Vec<f64>)>,
    pub zero_norm: ZeroNormPolicy,
}

impl<E> From<&CorpusModel<E>> for ModelData {
    fn from(model: &CorpusModel<E>) -> Self {
        Self {
            terms: model.vocabulary.iter().map(str::to_string).collect(),
            doc_num: model.idf.doc_num(),
            idf: model.idf.values().to_vec(),
            tf: model
                .tf
                .iter()
                .map(|(k, row)| (k.to_string(), row.to_vec()))
                .collect(),
            vectors: model
                .matrix
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
            zero_norm: model.zero_norm,
        }
    }
}

impl ModelData {
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }

    pub fn write_cbor<W: Write>(&self, writer: W) -> Result<()> {
        Ok(serde_cbor::to_writer(writer, self)?)
    }

    pub fn read_cbor<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_cbor::from_reader(reader)?)
    }

    /// IDF table re-attached to `corpus`
    pub fn idf_table(&self, corpus: &Corpus, vocab: &Vocabulary) -> Result<IdfTable> {
        self.check_statistics(corpus, vocab)?;
        Ok(IdfTable::from_parts(self.idf.clone(), self.doc_num, corpus.snapshot()))
    }

    /// TF table re-attached to `corpus`
    pub fn tf_table(&self, corpus: &Corpus, vocab: &Vocabulary) -> Result<TfTable> {
        self.check_statistics(corpus, vocab)?;
        check_rows("TF", &self.tf, corpus, vocab.len())?;
        Ok(TfTable::from_parts(self.tf.iter().cloned(), corpus.snapshot()))
    }

    /// Rebuild the full model for `corpus` without recomputing anything
    pub fn into_model(self, corpus: &Corpus) -> Result<CorpusModel> {
        self.into_model_for::<DefaultTFIDFEngine>(corpus)
    }

    /// Same as [`ModelData::into_model`], for a model built with engine `E`
    pub fn into_model_for<E: TFIDFEngine>(self, corpus: &Corpus) -> Result<CorpusModel<E>> {
        let vocabulary = Vocabulary::build(corpus);
        let idf = self.idf_table(corpus, &vocabulary)?;
        let tf = self.tf_table(corpus, &vocabulary)?;
        check_rows("vector", &self.vectors, corpus, vocabulary.len())?;
        let matrix = DocumentMatrix::from_rows(vocabulary.len(), self.vectors);
        Ok(CorpusModel {
            vocabulary,
            idf,
            tf,
            matrix,
            zero_norm: self.zero_norm,
            _marker: PhantomData,
        })
    }

    fn check_statistics(&self, corpus: &Corpus, vocab: &Vocabulary) -> Result<()> {
        vocab.ensure_fresh(corpus)?;
        if self.doc_num != corpus.doc_num() as u64 {
            return Err(Error::IncompatibleModel {
                reason: format!(
                    "model covers {} documents, corpus has {}",
                    self.doc_num,
                    corpus.doc_num()
                ),
            });
        }
        if self.terms.len() != vocab.len() || !self.terms.iter().map(String::as_str).eq(vocab.iter()) {
            return Err(Error::IncompatibleModel {
                reason: "vocabulary differs from the corpus vocabulary".to_string(),
            });
        }
        if self.idf.len() != vocab.len() {
            return Err(Error::DimensionMismatch {
                expected: vocab.len(),
                found: self.idf.len(),
            });
        }
        Ok(())
    }
}

/// Rows must list exactly the corpus documents, in corpus order, at full length
fn check_rows(what: &str, rows: &[(String, Vec<f64>)], corpus: &Corpus, dim: usize) -> Result<()> {
    if !rows.iter().map(|(k, _)| k.as_str()).eq(corpus.keys()) {
        return Err(Error::IncompatibleModel {
            reason: format!("{} rows do not match the corpus documents", what),
        });
    }
    if let Some((_, row)) = rows.iter().find(|(_, row)| row.len() != dim) {
        return Err(Error::DimensionMismatch {
            expected: dim,
            found: row.len(),
        });
    }
    Ok(())
}

use std::marker::PhantomData;

use indexmap::IndexMap;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::VectorizerConfig;
use crate::error::{Error, Result};
use crate::vectorizer::corpus::{Corpus, SnapshotId, Vocabulary};
use crate::vectorizer::evaluate::scoring::{rank_by_similarity, Hits};
use crate::vectorizer::tfidf::{DefaultTFIDFEngine, IdfTable, TFIDFEngine, TfTable};
use crate::vectorizer::token::TokenFrequency;
use crate::vectorizer::{weigh, ZeroNormPolicy};

/// Normalized document vectors, one row per document, in corpus order.
///
/// Deserialized input is checked: row `i` must point at vector `i` and every
/// vector must have length `dim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct DocumentMatrix {
    #[serde(with = "indexmap::map::serde_seq")]
    rows: IndexMap<String, usize>,
    vectors: Vec<Vec<f64>>,
    dim: usize,
}

#[derive(Deserialize)]
struct RawMatrix {
    #[serde(with = "indexmap::map::serde_seq")]
    rows: IndexMap<String, usize>,
    vectors: Vec<Vec<f64>>,
    dim: usize,
}

impl TryFrom<RawMatrix> for DocumentMatrix {
    type Error = Error;

    fn try_from(raw: RawMatrix) -> Result<Self> {
        if raw.rows.len() != raw.vectors.len() {
            return Err(Error::IncompatibleModel {
                reason: format!("{} row keys for {} vectors", raw.rows.len(), raw.vectors.len()),
            });
        }
        for (i, (key, &row)) in raw.rows.iter().enumerate() {
            if row != i {
                return Err(Error::IncompatibleModel {
                    reason: format!("document {:?} points at row {}, expected {}", key, row, i),
                });
            }
        }
        if let Some(vec) = raw.vectors.iter().find(|v| v.len() != raw.dim) {
            return Err(Error::DimensionMismatch {
                expected: raw.dim,
                found: vec.len(),
            });
        }
        Ok(Self {
            rows: raw.rows,
            vectors: raw.vectors,
            dim: raw.dim,
        })
    }
}

impl DocumentMatrix {
    pub(crate) fn from_rows(dim: usize, rows: Vec<(String, Vec<f64>)>) -> Self {
        let mut index = IndexMap::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());
        for (i, (key, vec)) in rows.into_iter().enumerate() {
            debug_assert_eq!(vec.len(), dim);
            index.insert(key, i);
            vectors.push(vec);
        }
        Self {
            rows: index,
            vectors,
            dim,
        }
    }

    /// Number of documents
    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Vector length, equal to the vocabulary size
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// (documents, dimensions)
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.dim)
    }

    /// Rows in corpus order, ready for [`crate::KMeans::fit`]
    #[inline]
    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }

    /// Document keys in row order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|k| k.as_str())
    }

    #[inline]
    pub fn key(&self, row: usize) -> Option<&str> {
        self.rows.get_index(row).map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.rows
            .get(key)
            .and_then(|&i| self.vectors.get(i))
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.rows
            .keys()
            .zip(self.vectors.iter())
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Rank every document against `query_vec` by cosine similarity
    pub fn rank(&self, query_vec: &[f64]) -> Result<Hits<String>> {
        if query_vec.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: query_vec.len(),
            });
        }
        let hits = rank_by_similarity(query_vec, &self.vectors)?;
        Ok(hits.map_keys(|row| self.key(row).unwrap_or_default().to_string()))
    }
}

/// Everything computed for one corpus snapshot: the vocabulary, the IDF and
/// TF tables, and the normalized document vectors.
///
/// `E` is the engine the model was built with; queries are weighted with it
/// too. Stored through [`crate::ModelData`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusModel<E = DefaultTFIDFEngine> {
    pub vocabulary: Vocabulary,
    pub idf: IdfTable,
    pub tf: TfTable,
    pub matrix: DocumentMatrix,
    pub zero_norm: ZeroNormPolicy,
    pub(crate) _marker: PhantomData<E>,
}

impl<E> CorpusModel<E>
where
    E: TFIDFEngine,
{
    #[inline]
    pub fn snapshot(&self) -> SnapshotId {
        self.vocabulary.snapshot()
    }

    /// Vector of a query in the model's space, weighted with the model's engine.
    /// Tokens outside the vocabulary do not contribute.
    pub fn vectorize_query<T>(&self, tokens: &[T]) -> Result<Vec<f64>>
    where
        T: AsRef<str>,
    {
        let freq = TokenFrequency::from_tokens(tokens);
        let tf = E::tf_vec(&freq, &self.vocabulary);
        weigh("", &tf, self.idf.values(), self.zero_norm)
    }

    /// Rank the documents of the model against a token query, best first
    pub fn rank<T>(&self, tokens: &[T]) -> Result<Hits<String>>
    where
        T: AsRef<str>,
    {
        let query = self.vectorize_query(tokens)?;
        self.matrix.rank(&query)
    }
}

/// Builds a [`CorpusModel`] from a frozen corpus.
///
/// Precomputed statistics (e.g. loaded from storage) can be supplied and are
/// used instead of recomputation after checking they belong to the corpus.
/// IDF and TF are computed side by side with `rayon::join` when the config
/// asks for parallelism; both read the same vocabulary and corpus snapshot.
pub struct CorpusAssembly<'a, E = DefaultTFIDFEngine> {
    corpus: &'a Corpus,
    config: VectorizerConfig,
    vocabulary: Option<Vocabulary>,
    idf: Option<IdfTable>,
    tf: Option<TfTable>,
    _marker: PhantomData<E>,
}

impl<'a, E> CorpusAssembly<'a, E>
where
    E: TFIDFEngine,
{
    pub fn new(corpus: &'a Corpus) -> Self {
        Self {
            corpus,
            config: VectorizerConfig::default(),
            vocabulary: None,
            idf: None,
            tf: None,
            _marker: PhantomData,
        }
    }

    pub fn with_config(mut self, config: VectorizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn with_idf_table(mut self, idf: IdfTable) -> Self {
        self.idf = Some(idf);
        self
    }

    pub fn with_tf_table(mut self, tf: TfTable) -> Self {
        self.tf = Some(tf);
        self
    }

    pub fn build(self) -> Result<CorpusModel<E>> {
        let corpus = self.corpus;
        let parallel = self.config.parallel;
        let zero_norm = self.config.zero_norm;

        let vocabulary = match self.vocabulary {
            Some(vocab) => {
                vocab.ensure_fresh(corpus)?;
                vocab
            }
            None => Vocabulary::build(corpus),
        };

        let supplied_idf = self.idf;
        let supplied_tf = self.tf;
        let vocab = &vocabulary;
        let idf_job = move || -> Result<IdfTable> {
            match supplied_idf {
                Some(idf) => {
                    idf.ensure_matches(vocab)?;
                    debug!("using supplied IDF table");
                    Ok(idf)
                }
                None => IdfTable::compute::<E>(corpus, vocab),
            }
        };
        let tf_job = move || -> Result<TfTable> {
            match supplied_tf {
                Some(tf) => {
                    tf.ensure_matches(corpus, vocab)?;
                    debug!("using supplied TF table");
                    Ok(tf)
                }
                None if parallel => TfTable::par_compute::<E>(corpus, vocab),
                None => TfTable::compute::<E>(corpus, vocab),
            }
        };
        // barrier: both tables are complete before any vector is built
        let (idf, tf) = if parallel {
            rayon::join(idf_job, tf_job)
        } else {
            (idf_job(), tf_job())
        };
        let (idf, tf) = (idf?, tf?);

        let matrix = assemble_matrix(corpus, &vocabulary, &idf, &tf, zero_norm, parallel)?;
        info!(
            "document matrix {:?} (documents, terms) for {}",
            matrix.shape(),
            corpus.snapshot()
        );
        Ok(CorpusModel {
            vocabulary,
            idf,
            tf,
            matrix,
            zero_norm,
            _marker: PhantomData,
        })
    }
}

fn assemble_matrix(
    corpus: &Corpus,
    vocab: &Vocabulary,
    idf: &IdfTable,
    tf: &TfTable,
    zero_norm: ZeroNormPolicy,
    parallel: bool,
) -> Result<DocumentMatrix> {
    let row = |key: &str| -> Result<(String, Vec<f64>)> {
        let tf_row = tf
            .get(key)
            .ok_or_else(|| Error::UnknownDocument { key: key.to_string() })?;
        Ok((key.to_string(), weigh(key, tf_row, idf.values(), zero_norm)?))
    };
    let rows = if parallel {
        (0..corpus.doc_num())
            .into_par_iter()
            .filter_map(|i| corpus.get_index(i))
            .map(|(key, _)| row(key))
            .collect::<Result<Vec<_>>>()?
    } else {
        corpus.keys().map(row).collect::<Result<Vec<_>>>()?
    };
    Ok(DocumentMatrix::from_rows(vocab.len(), rows))
}

/// The distinct terms of `corpus`, in a fixed order
pub fn build_vocabulary(corpus: &Corpus) -> Vocabulary {
    Vocabulary::build(corpus)
}

/// IDF value of every vocabulary term over `corpus`
pub fn compute_idf_table(corpus: &Corpus, vocabulary: &Vocabulary) -> Result<IdfTable> {
    IdfTable::compute::<DefaultTFIDFEngine>(corpus, vocabulary)
}

/// Normalized TF-IDF vector of every document of `corpus`, in corpus order.
/// Zero-norm documents fail with `DegenerateVector`.
pub fn vectorize_corpus(corpus: &Corpus, vocabulary: &Vocabulary, idf_table: &IdfTable) -> Result<DocumentMatrix> {
    vocabulary.ensure_fresh(corpus)?;
    idf_table.ensure_matches(vocabulary)?;
    let tf = TfTable::par_compute::<DefaultTFIDFEngine>(corpus, vocabulary)?;
    assemble_matrix(corpus, vocabulary, idf_table, &tf, ZeroNormPolicy::Error, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::vector::vector_length;
    use crate::vectorizer::corpus::Document;

    fn articles() -> Corpus {
        Corpus::from_documents(vec![
            Document::new("rust-1", &["rust", "compil", "borrow", "rust"]),
            Document::new("rust-2", &["rust", "borrow", "lifetim"]),
            Document::new("cook-1", &["recip", "oven", "bake"]),
            Document::new("cook-2", &["recip", "bake", "flour", "bake"]),
            Document::new("misc", &["weather", "rain"]),
        ])
        .unwrap()
    }

    #[test]
    fn sequential_and_parallel_builds_agree() {
        let corpus = articles();
        let seq = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus)
            .with_config(VectorizerConfig {
                parallel: false,
                ..VectorizerConfig::default()
            })
            .build()
            .unwrap();
        let par = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus).build().unwrap();
        assert_eq!(seq, par);
        assert_eq!(par.matrix.shape(), (5, par.vocabulary.len()));
        assert_eq!(
            par.matrix.keys().collect::<Vec<_>>(),
            vec!["rust-1", "rust-2", "cook-1", "cook-2", "misc"]
        );
        for (_, v) in par.matrix.iter() {
            assert!((vector_length(v) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn free_functions_compose() {
        let corpus = articles();
        let vocab = build_vocabulary(&corpus);
        let idf = compute_idf_table(&corpus, &vocab).unwrap();
        let matrix = vectorize_corpus(&corpus, &vocab, &idf).unwrap();
        let model = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus).build().unwrap();
        assert_eq!(matrix, model.matrix);
    }

    #[test]
    fn supplied_tables_are_reused_and_checked() {
        let corpus = articles();
        let vocab = build_vocabulary(&corpus);
        let idf = compute_idf_table(&corpus, &vocab).unwrap();
        let tf = TfTable::compute::<DefaultTFIDFEngine>(&corpus, &vocab).unwrap();
        let model = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus)
            .with_vocabulary(vocab.clone())
            .with_idf_table(idf.clone())
            .with_tf_table(tf.clone())
            .build()
            .unwrap();
        assert_eq!(model.idf, idf);
        assert_eq!(model.tf, tf);

        let mut grown = corpus.clone();
        grown.add_document(Document::new("late", &["rust"])).unwrap();
        let err = CorpusAssembly::<DefaultTFIDFEngine>::new(&grown)
            .with_idf_table(idf)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::StaleStatistics { .. }));
    }

    #[test]
    fn query_ranking_prefers_matching_documents() {
        let corpus = articles();
        let model = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus).build().unwrap();
        let hits = model.rank(&["bake", "flour", "unknown-term"]).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits.list[0].0, "cook-2");

        let query = model.vectorize_query(&["borrow"]).unwrap();
        assert!((vector_length(&query) - 1.0).abs() < 1e-12);
        assert_eq!(model.matrix.rank(&query).unwrap().list[0].0, "rust-1");
        assert!(model.matrix.rank(&[1.0]).is_err());
    }

    /// 1 for present terms, 0 otherwise
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct BinaryEngine;

    impl TFIDFEngine for BinaryEngine {
        fn tf(count: u32, _max_freq: u32) -> f64 {
            if count > 0 {
                1.0
            } else {
                0.0
            }
        }

        fn idf(doc_num: u64, doc_freq: u64) -> f64 {
            DefaultTFIDFEngine::idf(doc_num, doc_freq)
        }
    }

    #[test]
    fn queries_are_weighted_with_the_model_engine() {
        let corpus = articles();
        let model = CorpusAssembly::<BinaryEngine>::new(&corpus).build().unwrap();
        let query = model.vectorize_query(&["rust", "compil", "borrow", "rust"]).unwrap();
        let doc = model.matrix.get("rust-1").unwrap();
        for (q, d) in query.iter().zip(doc) {
            assert!((q - d).abs() < 1e-12);
        }

        let default = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus).build().unwrap();
        assert_ne!(default.matrix.get("rust-1"), Some(doc));
    }

    #[test]
    fn idf_table_from_another_process_is_stale() {
        let corpus = articles();
        let vocab = build_vocabulary(&corpus);
        let here = corpus.snapshot();
        let foreign = SnapshotId {
            process: here.process ^ 1,
            ..here
        };
        let idf = IdfTable::from_parts(vec![9.0; vocab.len()], corpus.doc_num() as u64, foreign);
        let err = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus)
            .with_idf_table(idf)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::StaleStatistics { .. }));
    }

    #[test]
    fn matrix_json_is_checked_on_load() {
        let corpus = articles();
        let model = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus).build().unwrap();
        let json = serde_json::to_string(&model.matrix).unwrap();
        let loaded: DocumentMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, model.matrix);

        for bad in [
            r#"{"rows":[["a",0],["b",5]],"vectors":[[1.0]],"dim":1}"#,
            r#"{"rows":[["a",0],["b",5]],"vectors":[[1.0],[0.0]],"dim":1}"#,
            r#"{"rows":[["a",0]],"vectors":[[1.0, 0.0]],"dim":1}"#,
        ] {
            assert!(serde_json::from_str::<DocumentMatrix>(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn degenerate_corpus_is_reported_with_its_key() {
        let corpus = Corpus::from_documents(vec![
            Document::new("left", &["a"]),
            Document::new("right", &["b"]),
        ])
        .unwrap();
        let err = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus)
            .with_config(VectorizerConfig {
                parallel: false,
                ..VectorizerConfig::default()
            })
            .build()
            .unwrap_err();
        match err {
            Error::DegenerateVector { key } => assert_eq!(key, "left"),
            other => panic!("unexpected {:?}", other),
        }

        let lenient = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus)
            .with_config(VectorizerConfig {
                zero_norm: ZeroNormPolicy::ZeroVector,
                parallel: true,
            })
            .build()
            .unwrap();
        assert_eq!(lenient.matrix.get("right"), Some(&[0.0, 0.0][..]));
    }
}

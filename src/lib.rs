//! This crate is a document clustering engine built on a TF-IDF vectorizer.
//!
//! Documents arrive as already-normalized token sequences. The engine turns
//! them into L2-normalized TF-IDF vectors over a shared vocabulary, ranks
//! them against queries by cosine similarity and groups them with k-means.
//!
//! ```rust
//! use tf_idf_cluster::{Corpus, CorpusAssembly, DefaultTFIDFEngine, Document, KMeans};
//!
//! let corpus = Corpus::from_documents(vec![
//!     Document::new("rust-1", &["rust", "borrow", "compiler"]),
//!     Document::new("rust-2", &["rust", "compiler", "cargo"]),
//!     Document::new("cook-1", &["bake", "bread", "oven"]),
//!     Document::new("cook-2", &["bake", "flour", "oven"]),
//! ])
//! .unwrap();
//!
//! let model = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus).build().unwrap();
//! let fit = KMeans::new(2).with_seed(1).fit(model.matrix.vectors()).unwrap();
//! let clusters = fit.clusters(&model.matrix).unwrap();
//! assert_eq!(clusters.iter().map(Vec::len).sum::<usize>(), 4);
//! ```
pub mod cluster;
pub mod config;
pub mod error;
pub mod utils;
pub mod vectorizer;

/// Corpus for the TF-IDF Vectorizer
/// An ordered, keyed collection of documents.
/// For each document it keeps the token frequencies, and for the whole corpus
/// the number of documents each token appears in.
///
/// Every add or remove moves the corpus to a new generation. Statistics built
/// earlier (`Vocabulary`, `IdfTable`, `TfTable`) remember the snapshot they
/// came from and are rejected with `Error::StaleStatistics` afterwards.
pub use vectorizer::corpus::Corpus;

/// A keyed token sequence, as supplied by the article source.
pub use vectorizer::corpus::Document;

/// Fixed term order shared by every vector built from one corpus snapshot.
/// Terms are ordered by first occurrence, walking the documents in corpus order.
pub use vectorizer::corpus::Vocabulary;

/// Identity of a corpus snapshot: which process, which corpus, and which generation of it.
/// Only meaningful inside the process that created it, so it is never serialized.
pub use vectorizer::corpus::SnapshotId;

/// Token Frequency structure
/// Counts of each token within one document, used as base data for TF.
pub use vectorizer::token::TokenFrequency;

/// TF IDF Calculation Engine Trait
/// Defines how TF and IDF are computed.
///
/// By implementing this trait, you can plug a different weighting into the
/// vectorizer and the assembly. `DefaultTFIDFEngine` uses augmented term
/// frequency and `log10(N / (1 + df))`.
pub use vectorizer::tfidf::{DefaultTFIDFEngine, TFIDFEngine};

/// IDF values and per-document TF rows for one corpus snapshot.
/// Either can be supplied precomputed to skip recomputation.
pub use vectorizer::tfidf::{IdfTable, TfTable};

/// Term statistics over plain token slices
pub use vectorizer::tfidf::{augmented_term_frequency, inverse_document_frequency, max_frequency, raw_frequency, tf_idf};

/// TF-IDF Vectorizer
/// Builds one normalized vector per document over a fixed vocabulary.
///
/// `Vectorizer<E>` is generic over the TF-IDF calculation engine.
/// What happens to a zero-norm vector is chosen with `ZeroNormPolicy`.
pub use vectorizer::{Vectorizer, ZeroNormPolicy};

/// Corpus Assembly
/// Vocabulary, IDF table, TF table and the document-vector matrix built in one go.
pub use vectorizer::assembly::{build_vocabulary, compute_idf_table, vectorize_corpus, CorpusAssembly, CorpusModel, DocumentMatrix};

/// Storage form of a `CorpusModel`, without snapshot identities.
///
/// # Serialization
/// CBOR via `to_cbor` / `write_cbor`, or any serde format.
///
/// # Deserialization
/// Re-attached to a corpus with `into_model`, which checks that the corpus
/// matches what the model was built from.
pub use vectorizer::serde::ModelData;

/// Search Hits
/// Keys with scores, sortable by score.
pub use vectorizer::evaluate::scoring::{rank_by_similarity, Hits};

/// Vector math: Euclidean distance, length and cosine similarity
pub use utils::math::vector::{cosine_similarity as similarity, distance, dot, vector_length};

/// K-means clustering
pub use cluster::{nearest_centroid, Convergence, KMeans, KMeansFit};

/// Configuration
pub use config::{ClusterConfig, EngineConfig, VectorizerConfig};

pub use error::{Error, Result};

/// Vectorize one document against `corpus` with the default engine.
///
/// Fails with `Error::DegenerateVector` when the vector has zero norm.
pub fn vectorize<T>(document: &[T], corpus: &Corpus, vocabulary: &Vocabulary) -> Result<Vec<f64>>
where
    T: AsRef<str>,
{
    Vectorizer::<DefaultTFIDFEngine>::new().vectorize(document, corpus, vocabulary)
}

/// Run k-means with a random seed and exact convergence, returning the final centroids.
pub fn k_means(vectors: &[Vec<f64>], k: usize, max_updates: usize) -> Result<Vec<Vec<f64>>> {
    Ok(KMeans::new(k).with_max_updates(max_updates).fit(vectors)?.centroids)
}

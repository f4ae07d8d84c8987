use thiserror::Error;

use crate::vectorizer::corpus::SnapshotId;

/// Errors returned by the vectorizer and the clusterer.
///
/// Every variant describes misuse by the caller (or a degenerate corpus),
/// never a transient fault, so none of them should be retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Two vectors (or a vector and a table) disagree on dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// A TF-IDF vector has zero norm and cannot be normalized.
    #[error("degenerate vector for document {key:?}: norm is zero")]
    DegenerateVector {
        /// Key of the offending document (empty for ad-hoc documents and queries).
        key: String,
    },

    /// Cosine similarity was requested for a zero-length vector.
    #[error("undefined similarity: vector has zero length")]
    UndefinedSimilarity,

    /// More clusters were requested than there are vectors.
    #[error("insufficient documents: requested {requested} clusters, but only {available} vectors")]
    InsufficientDocuments {
        /// Requested number of clusters.
        requested: usize,
        /// Number of vectors supplied.
        available: usize,
    },

    /// Statistics were computed for a different corpus snapshot.
    #[error("stale statistics: computed for {found}, corpus is at {expected}")]
    StaleStatistics {
        /// Snapshot the caller is working against.
        expected: SnapshotId,
        /// Snapshot the statistics were computed for.
        found: SnapshotId,
    },

    /// Persisted statistics do not describe the corpus they are attached to.
    #[error("incompatible model: {reason}")]
    IncompatibleModel {
        /// What differs between the stored model and the corpus.
        reason: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// A document key is not part of the corpus or table.
    #[error("unknown document {key:?}")]
    UnknownDocument {
        /// Document key.
        key: String,
    },

    /// A document key is already present in the corpus.
    #[error("duplicate document {key:?}")]
    DuplicateDocument {
        /// Document key.
        key: String,
    },

    /// Encoding or decoding a model snapshot or a config failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O errors while reading inputs or writing snapshots.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

impl From<serde_cbor::Error> for Error {
    fn from(e: serde_cbor::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;

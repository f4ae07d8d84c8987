//! Dense vector math over document vectors and centroids.
//!
//! Every binary operation checks lengths and fails with
//! [`Error::DimensionMismatch`] instead of truncating.

use num::Float;

use crate::error::{Error, Result};

#[inline]
fn check_dim<N>(a: &[N], b: &[N]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }
    Ok(())
}

/// ドット積
///
/// # Arguments
/// * `a`, `b` - vectors of equal length
#[inline]
pub fn dot<N: Float>(a: &[N], b: &[N]) -> Result<N> {
    check_dim(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .fold(N::zero(), |acc, (&x, &y)| acc + x * y))
}

/// Squared Euclidean norm
#[inline]
pub fn norm_sq<N: Float>(v: &[N]) -> N {
    v.iter().fold(N::zero(), |acc, &x| acc + x * x)
}

/// Euclidean norm
#[inline]
pub fn vector_length<N: Float>(v: &[N]) -> N {
    norm_sq(v).sqrt()
}

/// Squared Euclidean distance; same ordering as [`distance`] without the root
#[inline]
pub fn squared_distance<N: Float>(a: &[N], b: &[N]) -> Result<N> {
    check_dim(a, b)?;
    Ok(squared_distance_unchecked(a, b))
}

#[inline]
pub(crate) fn squared_distance_unchecked<N: Float>(a: &[N], b: &[N]) -> N {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).fold(N::zero(), |acc, (&x, &y)| {
        let d = x - y;
        acc + d * d
    })
}

/// Euclidean distance
#[inline]
pub fn distance<N: Float>(a: &[N], b: &[N]) -> Result<N> {
    Ok(squared_distance(a, b)?.sqrt())
}

/// Cosine similarity
/// cosθ = A・B / (|A||B|)
///
/// Fails with [`Error::UndefinedSimilarity`] when either vector has zero length.
pub fn cosine_similarity<N: Float>(doc_vec: &[N], query_vec: &[N]) -> Result<N> {
    let d = dot(doc_vec, query_vec)?;
    let denom = vector_length(doc_vec) * vector_length(query_vec);
    if denom == N::zero() {
        return Err(Error::UndefinedSimilarity);
    }
    Ok(d / denom)
}

/// Divide `v` by its norm in place, returning the norm.
/// A zero vector is left untouched and 0 is returned.
pub fn normalize_in_place<N: Float>(v: &mut [N]) -> N {
    let len = vector_length(v);
    if len != N::zero() {
        let inv = N::one() / len;
        for x in v.iter_mut() {
            *x = *x * inv;
        }
    }
    len
}

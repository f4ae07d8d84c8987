use std::fmt::{self, Debug, Display};

use rayon::prelude::*;

use crate::error::Result;
use crate::utils::math::vector::cosine_similarity;

/// Structure to store ranking results
pub struct Hits<K> {
    /// (Document key, Score)
    pub list: Vec<(K, f64)>,
}

impl<K> Hits<K> {
    /// Create a new Hits instance
    pub fn new(vec: Vec<(K, f64)>) -> Self {
        Hits { list: vec }
    }

    /// Sort results by descending score.
    /// The sort is stable, so equal scores keep corpus order.
    pub fn sort_by_score(&mut self) -> &mut Self {
        self.list.sort_by(|a, b| b.1.total_cmp(&a.1));
        self
    }

    /// Sort results by ascending score
    pub fn sort_by_score_rev(&mut self) -> &mut Self {
        self.list.sort_by(|a, b| a.1.total_cmp(&b.1));
        self
    }

    /// Keep only the first `n` entries
    pub fn truncate(&mut self, n: usize) -> &mut Self {
        self.list.truncate(n);
        self
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(K, f64)> {
        self.list.iter()
    }

    /// Replace keys, keeping scores and order
    pub fn map_keys<K2, F>(self, mut f: F) -> Hits<K2>
    where
        F: FnMut(K) -> K2,
    {
        Hits {
            list: self.list.into_iter().map(|(k, s)| (f(k), s)).collect(),
        }
    }
}

impl<K> Debug for Hits<K>
where
    K: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            // one hit per line
            writeln!(f, "Hits [")?;
            for (key, score) in &self.list {
                writeln!(f, "    {:?}: {:.6}", key, score)?;
            }
            write!(f, "]")
        } else {
            f.debug_list().entries(&self.list).finish()
        }
    }
}

impl<K> Display for Hits<K>
where
    K: Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, (key, score)) in self.list.iter().enumerate() {
            writeln!(f, "{:>4}  {:.6}  {}", rank + 1, score, key)?;
        }
        Ok(())
    }
}

/// Rank `vectors` by cosine similarity to `query_vec`, best first.
///
/// Keys of the returned hits are positions in `vectors`. Any zero-length
/// vector (query or document) aborts the ranking with `UndefinedSimilarity`,
/// and a length mismatch with `DimensionMismatch`.
pub fn rank_by_similarity(query_vec: &[f64], vectors: &[Vec<f64>]) -> Result<Hits<usize>> {
    let scores = vectors
        .par_iter()
        .enumerate()
        .map(|(i, doc_vec)| cosine_similarity(doc_vec, query_vec).map(|s| (i, s)))
        .collect::<Result<Vec<(usize, f64)>>>()?;
    let mut hits = Hits::new(scores);
    hits.sort_by_score();
    Ok(hits)
}

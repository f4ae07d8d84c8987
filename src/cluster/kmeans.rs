use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::utils::math::vector::squared_distance_unchecked;
use crate::vectorizer::assembly::DocumentMatrix;

/// When two consecutive centroid sets count as unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convergence {
    /// Every component is bit-for-bit equal
    #[default]
    Exact,
    /// Every component moved by at most this much
    Tolerance(f64),
}

impl Convergence {
    fn is_stable(&self, old: &[Vec<f64>], new: &[Vec<f64>]) -> bool {
        match *self {
            Convergence::Exact => old == new,
            Convergence::Tolerance(eps) => old.iter().zip(new.iter()).all(|(a, b)| {
                a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= eps)
            }),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Convergence::Tolerance(eps) = *self {
            if !eps.is_finite() || eps < 0.0 {
                return Err(Error::invalid_parameter(
                    "tolerance",
                    format!("must be finite and non-negative, got {}", eps),
                ));
            }
        }
        Ok(())
    }
}

/// K-means (Lloyd iterations) seeded by uniform reservoir sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    k: usize,
    max_updates: usize,
    convergence: Convergence,
    seed: Option<u64>,
}

/// Result of a k-means run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansFit {
    /// Final centroids, `k` of them
    pub centroids: Vec<Vec<f64>>,
    /// Number of update steps performed
    pub iterations: usize,
    /// Whether the run stopped because the centroids stopped moving
    pub converged: bool,
}

impl KMeans {
    /// `k` clusters, at most 100 updates, exact convergence, random seed
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_updates: 100,
            convergence: Convergence::Exact,
            seed: None,
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            k: config.k,
            max_updates: config.max_updates,
            convergence: config.convergence,
            seed: config.seed,
        }
    }

    pub fn with_max_updates(mut self, max_updates: usize) -> Self {
        self.max_updates = max_updates;
        self
    }

    pub fn with_convergence(mut self, convergence: Convergence) -> Self {
        self.convergence = convergence;
        self
    }

    /// Fix the sampling seed for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn max_updates(&self) -> usize {
        self.max_updates
    }

    /// Cluster `vectors`, returning the final centroids.
    ///
    /// Fails with `InsufficientDocuments` when there are fewer vectors than
    /// clusters and with `DimensionMismatch` when vector lengths differ.
    pub fn fit(&self, vectors: &[Vec<f64>]) -> Result<KMeansFit> {
        self.check_input(vectors)?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let initial = reservoir_sample(vectors, self.k, &mut rng);
        Ok(self.lloyd(vectors, initial))
    }

    /// Cluster `vectors` starting from the given centroids instead of a sample
    pub fn fit_from(&self, vectors: &[Vec<f64>], initial: Vec<Vec<f64>>) -> Result<KMeansFit> {
        self.check_input(vectors)?;
        if initial.len() != self.k {
            return Err(Error::invalid_parameter(
                "initial",
                format!("expected {} centroids, got {}", self.k, initial.len()),
            ));
        }
        let dim = vectors[0].len();
        if let Some(c) = initial.iter().find(|c| c.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: c.len(),
            });
        }
        Ok(self.lloyd(vectors, initial))
    }

    /// Cluster the rows of a document matrix
    pub fn fit_matrix(&self, matrix: &DocumentMatrix) -> Result<KMeansFit> {
        self.fit(matrix.vectors())
    }

    fn check_input(&self, vectors: &[Vec<f64>]) -> Result<()> {
        if self.k == 0 {
            return Err(Error::invalid_parameter("k", "must be at least 1"));
        }
        self.convergence.validate()?;
        if vectors.len() < self.k {
            return Err(Error::InsufficientDocuments {
                requested: self.k,
                available: vectors.len(),
            });
        }
        let dim = vectors[0].len();
        if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: v.len(),
            });
        }
        Ok(())
    }

    fn lloyd(&self, vectors: &[Vec<f64>], initial: Vec<Vec<f64>>) -> KMeansFit {
        let mut centroids = initial;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_updates {
            let labels = assign_unchecked(vectors, &centroids);
            let updated = update_centroids(vectors, &labels, &centroids);
            iterations += 1;
            let stable = self.convergence.is_stable(&centroids, &updated);
            centroids = updated;
            debug!("k-means update {} (stable: {})", iterations, stable);
            if stable {
                converged = true;
                break;
            }
        }

        if converged {
            info!("k-means converged after {} updates (k = {})", iterations, self.k);
        } else {
            info!("k-means stopped at the {} update bound (k = {})", self.max_updates, self.k);
        }
        KMeansFit {
            centroids,
            iterations,
            converged,
        }
    }
}

impl KMeansFit {
    /// Index of the nearest centroid for every vector
    pub fn assign(&self, vectors: &[Vec<f64>]) -> Result<Vec<usize>> {
        vectors
            .par_iter()
            .map(|v| nearest_centroid(v, &self.centroids))
            .collect()
    }

    /// Document keys of `matrix` grouped by nearest centroid; group `i` belongs to centroid `i`
    pub fn clusters<'a>(&self, matrix: &'a DocumentMatrix) -> Result<Vec<Vec<&'a str>>> {
        let labels = self.assign(matrix.vectors())?;
        let mut groups = vec![Vec::new(); self.centroids.len()];
        for (key, label) in matrix.keys().zip(labels) {
            groups[label].push(key);
        }
        Ok(groups)
    }

    /// Sum of squared distances from every vector to its nearest centroid
    pub fn inertia(&self, vectors: &[Vec<f64>]) -> Result<f64> {
        let labels = self.assign(vectors)?;
        Ok(vectors
            .iter()
            .zip(labels)
            .map(|(v, l)| squared_distance_unchecked(v, &self.centroids[l]))
            .sum())
    }
}

/// Position of the centroid closest to `v` by Euclidean distance.
/// Ties go to the earliest centroid.
pub fn nearest_centroid(v: &[f64], centroids: &[Vec<f64>]) -> Result<usize> {
    if centroids.is_empty() {
        return Err(Error::invalid_parameter("centroids", "no centroids to compare against"));
    }
    if let Some(c) = centroids.iter().find(|c| c.len() != v.len()) {
        return Err(Error::DimensionMismatch {
            expected: c.len(),
            found: v.len(),
        });
    }
    Ok(nearest_unchecked(v, centroids))
}

#[inline]
fn nearest_unchecked(v: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance_unchecked(v, c);
        // strict comparison keeps the first minimum
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn assign_unchecked(vectors: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    vectors
        .par_iter()
        .map(|v| nearest_unchecked(v, centroids))
        .collect()
}

/// Per-dimension mean of each cluster. A cluster without members keeps its previous centroid.
fn update_centroids(vectors: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dim = previous.first().map_or(0, |c| c.len());
    let mut sums = vec![vec![0.0; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (v, &label) in vectors.iter().zip(labels) {
        counts[label] += 1;
        for (s, x) in sums[label].iter_mut().zip(v.iter()) {
            *s += x;
        }
    }
    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(i, (sum, count))| {
            if count == 0 {
                warn!("cluster {} received no vectors, keeping its centroid", i);
                previous[i].clone()
            } else {
                let n = count as f64;
                sum.into_iter().map(|s| s / n).collect()
            }
        })
        .collect()
}

/// `k` items chosen uniformly without replacement in one pass (Algorithm R).
///
/// Returns all items when there are at most `k` of them.
pub fn reservoir_sample<T, R>(items: &[T], k: usize, rng: &mut R) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let mut reservoir: Vec<T> = items.iter().take(k).cloned().collect();
    for (i, item) in items.iter().enumerate().skip(k) {
        let j = rng.random_range(0..=i);
        if j < k {
            reservoir[j] = item.clone();
        }
    }
    reservoir
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 10.0],
            vec![10.0, 11.0],
        ]
    }

    fn sorted(mut centroids: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        centroids.sort_by(|a, b| a[0].total_cmp(&b[0]));
        centroids
    }

    #[test]
    fn finds_both_blobs_for_any_seed() {
        let data = two_blobs();
        for seed in 0..32 {
            let fit = KMeans::new(2).with_seed(seed).fit(&data).unwrap();
            assert!(fit.converged, "seed {} did not converge", seed);
            let c = sorted(fit.centroids.clone());
            assert!((c[0][0] - 0.0).abs() < 1e-9 && (c[0][1] - 0.5).abs() < 1e-9, "seed {}: {:?}", seed, c);
            assert!((c[1][0] - 10.0).abs() < 1e-9 && (c[1][1] - 10.5).abs() < 1e-9, "seed {}: {:?}", seed, c);

            let labels = fit.assign(&data).unwrap();
            assert_eq!(labels[0], labels[1]);
            assert_eq!(labels[2], labels[3]);
            assert_ne!(labels[0], labels[2]);
        }
    }

    #[test]
    fn worst_seeding_still_separates() {
        // both seeds in the first blob
        let data = two_blobs();
        let fit = KMeans::new(2)
            .fit_from(&data, vec![vec![0.0, 0.0], vec![0.0, 1.0]])
            .unwrap();
        assert!(fit.converged);
        assert_eq!(fit.centroids, vec![vec![0.0, 0.5], vec![10.0, 10.5]]);
        // two moving updates plus the one that confirms stability
        assert_eq!(fit.iterations, 3);
    }

    #[test]
    fn stops_at_update_bound() {
        let data = two_blobs();
        let fit = KMeans::new(2)
            .with_max_updates(1)
            .fit_from(&data, vec![vec![0.0, 0.0], vec![0.0, 1.0]])
            .unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.iterations, 1);
        assert_eq!(fit.centroids[0], vec![0.0, 0.0]);

        let untouched = KMeans::new(2)
            .with_max_updates(0)
            .fit_from(&data, vec![vec![1.0, 1.0], vec![2.0, 2.0]])
            .unwrap();
        assert_eq!(untouched.iterations, 0);
        assert_eq!(untouched.centroids, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
    }

    #[test]
    fn tolerance_converges_as_well() {
        let data = two_blobs();
        let fit = KMeans::new(2)
            .with_convergence(Convergence::Tolerance(1e-9))
            .with_seed(3)
            .fit(&data)
            .unwrap();
        assert!(fit.converged);
        assert!(fit.iterations <= 100);
        assert!(fit.inertia(&data).unwrap() - 1.0 < 1e-9);

        let bad = KMeans::new(2).with_convergence(Convergence::Tolerance(-1.0)).fit(&data);
        assert!(matches!(bad, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn empty_cluster_keeps_previous_centroid() {
        let data = two_blobs();
        let far = vec![100.0, -100.0];
        let fit = KMeans::new(3)
            .fit_from(&data, vec![vec![0.0, 0.0], vec![10.0, 10.0], far.clone()])
            .unwrap();
        assert!(fit.converged);
        assert_eq!(fit.centroids[2], far);
        assert!(fit.centroids.iter().flatten().all(|x| x.is_finite()));
    }

    #[test]
    fn rejects_more_clusters_than_vectors() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let err = KMeans::new(3).with_max_updates(100).fit(&data).unwrap_err();
        assert!(matches!(err, Error::InsufficientDocuments { requested: 3, available: 2 }));
        assert!(matches!(KMeans::new(0).fit(&data), Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn rejects_ragged_input() {
        let data = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(matches!(
            KMeans::new(1).fit(&data),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert!(nearest_centroid(&[0.0], &[vec![0.0, 0.0]]).is_err());
    }

    #[test]
    fn nearest_centroid_prefers_first_on_ties() {
        let centroids = vec![vec![1.0, 0.0], vec![-1.0, 0.0]];
        assert_eq!(nearest_centroid(&[0.0, 0.0], &centroids).unwrap(), 0);
        assert_eq!(nearest_centroid(&[-0.5, 0.0], &centroids).unwrap(), 1);
    }

    #[test]
    fn reservoir_sample_is_uniform_and_distinct() {
        let items: Vec<usize> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let mut hits = [0usize; 10];
        for _ in 0..5000 {
            let mut sample = reservoir_sample(&items, 3, &mut rng);
            assert_eq!(sample.len(), 3);
            sample.sort();
            sample.dedup();
            assert_eq!(sample.len(), 3);
            for s in sample {
                hits[s] += 1;
            }
        }
        // expected 1500 each
        assert!(hits.iter().all(|&h| (1200..1800).contains(&h)), "{:?}", hits);

        assert_eq!(reservoir_sample(&items[..2], 5, &mut rng), vec![0, 1]);
    }
}

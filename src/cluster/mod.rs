//! Clustering of document vectors.
//!
//! ### K-means
//!
//! Assign each vector to the nearest centroid, then move every centroid to
//! the mean of its vectors. Repeat until the centroids stop moving or the
//! update bound is reached.
//!
//! ```rust
//! use tf_idf_cluster::cluster::KMeans;
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![10.0, 10.0],
//!     vec![10.0, 11.0],
//! ];
//!
//! let fit = KMeans::new(2).with_seed(7).fit(&data).unwrap();
//! let labels = fit.assign(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//! ```

mod kmeans;

pub use kmeans::{nearest_centroid, reservoir_sample, Convergence, KMeans, KMeansFit};

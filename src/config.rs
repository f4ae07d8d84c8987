//! Engine configuration, loaded from JSON.
//!
//! Every field has a default, so `{}` is a complete configuration.
//!
//! ```json
//! {
//!   "vectorizer": { "zero_norm": "zero_vector", "parallel": true },
//!   "clustering": { "k": 4, "max_updates": 100, "convergence": { "tolerance": 1e-9 }, "seed": 42 }
//! }
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cluster::Convergence;
use crate::error::{Error, Result};
use crate::vectorizer::ZeroNormPolicy;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub vectorizer: VectorizerConfig,
    pub clustering: ClusterConfig,
}

/// How document vectors are built
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// What to do with a document whose TF-IDF vector has zero norm
    pub zero_norm: ZeroNormPolicy,
    /// Compute IDF and TF side by side and vectorize on the rayon pool
    pub parallel: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            zero_norm: ZeroNormPolicy::Error,
            parallel: true,
        }
    }
}

/// K-means parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub k: usize,
    pub max_updates: usize,
    pub convergence: Convergence,
    /// Sampling seed; a random one is drawn when absent
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 2,
            max_updates: 100,
            convergence: Convergence::Exact,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading config from {}", path.display());
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.clustering.validate()
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::invalid_parameter("k", "must be at least 1"));
        }
        self.convergence.validate()
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// TokenFrequency
/// Occurrence counts of the tokens of a single document.
///
/// Tokens are opaque, already normalized strings; equality is exact and
/// case-sensitive. Insertion order of distinct tokens is kept, so iteration
/// over a `TokenFrequency` is deterministic.
///
/// # Examples
/// ```
/// use tf_idf_cluster::TokenFrequency;
/// let mut freq = TokenFrequency::new();
/// freq.add_tokens(&["rust", "fast", "rust"]);
///
/// assert_eq!(freq.raw_frequency("rust"), 2);
/// assert_eq!(freq.max_frequency(), 2);
/// assert_eq!(freq.augmented_term_frequency("fast", freq.max_frequency()), 0.75);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TokenFrequency {
    #[serde(with = "indexmap::map::serde_seq")]
    token_count: IndexMap<String, u32>,
    total_token_count: u64,
}

/// Token insertion
impl TokenFrequency {
    /// Create an empty `TokenFrequency`
    pub fn new() -> Self {
        TokenFrequency {
            token_count: IndexMap::new(),
            total_token_count: 0,
        }
    }

    /// Build counts from a token sequence
    pub fn from_tokens<T>(tokens: &[T]) -> Self
    where
        T: AsRef<str>,
    {
        let mut freq = Self::new();
        freq.add_tokens(tokens);
        freq
    }

    /// Add one occurrence of a token
    ///
    /// # Arguments
    /// * `token` - token to count
    #[inline]
    pub fn add_token(&mut self, token: &str) -> &mut Self {
        let count = self.token_count.entry(token.to_string()).or_insert(0);
        *count += 1;
        self.total_token_count += 1;
        self
    }

    /// Add every token of a slice
    ///
    /// # Arguments
    /// * `tokens` - tokens to count
    #[inline]
    pub fn add_tokens<T>(&mut self, tokens: &[T]) -> &mut Self
    where
        T: AsRef<str>,
    {
        for token in tokens {
            self.add_token(token.as_ref());
        }
        self
    }
}

/// TF-calculation
impl TokenFrequency {
    /// Number of exact occurrences of `term` in the document
    ///
    /// # Arguments
    /// * `term` - token to look up
    ///
    /// # Returns
    /// * `u32` - occurrence count, 0 when absent
    #[inline]
    pub fn raw_frequency(&self, term: &str) -> u32 {
        self.token_count.get(term).copied().unwrap_or(0)
    }

    /// Largest raw frequency over the distinct tokens of the document.
    /// Never smaller than 1, so an empty document yields 1.
    #[inline]
    pub fn max_frequency(&self) -> u32 {
        self.token_count.values().copied().max().unwrap_or(0).max(1)
    }

    /// Augmented term frequency
    ///
    /// ```text
    /// tf(t, d) = 0.5 + 0.5 * f(t, d) / max_freq
    /// ```
    ///
    /// A term absent from the document yields exactly 0.5.
    ///
    /// # Arguments
    /// * `term` - token
    /// * `max_freq` - value of [`TokenFrequency::max_frequency`] for this document
    #[inline]
    pub fn augmented_term_frequency(&self, term: &str, max_freq: u32) -> f64 {
        Self::augmented_tf_calc(self.raw_frequency(term), max_freq)
    }

    /// 0.5 + 0.5 * count / max_freq; `max_freq` of 0 is treated as 1
    #[inline]
    pub fn augmented_tf_calc(count: u32, max_freq: u32) -> f64 {
        0.5 + (0.5 * count as f64) / max_freq.max(1) as f64
    }
}

/// Information accessors
impl TokenFrequency {
    /// Total number of tokens in the document
    #[inline]
    pub fn token_sum(&self) -> u64 {
        self.total_token_count
    }

    /// Number of distinct tokens
    #[inline]
    pub fn token_num(&self) -> usize {
        self.token_count.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_token_count == 0
    }

    /// Distinct tokens in first-occurrence order
    #[inline]
    pub fn token_set_ref_str(&self) -> Vec<&str> {
        self.token_count.keys().map(|s| s.as_str()).collect()
    }
}

impl<T> FromIterator<T> for TokenFrequency
where
    T: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut freq = TokenFrequency::new();
        for token in iter {
            freq.add_token(token.as_ref());
        }
        freq
    }
}

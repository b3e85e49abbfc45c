//! Difficulty targets expressed as a required digest prefix.

/// Errors raised while building a [`DifficultyTarget`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DifficultyError {
    /// The prefix is longer than a digest.
    #[error("difficulty prefix is {0} bytes, a digest only has 32")]
    TooLong(usize),
    /// The prefix is not valid hex.
    #[error("invalid difficulty hex: {0}")]
    InvalidHex(String),
}

/// The leading bytes a digest must carry for its nonce to win.
///
/// Matching is byte-for-byte on the prefix only. There is no numeric
/// threshold and no partial-byte difficulty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DifficultyTarget {
    prefix: Vec<u8>,
}

impl DifficultyTarget {
    /// Build a target from raw prefix bytes.
    pub fn new(prefix: impl Into<Vec<u8>>) -> Result<Self, DifficultyError> {
        let prefix = prefix.into();
        if prefix.len() > 32 {
            return Err(DifficultyError::TooLong(prefix.len()));
        }
        Ok(DifficultyTarget { prefix })
    }

    /// Build a target from the first 32 bytes of `prefix` at most.
    pub fn truncated(prefix: &[u8]) -> Self {
        DifficultyTarget {
            prefix: prefix[..prefix.len().min(32)].to_vec(),
        }
    }

    /// A target of `count` zero bytes.
    pub fn leading_zero_bytes(count: usize) -> Result<Self, DifficultyError> {
        Self::new(vec![0u8; count])
    }

    /// Parse a target from hex, e.g. `"0000"` for two zero bytes.
    pub fn from_hex(s: &str) -> Result<Self, DifficultyError> {
        let bytes = hex::decode(s.trim()).map_err(|e| DifficultyError::InvalidHex(e.to_string()))?;
        Self::new(bytes)
    }

    /// The required prefix.
    pub fn as_bytes(&self) -> &[u8] {
        &self.prefix
    }

    /// Number of bytes the digest must match.
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    /// An empty target accepts every digest.
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Check whether `hash` starts with this target.
    #[inline]
    pub fn matches(&self, hash: &[u8; 32]) -> bool {
        hash_matches_prefix(hash, &self.prefix)
    }

    /// Average number of hashes needed to hit this target.
    pub fn expected_hashes(&self) -> f64 {
        256f64.powi(self.prefix.len() as i32)
    }

    /// The target as hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.prefix)
    }
}

impl core::fmt::Display for DifficultyTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "<any>")
        } else {
            write!(f, "{}", self.to_hex())
        }
    }
}

/// Check if the first `prefix.len()` bytes of `hash` equal `prefix`.
///
/// A prefix longer than the hash never matches.
#[inline]
pub fn hash_matches_prefix(hash: &[u8; 32], prefix: &[u8]) -> bool {
    hash.starts_with(prefix)
}

/// Format a hash count for display (e.g., "65.54K").
pub fn format_hashes(hashes: f64) -> String {
    if hashes >= 1e15 {
        format!("{:.2}P", hashes / 1e15)
    } else if hashes >= 1e12 {
        format!("{:.2}T", hashes / 1e12)
    } else if hashes >= 1e9 {
        format!("{:.2}G", hashes / 1e9)
    } else if hashes >= 1e6 {
        format!("{:.2}M", hashes / 1e6)
    } else if hashes >= 1e3 {
        format!("{:.2}K", hashes / 1e3)
    } else {
        format!("{:.2}", hashes)
    }
}

//! SHA256 hashing and the digest seam used by the nonce search.

use core::str::FromStr;

use sha2::{Digest, Sha256};

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Encode a digest as lowercase hex, in natural byte order.
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

/// A function from serialized header bytes to a 32-byte digest.
///
/// Workers share one implementation across threads, hence `Sync`.
pub trait HeaderDigest: Sync {
    /// Digest the serialized header.
    fn digest(&self, data: &[u8]) -> [u8; 32];
}

impl<F> HeaderDigest for F
where
    F: Fn(&[u8]) -> [u8; 32] + Sync,
{
    fn digest(&self, data: &[u8]) -> [u8; 32] {
        self(data)
    }
}

/// The hash functions a search can run with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// One round of SHA256.
    #[default]
    Sha256,
    /// Two rounds of SHA256, as Bitcoin hashes its headers.
    DoubleSha256,
}

impl HashAlgorithm {
    /// Get the algorithm name as string.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::DoubleSha256 => "double-sha256",
        }
    }
}

impl HeaderDigest for HashAlgorithm {
    #[inline]
    fn digest(&self, data: &[u8]) -> [u8; 32] {
        match self {
            HashAlgorithm::Sha256 => sha256(data),
            HashAlgorithm::DoubleSha256 => double_sha256(data),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "double-sha256" | "sha256d" | "dsha256" => Ok(HashAlgorithm::DoubleSha256),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

impl core::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Returned when parsing an algorithm name that is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hash algorithm `{0}` (expected sha256 or double-sha256)")]
pub struct UnknownAlgorithm(pub String);

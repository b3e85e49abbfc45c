//! Block header construction and serialization.

use crate::hash::HeaderDigest;
use crate::params::{BLOCK_HEADER_SIZE, GENESIS_HEIGHT, HEADER_PREFIX_SIZE};

/// Errors raised while parsing a 32-byte header field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// The field is not valid hex.
    #[error("invalid hash hex: {0}")]
    InvalidHex(String),
    /// The field decoded to the wrong number of bytes.
    #[error("hash must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A candidate block header (80 bytes serialized).
///
/// Headers are plain values: a search keeps one template and every worker
/// derives its candidates from a private copy, changing only `nonce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hash of the previous block, all zero for genesis.
    pub prev_block_hash: [u8; 32],
    /// Block height.
    pub height: u64,
    /// Merkle root of all transactions.
    pub merkle_root: [u8; 32],
    /// Nonce for proof of work.
    pub nonce: u64,
}

impl BlockHeader {
    /// Create a new block header with a zero nonce.
    pub fn new(prev_block_hash: [u8; 32], height: u64, merkle_root: [u8; 32]) -> Self {
        BlockHeader {
            prev_block_hash,
            height,
            merkle_root,
            nonce: 0,
        }
    }

    /// The genesis template: no parent, no transactions.
    pub fn genesis() -> Self {
        Self::new([0u8; 32], GENESIS_HEIGHT, [0u8; 32])
    }

    /// A copy of this header carrying `nonce`.
    #[inline]
    pub fn with_nonce(&self, nonce: u64) -> Self {
        BlockHeader { nonce, ..*self }
    }

    /// Serialize the block header to 80 bytes.
    ///
    /// Layout: previous hash (32) | height (8, LE) | merkle root (32) | nonce (8, LE).
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[..HEADER_PREFIX_SIZE].copy_from_slice(&self.serialize_without_nonce());
        header[HEADER_PREFIX_SIZE..].copy_from_slice(&self.nonce.to_le_bytes());
        header
    }

    /// Serialize the header without the nonce (72 bytes).
    pub fn serialize_without_nonce(&self) -> [u8; HEADER_PREFIX_SIZE] {
        let mut header = [0u8; HEADER_PREFIX_SIZE];

        header[0..32].copy_from_slice(&self.prev_block_hash);
        header[32..40].copy_from_slice(&self.height.to_le_bytes());
        header[40..72].copy_from_slice(&self.merkle_root);

        header
    }

    /// Digest the serialized header with `digest`.
    pub fn hash_with<D: HeaderDigest + ?Sized>(&self, digest: &D) -> [u8; 32] {
        digest.digest(&self.serialize())
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self::genesis()
    }
}

/// Parse a 32-byte header field from 64 hex characters.
pub fn parse_hash32(s: &str) -> Result<[u8; 32], HeaderError> {
    let bytes = hex::decode(s.trim()).map_err(|e| HeaderError::InvalidHex(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| HeaderError::InvalidLength(bytes.len()))
}

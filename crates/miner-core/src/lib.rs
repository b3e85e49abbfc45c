//! Core logic for the genesis nonce miner.
//!
//! This crate provides:
//! - Block header construction and fixed-width serialization
//! - SHA256 hashing behind a pluggable digest trait
//! - Difficulty targets as a required digest prefix
//! - A parallel nonce search with cooperative cancellation

pub mod block;
pub mod difficulty;
pub mod hash;
pub mod params;
pub mod search;

pub use block::{parse_hash32, BlockHeader, HeaderError};
pub use difficulty::{hash_matches_prefix, DifficultyError, DifficultyTarget};
pub use hash::{double_sha256, hash_to_hex, sha256, HashAlgorithm, HeaderDigest};
pub use search::{
    partition, scan, NonceSearch, SearchAssignment, SearchConfig, SearchError, SearchOutcome,
    Solution, WorkerReport,
};

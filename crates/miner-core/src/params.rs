//! Search parameters and header constants.

/// Size of a serialized block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Size of a serialized block header without its trailing nonce.
pub const HEADER_PREFIX_SIZE: usize = BLOCK_HEADER_SIZE - 8;

/// Height given to the genesis template.
pub const GENESIS_HEIGHT: u64 = 1;

/// Leading digest bytes required by default (two zero bytes, 1 in 65536 hashes).
pub const DEFAULT_DIFFICULTY: [u8; 2] = [0x00, 0x00];

/// Number of nonces searched by default, starting at zero.
pub const DEFAULT_TOTAL_NONCES: u64 = 6_000_000;

/// Number of workers the nonce space is split across by default.
pub const DEFAULT_WORKERS: usize = 100;

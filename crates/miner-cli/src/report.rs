//! Search reports for the console and for JSON consumers.

use miner_core::{HashAlgorithm, SearchConfig, SearchOutcome};
use serde::{Deserialize, Serialize};

/// Summary of a finished search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    /// Whether a winning nonce was found.
    pub found: bool,
    /// Worker that found it.
    pub worker: Option<usize>,
    /// The winning nonce.
    pub nonce: Option<u64>,
    /// The winning digest as hex.
    pub hash: Option<String>,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
    /// Hashes computed across all workers.
    pub total_hashes: u64,
    /// Hash rate (hashes per second).
    pub hash_rate: f64,
    /// Required digest prefix as hex.
    pub difficulty: String,
    /// Hash function used.
    pub algorithm: String,
    /// Number of workers.
    pub workers: usize,
    /// Size of the searched nonce space.
    pub total_nonces: u64,
}

impl SearchReport {
    /// Build a report from a search outcome.
    pub fn new(outcome: &SearchOutcome, config: &SearchConfig, algorithm: HashAlgorithm) -> Self {
        let solution = outcome.solution();
        let mut report = SearchReport {
            found: outcome.is_found(),
            worker: solution.map(|s| s.worker),
            nonce: solution.map(|s| s.nonce),
            hash: solution.map(|s| s.hash_hex()),
            elapsed_ms: outcome.elapsed().as_secs_f64() * 1000.0,
            total_hashes: outcome.hashes(),
            hash_rate: 0.0,
            difficulty: config.difficulty.to_hex(),
            algorithm: algorithm.name().to_string(),
            workers: config.workers,
            total_nonces: config.total_nonces,
        };
        report.update_hash_rate();
        report
    }

    /// Update hash rate based on elapsed time.
    pub fn update_hash_rate(&mut self) {
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_hashes as f64) / (self.elapsed_ms / 1000.0);
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", self.hash_rate / 1_000_000_000.0)
        } else if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    /// One-line console summary.
    pub fn summary(&self) -> String {
        match (self.worker, self.nonce, &self.hash) {
            (Some(worker), Some(nonce), Some(hash)) => format!(
                "Worker {} Nonce {} Hash: {} Found in {:.3}s ({}, {} hashes)",
                worker,
                nonce,
                hash,
                self.elapsed_ms / 1000.0,
                self.format_hash_rate(),
                self.total_hashes,
            ),
            _ => format!(
                "No solution found in range [0, {}) after {} hashes in {:.3}s",
                self.total_nonces,
                self.total_hashes,
                self.elapsed_ms / 1000.0,
            ),
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

//! Parallel nonce search.
//!
//! The nonce space `[0, total)` is split into contiguous sub-ranges, one per
//! worker thread. Each worker scans its own range in ascending order on a
//! private copy of the template header. The first worker to hit the
//! difficulty target reports back, the coordinator raises a shared
//! cancellation flag, and every other worker stops before its next attempt.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace};

use crate::block::BlockHeader;
use crate::difficulty::{format_hashes, DifficultyTarget};
use crate::hash::{hash_to_hex, HeaderDigest};
use crate::params::{DEFAULT_DIFFICULTY, DEFAULT_TOTAL_NONCES, DEFAULT_WORKERS};

/// Errors that abort a whole search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A search needs at least one worker.
    #[error("worker count must be at least 1")]
    NoWorkers,
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
    /// A worker panicked; partial results are discarded.
    #[error("worker {worker} panicked, search aborted")]
    WorkerPanicked { worker: usize },
}

/// What to search for and how to split the work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Number of workers, one thread each.
    pub workers: usize,
    /// Size of the nonce space, searched from zero.
    pub total_nonces: u64,
    /// Prefix a winning digest must start with.
    pub difficulty: DifficultyTarget,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            workers: DEFAULT_WORKERS,
            total_nonces: DEFAULT_TOTAL_NONCES,
            difficulty: DifficultyTarget::truncated(&DEFAULT_DIFFICULTY),
        }
    }
}

/// Everything one worker needs, borrowed from the coordinator.
#[derive(Debug, Clone)]
pub struct SearchAssignment<'a> {
    /// 1-based worker id, as reported on success.
    pub worker: usize,
    /// Prefix a winning digest must start with.
    pub difficulty: &'a DifficultyTarget,
    /// Nonces to try, `[start, end)`.
    pub nonces: Range<u64>,
    /// Read-only template; only its nonce varies per attempt.
    pub template: &'a BlockHeader,
    /// When the whole search started.
    pub started: Instant,
    /// Raised once any worker wins.
    pub cancel: &'a AtomicBool,
}

/// A winning nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Worker that found it.
    pub worker: usize,
    /// The nonce itself.
    pub nonce: u64,
    /// Digest of the header carrying `nonce`.
    pub hash: [u8; 32],
    /// Time from search start to the match.
    pub elapsed: Duration,
    /// The winning header.
    pub header: BlockHeader,
}

impl Solution {
    /// The winning digest as hex.
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }
}

/// How a single worker finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReport {
    /// The worker hit the target.
    Found { solution: Solution, hashes: u64 },
    /// The whole sub-range was tried without a match.
    Exhausted { worker: usize, hashes: u64 },
    /// Another worker won first.
    Cancelled { worker: usize, hashes: u64 },
}

impl WorkerReport {
    /// Id of the reporting worker.
    pub fn worker(&self) -> usize {
        match self {
            WorkerReport::Found { solution, .. } => solution.worker,
            WorkerReport::Exhausted { worker, .. } | WorkerReport::Cancelled { worker, .. } => {
                *worker
            }
        }
    }

    /// Hashes computed by the reporting worker.
    pub fn hashes(&self) -> u64 {
        match self {
            WorkerReport::Found { hashes, .. }
            | WorkerReport::Exhausted { hashes, .. }
            | WorkerReport::Cancelled { hashes, .. } => *hashes,
        }
    }
}

/// Result of a complete search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A worker found a nonce; the rest were cancelled.
    Found {
        solution: Solution,
        /// Hashes computed across all workers.
        hashes: u64,
    },
    /// Every worker exhausted its range: no solution in the searched space.
    Exhausted {
        /// Hashes computed across all workers.
        hashes: u64,
        elapsed: Duration,
    },
}

impl SearchOutcome {
    /// Whether a solution was found.
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }

    /// The solution, if any.
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SearchOutcome::Found { solution, .. } => Some(solution),
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    /// Hashes computed across all workers.
    pub fn hashes(&self) -> u64 {
        match self {
            SearchOutcome::Found { hashes, .. } | SearchOutcome::Exhausted { hashes, .. } => {
                *hashes
            }
        }
    }

    /// Time spent until the outcome was decided.
    pub fn elapsed(&self) -> Duration {
        match self {
            SearchOutcome::Found { solution, .. } => solution.elapsed,
            SearchOutcome::Exhausted { elapsed, .. } => *elapsed,
        }
    }
}

/// Split `[0, total)` into `workers` contiguous, disjoint, ascending ranges.
///
/// Each range holds `total / workers` nonces; the first `total % workers`
/// ranges take one extra nonce each so the union is exactly `[0, total)`.
/// Ranges may be empty when there are more workers than nonces.
pub fn partition(total: u64, workers: usize) -> Result<Vec<Range<u64>>, SearchError> {
    if workers == 0 {
        return Err(SearchError::NoWorkers);
    }

    let count = workers as u64;
    let amount = total / count;
    let remainder = total % count;

    let mut start = 0u64;
    Ok((0..count)
        .map(|i| {
            let len = amount + u64::from(i < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .collect())
}

/// Scan one assignment in ascending nonce order.
///
/// Stops at the first match, when the range runs out, or as soon as the
/// cancellation flag is seen between two attempts.
pub fn scan<D: HeaderDigest + ?Sized>(assignment: &SearchAssignment<'_>, digest: &D) -> WorkerReport {
    let worker = assignment.worker;
    let mut header = *assignment.template;
    let mut hashes = 0u64;

    debug!(worker, start = assignment.nonces.start, end = assignment.nonces.end, "worker started");

    for nonce in assignment.nonces.clone() {
        if assignment.cancel.load(Ordering::Relaxed) {
            debug!(worker, hashes, "worker cancelled");
            return WorkerReport::Cancelled { worker, hashes };
        }

        header.nonce = nonce;
        let hash = digest.digest(&header.serialize());
        hashes += 1;

        if assignment.difficulty.matches(&hash) {
            let elapsed = assignment.started.elapsed();
            info!(
                worker,
                nonce,
                hash = %hash_to_hex(&hash),
                elapsed = ?elapsed,
                "found matching nonce"
            );
            return WorkerReport::Found {
                solution: Solution {
                    worker,
                    nonce,
                    hash,
                    elapsed,
                    header,
                },
                hashes,
            };
        }
    }

    trace!(worker, hashes, "sub-range exhausted");
    WorkerReport::Exhausted { worker, hashes }
}

/// Raises the cancellation flag if the owning worker unwinds.
struct CancelOnPanic<'a>(&'a AtomicBool);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}

/// Coordinates a fork-join pool of scanning workers.
#[derive(Debug, Clone, Default)]
pub struct NonceSearch {
    config: SearchConfig,
}

impl NonceSearch {
    /// Create a search with the given configuration.
    pub fn new(config: SearchConfig) -> Self {
        NonceSearch { config }
    }

    /// The configuration this search runs with.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run the search over `template` and block until it is decided.
    ///
    /// Returns [`SearchOutcome::Found`] for the first reported match, or
    /// [`SearchOutcome::Exhausted`] once every worker ran out of nonces.
    /// A panicking worker aborts the search with [`SearchError::WorkerPanicked`].
    pub fn run<D: HeaderDigest + ?Sized>(
        &self,
        template: &BlockHeader,
        digest: &D,
    ) -> Result<SearchOutcome, SearchError> {
        let ranges = partition(self.config.total_nonces, self.config.workers)?;
        let difficulty = &self.config.difficulty;

        info!(
            workers = ranges.len(),
            total = self.config.total_nonces,
            difficulty = %difficulty,
            expected = %format_hashes(difficulty.expected_hashes()),
            "starting nonce search"
        );

        let cancel = AtomicBool::new(false);
        let started = Instant::now();
        let (report_tx, report_rx) = mpsc::channel::<WorkerReport>();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(ranges.len());

            for (index, nonces) in ranges.into_iter().enumerate() {
                let worker = index + 1;
                let report_tx = report_tx.clone();
                let assignment = SearchAssignment {
                    worker,
                    difficulty,
                    nonces,
                    template,
                    started,
                    cancel: &cancel,
                };

                let spawned = thread::Builder::new()
                    .name(format!("nonce-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        let _guard = CancelOnPanic(assignment.cancel);
                        let report = scan(&assignment, digest);
                        // The coordinator keeps the receiver until every worker is joined.
                        let _ = report_tx.send(report);
                    });

                match spawned {
                    Ok(handle) => handles.push((worker, handle)),
                    Err(source) => {
                        error!(worker, %source, "failed to spawn worker");
                        cancel.store(true, Ordering::Relaxed);
                        return Err(SearchError::Spawn { worker, source });
                    }
                }
            }
            drop(report_tx);

            let mut winner: Option<Solution> = None;
            let mut hashes = 0u64;

            for report in report_rx.iter() {
                trace!(worker = report.worker(), hashes = report.hashes(), "worker finished");
                hashes += report.hashes();
                match report {
                    WorkerReport::Found { solution, .. } if winner.is_none() => {
                        cancel.store(true, Ordering::Relaxed);
                        debug!(worker = solution.worker, "cancelling remaining workers");
                        winner = Some(solution);
                    }
                    WorkerReport::Found { solution, .. } => {
                        debug!(worker = solution.worker, nonce = solution.nonce, "late solution discarded");
                    }
                    WorkerReport::Exhausted { .. } | WorkerReport::Cancelled { .. } => {}
                }
            }

            let mut panicked = None;
            for (worker, handle) in handles {
                if handle.join().is_err() {
                    error!(worker, "worker panicked");
                    panicked.get_or_insert(worker);
                }
            }
            if let Some(worker) = panicked {
                return Err(SearchError::WorkerPanicked { worker });
            }

            Ok(match winner {
                Some(solution) => SearchOutcome::Found { solution, hashes },
                None => {
                    let elapsed = started.elapsed();
                    info!(hashes, elapsed = ?elapsed, "no solution found in range");
                    SearchOutcome::Exhausted { hashes, elapsed }
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;
    use crate::params::HEADER_PREFIX_SIZE;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Read the nonce back out of a serialized header.
    fn nonce_of(data: &[u8]) -> u64 {
        u64::from_le_bytes(data[HEADER_PREFIX_SIZE..].try_into().unwrap())
    }

    /// A digest that only starts with zero for one chosen nonce.
    fn single_match(winner: u64) -> impl Fn(&[u8]) -> [u8; 32] + Sync {
        move |data: &[u8]| {
            if nonce_of(data) == winner {
                [0x00; 32]
            } else {
                [0xFF; 32]
            }
        }
    }

    fn config(workers: usize, total_nonces: u64, prefix: &[u8]) -> SearchConfig {
        SearchConfig {
            workers,
            total_nonces,
            difficulty: DifficultyTarget::new(prefix.to_vec()).unwrap(),
        }
    }

    #[test]
    fn test_partition_ten_by_two() {
        let ranges = partition(10, 2).unwrap();
        assert_eq!(ranges, vec![0..5, 5..10]);
    }

    #[test]
    fn test_partition_default_range() {
        let ranges = partition(DEFAULT_TOTAL_NONCES, DEFAULT_WORKERS).unwrap();
        assert_eq!(ranges.len(), 100);
        for (i, range) in ranges.iter().enumerate() {
            let i = i as u64;
            assert_eq!(*range, i * 60_000..(i + 1) * 60_000);
        }
    }

    #[test]
    fn test_partition_covers_range_exactly_once() {
        for (total, workers) in [(10, 2), (12, 3), (100, 10), (7, 3), (5, 8), (0, 4), (1, 1)] {
            let ranges = partition(total, workers).unwrap();
            assert_eq!(ranges.len(), workers);

            // Contiguous and ascending: each range starts where the last ended
            let mut expected_start = 0;
            for range in &ranges {
                assert_eq!(range.start, expected_start);
                assert!(range.start <= range.end);
                expected_start = range.end;
            }
            assert_eq!(expected_start, total);

            let covered: Vec<u64> = ranges.iter().cloned().flatten().collect();
            let unique: HashSet<u64> = covered.iter().copied().collect();
            assert_eq!(covered.len() as u64, total);
            assert_eq!(unique.len() as u64, total);
        }
    }

    #[test]
    fn test_partition_spreads_remainder() {
        let ranges = partition(7, 3).unwrap();
        assert_eq!(ranges, vec![0..3, 3..5, 5..7]);
    }

    #[test]
    fn test_partition_rejects_zero_workers() {
        assert!(matches!(partition(10, 0), Err(SearchError::NoWorkers)));
    }

    #[test]
    fn test_scan_is_ascending_and_exhausts() {
        let seen = Mutex::new(Vec::new());
        let recorder = |data: &[u8]| {
            seen.lock().unwrap().push(nonce_of(data));
            [0xFF; 32]
        };
        let target = DifficultyTarget::leading_zero_bytes(1).unwrap();
        let template = BlockHeader::genesis();
        let cancel = AtomicBool::new(false);
        let assignment = SearchAssignment {
            worker: 3,
            difficulty: &target,
            nonces: 20..30,
            template: &template,
            started: Instant::now(),
            cancel: &cancel,
        };

        let report = scan(&assignment, &recorder);
        assert_eq!(report, WorkerReport::Exhausted { worker: 3, hashes: 10 });
        assert_eq!(seen.into_inner().unwrap(), (20..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_stops_when_cancelled() {
        let target = DifficultyTarget::leading_zero_bytes(1).unwrap();
        let template = BlockHeader::genesis();
        let cancel = AtomicBool::new(true);
        let assignment = SearchAssignment {
            worker: 1,
            difficulty: &target,
            nonces: 0..1_000,
            template: &template,
            started: Instant::now(),
            cancel: &cancel,
        };

        let report = scan(&assignment, &single_match(0));
        assert_eq!(report, WorkerReport::Cancelled { worker: 1, hashes: 0 });
    }

    #[test]
    fn test_scan_reports_winning_header() {
        let target = DifficultyTarget::leading_zero_bytes(2).unwrap();
        let template = BlockHeader::new([0x11; 32], 9, [0x22; 32]);
        let cancel = AtomicBool::new(false);
        let assignment = SearchAssignment {
            worker: 2,
            difficulty: &target,
            nonces: 40..50,
            template: &template,
            started: Instant::now(),
            cancel: &cancel,
        };

        match scan(&assignment, &single_match(44)) {
            WorkerReport::Found { solution, hashes } => {
                assert_eq!(solution.worker, 2);
                assert_eq!(solution.nonce, 44);
                assert_eq!(solution.header, template.with_nonce(44));
                assert_eq!(solution.hash, [0x00; 32]);
                assert_eq!(hashes, 5);
            }
            other => panic!("expected a match, got {other:?}"),
        }
        // The template itself is never touched
        assert_eq!(template.nonce, 0);
    }

    #[test]
    fn test_search_finds_single_crafted_nonce() {
        let search = NonceSearch::new(config(2, 10, &[0x00]));
        let outcome = search.run(&BlockHeader::genesis(), &single_match(7)).unwrap();

        let solution = outcome.solution().expect("nonce 7 matches");
        assert_eq!(solution.nonce, 7);
        // 7 lies in [5, 10), owned by the second worker
        assert_eq!(solution.worker, 2);
        assert_eq!(solution.hash_hex(), "00".repeat(32));
    }

    #[test]
    fn test_search_owner_for_every_position() {
        let ranges = partition(12, 4).unwrap();
        for winner in 0..12u64 {
            let search = NonceSearch::new(config(4, 12, &[0x00, 0x00]));
            let outcome = search.run(&BlockHeader::genesis(), &single_match(winner)).unwrap();
            let solution = outcome.solution().unwrap();
            assert_eq!(solution.nonce, winner);
            assert!(ranges[solution.worker - 1].contains(&winner));
        }
    }

    #[test]
    fn test_search_reports_no_solution() {
        let search = NonceSearch::new(config(4, 1_000, &[0x00]));
        let never = |_: &[u8]| [0xFF; 32];
        let outcome = search.run(&BlockHeader::genesis(), &never).unwrap();

        assert!(!outcome.is_found());
        assert_eq!(outcome.solution(), None);
        assert_eq!(outcome.hashes(), 1_000);
    }

    #[test]
    fn test_search_no_false_success_with_sha256() {
        // A full 32-byte prefix of 0xFF is out of reach for a thousand nonces
        let search = NonceSearch::new(config(3, 1_000, &[0xFF; 32]));
        let outcome = search
            .run(&BlockHeader::genesis(), &HashAlgorithm::Sha256)
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Exhausted { hashes: 1_000, .. }));
    }

    #[test]
    fn test_empty_target_wins_on_first_nonce() {
        let search = NonceSearch::new(config(1, 10, &[]));
        let outcome = search
            .run(&BlockHeader::genesis(), &HashAlgorithm::Sha256)
            .unwrap();

        let solution = outcome.solution().unwrap();
        assert_eq!(solution.worker, 1);
        assert_eq!(solution.nonce, 0);
        assert_eq!(outcome.hashes(), 1);
    }

    #[test]
    fn test_empty_target_each_worker_wins_on_its_first_nonce() {
        let ranges = partition(10, 2).unwrap();
        let search = NonceSearch::new(config(2, 10, &[]));
        let outcome = search
            .run(&BlockHeader::genesis(), &HashAlgorithm::Sha256)
            .unwrap();

        let solution = outcome.solution().unwrap();
        assert_eq!(solution.nonce, ranges[solution.worker - 1].start);
    }

    #[test]
    fn test_win_cancels_other_workers() {
        // Losing nonces are slow, so only cancellation ends the search quickly
        let slow = |data: &[u8]| {
            if nonce_of(data) == 0 {
                [0x00; 32]
            } else {
                thread::sleep(Duration::from_millis(1));
                [0xFF; 32]
            }
        };
        let total = 4_000_000;
        let search = NonceSearch::new(config(4, total, &[0x00]));
        let outcome = search.run(&BlockHeader::genesis(), &slow).unwrap();

        let solution = outcome.solution().unwrap();
        assert_eq!((solution.worker, solution.nonce), (1, 0));
        assert!(outcome.hashes() < total);
    }

    #[test]
    fn test_sha256_search_finds_valid_nonce() {
        let search = NonceSearch::new(config(4, 100_000, &[0x00]));
        let template = BlockHeader::genesis();
        let outcome = search.run(&template, &HashAlgorithm::Sha256).unwrap();

        // One zero byte shows up every 256 hashes on average
        let solution = outcome.solution().unwrap();
        let recomputed = template.with_nonce(solution.nonce).hash_with(&HashAlgorithm::Sha256);
        assert_eq!(recomputed, solution.hash);
        assert_eq!(solution.hash[0], 0x00);
    }

    #[test]
    fn test_worker_panic_aborts_search() {
        let faulty = |data: &[u8]| {
            if nonce_of(data) == 7 {
                panic!("digest failure");
            }
            [0xFF; 32]
        };
        let search = NonceSearch::new(config(2, 10, &[0x00]));
        let result = search.run(&BlockHeader::genesis(), &faulty);
        assert!(matches!(result, Err(SearchError::WorkerPanicked { worker: 2 })));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let search = NonceSearch::new(config(0, 10, &[0x00]));
        let result = search.run(&BlockHeader::genesis(), &HashAlgorithm::Sha256);
        assert!(matches!(result, Err(SearchError::NoWorkers)));
    }

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.total_nonces, DEFAULT_TOTAL_NONCES);
        assert_eq!(config.difficulty.as_bytes(), &DEFAULT_DIFFICULTY);
    }
}

//! Command-line runner for the genesis nonce miner.
//!
//! Exit status: 0 when a nonce was found, 2 when the whole range was searched
//! without a match, 1 on any error.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use miner_core::{
    parse_hash32,
    params::{DEFAULT_TOTAL_NONCES, DEFAULT_WORKERS, GENESIS_HEIGHT},
    BlockHeader, DifficultyTarget, HashAlgorithm, NonceSearch, SearchConfig,
};
use tracing::{error, info};
use tracing_subscriber::{filter::Directive, EnvFilter};

mod report;

use report::SearchReport;

const EXIT_ERROR: u8 = 1;
const EXIT_NO_SOLUTION: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "genesis-miner", about, version)]
struct Args {
    /// Required digest prefix, as hex
    #[arg(
        long,
        value_name = "HEX",
        default_value_t = SearchConfig::default().difficulty,
        value_parser = DifficultyTarget::from_hex
    )]
    difficulty: DifficultyTarget,

    /// Number of nonces to search, starting at zero
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOTAL_NONCES)]
    total: u64,

    /// Number of worker threads, 0 for one per CPU core
    #[arg(long, value_name = "N", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Height of the template block
    #[arg(long, value_name = "N", default_value_t = GENESIS_HEIGHT)]
    height: u64,

    /// Previous block hash, 64 hex characters (all zero by default)
    #[arg(long, value_name = "HEX", value_parser = parse_hash32)]
    prev_hash: Option<[u8; 32]>,

    /// Merkle root, 64 hex characters (all zero by default)
    #[arg(long, value_name = "HEX", value_parser = parse_hash32)]
    merkle_root: Option<[u8; 32]>,

    /// Hash function: sha256 or double-sha256
    #[arg(long, default_value_t = HashAlgorithm::Sha256)]
    algorithm: HashAlgorithm,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn search_config(&self) -> SearchConfig {
        let workers = match self.workers {
            0 => num_cpus::get(),
            n => n,
        };
        SearchConfig {
            workers,
            total_nonces: self.total,
            difficulty: self.difficulty.clone(),
        }
    }

    fn template(&self) -> BlockHeader {
        BlockHeader::new(
            self.prev_hash.unwrap_or_default(),
            self.height,
            self.merkle_root.unwrap_or_default(),
        )
    }
}

fn init_log(level: &str) -> Result<()> {
    let directive: Directive = level.parse().context("invalid log level")?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Run the search and print its report. Returns whether a nonce was found.
fn run(args: &Args) -> Result<bool> {
    let search = NonceSearch::new(args.search_config());
    let template = args.template();

    info!(
        height = template.height,
        algorithm = %args.algorithm,
        "Trying to find a hash of block {}...",
        template.height
    );

    let outcome = search
        .run(&template, &args.algorithm)
        .context("nonce search failed")?;

    let report = SearchReport::new(&outcome, search.config(), args.algorithm);
    if args.json {
        println!("{}", report.to_json().context("failed to encode report")?);
    } else {
        println!("{}", report.summary());
    }

    Ok(outcome.is_found())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = init_log(&args.log_level) {
        eprintln!("{err:#}");
        return ExitCode::from(EXIT_ERROR);
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_NO_SOLUTION),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

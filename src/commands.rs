//! Subcommand execution
//!
//! Each subcommand writes its results to the given writer so the binary can use
//! stdout while tests capture output in memory. Logging goes through tracing.

use std::io::{self, Write};

use chrono::Local;
use tracing::{info, warn};

use crate::cache::{FetchOutcome, RateLimitedCache};
use crate::cli::{RunArgs, ShowArgs, StatusArgs};
use crate::config::Config;
use crate::fetch::FetchError;

/// Exit status used by `run --strict` when the data is degraded
pub const DEGRADED_EXIT_CODE: u8 = 2;

/// Runs the producer behind the rate-limited cache and prints its insights
///
/// # Returns
/// * `Ok(FetchOutcome)` describing where the printed data came from
/// * `Err` only if the producer command is invalid or stdout cannot be written
pub async fn run<W: Write>(
    args: &RunArgs,
    config: &Config,
    out: &mut W,
) -> Result<FetchOutcome, Box<dyn std::error::Error>> {
    let cache = RateLimitedCache::with_dir(&config.cache_dir);
    let fetcher = args.fetcher(config)?;
    let formatter = args.format.build(args.prefix.as_deref(), Local::now());

    let (producer, insights) = (&fetcher, formatter.as_ref());
    let outcome = cache
        .fetch_with_outcome(&args.key, config.interval, move || async move {
            let raw = producer.run().await?;
            Ok::<_, FetchError>(insights.format(&raw))
        })
        .await;

    if outcome.is_degraded() {
        warn!(key = %args.key, program = fetcher.program(), %outcome, "Serving degraded data");
    } else {
        info!(key = %args.key, %outcome, "Run complete");
    }

    write_lines(out, outcome.data())?;
    Ok(outcome)
}

/// Prints the freshness of a key
pub fn status<W: Write>(args: &StatusArgs, config: &Config, out: &mut W) -> io::Result<()> {
    let cache = RateLimitedCache::with_dir(&config.cache_dir);
    let status = cache.status(&args.key, config.interval);
    writeln!(out, "{}: {}", args.key, status)
}

/// Prints the cached insights for a key, or nothing if there are none
pub fn show<W: Write>(args: &ShowArgs, config: &Config, out: &mut W) -> io::Result<()> {
    let cache = RateLimitedCache::with_dir(&config.cache_dir);
    write_lines(out, &cache.get_cached(&args.key))
}

/// Maps a run outcome to the process exit code
pub fn exit_code(outcome: &FetchOutcome, strict: bool) -> u8 {
    if strict && outcome.is_degraded() {
        DEGRADED_EXIT_CODE
    } else {
        0
    }
}

fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

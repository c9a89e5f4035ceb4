//! Runtime configuration
//!
//! Settings come from the environment (including a `.env` file loaded by the
//! binary at startup) and can be overridden by command-line flags. Credentials
//! for producers are collected here once and handed to each producer explicitly.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use thiserror::Error;

use crate::fetch::DEFAULT_TIMEOUT;

/// Overrides the lockfile directory
pub const CACHE_DIR_VAR: &str = "INSIGHTGATE_CACHE_DIR";
/// Overrides the minimum minutes between fetches
pub const INTERVAL_VAR: &str = "INSIGHTGATE_INTERVAL_MINUTES";
/// Overrides the producer timeout in seconds
pub const TIMEOUT_VAR: &str = "INSIGHTGATE_TIMEOUT_SECS";

/// Credentials forwarded to producers when set
pub const CREDENTIAL_VARS: [&str; 2] = ["GOOGLE_GENERATIVE_AI_API_KEY", "DUNE_API_KEY"];

/// Minimum minutes between fetches when nothing else is configured
pub const DEFAULT_INTERVAL_MINUTES: u64 = 30;

/// Error types for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric variable could not be parsed
    #[error("Invalid value for {var}: '{value}' (expected a non-negative integer)")]
    InvalidNumber { var: &'static str, value: String },

    /// Neither a configured nor a platform cache directory is available
    #[error("Could not determine a cache directory; set {}", CACHE_DIR_VAR)]
    NoCacheDir,
}

/// Settings shared by all subcommands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding one lockfile per key
    pub cache_dir: PathBuf,
    /// Minimum time between fetches for a key
    pub interval: Duration,
    /// Upper bound on a single producer run
    pub fetch_timeout: Duration,
    /// Environment passed to producers
    pub credentials: BTreeMap<String, String>,
}

impl Config {
    /// Reads the process environment, preferring an explicit cache directory
    ///
    /// With `cache_dir` given, no platform cache directory is required. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env_with(cache_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::resolve(|var| std::env::var(var).ok(), cache_dir)
    }

    /// Builds a config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(lookup, None)
    }

    fn resolve<F>(lookup: F, cache_dir: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_dir = cache_dir.or_else(|| {
            lookup(CACHE_DIR_VAR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        });
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => default_cache_dir().ok_or(ConfigError::NoCacheDir)?,
        };

        let interval_minutes = parse_number(&lookup, INTERVAL_VAR)?.unwrap_or(DEFAULT_INTERVAL_MINUTES);
        let fetch_timeout = parse_number(&lookup, TIMEOUT_VAR)?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let credentials = CREDENTIAL_VARS
            .iter()
            .filter_map(|&var| {
                lookup(var)
                    .filter(|value| !value.is_empty())
                    .map(|value| (var.to_string(), value))
            })
            .collect();

        Ok(Self {
            cache_dir,
            interval: minutes(interval_minutes),
            fetch_timeout,
            credentials,
        })
    }

    /// Applies command-line overrides on top of the loaded values
    pub fn with_overrides(
        mut self,
        cache_dir: Option<PathBuf>,
        interval_minutes: Option<u64>,
        timeout_secs: Option<u64>,
    ) -> Self {
        if let Some(cache_dir) = cache_dir {
            self.cache_dir = cache_dir;
        }
        if let Some(interval_minutes) = interval_minutes {
            self.interval = minutes(interval_minutes);
        }
        if let Some(timeout_secs) = timeout_secs {
            self.fetch_timeout = Duration::from_secs(timeout_secs);
        }
        self
    }
}

/// XDG cache directory, e.g. `~/.cache/insightgate`
fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "insightgate").map(|dirs| dirs.cache_dir().to_path_buf())
}

fn minutes(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(60))
}

fn parse_number<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

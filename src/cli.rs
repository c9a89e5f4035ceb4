//! Command-line interface parsing for insightgate
//!
//! This module handles parsing of CLI arguments using clap: the global cache
//! directory override and the `run`, `status` and `show` subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::config::Config;
use crate::fetch::CommandFetcher;
use crate::format::{FormatError, FormatKind};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// Cache keys name a lockfile and cannot be blank
    #[error("Cache key must not be empty")]
    EmptyKey,

    /// `run` was given no producer program
    #[error("No producer program given after --")]
    MissingProgram,
}

/// insightgate - Rate-limited, cached runs of insight producers
#[derive(Parser, Debug)]
#[command(name = "insightgate")]
#[command(about = "Rate-limited, cached runs of insight producers")]
#[command(version)]
pub struct Cli {
    /// Directory for lockfiles (defaults to INSIGHTGATE_CACHE_DIR, then the XDG cache dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a producer unless its cached output is still fresh, then print insights
    ///
    /// Examples:
    ///   insightgate run --key web3-news -- python3 gemini_web3_news.py
    ///   insightgate run --key news --format category -- ./news.sh
    Run(RunArgs),

    /// Report whether a key is due for a fresh fetch
    Status(StatusArgs),

    /// Print the cached insights for a key without fetching
    Show(ShowArgs),
}

/// Arguments for `run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Cache key naming the lockfile
    #[arg(long, value_parser = parse_key_arg)]
    pub key: String,

    /// Minimum minutes between fetches (defaults to INSIGHTGATE_INTERVAL_MINUTES or 30)
    #[arg(long, value_name = "MINUTES")]
    pub interval_minutes: Option<u64>,

    /// How to turn producer output into insights: lines, category, prefixed
    #[arg(long, default_value = "lines", value_parser = parse_format_arg)]
    pub format: FormatKind,

    /// Prefix for `--format prefixed`
    #[arg(long, value_name = "TEXT")]
    pub prefix: Option<String>,

    /// Producer timeout in seconds (defaults to INSIGHTGATE_TIMEOUT_SECS or 120)
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Exit with status 2 when serving fallback or unpersisted data
    #[arg(long)]
    pub strict: bool,

    /// Producer program and its arguments
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "PROGRAM"
    )]
    pub producer: Vec<String>,
}

/// Arguments for `status`
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Cache key naming the lockfile
    #[arg(long, value_parser = parse_key_arg)]
    pub key: String,

    /// Minimum minutes between fetches (defaults to INSIGHTGATE_INTERVAL_MINUTES or 30)
    #[arg(long, value_name = "MINUTES")]
    pub interval_minutes: Option<u64>,
}

/// Arguments for `show`
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Cache key naming the lockfile
    #[arg(long, value_parser = parse_key_arg)]
    pub key: String,
}

/// Validates a cache key argument.
///
/// # Returns
/// * `Ok(String)` with surrounding whitespace removed
/// * `Err(CliError::EmptyKey)` if nothing is left
pub fn parse_key_arg(s: &str) -> Result<String, CliError> {
    let key = s.trim();
    if key.is_empty() {
        return Err(CliError::EmptyKey);
    }
    Ok(key.to_string())
}

/// Parses a `--format` argument into a FormatKind.
pub fn parse_format_arg(s: &str) -> Result<FormatKind, FormatError> {
    s.parse()
}

impl Commands {
    /// Interval and timeout overrides carried by this subcommand
    pub fn overrides(&self) -> (Option<u64>, Option<u64>) {
        match self {
            Commands::Run(args) => (args.interval_minutes, args.timeout_secs),
            Commands::Status(args) => (args.interval_minutes, None),
            Commands::Show(_) => (None, None),
        }
    }
}

impl Cli {
    /// Merges the flags of this invocation into `config`
    pub fn apply_to(&self, config: Config) -> Config {
        let (interval_minutes, timeout_secs) = self.command.overrides();
        config.with_overrides(self.cache_dir.clone(), interval_minutes, timeout_secs)
    }
}

impl RunArgs {
    /// Builds the producer runner from the trailing command and `config`
    pub fn fetcher(&self, config: &Config) -> Result<CommandFetcher, CliError> {
        let (program, args) = self.producer.split_first().ok_or(CliError::MissingProgram)?;

        Ok(CommandFetcher::new(program.as_str())
            .args(args.iter().cloned())
            .envs(config.credentials.clone())
            .timeout(config.fetch_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("Expected run, got {:?}", other),
        }
    }

    fn test_config() -> Config {
        Config::from_lookup(|var| match var {
            "INSIGHTGATE_CACHE_DIR" => Some("/tmp/insightgate-test".to_string()),
            "DUNE_API_KEY" => Some("dune-key".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_parse_key_arg_trims() {
        assert_eq!(parse_key_arg(" web3-news ").unwrap(), "web3-news");
    }

    #[test]
    fn test_parse_key_arg_empty() {
        let err = parse_key_arg("   ").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["insightgate", "run", "--key", "news", "--", "python3", "news.py"]);
        assert!(cli.cache_dir.is_none());

        let args = run_args(cli);
        assert_eq!(args.key, "news");
        assert_eq!(args.format, FormatKind::Lines);
        assert!(args.interval_minutes.is_none());
        assert!(!args.strict);
        assert_eq!(args.producer, vec!["python3", "news.py"]);
    }

    #[test]
    fn test_cli_parse_run_with_options() {
        let cli = Cli::parse_from([
            "insightgate",
            "run",
            "--key",
            "ronin",
            "--interval-minutes",
            "45",
            "--format",
            "prefixed",
            "--prefix",
            "[Ronin]",
            "--timeout-secs",
            "10",
            "--strict",
            "--cache-dir",
            "/tmp/ig",
            "--",
            "./ronin.sh",
            "--verbose",
        ]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/ig")));

        let args = run_args(cli);
        assert_eq!(args.interval_minutes, Some(45));
        assert_eq!(args.format, FormatKind::Prefixed);
        assert_eq!(args.prefix.as_deref(), Some("[Ronin]"));
        assert_eq!(args.timeout_secs, Some(10));
        assert!(args.strict);
        assert_eq!(args.producer, vec!["./ronin.sh", "--verbose"]);
    }

    #[test]
    fn test_cli_run_requires_producer() {
        let result = Cli::try_parse_from(["insightgate", "run", "--key", "news"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_format() {
        let result = Cli::try_parse_from([
            "insightgate", "run", "--key", "news", "--format", "html", "--", "true",
        ]);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Unknown format"));
    }

    #[test]
    fn test_cli_rejects_empty_key() {
        let result = Cli::try_parse_from(["insightgate", "show", "--key", ""]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_status_and_show() {
        let cli = Cli::parse_from(["insightgate", "status", "--key", "news", "--interval-minutes", "5"]);
        assert_eq!(cli.command.overrides(), (Some(5), None));

        let cli = Cli::parse_from(["insightgate", "--cache-dir", "/tmp/ig", "show", "--key", "news"]);
        assert!(matches!(cli.command, Commands::Show(ShowArgs { ref key }) if key == "news"));
        assert_eq!(cli.command.overrides(), (None, None));
    }

    #[test]
    fn test_apply_to_overrides_config() {
        let cli = Cli::parse_from([
            "insightgate",
            "--cache-dir",
            "/tmp/other",
            "run",
            "--key",
            "news",
            "--interval-minutes",
            "1",
            "--",
            "true",
        ]);
        let config = cli.apply_to(test_config());

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/other"));
        assert_eq!(config.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_fetcher_splits_program_from_args() {
        let cli = Cli::parse_from(["insightgate", "run", "--key", "news", "--", "./news.sh", "--fast"]);
        let config = test_config();
        let fetcher = run_args(cli).fetcher(&config).unwrap();

        assert_eq!(fetcher.program(), "./news.sh");
    }
}

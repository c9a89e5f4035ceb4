//! External producer runner
//!
//! Insights come from producer programs (typically scripts that call an LLM or
//! an analytics API). `CommandFetcher` runs one, waits for it, and hands back its
//! stdout. It is the fetch function the CLI places behind the rate-limited cache.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default upper bound on a single producer run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur while running a producer
#[derive(Debug, Error)]
pub enum FetchError {
    /// The program could not be started
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the program or reading its output failed
    #[error("I/O error while running producer: {0}")]
    Io(#[from] std::io::Error),

    /// The program exited unsuccessfully
    #[error("Producer exited with {}: {stderr}", describe_exit(.code))]
    ExitStatus { code: Option<i32>, stderr: String },

    /// The program did not finish in time and was killed
    #[error("Producer timed out after {0:?}")]
    Timeout(Duration),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

/// Runs a producer program and captures its stdout
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: String,
    args: Vec<String>,
    envs: BTreeMap<String, String>,
    timeout: Duration,
}

impl CommandFetcher {
    /// Creates a fetcher for `program` with the default timeout
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Appends arguments passed to the program
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds variables to the program's environment
    ///
    /// Credentials reach producers this way rather than through ambient state.
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the maximum run time
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program name, for logging
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs the program to completion and returns its stdout
    ///
    /// # Returns
    /// * `Ok(String)` - stdout, decoded lossily, if the program exited with 0
    /// * `Err(FetchError)` - if it could not start, failed, or timed out
    pub async fn run(&self) -> Result<String, FetchError> {
        debug!(program = %self.program, args = ?self.args, "Running producer");

        let child = Command::new(&self.program)
            .args(&self.args)
            .envs(&self.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the timed-out future drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(FetchError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandFetcher {
        CommandFetcher::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = sh("printf 'a\\nb\\n'").run().await.unwrap();
        assert_eq!(output, "a\nb\n");
    }

    #[tokio::test]
    async fn test_run_passes_environment() {
        let output = sh("printf '%s' \"$INSIGHTGATE_TEST_KEY\"")
            .envs([("INSIGHTGATE_TEST_KEY", "secret")])
            .run()
            .await
            .unwrap();
        assert_eq!(output, "secret");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let err = sh("echo 'quota exceeded' >&2; exit 3").run().await.unwrap_err();

        match &err {
            FetchError::ExitStatus { code, stderr } => {
                assert_eq!(*code, Some(3));
                assert_eq!(stderr, "quota exceeded");
            }
            other => panic!("Expected ExitStatus, got {:?}", other),
        }
        assert!(err.to_string().contains("code 3"));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = CommandFetcher::new("insightgate-definitely-missing-program")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_slow_program_times_out() {
        let err = sh("sleep 5")
            .timeout(Duration::from_millis(100))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }
}

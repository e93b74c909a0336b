//! Config for the battle behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive, set the value to `"true"` to enable one.
//!
//! - `BATTLE_VERBOSE`: Print match progress to stdout (default: `true`)
//! - `BATTLE_LOG`: Enable logging to a file (default: `false`)
//! - `BATTLE_DEBUG_ENGINE_STDERR`: Forward engine stderr to the log (default: `false`)
//! - `BATTLE_ACCEPT_WIN`: Accept `bestmove win` declarations (default: `false`)
//! - `BATTLE_RESPONSE_TIMEOUT_MS`: Deadline for one engine response, `0` disables it (default: `60000`)
//! - `BATTLE_RESULT_LOG`: Path of the result log (default: `battle_log.csv`)
//! - `BATTLE_ROW_CAP`: Number of rows after which scheduling stops (default: `1000`)
//! - `BATTLE_REPETITIONS`: Matches per pairing (default: `100`)
//! - `BATTLE_MATCH_BUDGET`: Maximum number of matches started in a run (default: unlimited)
//! - `BATTLE_WRITE_ATTEMPTS`: Result log write attempts (default: `5`)
//! - `BATTLE_WRITE_RETRY_DELAY_MS`: Delay between write attempts (default: `3000`)

use std::{env, path::PathBuf, time::Duration};

use crate::retry::RetryPolicy;

/// Configuration for battle behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) debug_engine_stderr: bool,
    pub(crate) accept_win_declaration: bool,
    pub(crate) response_timeout: Option<Duration>,
    pub(crate) result_log: PathBuf,
    pub(crate) row_cap: usize,
    pub(crate) repetitions: usize,
    pub(crate) match_budget: Option<usize>,
    pub(crate) write_retry: RetryPolicy,
}

impl Configuration {
    /// Default number of rows after which no new match is started.
    pub const DEFAULT_ROW_CAP: usize = 1000;

    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Match progress is printed to stdout.
    /// - Logging to file is disabled.
    /// - Engine stderr is discarded.
    /// - `bestmove win` is treated as an ordinary move token.
    /// - An engine has 60 seconds to answer any command.
    /// - Results go to `battle_log.csv`, capped at 1000 rows.
    /// - Each pairing plays 100 matches, with no overall budget.
    /// - Writes are attempted 5 times, 3 seconds apart.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            debug_engine_stderr: false,
            accept_win_declaration: false,
            response_timeout: Some(Duration::from_secs(60)),
            result_log: PathBuf::from("battle_log.csv"),
            row_cap: Self::DEFAULT_ROW_CAP,
            repetitions: 100,
            match_budget: None,
            write_retry: RetryPolicy::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their default value (see module documentation).
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn parse_usize(var: &str) -> Option<usize> {
            env::var(var).ok()?.trim().parse().ok()
        }

        fn parse_millis(var: &str) -> Option<Duration> {
            env::var(var)
                .ok()?
                .trim()
                .parse::<u64>()
                .ok()
                .map(Duration::from_millis)
        }

        let default = Self::new();
        let response_timeout = parse_millis("BATTLE_RESPONSE_TIMEOUT_MS")
            .map_or(default.response_timeout, |d| Some(d).filter(|d| !d.is_zero()));
        let write_retry = RetryPolicy::new(
            parse_usize("BATTLE_WRITE_ATTEMPTS").unwrap_or(default.write_retry.max_attempts()),
            parse_millis("BATTLE_WRITE_RETRY_DELAY_MS").unwrap_or(default.write_retry.delay()),
        );

        Self {
            verbose: get_env_flag("BATTLE_VERBOSE", default.verbose),
            log: get_env_flag("BATTLE_LOG", default.log),
            debug_engine_stderr: get_env_flag(
                "BATTLE_DEBUG_ENGINE_STDERR",
                default.debug_engine_stderr,
            ),
            accept_win_declaration: get_env_flag(
                "BATTLE_ACCEPT_WIN",
                default.accept_win_declaration,
            ),
            response_timeout,
            result_log: env::var_os("BATTLE_RESULT_LOG")
                .map(PathBuf::from)
                .unwrap_or(default.result_log),
            row_cap: parse_usize("BATTLE_ROW_CAP").unwrap_or(default.row_cap),
            repetitions: parse_usize("BATTLE_REPETITIONS").unwrap_or(default.repetitions),
            match_budget: parse_usize("BATTLE_MATCH_BUDGET"),
            write_retry,
        }
    }

    /// Enable or disable progress output on stdout.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable engine stderr forwarding (debug purposes only).
    pub fn with_debug_engine_stderr(mut self, value: bool) -> Self {
        self.debug_engine_stderr = value;
        self
    }

    /// Treat `bestmove win` as a declared win for the engine to move.
    pub fn with_accept_win_declaration(mut self, value: bool) -> Self {
        self.accept_win_declaration = value;
        self
    }

    /// Deadline for a single engine response. `None` or a zero duration waits forever.
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Path of the CSV result log.
    pub fn with_result_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_log = path.into();
        self
    }

    /// Number of rows after which no new match is started.
    pub fn with_row_cap(mut self, cap: usize) -> Self {
        self.row_cap = cap;
        self
    }

    /// Number of matches played by each pairing.
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Maximum number of matches started in one run.
    pub fn with_match_budget(mut self, budget: Option<usize>) -> Self {
        self.match_budget = budget;
        self
    }

    /// Retry policy applied to result log writes.
    pub fn with_write_retry(mut self, policy: RetryPolicy) -> Self {
        self.write_retry = policy;
        self
    }

    /// See [`with_response_timeout`](Self::with_response_timeout).
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    /// See [`with_result_log`](Self::with_result_log).
    pub fn result_log(&self) -> &std::path::Path {
        &self.result_log
    }

    /// See [`with_row_cap`](Self::with_row_cap).
    pub fn row_cap(&self) -> usize {
        self.row_cap
    }

    /// See [`with_repetitions`](Self::with_repetitions).
    pub fn repetitions(&self) -> usize {
        self.repetitions
    }

    /// See [`with_match_budget`](Self::with_match_budget).
    pub fn match_budget(&self) -> Option<usize> {
        self.match_budget
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod configuration_tests {
    use super::*;

    #[test]
    fn defaults_follow_reference_values() {
        let config = Configuration::new();
        assert_eq!(config.row_cap(), 1000);
        assert_eq!(config.write_retry.max_attempts(), 5);
        assert_eq!(config.write_retry.delay(), Duration::from_secs(3));
        assert_eq!(config.match_budget(), None);
        assert!(!config.accept_win_declaration);
    }

    #[test]
    fn builder_overrides() {
        let config = Configuration::new()
            .with_row_cap(3)
            .with_repetitions(4)
            .with_match_budget(Some(7))
            .with_response_timeout(None)
            .with_result_log("/tmp/somewhere.csv");
        assert_eq!(config.row_cap(), 3);
        assert_eq!(config.repetitions(), 4);
        assert_eq!(config.match_budget(), Some(7));
        assert_eq!(config.response_timeout(), None);
        assert_eq!(config.result_log(), std::path::Path::new("/tmp/somewhere.csv"));
    }

    #[test]
    fn zero_timeout_disables_the_deadline() {
        let config = Configuration::new().with_response_timeout(Some(Duration::ZERO));
        assert_eq!(config.response_timeout(), None);
        let config = config.with_response_timeout(Some(Duration::from_millis(5)));
        assert_eq!(config.response_timeout(), Some(Duration::from_millis(5)));
    }
}

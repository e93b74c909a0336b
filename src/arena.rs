//! Top-level battle orchestration.
//!
//! An [`Arena`] collects engine executables from a directory, pairs them with a
//! [`PairingStrategy`], and plays every pairing through a [`MatchScheduler`], appending
//! decided matches to the CSV result log named by the [`Configuration`].
//!
//! # Example
//!
//! ```no_run
//! use engine_battle::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new()
//!         .with_repetitions(10)
//!         .with_result_log("battle_log.csv");
//!     let summary = Arena::new(config).battle("../engines/", FamilyGauntlet::default())?;
//!     println!("{} matches recorded ({})", summary.recorded, summary.stop_reason);
//!     Ok(())
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use tracing::{info, trace, warn};

use crate::configuration::Configuration;
use crate::engine_collector::collect_engines;
use crate::engine_handle::ProcessLauncher;
use crate::logger::init_logger;
use crate::pairing::{Pairing, PairingStrategy};
use crate::referee::MatchReferee;
use crate::result_store::{CsvResultLog, ResultStore};
use crate::scheduler::{MatchScheduler, RunSummary, StopReason};

/// Runs battles between engine processes.
pub struct Arena {
    config: Configuration,
}

impl Arena {
    /// Create an [`Arena`]. Starts file logging in the current directory if configured.
    pub fn new(config: Configuration) -> Arena {
        if config.log {
            if let Err(e) = init_logger(Path::new(".")) {
                eprintln!("logging disabled: {e:#}");
            }
        }
        trace!(?config);
        Arena { config }
    }

    /// Collect the engines of `directory`, pair them with `strategy` and play every pairing.
    ///
    /// # Errors
    /// Returns an error if the directory is invalid, the result log cannot be opened, or a
    /// result could not be recorded.
    pub fn battle<S: PairingStrategy>(
        &self,
        directory: impl AsRef<Path>,
        strategy: S,
    ) -> anyhow::Result<RunSummary> {
        let engines = collect_engines(directory.as_ref(), self.config.verbose)?;
        info!(engines = ?engines.iter().map(|e| &e.name).collect::<Vec<_>>());

        let pairings = strategy.pairings(&engines);
        if pairings.is_empty() {
            warn!("no pairing to play");
        }
        self.run(&pairings)
    }

    /// Play every pairing `repetitions` times.
    pub fn run(&self, pairings: &[Pairing]) -> anyhow::Result<RunSummary> {
        let log = CsvResultLog::open(&self.config.result_log).with_context(|| {
            format!(
                "could not open result log '{}'",
                self.config.result_log.display()
            )
        })?;
        let mut store = ResultStore::new(log, self.config.row_cap, self.config.write_retry);
        let launcher =
            ProcessLauncher::new(self.config.response_timeout, self.config.debug_engine_stderr);
        let referee = MatchReferee::new(&launcher)
            .with_accept_win_declaration(self.config.accept_win_declaration);

        let summary = MatchScheduler::new(referee, &mut store, self.config.repetitions)
            .with_match_budget(self.config.match_budget)
            .with_verbose(self.config.verbose)
            .run(pairings)
            .context("result log unavailable, stopping")?;

        info!(?summary);
        if self.config.verbose {
            match store.row_count() {
                Ok(rows) => print_summary(&summary, rows),
                Err(e) => warn!("could not read the result log back: {e}"),
            }
        }
        Ok(summary)
    }
}

fn print_summary(summary: &RunSummary, rows: usize) {
    let colour = match summary.stop_reason {
        StopReason::CapReached | StopReason::BudgetExhausted => "\x1b[33m",
        StopReason::Exhausted => "\x1b[32m",
    };
    println!("{colour}Done: {}\x1b[39m", summary.stop_reason);
    println!(
        "{} started, {} recorded ({rows} rows in log), {} illegal, {} handshake failures, {} engine errors",
        summary.started,
        summary.recorded,
        summary.illegal_moves,
        summary.handshake_failures,
        summary.engine_errors
    );
    let mut wins = summary.wins.iter().collect::<Vec<_>>();
    wins.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (name, count) in wins {
        println!("{name}: {count}");
    }
}

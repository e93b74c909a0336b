use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::engine_handle::{EngineError, EngineLauncher};
use crate::pairing::Pairing;
use crate::referee::{MatchReferee, MatchReport, TerminalOutcome};
use crate::result_store::{AppendStatus, PersistenceError, ResultLog, ResultRecord, ResultStore};

/// Seats for the `match_index`-th match of `pairing`: `(first, second)`.
///
/// `pairing.a` moves first on even indices, `pairing.b` on odd ones.
pub fn seating(pairing: &Pairing, match_index: usize) -> (Arc<Engine>, Arc<Engine>) {
    if match_index % 2 == 0 {
        (pairing.a.clone(), pairing.b.clone())
    } else {
        (pairing.b.clone(), pairing.a.clone())
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every pairing played all its matches.
    Exhausted,
    /// The result log reached its row cap.
    CapReached,
    /// The configured number of matches was started.
    BudgetExhausted,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Exhausted => "all pairings played",
            StopReason::CapReached => "result log cap reached",
            StopReason::BudgetExhausted => "match budget exhausted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub started: usize,
    pub recorded: usize,
    pub illegal_moves: usize,
    pub handshake_failures: usize,
    pub engine_errors: usize,
    /// Recorded wins per engine name during this run.
    pub wins: HashMap<String, usize>,
    pub stop_reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            started: 0,
            recorded: 0,
            illegal_moves: 0,
            handshake_failures: 0,
            engine_errors: 0,
            wins: HashMap::new(),
            stop_reason: StopReason::Exhausted,
        }
    }
}

/// Plays the matches of a list of pairings one after the other and records the decided ones.
pub struct MatchScheduler<'a, L: EngineLauncher, R: ResultLog> {
    referee: MatchReferee<'a, L>,
    store: &'a mut ResultStore<R>,
    repetitions: usize,
    match_budget: Option<usize>,
    verbose: bool,
}

impl<'a, L: EngineLauncher, R: ResultLog> MatchScheduler<'a, L, R> {
    pub fn new(
        referee: MatchReferee<'a, L>,
        store: &'a mut ResultStore<R>,
        repetitions: usize,
    ) -> Self {
        Self {
            referee,
            store,
            repetitions,
            match_budget: None,
            verbose: false,
        }
    }

    /// Stop after `budget` matches were started.
    pub fn with_match_budget(mut self, budget: Option<usize>) -> Self {
        self.match_budget = budget;
        self
    }

    /// Print each match result on stdout.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Play every pairing `repetitions` times.
    ///
    /// Per-match failures are logged and skipped.
    ///
    /// The log is shared with other writers, so its row count is read again before every
    /// match.
    ///
    /// # Errors
    /// A result could not be recorded or the log could not be read. Nothing is played after
    /// that.
    pub fn run(&mut self, pairings: &[Pairing]) -> Result<RunSummary, PersistenceError> {
        let mut summary = RunSummary::new();

        for pairing in pairings {
            for match_index in 0..self.repetitions {
                if self.store.is_full()? {
                    info!("result log holds {} rows or more, stopping", self.store.cap());
                    summary.stop_reason = StopReason::CapReached;
                    return Ok(summary);
                }
                if self.match_budget.is_some_and(|b| summary.started >= b) {
                    info!("match budget of {} reached", summary.started);
                    summary.stop_reason = StopReason::BudgetExhausted;
                    return Ok(summary);
                }

                let (first, second) = seating(pairing, match_index);
                summary.started += 1;
                info!(
                    "Game {}: {} vs {} start ({pairing} #{match_index})",
                    summary.started, first.name, second.name
                );
                if self.verbose {
                    print_running_match(summary.started, &first, &second);
                }

                let result = self.referee.run(first, second);
                if self.verbose {
                    print_match_result(summary.started, &result);
                }

                if self.on_result(result, &mut summary)? == Some(StopReason::CapReached) {
                    summary.stop_reason = StopReason::CapReached;
                    return Ok(summary);
                }
            }
        }

        Ok(summary)
    }

    fn on_result(
        &mut self,
        result: Result<MatchReport, EngineError>,
        summary: &mut RunSummary,
    ) -> Result<Option<StopReason>, PersistenceError> {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!("match aborted: {e}");
                summary.engine_errors += 1;
                return Ok(None);
            }
        };

        match &report.outcome {
            TerminalOutcome::IllegalMove { .. } => {
                warn!("Illegal move, match not recorded: {}", report.outcome);
                summary.illegal_moves += 1;
                return Ok(None);
            }
            TerminalOutcome::HandshakeFailed { .. } => {
                warn!("{}, match not recorded", report.outcome);
                summary.handshake_failures += 1;
                return Ok(None);
            }
            TerminalOutcome::Resigned(_) | TerminalOutcome::Completed { .. } => {}
        }

        let Some(record) = ResultRecord::from_report(&report) else {
            return Ok(None);
        };
        let status = self.store.append(&record).inspect_err(|e| {
            error!("stopping: {e}");
        })?;
        if let AppendStatus::Rejected { rows } = status {
            warn!("result log filled up by another writer ({rows} rows), match not recorded");
            return Ok(Some(StopReason::CapReached));
        }
        summary.recorded += 1;
        *summary.wins.entry(record.winner).or_default() += 1;

        match status {
            AppendStatus::CapReached { rows } => {
                info!("stopping: result log holds {rows} rows");
                Ok(Some(StopReason::CapReached))
            }
            AppendStatus::Recorded { .. } | AppendStatus::Rejected { .. } => Ok(None),
        }
    }
}

fn print_running_match(number: usize, first: &Engine, second: &Engine) {
    // clear, green, default, start of line
    print!(
        "\x1b[2K\x1b[32mGame {number}:\x1b[39m {} VS {}...\x1b[0G",
        first.name, second.name
    );
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

fn print_match_result(number: usize, result: &Result<MatchReport, EngineError>) {
    match result {
        Ok(report) => {
            let winner = report
                .winner()
                .map(|w| w.name.as_str())
                .unwrap_or("nobody");
            // clear line, green match, result, start of line
            println!(
                "\x1b[2K\x1b[32mGame {number}: {} VS {}: \x1b[39m{} after {} turns, winner: {winner}\x1b[0G",
                report.engines[0].name, report.engines[1].name, report.outcome, report.turns
            );
        }
        Err(e) => {
            println!("\x1b[2K\x1b[32mGame {number}: \x1b[31m{e}\x1b[39m\x1b[0G");
        }
    }
}

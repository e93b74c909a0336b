//! # Engine Battle
//!
//! A referee for game-playing engines running as separate OS processes.
//!
//! It provides:
//! - Engine process management over a line protocol ([`engine_handle`])
//! - A match referee enforcing turn alternation and detecting resignation or illegal
//!   output ([`referee`])
//! - A CSV result log with write retries and a row cap ([`result_store`])
//! - Pairing strategies and a sequential scheduler alternating who moves first
//!   ([`pairing`], [`scheduler`])
//!
//! The referee knows nothing about the game itself: rules, move legality and move choice
//! all live inside the engines.
//!
//! # Engine Requirements
//!
//! Engines read commands on stdin and write responses on stdout, one per line:
//!  * `isready` -> a line containing `readyok`
//!  * `go` -> `bestmove <move>`, or `bestmove resign` to concede
//!  * `position <move>` -> a line containing `ok`, after the opponent played `<move>`
//!
//! A minimal engine that always resigns:
//!
//! ```sh
//! #!/bin/sh
//! while read -r cmd _; do
//!   case "$cmd" in
//!     isready) echo readyok ;;
//!     go) echo "bestmove resign" ;;
//!     position) echo ok ;;
//!   esac
//! done
//! ```
//!
//! See [`arena`] for running a full battle.

pub mod arena;
pub mod configuration;
pub mod engine;
mod engine_collector;
pub mod engine_handle;
mod logger;
pub mod pairing;
pub mod referee;
pub mod result_store;
pub mod retry;
pub mod scheduler;
#[cfg(test)]
mod testing;

pub use anyhow;
pub use engine_collector::collect_engines;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use engine_battle::prelude::*;
/// ```
pub mod prelude {
    pub use crate::arena::Arena;
    pub use crate::configuration::Configuration;
    pub use crate::engine::{Engine, Family};
    pub use crate::pairing::{FamilyGauntlet, Pairing, PairingStrategy, RoundRobin};
    pub use crate::referee::{MatchReferee, MatchReport, Seat, TerminalOutcome};
    pub use crate::result_store::{CsvResultLog, ResultRecord, ResultStore};
    pub use crate::scheduler::{RunSummary, StopReason};
}

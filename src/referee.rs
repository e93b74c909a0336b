//! One match between two engines.
//!
//! The referee launches both engines, checks they are ready, then asks them for a move in
//! turn, forwarding every move to the opponent. A match ends when an engine resigns (or
//! declares a win, when accepted) or answers `go` with something that is not a
//! `bestmove <token>` line.
//!
//! Both engines are closed before [`MatchReferee::run`] returns, whatever the outcome.

use std::{fmt::Display, sync::Arc, time::Duration, time::Instant};

use tracing::{error, info, instrument, trace, warn};

use crate::engine::Engine;
use crate::engine_handle::{EngineConnection, EngineError, EngineLauncher};

/// Playing role in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    pub fn opponent(self) -> Seat {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }

    fn index(self) -> usize {
        match self {
            Seat::First => 0,
            Seat::Second => 1,
        }
    }
}

impl Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Seat::First => write!(f, "first"),
            Seat::Second => write!(f, "second"),
        }
    }
}

/// How a match ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// `seat` answered `bestmove resign`, its opponent wins.
    Resigned(Seat),
    /// `winner` declared a win with `bestmove win`.
    Completed { winner: Seat },
    /// `seat` answered `go` with something else than `bestmove <token>`.
    IllegalMove { seat: Seat, response: String },
    /// `seat` did not answer `isready` with `readyok`.
    HandshakeFailed { seat: Seat, reason: String },
}

impl TerminalOutcome {
    pub fn winner(&self) -> Option<Seat> {
        match self {
            TerminalOutcome::Resigned(seat) => Some(seat.opponent()),
            TerminalOutcome::Completed { winner } => Some(*winner),
            TerminalOutcome::IllegalMove { .. } | TerminalOutcome::HandshakeFailed { .. } => None,
        }
    }
}

impl Display for TerminalOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalOutcome::Resigned(seat) => write!(f, "{seat} resigned"),
            TerminalOutcome::Completed { winner } => write!(f, "{winner} declared a win"),
            TerminalOutcome::IllegalMove { seat, response } => {
                write!(f, "illegal move from {seat}: '{response}'")
            }
            TerminalOutcome::HandshakeFailed { seat, reason } => {
                write!(f, "handshake failed for {seat}: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub seat: Seat,
    pub token: String,
    pub elapsed: Duration,
}

/// Everything the referee knows once a match is over.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub engines: [Arc<Engine>; 2],
    pub outcome: TerminalOutcome,
    /// Cumulative time spent in `go` per seat.
    pub thinking_time: [Duration; 2],
    /// Number of `go` commands issued.
    pub turns: u32,
    pub moves: Vec<PlayedMove>,
}

impl MatchReport {
    pub fn engine(&self, seat: Seat) -> &Arc<Engine> {
        &self.engines[seat.index()]
    }

    pub fn thinking_time(&self, seat: Seat) -> Duration {
        self.thinking_time[seat.index()]
    }

    pub fn winner(&self) -> Option<&Arc<Engine>> {
        self.outcome.winner().map(|seat| self.engine(seat))
    }
}

/// Extract `<token>` from a `bestmove <token> ...` line.
pub fn parse_bestmove(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("bestmove")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest.split_whitespace().next()
}

/// Both connections of a running match, closed when dropped.
struct Seats<C: EngineConnection> {
    connections: [C; 2],
    names: [String; 2],
}

impl<C: EngineConnection> Seats<C> {
    fn get(&mut self, seat: Seat) -> &mut C {
        &mut self.connections[seat.index()]
    }
}

impl<C: EngineConnection> Drop for Seats<C> {
    fn drop(&mut self) {
        for (connection, name) in self.connections.iter_mut().zip(&self.names) {
            if let Err(e) = connection.close() {
                error!("could not release {name}: {e}");
            }
        }
    }
}

/// Runs single matches with engines obtained from a launcher.
pub struct MatchReferee<'a, L: EngineLauncher> {
    launcher: &'a L,
    accept_win_declaration: bool,
}

impl<'a, L: EngineLauncher> MatchReferee<'a, L> {
    pub fn new(launcher: &'a L) -> Self {
        Self {
            launcher,
            accept_win_declaration: false,
        }
    }

    /// Treat `bestmove win` as a declared win instead of a move.
    pub fn with_accept_win_declaration(mut self, value: bool) -> Self {
        self.accept_win_declaration = value;
        self
    }

    /// Play one match, `first` moving first.
    ///
    /// # Errors
    /// An engine could not be launched, closed its output mid-game, or did not answer in
    /// time. A failed handshake is an outcome, not an error.
    #[instrument(skip_all, fields(first = %first.name, second = %second.name))]
    pub fn run(
        &self,
        first: Arc<Engine>,
        second: Arc<Engine>,
    ) -> Result<MatchReport, EngineError> {
        let first_connection = self.launcher.launch(&first)?;
        let second_connection = match self.launcher.launch(&second) {
            Ok(connection) => connection,
            Err(e) => {
                let mut first_connection = first_connection;
                if let Err(close_error) = first_connection.close() {
                    error!("could not release {first}: {close_error}");
                }
                return Err(e);
            }
        };
        let mut seats = Seats {
            connections: [first_connection, second_connection],
            names: [first.name.clone(), second.name.clone()],
        };

        let mut report = MatchReport {
            engines: [first, second],
            outcome: TerminalOutcome::Resigned(Seat::First),
            thinking_time: [Duration::ZERO; 2],
            turns: 0,
            moves: vec![],
        };
        let played = self.play(&mut seats, &mut report);
        drop(seats);

        report.outcome = played?;
        info!(
            outcome = %report.outcome,
            turns = report.turns,
            "match over"
        );
        Ok(report)
    }

    fn play(
        &self,
        seats: &mut Seats<L::Connection>,
        report: &mut MatchReport,
    ) -> Result<TerminalOutcome, EngineError> {
        for seat in [Seat::First, Seat::Second] {
            let reason = match seats.get(seat).send("isready") {
                Ok(response) if response.contains("readyok") => continue,
                Ok(response) => format!("unexpected response '{response}'"),
                Err(e) => e.to_string(),
            };
            warn!("{} failed handshake: {reason}", report.engine(seat));
            return Ok(TerminalOutcome::HandshakeFailed { seat, reason });
        }

        let mut to_move = Seat::First;
        loop {
            report.turns += 1;
            let start = Instant::now();
            let response = seats.get(to_move).send("go");
            let elapsed = start.elapsed();
            report.thinking_time[to_move.index()] += elapsed;
            let response = response?;
            trace!(turn = report.turns, seat = %to_move, "{response}");

            let Some(token) = parse_bestmove(&response) else {
                warn!("{} played an illegal move: '{response}'", report.engine(to_move));
                return Ok(TerminalOutcome::IllegalMove {
                    seat: to_move,
                    response,
                });
            };
            if token == "resign" {
                info!("{} resigned", report.engine(to_move));
                return Ok(TerminalOutcome::Resigned(to_move));
            }
            if self.accept_win_declaration && token == "win" {
                info!("{} declared a win", report.engine(to_move));
                return Ok(TerminalOutcome::Completed { winner: to_move });
            }

            report.moves.push(PlayedMove {
                seat: to_move,
                token: token.to_owned(),
                elapsed,
            });
            seats
                .get(to_move.opponent())
                .send(&format!("position {token}"))?;
            to_move = to_move.opponent();
        }
    }
}

#[cfg(test)]
mod referee_tests {
    use super::*;
    use crate::testing::{Script, ScriptedLauncher};

    fn run(
        launcher: &ScriptedLauncher,
        first: &str,
        second: &str,
    ) -> Result<MatchReport, EngineError> {
        MatchReferee::new(launcher).run(
            ScriptedLauncher::engine(first),
            ScriptedLauncher::engine(second),
        )
    }

    #[test]
    fn parses_bestmove_lines() {
        assert_eq!(parse_bestmove("bestmove 7g7f"), Some("7g7f"));
        assert_eq!(parse_bestmove("bestmove resign"), Some("resign"));
        assert_eq!(parse_bestmove("bestmove  e2e4 ponder e7e5"), Some("e2e4"));
        assert_eq!(parse_bestmove("notamove"), None);
        assert_eq!(parse_bestmove("bestmove"), None);
        assert_eq!(parse_bestmove("bestmoves e2e4"), None);
        assert_eq!(parse_bestmove("info bestmove e2e4"), None);
    }

    #[test]
    fn opponent_is_an_involution() {
        assert_eq!(Seat::First.opponent(), Seat::Second);
        assert_eq!(Seat::Second.opponent(), Seat::First);
        assert_eq!(Seat::First.opponent().opponent(), Seat::First);
    }

    #[test]
    fn immediate_resignation() {
        let launcher = ScriptedLauncher::new()
            .with("a", Script::Plays(vec!["bestmove resign"]))
            .with("b", Script::Plays(vec!["bestmove e2e4"]));
        let report = run(&launcher, "a", "b").unwrap();
        assert_eq!(report.outcome, TerminalOutcome::Resigned(Seat::First));
        assert_eq!(report.winner().unwrap().name, "b");
        assert_eq!(report.turns, 1);
        assert!(report.moves.is_empty());
        assert_eq!(launcher.closes(), 2);
    }

    #[test]
    fn moves_are_forwarded_to_the_opponent() {
        let launcher = ScriptedLauncher::new()
            .with("a", Script::Plays(vec!["bestmove 7g7f", "bestmove resign"]))
            .with("b", Script::Plays(vec!["bestmove 3c3d"]));
        let report = run(&launcher, "a", "b").unwrap();

        assert_eq!(report.outcome, TerminalOutcome::Resigned(Seat::First));
        assert_eq!(report.turns, 3);
        let tokens = report.moves.iter().map(|m| m.token.as_str()).collect::<Vec<_>>();
        assert_eq!(tokens, ["7g7f", "3c3d"]);

        let journal = launcher.journal.borrow();
        let commands = journal
            .commands
            .iter()
            .map(|(e, c)| format!("{e}:{c}"))
            .collect::<Vec<_>>();
        assert_eq!(
            commands,
            [
                "a:isready",
                "b:isready",
                "a:go",
                "b:position 7g7f",
                "b:go",
                "a:position 3c3d",
                "a:go"
            ]
        );
    }

    #[test]
    fn thinking_time_adds_up_per_seat() {
        let launcher = ScriptedLauncher::new()
            .with("a", Script::Plays(vec!["bestmove 1", "bestmove 2", "bestmove resign"]))
            .with("b", Script::Plays(vec!["bestmove x"]));
        let report = run(&launcher, "a", "b").unwrap();
        for seat in [Seat::First, Seat::Second] {
            let played: Duration = report
                .moves
                .iter()
                .filter(|m| m.seat == seat)
                .map(|m| m.elapsed)
                .sum();
            assert!(report.thinking_time(seat) >= played);
        }
    }

    #[test]
    fn illegal_move_has_no_winner() {
        let launcher = ScriptedLauncher::new()
            .with("c", Script::Plays(vec!["notamove ok"]))
            .with("b", Script::Plays(vec!["bestmove e2e4"]));
        let report = run(&launcher, "c", "b").unwrap();
        assert!(matches!(
            report.outcome,
            TerminalOutcome::IllegalMove { seat: Seat::First, .. }
        ));
        assert!(report.winner().is_none());
        assert_eq!(launcher.closes(), 2);
    }

    #[test]
    fn silent_engine_aborts_the_match() {
        let launcher = ScriptedLauncher::new()
            .with("s", Script::Plays(vec!["notamove"]))
            .with("b", Script::Plays(vec!["bestmove e2e4"]));
        let err = run(&launcher, "s", "b").unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }), "{err}");
        assert_eq!(launcher.closes(), 2);
    }

    #[test]
    fn dead_engine_fails_handshake() {
        let launcher = ScriptedLauncher::new()
            .with("a", Script::Plays(vec!["bestmove resign"]))
            .with("d", Script::DiesOnHandshake);
        let report = run(&launcher, "a", "d").unwrap();
        assert!(matches!(
            report.outcome,
            TerminalOutcome::HandshakeFailed { seat: Seat::Second, .. }
        ));
        assert_eq!(report.turns, 0);
        assert_eq!(launcher.closes(), 2);
    }

    #[test]
    fn failed_launch_releases_the_other_engine() {
        let launcher = ScriptedLauncher::new().with("x", Script::Unlaunchable);
        let err = run(&launcher, "a", "x").unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
    }

    #[test]
    fn win_declaration_is_opt_in() {
        let launcher = ScriptedLauncher::new()
            .with("a", Script::Plays(vec!["bestmove win"]))
            .with("b", Script::Plays(vec!["bestmove resign"]));

        let report = run(&launcher, "a", "b").unwrap();
        assert_eq!(report.outcome, TerminalOutcome::Resigned(Seat::Second));

        let report = MatchReferee::new(&launcher)
            .with_accept_win_declaration(true)
            .run(ScriptedLauncher::engine("a"), ScriptedLauncher::engine("b"))
            .unwrap();
        assert_eq!(report.outcome, TerminalOutcome::Completed { winner: Seat::First });
        assert_eq!(report.winner().unwrap().name, "a");
    }
}

//! Which engines play against which.
//!
//! A [`PairingStrategy`] turns the collected engines into a list of [`Pairing`]s. The
//! scheduler then plays each pairing a fixed number of times, alternating who moves first.
//!
//! # Provided Strategies
//! - [`FamilyGauntlet`]: every engine of one family against every engine of another, for a
//!   list of family pairs. The default compares hybrid, tree search and alpha-beta engines.
//! - [`RoundRobin`]: every engine against every other engine.

use std::{fmt::Display, sync::Arc};

use tracing::info;

use crate::engine::{Engine, Family};

/// Two engines to be compared. `a` moves first in even-numbered matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub a: Arc<Engine>,
    pub b: Arc<Engine>,
}

impl Pairing {
    pub fn new(a: Arc<Engine>, b: Arc<Engine>) -> Self {
        Self { a, b }
    }
}

impl Display for Pairing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} VS {}]", self.a.name, self.b.name)
    }
}

/// Builds the pairings of a run.
pub trait PairingStrategy {
    fn pairings(&self, engines: &[Arc<Engine>]) -> Vec<Pairing>;
}

/// Every engine of `x` against every engine of `y`, for each `(x, y)` in order.
#[derive(Debug, Clone)]
pub struct FamilyGauntlet {
    order: Vec<(Family, Family)>,
}

impl FamilyGauntlet {
    pub fn new(order: Vec<(Family, Family)>) -> Self {
        Self { order }
    }
}

impl Default for FamilyGauntlet {
    /// Hybrid vs tree search, hybrid vs alpha-beta, then tree search vs alpha-beta.
    fn default() -> Self {
        Self::new(vec![
            (Family::Hybrid, Family::Uct),
            (Family::Hybrid, Family::AlphaBeta),
            (Family::Uct, Family::AlphaBeta),
        ])
    }
}

impl PairingStrategy for FamilyGauntlet {
    fn pairings(&self, engines: &[Arc<Engine>]) -> Vec<Pairing> {
        let of = |family: Family| engines.iter().filter(move |e| e.family == family);
        let mut pending = vec![];
        for &(x, y) in &self.order {
            for a in of(x) {
                for b in of(y) {
                    if a != b {
                        pending.push(Pairing::new(a.clone(), b.clone()));
                    }
                }
            }
        }
        info!("{} pairings between families", pending.len());
        pending
    }
}

/// Each unordered pair of distinct engines once. Seat alternation covers both orders.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl PairingStrategy for RoundRobin {
    fn pairings(&self, engines: &[Arc<Engine>]) -> Vec<Pairing> {
        let n = engines.len();
        let mut pending = vec![];
        for i in 0..n {
            for j in (i + 1)..n {
                pending.push(Pairing::new(engines[i].clone(), engines[j].clone()));
            }
        }
        pending
    }
}

#[cfg(test)]
mod pairing_tests {
    use super::*;

    fn engines(names: &[&str]) -> Vec<Arc<Engine>> {
        names
            .iter()
            .map(|n| Arc::new(Engine::new(*n, format!("/engines/{n}"))))
            .collect()
    }

    fn names(pairings: &[Pairing]) -> Vec<String> {
        pairings.iter().map(Pairing::to_string).collect()
    }

    #[test]
    fn default_gauntlet_order() {
        let engines = engines(&["ab1", "uct1", "hybrid1", "uct2", "random"]);
        let pairings = FamilyGauntlet::default().pairings(&engines);
        assert_eq!(
            names(&pairings),
            [
                "[hybrid1 VS uct1]",
                "[hybrid1 VS uct2]",
                "[hybrid1 VS ab1]",
                "[uct1 VS ab1]",
                "[uct2 VS ab1]",
            ]
        );
    }

    #[test]
    fn gauntlet_within_a_family_skips_self_play() {
        let engines = engines(&["uct1", "uct2"]);
        let pairings = FamilyGauntlet::new(vec![(Family::Uct, Family::Uct)]).pairings(&engines);
        assert_eq!(names(&pairings), ["[uct1 VS uct2]", "[uct2 VS uct1]"]);
    }

    #[test]
    fn round_robin_pairs_once() {
        let engines = engines(&["a", "b", "c"]);
        let pairings = RoundRobin.pairings(&engines);
        assert_eq!(names(&pairings), ["[a VS b]", "[a VS c]", "[b VS c]"]);
    }
}

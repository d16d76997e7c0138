//! Rock-Paper-Scissors Arena engine
//!
//! Core simulation for round-robin Rock-Paper-Scissors tournaments between
//! adaptive strategies, plus the building blocks those strategies share:
//! a decayed context model, an opponent profiler and a Q-learning
//! meta-controller. This crate is compiled to:
//! - Native (for the tournament runner)
//! - WASM (for frontend game replay)

mod error;
mod random;
mod strategy;
mod policies;
mod memory;
mod profiler;
mod meta;
mod game;
mod pairing;
mod tournament;

#[cfg(feature = "wasm")]
mod wasm;

pub use error::{ArenaError, Result};
pub use random::SeededRng;
pub use strategy::{
    build_roster, Constant, Copycat, Cycle, Entrant, Frequency, Move, RandomPlay, RoundOutcome,
    Scripted, Strategy, StrategyFactory, StrategyKind, StrategySpec,
};
pub use policies::{CounterLast, MarkovPredictor, PatternParams, PatternPredictor, QLearner};
pub use memory::{ContextMemory, MemoryParams, Prediction};
pub use profiler::{OpponentClass, OpponentProfiler};
pub use meta::{
    standard_registry, Decoy, DeceptionPolicy, Discretizer, Exploration, MetaConfig,
    MetaController, MetaPreset, OpponentState, QTable, ResetPolicy, RollingWindow, Selection,
    CONTEXT_ACTION,
};
pub use game::{
    normalized_proportions, play_game, replay_game, run_game, seat_rngs, GameReplay, GameResult,
    RoundResult, ScoreConfig,
};
pub use pairing::{
    calculate_match_count, generate_all_pairings, get_pairing_for_match, schedule_jobs, GameJob,
};
pub use tournament::{
    run_tournament, ArenaSpec, MatchMetrics, MatchRecord, StrategyStats, TournamentConfig,
    TournamentReport,
};

/// Outcome of a single round, from the first mover's point of view
///
/// Equal moves draw; rock beats scissors, scissors beats paper, paper beats
/// rock; every other combination goes to the second mover.
pub fn resolve(a: Move, b: Move) -> RoundOutcome {
    match (a, b) {
        (Move::Rock, Move::Rock) | (Move::Paper, Move::Paper) | (Move::Scissors, Move::Scissors) => {
            RoundOutcome::Draw
        }
        (Move::Rock, Move::Scissors) | (Move::Scissors, Move::Paper) | (Move::Paper, Move::Rock) => {
            RoundOutcome::FirstWins
        }
        (Move::Rock, Move::Paper) | (Move::Paper, Move::Scissors) | (Move::Scissors, Move::Rock) => {
            RoundOutcome::SecondWins
        }
    }
}

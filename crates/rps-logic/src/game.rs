//! Game execution engine

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::random::SeededRng;
use crate::resolve;
use crate::strategy::{Entrant, Move, RoundOutcome, Strategy};

/// How win counts are turned into a score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Win margins below this share of decisive rounds score nothing
    pub no_point_threshold: f64,
    pub max_score: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self { no_point_threshold: 0.1, max_score: 100.0 }
    }
}

impl ScoreConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.no_point_threshold) {
            return Err(ArenaError::config("no_point_threshold", "must be in [0, 1)"));
        }
        if !(self.max_score > 0.0 && self.max_score.is_finite()) {
            return Err(ArenaError::config("max_score", "must be positive and finite"));
        }
        Ok(())
    }
}

/// Result of a single round
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub move_a: Move,
    pub move_b: Move,
    pub outcome: RoundOutcome,
    /// Wins so far, this round included
    pub cumulative_a: u32,
    pub cumulative_b: u32,
}

/// Result of a complete game
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub wins_a: u32,
    pub wins_b: u32,
    pub draws: u32,
    /// In [-1, 1]
    pub norm_a: f64,
    pub norm_b: f64,
    pub score_a: f64,
    pub score_b: f64,
}

impl GameResult {
    pub fn from_counts(wins_a: u32, wins_b: u32, draws: u32, scoring: &ScoreConfig) -> Self {
        let (norm_a, norm_b) = normalized_proportions(wins_a, wins_b, scoring.no_point_threshold);
        Self {
            wins_a,
            wins_b,
            draws,
            norm_a,
            norm_b,
            score_a: norm_a * scoring.max_score,
            score_b: norm_b * scoring.max_score,
        }
    }

    pub fn rounds(&self) -> u32 {
        self.wins_a + self.wins_b + self.draws
    }
}

/// Game result plus the round-by-round log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameReplay {
    pub rounds: Vec<RoundResult>,
    pub result: GameResult,
}

/// Map win counts to normalized proportions in [-1, 1]
///
/// Draws are ignored. Both sides get 0 when nobody won a round or when the
/// margin is below `no_point_threshold` of the decisive rounds.
pub fn normalized_proportions(wins_a: u32, wins_b: u32, no_point_threshold: f64) -> (f64, f64) {
    let total = (wins_a + wins_b) as f64;
    let margin = (wins_a as f64 - wins_b as f64).abs();
    if total == 0.0 || margin < total * no_point_threshold {
        return (0.0, 0.0);
    }
    (
        (wins_a as f64 / total - 0.5) / 0.5,
        (wins_b as f64 / total - 0.5) / 0.5,
    )
}

fn simulate(
    a: &mut dyn Strategy,
    b: &mut dyn Strategy,
    rounds: u32,
    scoring: &ScoreConfig,
    mut log: Option<&mut Vec<RoundResult>>,
) -> GameResult {
    let (mut wins_a, mut wins_b, mut draws) = (0u32, 0u32, 0u32);

    for round in 0..rounds {
        // Both sides commit before either observes
        let move_a = a.play();
        let move_b = b.play();

        let outcome = resolve(move_a, move_b);
        match outcome {
            RoundOutcome::FirstWins => wins_a += 1,
            RoundOutcome::SecondWins => wins_b += 1,
            RoundOutcome::Draw => draws += 1,
        }

        a.observe(move_a, move_b);
        b.observe(move_b, move_a);

        if let Some(log) = log.as_mut() {
            log.push(RoundResult {
                round,
                move_a,
                move_b,
                outcome,
                cumulative_a: wins_a,
                cumulative_b: wins_b,
            });
        }
    }

    GameResult::from_counts(wins_a, wins_b, draws, scoring)
}

/// Run a complete game between two live strategy instances
pub fn run_game(a: &mut dyn Strategy, b: &mut dyn Strategy, rounds: u32, scoring: &ScoreConfig) -> GameResult {
    simulate(a, b, rounds, scoring, None)
}

/// Like [`run_game`], keeping every round
pub fn replay_game(a: &mut dyn Strategy, b: &mut dyn Strategy, rounds: u32, scoring: &ScoreConfig) -> GameReplay {
    let mut log = Vec::with_capacity(rounds as usize);
    let result = simulate(a, b, rounds, scoring, Some(&mut log));
    GameReplay { rounds: log, result }
}

/// Random streams for both seats of one game
///
/// Derived only from (seed, pairing, game, seat), so a game plays out the
/// same no matter which worker runs it or in what order.
pub fn seat_rngs(seed: u64, pairing: u32, game: u32) -> (SeededRng, SeededRng) {
    let base = SeededRng::new(seed, ((pairing as u64) << 32) | game as u64);
    (base.fork(0), base.fork(1))
}

/// Build fresh instances for both entrants and play one game
pub fn play_game(
    a: &Entrant,
    b: &Entrant,
    rounds: u32,
    scoring: &ScoreConfig,
    seed: u64,
    pairing: u32,
    game: u32,
) -> GameResult {
    let (rng_a, rng_b) = seat_rngs(seed, pairing, game);
    let mut strategy_a = a.instantiate(rng_a);
    let mut strategy_b = b.instantiate(rng_b);
    let result = run_game(strategy_a.as_mut(), strategy_b.as_mut(), rounds, scoring);
    log::debug!(
        "game {} {} vs {}: {}-{}-{} ({:.1} / {:.1})",
        game,
        a.name(),
        b.name(),
        result.wins_a,
        result.draws,
        result.wins_b,
        result.score_a,
        result.score_b
    );
    result
}

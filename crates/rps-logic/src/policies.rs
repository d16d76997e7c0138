//! Adaptive sub-policies
//!
//! Small learners that the meta-controller arbitrates between, plus the
//! standalone context-pattern predictor built on [`ContextMemory`].

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::memory::{ContextMemory, MemoryParams};
use crate::meta::{ResetPolicy, RollingWindow};
use crate::profiler::{OpponentClass, OpponentProfiler};
use crate::random::SeededRng;
use crate::strategy::{Move, Strategy};

/// Predicts the opponent's next move from first-order transition counts
#[derive(Clone, Debug)]
pub struct MarkovPredictor {
    transitions: [[u32; 3]; 3],
    last_opponent: Option<Move>,
    rng: SeededRng,
}

impl MarkovPredictor {
    pub fn new(rng: SeededRng) -> Self {
        Self {
            transitions: [[0; 3]; 3],
            last_opponent: None,
            rng,
        }
    }
}

impl Strategy for MarkovPredictor {
    fn play(&mut self) -> Move {
        let Some(last) = self.last_opponent else {
            return Move::random(&mut self.rng);
        };
        let row = &self.transitions[last.index()];
        if row.iter().all(|c| *c == 0) {
            return Move::random(&mut self.rng);
        }
        let mut predicted = Move::Rock;
        for m in Move::ALL {
            if row[m.index()] > row[predicted.index()] {
                predicted = m;
            }
        }
        predicted.counter()
    }

    fn observe(&mut self, _own: Move, opponent: Move) {
        if let Some(last) = self.last_opponent {
            self.transitions[last.index()][opponent.index()] += 1;
        }
        self.last_opponent = Some(opponent);
    }
}

/// Plays the counter of the opponent's previous move, rock on the first round
#[derive(Clone, Debug, Default)]
pub struct CounterLast {
    last_opponent: Option<Move>,
}

impl Strategy for CounterLast {
    fn play(&mut self) -> Move {
        self.last_opponent.map_or(Move::Rock, Move::counter)
    }

    fn observe(&mut self, _own: Move, opponent: Move) {
        self.last_opponent = Some(opponent);
    }
}

/// Tabular Q-learning over our own moves, keyed by the opponent's last move
#[derive(Clone, Debug)]
pub struct QLearner {
    // row 3 is the opening state, before any opponent move is known
    q: [[f64; 3]; 4],
    last_opponent: Option<Move>,
    learning_rate: f64,
    discount: f64,
    epsilon: f64,
    rng: SeededRng,
}

impl QLearner {
    pub fn new(rng: SeededRng) -> Self {
        Self {
            q: [[0.0; 3]; 4],
            last_opponent: None,
            learning_rate: 0.1,
            discount: 0.9,
            epsilon: 0.1,
            rng,
        }
    }

    fn row(state: Option<Move>) -> usize {
        state.map_or(3, Move::index)
    }

    pub fn value(&self, state: Option<Move>, action: Move) -> f64 {
        self.q[Self::row(state)][action.index()]
    }
}

impl Strategy for QLearner {
    fn play(&mut self) -> Move {
        if self.rng.chance(self.epsilon) {
            return Move::random(&mut self.rng);
        }
        let row = &self.q[Self::row(self.last_opponent)];
        let mut best = Move::Rock;
        for m in Move::ALL {
            if row[m.index()] > row[best.index()] {
                best = m;
            }
        }
        best
    }

    fn observe(&mut self, own: Move, opponent: Move) {
        let reward = own.reward_against(opponent) as f64;
        if let Some(prev) = self.last_opponent {
            let next_best = self.q[opponent.index()].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let cell = &mut self.q[prev.index()][own.index()];
            *cell += self.learning_rate * (reward + self.discount * next_best - *cell);
        }
        self.last_opponent = Some(opponent);
    }
}

// ──────────────────────────── Context pattern agent ────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternParams {
    pub memory: MemoryParams,
    /// Per-round chance of a uniformly random move
    pub noise_rate: f64,
    /// Forget the context memory when the rolling win rate collapses
    pub reset: Option<ResetPolicy>,
    /// Exploit opponents classified as (anti-)mirrors instead of predicting
    pub exploit_mirrors: bool,
    /// Rounds between opponent reclassifications
    pub check_interval: u32,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            memory: MemoryParams::default(),
            noise_rate: 0.05,
            reset: Some(ResetPolicy::default()),
            exploit_mirrors: false,
            check_interval: 100,
        }
    }
}

impl PatternParams {
    pub fn validate(&self) -> Result<()> {
        self.memory.validate()?;
        if !(0.0..=1.0).contains(&self.noise_rate) {
            return Err(ArenaError::config("noise_rate", "must be in [0, 1]"));
        }
        if self.check_interval == 0 {
            return Err(ArenaError::config("check_interval", "must be greater than zero"));
        }
        if let Some(reset) = &self.reset {
            reset.validate()?;
        }
        Ok(())
    }
}

/// Plays the best response to the most confident decayed context
#[derive(Clone, Debug)]
pub struct PatternPredictor {
    params: PatternParams,
    memory: ContextMemory,
    profiler: OpponentProfiler,
    wins: RollingWindow,
    rng: SeededRng,
}

impl PatternPredictor {
    pub fn new(params: PatternParams, rng: SeededRng) -> Self {
        let window = params.reset.as_ref().map_or(1, |r| r.window);
        Self {
            memory: ContextMemory::new(params.memory.clone()),
            profiler: OpponentProfiler::new(params.check_interval),
            wins: RollingWindow::new(window),
            params,
            rng,
        }
    }

    pub fn memory(&self) -> &ContextMemory {
        &self.memory
    }
}

impl Strategy for PatternPredictor {
    fn play(&mut self) -> Move {
        if self.rng.chance(self.params.noise_rate) {
            return Move::random(&mut self.rng);
        }

        if self.params.exploit_mirrors {
            if let Some(last_own) = self.profiler.last_own() {
                match self.profiler.class() {
                    OpponentClass::Mirror => return last_own.counter(),
                    OpponentClass::AntiMirror => return last_own.beats(),
                    _ => {}
                }
            }
        }

        match self.memory.predict() {
            Some(m) => m,
            None => Move::random(&mut self.rng),
        }
    }

    fn observe(&mut self, own: Move, opponent: Move) {
        self.memory.update(own, opponent);
        self.profiler.observe(own, opponent);
        self.wins.push(own.reward_against(opponent) > 0);

        if let Some(reset) = &self.params.reset {
            if reset.triggered(&self.wins) {
                log::debug!(
                    "pattern memory reset at win rate {:.2} ({} contexts dropped)",
                    self.wins.rate(),
                    self.memory.len()
                );
                self.memory.clear();
                self.wins.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Constant, Cycle};

    fn make_rng() -> SeededRng {
        SeededRng::new(42, 0)
    }

    fn play_rounds(me: &mut dyn Strategy, them: &mut dyn Strategy, rounds: usize) -> i32 {
        let mut net = 0;
        for _ in 0..rounds {
            let a = me.play();
            let b = them.play();
            net += a.reward_against(b) as i32;
            me.observe(a, b);
            them.observe(b, a);
        }
        net
    }

    #[test]
    fn test_markov_learns_cycle() {
        let mut markov = MarkovPredictor::new(make_rng());
        let mut cycle = Cycle::default();
        play_rounds(&mut markov, &mut cycle, 30);
        // after warm-up every transition is deterministic
        let net = play_rounds(&mut markov, &mut cycle, 30);
        assert_eq!(net, 30);
    }

    #[test]
    fn test_counter_last() {
        let mut s = CounterLast::default();
        assert_eq!(s.play(), Move::Rock);
        s.observe(Move::Rock, Move::Scissors);
        assert_eq!(s.play(), Move::Rock);
        s.observe(Move::Rock, Move::Paper);
        assert_eq!(s.play(), Move::Scissors);
    }

    #[test]
    fn test_counter_last_beats_constant() {
        let mut s = CounterLast::default();
        let mut rock = Constant(Move::Rock);
        play_rounds(&mut s, &mut rock, 1);
        assert_eq!(play_rounds(&mut s, &mut rock, 20), 20);
    }

    #[test]
    fn test_qlearner_update_rule() {
        let mut q = QLearner::new(make_rng());
        q.observe(Move::Rock, Move::Rock);
        // state rock, we played paper and won
        q.observe(Move::Paper, Move::Rock);
        assert!((q.value(Some(Move::Rock), Move::Paper) - 0.1).abs() < 1e-12);
        // losing drives the value negative
        q.observe(Move::Scissors, Move::Rock);
        assert!(q.value(Some(Move::Rock), Move::Scissors) < 0.0);
    }

    #[test]
    fn test_qlearner_exploits_constant() {
        let mut q = QLearner::new(make_rng());
        let mut rock = Constant(Move::Rock);
        play_rounds(&mut q, &mut rock, 300);
        let net = play_rounds(&mut q, &mut rock, 200);
        assert!(net > 120, "net {} too low", net);
    }

    #[test]
    fn test_pattern_beats_constant() {
        let mut p = PatternPredictor::new(PatternParams::default(), make_rng());
        let mut rock = Constant(Move::Rock);
        play_rounds(&mut p, &mut rock, 20);
        let net = play_rounds(&mut p, &mut rock, 200);
        assert!(net > 150, "net {} too low", net);
    }

    #[test]
    fn test_pattern_resets_when_losing() {
        let params = PatternParams {
            noise_rate: 0.0,
            reset: Some(ResetPolicy { window: 10, threshold: 0.35 }),
            ..PatternParams::default()
        };
        let mut p = PatternPredictor::new(params, make_rng());
        // opponent always beats whatever we just played
        for _ in 0..9 {
            let own = p.play();
            p.observe(own, own.counter());
        }
        assert!(!p.memory().is_empty());
        let own = p.play();
        p.observe(own, own.counter());
        assert!(p.memory().is_empty());
    }

    #[test]
    fn test_pattern_exploits_mirror() {
        let params = PatternParams {
            noise_rate: 0.0,
            exploit_mirrors: true,
            check_interval: 1,
            reset: None,
            ..PatternParams::default()
        };
        let mut p = PatternPredictor::new(params, make_rng());
        let mut copycat = crate::strategy::Copycat::default();
        play_rounds(&mut p, &mut copycat, 40);
        let net = play_rounds(&mut p, &mut copycat, 50);
        assert!(net >= 45, "net {} too low", net);
    }

    #[test]
    fn test_pattern_params_validation() {
        assert!(PatternParams::default().validate().is_ok());
        let bad = PatternParams { noise_rate: 1.5, ..PatternParams::default() };
        assert!(bad.validate().is_err());
        let bad = PatternParams { check_interval: 0, ..PatternParams::default() };
        assert!(bad.validate().is_err());
    }
}

//! Decayed n-gram context memory
//!
//! Remembers, for every recent history of 1..N (own, opponent) move pairs,
//! how often the opponent followed it with each move. Counts fade by a
//! constant factor every time their context is revisited, so stale evidence
//! loses weight without a hard window.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::strategy::Move;

/// Longest context the packed key can hold (9^8 fits in a u32)
pub const MAX_CONTEXT_ORDER: usize = 8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryParams {
    /// Longest context length tracked
    pub max_order: usize,
    /// Multiplier applied to a context's counts before each new observation
    pub decay: f64,
    /// Laplace pseudo-count per move
    pub laplace_k: f64,
    /// Minimum max-minus-min probability spread to act on a prediction
    pub confidence_threshold: f64,
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self {
            max_order: 3,
            decay: 0.9,
            laplace_k: 1.0,
            confidence_threshold: 0.4,
        }
    }
}

impl MemoryParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_order == 0 || self.max_order > MAX_CONTEXT_ORDER {
            return Err(ArenaError::config(
                "max_order",
                format!("must be in 1..={}", MAX_CONTEXT_ORDER),
            ));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(ArenaError::config("decay", "must be in (0, 1]"));
        }
        if !(self.laplace_k > 0.0 && self.laplace_k.is_finite()) {
            return Err(ArenaError::config("laplace_k", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ArenaError::config("confidence_threshold", "must be in [0, 1]"));
        }
        Ok(())
    }
}

/// A context packed as base-9 digits, one digit per (own, opponent) pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ContextKey {
    order: u8,
    code: u32,
}

#[derive(Clone, Debug, Default)]
struct Tally {
    counts: [f64; 3],
    total: f64,
}

/// Smoothed forecast of the opponent's next move from one context
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// Context length the forecast came from
    pub order: usize,
    /// Indexed by [`Move::index`]
    pub probabilities: [f64; 3],
    pub confidence: f64,
}

impl Prediction {
    /// Opponent's most probable next move
    pub fn likely(&self) -> Move {
        let mut best = Move::Rock;
        for m in Move::ALL {
            if self.probabilities[m.index()] > self.probabilities[best.index()] {
                best = m;
            }
        }
        best
    }

    /// Our move with the highest chance of winning against the forecast
    pub fn best_response(&self) -> Move {
        let mut best = Move::Rock;
        let mut best_value = f64::NEG_INFINITY;
        for m in Move::ALL {
            let value = self.probabilities[m.beats().index()];
            if value > best_value {
                best = m;
                best_value = value;
            }
        }
        best
    }
}

#[derive(Clone, Debug)]
pub struct ContextMemory {
    params: MemoryParams,
    history: VecDeque<(Move, Move)>,
    table: HashMap<ContextKey, Tally>,
}

impl ContextMemory {
    pub fn new(params: MemoryParams) -> Self {
        Self {
            history: VecDeque::with_capacity(params.max_order + 1),
            table: HashMap::new(),
            params,
        }
    }

    pub fn params(&self) -> &MemoryParams {
        &self.params
    }

    /// Number of distinct contexts with evidence
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn key(&self, order: usize) -> Option<ContextKey> {
        if order == 0 || order > self.history.len() {
            return None;
        }
        let code = self
            .history
            .iter()
            .skip(self.history.len() - order)
            .fold(0u32, |acc, (own, opp)| acc * 9 + (own.index() * 3 + opp.index()) as u32);
        Some(ContextKey { order: order as u8, code })
    }

    fn orders(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.history.len().min(self.params.max_order)
    }

    /// Record the opponent's reply to every context currently in view
    pub fn update(&mut self, own: Move, opponent: Move) {
        for order in self.orders() {
            let Some(key) = self.key(order) else { continue };
            let tally = self.table.entry(key).or_default();
            for count in tally.counts.iter_mut() {
                *count *= self.params.decay;
            }
            tally.total *= self.params.decay;
            tally.counts[opponent.index()] += 1.0;
            tally.total += 1.0;
        }

        self.history.push_back((own, opponent));
        while self.history.len() > self.params.max_order {
            self.history.pop_front();
        }
    }

    fn smoothed(&self, tally: Option<&Tally>) -> [f64; 3] {
        let k = self.params.laplace_k;
        let (counts, total) = match tally {
            Some(t) => (t.counts, t.total),
            None => ([0.0; 3], 0.0),
        };
        let denom = total + k * 3.0;
        [
            (counts[0] + k) / denom,
            (counts[1] + k) / denom,
            (counts[2] + k) / denom,
        ]
    }

    /// Smoothed distribution for the context of the given length; uniform if unseen
    pub fn probabilities(&self, order: usize) -> [f64; 3] {
        let tally = self.key(order).and_then(|key| self.table.get(&key));
        self.smoothed(tally)
    }

    pub fn confidence(probabilities: &[f64; 3]) -> f64 {
        let max = probabilities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = probabilities.iter().cloned().fold(f64::INFINITY, f64::min);
        max - min
    }

    /// The most confident context that has evidence; shorter contexts win ties
    pub fn best_context(&self) -> Option<Prediction> {
        let mut best: Option<Prediction> = None;
        for order in self.orders() {
            let Some(tally) = self.key(order).and_then(|key| self.table.get(&key)) else {
                continue;
            };
            if tally.total <= 0.0 {
                continue;
            }
            let probabilities = self.smoothed(Some(tally));
            let confidence = Self::confidence(&probabilities);
            if best.as_ref().map_or(true, |b| confidence > b.confidence) {
                best = Some(Prediction { order, probabilities, confidence });
            }
        }
        best
    }

    /// Best response if the strongest context clears the confidence threshold
    pub fn predict(&self) -> Option<Move> {
        self.best_context()
            .filter(|p| p.confidence >= self.params.confidence_threshold)
            .map(|p| p.best_response())
    }

    /// Forget every context's counts; the recent-move window is kept
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

//! Opponent profiling from rolling counters
//!
//! Counts repeats, transitions and (anti-)mirrors of our previous move as
//! rounds are observed, and buckets them into the coarse features the
//! meta-controller uses as state. The profile is never the source of truth:
//! everything here can be rebuilt by replaying the raw move pairs.

use serde::{Deserialize, Serialize};

use crate::strategy::Move;

/// Rounds required before any classification other than `Unknown`
pub const MIN_SAMPLE: u32 = 20;

/// Most-frequent-move ratio thresholds for bias levels 1 and 2
pub const BIAS_THRESHOLDS: (f64, f64) = (0.4, 0.6);

/// Transition-rate thresholds for switch buckets 1 and 2
pub const SWITCH_THRESHOLDS: (f64, f64) = (0.3, 0.6);

const MIRROR_RATIO: f64 = 0.5;
const HABIT_RATIO: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpponentClass {
    /// Not enough rounds yet.
    Unknown,
    /// Plays our previous move.
    Mirror,
    /// Plays the counter of our previous move.
    AntiMirror,
    /// Mostly repeats its own previous move.
    Repeater,
    /// Mostly changes its move.
    Switcher,
    /// None of the above habits dominate.
    Adaptive,
}

#[derive(Clone, Debug)]
pub struct OpponentProfiler {
    interval: u32,
    rounds: u32,
    move_counts: [u32; 3],
    repeats: u32,
    transitions: u32,
    mirrors: u32,
    anti_mirrors: u32,
    last_own: Option<Move>,
    last_opponent: Option<Move>,
    recent_repeat: bool,
    last_was_mirror: bool,
    class: OpponentClass,
}

impl Default for OpponentProfiler {
    fn default() -> Self {
        Self::continuous()
    }
}

impl OpponentProfiler {
    /// Reclassify every `interval` rounds
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            rounds: 0,
            move_counts: [0; 3],
            repeats: 0,
            transitions: 0,
            mirrors: 0,
            anti_mirrors: 0,
            last_own: None,
            last_opponent: None,
            recent_repeat: false,
            last_was_mirror: false,
            class: OpponentClass::Unknown,
        }
    }

    /// Reclassify after every round
    pub fn continuous() -> Self {
        Self::new(1)
    }

    pub fn observe(&mut self, own: Move, opponent: Move) {
        self.last_was_mirror = false;
        if let Some(prev_own) = self.last_own {
            if opponent == prev_own {
                self.mirrors += 1;
                self.last_was_mirror = true;
            } else if opponent == prev_own.counter() {
                self.anti_mirrors += 1;
            }
        }

        if let Some(prev_opponent) = self.last_opponent {
            self.recent_repeat = opponent == prev_opponent;
            if self.recent_repeat {
                self.repeats += 1;
            } else {
                self.transitions += 1;
            }
        }

        self.move_counts[opponent.index()] += 1;
        self.rounds += 1;
        self.last_own = Some(own);
        self.last_opponent = Some(opponent);

        if self.rounds % self.interval == 0 {
            let class = self.classify();
            if class != self.class {
                log::trace!("opponent reclassified {:?} -> {:?} after {} rounds", self.class, class, self.rounds);
            }
            self.class = class;
        }
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Whether the opponent's last two moves were equal
    pub fn recent_repeat(&self) -> bool {
        self.recent_repeat
    }

    /// Whether the opponent's latest move copied our previous one
    pub fn last_was_mirror(&self) -> bool {
        self.last_was_mirror
    }

    /// Share of the opponent's most frequent move
    pub fn bias_ratio(&self) -> f64 {
        if self.rounds == 0 {
            return 0.0;
        }
        let max = self.move_counts.iter().copied().max().unwrap_or(0);
        max as f64 / self.rounds as f64
    }

    pub fn switch_rate(&self) -> f64 {
        if self.rounds <= 1 {
            return 0.0;
        }
        self.transitions as f64 / self.rounds as f64
    }

    pub fn bias_level(&self) -> u8 {
        bucket(self.bias_ratio(), BIAS_THRESHOLDS)
    }

    pub fn switch_bucket(&self) -> u8 {
        bucket(self.switch_rate(), SWITCH_THRESHOLDS)
    }

    /// Classification as of the last refresh
    pub fn class(&self) -> OpponentClass {
        self.class
    }

    /// Classification from the counters as they stand now
    pub fn classify(&self) -> OpponentClass {
        if self.rounds < MIN_SAMPLE {
            return OpponentClass::Unknown;
        }
        let n = self.rounds as f64;
        if self.mirrors as f64 / n > MIRROR_RATIO {
            OpponentClass::Mirror
        } else if self.anti_mirrors as f64 / n > MIRROR_RATIO {
            OpponentClass::AntiMirror
        } else if self.repeats as f64 / n > HABIT_RATIO {
            OpponentClass::Repeater
        } else if self.transitions as f64 / n > HABIT_RATIO {
            OpponentClass::Switcher
        } else {
            OpponentClass::Adaptive
        }
    }

    /// Our move from the last observed round
    pub fn last_own(&self) -> Option<Move> {
        self.last_own
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.interval);
    }
}

fn bucket(value: f64, (low, high): (f64, f64)) -> u8 {
    if value > high {
        2
    } else if value > low {
        1
    } else {
        0
    }
}

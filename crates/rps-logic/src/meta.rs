//! Q-learning meta-controller
//!
//! Arbitrates between named sub-policies. Every round it discretizes the
//! opponent's profile into a small state, picks a sub-policy with a
//! pluggable selection rule, plays that sub-policy's move and, once the
//! opponent's move is known, applies a one-step Q-learning update to the
//! (state, action) pair recorded at play time.
//!
//! Around that core sit two adaptive behaviours:
//! - a deception state machine that temporarily replaces the learned policy
//!   with a decoy sequence, optionally latching itself off for good when a
//!   decoy fails to pay off;
//! - a memory reset that forgets all learned values once the rolling win
//!   rate says the opponent has figured us out.

use std::collections::{HashMap, VecDeque};

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::memory::{ContextMemory, MemoryParams};
use crate::policies::{CounterLast, MarkovPredictor, QLearner};
use crate::profiler::{OpponentClass, OpponentProfiler};
use crate::random::SeededRng;
use crate::strategy::{Move, Strategy};

/// Action name reserved for the controller's own context memory
pub const CONTEXT_ACTION: &str = "context";

/// Rewards kept for the recent-loss state flag
const RECENT_REWARDS: usize = 5;

const MAX_DECOY_LEN: u32 = 32;

// ──────────────────────────── Rolling win rate ────────────────────────────

/// Win/no-win outcomes of the last `capacity` rounds
#[derive(Clone, Debug)]
pub struct RollingWindow {
    capacity: usize,
    outcomes: VecDeque<bool>,
    wins: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            outcomes: VecDeque::with_capacity(capacity),
            wins: 0,
        }
    }

    pub fn push(&mut self, won: bool) {
        if self.outcomes.len() == self.capacity {
            if let Some(true) = self.outcomes.pop_front() {
                self.wins -= 1;
            }
        }
        self.outcomes.push_back(won);
        if won {
            self.wins += 1;
        }
    }

    pub fn is_full(&self) -> bool {
        self.outcomes.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Win rate over the window; 0.0 when empty
    pub fn rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.wins as f64 / self.outcomes.len() as f64
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
        self.wins = 0;
    }
}

/// Forget learned state when the rolling win rate drops below `threshold`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResetPolicy {
    pub window: usize,
    pub threshold: f64,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self { window: 50, threshold: 0.35 }
    }
}

impl ResetPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ArenaError::config("reset.window", "must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ArenaError::config("reset.threshold", "must be in [0, 1]"));
        }
        Ok(())
    }

    /// Only a full window can trigger a reset
    pub fn triggered(&self, window: &RollingWindow) -> bool {
        window.is_full() && window.rate() < self.threshold
    }
}

// ──────────────────────────── State ────────────────────────────

/// Discretized view of the opponent used as Q-table key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpponentState {
    pub recent_repeat: bool,
    pub bias_level: u8,
    pub switch_bucket: Option<u8>,
    pub recent_loss: Option<bool>,
}

/// Which features make up the state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discretizer {
    /// (repeat, bias)
    RepeatBias,
    /// (repeat, bias, switch)
    Profiled,
    /// (repeat, bias, switch, recent loss)
    LossAware,
}

impl Discretizer {
    pub fn discretize(&self, profiler: &OpponentProfiler, recent_rewards: &VecDeque<i8>) -> OpponentState {
        let switch_bucket = match self {
            Discretizer::RepeatBias => None,
            Discretizer::Profiled | Discretizer::LossAware => Some(profiler.switch_bucket()),
        };
        let recent_loss = match self {
            Discretizer::LossAware => {
                Some(recent_rewards.iter().map(|r| *r as i32).sum::<i32>() < -2)
            }
            _ => None,
        };
        OpponentState {
            recent_repeat: profiler.recent_repeat(),
            bias_level: profiler.bias_level(),
            switch_bucket,
            recent_loss,
        }
    }
}

// ──────────────────────────── Q-table ────────────────────────────

/// Value estimates per (state, action); unseen pairs read as 0.0
#[derive(Clone, Debug)]
pub struct QTable {
    actions: usize,
    values: HashMap<OpponentState, Vec<f64>>,
}

impl QTable {
    pub fn new(actions: usize) -> Self {
        Self { actions, values: HashMap::new() }
    }

    pub fn value(&self, state: &OpponentState, action: usize) -> f64 {
        self.values
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn row(&self, state: &OpponentState) -> Vec<f64> {
        self.values
            .get(state)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.actions])
    }

    pub fn max_value(&self, state: &OpponentState) -> f64 {
        match self.values.get(state) {
            Some(row) => row.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            None => 0.0,
        }
    }

    /// Greedy action; ties go to the earliest registered action
    pub fn best_action(&self, state: &OpponentState) -> usize {
        match self.values.get(state) {
            Some(row) => argmax(row),
            None => 0,
        }
    }

    /// One-step Q-learning update, returns the new value
    pub fn update(
        &mut self,
        state: OpponentState,
        action: usize,
        reward: f64,
        next: &OpponentState,
        learning_rate: f64,
        discount: f64,
    ) -> f64 {
        let future = self.max_value(next);
        let actions = self.actions;
        let row = self.values.entry(state).or_insert_with(|| vec![0.0; actions]);
        let old = row[action];
        row[action] = old + learning_rate * (reward + discount * future - old);
        row[action]
    }

    /// Number of states seen
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

// ──────────────────────────── Selection ────────────────────────────

/// How a sub-policy is chosen from the current state
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    /// Greedy on Q with epsilon exploration.
    EpsilonGreedy,
    /// Boltzmann sampling over Q values.
    Softmax { temperature: f64 },
    /// Highest Beta(wins, losses) sample per action.
    Thompson,
    /// Weighted Q value plus Thompson sample, with epsilon exploration.
    Blended { q_weight: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exploration {
    pub epsilon: f64,
    /// Multiplier applied after every observed round; 1.0 disables annealing
    pub decay: f64,
    pub floor: f64,
}

impl Exploration {
    pub fn fixed(epsilon: f64) -> Self {
        Self { epsilon, decay: 1.0, floor: epsilon }
    }

    pub fn annealed(epsilon: f64) -> Self {
        Self { epsilon, decay: 0.995, floor: 0.01 }
    }

    fn step(&mut self) {
        if self.decay < 1.0 {
            self.epsilon = (self.epsilon * self.decay).max(self.floor);
        }
    }
}

// ──────────────────────────── Deception ────────────────────────────

/// Sequence played while injecting a false pattern
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Decoy {
    /// Exactly these moves.
    Fixed(Vec<Move>),
    /// One random move repeated a random number of times.
    RandomRepeat { min_len: u32, max_len: u32 },
    /// Rock, paper, scissors for `len` rounds.
    Cycle { len: u32 },
}

impl Decoy {
    fn generate(&self, rng: &mut SeededRng) -> Vec<Move> {
        match self {
            Decoy::Fixed(moves) if moves.is_empty() => vec![Move::random(rng)],
            Decoy::Fixed(moves) => moves.clone(),
            Decoy::RandomRepeat { min_len, max_len } => {
                let m = Move::random(rng);
                vec![m; rng.between(*min_len, *max_len).max(1) as usize]
            }
            Decoy::Cycle { len } => (0..(*len).max(1) as usize).map(|i| Move::ALL[i % 3]).collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        let ok = match self {
            Decoy::Fixed(moves) => moves.len() as u32 <= MAX_DECOY_LEN,
            Decoy::RandomRepeat { min_len, max_len } => {
                *min_len >= 1 && min_len <= max_len && *max_len <= MAX_DECOY_LEN
            }
            Decoy::Cycle { len } => *len >= 1 && *len <= MAX_DECOY_LEN,
        };
        if ok {
            Ok(())
        } else {
            Err(ArenaError::config("deception.decoy", format!("length must be in 1..={}", MAX_DECOY_LEN)))
        }
    }
}

/// When to inject a decoy. With every trigger unset the controller never injects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeceptionPolicy {
    /// Consecutive losses that arm the trigger
    pub loss_streak: Option<u32>,
    /// Chance of injecting once the loss streak is reached
    pub loss_streak_chance: f64,
    /// Unconditional per-round injection chance
    pub random_rate: f64,
    /// Chance of injecting after the opponent copied our previous move
    pub mirror_chance: f64,
    /// Inject on every `every`-th round
    pub every: Option<u32>,
    pub decoy: Decoy,
    /// Disable injection for good after a decoy that did not raise the win rate
    pub self_evaluate: bool,
    /// Normal rounds after a decoy used to judge it
    pub evaluation_window: u32,
}

impl Default for DeceptionPolicy {
    fn default() -> Self {
        Self {
            loss_streak: None,
            loss_streak_chance: 1.0,
            random_rate: 0.0,
            mirror_chance: 0.0,
            every: None,
            decoy: Decoy::Fixed(vec![Move::Rock, Move::Rock]),
            self_evaluate: false,
            evaluation_window: 10,
        }
    }
}

impl DeceptionPolicy {
    pub fn validate(&self) -> Result<()> {
        for (field, p) in [
            ("deception.loss_streak_chance", self.loss_streak_chance),
            ("deception.random_rate", self.random_rate),
            ("deception.mirror_chance", self.mirror_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ArenaError::config(field, "must be in [0, 1]"));
            }
        }
        if self.loss_streak == Some(0) {
            return Err(ArenaError::config("deception.loss_streak", "must be greater than zero"));
        }
        if self.every == Some(0) {
            return Err(ArenaError::config("deception.every", "must be greater than zero"));
        }
        if self.self_evaluate && self.evaluation_window == 0 {
            return Err(ArenaError::config("deception.evaluation_window", "must be greater than zero"));
        }
        self.decoy.validate()
    }
}

#[derive(Clone, Debug)]
enum Phase {
    Normal,
    Injecting { script: Vec<Move>, cursor: usize },
}

#[derive(Clone, Debug)]
struct Evaluation {
    baseline: f64,
    remaining: u32,
    wins: u32,
    rounds: u32,
}

#[derive(Clone, Debug)]
struct Deception {
    policy: DeceptionPolicy,
    phase: Phase,
    enabled: bool,
    loss_streak: u32,
    mirror_armed: bool,
    pre_wins: u32,
    pre_rounds: u32,
    evaluation: Option<Evaluation>,
}

impl Deception {
    fn new(policy: DeceptionPolicy) -> Self {
        Self {
            policy,
            phase: Phase::Normal,
            enabled: true,
            loss_streak: 0,
            mirror_armed: false,
            pre_wins: 0,
            pre_rounds: 0,
            evaluation: None,
        }
    }

    fn is_injecting(&self) -> bool {
        matches!(self.phase, Phase::Injecting { .. })
    }

    fn next_decoy(&mut self) -> Option<Move> {
        match &mut self.phase {
            Phase::Injecting { script, cursor } if *cursor < script.len() => {
                let m = script[*cursor];
                *cursor += 1;
                Some(m)
            }
            _ => None,
        }
    }

    /// Check every trigger for the coming round; `round` counts from 1
    fn maybe_trigger(&mut self, round: u64, rng: &mut SeededRng) -> bool {
        if !self.enabled || self.is_injecting() || self.evaluation.is_some() {
            self.mirror_armed = false;
            return false;
        }
        let periodic = self.policy.every.is_some_and(|every| round % every as u64 == 0);
        let streak = self.policy.loss_streak.is_some_and(|threshold| self.loss_streak >= threshold)
            && rng.chance(self.policy.loss_streak_chance);
        let mirror = std::mem::take(&mut self.mirror_armed);
        let random = rng.chance(self.policy.random_rate);
        if !(periodic || streak || mirror || random) {
            return false;
        }

        let script = self.policy.decoy.generate(rng);
        log::debug!(
            "injecting {}-round decoy (periodic={} streak={} mirror={} random={})",
            script.len(),
            periodic,
            streak,
            mirror,
            random
        );
        let baseline = if self.pre_rounds == 0 {
            0.0
        } else {
            self.pre_wins as f64 / self.pre_rounds as f64
        };
        self.evaluation = self.policy.self_evaluate.then_some(Evaluation {
            baseline,
            remaining: self.policy.evaluation_window,
            wins: 0,
            rounds: 0,
        });
        self.pre_wins = 0;
        self.pre_rounds = 0;
        self.loss_streak = 0;
        self.phase = Phase::Injecting { script, cursor: 0 };
        true
    }

    fn observe(&mut self, reward: i8, mirrored: bool, rng: &mut SeededRng) {
        // decoy rounds count toward neither the streak nor the win rates
        if let Phase::Injecting { script, cursor } = &self.phase {
            if *cursor >= script.len() {
                self.phase = Phase::Normal;
            }
            return;
        }

        if reward < 0 {
            self.loss_streak += 1;
        } else {
            self.loss_streak = 0;
        }

        let won = reward > 0;
        match self.evaluation.as_mut() {
            // evaluation only starts once the decoy has finished
            Some(eval) => {
                eval.rounds += 1;
                eval.wins += won as u32;
                eval.remaining = eval.remaining.saturating_sub(1);
                if eval.remaining == 0 {
                    let post = eval.wins as f64 / eval.rounds as f64;
                    if post <= eval.baseline {
                        log::debug!(
                            "decoy did not pay off ({:.2} <= {:.2}), disabling injection",
                            post,
                            eval.baseline
                        );
                        self.enabled = false;
                    }
                    self.evaluation = None;
                }
            }
            None => {
                self.pre_rounds += 1;
                self.pre_wins += won as u32;
            }
        }

        if mirrored && rng.chance(self.policy.mirror_chance) {
            self.mirror_armed = true;
        }
    }
}

// ──────────────────────────── Controller ────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    pub discretizer: Discretizer,
    pub selection: Selection,
    pub exploration: Exploration,
    pub learning_rate: f64,
    pub discount: f64,
    /// Rounds between opponent reclassifications
    pub profiler_interval: u32,
    /// Sub-policy to favour for each opponent class
    pub preferences: Vec<(OpponentClass, String)>,
    pub preference_chance: f64,
    pub deception: DeceptionPolicy,
    pub reset: Option<ResetPolicy>,
    /// Registers the controller's own context memory as an extra action
    pub memory: Option<MemoryParams>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            discretizer: Discretizer::RepeatBias,
            selection: Selection::EpsilonGreedy,
            exploration: Exploration::fixed(0.1),
            learning_rate: 0.2,
            discount: 0.9,
            profiler_interval: 1,
            preferences: Vec::new(),
            preference_chance: 0.0,
            deception: DeceptionPolicy::default(),
            reset: None,
            memory: None,
        }
    }
}

impl MetaConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ArenaError::config("learning_rate", "must be in (0, 1]"));
        }
        if !(0.0..1.0).contains(&self.discount) {
            return Err(ArenaError::config("discount", "must be in [0, 1)"));
        }
        let e = &self.exploration;
        if !(0.0..=1.0).contains(&e.epsilon) || !(0.0..=1.0).contains(&e.floor) {
            return Err(ArenaError::config("exploration", "epsilon and floor must be in [0, 1]"));
        }
        if !(e.decay > 0.0 && e.decay <= 1.0) {
            return Err(ArenaError::config("exploration.decay", "must be in (0, 1]"));
        }
        match self.selection {
            Selection::Softmax { temperature } if !(temperature > 0.0) => {
                return Err(ArenaError::config("selection.temperature", "must be positive"));
            }
            Selection::Blended { q_weight } if !(0.0..=1.0).contains(&q_weight) => {
                return Err(ArenaError::config("selection.q_weight", "must be in [0, 1]"));
            }
            _ => {}
        }
        if self.profiler_interval == 0 {
            return Err(ArenaError::config("profiler_interval", "must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.preference_chance) {
            return Err(ArenaError::config("preference_chance", "must be in [0, 1]"));
        }
        self.deception.validate()?;
        if let Some(reset) = &self.reset {
            reset.validate()?;
        }
        if let Some(memory) = &self.memory {
            memory.validate()?;
        }
        Ok(())
    }
}

/// Named controller configurations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaPreset {
    QController,
    AdaptiveQ,
    Thompson,
    Boltzmann,
    HybridDeceptive,
    LossBait,
    SelfEvaluating,
    FalsePattern,
    ContextArbiter,
}

impl MetaPreset {
    pub const ALL: [MetaPreset; 9] = [
        MetaPreset::QController,
        MetaPreset::AdaptiveQ,
        MetaPreset::Thompson,
        MetaPreset::Boltzmann,
        MetaPreset::HybridDeceptive,
        MetaPreset::LossBait,
        MetaPreset::SelfEvaluating,
        MetaPreset::FalsePattern,
        MetaPreset::ContextArbiter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetaPreset::QController => "QController",
            MetaPreset::AdaptiveQ => "AdaptiveQ",
            MetaPreset::Thompson => "ThompsonMeta",
            MetaPreset::Boltzmann => "BoltzmannMeta",
            MetaPreset::HybridDeceptive => "HybridDeceptiveQ",
            MetaPreset::LossBait => "LossBait",
            MetaPreset::SelfEvaluating => "SelfEvaluatingBait",
            MetaPreset::FalsePattern => "FalsePattern",
            MetaPreset::ContextArbiter => "ContextArbiter",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            MetaPreset::QController => "Q-learning over markov, counter and q-learning sub-policies.",
            MetaPreset::AdaptiveQ => "Q-learning on a richer opponent profile with annealed exploration.",
            MetaPreset::Thompson => "Thompson sampling over sub-policy win/loss records.",
            MetaPreset::Boltzmann => "Softmax over learned sub-policy values.",
            MetaPreset::HybridDeceptive => {
                "Blends Q values with Thompson samples and injects random decoys, more often against mirrors."
            }
            MetaPreset::LossBait => "Plays a rock decoy after three straight losses.",
            MetaPreset::SelfEvaluating => {
                "Baits after losing streaks, stops baiting once a decoy fails, and favours sub-policies by opponent type."
            }
            MetaPreset::FalsePattern => "Adaptive Q-learning that plays a cyclic decoy every hundred rounds.",
            MetaPreset::ContextArbiter => {
                "Adds a decayed context model as a sub-policy and forgets everything when it starts losing."
            }
        }
    }

    pub fn config(&self) -> MetaConfig {
        let base = MetaConfig::default();
        match self {
            MetaPreset::QController => base,
            MetaPreset::AdaptiveQ => MetaConfig {
                discretizer: Discretizer::Profiled,
                exploration: Exploration::annealed(0.1),
                ..base
            },
            MetaPreset::Thompson => MetaConfig {
                selection: Selection::Thompson,
                ..base
            },
            MetaPreset::Boltzmann => MetaConfig {
                discretizer: Discretizer::Profiled,
                selection: Selection::Softmax { temperature: 0.5 },
                ..base
            },
            MetaPreset::HybridDeceptive => MetaConfig {
                discretizer: Discretizer::LossAware,
                selection: Selection::Blended { q_weight: 0.7 },
                deception: DeceptionPolicy {
                    random_rate: 0.05,
                    mirror_chance: 0.3,
                    decoy: Decoy::RandomRepeat { min_len: 3, max_len: 6 },
                    ..DeceptionPolicy::default()
                },
                ..base
            },
            MetaPreset::LossBait => MetaConfig {
                discretizer: Discretizer::Profiled,
                exploration: Exploration::annealed(0.1),
                deception: DeceptionPolicy {
                    loss_streak: Some(3),
                    decoy: Decoy::Fixed(vec![Move::Rock; 3]),
                    ..DeceptionPolicy::default()
                },
                ..base
            },
            MetaPreset::SelfEvaluating => MetaConfig {
                discretizer: Discretizer::Profiled,
                exploration: Exploration::annealed(0.1),
                preferences: vec![
                    (OpponentClass::Repeater, "counter".to_string()),
                    (OpponentClass::Switcher, "markov".to_string()),
                    (OpponentClass::Adaptive, "qlearn".to_string()),
                ],
                preference_chance: 0.6,
                deception: DeceptionPolicy {
                    loss_streak: Some(3),
                    loss_streak_chance: 0.3,
                    decoy: Decoy::Fixed(vec![Move::Rock; 2]),
                    self_evaluate: true,
                    ..DeceptionPolicy::default()
                },
                ..base
            },
            MetaPreset::FalsePattern => MetaConfig {
                discretizer: Discretizer::Profiled,
                exploration: Exploration::annealed(0.1),
                deception: DeceptionPolicy {
                    every: Some(100),
                    decoy: Decoy::Cycle { len: 10 },
                    ..DeceptionPolicy::default()
                },
                ..base
            },
            MetaPreset::ContextArbiter => MetaConfig {
                discretizer: Discretizer::LossAware,
                exploration: Exploration::annealed(0.1),
                reset: Some(ResetPolicy::default()),
                memory: Some(MemoryParams::default()),
                ..base
            },
        }
    }
}

/// Markov, counter-last and q-learning sub-policies on independent streams
pub fn standard_registry(rng: &SeededRng) -> Vec<(String, Box<dyn Strategy>)> {
    let markov: Box<dyn Strategy> = Box::new(MarkovPredictor::new(rng.fork(1)));
    let counter: Box<dyn Strategy> = Box::new(CounterLast::default());
    let qlearn: Box<dyn Strategy> = Box::new(QLearner::new(rng.fork(3)));
    vec![
        ("markov".to_string(), markov),
        ("counter".to_string(), counter),
        ("qlearn".to_string(), qlearn),
    ]
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    state: OpponentState,
    action: usize,
    played: Move,
}

pub struct MetaController {
    config: MetaConfig,
    names: Vec<String>,
    policies: Vec<Box<dyn Strategy>>,
    q: QTable,
    profiler: OpponentProfiler,
    memory: Option<ContextMemory>,
    deception: Deception,
    exploration: Exploration,
    // Beta(wins, losses) per action for Thompson sampling
    records: Vec<[f64; 2]>,
    recent_rewards: VecDeque<i8>,
    wins: RollingWindow,
    pending: Option<Pending>,
    usage: Vec<u32>,
    round: u64,
    rng: SeededRng,
}

impl MetaController {
    /// Build a controller over a custom sub-policy registry
    pub fn new(
        config: MetaConfig,
        registry: Vec<(String, Box<dyn Strategy>)>,
        rng: SeededRng,
    ) -> Result<Self> {
        config.validate()?;
        if registry.is_empty() && config.memory.is_none() {
            return Err(ArenaError::EmptyRegistry);
        }
        let mut seen = std::collections::HashSet::new();
        for (name, _) in &registry {
            if name == CONTEXT_ACTION && config.memory.is_some() {
                return Err(ArenaError::config("registry", "`context` is reserved for the context memory"));
            }
            if !seen.insert(name.as_str()) {
                return Err(ArenaError::config("registry", format!("duplicate sub-policy {}", name)));
            }
        }
        let controller = Self::assemble(config, registry, rng);
        for (_, action) in &controller.config.preferences {
            if !controller.names.contains(action) {
                return Err(ArenaError::UnknownAction(action.clone()));
            }
        }
        Ok(controller)
    }

    /// Preset over the standard registry
    pub fn from_preset(preset: MetaPreset, rng: SeededRng) -> Self {
        let registry = standard_registry(&rng);
        Self::assemble(preset.config(), registry, rng.fork(0))
    }

    fn assemble(config: MetaConfig, registry: Vec<(String, Box<dyn Strategy>)>, rng: SeededRng) -> Self {
        let (mut names, policies): (Vec<_>, Vec<_>) = registry.into_iter().unzip();
        let memory = config.memory.clone().map(ContextMemory::new);
        if memory.is_some() {
            names.push(CONTEXT_ACTION.to_string());
        }
        let reset_window = config.reset.as_ref().map_or(1, |r| r.window);
        Self {
            q: QTable::new(names.len()),
            records: vec![[1.0, 1.0]; names.len()],
            usage: vec![0; names.len()],
            profiler: OpponentProfiler::new(config.profiler_interval),
            deception: Deception::new(config.deception.clone()),
            exploration: config.exploration,
            recent_rewards: VecDeque::with_capacity(RECENT_REWARDS),
            wins: RollingWindow::new(reset_window),
            pending: None,
            round: 0,
            names,
            policies,
            memory,
            config,
            rng,
        }
    }

    pub fn actions(&self) -> &[String] {
        &self.names
    }

    pub fn q_table(&self) -> &QTable {
        &self.q
    }

    pub fn profiler(&self) -> &OpponentProfiler {
        &self.profiler
    }

    pub fn epsilon(&self) -> f64 {
        self.exploration.epsilon
    }

    /// How often each action was selected
    pub fn usage(&self) -> &[u32] {
        &self.usage
    }

    pub fn is_injecting(&self) -> bool {
        self.deception.is_injecting()
    }

    /// False once the self-evaluation latch has tripped
    pub fn injection_enabled(&self) -> bool {
        self.deception.enabled
    }

    pub fn state(&self) -> OpponentState {
        self.config.discretizer.discretize(&self.profiler, &self.recent_rewards)
    }

    fn preferred_action(&self) -> Option<usize> {
        let class = self.profiler.class();
        let (_, name) = self.config.preferences.iter().find(|(c, _)| *c == class)?;
        self.names.iter().position(|n| n == name)
    }

    fn thompson_samples(&mut self) -> Vec<f64> {
        let records = self.records.clone();
        records.iter().map(|[w, l]| self.rng.beta(*w, *l)).collect()
    }

    fn select(&mut self, state: &OpponentState) -> usize {
        let n = self.names.len();
        if let Some(preferred) = self.preferred_action() {
            if self.rng.chance(self.config.preference_chance) {
                return preferred;
            }
        }

        match self.config.selection {
            Selection::EpsilonGreedy => {
                if self.rng.chance(self.exploration.epsilon) {
                    self.rng.next_range(n as u32) as usize
                } else {
                    self.q.best_action(state)
                }
            }
            Selection::Softmax { temperature } => {
                let row = self.q.row(state);
                let top = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let weights: Vec<f64> = row.iter().map(|q| ((q - top) / temperature).exp()).collect();
                match WeightedIndex::new(&weights) {
                    Ok(dist) => dist.sample(&mut self.rng),
                    Err(_) => argmax(&row),
                }
            }
            Selection::Thompson => {
                let samples = self.thompson_samples();
                argmax(&samples)
            }
            Selection::Blended { q_weight } => {
                if self.rng.chance(self.exploration.epsilon) {
                    return self.rng.next_range(n as u32) as usize;
                }
                let samples = self.thompson_samples();
                let row = self.q.row(state);
                let combined: Vec<f64> = row
                    .iter()
                    .zip(&samples)
                    .map(|(q, t)| q_weight * q + (1.0 - q_weight) * t)
                    .collect();
                argmax(&combined)
            }
        }
    }

    fn play_action(&mut self, action: usize) -> Move {
        if let Some(policy) = self.policies.get_mut(action) {
            return policy.play();
        }
        match self.memory.as_ref().and_then(ContextMemory::predict) {
            Some(m) => m,
            None => Move::random(&mut self.rng),
        }
    }

    /// Drop every learned value; the opponent has adapted to us
    fn forget(&mut self) {
        log::debug!(
            "meta controller reset at win rate {:.2} ({} states dropped)",
            self.wins.rate(),
            self.q.len()
        );
        self.q.clear();
        if let Some(memory) = self.memory.as_mut() {
            memory.clear();
        }
        for record in self.records.iter_mut() {
            *record = [1.0, 1.0];
        }
        self.wins.clear();
        self.recent_rewards.clear();
        self.pending = None;
    }
}

impl Strategy for MetaController {
    fn play(&mut self) -> Move {
        self.round += 1;
        let state = self.state();

        if let Some(decoy) = self.deception.next_decoy() {
            self.pending = None;
            return decoy;
        }
        if self.deception.maybe_trigger(self.round, &mut self.rng) {
            if let Some(decoy) = self.deception.next_decoy() {
                self.pending = None;
                return decoy;
            }
        }

        let action = self.select(&state);
        let played = self.play_action(action);
        self.usage[action] += 1;
        self.pending = Some(Pending { state, action, played });
        played
    }

    fn observe(&mut self, own: Move, opponent: Move) {
        for policy in self.policies.iter_mut() {
            policy.observe(own, opponent);
        }
        if let Some(memory) = self.memory.as_mut() {
            memory.update(own, opponent);
        }
        self.profiler.observe(own, opponent);

        let actual = own.reward_against(opponent);
        if self.recent_rewards.len() == RECENT_REWARDS {
            self.recent_rewards.pop_front();
        }
        self.recent_rewards.push_back(actual);
        self.wins.push(actual > 0);
        self.deception.observe(actual, self.profiler.last_was_mirror(), &mut self.rng);

        if let Some(Pending { state, action, played }) = self.pending.take() {
            let reward = played.reward_against(opponent);
            let next = self.state();
            self.q.update(
                state,
                action,
                reward as f64,
                &next,
                self.config.learning_rate,
                self.config.discount,
            );
            if reward > 0 {
                self.records[action][0] += 1.0;
            } else if reward < 0 {
                self.records[action][1] += 1.0;
            }
        }

        self.exploration.step();

        let reset_due = self.config.reset.as_ref().is_some_and(|r| r.triggered(&self.wins));
        if reset_due {
            self.forget();
        }
    }
}

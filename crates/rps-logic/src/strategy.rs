//! Strategy definitions and roster construction

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::meta::{MetaController, MetaPreset};
use crate::policies::{CounterLast, MarkovPredictor, PatternParams, PatternPredictor, QLearner};
use crate::random::SeededRng;

/// A move in Rock-Paper-Scissors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    /// Every move, in the order used for indexing and tie-breaking
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn index(self) -> usize {
        match self {
            Move::Rock => 0,
            Move::Paper => 1,
            Move::Scissors => 2,
        }
    }

    /// The move this one defeats
    pub fn beats(self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Paper => Move::Rock,
            Move::Scissors => Move::Paper,
        }
    }

    /// The move that defeats this one
    pub fn counter(self) -> Move {
        match self {
            Move::Rock => Move::Paper,
            Move::Paper => Move::Scissors,
            Move::Scissors => Move::Rock,
        }
    }

    pub fn random(rng: &mut SeededRng) -> Move {
        Move::ALL[rng.next_range(3) as usize]
    }

    /// +1 / 0 / -1 from this move's point of view
    pub fn reward_against(self, other: Move) -> i8 {
        crate::resolve(self, other).reward()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        };
        f.write_str(name)
    }
}

impl FromStr for Move {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rock" | "Rock" => Ok(Move::Rock),
            "paper" | "Paper" => Ok(Move::Paper),
            "scissors" | "Scissors" => Ok(Move::Scissors),
            other => Err(ArenaError::InvalidMove(other.to_string())),
        }
    }
}

impl TryFrom<u8> for Move {
    type Error = ArenaError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Move::Rock),
            1 => Ok(Move::Paper),
            2 => Ok(Move::Scissors),
            other => Err(ArenaError::InvalidMove(other.to_string())),
        }
    }
}

/// Outcome of one round, seen from the first mover
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Draw,
    FirstWins,
    SecondWins,
}

impl RoundOutcome {
    /// The same round seen from the second mover
    pub fn reversed(self) -> Self {
        match self {
            RoundOutcome::Draw => RoundOutcome::Draw,
            RoundOutcome::FirstWins => RoundOutcome::SecondWins,
            RoundOutcome::SecondWins => RoundOutcome::FirstWins,
        }
    }

    /// Reward for the first mover
    pub fn reward(self) -> i8 {
        match self {
            RoundOutcome::Draw => 0,
            RoundOutcome::FirstWins => 1,
            RoundOutcome::SecondWins => -1,
        }
    }
}

/// A decision-making agent.
///
/// Implementations own all of their state, including their random stream.
/// The game loop calls `play` on both sides before either side observes,
/// then calls `observe` exactly once per round with the agent's own move first.
/// Externally trained predictors plug in by implementing this trait.
pub trait Strategy {
    fn play(&mut self) -> Move;

    fn observe(&mut self, own: Move, opponent: Move);
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn play(&mut self) -> Move {
        (**self).play()
    }

    fn observe(&mut self, own: Move, opponent: Move) {
        (**self).observe(own, opponent)
    }
}

// ──────────────────────────── Fixed policies ────────────────────────────

/// Plays the same move forever
#[derive(Clone, Debug)]
pub struct Constant(pub Move);

impl Strategy for Constant {
    fn play(&mut self) -> Move {
        self.0
    }

    fn observe(&mut self, _own: Move, _opponent: Move) {}
}

/// Rock, paper, scissors, rock, ...
#[derive(Clone, Debug, Default)]
pub struct Cycle {
    index: usize,
}

impl Strategy for Cycle {
    fn play(&mut self) -> Move {
        let m = Move::ALL[self.index];
        self.index = (self.index + 1) % 3;
        m
    }

    fn observe(&mut self, _own: Move, _opponent: Move) {}
}

/// Repeats the opponent's previous move, starting with rock
#[derive(Clone, Debug)]
pub struct Copycat {
    last: Move,
}

impl Default for Copycat {
    fn default() -> Self {
        Self { last: Move::Rock }
    }
}

impl Strategy for Copycat {
    fn play(&mut self) -> Move {
        self.last
    }

    fn observe(&mut self, _own: Move, opponent: Move) {
        self.last = opponent;
    }
}

/// Counters the opponent's most frequent move so far
#[derive(Clone, Debug, Default)]
pub struct Frequency {
    counts: [u32; 3],
}

impl Strategy for Frequency {
    fn play(&mut self) -> Move {
        if self.counts.iter().all(|c| *c == 0) {
            return Move::Rock;
        }
        let mut best = Move::Rock;
        for m in Move::ALL {
            if self.counts[m.index()] > self.counts[best.index()] {
                best = m;
            }
        }
        best.counter()
    }

    fn observe(&mut self, _own: Move, opponent: Move) {
        self.counts[opponent.index()] += 1;
    }
}

/// Uniform random play
#[derive(Clone, Debug)]
pub struct RandomPlay {
    rng: SeededRng,
}

impl RandomPlay {
    pub fn new(rng: SeededRng) -> Self {
        Self { rng }
    }
}

impl Strategy for RandomPlay {
    fn play(&mut self) -> Move {
        Move::random(&mut self.rng)
    }

    fn observe(&mut self, _own: Move, _opponent: Move) {}
}

/// Loops over a fixed sequence of moves
#[derive(Clone, Debug)]
pub struct Scripted {
    moves: Vec<Move>,
    cursor: usize,
    rng: SeededRng,
}

impl Scripted {
    pub fn new(moves: Vec<Move>, rng: SeededRng) -> Self {
        Self { moves, cursor: 0, rng }
    }
}

impl Strategy for Scripted {
    fn play(&mut self) -> Move {
        if self.moves.is_empty() {
            return Move::random(&mut self.rng);
        }
        let m = self.moves[self.cursor % self.moves.len()];
        self.cursor += 1;
        m
    }

    fn observe(&mut self, _own: Move, _opponent: Move) {}
}

// ──────────────────────────── Roster ────────────────────────────

/// Built-in strategy kinds that can be named in an arena description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StrategyKind {
    /// Always the same move.
    Constant { play: Move },
    /// Rock, paper, scissors in order.
    Cycle,
    /// Repeat the opponent's last move.
    Copycat,
    /// Counter the opponent's most common move.
    Frequency,
    /// Uniform random choice each round.
    Random,
    /// Loop over a fixed list of move names.
    Scripted { moves: Vec<String> },
    /// First-order transition counter.
    Markov,
    /// Counter the opponent's previous move.
    CounterLast,
    /// Tabular Q-learning keyed by the opponent's last move.
    QLearning,
    /// Decayed n-gram context predictor.
    Pattern(PatternParams),
    /// Adaptive arbitration over sub-policies.
    Meta { preset: MetaPreset },
}

impl StrategyKind {
    pub fn default_name(&self) -> String {
        match self {
            StrategyKind::Constant { play } => match play {
                Move::Rock => "AlwaysRock".to_string(),
                Move::Paper => "AlwaysPaper".to_string(),
                Move::Scissors => "AlwaysScissors".to_string(),
            },
            StrategyKind::Cycle => "Cycle".to_string(),
            StrategyKind::Copycat => "Copycat".to_string(),
            StrategyKind::Frequency => "Frequency".to_string(),
            StrategyKind::Random => "Random".to_string(),
            StrategyKind::Scripted { .. } => "Scripted".to_string(),
            StrategyKind::Markov => "Markov".to_string(),
            StrategyKind::CounterLast => "CounterLast".to_string(),
            StrategyKind::QLearning => "QLearning".to_string(),
            StrategyKind::Pattern(_) => "Pattern".to_string(),
            StrategyKind::Meta { preset } => preset.name().to_string(),
        }
    }

    /// Validate the kind and turn it into a factory
    pub fn factory(&self) -> Result<StrategyFactory> {
        let factory: StrategyFactory = match self {
            StrategyKind::Constant { play } => {
                let play = *play;
                factory_of(move |_| Constant(play))
            }
            StrategyKind::Cycle => factory_of(|_| Cycle::default()),
            StrategyKind::Copycat => factory_of(|_| Copycat::default()),
            StrategyKind::Frequency => factory_of(|_| Frequency::default()),
            StrategyKind::Random => factory_of(RandomPlay::new),
            StrategyKind::Scripted { moves } => {
                let moves = moves
                    .iter()
                    .map(|m| m.parse::<Move>())
                    .collect::<Result<Vec<_>>>()?;
                factory_of(move |rng| Scripted::new(moves.clone(), rng))
            }
            StrategyKind::Markov => factory_of(MarkovPredictor::new),
            StrategyKind::CounterLast => factory_of(|_| CounterLast::default()),
            StrategyKind::QLearning => factory_of(QLearner::new),
            StrategyKind::Pattern(params) => {
                params.validate()?;
                let params = params.clone();
                factory_of(move |rng| PatternPredictor::new(params.clone(), rng))
            }
            StrategyKind::Meta { preset } => {
                let preset = *preset;
                factory_of(move |rng| MetaController::from_preset(preset, rng))
            }
        };
        Ok(factory)
    }

    /// Human-readable description
    pub fn describe(&self) -> String {
        match self {
            StrategyKind::Constant { play } => format!("Always plays {}.", play),
            StrategyKind::Cycle => "Cycles rock, paper, scissors.".to_string(),
            StrategyKind::Copycat => "Repeats the opponent's previous move.".to_string(),
            StrategyKind::Frequency => "Counters the opponent's most frequent move.".to_string(),
            StrategyKind::Random => "Picks uniformly at random each round.".to_string(),
            StrategyKind::Scripted { moves } => format!("Loops over [{}].", moves.join(", ")),
            StrategyKind::Markov => {
                "Predicts the opponent's next move from first-order transitions.".to_string()
            }
            StrategyKind::CounterLast => "Plays the counter of the opponent's last move.".to_string(),
            StrategyKind::QLearning => {
                "Learns move values keyed by the opponent's last move.".to_string()
            }
            StrategyKind::Pattern(params) => {
                let mut desc = format!(
                    "Decayed context model over the last 1..{} rounds.",
                    params.memory.max_order
                );
                if params.noise_rate > 0.0 {
                    desc.push_str(&format!(" {:.0}% random noise.", params.noise_rate * 100.0));
                }
                if params.reset.is_some() {
                    desc.push_str(" Forgets everything when it starts losing.");
                }
                desc
            }
            StrategyKind::Meta { preset } => preset.describe().to_string(),
        }
    }
}

/// A roster entry as written in an arena description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: StrategyKind,
}

impl StrategySpec {
    pub fn new(kind: StrategyKind) -> Self {
        Self { name: None, kind }
    }

    pub fn named(name: impl Into<String>, kind: StrategyKind) -> Self {
        Self { name: Some(name.into()), kind }
    }
}

/// Builds a fresh, independent strategy instance from its own random stream
pub type StrategyFactory = Arc<dyn Fn(SeededRng) -> Box<dyn Strategy> + Send + Sync>;

fn factory_of<F, S>(build: F) -> StrategyFactory
where
    F: Fn(SeededRng) -> S + Send + Sync + 'static,
    S: Strategy + 'static,
{
    Arc::new(move |rng| Box::new(build(rng)) as Box<dyn Strategy>)
}

/// A named factory in the tournament roster
#[derive(Clone)]
pub struct Entrant {
    name: String,
    factory: StrategyFactory,
}

impl Entrant {
    pub fn new<F, S>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(SeededRng) -> S + Send + Sync + 'static,
        S: Strategy + 'static,
    {
        Self {
            name: name.into(),
            factory: factory_of(build),
        }
    }

    pub fn from_spec(spec: &StrategySpec) -> Result<Self> {
        Ok(Self {
            name: spec.name.clone().unwrap_or_else(|| spec.kind.default_name()),
            factory: spec.kind.factory()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instantiate(&self, rng: SeededRng) -> Box<dyn Strategy> {
        (self.factory)(rng)
    }
}

impl fmt::Debug for Entrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entrant").field("name", &self.name).finish()
    }
}

/// Build a roster, rejecting duplicate names
pub fn build_roster(specs: &[StrategySpec]) -> Result<Vec<Entrant>> {
    let roster = specs.iter().map(Entrant::from_spec).collect::<Result<Vec<_>>>()?;
    ensure_unique_names(&roster)?;
    Ok(roster)
}

pub(crate) fn ensure_unique_names(roster: &[Entrant]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for entrant in roster {
        if !seen.insert(entrant.name()) {
            return Err(ArenaError::DuplicateStrategy(entrant.name().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rng() -> SeededRng {
        SeededRng::new(42, 0)
    }

    #[test]
    fn test_beats_and_counter_are_inverse() {
        for m in Move::ALL {
            assert_eq!(m.counter().beats(), m);
            assert_eq!(m.beats().counter(), m);
            assert_ne!(m.beats(), m);
        }
    }

    #[test]
    fn test_move_parsing() {
        assert_eq!("rock".parse::<Move>().unwrap(), Move::Rock);
        assert_eq!("Paper".parse::<Move>().unwrap(), Move::Paper);
        assert_eq!("scissors".parse::<Move>().unwrap(), Move::Scissors);
        assert!(matches!("lizard".parse::<Move>(), Err(ArenaError::InvalidMove(_))));
        assert!(matches!("ROCK".parse::<Move>(), Err(ArenaError::InvalidMove(_))));
    }

    #[test]
    fn test_move_try_from_u8() {
        assert_eq!(Move::try_from(2u8).unwrap(), Move::Scissors);
        assert!(matches!(Move::try_from(3u8), Err(ArenaError::InvalidMove(_))));
    }

    #[test]
    fn test_move_serde_lowercase() {
        let json = serde_json::to_string(&Move::Scissors).unwrap();
        assert_eq!(json, "\"scissors\"");
        let back: Move = serde_json::from_str("\"paper\"").unwrap();
        assert_eq!(back, Move::Paper);
    }

    #[test]
    fn test_cycle_order() {
        let mut s = Cycle::default();
        let moves: Vec<_> = (0..4).map(|_| s.play()).collect();
        assert_eq!(moves, vec![Move::Rock, Move::Paper, Move::Scissors, Move::Rock]);
    }

    #[test]
    fn test_copycat_first_move_then_copies() {
        let mut s = Copycat::default();
        assert_eq!(s.play(), Move::Rock);
        s.observe(Move::Rock, Move::Scissors);
        assert_eq!(s.play(), Move::Scissors);
    }

    #[test]
    fn test_frequency_counters_most_common() {
        let mut s = Frequency::default();
        assert_eq!(s.play(), Move::Rock);
        s.observe(Move::Rock, Move::Paper);
        s.observe(Move::Rock, Move::Paper);
        s.observe(Move::Rock, Move::Rock);
        assert_eq!(s.play(), Move::Scissors);
    }

    #[test]
    fn test_scripted_loops() {
        let mut s = Scripted::new(vec![Move::Paper, Move::Rock], make_rng());
        let moves: Vec<_> = (0..3).map(|_| s.play()).collect();
        assert_eq!(moves, vec![Move::Paper, Move::Rock, Move::Paper]);
    }

    #[test]
    fn test_scripted_kind_rejects_bad_move() {
        let kind = StrategyKind::Scripted {
            moves: vec!["rock".to_string(), "spock".to_string()],
        };
        match kind.factory() {
            Err(ArenaError::InvalidMove(m)) => assert_eq!(m, "spock"),
            other => panic!("expected InvalidMove, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_default_names() {
        assert_eq!(StrategyKind::Constant { play: Move::Rock }.default_name(), "AlwaysRock");
        assert_eq!(
            StrategyKind::Meta { preset: MetaPreset::LossBait }.default_name(),
            MetaPreset::LossBait.name()
        );
    }

    #[test]
    fn test_kind_json_roundtrip() {
        let json = r#"{"name": "Bait", "kind": {"type": "Meta", "preset": "LossBait"}}"#;
        let spec: StrategySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.name.as_deref(), Some("Bait"));
        assert_eq!(spec.kind, StrategyKind::Meta { preset: MetaPreset::LossBait });

        let json = r#"{"kind": {"type": "Pattern", "memory": {"max_order": 2}}}"#;
        let spec: StrategySpec = serde_json::from_str(json).unwrap();
        match spec.kind {
            StrategyKind::Pattern(p) => {
                assert_eq!(p.memory.max_order, 2);
                assert_eq!(p.memory.confidence_threshold, 0.4);
                assert_eq!(p.noise_rate, PatternParams::default().noise_rate);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_roster_rejects_duplicates() {
        let specs = vec![
            StrategySpec::new(StrategyKind::Cycle),
            StrategySpec::new(StrategyKind::Random),
            StrategySpec::new(StrategyKind::Cycle),
        ];
        match build_roster(&specs) {
            Err(ArenaError::DuplicateStrategy(name)) => assert_eq!(name, "Cycle"),
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn test_entrant_instances_are_fresh() {
        let entrant = Entrant::from_spec(&StrategySpec::new(StrategyKind::Cycle)).unwrap();
        let mut first = entrant.instantiate(make_rng());
        first.play();
        first.play();
        let mut second = entrant.instantiate(make_rng());
        assert_eq!(second.play(), Move::Rock);
    }

    #[test]
    fn test_describe_mentions_move() {
        let desc = StrategyKind::Constant { play: Move::Paper }.describe();
        assert!(desc.contains("paper"));
    }
}

//! WASM bindings for frontend game replay

#![cfg(feature = "wasm")]

use wasm_bindgen::prelude::*;

use crate::game::{replay_game as replay, seat_rngs, ScoreConfig};
use crate::meta::MetaPreset;
use crate::pairing::{calculate_match_count, generate_all_pairings, get_pairing_for_match};
use crate::strategy::{Entrant, Move, StrategyKind, StrategySpec};
use crate::tournament::ArenaSpec;

/// Parse a roster entry.
///
/// Accepts either a full entry `{"name": "...", "kind": {...}}` or a bare
/// kind such as `{"type": "Meta", "preset": "LossBait"}`.
fn parse_entrant(json: &str) -> Result<Entrant, String> {
    if let Ok(spec) = serde_json::from_str::<StrategySpec>(json) {
        return Entrant::from_spec(&spec).map_err(|e| e.to_string());
    }
    let kind: StrategyKind = serde_json::from_str(json).map_err(|e| format!("Invalid strategy: {}", e))?;
    Entrant::from_spec(&StrategySpec::new(kind)).map_err(|e| e.to_string())
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Replay one game with full round-by-round details
///
/// # Arguments
/// * `strategy_a_json` - JSON roster entry or bare kind for seat A
/// * `strategy_b_json` - JSON roster entry or bare kind for seat B
/// * `seed` - Tournament seed
/// * `pairing` - Pairing index, as in the tournament's job list
/// * `game` - Repetition within the pairing
/// * `rounds` - Rounds to play
/// * `no_point_threshold` - Share of decisive rounds a margin must reach to score
/// * `max_score` - Score of a clean sweep
///
/// # Returns
/// GameReplay with the per-round log and the scored result
#[wasm_bindgen]
pub fn replay_game(
    strategy_a_json: &str,
    strategy_b_json: &str,
    seed: u64,
    pairing: u32,
    game: u32,
    rounds: u32,
    no_point_threshold: f64,
    max_score: f64,
) -> Result<JsValue, JsError> {
    let a = parse_entrant(strategy_a_json).map_err(|e| JsError::new(&format!("Invalid strategy A: {}", e)))?;
    let b = parse_entrant(strategy_b_json).map_err(|e| JsError::new(&format!("Invalid strategy B: {}", e)))?;
    if rounds == 0 {
        return Err(JsError::new("rounds must be greater than zero"));
    }
    let scoring = ScoreConfig { no_point_threshold, max_score };
    scoring.validate().map_err(|e| JsError::new(&e.to_string()))?;

    let (rng_a, rng_b) = seat_rngs(seed, pairing, game);
    let mut strategy_a = a.instantiate(rng_a);
    let mut strategy_b = b.instantiate(rng_b);
    let result = replay(strategy_a.as_mut(), strategy_b.as_mut(), rounds, &scoring);
    to_js(&result)
}

/// Run a whole tournament from an arena description
///
/// Runs sequentially on wasm32; expect it to block for large rosters.
#[wasm_bindgen]
pub fn run_tournament(arena_json: &str) -> Result<JsValue, JsError> {
    let spec = ArenaSpec::from_json(arena_json).map_err(|e| JsError::new(&e.to_string()))?;
    let report = spec.run().map_err(|e| JsError::new(&e.to_string()))?;
    to_js(&report)
}

/// Get human-readable description of a strategy kind
#[wasm_bindgen]
pub fn get_strategy_description(strategy_json: &str) -> Result<String, JsError> {
    let kind: StrategyKind =
        serde_json::from_str(strategy_json).map_err(|e| JsError::new(&format!("Invalid strategy: {}", e)))?;
    Ok(kind.describe())
}

#[derive(serde::Serialize)]
struct StrategyInfo {
    name: String,
    kind: StrategyKind,
    description: String,
}

impl StrategyInfo {
    fn of(kind: StrategyKind) -> Self {
        Self {
            name: kind.default_name(),
            description: kind.describe(),
            kind,
        }
    }
}

/// Get every built-in strategy kind with default parameters
#[wasm_bindgen]
pub fn get_strategy_types() -> Result<JsValue, JsError> {
    let mut kinds = vec![
        StrategyKind::Constant { play: Move::Rock },
        StrategyKind::Constant { play: Move::Paper },
        StrategyKind::Constant { play: Move::Scissors },
        StrategyKind::Cycle,
        StrategyKind::Copycat,
        StrategyKind::Frequency,
        StrategyKind::Random,
        StrategyKind::Markov,
        StrategyKind::CounterLast,
        StrategyKind::QLearning,
        StrategyKind::Pattern(Default::default()),
    ];
    kinds.extend(MetaPreset::ALL.into_iter().map(|preset| StrategyKind::Meta { preset }));

    let types: Vec<StrategyInfo> = kinds.into_iter().map(StrategyInfo::of).collect();
    to_js(&types)
}

/// Get all pairings for a roster size
#[wasm_bindgen]
pub fn get_tournament_pairings(participant_count: u32) -> Result<JsValue, JsError> {
    to_js(&generate_all_pairings(participant_count))
}

/// Get pairing for a specific match
#[wasm_bindgen]
pub fn get_match_pairing(participant_count: u32, match_index: u32) -> Result<JsValue, JsError> {
    to_js(&get_pairing_for_match(participant_count, match_index))
}

/// Get total pairing count for a roster size
#[wasm_bindgen]
pub fn get_match_count(participant_count: u32) -> u32 {
    calculate_match_count(participant_count)
}

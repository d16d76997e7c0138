//! Deterministic pairing generation for tournament matches
//!
//! Every unordered pair of roster indices plays, in ascending lexicographic
//! order. Single pairings can be looked up by index without materializing
//! the whole list.

use serde::{Deserialize, Serialize};

/// One game of one pairing, the unit of work handed to the worker pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameJob {
    /// Index into the pairing list
    pub pairing: u32,
    pub a: u32,
    pub b: u32,
    /// Repetition within the pairing
    pub game: u32,
}

/// Number of unordered pairs among `participant_count` entrants
pub fn calculate_match_count(participant_count: u32) -> u32 {
    if participant_count < 2 {
        return 0;
    }
    participant_count * (participant_count - 1) / 2
}

/// Generate all pairings as (index_a, index_b) with index_a < index_b
pub fn generate_all_pairings(participant_count: u32) -> Vec<(u32, u32)> {
    let n = participant_count;
    let mut pairings = Vec::with_capacity(calculate_match_count(n) as usize);
    for a in 0..n {
        for b in (a + 1)..n {
            pairings.push((a, b));
        }
    }
    pairings
}

/// Get the pairing at a position of [`generate_all_pairings`], O(1)
pub fn get_pairing_for_match(participant_count: u32, match_index: u32) -> Option<(u32, u32)> {
    let n = participant_count;
    let total = calculate_match_count(n);
    if match_index >= total {
        return None;
    }
    // lexicographic rank r is colexicographic rank total-1-r on mirrored indices
    let (a, b) = unrank_pair(total - 1 - match_index);
    Some((n - 1 - b, n - 1 - a))
}

/// Every (pairing, game) job in order: pairing-major, then game index
pub fn schedule_jobs(participant_count: u32, games_per_match: u32) -> Vec<GameJob> {
    generate_all_pairings(participant_count)
        .into_iter()
        .enumerate()
        .flat_map(|(pairing, (a, b))| {
            (0..games_per_match).map(move |game| GameJob {
                pairing: pairing as u32,
                a,
                b,
                game,
            })
        })
        .collect()
}

// ──────────────────────────── Internal helpers ────────────────────────────

/// Colexicographic combination unranking: rank → (a, b) with a < b.
///
/// rank = C(b,2) + a = b*(b−1)/2 + a
fn unrank_pair(rank: u32) -> (u32, u32) {
    // Estimate b via integer floor(sqrt(1 + 8·rank))
    let val = 1u64 + 8 * rank as u64;
    let mut s = val;
    let mut t = (s + 1) / 2;
    while t < s {
        s = t;
        t = (s + val / s) / 2;
    }
    let mut b = (1 + s) / 2;

    let rank = rank as u64;
    while b > 0 && b * (b - 1) / 2 > rank {
        b -= 1;
    }
    while (b + 1) * b / 2 <= rank {
        b += 1;
    }

    let a = rank - b * (b - 1) / 2;
    (a as u32, b as u32)
}

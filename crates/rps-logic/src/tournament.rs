//! Round-robin tournament driver and statistics
//!
//! Every pairing plays `games_per_match` games with fresh instances. Games
//! run on a worker pool in any order; results are collected back into job
//! order and aggregated on one thread, so the report depends only on the
//! configuration and the roster.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::game::{play_game, GameResult, ScoreConfig};
use crate::pairing::{generate_all_pairings, schedule_jobs, GameJob};
use crate::strategy::{build_roster, ensure_unique_names, Entrant, StrategySpec};

/// z-score of the two-sided 95% interval
const Z_95: f64 = 1.96;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    pub rounds_per_game: u32,
    pub games_per_match: u32,
    pub no_point_threshold: f64,
    pub max_score: f64,
    /// Per-match average score above which a match counts as dominated
    pub dominance_threshold: f64,
    pub seed: u64,
    /// Worker threads; `None` lets the pool decide
    pub workers: Option<usize>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            rounds_per_game: 1000,
            games_per_match: 10,
            no_point_threshold: 0.1,
            max_score: 100.0,
            dominance_threshold: 10.0,
            seed: 42,
            workers: None,
        }
    }
}

impl TournamentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rounds_per_game == 0 {
            return Err(ArenaError::config("rounds_per_game", "must be greater than zero"));
        }
        if self.games_per_match == 0 {
            return Err(ArenaError::config("games_per_match", "must be greater than zero"));
        }
        self.scoring().validate()?;
        if !self.dominance_threshold.is_finite() {
            return Err(ArenaError::config("dominance_threshold", "must be finite"));
        }
        if self.workers == Some(0) {
            return Err(ArenaError::config("workers", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn scoring(&self) -> ScoreConfig {
        ScoreConfig {
            no_point_threshold: self.no_point_threshold,
            max_score: self.max_score,
        }
    }
}

/// A tournament as written in an arena file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaSpec {
    #[serde(default)]
    pub tournament: TournamentConfig,
    pub roster: Vec<StrategySpec>,
}

impl ArenaSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build_roster(&self) -> Result<Vec<Entrant>> {
        build_roster(&self.roster)
    }

    /// Validate everything and run
    pub fn run(&self) -> Result<TournamentReport> {
        let roster = self.build_roster()?;
        run_tournament(&self.tournament, &roster)
    }
}

/// Averages over the games of one pairing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub strategy_a: String,
    pub strategy_b: String,
    pub games: u32,
    pub avg_norm_a: f64,
    pub avg_norm_b: f64,
    pub avg_score_a: f64,
    pub avg_score_b: f64,
    /// Raw totals over every game
    pub wins_a: u32,
    pub wins_b: u32,
    pub draws: u32,
}

/// Detailed per-pairing line: averaged scores plus win rates over decisive rounds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    pub strategy_a: String,
    pub strategy_b: String,
    pub avg_score_a: f64,
    pub avg_score_b: f64,
    pub avg_norm_a: f64,
    pub avg_norm_b: f64,
    pub wins_a: u32,
    pub wins_b: u32,
    pub draws: u32,
    pub win_rate_a: f64,
    pub win_rate_b: f64,
}

impl MatchMetrics {
    fn from_record(record: &MatchRecord) -> Self {
        let decisive = (record.wins_a + record.wins_b).max(1) as f64;
        Self {
            strategy_a: record.strategy_a.clone(),
            strategy_b: record.strategy_b.clone(),
            avg_score_a: record.avg_score_a,
            avg_score_b: record.avg_score_b,
            avg_norm_a: record.avg_norm_a,
            avg_norm_b: record.avg_norm_b,
            wins_a: record.wins_a,
            wins_b: record.wins_b,
            draws: record.draws,
            win_rate_a: record.wins_a as f64 / decisive,
            win_rate_b: record.wins_b as f64 / decisive,
        }
    }
}

/// Aggregate over one strategy's per-match average scores
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub matches: u32,
    pub mean_score: f64,
    /// Sum of per-match averages scaled back up by games per match
    pub total_score: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub mean_norm: f64,
    pub worst_score: f64,
    /// Share of matches with a positive average
    pub win_ratio: f64,
    /// Share of matches with an average above the dominance threshold
    pub dominance_index: f64,
}

impl StrategyStats {
    /// Degenerate inputs (no matches) give all zeros
    pub fn from_matches(scores: &[f64], norms: &[f64], games_per_match: u32, dominance_threshold: f64) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        let sum: f64 = scores.iter().sum();
        let mean = sum / n;
        let variance = if scores.len() >= 2 {
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let half_width = Z_95 * std_dev / n.sqrt();
        let mean_norm = if norms.is_empty() {
            0.0
        } else {
            norms.iter().sum::<f64>() / norms.len() as f64
        };

        Self {
            matches: scores.len() as u32,
            mean_score: mean,
            total_score: sum * games_per_match as f64,
            variance,
            std_dev,
            ci_low: mean - half_width,
            ci_high: mean + half_width,
            mean_norm,
            worst_score: scores.iter().cloned().fold(f64::INFINITY, f64::min),
            win_ratio: scores.iter().filter(|s| **s > 0.0).count() as f64 / n,
            dominance_index: scores.iter().filter(|s| **s > dominance_threshold).count() as f64 / n,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentReport {
    /// Mean of per-match average scores
    pub final_scores: BTreeMap<String, f64>,
    pub stats: BTreeMap<String, StrategyStats>,
    /// One per pairing, in pairing order
    pub matchups: Vec<MatchRecord>,
    pub metrics: Vec<MatchMetrics>,
}

impl TournamentReport {
    /// Names by final score, best first; ties broken by name
    pub fn ranking(&self) -> Vec<(String, f64)> {
        let mut ranking: Vec<(String, f64)> =
            self.final_scores.iter().map(|(name, score)| (name.clone(), *score)).collect();
        ranking.sort_by(|(na, sa), (nb, sb)| sb.total_cmp(sa).then_with(|| na.cmp(nb)));
        ranking
    }
}

/// Run every game of the tournament and aggregate the report
pub fn run_tournament(config: &TournamentConfig, roster: &[Entrant]) -> Result<TournamentReport> {
    config.validate()?;
    ensure_unique_names(roster)?;

    let n = roster.len() as u32;
    let jobs = schedule_jobs(n, config.games_per_match);
    log::info!(
        "tournament: {} strategies, {} pairings, {} games of {} rounds",
        n,
        generate_all_pairings(n).len(),
        jobs.len(),
        config.rounds_per_game
    );

    let scoring = config.scoring();
    let results = execute(&jobs, roster, config, &scoring)?;
    Ok(aggregate(config, roster, &results))
}

fn run_job(job: &GameJob, roster: &[Entrant], config: &TournamentConfig, scoring: &ScoreConfig) -> GameResult {
    play_game(
        &roster[job.a as usize],
        &roster[job.b as usize],
        config.rounds_per_game,
        scoring,
        config.seed,
        job.pairing,
        job.game,
    )
}

#[cfg(not(target_arch = "wasm32"))]
fn execute(
    jobs: &[GameJob],
    roster: &[Entrant],
    config: &TournamentConfig,
    scoring: &ScoreConfig,
) -> Result<Vec<GameResult>> {
    use rayon::prelude::*;

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = config.workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build().map_err(|e| ArenaError::WorkerPool(e.to_string()))?;
    Ok(pool.install(|| {
        jobs.par_iter()
            .map(|job| run_job(job, roster, config, scoring))
            .collect()
    }))
}

// no threads on wasm32
#[cfg(target_arch = "wasm32")]
fn execute(
    jobs: &[GameJob],
    roster: &[Entrant],
    config: &TournamentConfig,
    scoring: &ScoreConfig,
) -> Result<Vec<GameResult>> {
    Ok(jobs.iter().map(|job| run_job(job, roster, config, scoring)).collect())
}

fn aggregate(config: &TournamentConfig, roster: &[Entrant], results: &[GameResult]) -> TournamentReport {
    let games = config.games_per_match as usize;
    let mut scores: Vec<Vec<f64>> = vec![Vec::new(); roster.len()];
    let mut norms: Vec<Vec<f64>> = vec![Vec::new(); roster.len()];
    let mut matchups = Vec::new();

    let pairings = generate_all_pairings(roster.len() as u32);
    for ((a, b), chunk) in pairings.iter().zip(results.chunks(games)) {
        let (a, b) = (*a as usize, *b as usize);
        let count = chunk.len() as f64;
        let record = MatchRecord {
            strategy_a: roster[a].name().to_string(),
            strategy_b: roster[b].name().to_string(),
            games: chunk.len() as u32,
            avg_norm_a: chunk.iter().map(|r| r.norm_a).sum::<f64>() / count,
            avg_norm_b: chunk.iter().map(|r| r.norm_b).sum::<f64>() / count,
            avg_score_a: chunk.iter().map(|r| r.score_a).sum::<f64>() / count,
            avg_score_b: chunk.iter().map(|r| r.score_b).sum::<f64>() / count,
            wins_a: chunk.iter().map(|r| r.wins_a).sum(),
            wins_b: chunk.iter().map(|r| r.wins_b).sum(),
            draws: chunk.iter().map(|r| r.draws).sum(),
        };

        let metrics = MatchMetrics::from_record(&record);
        log::info!(
            "{} vs {}: {}-{}-{} (win rate {:.3} / {:.3}), avg score {:.2} / {:.2}, avg norm {:.3} / {:.3}",
            record.strategy_a,
            record.strategy_b,
            record.wins_a,
            record.draws,
            record.wins_b,
            metrics.win_rate_a,
            metrics.win_rate_b,
            record.avg_score_a,
            record.avg_score_b,
            record.avg_norm_a,
            record.avg_norm_b
        );

        scores[a].push(record.avg_score_a);
        scores[b].push(record.avg_score_b);
        norms[a].push(record.avg_norm_a);
        norms[b].push(record.avg_norm_b);
        matchups.push(record);
    }

    let mut final_scores = BTreeMap::new();
    let mut stats = BTreeMap::new();
    for (i, entrant) in roster.iter().enumerate() {
        let s = StrategyStats::from_matches(
            &scores[i],
            &norms[i],
            config.games_per_match,
            config.dominance_threshold,
        );
        final_scores.insert(entrant.name().to_string(), s.mean_score);
        stats.insert(entrant.name().to_string(), s);
    }

    let metrics = matchups.iter().map(MatchMetrics::from_record).collect();
    TournamentReport { final_scores, stats, matchups, metrics }
}

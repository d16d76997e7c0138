//! Command-line tournament runner
//!
//! Loads an arena file (or the built-in roster), applies flag overrides,
//! runs the round robin and logs the ranking.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use rps_logic::{
    run_tournament, ArenaSpec, MetaPreset, Move, PatternParams, StrategyKind, StrategySpec,
    TournamentConfig, TournamentReport,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Round-robin rock-paper-scissors tournament", long_about = None)]
struct Args {
    /// Arena file with `tournament` settings and a `roster`
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads for the game pool
    #[arg(short, long)]
    workers: Option<usize>,
    /// Rounds per game
    #[arg(long)]
    rounds: Option<u32>,
    /// Games per pairing
    #[arg(long)]
    games: Option<u32>,
    /// Print the full report as JSON on stdout
    #[arg(long)]
    json: bool,
    /// Write the full report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut TournamentConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(rounds) = self.rounds {
            config.rounds_per_game = rounds;
        }
        if let Some(games) = self.games {
            config.games_per_match = games;
        }
    }
}

fn load(path: &Path) -> anyhow::Result<ArenaSpec> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ArenaSpec::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

/// Fixed-policy baselines, the adaptive learners and every meta preset
fn default_arena() -> ArenaSpec {
    let mut roster = vec![
        StrategySpec::new(StrategyKind::Constant { play: Move::Rock }),
        StrategySpec::new(StrategyKind::Cycle),
        StrategySpec::new(StrategyKind::Copycat),
        StrategySpec::new(StrategyKind::Frequency),
        StrategySpec::new(StrategyKind::Random),
        StrategySpec::new(StrategyKind::Markov),
        StrategySpec::new(StrategyKind::CounterLast),
        StrategySpec::new(StrategyKind::QLearning),
        StrategySpec::new(StrategyKind::Pattern(PatternParams::default())),
        StrategySpec::named(
            "MirrorHunter",
            StrategyKind::Pattern(PatternParams {
                exploit_mirrors: true,
                ..PatternParams::default()
            }),
        ),
    ];
    roster.extend(MetaPreset::ALL.into_iter().map(|preset| StrategySpec::new(StrategyKind::Meta { preset })));
    ArenaSpec {
        tournament: TournamentConfig::default(),
        roster,
    }
}

fn log_ranking(report: &TournamentReport) {
    log::info!(
        "{:>4} {:<20} {:>9} {:>19} {:>9} {:>6} {:>6}",
        "rank",
        "strategy",
        "score",
        "95% ci",
        "worst",
        "wins",
        "dom"
    );
    for (rank, (name, score)) in report.ranking().iter().enumerate() {
        let Some(stats) = report.stats.get(name) else { continue };
        log::info!(
            "{:>4} {:<20} {:>9.2} [{:>8.2},{:>8.2}] {:>9.2} {:>6.2} {:>6.2}",
            rank + 1,
            name,
            score,
            stats.ci_low,
            stats.ci_high,
            stats.worst_score,
            stats.win_ratio,
            stats.dominance_index
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut arena = match &args.config {
        Some(path) => load(path)?,
        None => default_arena(),
    };
    args.apply(&mut arena.tournament);

    let roster = arena.build_roster().context("building roster")?;
    let report = run_tournament(&arena.tournament, &roster).context("running tournament")?;
    log_ranking(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("report written to {}", path.display());
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

//! End-to-end tournament scenarios.

use rps_logic::{
    build_roster, run_tournament, ArenaError, ArenaSpec, Constant, Entrant, MetaPreset, Move,
    RandomPlay, StrategyKind, StrategySpec, TournamentConfig,
};

fn config(rounds: u32, games: u32) -> TournamentConfig {
    TournamentConfig {
        rounds_per_game: rounds,
        games_per_match: games,
        ..TournamentConfig::default()
    }
}

#[test]
fn test_rock_versus_paper() {
    let roster = vec![
        Entrant::new("AlwaysRock", |_| Constant(Move::Rock)),
        Entrant::new("AlwaysPaper", |_| Constant(Move::Paper)),
    ];
    let report = run_tournament(&config(10, 1), &roster).unwrap();

    let record = &report.matchups[0];
    assert_eq!((record.wins_a, record.wins_b, record.draws), (0, 10, 0));
    assert_eq!(record.avg_score_a, -100.0);
    assert_eq!(record.avg_score_b, 100.0);
    assert_eq!(report.final_scores["AlwaysRock"], -100.0);
    assert_eq!(report.final_scores["AlwaysPaper"], 100.0);
    assert_eq!(report.stats["AlwaysPaper"].dominance_index, 1.0);
    assert_eq!(report.stats["AlwaysRock"].win_ratio, 0.0);
    assert_eq!(report.ranking()[0].0, "AlwaysPaper");
}

#[test]
fn test_random_players_score_near_zero() {
    let roster = vec![
        Entrant::new("RandomA", RandomPlay::new),
        Entrant::new("RandomB", RandomPlay::new),
    ];
    let report = run_tournament(&config(2000, 1), &roster).unwrap();
    let score = report.final_scores["RandomA"];
    assert!(score.abs() < 20.0, "score {} not near zero", score);
    assert_eq!(report.matchups[0].wins_a + report.matchups[0].wins_b + report.matchups[0].draws, 2000);
}

#[test]
fn test_interval_shrinks_with_more_games() {
    let roster = vec![
        Entrant::new("RandomA", RandomPlay::new),
        Entrant::new("RandomB", RandomPlay::new),
        Entrant::new("RandomC", RandomPlay::new),
        Entrant::new("RandomD", RandomPlay::new),
    ];
    // short noisy games so single-game averages spread widely
    let few = run_tournament(&config(30, 1), &roster).unwrap();
    let many = run_tournament(&config(30, 60), &roster).unwrap();

    let width = |report: &rps_logic::TournamentReport| -> f64 {
        report
            .stats
            .values()
            .map(|s| s.ci_high - s.ci_low)
            .sum::<f64>()
    };
    assert!(width(&many) < width(&few), "{} !< {}", width(&many), width(&few));
}

#[test]
fn test_results_independent_of_worker_count() {
    let specs = vec![
        StrategySpec::new(StrategyKind::Random),
        StrategySpec::new(StrategyKind::Markov),
        StrategySpec::new(StrategyKind::Meta { preset: MetaPreset::HybridDeceptive }),
        StrategySpec::new(StrategyKind::Meta { preset: MetaPreset::ContextArbiter }),
    ];
    let roster = build_roster(&specs).unwrap();

    let serial = TournamentConfig { workers: Some(1), ..config(200, 3) };
    let parallel = TournamentConfig { workers: Some(4), ..config(200, 3) };
    let a = run_tournament(&serial, &roster).unwrap();
    let b = run_tournament(&parallel, &roster).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_seed_changes_results() {
    let roster = vec![
        Entrant::new("RandomA", RandomPlay::new),
        Entrant::new("RandomB", RandomPlay::new),
    ];
    let a = run_tournament(&TournamentConfig { seed: 1, ..config(100, 2) }, &roster).unwrap();
    let b = run_tournament(&TournamentConfig { seed: 2, ..config(100, 2) }, &roster).unwrap();
    assert_ne!(a.matchups, b.matchups);
}

#[test]
fn test_every_pair_plays_every_game() {
    let specs: Vec<StrategySpec> = [Move::Rock, Move::Paper, Move::Scissors]
        .into_iter()
        .map(|play| StrategySpec::new(StrategyKind::Constant { play }))
        .chain([StrategySpec::new(StrategyKind::Cycle), StrategySpec::new(StrategyKind::Copycat)])
        .collect();
    let roster = build_roster(&specs).unwrap();
    let report = run_tournament(&config(20, 3), &roster).unwrap();

    assert_eq!(report.matchups.len(), 10);
    for record in &report.matchups {
        assert_eq!(record.games, 3);
        assert_eq!(record.wins_a + record.wins_b + record.draws, 60);
    }
    for stats in report.stats.values() {
        assert_eq!(stats.matches, 4);
    }
    // first pairing is the first two roster entries
    assert_eq!(report.matchups[0].strategy_a, "AlwaysRock");
    assert_eq!(report.matchups[0].strategy_b, "AlwaysPaper");
}

#[test]
fn test_learners_beat_fixed_policies() {
    let specs = vec![
        StrategySpec::new(StrategyKind::Cycle),
        StrategySpec::new(StrategyKind::Constant { play: Move::Scissors }),
        StrategySpec::new(StrategyKind::Meta { preset: MetaPreset::AdaptiveQ }),
        StrategySpec::new(StrategyKind::Pattern(Default::default())),
    ];
    let roster = build_roster(&specs).unwrap();
    let report = run_tournament(&config(500, 2), &roster).unwrap();
    let ranking = report.ranking();
    let top: Vec<&str> = ranking.iter().take(2).map(|(n, _)| n.as_str()).collect();
    assert!(top.contains(&"AdaptiveQ"), "ranking {:?}", ranking);
    assert!(top.contains(&"Pattern"), "ranking {:?}", ranking);
}

#[test]
fn test_invalid_configuration_fails_fast() {
    let roster = vec![
        Entrant::new("AlwaysRock", |_| Constant(Move::Rock)),
        Entrant::new("AlwaysPaper", |_| Constant(Move::Paper)),
    ];
    assert!(matches!(
        run_tournament(&config(0, 1), &roster),
        Err(ArenaError::InvalidConfig { field: "rounds_per_game", .. })
    ));
    assert!(matches!(
        run_tournament(&config(10, 0), &roster),
        Err(ArenaError::InvalidConfig { field: "games_per_match", .. })
    ));
}

#[test]
fn test_scripted_entry_with_bad_move_is_rejected() {
    let json = r#"{
        "roster": [
            {"kind": {"type": "Scripted", "moves": ["rock", "lizard"]}},
            {"kind": {"type": "Cycle"}}
        ]
    }"#;
    let spec = ArenaSpec::from_json(json).unwrap();
    match spec.run() {
        Err(ArenaError::InvalidMove(name)) => assert_eq!(name, "lizard"),
        other => panic!("expected InvalidMove, got {:?}", other),
    }
}

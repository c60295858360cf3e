use chrono::Duration;

use hoops_edge::backtest::{self, BacktestHarness, chronological_folds};
use hoops_edge::config::PipelineConfig;
use hoops_edge::injury_impact::InjuryImpactEstimator;
use hoops_edge::model::{InjuryRecord, InjuryStatus, OddsLine};
use hoops_edge::predictor::{BaselineTrainer, RidgeTrainer};
use hoops_edge::synthetic::{SyntheticSeason, roster_name};

fn season() -> SyntheticSeason {
    SyntheticSeason {
        days: 40,
        ..SyntheticSeason::default()
    }
}

#[test]
fn folds_walk_forward_over_the_season() {
    let snap = season().snapshot();
    let config = PipelineConfig::default();
    let games = snap.completed_games(None, None);
    assert_eq!(games.len(), 40 * 4);

    let cache = BacktestHarness::new(&snap, &config, BaselineTrainer)
        .build_cache(&games)
        .expect("cache");

    assert_eq!(cache.folds.len(), config.folds);
    for pair in cache.folds.windows(2) {
        assert!(pair[0].last_eval_date < pair[1].first_eval_date);
        assert!(pair[0].train_games <= pair[1].train_games);
    }
    // Every evaluated game sits inside its fold's date range.
    for p in &cache.predictions {
        let fold = &cache.folds[p.fold];
        assert!(p.date >= fold.first_eval_date && p.date <= fold.last_eval_date);
    }
    assert!(!cache.predictions.is_empty());
}

#[test]
fn future_data_never_reaches_a_prediction() {
    let season = season();
    let config = PipelineConfig::default();

    let clean = season.snapshot();
    let games = clean.completed_games(None, None);
    let baseline = BacktestHarness::new(&clean, &config, BaselineTrainer)
        .build_cache(&games)
        .expect("clean cache");

    // Same season, plus a report dated after the last game that rules out every
    // team's best player, plus a wild line posted after each tip-off.
    let mut data = season.generate();
    let after = season.last_date() + Duration::days(1);
    for team in clean.stats.teams().map(str::to_string).collect::<Vec<_>>() {
        data.injuries.push(InjuryRecord {
            player: roster_name(&team, 0),
            team,
            status: InjuryStatus::Out,
            date: after,
        });
    }
    for g in &data.games {
        data.odds.push(OddsLine {
            game_id: g.id.clone(),
            line: 400.0,
            observed_at: g.start_time + Duration::minutes(5),
        });
    }
    let polluted = data.into_snapshot(clean.taken_at);
    let leaked = BacktestHarness::new(&polluted, &config, BaselineTrainer)
        .build_cache(&games)
        .expect("polluted cache");

    assert_eq!(baseline.predictions, leaked.predictions);
    assert_eq!(baseline.failures, leaked.failures);
}

#[test]
fn next_day_report_stays_out_of_earlier_games() {
    let season = season();
    let config = PipelineConfig::default();
    let clean = season.snapshot();
    let games = clean.completed_games(None, None);
    let baseline = BacktestHarness::new(&clean, &config, BaselineTrainer)
        .build_cache(&games)
        .expect("clean cache");

    let mid = &baseline.predictions[baseline.len() / 2];
    let day = mid.date;
    let next = day + Duration::days(1);
    let team = clean.game(&mid.game_id).expect("game").home.clone();

    // Replace the next day's report with one ruling out the team's best player.
    let mut data = season.generate();
    data.injuries.retain(|r| r.date != next);
    data.injuries.push(InjuryRecord {
        player: roster_name(&team, 0),
        team: team.clone(),
        status: InjuryStatus::Out,
        date: next,
    });
    let polluted = data.into_snapshot(clean.taken_at);

    let estimator = InjuryImpactEstimator::new(&polluted, &config);
    assert!(estimator.estimate(&team, next).expect("next-day impact") >= 4.0);
    assert_eq!(
        estimator.estimate(&team, day).expect("impact"),
        InjuryImpactEstimator::new(&clean, &config).estimate(&team, day).expect("impact"),
    );

    let leaked = BacktestHarness::new(&polluted, &config, BaselineTrainer)
        .build_cache(&games)
        .expect("polluted cache");
    let through = |cache: &backtest::PredictionCache| {
        cache
            .predictions
            .iter()
            .filter(|p| p.date <= day)
            .cloned()
            .collect::<Vec<_>>()
    };
    let before = through(&baseline);
    assert!(before.iter().any(|p| p.game_id == mid.game_id));
    assert_eq!(before, through(&leaked));
}

#[test]
fn stale_lines_are_excluded_in_strict_mode() {
    let season = season();
    let clean = season.snapshot();
    let games = clean.completed_games(None, None);

    // Every line posted ten days before its game.
    let mut data = season.generate();
    for odds in &mut data.odds {
        odds.observed_at -= Duration::days(10);
    }
    let aged = data.into_snapshot(clean.taken_at);

    let lenient_config = PipelineConfig::default();
    let lenient = BacktestHarness::new(&aged, &lenient_config, BaselineTrainer)
        .build_cache(&games)
        .expect("lenient cache");
    assert!(!lenient.predictions.is_empty());
    assert!(lenient.predictions.iter().all(|p| p.line.is_some()));

    let mut strict_config = PipelineConfig::default();
    strict_config.freshness.strict = true;
    let strict = BacktestHarness::new(&aged, &strict_config, BaselineTrainer)
        .build_cache(&games)
        .expect("strict cache");
    assert!(strict.predictions.is_empty());
    let stale: Vec<_> = strict
        .failures
        .iter()
        .filter(|f| f.reason.contains("stale"))
        .collect();
    assert_eq!(stale.len(), lenient.predictions.len());
    assert_eq!(strict.failures.len(), lenient.failures.len() + stale.len());
}

#[test]
fn lines_used_were_posted_before_tip_off() {
    let snap = season().snapshot();
    let config = PipelineConfig::default();
    let games = snap.completed_games(None, None);
    let cache = BacktestHarness::new(&snap, &config, BaselineTrainer)
        .build_cache(&games)
        .expect("cache");

    for p in &cache.predictions {
        let game = snap.game(&p.game_id).expect("game");
        let expected = snap.line_for(game).map(|l| l.line);
        assert_eq!(p.line, expected);
        if let Some(line) = snap.line_for(game) {
            assert!(line.observed_at < game.start_time);
        }
    }
}

#[test]
fn raising_the_threshold_never_adds_bets() {
    let snap = season().snapshot();
    let config = PipelineConfig::default();
    let games = snap.completed_games(None, None);
    let cache = BacktestHarness::new(&snap, &config, BaselineTrainer)
        .build_cache(&games)
        .expect("cache");

    let results = backtest::evaluate(
        &cache,
        config.calibration_constant,
        &[2.0, 4.0, 8.0, 12.0],
        &config.decision,
        config.payout_ratio,
    );
    assert_eq!(results.len(), 4);
    for pair in results.windows(2) {
        assert!(pair[1].bets_placed <= pair[0].bets_placed);
        assert_eq!(pair[0].games_considered, cache.len());
        assert_eq!(pair[0].mae, pair[1].mae);
    }
    for r in &results {
        assert_eq!(r.bets_placed, r.wins + r.losses + r.pushes);
        assert!(r.accuracy >= 0.0 && r.accuracy <= 1.0);
    }

    let bands = backtest::deviation_bands(&cache, config.calibration_constant, config.payout_ratio);
    let banded: usize = bands.iter().map(|b| b.games).sum();
    let with_line = cache.predictions.iter().filter(|p| p.line.is_some()).count();
    assert_eq!(banded, with_line);
}

#[test]
fn ridge_model_learns_a_sane_total() {
    let snap = season().snapshot();
    let config = PipelineConfig::default();
    let games = snap.completed_games(None, None);
    let cache = BacktestHarness::new(&snap, &config, RidgeTrainer { l2: 50.0 })
        .build_cache(&games)
        .expect("ridge cache");

    assert_eq!(cache.model, "ridge");
    assert!(!cache.predictions.is_empty());
    assert!(cache.predictions.iter().all(|p| p.raw_estimate.is_finite()));
    let mean = cache.predictions.iter().map(|p| p.raw_estimate).sum::<f64>() / cache.len() as f64;
    assert!(mean > 190.0 && mean < 250.0, "mean estimate {mean}");
    let report = cache.calibration_report(0.0);
    assert_eq!(report.samples, cache.len());
    assert!(report.mae_raw < 40.0);
}

#[test]
fn folds_on_the_sorted_completed_games_match_the_harness() {
    let snap = season().snapshot();
    let games = snap.completed_games(None, None);
    let folds = chronological_folds(&games, 5);
    assert_eq!(folds.len(), 5);
    assert_eq!(folds[0].eval.start, folds[0].train.end);
    assert_eq!(folds.last().unwrap().eval.end, games.len());
}

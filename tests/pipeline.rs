use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use hoops_edge::PipelineError;
use hoops_edge::config::PipelineConfig;
use hoops_edge::features::{FeatureSchema, FeatureVector};
use hoops_edge::injury_impact::ImpactStrategyKind;
use hoops_edge::model::{
    Game, InjuryRecord, InjuryStatus, OddsLine, PlayerProfile, Side, SkipReason, TeamGameStat, Tier,
};
use hoops_edge::pipeline::Pipeline;
use hoops_edge::predictor::{BaselinePredictor, Predictor};
use hoops_edge::snapshot::DataSnapshot;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

fn tip(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, d, 0, 30, 0).unwrap()
}

/// Five games for `team` on Jan 1-5, scoring `points` each time.
fn history(team: &str, points: f64) -> Vec<TeamGameStat> {
    (1..=5)
        .map(|d| TeamGameStat {
            team: team.to_string(),
            game_id: format!("{team}-h{d}"),
            date: day(d),
            points_for: points,
            points_against: 110.0,
            pace: 99.0,
            shooting_efficiency: None,
        })
        .collect()
}

fn game(id: &str, home: &str, away: &str, d: u32) -> Game {
    Game {
        id: id.to_string(),
        date: day(d),
        start_time: tip(d),
        home: home.to_string(),
        away: away.to_string(),
        home_score: None,
        away_score: None,
    }
}

fn line(game_id: &str, value: f64, observed_at: DateTime<Utc>) -> OddsLine {
    OddsLine {
        game_id: game_id.to_string(),
        line: value,
        observed_at,
    }
}

/// An injury report for Jan 10 that lists nobody on the teams under test.
fn quiet_report() -> Vec<InjuryRecord> {
    vec![InjuryRecord {
        team: "LAL".to_string(),
        player: "Bench Guy".to_string(),
        status: InjuryStatus::Probable,
        date: day(10),
    }]
}

fn snapshot(
    games: Vec<Game>,
    stats: Vec<TeamGameStat>,
    injuries: Vec<InjuryRecord>,
    profiles: Vec<PlayerProfile>,
    odds: Vec<OddsLine>,
) -> DataSnapshot {
    let taken_at = Utc.with_ymd_and_hms(2025, 1, 9, 18, 0, 0).unwrap();
    DataSnapshot::new(taken_at, games, stats, injuries, profiles, odds)
}

fn bos_nyk_snapshot(injuries: Vec<InjuryRecord>, profiles: Vec<PlayerProfile>) -> DataSnapshot {
    let mut stats = history("BOS", 112.0);
    stats.extend(history("NYK", 108.0));
    snapshot(
        vec![game("g1", "BOS", "NYK", 10)],
        stats,
        injuries,
        profiles,
        vec![
            line("g1", 213.5, tip(10) - Duration::hours(20)),
            line("g1", 215.0, tip(10) - Duration::hours(6)),
            line("g1", 240.0, tip(10) + Duration::hours(1)),
        ],
    )
}

#[test]
fn healthy_matchup_is_a_strong_over() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let pipeline = Pipeline::new(&snap, &config);

    let signal = pipeline
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("signal");

    assert!((signal.prediction.raw_estimate - 220.0).abs() < 1e-9);
    assert!((signal.prediction.calibrated_estimate - 222.7).abs() < 1e-9);
    assert_eq!(signal.prediction.game_id.as_deref(), Some("g1"));
    // Latest line before tip-off, never the one posted after.
    assert_eq!(signal.signal.line, Some(215.0));
    assert!((signal.signal.deviation.unwrap() - 7.7).abs() < 1e-9);
    assert_eq!(signal.signal.tier, Tier::Strong);
    assert_eq!(signal.signal.side, Side::Over);
    assert_eq!(signal.signal.skip_reason, None);
    assert_eq!(signal.home_injury_impact, 0.0);
    // The ten-game window only has five games behind it.
    assert!(signal.low_confidence);
}

#[test]
fn calibration_override_changes_the_decision() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let pipeline = Pipeline::new(&snap, &config);

    let signal = pipeline
        .predict_matchup("BOS", "NYK", day(10), Some(-1.0))
        .expect("signal");

    assert!((signal.prediction.calibrated_estimate - 219.0).abs() < 1e-9);
    assert_eq!(signal.prediction.calibration_constant, -1.0);
    assert_eq!(signal.signal.tier, Tier::Moderate);
    assert_eq!(signal.signal.side, Side::Over);
}

#[test]
fn star_out_removes_the_edge() {
    let injuries = vec![InjuryRecord {
        team: "BOS".to_string(),
        player: "Star Forward".to_string(),
        status: InjuryStatus::Out,
        date: day(10),
    }];
    let profiles = vec![PlayerProfile {
        player: "Star Forward".to_string(),
        ppg: 25.0,
        usage_rate: Some(0.3),
    }];
    let snap = bos_nyk_snapshot(injuries, profiles);
    let config = PipelineConfig::default();
    let pipeline = Pipeline::new(&snap, &config);

    let signal = pipeline
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("signal");

    assert!((signal.home_injury_impact - 5.0).abs() < 1e-9);
    assert!((signal.prediction.raw_estimate - 215.0).abs() < 1e-9);
    assert_eq!(signal.signal.tier, Tier::Skip);
    assert_eq!(signal.signal.skip_reason, Some(SkipReason::NoEdge));
}

#[test]
fn usage_weighted_strategy_is_selected_by_config() {
    let injuries = vec![InjuryRecord {
        team: "BOS".to_string(),
        player: "Star Forward".to_string(),
        status: InjuryStatus::Out,
        date: day(10),
    }];
    let profiles = vec![PlayerProfile {
        player: "Star Forward".to_string(),
        ppg: 25.0,
        usage_rate: Some(0.3),
    }];
    let snap = bos_nyk_snapshot(injuries, profiles);
    let config = PipelineConfig {
        injury_strategy: ImpactStrategyKind::UsageWeighted,
        ..PipelineConfig::default()
    };

    let signal = Pipeline::new(&snap, &config)
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("signal");

    // 25 / 5 scaled by 0.30 / 0.20 usage.
    assert!((signal.home_injury_impact - 7.5).abs() < 1e-9);
    assert!((signal.prediction.raw_estimate - 212.5).abs() < 1e-9);
}

#[test]
fn injury_report_from_tomorrow_is_ignored() {
    let mut injuries = quiet_report();
    injuries.push(InjuryRecord {
        team: "BOS".to_string(),
        player: "Star Forward".to_string(),
        status: InjuryStatus::Out,
        date: day(11),
    });
    let snap = bos_nyk_snapshot(injuries, Vec::new());
    let config = PipelineConfig::default();
    let pipeline = Pipeline::new(&snap, &config);

    let signal = pipeline
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("signal");
    assert_eq!(signal.home_injury_impact, 0.0);
    assert!((signal.prediction.raw_estimate - 220.0).abs() < 1e-9);
}

#[test]
fn missing_injury_report_is_an_error_unless_allowed() {
    let snap = bos_nyk_snapshot(Vec::new(), Vec::new());
    let config = PipelineConfig::default();
    let err = Pipeline::new(&snap, &config)
        .predict_matchup("BOS", "NYK", day(10), None)
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingInjuryReport { .. }));

    let lenient = PipelineConfig {
        require_injury_report: false,
        ..PipelineConfig::default()
    };
    let signal = Pipeline::new(&snap, &lenient)
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("signal without report");
    assert_eq!(signal.signal.tier, Tier::Strong);
}

#[test]
fn unscheduled_matchup_has_no_line() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let pipeline = Pipeline::new(&snap, &config);

    let signal = pipeline
        .predict_matchup("NYK", "BOS", day(10), None)
        .expect("signal");
    assert_eq!(signal.prediction.game_id, None);
    assert_eq!(signal.signal.line, None);
    assert_eq!(signal.signal.skip_reason, Some(SkipReason::NoLine));
    assert!(!signal.signal.is_bet());
}

#[test]
fn team_without_history_fails_the_prediction() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let err = Pipeline::new(&snap, &config)
        .predict_matchup("BOS", "EXP", day(10), None)
        .unwrap_err();
    match err {
        PipelineError::InsufficientHistory { team, as_of } => {
            assert_eq!(team, "EXP");
            assert_eq!(as_of, day(10));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn stale_line_fails_only_in_strict_mode() {
    let mut stats = history("BOS", 112.0);
    stats.extend(history("NYK", 108.0));
    let snap = snapshot(
        vec![game("g1", "BOS", "NYK", 10)],
        stats,
        quiet_report(),
        Vec::new(),
        vec![line("g1", 215.0, tip(10) - Duration::hours(72))],
    );

    let config = PipelineConfig::default();
    let signal = Pipeline::new(&snap, &config)
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("stale line is only a warning");
    assert_eq!(signal.signal.line, Some(215.0));

    let mut strict = PipelineConfig::default();
    strict.freshness.strict = true;
    let err = Pipeline::new(&snap, &strict)
        .predict_matchup("BOS", "NYK", day(10), None)
        .unwrap_err();
    assert!(matches!(err, PipelineError::StaleSnapshot { .. }));
}

#[test]
fn predictor_for_another_schema_is_rejected() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let other = BaselinePredictor::new(&FeatureSchema::new(&[3]));
    let err = Pipeline::with_predictor(&snap, &config, Box::new(other))
        .err()
        .expect("mismatch");
    assert!(matches!(err, PipelineError::FeatureSchemaMismatch { .. }));
}

#[test]
fn slate_ranks_by_deviation_and_isolates_failures() {
    let mut stats = history("BOS", 112.0);
    stats.extend(history("NYK", 108.0));
    stats.extend(history("MIA", 105.0));
    stats.extend(history("CHI", 110.0));
    stats.extend(history("DEN", 115.0));
    stats.extend(history("PHX", 113.0));

    let games = vec![
        game("g1", "BOS", "NYK", 10),
        game("g2", "MIA", "CHI", 10),
        game("g3", "DEN", "PHX", 10),
        game("g4", "LAL", "NEW", 10),
        game("g5", "BOS", "MIA", 11),
    ];
    let odds = vec![
        line("g1", 215.0, tip(10) - Duration::hours(3)),
        // 105 + 110 + 2.7 = 217.7 against 219.0: no edge.
        line("g2", 219.0, tip(10) - Duration::hours(3)),
        line("g4", 220.0, tip(10) - Duration::hours(3)),
    ];
    let snap = snapshot(games, stats, quiet_report(), Vec::new(), odds);
    let config = PipelineConfig::default();
    let report = Pipeline::new(&snap, &config)
        .predict_slate(day(10), None)
        .expect("slate");

    let ids: Vec<_> = report
        .signals
        .iter()
        .map(|s| s.prediction.game_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["g1", "g2", "g3"]);
    assert_eq!(report.signals[2].signal.skip_reason, Some(SkipReason::NoLine));
    assert_eq!(report.bets().count(), 1);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].game_id, "g4");
    assert!(report.failures[0].reason.contains("LAL"));
}

#[test]
fn signal_record_carries_the_decision() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let signal = Pipeline::new(&snap, &config)
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("signal");

    let created = Utc.with_ymd_and_hms(2025, 1, 9, 20, 0, 0).unwrap();
    let record = signal.record(created);
    assert_eq!(record.game_id.as_deref(), Some("g1"));
    assert_eq!(record.side, Side::Over);
    assert_eq!(record.tier, Tier::Strong);
    assert_eq!(record.line, Some(215.0));
    assert_eq!(record.feature_version, signal.features.version);
    assert_eq!(record.created_at, created);
}

#[test]
fn game_id_lookup() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let pipeline = Pipeline::new(&snap, &config);

    let by_id = pipeline.predict_by_id("g1", None).expect("signal");
    let by_matchup = pipeline
        .predict_matchup("BOS", "NYK", day(10), None)
        .expect("signal");
    assert_eq!(by_id.prediction, by_matchup.prediction);
    assert_eq!(by_id.signal, by_matchup.signal);

    let err = pipeline.predict_by_id("g404", None).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownGame(ref id) if id == "g404"));
}

/// Passes the version check, then fails like a corrupt model file.
struct CorruptModel {
    version: String,
}

impl Predictor for CorruptModel {
    fn name(&self) -> &'static str {
        "corrupt"
    }

    fn feature_version(&self) -> &str {
        &self.version
    }

    fn estimate(&self, _features: &FeatureVector) -> hoops_edge::Result<f64> {
        Err(PipelineError::InvalidConfig("model weights unreadable".to_string()))
    }
}

#[test]
fn model_faults_abort_the_slate() {
    let snap = bos_nyk_snapshot(quiet_report(), Vec::new());
    let config = PipelineConfig::default();
    let version = FeatureSchema::new(&config.windows).version().to_string();
    let pipeline =
        Pipeline::with_predictor(&snap, &config, Box::new(CorruptModel { version })).expect("pipeline");

    let err = pipeline.predict_slate(day(10), None).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    assert!(!err.is_per_game());
}

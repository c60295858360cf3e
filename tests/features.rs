use chrono::{Duration, NaiveDate};

use hoops_edge::config::PipelineConfig;
use hoops_edge::features::{FeatureBuilder, FeatureVector};
use hoops_edge::model::TeamGameStat;
use hoops_edge::synthetic::SyntheticSeason;

fn season() -> SyntheticSeason {
    SyntheticSeason {
        days: 20,
        ..SyntheticSeason::default()
    }
}

#[test]
fn vectors_are_deterministic_and_serializable() {
    let snap = season().snapshot();
    let config = PipelineConfig::default();
    let builder = FeatureBuilder::new(&snap, &config);
    let game = snap
        .games_on(season().last_date())
        .next()
        .expect("scheduled game");

    let first = builder.build_for_game(game).expect("features");
    let second = builder.build_for_game(game).expect("features");
    assert_eq!(first, second);
    assert_eq!(first.len(), builder.schema().len());
    builder.schema().check(&first).expect("schema");

    let json = serde_json::to_string(&first).unwrap();
    let back: FeatureVector = serde_json::from_str(&json).unwrap();
    assert_eq!(back, first);
}

#[test]
fn later_results_do_not_change_earlier_features() {
    let season = season();
    let config = PipelineConfig::default();
    let snap = season.snapshot();
    let target = snap.games_on(season.start + Duration::days(12)).next().expect("game").clone();
    let before = FeatureBuilder::new(&snap, &config)
        .build_for_game(&target)
        .expect("features");

    // A blowout for both teams on the game's own date and one after it.
    let mut data = season.generate();
    for (offset, team) in [(0, &target.home), (1, &target.away)] {
        let date: NaiveDate = target.date + Duration::days(offset);
        data.stats.push(TeamGameStat {
            team: team.clone(),
            game_id: format!("late-{offset}"),
            date,
            points_for: 190.0,
            points_against: 60.0,
            pace: 130.0,
            shooting_efficiency: None,
        });
    }
    let polluted = data.into_snapshot(snap.taken_at);
    let after = FeatureBuilder::new(&polluted, &config)
        .build_for_game(&target)
        .expect("features");
    assert_eq!(before, after);
}

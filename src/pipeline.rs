use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::calibration::Calibrator;
use crate::config::PipelineConfig;
use crate::edge::EdgeDecisionEngine;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureBuilder, FeatureVector};
use crate::injury_impact::ConfiguredImpact;
use crate::model::{BetSignal, Game, OddsLine, Prediction};
use crate::predictor::{BaselinePredictor, Predictor};
use crate::review::SignalRecord;
use crate::snapshot::DataSnapshot;

/// Everything produced for one game: features, prediction and decision.
#[derive(Debug, Clone, Serialize)]
pub struct GameSignal {
    pub home: String,
    pub away: String,
    pub date: NaiveDate,
    pub start_time: Option<DateTime<Utc>>,
    pub home_injury_impact: f64,
    pub away_injury_impact: f64,
    pub line_observed_at: Option<DateTime<Utc>>,
    pub low_confidence: bool,
    pub prediction: Prediction,
    pub signal: BetSignal,
    #[serde(skip)]
    pub features: FeatureVector,
}

impl GameSignal {
    pub fn record(&self, created_at: DateTime<Utc>) -> SignalRecord {
        SignalRecord {
            game_id: self.prediction.game_id.clone(),
            home: self.home.clone(),
            away: self.away.clone(),
            date: self.date,
            raw_estimate: self.prediction.raw_estimate,
            calibrated_estimate: self.prediction.calibrated_estimate,
            calibration_constant: self.prediction.calibration_constant,
            line: self.signal.line,
            deviation: self.signal.deviation,
            tier: self.signal.tier,
            side: self.signal.side,
            skip_reason: self.signal.skip_reason,
            feature_version: self.prediction.feature_version.clone(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlateFailure {
    pub game_id: String,
    pub home: String,
    pub away: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SlateReport {
    /// Ranked by |deviation|, largest first; games without a line last.
    pub signals: Vec<GameSignal>,
    pub failures: Vec<SlateFailure>,
}

impl SlateReport {
    pub fn bets(&self) -> impl Iterator<Item = &GameSignal> {
        self.signals.iter().filter(|s| s.signal.is_bet())
    }
}

pub struct Pipeline<'a> {
    snapshot: &'a DataSnapshot,
    config: &'a PipelineConfig,
    builder: FeatureBuilder<'a, ConfiguredImpact>,
    predictor: Box<dyn Predictor>,
    engine: EdgeDecisionEngine,
}

impl<'a> Pipeline<'a> {
    /// Pipeline with the baseline predictor for the configured windows.
    pub fn new(snapshot: &'a DataSnapshot, config: &'a PipelineConfig) -> Self {
        let builder = FeatureBuilder::new(snapshot, config);
        let predictor = Box::new(BaselinePredictor::new(builder.schema()));
        Self {
            snapshot,
            config,
            builder,
            predictor,
            engine: EdgeDecisionEngine::new(config.decision),
        }
    }

    pub fn with_predictor(
        snapshot: &'a DataSnapshot,
        config: &'a PipelineConfig,
        predictor: Box<dyn Predictor>,
    ) -> Result<Self> {
        let builder = FeatureBuilder::new(snapshot, config);
        if predictor.feature_version() != builder.schema().version() {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: predictor.feature_version().to_string(),
                found: builder.schema().version().to_string(),
            });
        }
        Ok(Self {
            snapshot,
            config,
            builder,
            predictor,
            engine: EdgeDecisionEngine::new(config.decision),
        })
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }

    /// Single matchup. Uses the scheduled game (and its line) when one exists on `date`;
    /// otherwise predicts the bare matchup with no line.
    pub fn predict_matchup(
        &self,
        home: &str,
        away: &str,
        date: NaiveDate,
        calibration: Option<f64>,
    ) -> Result<GameSignal> {
        match self.snapshot.find_matchup(home, away, date) {
            Some(game) => self.predict_game(game, calibration),
            None => {
                info!(home, away, %date, "no scheduled game found, predicting without a line");
                self.assemble(home, away, date, None, None, calibration)
            }
        }
    }

    pub fn predict_game(&self, game: &Game, calibration: Option<f64>) -> Result<GameSignal> {
        let line = self.snapshot.checked_line_for(game, &self.config.freshness)?;
        self.assemble(
            &game.home,
            &game.away,
            game.date,
            Some(game),
            line,
            calibration,
        )
    }

    pub fn predict_by_id(&self, game_id: &str, calibration: Option<f64>) -> Result<GameSignal> {
        let game = self
            .snapshot
            .game(game_id)
            .ok_or_else(|| PipelineError::UnknownGame(game_id.to_string()))?;
        self.predict_game(game, calibration)
    }

    /// Every game scheduled on `date`. Per-game failures are collected into the report;
    /// anything else (a predictor/schema fault) aborts the slate.
    pub fn predict_slate(&self, date: NaiveDate, calibration: Option<f64>) -> Result<SlateReport> {
        let games: Vec<&Game> = self.snapshot.games_on(date).collect();
        let results: Vec<(Option<GameSignal>, Option<SlateFailure>)> = games
            .par_iter()
            .map(|game| match self.predict_game(game, calibration) {
                Ok(signal) => Ok((Some(signal), None)),
                Err(err) if err.is_per_game() => Ok((
                    None,
                    Some(SlateFailure {
                        game_id: game.id.clone(),
                        home: game.home.clone(),
                        away: game.away.clone(),
                        reason: err.to_string(),
                    }),
                )),
                Err(err) => Err(err),
            })
            .collect::<Result<_>>()?;

        let mut report = SlateReport::default();
        for (signal, failure) in results {
            if let Some(signal) = signal {
                report.signals.push(signal);
            }
            if let Some(failure) = failure {
                warn!(game = %failure.game_id, reason = %failure.reason, "slate game skipped");
                report.failures.push(failure);
            }
        }
        rank_signals(&mut report.signals);
        info!(
            %date,
            games = games.len(),
            signals = report.signals.len(),
            bets = report.bets().count(),
            failures = report.failures.len(),
            "slate complete"
        );
        Ok(report)
    }

    fn assemble(
        &self,
        home: &str,
        away: &str,
        date: NaiveDate,
        game: Option<&Game>,
        line: Option<&OddsLine>,
        calibration: Option<f64>,
    ) -> Result<GameSignal> {
        let mut features = self.builder.build(home, away, date)?;
        features.game_id = game.map(|g| g.id.clone());
        let raw = self.predictor.predict(&features)?;

        let calibrator = Calibrator::new(calibration.unwrap_or(self.config.calibration_constant));
        let prediction = calibrator.apply(features.game_id.clone(), date, raw, &features.version);
        let signal = self.engine.decide_for(&prediction, line);

        let home_injury_impact = features
            .get(crate::features::HOME_INJURY_IMPACT)
            .unwrap_or(0.0);
        let away_injury_impact = features
            .get(crate::features::AWAY_INJURY_IMPACT)
            .unwrap_or(0.0);

        Ok(GameSignal {
            home: home.to_string(),
            away: away.to_string(),
            date,
            start_time: game.map(|g| g.start_time),
            home_injury_impact,
            away_injury_impact,
            line_observed_at: line.map(|l| l.observed_at),
            low_confidence: features.is_low_confidence(),
            prediction,
            signal,
            features,
        })
    }
}

/// Largest |deviation| first, no-line signals last, ties broken by game id.
pub fn rank_signals(signals: &mut [GameSignal]) {
    signals.sort_by(|a, b| {
        let da = a.signal.abs_deviation();
        let db = b.signal.abs_deviation();
        match (da, db) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| a.prediction.game_id.cmp(&b.prediction.game_id))
    });
}

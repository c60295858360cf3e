use std::ops::Range;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calibration::{CalibrationReport, calibrate, calibration_report};
use crate::config::PipelineConfig;
use crate::edge::{DeviationThresholds, EdgeDecisionEngine};
use crate::error::Result;
use crate::features::{FeatureBuilder, FeatureVector};
use crate::model::{BacktestResult, Game, Side};
use crate::predictor::{Predictor, PredictorTrainer, TrainingRow};
use crate::snapshot::DataSnapshot;

/// Upper edges of the |deviation| bands; the last band is open-ended.
pub const BAND_EDGES: [f64; 8] = [2.0, 4.0, 6.0, 8.0, 10.0, 15.0, 20.0, f64::INFINITY];

/// One walk-forward split, as index ranges into the chronologically sorted games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub train: Range<usize>,
    pub eval: Range<usize>,
}

/// Cuts `games` into `folds + 1` contiguous chunks; fold k trains on chunks `0..k` and
/// evaluates chunk k. A cut never falls between two games on the same date.
/// `games` must already be in date order.
pub fn chronological_folds(games: &[Game], folds: usize) -> Vec<Fold> {
    let n = games.len();
    let chunks = folds + 1;
    if n < 2 || folds == 0 {
        return Vec::new();
    }

    let mut cuts: Vec<usize> = Vec::with_capacity(folds);
    let mut prev = 0usize;
    for k in 1..chunks {
        let mut cut = ((k * n) as f64 / chunks as f64).round() as usize;
        cut = cut.max(prev);
        while cut > 0 && cut < n && games[cut].date == games[cut - 1].date {
            cut += 1;
        }
        if cut > prev && cut < n {
            cuts.push(cut);
            prev = cut;
        }
    }

    cuts.iter()
        .enumerate()
        .map(|(index, &start)| {
            let end = cuts.get(index + 1).copied().unwrap_or(n);
            Fold {
                index,
                train: 0..start,
                eval: start..end,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedPrediction {
    pub game_id: String,
    pub date: NaiveDate,
    pub fold: usize,
    pub raw_estimate: f64,
    /// Latest line observed before tip-off, if any.
    pub line: Option<f64>,
    pub actual_total: f64,
    pub feature_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameFailure {
    pub game_id: String,
    pub date: NaiveDate,
    pub reason: String,
}

type Evaluated = (Option<CachedPrediction>, Option<GameFailure>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldSummary {
    pub index: usize,
    pub train_games: usize,
    pub eval_games: usize,
    pub first_eval_date: NaiveDate,
    pub last_eval_date: NaiveDate,
    /// Mean `actual - raw` over this fold's training rows.
    pub train_bias: f64,
}

/// Raw predictions for every evaluated game. Re-evaluating under another calibration
/// constant or threshold set only reruns calibration and the decision engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionCache {
    pub model: String,
    pub predictions: Vec<CachedPrediction>,
    pub failures: Vec<GameFailure>,
    pub folds: Vec<FoldSummary>,
}

impl PredictionCache {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Error metrics of the evaluated games under `constant`. The suggested constant is the
    /// training bias of the last fold, so evaluation outcomes never feed it.
    pub fn calibration_report(&self, constant: f64) -> CalibrationReport {
        let pairs: Vec<(f64, f64)> = self
            .predictions
            .iter()
            .map(|p| (p.raw_estimate, p.actual_total))
            .collect();
        let mut report = calibration_report(&pairs, constant);
        report.suggested_constant = self.folds.last().map(|f| f.train_bias).unwrap_or(0.0);
        report
    }
}

pub struct BacktestHarness<'a, T: PredictorTrainer> {
    snapshot: &'a DataSnapshot,
    config: &'a PipelineConfig,
    trainer: T,
}

impl<'a, T: PredictorTrainer> BacktestHarness<'a, T> {
    pub fn new(snapshot: &'a DataSnapshot, config: &'a PipelineConfig, trainer: T) -> Self {
        Self {
            snapshot,
            config,
            trainer,
        }
    }

    /// Predictions for every game in the evaluated folds. Features for all games are
    /// built once; each fold's predictor sees only its training rows.
    pub fn build_cache(&self, games: &[Game]) -> Result<PredictionCache> {
        let mut games: Vec<&Game> = games.iter().filter(|g| g.is_final()).collect();
        games.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.start_time.cmp(&b.start_time))
                .then_with(|| a.id.cmp(&b.id))
        });
        let owned: Vec<Game> = games.into_iter().cloned().collect();

        let builder = FeatureBuilder::new(self.snapshot, self.config);
        let schema = builder.schema().clone();
        let mut cache = PredictionCache {
            model: self.trainer.name().to_string(),
            ..PredictionCache::default()
        };

        let folds = chronological_folds(&owned, self.config.folds);
        if folds.is_empty() {
            warn!(games = owned.len(), "not enough games for a walk-forward split");
            return Ok(cache);
        }

        // Per-game faults are kept as the failure reason; anything else aborts the run.
        let features: Vec<std::result::Result<FeatureVector, String>> = owned
            .par_iter()
            .map(|game| match builder.build_for_game(game) {
                Ok(vector) => Ok(Ok(vector)),
                Err(err) if err.is_per_game() => Ok(Err(err.to_string())),
                Err(err) => Err(err),
            })
            .collect::<Result<_>>()?;

        for fold in &folds {
            let train_rows: Vec<TrainingRow<'_>> = fold
                .train
                .clone()
                .filter_map(|idx| {
                    let vector = features[idx].as_ref().ok()?;
                    let actual = owned[idx].total()?;
                    Some(TrainingRow {
                        features: vector,
                        actual_total: f64::from(actual),
                    })
                })
                .collect();

            let model = match self.trainer.fit(&schema, &train_rows) {
                Ok(model) => model,
                Err(err) => {
                    warn!(fold = fold.index, "fit failed: {err}");
                    for idx in fold.eval.clone() {
                        cache.failures.push(GameFailure {
                            game_id: owned[idx].id.clone(),
                            date: owned[idx].date,
                            reason: format!("fold {} fit failed: {err}", fold.index),
                        });
                    }
                    continue;
                }
            };

            let mut bias_sum = 0.0;
            let mut bias_n = 0usize;
            for row in &train_rows {
                if let Ok(raw) = model.predict(row.features) {
                    bias_sum += row.actual_total - raw;
                    bias_n += 1;
                }
            }
            let train_bias = if bias_n > 0 { bias_sum / bias_n as f64 } else { 0.0 };

            let evaluated: Vec<Evaluated> = fold
                .eval
                .clone()
                .into_par_iter()
                .map(|idx| -> Result<Evaluated> {
                    let game = &owned[idx];
                    let excluded = |reason: String| -> Result<Evaluated> {
                        let failure = GameFailure {
                            game_id: game.id.clone(),
                            date: game.date,
                            reason,
                        };
                        Ok((None, Some(failure)))
                    };
                    let vector = match &features[idx] {
                        Ok(vector) => vector,
                        Err(reason) => return excluded(reason.clone()),
                    };
                    let line = match self.snapshot.checked_line_for(game, &self.config.freshness) {
                        Ok(line) => line.map(|l| l.line),
                        Err(err) if err.is_per_game() => return excluded(err.to_string()),
                        Err(err) => return Err(err),
                    };
                    let raw = match model.predict(vector) {
                        Ok(raw) => raw,
                        Err(err) if err.is_per_game() => return excluded(err.to_string()),
                        Err(err) => return Err(err),
                    };
                    let Some(actual) = game.total() else {
                        return Ok((None, None));
                    };
                    let prediction = CachedPrediction {
                        game_id: game.id.clone(),
                        date: game.date,
                        fold: fold.index,
                        raw_estimate: raw,
                        line,
                        actual_total: f64::from(actual),
                        feature_version: schema.version().to_string(),
                    };
                    Ok((Some(prediction), None))
                })
                .collect::<Result<_>>()?;

            for (prediction, failure) in evaluated {
                if let Some(p) = prediction {
                    cache.predictions.push(p);
                }
                if let Some(f) = failure {
                    debug!(game = %f.game_id, reason = %f.reason, "excluded from backtest");
                    cache.failures.push(f);
                }
            }

            cache.folds.push(FoldSummary {
                index: fold.index,
                train_games: train_rows.len(),
                eval_games: fold.eval.len(),
                first_eval_date: owned[fold.eval.start].date,
                last_eval_date: owned[fold.eval.end - 1].date,
                train_bias,
            });
        }

        if !cache.failures.is_empty() {
            warn!(failed = cache.failures.len(), "games excluded from backtest");
        }
        info!(
            model = %cache.model,
            folds = cache.folds.len(),
            evaluated = cache.predictions.len(),
            "prediction cache built"
        );
        Ok(cache)
    }

    pub fn run(&self, games: &[Game], thresholds: &[f64]) -> Result<Vec<BacktestResult>> {
        let cache = self.build_cache(games)?;
        Ok(evaluate(
            &cache,
            self.config.calibration_constant,
            thresholds,
            &self.config.decision,
            self.config.payout_ratio,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    Win,
    Loss,
    Push,
}

pub fn settle(side: Side, line: f64, actual: f64) -> Option<Settlement> {
    if actual == line {
        return match side {
            Side::Skip => None,
            _ => Some(Settlement::Push),
        };
    }
    match side {
        Side::Over if actual > line => Some(Settlement::Win),
        Side::Under if actual < line => Some(Settlement::Win),
        Side::Over | Side::Under => Some(Settlement::Loss),
        Side::Skip => None,
    }
}

/// Net return per unit staked. Pushes are refunded and carry no stake.
pub fn roi(wins: usize, losses: usize, payout_ratio: f64) -> f64 {
    let staked = wins + losses;
    if staked == 0 {
        return 0.0;
    }
    (wins as f64 * payout_ratio - losses as f64) / staked as f64
}

fn accuracy(wins: usize, losses: usize) -> f64 {
    let decided = wins + losses;
    if decided == 0 {
        0.0
    } else {
        wins as f64 / decided as f64
    }
}

pub fn evaluate(
    cache: &PredictionCache,
    constant: f64,
    thresholds: &[f64],
    decision: &DeviationThresholds,
    payout_ratio: f64,
) -> Vec<BacktestResult> {
    let games_considered = cache.predictions.len();
    let mae = if games_considered == 0 {
        0.0
    } else {
        cache
            .predictions
            .iter()
            .map(|p| (p.actual_total - calibrate(p.raw_estimate, constant)).abs())
            .sum::<f64>()
            / games_considered as f64
    };

    thresholds
        .iter()
        .map(|&threshold| {
            let engine = EdgeDecisionEngine::new(decision.with_min_edge(threshold));
            let (mut wins, mut losses, mut pushes) = (0usize, 0usize, 0usize);
            for p in &cache.predictions {
                let signal = engine.decide(calibrate(p.raw_estimate, constant), p.line);
                let Some(line) = signal.line else {
                    continue;
                };
                match settle(signal.side, line, p.actual_total) {
                    Some(Settlement::Win) => wins += 1,
                    Some(Settlement::Loss) => losses += 1,
                    Some(Settlement::Push) => pushes += 1,
                    None => {}
                }
            }
            BacktestResult {
                threshold,
                games_considered,
                bets_placed: wins + losses + pushes,
                wins,
                losses,
                pushes,
                accuracy: accuracy(wins, losses),
                roi: roi(wins, losses, payout_ratio),
                mae,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviationBand {
    pub low: f64,
    /// `None` for the open-ended top band.
    pub high: Option<f64>,
    pub games: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub accuracy: f64,
    pub roi: f64,
    pub over_share: f64,
}

impl DeviationBand {
    pub fn label(&self) -> String {
        match self.high {
            Some(high) => format!("{}-{}", self.low, high),
            None => format!("{}+", self.low),
        }
    }
}

/// Hit rate and ROI per |deviation| band, betting the side the deviation points to.
pub fn deviation_bands(cache: &PredictionCache, constant: f64, payout_ratio: f64) -> Vec<DeviationBand> {
    #[derive(Default, Clone, Copy)]
    struct Tally {
        games: usize,
        wins: usize,
        losses: usize,
        pushes: usize,
        overs: usize,
    }

    let mut tallies = [Tally::default(); BAND_EDGES.len()];
    for p in &cache.predictions {
        let Some(line) = p.line else {
            continue;
        };
        let deviation = calibrate(p.raw_estimate, constant) - line;
        if !deviation.is_finite() {
            continue;
        }
        let idx = BAND_EDGES
            .iter()
            .position(|edge| deviation.abs() < *edge)
            .unwrap_or(BAND_EDGES.len() - 1);
        let tally = &mut tallies[idx];
        tally.games += 1;
        let side = if deviation > 0.0 {
            tally.overs += 1;
            Side::Over
        } else if deviation < 0.0 {
            Side::Under
        } else {
            Side::Skip
        };
        match settle(side, line, p.actual_total) {
            Some(Settlement::Win) => tally.wins += 1,
            Some(Settlement::Loss) => tally.losses += 1,
            Some(Settlement::Push) => tally.pushes += 1,
            None => {}
        }
    }

    let mut low = 0.0;
    let mut out = Vec::with_capacity(BAND_EDGES.len());
    for (edge, tally) in BAND_EDGES.iter().zip(tallies) {
        out.push(DeviationBand {
            low,
            high: edge.is_finite().then_some(*edge),
            games: tally.games,
            wins: tally.wins,
            losses: tally.losses,
            pushes: tally.pushes,
            accuracy: accuracy(tally.wins, tally.losses),
            roi: roi(tally.wins, tally.losses, payout_ratio),
            over_share: if tally.games > 0 {
                tally.overs as f64 / tally.games as f64
            } else {
                0.0
            },
        });
        low = *edge;
    }
    out
}

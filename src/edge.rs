use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::{BetSignal, OddsLine, Prediction, Side, SkipReason, Tier};

/// Deviation cutoffs, in points. A deviation strictly above `unreliable` is skipped,
/// `strong` and `moderate` are inclusive lower bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationThresholds {
    pub moderate: f64,
    pub strong: f64,
    pub unreliable: f64,
}

impl Default for DeviationThresholds {
    fn default() -> Self {
        Self {
            moderate: 4.0,
            strong: 6.0,
            unreliable: 20.0,
        }
    }
}

impl DeviationThresholds {
    pub fn validate(&self) -> Result<()> {
        let all = [self.moderate, self.strong, self.unreliable];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "deviation thresholds must be finite and non-negative: {self:?}"
            )));
        }
        if self.moderate > self.strong || self.strong > self.unreliable {
            return Err(PipelineError::InvalidConfig(format!(
                "deviation thresholds must satisfy moderate <= strong <= unreliable: {self:?}"
            )));
        }
        Ok(())
    }

    /// Same engine with the minimum bettable edge moved to `min_edge`.
    /// Used by the backtest to sweep cutoffs without touching the other tiers.
    pub fn with_min_edge(&self, min_edge: f64) -> Self {
        let moderate = min_edge.max(0.0);
        Self {
            moderate,
            strong: self.strong.max(moderate),
            unreliable: self.unreliable.max(moderate),
        }
    }
}

/// Tier, side and skip reason for a deviation. First match wins.
pub fn classify(deviation: f64, thresholds: &DeviationThresholds) -> (Tier, Side, Option<SkipReason>) {
    let magnitude = deviation.abs();
    if !magnitude.is_finite() || magnitude > thresholds.unreliable {
        return (Tier::Skip, Side::Skip, Some(SkipReason::Unreliable));
    }
    let side = if deviation > 0.0 { Side::Over } else { Side::Under };
    if magnitude >= thresholds.strong {
        (Tier::Strong, side, None)
    } else if magnitude >= thresholds.moderate {
        (Tier::Moderate, side, None)
    } else {
        (Tier::Skip, Side::Skip, Some(SkipReason::NoEdge))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeDecisionEngine {
    thresholds: DeviationThresholds,
}

impl EdgeDecisionEngine {
    pub fn new(thresholds: DeviationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DeviationThresholds {
        &self.thresholds
    }

    pub fn decide(&self, calibrated_estimate: f64, line: Option<f64>) -> BetSignal {
        let Some(line) = line else {
            return BetSignal {
                game_id: None,
                calibrated_estimate,
                line: None,
                deviation: None,
                tier: Tier::Skip,
                side: Side::Skip,
                skip_reason: Some(SkipReason::NoLine),
                calibration_constant: 0.0,
            };
        };
        let deviation = calibrated_estimate - line;
        let (tier, side, skip_reason) = classify(deviation, &self.thresholds);
        BetSignal {
            game_id: None,
            calibrated_estimate,
            line: Some(line),
            deviation: Some(deviation),
            tier,
            side,
            skip_reason,
            calibration_constant: 0.0,
        }
    }

    /// Signal for a prediction, carrying its game id and calibration constant.
    pub fn decide_for(&self, prediction: &Prediction, line: Option<&OddsLine>) -> BetSignal {
        let mut signal = self.decide(prediction.calibrated_estimate, line.map(|l| l.line));
        signal.game_id = prediction.game_id.clone();
        signal.calibration_constant = prediction.calibration_constant;
        signal
    }
}

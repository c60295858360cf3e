use chrono::NaiveDate;
use serde::Serialize;

use crate::model::Prediction;

/// Additive correction applied to every raw estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibrator {
    constant: f64,
}

impl Calibrator {
    pub fn new(constant: f64) -> Self {
        Self { constant }
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn calibrate(&self, raw: f64) -> f64 {
        calibrate(raw, self.constant)
    }

    pub fn apply(
        &self,
        game_id: Option<String>,
        as_of: NaiveDate,
        raw_estimate: f64,
        feature_version: &str,
    ) -> Prediction {
        Prediction {
            game_id,
            as_of,
            raw_estimate,
            calibrated_estimate: self.calibrate(raw_estimate),
            calibration_constant: self.constant,
            feature_version: feature_version.to_string(),
        }
    }
}

pub fn calibrate(raw: f64, constant: f64) -> f64 {
    raw + constant
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub samples: usize,
    pub mae_raw: f64,
    pub mae_calibrated: f64,
    /// Mean of `actual - raw`. Positive means the model runs low.
    pub mean_bias_raw: f64,
    pub suggested_constant: f64,
}

impl CalibrationReport {
    pub fn empty() -> Self {
        Self {
            samples: 0,
            mae_raw: 0.0,
            mae_calibrated: 0.0,
            mean_bias_raw: 0.0,
            suggested_constant: 0.0,
        }
    }
}

/// Fit diagnostics over `(raw, actual)` pairs. Reporting only; the constant in use is not changed.
pub fn calibration_report(pairs: &[(f64, f64)], constant: f64) -> CalibrationReport {
    if pairs.is_empty() {
        return CalibrationReport::empty();
    }
    let n = pairs.len() as f64;
    let mut abs_raw = 0.0_f64;
    let mut abs_cal = 0.0_f64;
    let mut bias = 0.0_f64;
    for (raw, actual) in pairs {
        abs_raw += (actual - raw).abs();
        abs_cal += (actual - calibrate(*raw, constant)).abs();
        bias += actual - raw;
    }
    let mean_bias_raw = bias / n;
    CalibrationReport {
        samples: pairs.len(),
        mae_raw: abs_raw / n,
        mae_calibrated: abs_cal / n,
        mean_bias_raw,
        suggested_constant: mean_bias_raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_constant_is_identity() {
        let cal = Calibrator::new(0.0);
        for raw in [0.0, 187.25, 231.5, -3.0] {
            assert_eq!(cal.calibrate(raw), raw);
        }
    }

    #[test]
    fn prediction_records_constant() {
        let as_of = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let p = Calibrator::new(2.7).apply(Some("g1".into()), as_of, 220.0, "fs1:w5-10");
        assert!((p.calibrated_estimate - 222.7).abs() < 1e-9);
        assert_eq!(p.calibration_constant, 2.7);
        assert_eq!(p.raw_estimate, 220.0);
    }

    #[test]
    fn report_suggests_mean_bias() {
        let pairs = [(210.0, 214.0), (220.0, 222.0), (200.0, 203.0)];
        let report = calibration_report(&pairs, 0.0);
        assert_eq!(report.samples, 3);
        assert!((report.mean_bias_raw - 3.0).abs() < 1e-12);
        assert!((report.mae_raw - 3.0).abs() < 1e-12);
        let shifted = calibration_report(&pairs, 3.0);
        assert!(shifted.mae_calibrated < shifted.mae_raw);
    }
}

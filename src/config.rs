use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::args::{CliArgs, parse_bool, parse_f64_list, parse_usize_list};
use crate::edge::DeviationThresholds;
use tracing::warn;

use crate::error::{PipelineError, Result, SnapshotKind};
use crate::injury_impact::{ImpactStrategyKind, InjuryWeights};
use crate::model::{Game, OddsLine};

const CACHE_DIR: &str = "hoops_edge";
const DB_FILE: &str = "hoops_edge.sqlite";

/// Payout per unit staked on a winning bet at -110.
pub const STANDARD_PAYOUT_RATIO: f64 = 100.0 / 110.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    pub max_injury_age_days: i64,
    pub max_line_age_hours: i64,
    /// Stale data is an error instead of a warning.
    pub strict: bool,
}

impl FreshnessPolicy {
    /// Age of `line` at tip-off against `max_line_age_hours`. Stale lines are an error in
    /// strict mode and a warning otherwise.
    pub fn check_line(&self, game: &Game, line: &OddsLine) -> Result<()> {
        let age_minutes = (game.start_time - line.observed_at).num_minutes();
        if age_minutes <= self.max_line_age_hours.saturating_mul(60) {
            return Ok(());
        }
        let err = PipelineError::StaleSnapshot {
            kind: SnapshotKind::Odds,
            age_hours: (age_minutes + 59) / 60,
            limit_hours: self.max_line_age_hours,
        };
        if self.strict {
            return Err(err);
        }
        warn!(game = %game.id, "{err}");
        Ok(())
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            max_injury_age_days: 1,
            max_line_age_hours: 48,
            strict: false,
        }
    }
}

/// Every tunable the pipeline reads. Built once per run and passed by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calibration_constant: f64,
    pub windows: Vec<usize>,
    pub decision: DeviationThresholds,
    pub backtest_thresholds: Vec<f64>,
    pub payout_ratio: f64,
    pub injury_weights: InjuryWeights,
    pub injury_strategy: ImpactStrategyKind,
    pub freshness: FreshnessPolicy,
    pub require_injury_report: bool,
    pub folds: usize,
    pub ridge_l2: f64,
    pub db_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration_constant: 2.7,
            windows: vec![5, 10],
            decision: DeviationThresholds::default(),
            backtest_thresholds: vec![4.0, 6.0, 8.0, 10.0],
            payout_ratio: STANDARD_PAYOUT_RATIO,
            injury_weights: InjuryWeights::default(),
            injury_strategy: ImpactStrategyKind::PpgShare,
            freshness: FreshnessPolicy::default(),
            require_injury_report: true,
            folds: 5,
            ridge_l2: 1.0,
            db_path: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the JSON file (`--config` or `HOOPS_CONFIG`), then env vars, then flags.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let file = args
            .path("--config")
            .or_else(|| std::env::var("HOOPS_CONFIG").ok().map(PathBuf::from));
        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// `lookup` is injected so tests don't touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HOOPS_CALIBRATION").and_then(|v| v.trim().parse().ok()) {
            self.calibration_constant = v;
        }
        if let Some(v) = lookup("HOOPS_THRESHOLDS").map(|v| parse_f64_list(&v))
            && !v.is_empty()
        {
            self.backtest_thresholds = v;
        }
        if let Some(v) = lookup("HOOPS_WINDOWS").map(|v| parse_usize_list(&v))
            && !v.is_empty()
        {
            self.windows = v;
        }
        if let Some(v) = lookup("HOOPS_FOLDS").and_then(|v| v.trim().parse().ok()) {
            self.folds = v;
        }
        if let Some(v) = lookup("HOOPS_INJURY_STRATEGY").and_then(|v| ImpactStrategyKind::parse(&v)) {
            self.injury_strategy = v;
        }
        if let Some(v) = lookup("HOOPS_STRICT").and_then(|v| parse_bool(&v)) {
            self.freshness.strict = v;
        }
        if let Some(v) = lookup("HOOPS_REQUIRE_INJURY_REPORT").and_then(|v| parse_bool(&v)) {
            self.require_injury_report = v;
        }
        if let Some(v) = lookup("HOOPS_DB_PATH").filter(|v| !v.trim().is_empty()) {
            self.db_path = Some(PathBuf::from(v.trim()));
        }
    }

    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(v) = args.f64("--calibration") {
            self.calibration_constant = v;
        }
        if let Some(v) = args.f64_list("--thresholds") {
            self.backtest_thresholds = v;
        }
        if let Some(v) = args.usize_list("--windows") {
            self.windows = v;
        }
        if let Some(v) = args.usize("--folds") {
            self.folds = v;
        }
        if let Some(v) = args.f64("--moderate") {
            self.decision.moderate = v;
        }
        if let Some(v) = args.f64("--strong") {
            self.decision.strong = v;
        }
        if let Some(v) = args.f64("--unreliable") {
            self.decision.unreliable = v;
        }
        if let Some(v) = args.value("--injury-strategy").and_then(|v| ImpactStrategyKind::parse(&v)) {
            self.injury_strategy = v;
        }
        if args.has_flag("--strict") {
            self.freshness.strict = true;
        }
        if args.has_flag("--allow-missing-injuries") {
            self.require_injury_report = false;
        }
        if let Some(v) = args.path("--db") {
            self.db_path = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.calibration_constant.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "calibration constant must be finite".to_string(),
            ));
        }
        if self.windows.is_empty() || self.windows.contains(&0) {
            return Err(PipelineError::InvalidConfig(format!(
                "rolling windows must be non-empty and positive: {:?}",
                self.windows
            )));
        }
        let mut sorted = self.windows.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != self.windows.len() {
            return Err(PipelineError::InvalidConfig(format!(
                "rolling windows must be distinct: {:?}",
                self.windows
            )));
        }
        self.decision.validate()?;
        if self
            .backtest_thresholds
            .iter()
            .any(|t| !t.is_finite() || *t < 0.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "backtest thresholds must be finite and non-negative: {:?}",
                self.backtest_thresholds
            )));
        }
        if !(self.payout_ratio.is_finite() && self.payout_ratio > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "payout ratio must be positive: {}",
                self.payout_ratio
            )));
        }
        self.injury_weights.validate()?;
        if self.freshness.max_injury_age_days < 0 || self.freshness.max_line_age_hours < 0 {
            return Err(PipelineError::InvalidConfig(
                "freshness bounds must be non-negative".to_string(),
            ));
        }
        if self.folds == 0 {
            return Err(PipelineError::InvalidConfig("folds must be at least 1".to_string()));
        }
        if !(self.ridge_l2.is_finite() && self.ridge_l2 >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "ridge l2 must be non-negative: {}",
                self.ridge_l2
            )));
        }
        Ok(())
    }

    pub fn resolved_db_path(&self) -> Option<PathBuf> {
        self.db_path.clone().or_else(default_db_path)
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR).join(DB_FILE));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.payout_ratio - 0.909_090_909).abs() < 1e-9);
    }

    #[test]
    fn env_then_args_override() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HOOPS_CALIBRATION", "1.5"),
            ("HOOPS_WINDOWS", "3,7"),
            ("HOOPS_STRICT", "true"),
            ("HOOPS_INJURY_STRATEGY", "usage_weighted"),
        ]);
        let mut config = PipelineConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.calibration_constant, 1.5);
        assert_eq!(config.windows, vec![3, 7]);
        assert!(config.freshness.strict);
        assert_eq!(config.injury_strategy, ImpactStrategyKind::UsageWeighted);

        let args = CliArgs::new(vec![
            "--calibration=0".to_string(),
            "--injury-strategy=ppg_share".to_string(),
        ]);
        config.apply_args(&args);
        assert_eq!(config.calibration_constant, 0.0);
        assert_eq!(config.injury_strategy, ImpactStrategyKind::PpgShare);
    }

    #[test]
    fn line_age_counts_partial_hours() {
        use chrono::{Duration, NaiveDate, TimeZone, Utc};

        let start = Utc.with_ymd_and_hms(2025, 1, 11, 0, 30, 0).unwrap();
        let game = Game {
            id: "g1".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            start_time: start,
            home: "BOS".into(),
            away: "NYK".into(),
            home_score: None,
            away_score: None,
        };
        let line_at = |age: Duration| OddsLine {
            game_id: "g1".into(),
            line: 215.0,
            observed_at: start - age,
        };
        let strict = FreshnessPolicy {
            strict: true,
            ..FreshnessPolicy::default()
        };
        let limit = Duration::hours(strict.max_line_age_hours);

        assert!(strict.check_line(&game, &line_at(limit)).is_ok());
        let err = strict
            .check_line(&game, &line_at(limit + Duration::minutes(59)))
            .unwrap_err();
        match err {
            PipelineError::StaleSnapshot { kind, age_hours, limit_hours } => {
                assert_eq!(kind, SnapshotKind::Odds);
                assert_eq!(age_hours, limit_hours + 1);
            }
            other => panic!("unexpected error {other}"),
        }

        let lenient = FreshnessPolicy::default();
        assert!(lenient.check_line(&game, &line_at(limit * 3)).is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"calibration_constant": 1.0, "folds": 3}"#).unwrap();
        assert_eq!(config.folds, 3);
        assert_eq!(config.windows, vec![5, 10]);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.windows = vec![5, 5];
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.decision.strong = 30.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.payout_ratio = 0.0;
        assert!(config.validate().is_err());
    }
}

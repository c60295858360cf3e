use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{FreshnessPolicy, PipelineConfig};
use crate::error::{PipelineError, Result, SnapshotKind};
use crate::model::{InjuryStatus, PlayerProfile};
use crate::snapshot::{DataSnapshot, InjuryLedger, PlayerProfiles};

/// How a Doubtful listing is weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubtfulWeighting {
    AsQuestionable,
    AsOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InjuryWeights {
    /// Out players lose `ppg / out_divisor` points.
    pub out_divisor: f64,
    /// Questionable players lose `ppg / questionable_divisor` points.
    pub questionable_divisor: f64,
    /// Out players below this scoring average are bench depth and ignored.
    pub min_out_ppg: f64,
    /// Impact charged for an Out player with no profile.
    pub unknown_player_impact: f64,
    pub doubtful: DoubtfulWeighting,
}

impl Default for InjuryWeights {
    fn default() -> Self {
        Self {
            out_divisor: 5.0,
            questionable_divisor: 10.0,
            min_out_ppg: 5.0,
            unknown_player_impact: 3.0,
            doubtful: DoubtfulWeighting::AsQuestionable,
        }
    }
}

impl InjuryWeights {
    pub fn validate(&self) -> Result<()> {
        let ok = self.out_divisor.is_finite()
            && self.out_divisor > 0.0
            && self.questionable_divisor.is_finite()
            && self.questionable_divisor > 0.0
            && self.min_out_ppg.is_finite()
            && self.min_out_ppg >= 0.0
            && self.unknown_player_impact.is_finite()
            && self.unknown_player_impact >= 0.0;
        if ok {
            Ok(())
        } else {
            Err(PipelineError::InvalidConfig(format!(
                "injury weights must be finite, divisors positive, the rest non-negative: {self:?}"
            )))
        }
    }

    fn effective_status(&self, status: InjuryStatus) -> InjuryStatus {
        match (status, self.doubtful) {
            (InjuryStatus::Doubtful, DoubtfulWeighting::AsOut) => InjuryStatus::Out,
            (InjuryStatus::Doubtful, DoubtfulWeighting::AsQuestionable) => InjuryStatus::Questionable,
            (other, _) => other,
        }
    }
}

/// Point impact of one listed player. Implementations must return a non-negative value
/// that does not decrease as the player's PPG grows.
pub trait ImpactStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn player_impact(&self, status: InjuryStatus, profile: Option<&PlayerProfile>) -> f64;
}

/// One point of team scoring per five points the absent player averages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PpgShareImpact {
    pub weights: InjuryWeights,
}

impl PpgShareImpact {
    pub fn new(weights: InjuryWeights) -> Self {
        Self { weights }
    }
}

impl ImpactStrategy for PpgShareImpact {
    fn name(&self) -> &'static str {
        "ppg_share"
    }

    fn player_impact(&self, status: InjuryStatus, profile: Option<&PlayerProfile>) -> f64 {
        let w = &self.weights;
        let ppg = profile.map(|p| p.ppg.max(0.0));
        match w.effective_status(status) {
            InjuryStatus::Out => match ppg {
                Some(ppg) if ppg >= w.min_out_ppg => ppg / w.out_divisor,
                Some(_) => 0.0,
                None => w.unknown_player_impact,
            },
            InjuryStatus::Questionable => match ppg {
                Some(ppg) => ppg / w.questionable_divisor,
                None => w.unknown_player_impact * w.out_divisor / w.questionable_divisor,
            },
            _ => 0.0,
        }
    }
}

/// Scales the PPG share by the player's usage relative to the league average.
/// Players without a usage rate fall back to the plain PPG share.
#[derive(Debug, Clone, Copy)]
pub struct UsageWeightedImpact {
    pub base: PpgShareImpact,
    pub league_usage: f64,
}

impl UsageWeightedImpact {
    pub const LEAGUE_AVERAGE_USAGE: f64 = 0.20;

    pub fn new(weights: InjuryWeights) -> Self {
        Self {
            base: PpgShareImpact::new(weights),
            league_usage: Self::LEAGUE_AVERAGE_USAGE,
        }
    }
}

impl ImpactStrategy for UsageWeightedImpact {
    fn name(&self) -> &'static str {
        "usage_weighted"
    }

    fn player_impact(&self, status: InjuryStatus, profile: Option<&PlayerProfile>) -> f64 {
        let base = self.base.player_impact(status, profile);
        let Some(usage) = profile.and_then(|p| p.usage_rate) else {
            return base;
        };
        let factor = (usage.max(0.0) / self.league_usage.max(1e-6)).clamp(0.5, 2.0);
        base * factor
    }
}

/// Which [`ImpactStrategy`] the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactStrategyKind {
    #[default]
    PpgShare,
    UsageWeighted,
}

impl ImpactStrategyKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ppg_share" | "ppg" => Some(Self::PpgShare),
            "usage_weighted" | "usage" => Some(Self::UsageWeighted),
            _ => None,
        }
    }
}

/// Strategy picked at runtime from [`PipelineConfig::injury_strategy`].
#[derive(Debug, Clone, Copy)]
pub enum ConfiguredImpact {
    PpgShare(PpgShareImpact),
    UsageWeighted(UsageWeightedImpact),
}

impl ConfiguredImpact {
    pub fn from_config(config: &PipelineConfig) -> Self {
        match config.injury_strategy {
            ImpactStrategyKind::PpgShare => Self::PpgShare(PpgShareImpact::new(config.injury_weights)),
            ImpactStrategyKind::UsageWeighted => {
                Self::UsageWeighted(UsageWeightedImpact::new(config.injury_weights))
            }
        }
    }
}

impl ImpactStrategy for ConfiguredImpact {
    fn name(&self) -> &'static str {
        match self {
            Self::PpgShare(s) => s.name(),
            Self::UsageWeighted(s) => s.name(),
        }
    }

    fn player_impact(&self, status: InjuryStatus, profile: Option<&PlayerProfile>) -> f64 {
        match self {
            Self::PpgShare(s) => s.player_impact(status, profile),
            Self::UsageWeighted(s) => s.player_impact(status, profile),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerImpact {
    pub player: String,
    pub status: InjuryStatus,
    pub ppg: Option<f64>,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamInjuryImpact {
    pub team: String,
    pub as_of: NaiveDate,
    pub report_date: Option<NaiveDate>,
    pub impact: f64,
    pub players: Vec<PlayerImpact>,
    pub stale: bool,
}

pub struct InjuryImpactEstimator<'a, S: ImpactStrategy = ConfiguredImpact> {
    ledger: &'a InjuryLedger,
    profiles: &'a PlayerProfiles,
    strategy: S,
    freshness: FreshnessPolicy,
    require_report: bool,
}

impl<'a> InjuryImpactEstimator<'a, ConfiguredImpact> {
    pub fn new(snapshot: &'a DataSnapshot, config: &PipelineConfig) -> Self {
        Self::with_strategy(
            &snapshot.injuries,
            &snapshot.profiles,
            ConfiguredImpact::from_config(config),
            config.freshness,
            config.require_injury_report,
        )
    }
}

impl<'a, S: ImpactStrategy> InjuryImpactEstimator<'a, S> {
    pub fn with_strategy(
        ledger: &'a InjuryLedger,
        profiles: &'a PlayerProfiles,
        strategy: S,
        freshness: FreshnessPolicy,
        require_report: bool,
    ) -> Self {
        Self {
            ledger,
            profiles,
            strategy,
            freshness,
            require_report,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn estimate(&self, team: &str, as_of: NaiveDate) -> Result<f64> {
        Ok(self.assess(team, as_of)?.impact)
    }

    pub fn assess(&self, team: &str, as_of: NaiveDate) -> Result<TeamInjuryImpact> {
        let Some(report) = self.ledger.report_as_of(as_of) else {
            if self.require_report {
                return Err(PipelineError::MissingInjuryReport { as_of });
            }
            return Ok(TeamInjuryImpact {
                team: team.to_string(),
                as_of,
                report_date: None,
                impact: 0.0,
                players: Vec::new(),
                stale: false,
            });
        };

        let age_days = (as_of - report.date).num_days();
        let stale = age_days > self.freshness.max_injury_age_days;
        if stale {
            let err = PipelineError::StaleSnapshot {
                kind: SnapshotKind::Injuries,
                age_hours: age_days * 24,
                limit_hours: self.freshness.max_injury_age_days * 24,
            };
            if self.freshness.strict {
                return Err(err);
            }
            warn!(team, %as_of, report = %report.date, "{err}");
        }

        // A player listed twice in one report counts once, at the more severe status.
        let mut listed: HashMap<String, (&str, InjuryStatus)> = HashMap::new();
        for record in report.for_team(team) {
            let key = normalize_name(&record.player);
            if key.is_empty() {
                continue;
            }
            let entry = listed.entry(key).or_insert((record.player.as_str(), record.status));
            if record.status.severity() > entry.1.severity() {
                *entry = (record.player.as_str(), record.status);
            }
        }

        let mut players: Vec<PlayerImpact> = listed
            .into_values()
            .map(|(player, status)| {
                let profile = self.profiles.get(player);
                if profile.is_none() && status != InjuryStatus::Probable {
                    debug!(team, player, "no player profile, using default impact");
                }
                let impact = self.strategy.player_impact(status, profile).max(0.0);
                PlayerImpact {
                    player: player.to_string(),
                    status,
                    ppg: profile.map(|p| p.ppg),
                    impact,
                }
            })
            .collect();
        // Deterministic summation order.
        players.sort_by(|a, b| a.player.cmp(&b.player));
        let impact = players.iter().map(|p| p.impact).sum::<f64>().max(0.0);

        Ok(TeamInjuryImpact {
            team: team.to_string(),
            as_of,
            report_date: Some(report.date),
            impact,
            players,
            stale,
        })
    }
}

/// Lowercased, with runs of non-alphanumerics collapsed to a single `_`.
pub fn normalize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_us = false;
    for ch in input.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            out.push(ch);
            prev_us = false;
        } else if ch == '\'' || ch == '.' {
            // "De'Aaron", "P.J." and "DeAaron", "PJ" are the same player.
            continue;
        } else if !prev_us && !out.is_empty() {
            out.push('_');
            prev_us = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

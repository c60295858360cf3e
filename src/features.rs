use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::injury_impact::{ConfiguredImpact, ImpactStrategy, InjuryImpactEstimator};
use crate::model::Game;
use crate::snapshot::DataSnapshot;
use crate::stat_store::GameStatStore;

/// Bump whenever the set or meaning of features changes.
pub const FEATURE_SCHEMA_REVISION: u32 = 1;

pub const HOME_INJURY_IMPACT: &str = "home_injury_impact";
pub const AWAY_INJURY_IMPACT: &str = "away_injury_impact";
pub const TOTAL_INJURY_IMPACT: &str = "total_injury_impact";

const SIDES: [&str; 2] = ["home", "away"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    windows: Vec<usize>,
    names: Vec<String>,
    version: String,
}

impl FeatureSchema {
    pub fn new(windows: &[usize]) -> Self {
        let mut names = Vec::with_capacity(windows.len() * 6 + 3);
        for side in SIDES {
            for w in windows {
                names.push(pts_for_name(side, *w));
                names.push(pts_against_name(side, *w));
                names.push(pace_name(side, *w));
            }
        }
        names.push(HOME_INJURY_IMPACT.to_string());
        names.push(AWAY_INJURY_IMPACT.to_string());
        names.push(TOTAL_INJURY_IMPACT.to_string());

        let window_tag = windows
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join("-");
        Self {
            windows: windows.to_vec(),
            names,
            version: format!("fs{FEATURE_SCHEMA_REVISION}:w{window_tag}"),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Vectors built under another schema are rejected, never coerced.
    pub fn check(&self, vector: &FeatureVector) -> Result<()> {
        let names_match = vector.features.len() == self.names.len()
            && vector
                .features
                .iter()
                .zip(&self.names)
                .all(|(f, name)| &f.name == name);
        if vector.version != self.version || !names_match {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: self.version.clone(),
                found: vector.version.clone(),
            });
        }
        Ok(())
    }
}

pub fn pts_for_name(side: &str, window: usize) -> String {
    format!("{side}_pts_for_last_{window}")
}

pub fn pts_against_name(side: &str, window: usize) -> String {
    format!("{side}_pts_against_last_{window}")
}

pub fn pace_name(side: &str, window: usize) -> String {
    format!("{side}_pace_last_{window}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    pub name: String,
    pub value: f64,
    /// Computed from fewer games than the window asks for.
    #[serde(default)]
    pub low_confidence: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub version: String,
    pub home: String,
    pub away: String,
    pub as_of: NaiveDate,
    #[serde(default)]
    pub game_id: Option<String>,
    pub features: Vec<FeatureValue>,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.iter().find(|f| f.name == name).map(|f| f.value)
    }

    pub fn values(&self) -> Vec<f64> {
        self.features.iter().map(|f| f.value).collect()
    }

    pub fn is_low_confidence(&self) -> bool {
        self.features.iter().any(|f| f.low_confidence)
    }

    pub fn low_confidence_features(&self) -> impl Iterator<Item = &str> {
        self.features
            .iter()
            .filter(|f| f.low_confidence)
            .map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

pub struct FeatureBuilder<'a, S: ImpactStrategy = ConfiguredImpact> {
    stats: &'a GameStatStore,
    injuries: InjuryImpactEstimator<'a, S>,
    schema: FeatureSchema,
}

impl<'a> FeatureBuilder<'a, ConfiguredImpact> {
    /// Builder using the configured injury strategy.
    pub fn new(snapshot: &'a DataSnapshot, config: &PipelineConfig) -> Self {
        Self::with_estimator(
            &snapshot.stats,
            InjuryImpactEstimator::new(snapshot, config),
            &config.windows,
        )
    }
}

impl<'a, S: ImpactStrategy> FeatureBuilder<'a, S> {
    pub fn with_estimator(
        stats: &'a GameStatStore,
        injuries: InjuryImpactEstimator<'a, S>,
        windows: &[usize],
    ) -> Self {
        Self {
            stats,
            injuries,
            schema: FeatureSchema::new(windows),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn injuries(&self) -> &InjuryImpactEstimator<'a, S> {
        &self.injuries
    }

    pub fn build_for_game(&self, game: &Game) -> Result<FeatureVector> {
        let mut vector = self.build(&game.home, &game.away, game.date)?;
        vector.game_id = Some(game.id.clone());
        Ok(vector)
    }

    /// Rolling stats use games strictly before `as_of`; injuries use the report in force on `as_of`.
    pub fn build(&self, home: &str, away: &str, as_of: NaiveDate) -> Result<FeatureVector> {
        let mut features = Vec::with_capacity(self.schema.len());
        for (side, team) in SIDES.iter().zip([home, away]) {
            if self.stats.games_before(team, as_of).is_empty() {
                return Err(PipelineError::InsufficientHistory {
                    team: team.to_string(),
                    as_of,
                });
            }
            for w in &self.schema.windows {
                let Some(avg) = self.stats.window_averages(team, as_of, *w) else {
                    return Err(PipelineError::InsufficientHistory {
                        team: team.to_string(),
                        as_of,
                    });
                };
                let low_confidence = avg.games < *w;
                features.push(FeatureValue {
                    name: pts_for_name(side, *w),
                    value: avg.points_for,
                    low_confidence,
                });
                features.push(FeatureValue {
                    name: pts_against_name(side, *w),
                    value: avg.points_against,
                    low_confidence,
                });
                features.push(FeatureValue {
                    name: pace_name(side, *w),
                    value: avg.pace,
                    low_confidence,
                });
            }
        }

        let home_impact = self.injuries.estimate(home, as_of)?;
        let away_impact = self.injuries.estimate(away, as_of)?;
        for (name, value) in [
            (HOME_INJURY_IMPACT, home_impact),
            (AWAY_INJURY_IMPACT, away_impact),
            (TOTAL_INJURY_IMPACT, home_impact + away_impact),
        ] {
            features.push(FeatureValue {
                name: name.to_string(),
                value,
                low_confidence: false,
            });
        }

        Ok(FeatureVector {
            version: self.schema.version.clone(),
            home: home.to_string(),
            away: away.to_string(),
            as_of,
            game_id: None,
            features,
        })
    }
}

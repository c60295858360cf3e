use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub home: String,
    pub away: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

impl Game {
    pub fn total(&self) -> Option<u32> {
        let (Some(home), Some(away)) = (self.home_score, self.away_score) else {
            return None;
        };
        home.checked_add(away)
    }

    pub fn is_final(&self) -> bool {
        self.total().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGameStat {
    pub team: String,
    pub game_id: String,
    pub date: NaiveDate,
    pub points_for: f64,
    pub points_against: f64,
    pub pace: f64,
    #[serde(default)]
    pub shooting_efficiency: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjuryStatus {
    Out,
    Doubtful,
    Questionable,
    Probable,
    Unknown,
}

impl InjuryStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "out" | "o" | "inactive" => InjuryStatus::Out,
            "doubtful" | "d" => InjuryStatus::Doubtful,
            "questionable" | "q" | "gtd" | "day-to-day" => InjuryStatus::Questionable,
            "probable" | "p" => InjuryStatus::Probable,
            _ => InjuryStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InjuryStatus::Out => "Out",
            InjuryStatus::Doubtful => "Doubtful",
            InjuryStatus::Questionable => "Questionable",
            InjuryStatus::Probable => "Probable",
            InjuryStatus::Unknown => "Unknown",
        }
    }

    /// Higher is more likely to miss the game.
    pub fn severity(self) -> u8 {
        match self {
            InjuryStatus::Out => 4,
            InjuryStatus::Doubtful => 3,
            InjuryStatus::Questionable => 2,
            InjuryStatus::Probable => 1,
            InjuryStatus::Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryRecord {
    pub team: String,
    pub player: String,
    pub status: InjuryStatus,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player: String,
    pub ppg: f64,
    #[serde(default)]
    pub usage_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsLine {
    pub game_id: String,
    pub line: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub game_id: Option<String>,
    pub as_of: NaiveDate,
    pub raw_estimate: f64,
    pub calibrated_estimate: f64,
    pub calibration_constant: f64,
    pub feature_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Over,
    Under,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Strong,
    Moderate,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unreliable,
    NoEdge,
    NoLine,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }

            pub fn from_str_opt(raw: &str) -> Option<Self> {
                match raw {
                    $($text => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Side { Over => "over", Under => "under", Skip => "skip" });
str_enum!(Tier { Strong => "strong", Moderate => "moderate", Skip => "skip" });
str_enum!(SkipReason { Unreliable => "unreliable", NoEdge => "no_edge", NoLine => "no_line" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetSignal {
    pub game_id: Option<String>,
    pub calibrated_estimate: f64,
    pub line: Option<f64>,
    pub deviation: Option<f64>,
    pub tier: Tier,
    pub side: Side,
    pub skip_reason: Option<SkipReason>,
    pub calibration_constant: f64,
}

impl BetSignal {
    pub fn is_bet(&self) -> bool {
        self.side != Side::Skip
    }

    pub fn abs_deviation(&self) -> Option<f64> {
        self.deviation.map(f64::abs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub threshold: f64,
    pub games_considered: usize,
    pub bets_placed: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub accuracy: f64,
    pub roi: f64,
    pub mae: f64,
}

/// Parses `YYYY-MM-DD` or a full RFC 3339 timestamp (date part is used).
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y%m%d") {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| PipelineError::InvalidRecord(format!("unparseable date `{trimmed}`")))
}

/// Parses an RFC 3339 timestamp, or a bare date taken as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = parse_date(trimmed)?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

use chrono::NaiveDate;
use thiserror::Error;

/// Which part of the snapshot went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Injuries,
    Odds,
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotKind::Injuries => f.write_str("injury report"),
            SnapshotKind::Odds => f.write_str("odds line"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("team {team} has no completed games before {as_of}")]
    InsufficientHistory { team: String, as_of: NaiveDate },

    #[error("no injury report on or before {as_of}")]
    MissingInjuryReport { as_of: NaiveDate },

    #[error("{kind} is stale: {age_hours}h old, limit {limit_hours}h")]
    StaleSnapshot {
        kind: SnapshotKind,
        age_hours: i64,
        limit_hours: i64,
    },

    #[error("feature schema mismatch: predictor expects {expected}, vector is {found}")]
    FeatureSchemaMismatch { expected: String, found: String },

    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl PipelineError {
    /// True for failures scoped to a single game; batch runs record these and move on.
    pub fn is_per_game(&self) -> bool {
        matches!(
            self,
            PipelineError::InsufficientHistory { .. }
                | PipelineError::StaleSnapshot { .. }
                | PipelineError::MissingInjuryReport { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

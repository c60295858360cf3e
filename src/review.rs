use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::{Settlement, roi, settle};
use crate::model::{Side, SkipReason, Tier};
use crate::snapshot::DataSnapshot;

/// Audit record of one emitted signal, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub game_id: Option<String>,
    pub home: String,
    pub away: String,
    pub date: NaiveDate,
    pub raw_estimate: f64,
    pub calibrated_estimate: f64,
    pub calibration_constant: f64,
    pub line: Option<f64>,
    pub deviation: Option<f64>,
    pub tier: Tier,
    pub side: Side,
    pub skip_reason: Option<SkipReason>,
    pub feature_version: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewedSignal {
    pub record: SignalRecord,
    pub actual_total: Option<f64>,
    pub settlement: Option<Settlement>,
    pub abs_error: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub date: NaiveDate,
    pub signals: usize,
    /// Signals whose game has a final score.
    pub completed: usize,
    pub bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub accuracy: f64,
    pub roi: f64,
    pub mae: f64,
    pub entries: Vec<ReviewedSignal>,
}

/// Grades stored signals for `date` against final scores in `snapshot`.
/// When a game was predicted more than once, only the latest record counts.
pub fn review(
    records: &[SignalRecord],
    snapshot: &DataSnapshot,
    date: NaiveDate,
    payout_ratio: f64,
) -> ReviewSummary {
    let mut latest: Vec<&SignalRecord> = Vec::new();
    for record in records.iter().filter(|r| r.date == date) {
        let key = (&record.game_id, &record.home, &record.away);
        match latest
            .iter()
            .position(|r| (&r.game_id, &r.home, &r.away) == key)
        {
            Some(idx) if latest[idx].created_at <= record.created_at => latest[idx] = record,
            Some(_) => {}
            None => latest.push(record),
        }
    }

    let mut entries = Vec::with_capacity(latest.len());
    let (mut wins, mut losses, mut pushes) = (0usize, 0usize, 0usize);
    let mut abs_error_sum = 0.0;
    let mut completed = 0usize;
    for record in latest {
        let game = match &record.game_id {
            Some(id) => snapshot.game(id),
            None => snapshot.find_matchup(&record.home, &record.away, record.date),
        };
        let actual_total = game.and_then(|g| g.total()).map(f64::from);
        let abs_error = actual_total.map(|a| (a - record.calibrated_estimate).abs());
        let settlement = match (actual_total, record.line) {
            (Some(actual), Some(line)) => settle(record.side, line, actual),
            _ => None,
        };
        if let Some(err) = abs_error {
            completed += 1;
            abs_error_sum += err;
        }
        match settlement {
            Some(Settlement::Win) => wins += 1,
            Some(Settlement::Loss) => losses += 1,
            Some(Settlement::Push) => pushes += 1,
            None => {}
        }
        entries.push(ReviewedSignal {
            record: record.clone(),
            actual_total,
            settlement,
            abs_error,
        });
    }

    let decided = wins + losses;
    ReviewSummary {
        date,
        signals: entries.len(),
        completed,
        bets: decided + pushes,
        wins,
        losses,
        pushes,
        accuracy: if decided > 0 { wins as f64 / decided as f64 } else { 0.0 },
        roi: roi(wins, losses, payout_ratio),
        mae: if completed > 0 { abs_error_sum / completed as f64 } else { 0.0 },
        entries,
    }
}

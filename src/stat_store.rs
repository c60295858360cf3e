use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::TeamGameStat;

/// Per-team game rows, each team's rows sorted by (date, game id).
#[derive(Debug, Clone, Default)]
pub struct GameStatStore {
    by_team: HashMap<String, Vec<TeamGameStat>>,
}

/// Averages over a window of a team's most recent games.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAverages {
    pub games: usize,
    pub points_for: f64,
    pub points_against: f64,
    pub pace: f64,
}

impl GameStatStore {
    pub fn from_rows(rows: impl IntoIterator<Item = TeamGameStat>) -> Self {
        let mut by_team: HashMap<String, Vec<TeamGameStat>> = HashMap::new();
        for row in rows {
            by_team.entry(row.team.clone()).or_default().push(row);
        }
        for rows in by_team.values_mut() {
            rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.game_id.cmp(&b.game_id)));
            // A re-import can repeat a row; keep the last copy of each game.
            rows.dedup_by(|later, earlier| {
                if later.game_id == earlier.game_id {
                    *earlier = later.clone();
                    true
                } else {
                    false
                }
            });
        }
        Self { by_team }
    }

    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.by_team.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_team.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_team.is_empty()
    }

    /// All of a team's games strictly before `as_of`, oldest first.
    pub fn games_before(&self, team: &str, as_of: NaiveDate) -> &[TeamGameStat] {
        let Some(rows) = self.by_team.get(team) else {
            return &[];
        };
        let end = rows.partition_point(|r| r.date < as_of);
        &rows[..end]
    }

    /// Up to `n` most recent games strictly before `as_of`, oldest first.
    pub fn recent_before(&self, team: &str, as_of: NaiveDate, n: usize) -> &[TeamGameStat] {
        let prior = self.games_before(team, as_of);
        &prior[prior.len().saturating_sub(n)..]
    }

    pub fn window_averages(&self, team: &str, as_of: NaiveDate, n: usize) -> Option<WindowAverages> {
        let rows = self.recent_before(team, as_of, n);
        if rows.is_empty() {
            return None;
        }
        let count = rows.len() as f64;
        let mut points_for = 0.0;
        let mut points_against = 0.0;
        let mut pace = 0.0;
        for row in rows {
            points_for += row.points_for;
            points_against += row.points_against;
            pace += row.pace;
        }
        Some(WindowAverages {
            games: rows.len(),
            points_for: points_for / count,
            points_against: points_against / count,
            pace: pace / count,
        })
    }
}

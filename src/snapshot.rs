use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::FreshnessPolicy;
use crate::error::Result;
use crate::injury_impact::normalize_name;
use crate::model::{Game, InjuryRecord, OddsLine, PlayerProfile, TeamGameStat};
use crate::stat_store::GameStatStore;

/// Daily league injury reports. A report replaces every earlier one.
#[derive(Debug, Clone, Default)]
pub struct InjuryLedger {
    by_date: BTreeMap<NaiveDate, Vec<InjuryRecord>>,
}

/// The report in force for a given as-of date.
#[derive(Debug, Clone, Copy)]
pub struct InjuryReport<'a> {
    pub date: NaiveDate,
    records: &'a [InjuryRecord],
}

impl<'a> InjuryReport<'a> {
    pub fn for_team(&self, team: &str) -> impl Iterator<Item = &'a InjuryRecord> {
        self.records.iter().filter(move |r| r.team == team)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl InjuryLedger {
    pub fn from_records(records: impl IntoIterator<Item = InjuryRecord>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<InjuryRecord>> = BTreeMap::new();
        for record in records {
            by_date.entry(record.date).or_default().push(record);
        }
        Self { by_date }
    }

    /// Latest report dated on or before `as_of`. Reports dated later are never visible.
    pub fn report_as_of(&self, as_of: NaiveDate) -> Option<InjuryReport<'_>> {
        self.by_date
            .range(..=as_of)
            .next_back()
            .map(|(date, records)| InjuryReport {
                date: *date,
                records: records.as_slice(),
            })
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.by_date.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.by_date.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerProfiles {
    by_name: HashMap<String, PlayerProfile>,
}

impl PlayerProfiles {
    pub fn from_profiles(profiles: impl IntoIterator<Item = PlayerProfile>) -> Self {
        let by_name = profiles
            .into_iter()
            .map(|p| (normalize_name(&p.player), p))
            .collect();
        Self { by_name }
    }

    pub fn get(&self, player: &str) -> Option<&PlayerProfile> {
        self.by_name.get(&normalize_name(player))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Odds lines per game, each list sorted by observation time.
#[derive(Debug, Clone, Default)]
pub struct OddsBook {
    by_game: HashMap<String, Vec<OddsLine>>,
}

impl OddsBook {
    pub fn from_lines(lines: impl IntoIterator<Item = OddsLine>) -> Self {
        let mut by_game: HashMap<String, Vec<OddsLine>> = HashMap::new();
        for line in lines {
            by_game.entry(line.game_id.clone()).or_default().push(line);
        }
        for lines in by_game.values_mut() {
            lines.sort_by(|a, b| a.observed_at.cmp(&b.observed_at));
        }
        Self { by_game }
    }

    /// Most recent line observed strictly before `cutoff`.
    pub fn latest_before(&self, game_id: &str, cutoff: DateTime<Utc>) -> Option<&OddsLine> {
        let lines = self.by_game.get(game_id)?;
        let end = lines.partition_point(|l| l.observed_at < cutoff);
        end.checked_sub(1).map(|idx| &lines[idx])
    }

    pub fn len(&self) -> usize {
        self.by_game.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_game.is_empty()
    }
}

/// Everything one pipeline run reads. Built once, then only borrowed.
#[derive(Debug, Clone)]
pub struct DataSnapshot {
    pub taken_at: DateTime<Utc>,
    pub games: Vec<Game>,
    pub stats: GameStatStore,
    pub injuries: InjuryLedger,
    pub profiles: PlayerProfiles,
    pub odds: OddsBook,
}

impl DataSnapshot {
    pub fn new(
        taken_at: DateTime<Utc>,
        mut games: Vec<Game>,
        stats: Vec<TeamGameStat>,
        injuries: Vec<InjuryRecord>,
        profiles: Vec<PlayerProfile>,
        odds: Vec<OddsLine>,
    ) -> Self {
        games.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Self {
            taken_at,
            games,
            stats: GameStatStore::from_rows(stats),
            injuries: InjuryLedger::from_records(injuries),
            profiles: PlayerProfiles::from_profiles(profiles),
            odds: OddsBook::from_lines(odds),
        }
    }

    pub fn game(&self, game_id: &str) -> Option<&Game> {
        self.games.iter().find(|g| g.id == game_id)
    }

    pub fn games_on(&self, date: NaiveDate) -> impl Iterator<Item = &Game> {
        self.games.iter().filter(move |g| g.date == date)
    }

    pub fn find_matchup(&self, home: &str, away: &str, date: NaiveDate) -> Option<&Game> {
        self.games
            .iter()
            .find(|g| g.date == date && g.home == home && g.away == away)
    }

    /// Line the decision engine may use for `game`: latest observed before tip-off.
    pub fn line_for(&self, game: &Game) -> Option<&OddsLine> {
        self.odds.latest_before(&game.id, game.start_time)
    }

    /// `line_for`, passed through the freshness policy.
    pub fn checked_line_for(
        &self,
        game: &Game,
        policy: &FreshnessPolicy,
    ) -> Result<Option<&OddsLine>> {
        let Some(line) = self.line_for(game) else {
            return Ok(None);
        };
        policy.check_line(game, line)?;
        Ok(Some(line))
    }

    /// Completed games with both scores, within an optional date range, in start order.
    pub fn completed_games(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Vec<Game> {
        self.games
            .iter()
            .filter(|g| g.is_final())
            .filter(|g| from.is_none_or(|f| g.date >= f))
            .filter(|g| to.is_none_or(|t| g.date <= t))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InjuryStatus;
    use chrono::TimeZone;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn injury(team: &str, player: &str, day: u32) -> InjuryRecord {
        InjuryRecord {
            team: team.to_string(),
            player: player.to_string(),
            status: InjuryStatus::Out,
            date: date(day),
        }
    }

    #[test]
    fn later_report_supersedes_without_merging() {
        let ledger = InjuryLedger::from_records(vec![
            injury("BOS", "Jaylen Brown", 1),
            injury("BOS", "Jrue Holiday", 2),
        ]);
        let report = ledger.report_as_of(date(3)).unwrap();
        assert_eq!(report.date, date(2));
        let names: Vec<&str> = report.for_team("BOS").map(|r| r.player.as_str()).collect();
        assert_eq!(names, vec!["Jrue Holiday"]);
        assert_eq!(ledger.latest_date(), Some(date(2)));
        assert_eq!(InjuryLedger::from_records(Vec::new()).latest_date(), None);
    }

    #[test]
    fn future_report_is_invisible() {
        let ledger = InjuryLedger::from_records(vec![injury("BOS", "Jaylen Brown", 10)]);
        assert!(ledger.report_as_of(date(9)).is_none());
    }

    #[test]
    fn latest_line_is_strictly_before_cutoff() {
        let tip = Utc.with_ymd_and_hms(2025, 3, 5, 0, 30, 0).unwrap();
        let book = OddsBook::from_lines(vec![
            OddsLine {
                game_id: "g1".into(),
                line: 221.5,
                observed_at: tip - chrono::Duration::hours(3),
            },
            OddsLine {
                game_id: "g1".into(),
                line: 223.0,
                observed_at: tip,
            },
            OddsLine {
                game_id: "g1".into(),
                line: 219.0,
                observed_at: tip - chrono::Duration::hours(9),
            },
        ]);
        assert_eq!(book.latest_before("g1", tip).unwrap().line, 221.5);
        assert!(book.latest_before("g1", tip - chrono::Duration::hours(10)).is_none());
        assert!(book.latest_before("g2", tip).is_none());
    }

    #[test]
    fn profiles_match_on_normalized_names() {
        let profiles = PlayerProfiles::from_profiles(vec![PlayerProfile {
            player: "Luka Dončić".to_string(),
            ppg: 28.1,
            usage_rate: None,
        }]);
        assert!(profiles.get("luka  dončić ").is_some());
    }
}

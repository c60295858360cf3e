use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::model::{Game, InjuryRecord, InjuryStatus, OddsLine, PlayerProfile, TeamGameStat};
use crate::snapshot::DataSnapshot;

const ROSTER_SIZE: usize = 8;

/// Seeded season generator for tests and benchmarks. Same seed, same season.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSeason {
    pub teams: usize,
    /// Days with final scores.
    pub days: u32,
    /// Days after the played ones with scheduled, unplayed games.
    pub scheduled_days: u32,
    pub games_per_day: usize,
    pub start: NaiveDate,
    pub seed: u64,
}

impl Default for SyntheticSeason {
    fn default() -> Self {
        Self {
            teams: 12,
            days: 60,
            scheduled_days: 1,
            games_per_day: 4,
            start: NaiveDate::from_ymd_opt(2024, 10, 22).unwrap_or_default(),
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticData {
    pub games: Vec<Game>,
    pub stats: Vec<TeamGameStat>,
    pub injuries: Vec<InjuryRecord>,
    pub profiles: Vec<PlayerProfile>,
    pub odds: Vec<OddsLine>,
}

impl SyntheticData {
    pub fn into_snapshot(self, taken_at: DateTime<Utc>) -> DataSnapshot {
        DataSnapshot::new(
            taken_at,
            self.games,
            self.stats,
            self.injuries,
            self.profiles,
            self.odds,
        )
    }
}

struct TeamProfile {
    name: String,
    offense: f64,
    defense: f64,
    pace: f64,
}

impl SyntheticSeason {
    pub fn last_date(&self) -> NaiveDate {
        self.start + Duration::days(i64::from(self.days + self.scheduled_days) - 1)
    }

    pub fn generate(&self) -> SyntheticData {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let teams: Vec<TeamProfile> = (0..self.teams.max(2))
            .map(|i| TeamProfile {
                name: format!("T{:02}", i + 1),
                offense: rng.gen_range(104.0..118.0),
                defense: rng.gen_range(104.0..118.0),
                pace: rng.gen_range(95.0..103.0),
            })
            .collect();

        let mut data = SyntheticData::default();
        for team in &teams {
            for slot in 0..ROSTER_SIZE {
                data.profiles.push(PlayerProfile {
                    player: roster_name(&team.name, slot),
                    ppg: (26.0 - slot as f64 * 3.2 + rng.gen_range(-1.5..1.5)).max(1.0),
                    usage_rate: Some((0.31 - slot as f64 * 0.025).max(0.08)),
                });
            }
        }

        let per_day = self.games_per_day.min(teams.len() / 2).max(1);
        let mut order: Vec<usize> = (0..teams.len()).collect();
        for day in 0..self.days + self.scheduled_days {
            let date = self.start + Duration::days(i64::from(day));
            let played = day < self.days;

            for team in &teams {
                for slot in 0..3 {
                    let roll: f64 = rng.gen_range(0.0..1.0);
                    let status = if roll < 0.06 {
                        InjuryStatus::Out
                    } else if roll < 0.10 {
                        InjuryStatus::Questionable
                    } else if roll < 0.12 {
                        InjuryStatus::Probable
                    } else {
                        continue;
                    };
                    data.injuries.push(InjuryRecord {
                        team: team.name.clone(),
                        player: roster_name(&team.name, slot),
                        status,
                        date,
                    });
                }
            }

            order.shuffle(&mut rng);
            for (slot, pair) in order.chunks(2).take(per_day).enumerate() {
                let (home, away) = (&teams[pair[0]], &teams[pair[1]]);
                let tip = date
                    .succ_opt()
                    .unwrap_or(date)
                    .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default())
                    .and_utc()
                    + Duration::minutes(30 * (slot as i64 + 1));
                let id = format!("{}-{}-{}", date.format("%Y%m%d"), home.name, away.name);

                let pace = (home.pace + away.pace) / 2.0;
                let home_mean = (home.offense + away.defense) / 2.0 * pace / 99.0 + 1.5;
                let away_mean = (away.offense + home.defense) / 2.0 * pace / 99.0 - 1.5;

                let line_center = home_mean + away_mean + noise(&mut rng, 3.0);
                data.odds.push(OddsLine {
                    game_id: id.clone(),
                    line: (line_center * 2.0).round() / 2.0,
                    observed_at: tip - Duration::hours(6),
                });
                if rng.gen_bool(0.1) {
                    // Posted after tip-off; must never be used.
                    data.odds.push(OddsLine {
                        game_id: id.clone(),
                        line: ((line_center + 25.0) * 2.0).round() / 2.0,
                        observed_at: tip + Duration::hours(1),
                    });
                }

                let (home_score, away_score) = if played {
                    let home_pts = (home_mean + noise(&mut rng, 11.0)).round().max(70.0) as u32;
                    let mut away_pts = (away_mean + noise(&mut rng, 11.0)).round().max(70.0) as u32;
                    if home_pts == away_pts {
                        away_pts += 1;
                    }
                    for (team, pf, pa) in [(home, home_pts, away_pts), (away, away_pts, home_pts)] {
                        data.stats.push(TeamGameStat {
                            team: team.name.clone(),
                            game_id: id.clone(),
                            date,
                            points_for: f64::from(pf),
                            points_against: f64::from(pa),
                            pace: pace + noise(&mut rng, 2.0),
                            shooting_efficiency: Some(rng.gen_range(0.50..0.60)),
                        });
                    }
                    (Some(home_pts), Some(away_pts))
                } else {
                    (None, None)
                };

                data.games.push(Game {
                    id,
                    date,
                    start_time: tip,
                    home: home.name.clone(),
                    away: away.name.clone(),
                    home_score,
                    away_score,
                });
            }
        }
        data
    }

    /// Generated season as a snapshot taken just after the last scheduled date.
    pub fn snapshot(&self) -> DataSnapshot {
        let taken_at = (self.last_date() + Duration::days(2))
            .and_time(NaiveTime::MIN)
            .and_utc();
        self.generate().into_snapshot(taken_at)
    }
}

pub fn roster_name(team: &str, slot: usize) -> String {
    format!("{team} Player {}", slot + 1)
}

/// Roughly normal, zero mean, standard deviation near `scale`.
fn noise(rng: &mut impl Rng, scale: f64) -> f64 {
    let sum: f64 = (0..3).map(|_| rng.gen_range(-1.0..1.0)).sum();
    sum * scale
}

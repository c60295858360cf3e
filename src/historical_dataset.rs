use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::injury_impact::normalize_name;
use crate::model::{
    Game, InjuryRecord, InjuryStatus, OddsLine, PlayerProfile, Side, SkipReason, TeamGameStat,
    Tier, parse_date, parse_timestamp,
};
use crate::review::SignalRecord;
use crate::snapshot::DataSnapshot;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS games (
            game_id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            start_time TEXT NOT NULL,
            home TEXT NOT NULL,
            away TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);

        CREATE TABLE IF NOT EXISTS team_game_stats (
            team TEXT NOT NULL,
            game_id TEXT NOT NULL,
            date TEXT NOT NULL,
            points_for REAL NOT NULL,
            points_against REAL NOT NULL,
            pace REAL NOT NULL,
            shooting_efficiency REAL NULL,
            PRIMARY KEY (team, game_id)
        );
        CREATE INDEX IF NOT EXISTS idx_team_game_stats_date ON team_game_stats(team, date);

        CREATE TABLE IF NOT EXISTS injuries (
            team TEXT NOT NULL,
            player TEXT NOT NULL,
            player_key TEXT NOT NULL,
            status TEXT NOT NULL,
            date TEXT NOT NULL,
            PRIMARY KEY (date, team, player_key)
        );

        CREATE TABLE IF NOT EXISTS player_profiles (
            player_key TEXT PRIMARY KEY,
            player TEXT NOT NULL,
            ppg REAL NOT NULL,
            usage_rate REAL NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS odds_lines (
            game_id TEXT NOT NULL,
            observed_at TEXT NOT NULL,
            line REAL NOT NULL,
            PRIMARY KEY (game_id, observed_at)
        );

        CREATE TABLE IF NOT EXISTS signals (
            signal_id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id TEXT NULL,
            home TEXT NOT NULL,
            away TEXT NOT NULL,
            date TEXT NOT NULL,
            raw_estimate REAL NOT NULL,
            calibrated_estimate REAL NOT NULL,
            calibration_constant REAL NOT NULL,
            line REAL NULL,
            deviation REAL NULL,
            tier TEXT NOT NULL,
            side TEXT NOT NULL,
            skip_reason TEXT NULL,
            feature_version TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_signals_date ON signals(date);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            table_name TEXT NOT NULL,
            source TEXT NOT NULL,
            rows_upserted INTEGER NOT NULL,
            rows_skipped INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Input tables the `ingest` binary accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Games,
    TeamStats,
    Injuries,
    Profiles,
    Odds,
}

impl TableKind {
    pub const ALL: [TableKind; 5] = [
        TableKind::Games,
        TableKind::TeamStats,
        TableKind::Injuries,
        TableKind::Profiles,
        TableKind::Odds,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "games" => Some(TableKind::Games),
            "stats" | "team_stats" | "team_game_stats" => Some(TableKind::TeamStats),
            "injuries" => Some(TableKind::Injuries),
            "profiles" | "player_profiles" => Some(TableKind::Profiles),
            "odds" | "odds_lines" => Some(TableKind::Odds),
            _ => None,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            TableKind::Games => "games",
            TableKind::TeamStats => "team_game_stats",
            TableKind::Injuries => "injuries",
            TableKind::Profiles => "player_profiles",
            TableKind::Odds => "odds_lines",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GameRow {
    game_id: String,
    date: String,
    start_time: String,
    home: String,
    away: String,
    #[serde(default)]
    home_score: Option<u32>,
    #[serde(default)]
    away_score: Option<u32>,
}

impl GameRow {
    fn into_game(self) -> Result<Game> {
        Ok(Game {
            date: parse_date(&self.date)?,
            start_time: parse_timestamp(&self.start_time)?,
            id: non_empty(self.game_id, "game_id")?,
            home: non_empty(self.home, "home")?,
            away: non_empty(self.away, "away")?,
            home_score: self.home_score,
            away_score: self.away_score,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TeamStatRow {
    team: String,
    game_id: String,
    date: String,
    points_for: f64,
    points_against: f64,
    pace: f64,
    #[serde(default)]
    shooting_efficiency: Option<f64>,
}

impl TeamStatRow {
    fn into_stat(self) -> Result<TeamGameStat> {
        if !(self.points_for.is_finite() && self.points_against.is_finite() && self.pace.is_finite()) {
            return Err(PipelineError::InvalidRecord(format!(
                "non-finite stat for {} in {}",
                self.team, self.game_id
            )));
        }
        Ok(TeamGameStat {
            date: parse_date(&self.date)?,
            team: non_empty(self.team, "team")?,
            game_id: non_empty(self.game_id, "game_id")?,
            points_for: self.points_for,
            points_against: self.points_against,
            pace: self.pace,
            shooting_efficiency: self.shooting_efficiency,
        })
    }
}

#[derive(Debug, Deserialize)]
struct InjuryRow {
    team: String,
    player: String,
    status: String,
    date: String,
}

impl InjuryRow {
    fn into_record(self) -> Result<InjuryRecord> {
        Ok(InjuryRecord {
            date: parse_date(&self.date)?,
            status: InjuryStatus::parse(&self.status),
            team: non_empty(self.team, "team")?,
            player: non_empty(self.player, "player")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    player: String,
    ppg: f64,
    #[serde(default)]
    usage_rate: Option<f64>,
}

impl ProfileRow {
    fn into_profile(self) -> Result<PlayerProfile> {
        if !self.ppg.is_finite() || self.ppg < 0.0 {
            return Err(PipelineError::InvalidRecord(format!(
                "bad ppg {} for {}",
                self.ppg, self.player
            )));
        }
        Ok(PlayerProfile {
            player: non_empty(self.player, "player")?,
            ppg: self.ppg,
            usage_rate: self.usage_rate.filter(|u| u.is_finite()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OddsRow {
    game_id: String,
    line: f64,
    observed_at: String,
}

impl OddsRow {
    fn into_line(self) -> Result<OddsLine> {
        if !self.line.is_finite() {
            return Err(PipelineError::InvalidRecord(format!(
                "non-finite line for {}",
                self.game_id
            )));
        }
        Ok(OddsLine {
            observed_at: parse_timestamp(&self.observed_at)?,
            game_id: non_empty(self.game_id, "game_id")?,
            line: self.line,
        })
    }
}

fn non_empty(value: String, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidRecord(format!("empty {field}")));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub upserted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Reads one CSV table and upserts every valid row in a single transaction.
/// Rows that fail to parse are skipped and reported, not fatal. An injury file replaces the
/// stored report for every date it contains.
pub fn import_csv<R: Read>(
    conn: &mut Connection,
    kind: TableKind,
    reader: R,
    source: &str,
) -> Result<ImportSummary> {
    let started_at = Utc::now();
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut summary = ImportSummary::default();

    // Dates whose earlier report was already cleared by this file.
    let mut replaced_reports: HashSet<NaiveDate> = HashSet::new();
    let tx = conn.transaction()?;
    for (idx, result) in csv_reader.records().enumerate() {
        let line = idx + 2;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                summary.skipped += 1;
                summary.errors.push(format!("line {line}: {err}"));
                continue;
            }
        };
        match upsert_record(&tx, kind, &headers, &record, &mut replaced_reports) {
            Ok(()) => summary.upserted += 1,
            Err(err) => {
                summary.skipped += 1;
                summary.errors.push(format!("line {line}: {err}"));
            }
        }
    }
    tx.commit()?;

    if summary.skipped > 0 {
        warn!(
            table = kind.table_name(),
            skipped = summary.skipped,
            "rows skipped during import"
        );
    }
    record_ingest_run(conn, kind, source, &summary, started_at)?;
    info!(
        table = kind.table_name(),
        upserted = summary.upserted,
        source,
        "import complete"
    );
    Ok(summary)
}

pub fn import_csv_file(conn: &mut Connection, kind: TableKind, path: &Path) -> Result<ImportSummary> {
    let file = std::fs::File::open(path)?;
    import_csv(conn, kind, file, &path.display().to_string())
}

fn record_ingest_run(
    conn: &Connection,
    kind: TableKind,
    source: &str,
    summary: &ImportSummary,
    started_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO ingest_runs (
            started_at, finished_at, table_name, source,
            rows_upserted, rows_skipped, errors_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            kind.table_name(),
            source,
            summary.upserted as i64,
            summary.skipped as i64,
            serde_json::to_string(&summary.errors)?,
        ],
    )?;
    Ok(())
}

pub fn upsert_game(conn: &Connection, g: &Game) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO games (
            game_id, date, start_time, home, away, home_score, away_score, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(game_id) DO UPDATE SET
            date = excluded.date,
            start_time = excluded.start_time,
            home = excluded.home,
            away = excluded.away,
            home_score = COALESCE(excluded.home_score, games.home_score),
            away_score = COALESCE(excluded.away_score, games.away_score),
            updated_at = excluded.updated_at
        "#,
        params![
            g.id,
            g.date.to_string(),
            g.start_time.to_rfc3339(),
            g.home,
            g.away,
            g.home_score,
            g.away_score,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn upsert_team_stat(conn: &Connection, s: &TeamGameStat) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO team_game_stats (
            team, game_id, date, points_for, points_against, pace, shooting_efficiency
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(team, game_id) DO UPDATE SET
            date = excluded.date,
            points_for = excluded.points_for,
            points_against = excluded.points_against,
            pace = excluded.pace,
            shooting_efficiency = excluded.shooting_efficiency
        "#,
        params![
            s.team,
            s.game_id,
            s.date.to_string(),
            s.points_for,
            s.points_against,
            s.pace,
            s.shooting_efficiency,
        ],
    )?;
    Ok(())
}

pub fn upsert_injury(conn: &Connection, r: &InjuryRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO injuries (team, player, player_key, status, date)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(date, team, player_key) DO UPDATE SET
            player = excluded.player,
            status = excluded.status
        "#,
        params![
            r.team,
            r.player,
            normalize_name(&r.player),
            r.status.as_str(),
            r.date.to_string(),
        ],
    )?;
    Ok(())
}

/// Drops the stored report for `date`. A re-fetched report replaces the old one wholesale.
pub fn clear_injury_report(conn: &Connection, date: NaiveDate) -> Result<usize> {
    let removed = conn.execute("DELETE FROM injuries WHERE date = ?1", params![date.to_string()])?;
    if removed > 0 {
        debug!(%date, removed, "replacing stored injury report");
    }
    Ok(removed)
}

pub fn upsert_profile(conn: &Connection, p: &PlayerProfile) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO player_profiles (player_key, player, ppg, usage_rate, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(player_key) DO UPDATE SET
            player = excluded.player,
            ppg = excluded.ppg,
            usage_rate = excluded.usage_rate,
            updated_at = excluded.updated_at
        "#,
        params![
            normalize_name(&p.player),
            p.player,
            p.ppg,
            p.usage_rate,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn upsert_odds(conn: &Connection, o: &OddsLine) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO odds_lines (game_id, observed_at, line)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(game_id, observed_at) DO UPDATE SET line = excluded.line
        "#,
        params![o.game_id, o.observed_at.to_rfc3339(), o.line],
    )?;
    Ok(())
}

fn upsert_record(
    conn: &Connection,
    kind: TableKind,
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    replaced_reports: &mut HashSet<NaiveDate>,
) -> Result<()> {
    match kind {
        TableKind::Games => {
            let row: GameRow = record.deserialize(Some(headers))?;
            upsert_game(conn, &row.into_game()?)
        }
        TableKind::TeamStats => {
            let row: TeamStatRow = record.deserialize(Some(headers))?;
            upsert_team_stat(conn, &row.into_stat()?)
        }
        TableKind::Injuries => {
            let row: InjuryRow = record.deserialize(Some(headers))?;
            let injury = row.into_record()?;
            if replaced_reports.insert(injury.date) {
                clear_injury_report(conn, injury.date)?;
            }
            upsert_injury(conn, &injury)
        }
        TableKind::Profiles => {
            let row: ProfileRow = record.deserialize(Some(headers))?;
            upsert_profile(conn, &row.into_profile()?)
        }
        TableKind::Odds => {
            let row: OddsRow = record.deserialize(Some(headers))?;
            upsert_odds(conn, &row.into_line()?)
        }
    }
}

pub fn load_games(conn: &Connection) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT game_id, date, start_time, home, away, home_score, away_score
        FROM games
        ORDER BY start_time ASC, game_id ASC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<u32>>(5)?,
            row.get::<_, Option<u32>>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, date, start_time, home, away, home_score, away_score) = row?;
        out.push(Game {
            id,
            date: parse_date(&date)?,
            start_time: parse_timestamp(&start_time)?,
            home,
            away,
            home_score,
            away_score,
        });
    }
    Ok(out)
}

pub fn load_team_stats(conn: &Connection) -> Result<Vec<TeamGameStat>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT team, game_id, date, points_for, points_against, pace, shooting_efficiency
        FROM team_game_stats
        ORDER BY team ASC, date ASC, game_id ASC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, f64>(5)?,
            row.get::<_, Option<f64>>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (team, game_id, date, points_for, points_against, pace, shooting_efficiency) = row?;
        out.push(TeamGameStat {
            team,
            game_id,
            date: parse_date(&date)?,
            points_for,
            points_against,
            pace,
            shooting_efficiency,
        });
    }
    Ok(out)
}

/// Reports dated on or before `through`.
pub fn load_injuries(conn: &Connection, through: NaiveDate) -> Result<Vec<InjuryRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT team, player, status, date
        FROM injuries
        WHERE date <= ?1
        ORDER BY date ASC, team ASC, player ASC
        "#,
    )?;
    let rows = stmt.query_map(params![through.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (team, player, status, date) = row?;
        out.push(InjuryRecord {
            team,
            player,
            status: InjuryStatus::parse(&status),
            date: parse_date(&date)?,
        });
    }
    Ok(out)
}

pub fn load_profiles(conn: &Connection) -> Result<Vec<PlayerProfile>> {
    let mut stmt = conn.prepare("SELECT player, ppg, usage_rate FROM player_profiles ORDER BY player_key")?;
    let rows = stmt.query_map([], |row| {
        Ok(PlayerProfile {
            player: row.get(0)?,
            ppg: row.get(1)?,
            usage_rate: row.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Lines observed at or before `through`.
pub fn load_odds(conn: &Connection, through: DateTime<Utc>) -> Result<Vec<OddsLine>> {
    let mut stmt = conn.prepare(
        "SELECT game_id, observed_at, line FROM odds_lines ORDER BY game_id, observed_at",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (game_id, observed_at, line) = row?;
        let observed_at = parse_timestamp(&observed_at)?;
        if observed_at > through {
            continue;
        }
        out.push(OddsLine {
            game_id,
            line,
            observed_at,
        });
    }
    Ok(out)
}

/// Everything known as of `taken_at`, as one immutable snapshot.
pub fn load_snapshot(conn: &Connection, taken_at: DateTime<Utc>) -> Result<DataSnapshot> {
    let snapshot = DataSnapshot::new(
        taken_at,
        load_games(conn)?,
        load_team_stats(conn)?,
        load_injuries(conn, taken_at.date_naive())?,
        load_profiles(conn)?,
        load_odds(conn, taken_at)?,
    );
    info!(
        games = snapshot.games.len(),
        stats = snapshot.stats.len(),
        injuries = snapshot.injuries.len(),
        profiles = snapshot.profiles.len(),
        lines = snapshot.odds.len(),
        injury_report = ?snapshot.injuries.latest_date(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

pub fn save_signal(conn: &Connection, s: &SignalRecord) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO signals (
            game_id, home, away, date,
            raw_estimate, calibrated_estimate, calibration_constant,
            line, deviation, tier, side, skip_reason,
            feature_version, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
        params![
            s.game_id,
            s.home,
            s.away,
            s.date.to_string(),
            s.raw_estimate,
            s.calibrated_estimate,
            s.calibration_constant,
            s.line,
            s.deviation,
            s.tier.as_str(),
            s.side.as_str(),
            s.skip_reason.map(SkipReason::as_str),
            s.feature_version,
            s.created_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_signals(conn: &Connection, date: NaiveDate) -> Result<Vec<SignalRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT game_id, home, away, date,
               raw_estimate, calibrated_estimate, calibration_constant,
               line, deviation, tier, side, skip_reason,
               feature_version, created_at
        FROM signals
        WHERE date = ?1
        ORDER BY created_at ASC, signal_id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![date.to_string()], |row| {
        Ok(RawSignal {
            game_id: row.get(0)?,
            home: row.get(1)?,
            away: row.get(2)?,
            date: row.get(3)?,
            raw_estimate: row.get(4)?,
            calibrated_estimate: row.get(5)?,
            calibration_constant: row.get(6)?,
            line: row.get(7)?,
            deviation: row.get(8)?,
            tier: row.get(9)?,
            side: row.get(10)?,
            skip_reason: row.get(11)?,
            feature_version: row.get(12)?,
            created_at: row.get(13)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_record()?);
    }
    Ok(out)
}

struct RawSignal {
    game_id: Option<String>,
    home: String,
    away: String,
    date: String,
    raw_estimate: f64,
    calibrated_estimate: f64,
    calibration_constant: f64,
    line: Option<f64>,
    deviation: Option<f64>,
    tier: String,
    side: String,
    skip_reason: Option<String>,
    feature_version: String,
    created_at: String,
}

impl RawSignal {
    fn into_record(self) -> Result<SignalRecord> {
        let bad = |field: &str, value: &str| {
            PipelineError::InvalidRecord(format!("stored signal has bad {field} `{value}`"))
        };
        let tier = Tier::from_str_opt(&self.tier).ok_or_else(|| bad("tier", &self.tier))?;
        let side = Side::from_str_opt(&self.side).ok_or_else(|| bad("side", &self.side))?;
        let skip_reason = match self.skip_reason.as_deref() {
            Some(raw) => Some(SkipReason::from_str_opt(raw).ok_or_else(|| bad("skip_reason", raw))?),
            None => None,
        };
        Ok(SignalRecord {
            game_id: self.game_id,
            home: self.home,
            away: self.away,
            date: parse_date(&self.date)?,
            raw_estimate: self.raw_estimate,
            calibrated_estimate: self.calibrated_estimate,
            calibration_constant: self.calibration_constant,
            line: self.line,
            deviation: self.deviation,
            tier,
            side,
            skip_reason,
            feature_version: self.feature_version,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub fn latest_ingest_run(conn: &Connection, kind: TableKind) -> Result<Option<(String, i64)>> {
    let row = conn
        .query_row(
            r#"
            SELECT finished_at, rows_upserted FROM ingest_runs
            WHERE table_name = ?1
            ORDER BY run_id DESC
            LIMIT 1
            "#,
            params![kind.table_name()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;
    Ok(row)
}

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use hoops_edge::args::CliArgs;
use hoops_edge::config::PipelineConfig;
use hoops_edge::historical_dataset::{self, ImportSummary, TableKind};
use hoops_edge::logging;
use hoops_edge::synthetic::SyntheticSeason;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_tracing()?;

    let args = CliArgs::from_env();
    let config = PipelineConfig::load(&args).context("load configuration")?;
    let db_path = config
        .resolved_db_path()
        .context("unable to resolve sqlite path")?;
    let mut conn = historical_dataset::open_db(&db_path)
        .with_context(|| format!("open sqlite db {}", db_path.display()))?;

    if args.has_flag("--synthetic") {
        let season = SyntheticSeason {
            seed: args.value("--seed").and_then(|v| v.parse().ok()).unwrap_or(7),
            days: args.value("--days").and_then(|v| v.parse().ok()).unwrap_or(60),
            ..SyntheticSeason::default()
        };
        let data = season.generate();
        let tx = conn.transaction().context("begin synthetic transaction")?;
        for g in &data.games {
            historical_dataset::upsert_game(&tx, g)?;
        }
        for s in &data.stats {
            historical_dataset::upsert_team_stat(&tx, s)?;
        }
        for r in &data.injuries {
            historical_dataset::upsert_injury(&tx, r)?;
        }
        for p in &data.profiles {
            historical_dataset::upsert_profile(&tx, p)?;
        }
        for o in &data.odds {
            historical_dataset::upsert_odds(&tx, o)?;
        }
        tx.commit().context("commit synthetic transaction")?;
        println!("Synthetic season written");
        println!("DB: {}", db_path.display());
        println!(
            "games={} stats={} injuries={} profiles={} lines={} last_date={}",
            data.games.len(),
            data.stats.len(),
            data.injuries.len(),
            data.profiles.len(),
            data.odds.len(),
            season.last_date()
        );
        return Ok(());
    }

    let mut sources: Vec<(TableKind, PathBuf)> = Vec::new();
    if let Some(raw) = args.value("--table") {
        let kind = TableKind::parse(&raw).ok_or_else(|| {
            anyhow!("unknown table `{raw}`: expected games, stats, injuries, profiles or odds")
        })?;
        let path = args.path("--file").context("--table needs --file PATH")?;
        sources.push((kind, path));
    }

    let dir = args.path("--dir");
    for kind in TableKind::ALL {
        let flag = match kind {
            TableKind::Games => "--games",
            TableKind::TeamStats => "--stats",
            TableKind::Injuries => "--injuries",
            TableKind::Profiles => "--profiles",
            TableKind::Odds => "--odds",
        };
        let path = args.path(flag).or_else(|| {
            dir.as_ref()
                .map(|d| d.join(format!("{}.csv", kind.table_name())))
                .filter(|p| p.exists())
        });
        if let Some(path) = path {
            sources.push((kind, path));
        }
    }
    if sources.is_empty() {
        return Err(anyhow!(
            "nothing to ingest: pass --dir DIR, --table KIND --file PATH, or any of --games/--stats/--injuries/--profiles/--odds"
        ));
    }

    println!("DB: {}", db_path.display());
    for (kind, path) in sources {
        if let Some((finished_at, rows)) = historical_dataset::latest_ingest_run(&conn, kind)
            .with_context(|| format!("read last {} import", kind.table_name()))?
        {
            println!("{}: previous import {finished_at} ({rows} rows)", kind.table_name());
        }
        let summary: ImportSummary = historical_dataset::import_csv_file(&mut conn, kind, &path)
            .with_context(|| format!("import {} from {}", kind.table_name(), path.display()))?;
        println!(
            "{}: upserted={} skipped={}",
            kind.table_name(),
            summary.upserted,
            summary.skipped
        );
        for err in summary.errors.iter().take(6) {
            println!("   - {err}");
        }
    }
    Ok(())
}

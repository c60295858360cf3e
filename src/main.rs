use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use hoops_edge::args::CliArgs;
use hoops_edge::backtest::{self, BacktestHarness, PredictionCache};
use hoops_edge::config::PipelineConfig;
use hoops_edge::export;
use hoops_edge::historical_dataset;
use hoops_edge::logging;
use hoops_edge::model::parse_date;
use hoops_edge::pipeline::{GameSignal, Pipeline};
use hoops_edge::predictor::{BaselineTrainer, ModelKind, PredictorTrainer, RidgeTrainer};
use hoops_edge::review;
use hoops_edge::snapshot::DataSnapshot;

const USAGE: &str = "usage: hoops_edge <command> [flags]

commands:
  predict  (--home H --away A --date D | --game ID) [--calibration C] [--json] [--no-save]
  slate    --date D [--calibration C] [--json] [--no-save]
  backtest [--from D] [--to D] [--thresholds 4,6,8] [--folds N]
           [--model baseline|ridge] [--bands] [--xlsx PATH]
  review   --date D

common flags:
  --config PATH  --db PATH  --windows 5,10  --strict  --allow-missing-injuries
  --moderate X  --strong X  --unreliable X  --injury-strategy ppg_share|usage_weighted";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_tracing()?;

    let args = CliArgs::from_env();
    let Some(command) = args.command() else {
        eprintln!("{USAGE}");
        bail!("missing command");
    };
    if matches!(command, "help" | "-h") || args.has_flag("--help") {
        println!("{USAGE}");
        return Ok(());
    }

    let config = PipelineConfig::load(&args).context("load configuration")?;
    match command {
        "predict" => cmd_predict(&args, &config),
        "slate" => cmd_slate(&args, &config),
        "backtest" => cmd_backtest(&args, &config),
        "review" => cmd_review(&args, &config),
        other => {
            eprintln!("{USAGE}");
            bail!("unknown command `{other}`")
        }
    }
}

fn open_store(config: &PipelineConfig) -> Result<Connection> {
    let path = config
        .resolved_db_path()
        .context("unable to resolve sqlite path")?;
    historical_dataset::open_db(&path).with_context(|| format!("open sqlite db {}", path.display()))
}

fn load_snapshot(conn: &Connection) -> Result<DataSnapshot> {
    historical_dataset::load_snapshot(conn, Utc::now()).context("load data snapshot")
}

fn required_date(args: &CliArgs, name: &str) -> Result<NaiveDate> {
    let raw = args
        .value(name)
        .ok_or_else(|| anyhow!("missing required flag {name}"))?;
    parse_date(&raw).with_context(|| format!("parse {name}"))
}

fn optional_date(args: &CliArgs, name: &str) -> Result<Option<NaiveDate>> {
    args.value(name)
        .map(|raw| parse_date(&raw).with_context(|| format!("parse {name}")))
        .transpose()
}

fn cmd_predict(args: &CliArgs, config: &PipelineConfig) -> Result<()> {
    let conn = open_store(config)?;
    let snapshot = load_snapshot(&conn)?;
    let pipeline = Pipeline::new(&snapshot, config);
    let calibration = args.f64("--calibration");

    let signal = match args.value("--game") {
        Some(game_id) => pipeline
            .predict_by_id(&game_id, calibration)
            .with_context(|| format!("predict game {game_id}"))?,
        None => {
            let home = args.value("--home").context("missing required flag --home")?;
            let away = args.value("--away").context("missing required flag --away")?;
            let date = required_date(args, "--date")?;
            pipeline
                .predict_matchup(&home, &away, date, calibration)
                .with_context(|| format!("predict {away} @ {home} on {date}"))?
        }
    };

    if args.has_flag("--json") {
        println!("{}", serde_json::to_string_pretty(&signal)?);
    } else {
        print_signal_header();
        print_signal(&signal);
        if signal.low_confidence {
            println!("note: some rolling windows have fewer games than requested");
        }
    }
    if !args.has_flag("--no-save") {
        historical_dataset::save_signal(&conn, &signal.record(Utc::now()))
            .context("persist signal")?;
    }
    Ok(())
}

fn cmd_slate(args: &CliArgs, config: &PipelineConfig) -> Result<()> {
    let date = required_date(args, "--date")?;
    let conn = open_store(config)?;
    let snapshot = load_snapshot(&conn)?;
    let pipeline = Pipeline::new(&snapshot, config);
    let report = pipeline
        .predict_slate(date, args.f64("--calibration"))
        .with_context(|| format!("predict slate for {date}"))?;

    if args.has_flag("--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_signal_header();
        for signal in &report.signals {
            print_signal(signal);
        }
        for failure in &report.failures {
            println!(
                "FAILED {:<12} {} @ {}: {}",
                failure.game_id, failure.away, failure.home, failure.reason
            );
        }
    }

    if !args.has_flag("--no-save") {
        let created_at = Utc::now();
        for signal in &report.signals {
            historical_dataset::save_signal(&conn, &signal.record(created_at))
                .context("persist signal")?;
        }
    }
    if report.signals.is_empty() {
        bail!(
            "no signals for {date} ({} games failed)",
            report.failures.len()
        );
    }
    Ok(())
}

fn cmd_backtest(args: &CliArgs, config: &PipelineConfig) -> Result<()> {
    let from = optional_date(args, "--from")?;
    let to = optional_date(args, "--to")?;
    let model = match args.value("--model") {
        Some(raw) => ModelKind::parse(&raw).ok_or_else(|| anyhow!("unknown model `{raw}`"))?,
        None => ModelKind::Baseline,
    };

    let conn = open_store(config)?;
    let snapshot = load_snapshot(&conn)?;
    let games = snapshot.completed_games(from, to);
    if games.is_empty() {
        bail!("no completed games in the requested range");
    }

    let cache = match model {
        ModelKind::Baseline => build_cache(&snapshot, config, BaselineTrainer, &games)?,
        ModelKind::Ridge => build_cache(
            &snapshot,
            config,
            RidgeTrainer {
                l2: config.ridge_l2,
            },
            &games,
        )?,
    };

    let results = backtest::evaluate(
        &cache,
        config.calibration_constant,
        &config.backtest_thresholds,
        &config.decision,
        config.payout_ratio,
    );
    let bands = backtest::deviation_bands(&cache, config.calibration_constant, config.payout_ratio);
    let calibration = cache.calibration_report(config.calibration_constant);

    println!(
        "model={} folds={} evaluated={} failed={} constant={}",
        cache.model,
        cache.folds.len(),
        cache.len(),
        cache.failures.len(),
        config.calibration_constant
    );
    println!(
        "{:>9} {:>6} {:>5} {:>5} {:>6} {:>6} {:>9} {:>8} {:>7}",
        "threshold", "games", "bets", "wins", "losses", "pushes", "accuracy", "roi", "mae"
    );
    for r in &results {
        println!(
            "{:>9.1} {:>6} {:>5} {:>5} {:>6} {:>6} {:>8.1}% {:>7.2}% {:>7.2}",
            r.threshold,
            r.games_considered,
            r.bets_placed,
            r.wins,
            r.losses,
            r.pushes,
            r.accuracy * 100.0,
            r.roi * 100.0,
            r.mae
        );
    }

    if args.has_flag("--bands") {
        println!();
        println!(
            "{:>7} {:>6} {:>5} {:>6} {:>9} {:>8} {:>6}",
            "band", "games", "wins", "losses", "accuracy", "roi", "over%"
        );
        for b in &bands {
            println!(
                "{:>7} {:>6} {:>5} {:>6} {:>8.1}% {:>7.2}% {:>5.0}%",
                b.label(),
                b.games,
                b.wins,
                b.losses,
                b.accuracy * 100.0,
                b.roi * 100.0,
                b.over_share * 100.0
            );
        }
    }

    println!();
    println!(
        "calibration: mae_raw={:.2} mae_calibrated={:.2} mean_bias={:+.2} suggested_constant={:+.2}",
        calibration.mae_raw,
        calibration.mae_calibrated,
        calibration.mean_bias_raw,
        calibration.suggested_constant
    );

    if let Some(path) = args.path("--xlsx") {
        let report = export::export_backtest(&path, &results, &bands, &cache, &calibration)
            .with_context(|| format!("failed writing workbook to {}", path.display()))?;
        println!(
            "wrote {} ({} thresholds, {} predictions)",
            path.display(),
            report.results,
            report.predictions
        );
    }
    Ok(())
}

fn build_cache<T: PredictorTrainer>(
    snapshot: &DataSnapshot,
    config: &PipelineConfig,
    trainer: T,
    games: &[hoops_edge::model::Game],
) -> Result<PredictionCache> {
    BacktestHarness::new(snapshot, config, trainer)
        .build_cache(games)
        .context("build prediction cache")
}

fn cmd_review(args: &CliArgs, config: &PipelineConfig) -> Result<()> {
    let date = required_date(args, "--date")?;
    let conn = open_store(config)?;
    let records = historical_dataset::load_signals(&conn, date).context("load stored signals")?;
    if records.is_empty() {
        bail!("no stored signals for {date}");
    }
    let snapshot = load_snapshot(&conn)?;
    let summary = review::review(&records, &snapshot, date, config.payout_ratio);

    println!(
        "{:<24} {:>6} {:>6} {:>7} {:>6} {:>7} {:>6}",
        "game", "line", "est", "side", "total", "result", "error"
    );
    for entry in &summary.entries {
        let r = &entry.record;
        println!(
            "{:<24} {:>6} {:>6.1} {:>7} {:>6} {:>7} {:>6}",
            format!("{} @ {}", r.away, r.home),
            opt_fmt(r.line, 1),
            r.calibrated_estimate,
            r.side.as_str(),
            opt_fmt(entry.actual_total, 0),
            entry
                .settlement
                .map(|s| format!("{s:?}").to_lowercase())
                .unwrap_or_else(|| "-".to_string()),
            opt_fmt(entry.abs_error, 1),
        );
    }
    println!(
        "signals={} completed={} bets={} record={}-{}-{} accuracy={:.1}% roi={:.2}% mae={:.2}",
        summary.signals,
        summary.completed,
        summary.bets,
        summary.wins,
        summary.losses,
        summary.pushes,
        summary.accuracy * 100.0,
        summary.roi * 100.0,
        summary.mae
    );
    Ok(())
}

fn print_signal_header() {
    println!(
        "{:<24} {:>7} {:>7} {:>6} {:>7} {:>6} {:>8} {:>8} {:>9}",
        "game", "raw", "est", "line", "dev", "side", "tier", "inj h/a", "reason"
    );
}

fn print_signal(s: &GameSignal) {
    println!(
        "{:<24} {:>7.1} {:>7.1} {:>6} {:>7} {:>6} {:>8} {:>8} {:>9}",
        format!("{} @ {}", s.away, s.home),
        s.prediction.raw_estimate,
        s.prediction.calibrated_estimate,
        opt_fmt(s.signal.line, 1),
        s.signal
            .deviation
            .map(|d| format!("{d:+.1}"))
            .unwrap_or_else(|| "-".to_string()),
        s.signal.side.as_str(),
        s.signal.tier.as_str(),
        format!("{:.1}/{:.1}", s.home_injury_impact, s.away_injury_impact),
        s.signal.skip_reason.map(|r| r.as_str()).unwrap_or("-"),
    );
}

fn opt_fmt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "-".to_string())
}

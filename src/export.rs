use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet};

use crate::backtest::{DeviationBand, PredictionCache};
use crate::calibration::CalibrationReport;
use crate::error::Result;
use crate::model::BacktestResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportReport {
    pub results: usize,
    pub bands: usize,
    pub predictions: usize,
    pub failures: usize,
}

/// Writes the backtest tables to an XLSX workbook, one sheet per table.
pub fn export_backtest(
    path: &Path,
    results: &[BacktestResult],
    bands: &[DeviationBand],
    cache: &PredictionCache,
    calibration: &CalibrationReport,
) -> Result<ExportReport> {
    let mut results_rows = vec![header(&[
        "threshold",
        "games_considered",
        "bets_placed",
        "wins",
        "losses",
        "pushes",
        "accuracy",
        "roi",
        "mae",
    ])];
    results_rows.extend(results.iter().map(result_row));

    let mut band_rows = vec![header(&[
        "band", "games", "wins", "losses", "pushes", "accuracy", "roi", "over_share",
    ])];
    band_rows.extend(bands.iter().map(band_row));

    let mut prediction_rows = vec![header(&[
        "game_id",
        "date",
        "fold",
        "raw_estimate",
        "line",
        "actual_total",
        "feature_version",
    ])];
    prediction_rows.extend(cache.predictions.iter().map(|p| {
        vec![
            p.game_id.clone(),
            p.date.to_string(),
            p.fold.to_string(),
            format!("{:.2}", p.raw_estimate),
            opt_to_string(p.line),
            format!("{:.0}", p.actual_total),
            p.feature_version.clone(),
        ]
    }));

    let mut failure_rows = vec![header(&["game_id", "date", "reason"])];
    failure_rows.extend(
        cache
            .failures
            .iter()
            .map(|f| vec![f.game_id.clone(), f.date.to_string(), f.reason.clone()]),
    );

    let calibration_rows = vec![
        header(&["metric", "value"]),
        vec!["model".to_string(), cache.model.clone()],
        vec!["samples".to_string(), calibration.samples.to_string()],
        vec!["mae_raw".to_string(), format!("{:.4}", calibration.mae_raw)],
        vec!["mae_calibrated".to_string(), format!("{:.4}", calibration.mae_calibrated)],
        vec!["mean_bias_raw".to_string(), format!("{:.4}", calibration.mean_bias_raw)],
        vec![
            "suggested_constant".to_string(),
            format!("{:.4}", calibration.suggested_constant),
        ],
    ];

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Thresholds")?;
        write_rows(sheet, &results_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("DeviationBands")?;
        write_rows(sheet, &band_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Calibration")?;
        write_rows(sheet, &calibration_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Failures")?;
        write_rows(sheet, &failure_rows)?;
    }
    workbook.save(path)?;

    Ok(ExportReport {
        results: results_rows.len().saturating_sub(1),
        bands: band_rows.len().saturating_sub(1),
        predictions: prediction_rows.len().saturating_sub(1),
        failures: failure_rows.len().saturating_sub(1),
    })
}

fn header(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn result_row(r: &BacktestResult) -> Vec<String> {
    vec![
        r.threshold.to_string(),
        r.games_considered.to_string(),
        r.bets_placed.to_string(),
        r.wins.to_string(),
        r.losses.to_string(),
        r.pushes.to_string(),
        format!("{:.4}", r.accuracy),
        format!("{:.4}", r.roi),
        format!("{:.3}", r.mae),
    ]
}

fn band_row(b: &DeviationBand) -> Vec<String> {
    vec![
        b.label(),
        b.games.to_string(),
        b.wins.to_string(),
        b.losses.to_string(),
        b.pushes.to_string(),
        format!("{:.4}", b.accuracy),
        format!("{:.4}", b.roi),
        format!("{:.3}", b.over_share),
    ]
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet.write_string(row_idx as u32, col_idx as u16, value)?;
        }
    }
    Ok(())
}

//! Write shocks, DON and panel tables to CSV.
//!
//! The shocks and DON layouts are the ones `io::ingest` reads, so a sample or
//! prep output can be fed straight back into `epps panel`.

use std::fs::{self, File};
use std::path::Path;

use crate::domain::{DonRecord, ShockRecord};
use crate::error::AppError;
use crate::panel::Panel;

const SHOCK_HEADER: [&str; 6] = ["Country", "Continent", "Year", "Shock_category", "Shock_type", "count"];
const DON_HEADER: [&str; 5] = ["Country", "Year", "DiseaseLevel1", "CasesTotal", "Deaths"];

/// Write a long-form shocks table.
pub fn write_shocks_csv(path: &Path, records: &[ShockRecord]) -> Result<(), AppError> {
    write_csv(
        path,
        &SHOCK_HEADER,
        records.iter().map(|r| {
            vec![
                r.country.clone(),
                r.continent.clone(),
                r.year.to_string(),
                r.shock_category.clone(),
                r.shock_type.clone(),
                r.count.to_string(),
            ]
        }),
    )
}

/// Write a DON table. Missing numbers are empty cells.
pub fn write_don_csv(path: &Path, records: &[DonRecord]) -> Result<(), AppError> {
    write_csv(
        path,
        &DON_HEADER,
        records.iter().map(|r| {
            vec![
                r.country.clone(),
                r.year.to_string(),
                r.disease.clone(),
                fmt_opt(r.cases_total),
                fmt_opt(r.deaths),
            ]
        }),
    )
}

/// Write a panel: keys, outcomes, predictors, generated columns.
pub fn write_panel_csv(path: &Path, panel: &Panel) -> Result<(), AppError> {
    let header = panel.columns();
    let header: Vec<&str> = header.iter().map(String::as_str).collect();
    write_csv(path, &header, panel.to_records().into_iter())
}

fn write_csv(path: &Path, header: &[&str], rows: impl Iterator<Item = Vec<String>>) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::io(format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(header)
        .map_err(|e| AppError::io(format!("Failed to write CSV header of '{}': {e}", path.display())))?;
    let mut n = 0usize;
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|e| AppError::io(format!("Failed to write CSV row of '{}': {e}", path.display())))?;
        n += 1;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", path.display())))?;

    tracing::debug!(path = %path.display(), rows = n, "wrote CSV");
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

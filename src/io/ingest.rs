//! CSV ingest for the cleaned shocks and DON tables.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (rows keep file order)
//! - **Separation of concerns**: no aggregation or panel logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::domain::{DonRecord, RowError, ShockRecord};
use crate::error::AppError;

/// Typed rows read from one input file, plus the rows that were rejected.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

type HeaderMap = HashMap<String, usize>;

/// Load a shocks table (`Country, Continent, Year, Shock_category, Shock_type, count`).
///
/// `Country_name` is accepted in place of `Country`.
pub fn load_shocks(path: &Path) -> Result<Ingested<ShockRecord>, AppError> {
    let out = read_rows(
        path,
        &["country", "continent", "year", "shock_category", "shock_type", "count"],
        parse_shock_row,
    )?;
    if out.records.is_empty() {
        return Err(AppError::no_data(format!(
            "No valid shock rows in '{}' ({} rows read, {} rejected).",
            path.display(),
            out.rows_read,
            out.row_errors.len()
        )));
    }
    Ok(out)
}

/// Load a DON table (`Country, Year | ReportDate, DiseaseLevel1, CasesTotal, Deaths`).
///
/// An empty DON table is allowed: the panel then carries zero cases/deaths.
pub fn load_don(path: &Path) -> Result<Ingested<DonRecord>, AppError> {
    read_rows(path, &["country"], parse_don_row).and_then(|out| {
        if out.rows_read > 0 && out.records.is_empty() {
            return Err(AppError::no_data(format!(
                "No valid DON rows in '{}' ({} rows rejected).",
                path.display(),
                out.row_errors.len()
            )));
        }
        Ok(out)
    })
}

fn read_rows<T>(
    path: &Path,
    required: &[&str],
    parse: fn(&StringRecord, &HeaderMap) -> Result<T, String>,
) -> Result<Ingested<T>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::invalid(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::invalid(format!("Failed to read CSV headers of '{}': {e}", path.display())))?
        .clone();
    let header_map = build_header_map(&headers);

    for name in required {
        if !header_map.contains_key(*name) {
            return Err(AppError::invalid(format!(
                "Missing required column `{name}` in '{}'.",
                path.display()
            )));
        }
    }

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse(&record, &header_map) {
            Ok(row) => records.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        tracing::warn!(
            file = %path.display(),
            rejected = row_errors.len(),
            rows_read,
            "skipped invalid rows"
        );
    }

    Ok(Ingested {
        records,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HeaderMap {
    let mut map: HeaderMap = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();
    if !map.contains_key("country") {
        if let Some(&idx) = map.get("country_name") {
            map.insert("country".to_string(), idx);
        }
    }
    map
}

/// Lowercase, strip a UTF-8 BOM, and collapse runs of spaces/hyphens to `_`
/// so `Shock category`, `Shock-category` and `shock_category` all match.
fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    let mut out = String::with_capacity(name.len());
    let mut in_sep = false;
    for ch in name.chars() {
        if ch == ' ' || ch == '-' {
            if !in_sep {
                out.push('_');
            }
            in_sep = true;
        } else {
            out.push(ch.to_ascii_lowercase());
            in_sep = false;
        }
    }
    out
}

fn parse_shock_row(record: &StringRecord, header_map: &HeaderMap) -> Result<ShockRecord, String> {
    let country = get_required(record, header_map, "country")?.to_string();
    let continent = get_required(record, header_map, "continent")?.to_string();
    let year = parse_year(get_required(record, header_map, "year")?)?;
    let shock_category = get_required(record, header_map, "shock_category")?.to_string();
    let shock_type = get_required(record, header_map, "shock_type")?.to_string();
    let count = parse_count(get_required(record, header_map, "count")?)?;

    Ok(ShockRecord {
        country,
        continent,
        year,
        shock_category,
        shock_type,
        count,
    })
}

fn parse_don_row(record: &StringRecord, header_map: &HeaderMap) -> Result<DonRecord, String> {
    let country = get_required(record, header_map, "country")?.to_string();

    let year = match get_optional(record, header_map, "year") {
        Some(y) => parse_year(y)?,
        None => {
            let date = get_optional(record, header_map, "reportdate")
                .ok_or_else(|| "Missing both `Year` and `ReportDate`.".to_string())?;
            parse_report_date(date)?.year()
        }
    };

    let disease = get_optional(record, header_map, "diseaselevel1")
        .unwrap_or_default()
        .to_string();

    Ok(DonRecord {
        country,
        year,
        disease,
        cases_total: parse_opt_f64(get_optional(record, header_map, "casestotal")),
        deaths: parse_opt_f64(get_optional(record, header_map, "deaths")),
    })
}

fn get_required<'a>(record: &'a StringRecord, header_map: &HeaderMap, name: &str) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HeaderMap, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_year(s: &str) -> Result<i32, String> {
    // Spreadsheet exports sometimes write years as `2004.0`.
    let v: f64 = s.parse().map_err(|_| format!("Invalid year '{s}'."))?;
    if !v.is_finite() || v.fract() != 0.0 || v < 0.0 || v > 9999.0 {
        return Err(format!("Invalid year '{s}'."));
    }
    Ok(v as i32)
}

fn parse_count(s: &str) -> Result<u64, String> {
    let v: f64 = s.parse().map_err(|_| format!("Invalid count '{s}'."))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("Invalid count '{s}' (must be a finite, non-negative number)."));
    }
    Ok(v.round() as u64)
}

fn parse_report_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    const DATETIME_FMTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(format!(
        "Invalid ReportDate '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

/// Lenient number parsing for DON totals: `>100` reads as 100, anything
/// unparseable is missing.
fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?.trim_start_matches('>').trim();
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn header_names_are_normalized() {
        assert_eq!(normalize_header_name("\u{feff}Shock category"), "shock_category");
        assert_eq!(normalize_header_name("Shock - type"), "shock_type");
        assert_eq!(normalize_header_name(" Country_name "), "country_name");
    }

    #[test]
    fn loads_shocks_and_reports_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shocks.csv");
        fs::write(
            &path,
            "Country_name,Continent,Year,Shock category,Shock-type,count\n\
             Kenya,Africa,2001,CLIMATIC,Drought,3\n\
             Kenya,Africa,2001,,Flood,1\n\
             Kenya,Africa,year,CLIMATIC,Flood,1\n\
             Peru,America,2002.0,BIOLOGICAL,Infectious disease,2\n\
             Peru,America,2003,CLIMATIC,Flood,-1\n",
        )
        .unwrap();

        let out = load_shocks(&path).unwrap();
        assert_eq!(out.rows_read, 5);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.row_errors.len(), 3);
        assert_eq!(out.row_errors[0].line, 3);
        assert_eq!(out.records[1].year, 2002);
        assert_eq!(out.records[1].shock_type, "Infectious disease");
    }

    #[test]
    fn missing_shock_column_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shocks.csv");
        fs::write(&path, "Country,Year,Shock_category,Shock_type,count\nKenya,2001,A,B,1\n").unwrap();
        let err = load_shocks(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("continent"));
    }

    #[test]
    fn don_year_falls_back_to_report_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("don.csv");
        fs::write(
            &path,
            "Country,ReportDate,DiseaseLevel1,CasesTotal,Deaths\n\
             Kenya,2004-03-01,Cholera,120,>10\n\
             Peru,15/07/2005,Dengue,n/a,\n",
        )
        .unwrap();

        let out = load_don(&path).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].year, 2004);
        assert_eq!(out.records[0].deaths, Some(10.0));
        assert_eq!(out.records[1].year, 2005);
        assert_eq!(out.records[1].cases_total, None);
    }

    #[test]
    fn empty_don_table_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("don.csv");
        fs::write(&path, "Country,Year,DiseaseLevel1,CasesTotal,Deaths\n").unwrap();
        assert!(load_don(&path).unwrap().records.is_empty());
    }
}

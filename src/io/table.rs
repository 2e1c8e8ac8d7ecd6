//! Loosely-typed result tables and their file formats.
//!
//! Result files come from the external fitting engine, so their schema is only
//! partly known: `spec_id` plus whatever statistics the engine reports. A
//! `ResultTable` therefore keeps every cell as text and lets callers parse the
//! columns they care about (scores, convergence flags).
//!
//! Formats are chosen by file extension:
//! - `.json`: a columnar document `{"columns": [{"name": .., "values": [..]}, ..]}`
//! - anything else: CSV with a header row

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// An ordered set of named text columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, padding short rows with empty cells and dropping extras.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }

    /// Non-empty values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Vec<&str> {
        let Some(idx) = self.column_index(name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|r| r.get(idx))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// A new table holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().filter_map(|&i| self.rows.get(i).cloned()).collect(),
        }
    }

    /// Stack tables vertically. Columns are the union in first-seen order;
    /// cells a table does not have are left empty.
    pub fn concat(tables: &[ResultTable]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for t in tables {
            for c in &t.columns {
                if !positions.contains_key(c) {
                    positions.insert(c.clone(), columns.len());
                    columns.push(c.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(ResultTable::len).sum());
        for t in tables {
            let mapping: Vec<usize> = t.columns.iter().map(|c| positions[c]).collect();
            for r in &t.rows {
                let mut out = vec![String::new(); columns.len()];
                for (cell, &target) in r.iter().zip(&mapping) {
                    out[target] = cell.clone();
                }
                rows.push(out);
            }
        }

        Self { columns, rows }
    }

    /// Keep one row per value of `key`, the last one seen, at its own
    /// position. Rows with an empty key are dropped. A table without the
    /// column is returned unchanged.
    pub fn dedup_keep_last(&self, key: &str) -> Self {
        let Some(idx) = self.column_index(key) else {
            return self.clone();
        };
        let mut last: HashMap<&str, usize> = HashMap::new();
        for (i, r) in self.rows.iter().enumerate() {
            let k = r[idx].trim();
            if !k.is_empty() {
                last.insert(k, i);
            }
        }
        let keep: Vec<usize> = (0..self.rows.len())
            .filter(|&i| last.get(self.rows[i][idx].trim()) == Some(&i))
            .collect();
        self.select_rows(&keep)
    }
}

/// Storage format of a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(TableFormat::Json),
            "parquet" => Err(AppError::invalid(format!(
                "Parquet is not supported for '{}'; use a .csv or .json path.",
                path.display()
            ))),
            _ => Ok(TableFormat::Csv),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnarDoc {
    columns: Vec<ColumnData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnData {
    name: String,
    values: Vec<serde_json::Value>,
}

/// Read a table in the format implied by its extension.
pub fn read_table(path: &Path) -> Result<ResultTable, AppError> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv_table(path),
        TableFormat::Json => read_json_table(path),
    }
}

/// Write a table atomically: a temporary sibling file is written first and
/// renamed over `path`. Parent directories are created as needed.
pub fn write_table_atomic(path: &Path, table: &ResultTable) -> Result<(), AppError> {
    let format = TableFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::io(format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }

    let tmp = temp_sibling(path);
    let written = match format {
        TableFormat::Csv => write_csv_table(&tmp, table),
        TableFormat::Json => write_json_table(&tmp, table),
    };
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::io(format!("Failed to move '{}' into place: {e}", path.display()))
    })
}

/// Files directly under `dir` whose name matches the glob `pattern`
/// (`*`, `?`, `[...]`), sorted by name. Leading dots must match literally.
///
/// A missing directory yields an empty list; a malformed pattern is invalid.
pub fn list_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, AppError> {
    let pattern = glob::Pattern::new(pattern)
        .map_err(|e| AppError::invalid(format!("Invalid file pattern '{pattern}': {e}")))?;
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };

    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::io(format!("Failed to list '{}': {e}", dir.display())))?;

    let mut out = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| AppError::io(format!("Failed to list '{}': {e}", dir.display())))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matched = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| pattern.matches_with(n, options));
        if matched {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("table");
    path.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

fn read_csv_table(path: &Path) -> Result<ResultTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new().from_reader(file);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::invalid(format!("Failed to read headers of '{}': {e}", path.display())))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AppError::invalid(format!("Malformed row {} in '{}': {e}", idx + 2, path.display()))
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(ResultTable { columns, rows })
}

fn write_csv_table(path: &Path, table: &ResultTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;
    writer
        .write_record(&table.columns)
        .map_err(|e| AppError::io(format!("Failed to write header of '{}': {e}", path.display())))?;
    for r in &table.rows {
        writer
            .write_record(r)
            .map_err(|e| AppError::io(format!("Failed to write row of '{}': {e}", path.display())))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", path.display())))
}

fn read_json_table(path: &Path) -> Result<ResultTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;
    let doc: ColumnarDoc = serde_json::from_reader(file)
        .map_err(|e| AppError::invalid(format!("Invalid table JSON '{}': {e}", path.display())))?;

    let n_rows = doc.columns.first().map_or(0, |c| c.values.len());
    if let Some(bad) = doc.columns.iter().find(|c| c.values.len() != n_rows) {
        return Err(AppError::invalid(format!(
            "Column '{}' in '{}' has {} values, expected {n_rows}.",
            bad.name,
            path.display(),
            bad.values.len()
        )));
    }

    let columns = doc.columns.iter().map(|c| c.name.clone()).collect();
    let rows = (0..n_rows)
        .map(|i| doc.columns.iter().map(|c| json_to_cell(&c.values[i])).collect())
        .collect();
    Ok(ResultTable { columns, rows })
}

fn write_json_table(path: &Path, table: &ResultTable) -> Result<(), AppError> {
    let doc = ColumnarDoc {
        columns: table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| ColumnData {
                name: name.clone(),
                values: table.rows.iter().map(|r| cell_to_json(&r[idx])).collect(),
            })
            .collect(),
    };
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer(file, &doc)
        .map_err(|e| AppError::io(format!("Failed to write table JSON '{}': {e}", path.display())))
}

fn json_to_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Numbers are stored as JSON numbers only when that reads back as the same text.
fn cell_to_json(cell: &str) -> serde_json::Value {
    if cell.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(v) = cell.parse::<i64>() {
        let n = serde_json::Value::from(v);
        if n.to_string() == cell {
            return n;
        }
    }
    match cell.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(n) if n.to_string() == cell => serde_json::Value::Number(n),
        _ => serde_json::Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> ResultTable {
        ResultTable::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn concat_unions_columns_in_first_seen_order() {
        let a = table(&["spec_id", "aicc"], &[&["x", "1.0"]]);
        let b = table(&["spec_id", "aic", "aicc"], &[&["y", "2.0", "3.0"]]);
        let merged = ResultTable::concat(&[a, b]);
        assert_eq!(merged.columns(), ["spec_id", "aicc", "aic"]);
        assert_eq!(merged.rows()[0], vec!["x", "1.0", ""]);
        assert_eq!(merged.rows()[1], vec!["y", "3.0", "2.0"]);
    }

    #[test]
    fn dedup_keeps_last_occurrence_in_place() {
        let t = table(
            &["spec_id", "aicc"],
            &[&["a", "1"], &["b", "2"], &["a", "3"], &["c", "4"]],
        );
        let d = t.dedup_keep_last("spec_id");
        let ids: Vec<&str> = d.column_values("spec_id");
        assert_eq!(ids, ["b", "a", "c"]);
        assert_eq!(d.get(1, "aicc"), Some("3"));
    }

    #[test]
    fn csv_and_json_files_read_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let t = table(
            &["spec_id", "aicc", "converged", "formula"],
            &[&["a", "1.5", "TRUE", "y ~ x + z"], &["b", "", "FALSE", "y ~ 1"], &["c", "07", "1", "y, x"]],
        );

        for name in ["out.csv", "nested/out.json"] {
            let path = dir.path().join(name);
            write_table_atomic(&path, &t).unwrap();
            assert_eq!(read_table(&path).unwrap(), t, "{name}");
        }
    }

    #[test]
    fn list_matching_sorts_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["batch_0002.csv", "batch_0001.csv", "notes.txt", "batch_0003.json"] {
            fs::write(dir.path().join(name), "spec_id\n").unwrap();
        }
        let found = list_matching(dir.path(), "batch_*.csv").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["batch_0001.csv", "batch_0002.csv"]);

        assert!(list_matching(&dir.path().join("missing"), "*").unwrap().is_empty());
    }

    #[test]
    fn list_matching_supports_character_classes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["batch_0001.csv", "batch_log.csv", ".batch_0002.csv", "batch_7.csv"] {
            fs::write(dir.path().join(name), "spec_id\n").unwrap();
        }
        let names = |pattern: &str| -> Vec<String> {
            list_matching(dir.path(), pattern)
                .unwrap()
                .iter()
                .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
                .collect()
        };
        assert_eq!(names("batch_[0-9]*.csv"), ["batch_0001.csv", "batch_7.csv"]);
        assert_eq!(names("batch_?.csv"), ["batch_7.csv"]);
        assert_eq!(names("*.csv"), ["batch_0001.csv", "batch_7.csv", "batch_log.csv"]);
    }

    #[test]
    fn malformed_pattern_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_matching(dir.path(), "batch_[0-9.csv").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("batch_[0-9.csv"));

        let err = list_matching(&dir.path().join("missing"), "[").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn parquet_is_rejected_up_front() {
        let err = TableFormat::from_path(Path::new("merged.parquet")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}

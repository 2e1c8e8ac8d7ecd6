//! Write spec grids as fixed-size batch files, and read them back.
//!
//! A batch file is a CSV whose columns are exactly `SPEC_COLUMNS`. The same
//! layout is used for a whole-grid file, so `read_spec_file` accepts both.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BatchConfig, ModelSpec, SPEC_COLUMNS, SpecRecord};
use crate::error::AppError;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Summary written beside the batch files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: DateTime<Utc>,
    pub batch_size: usize,
    pub total_specs: usize,
    pub files: Vec<String>,
}

/// Name of the `index`-th (1-based) batch file.
pub fn batch_file_name(basename: &str, index: usize) -> String {
    format!("{basename}_{index:04}.csv")
}

/// Partition `specs` into consecutive chunks of `batch_size` and write one
/// file per chunk, plus `manifest.json`. Returns the batch paths in order.
///
/// An empty grid writes no batch files (the manifest still lists zero).
pub fn write_batches(specs: &[ModelSpec], config: &BatchConfig) -> Result<Vec<PathBuf>, AppError> {
    if config.batch_size == 0 {
        return Err(AppError::invalid("batch_size must be at least 1."));
    }
    fs::create_dir_all(&config.out_dir).map_err(|e| {
        AppError::io(format!(
            "Failed to create batch directory '{}': {e}",
            config.out_dir.display()
        ))
    })?;

    let mut paths = Vec::with_capacity(specs.len().div_ceil(config.batch_size));
    for (i, chunk) in specs.chunks(config.batch_size).enumerate() {
        let path = config.out_dir.join(batch_file_name(&config.basename, i + 1));
        write_spec_file(&path, chunk)?;
        paths.push(path);
    }

    let manifest = BatchManifest {
        created_at: Utc::now(),
        batch_size: config.batch_size,
        total_specs: specs.len(),
        files: paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect(),
    };
    write_manifest(&config.out_dir.join(MANIFEST_FILE), &manifest)?;

    tracing::info!(
        dir = %config.out_dir.display(),
        batches = paths.len(),
        specs = specs.len(),
        batch_size = config.batch_size,
        "wrote batch files"
    );
    Ok(paths)
}

/// Write specs to one CSV in protocol column order.
pub fn write_spec_file(path: &Path, specs: &[ModelSpec]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create spec file '{}': {e}", path.display())))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    writer
        .write_record(SPEC_COLUMNS)
        .map_err(|e| AppError::io(format!("Failed to write header of '{}': {e}", path.display())))?;
    for spec in specs {
        writer
            .serialize(spec.to_record())
            .map_err(|e| AppError::io(format!("Failed to write row of '{}': {e}", path.display())))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a grid or batch file, verifying every row's id against its fields.
pub fn read_spec_file(path: &Path) -> Result<Vec<ModelSpec>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open spec file '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new().from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::invalid(format!("Failed to read headers of '{}': {e}", path.display())))?;
    if headers.iter().ne(SPEC_COLUMNS) {
        return Err(AppError::invalid(format!(
            "'{}' is not a spec file: expected columns {}.",
            path.display(),
            SPEC_COLUMNS.join(",")
        )));
    }

    let mut specs = Vec::new();
    for (idx, row) in reader.deserialize::<SpecRecord>().enumerate() {
        let line = idx + 2;
        let record = row.map_err(|e| {
            AppError::invalid(format!("Malformed spec at line {line} of '{}': {e}", path.display()))
        })?;
        let spec = ModelSpec::from_record(record)
            .map_err(|e| AppError::invalid(format!("Line {line} of '{}': {e}", path.display())))?;
        specs.push(spec);
    }
    Ok(specs)
}

fn write_manifest(path: &Path, manifest: &BatchManifest) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create manifest '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, manifest)
        .map_err(|e| AppError::io(format!("Failed to write manifest '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a `manifest.json` written by `write_batches`.
pub fn read_manifest(path: &Path) -> Result<BatchManifest, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open manifest '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::invalid(format!("Invalid manifest '{}': {e}", path.display())))
}

//! Consolidate per-batch result files into one deduplicated store.

use std::fs;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::domain::{MergeConfig, SPEC_ID_COL, Scan, SkippedFile};
use crate::error::AppError;
use crate::io::table::{ResultTable, list_matching, read_table, write_table_atomic};

/// What a merge did.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: ResultTable,
    /// Batch files that were read and merged.
    pub merged_files: Vec<PathBuf>,
    /// Whether the store file was (re)written.
    pub written: bool,
}

/// Merge result files under `results_dir` into `output_file`.
///
/// Sources, lowest priority first: the existing store, then batch files
/// sorted by name. Rows are deduplicated by `spec_id` keeping the last
/// occurrence. Files without a `spec_id` column are skipped and never
/// deleted. With no readable batch files the existing store (or an empty
/// table) is returned and nothing is written.
pub fn merge_results(config: &MergeConfig) -> Result<Scan<MergeOutcome>, AppError> {
    let files: Vec<PathBuf> = list_matching(&config.results_dir, &config.pattern)?
        .into_iter()
        .filter(|p| p != &config.output_file)
        .collect();

    let loaded: Vec<Result<ResultTable, AppError>> = files.par_iter().map(|p| read_table(p)).collect();

    let mut tables = Vec::with_capacity(files.len() + 1);
    let mut merged_files = Vec::new();
    let mut skipped = Vec::new();
    for (path, result) in files.into_iter().zip(loaded) {
        match result {
            Ok(table) if table.has_column(SPEC_ID_COL) => {
                tables.push(table);
                merged_files.push(path);
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "skipping result file without spec_id column");
                skipped.push(SkippedFile {
                    path,
                    reason: format!("no '{SPEC_ID_COL}' column"),
                });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable result file");
                skipped.push(SkippedFile {
                    path,
                    reason: e.message().to_string(),
                });
            }
        }
    }

    let existing = if config.output_file.is_file() {
        Some(read_table(&config.output_file)?)
    } else {
        None
    };

    if tables.is_empty() {
        tracing::info!(
            dir = %config.results_dir.display(),
            skipped_files = skipped.len(),
            "no batch results to merge"
        );
        return Ok(Scan {
            value: MergeOutcome {
                table: existing.unwrap_or_default(),
                merged_files,
                written: false,
            },
            skipped,
        });
    }

    if let Some(store) = existing {
        tables.insert(0, store);
    }
    let table = ResultTable::concat(&tables).dedup_keep_last(SPEC_ID_COL);
    write_table_atomic(&config.output_file, &table)?;

    tracing::info!(
        output = %config.output_file.display(),
        files = merged_files.len(),
        rows = table.len(),
        skipped_files = skipped.len(),
        "merged results"
    );

    if config.delete_after {
        for path in &merged_files {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete merged batch file");
            }
        }
    }

    Ok(Scan {
        value: MergeOutcome {
            table,
            merged_files,
            written: true,
        },
        skipped,
    })
}

//! Reconcile completed spec ids against the grid.

use std::collections::HashSet;
use std::path::Path;

use crate::domain::{ModelSpec, SPEC_ID_COL, Scan, SkippedFile};
use crate::error::AppError;
use crate::io::table::{list_matching, read_table};

/// Spec ids already present in the merged store and in per-batch result
/// files under `results_dir` matching `pattern`.
///
/// Files that cannot be read, or that have no `spec_id` column, are skipped
/// and reported. A missing store or directory contributes nothing.
pub fn completed_ids(
    results_dir: &Path,
    merged_file: Option<&Path>,
    pattern: &str,
) -> Result<Scan<HashSet<String>>, AppError> {
    let mut sources = Vec::new();
    if let Some(store) = merged_file.filter(|p| p.is_file()) {
        sources.push(store.to_path_buf());
    }
    sources.extend(list_matching(results_dir, pattern)?);

    let mut done = HashSet::new();
    let mut skipped = Vec::new();
    for path in sources {
        let table = match read_table(&path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable result file");
                skipped.push(SkippedFile {
                    path,
                    reason: e.message().to_string(),
                });
                continue;
            }
        };
        if !table.has_column(SPEC_ID_COL) {
            tracing::warn!(path = %path.display(), "skipping result file without spec_id column");
            skipped.push(SkippedFile {
                path,
                reason: format!("no '{SPEC_ID_COL}' column"),
            });
            continue;
        }
        done.extend(table.column_values(SPEC_ID_COL).into_iter().map(str::to_string));
    }

    Ok(Scan { value: done, skipped })
}

/// Grid rows whose id is not yet completed, in grid order.
pub fn filter_pending(
    grid: &[ModelSpec],
    results_dir: &Path,
    merged_file: Option<&Path>,
    pattern: &str,
) -> Result<Scan<Vec<ModelSpec>>, AppError> {
    let Scan { value: done, skipped } = completed_ids(results_dir, merged_file, pattern)?;
    if done.is_empty() {
        tracing::info!(grid = grid.len(), "no completed specs found");
        return Ok(Scan {
            value: grid.to_vec(),
            skipped,
        });
    }

    let pending: Vec<ModelSpec> = grid
        .iter()
        .filter(|s| !done.contains(s.id().as_str()))
        .cloned()
        .collect();
    tracing::info!(
        grid = grid.len(),
        completed = done.len(),
        pending = pending.len(),
        skipped_files = skipped.len(),
        "filtered pending specs"
    );
    Ok(Scan {
        value: pending,
        skipped,
    })
}

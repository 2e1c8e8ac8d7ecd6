//! Shared workflows used by the CLI handlers.
//!
//! Keeping these in one place avoids duplicating the multi-stage flows:
//!
//! - inputs -> (prep) -> panel
//! - grid -> pending -> batches -> fitter -> merge -> rank
//!
//! The handlers in `app` then only deal with arguments and printing.

use std::path::{Path, PathBuf};

use crate::app::dispatch::{FitterCommand, dispatch_batches};
use crate::batch::{filter_pending, read_spec_file, write_batches};
use crate::cli::GridSource;
use crate::domain::{
    BatchConfig, DonRecord, MergeConfig, ModelSpec, PanelConfig, PanelMode, RankConfig, RowError, Scan,
};
use crate::error::AppError;
use crate::grid::{generate_grid, load_grid_config};
use crate::io::ingest::{load_don, load_shocks};
use crate::io::table::ResultTable;
use crate::panel::{Panel, build_panel};
use crate::prep::{prepare_don, prepare_shocks};
use crate::results::{MergeOutcome, merge_results, rank_with};

/// A built panel plus the input rows that were rejected on the way.
#[derive(Debug, Clone)]
pub struct PanelOutput {
    pub panel: Panel,
    pub shock_errors: Vec<RowError>,
    pub don_errors: Vec<RowError>,
}

/// Load inputs, optionally prep them, and build the panel.
pub fn build_panel_from_files(
    shocks_path: &Path,
    don_path: Option<&Path>,
    mode: PanelMode,
    prep: bool,
    config: &PanelConfig,
) -> Result<PanelOutput, AppError> {
    let shocks = load_shocks(shocks_path)?;
    let (don, don_errors): (Vec<DonRecord>, Vec<RowError>) = match don_path {
        Some(path) => {
            let loaded = load_don(path)?;
            (loaded.records, loaded.row_errors)
        }
        None => (Vec::new(), Vec::new()),
    };

    let (shock_records, don) = if prep {
        (prepare_shocks(&shocks.records, config).records, prepare_don(&don))
    } else {
        (shocks.records, don)
    };
    if shock_records.is_empty() {
        return Err(AppError::no_data("No shock rows left after prep."));
    }

    let panel = build_panel(mode, &shock_records, &don, config);
    tracing::info!(
        rows = panel.len(),
        predictors = panel.predictors().len(),
        generated = panel.features().len(),
        "built panel"
    );

    Ok(PanelOutput {
        panel,
        shock_errors: shocks.row_errors,
        don_errors,
    })
}

/// Generate the grid from a config, or read a previously written grid CSV.
pub fn load_grid(source: &GridSource) -> Result<Vec<ModelSpec>, AppError> {
    match (&source.config, &source.grid) {
        (Some(config), _) => Ok(generate_grid(&load_grid_config(config)?)?.specs),
        (None, Some(grid)) => read_spec_file(grid),
        (None, None) => Err(AppError::invalid("Pass --config or --grid.")),
    }
}

/// Everything a `run` produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub grid_len: usize,
    pub pending: Scan<Vec<ModelSpec>>,
    pub batches: Vec<PathBuf>,
    pub merge: Scan<MergeOutcome>,
    pub ranked: ResultTable,
}

/// Settings for one `run`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub panel_file: PathBuf,
    pub batch: BatchConfig,
    pub merge: MergeConfig,
    pub rank: RankConfig,
}

/// Pending -> batches -> fitter -> merge -> rank.
///
/// A fitter failure aborts the run before merging; results from batches that
/// did finish stay in the results directory for the next run.
pub fn run_grid(grid: &[ModelSpec], fitter: &FitterCommand, config: &RunConfig) -> Result<RunOutput, AppError> {
    if !config.panel_file.is_file() {
        return Err(AppError::invalid(format!(
            "Panel file '{}' not found; run `epps panel` first.",
            config.panel_file.display()
        )));
    }

    let pending = filter_pending(
        grid,
        &config.merge.results_dir,
        Some(config.merge.output_file.as_path()),
        &config.merge.pattern,
    )?;

    let batches = if pending.value.is_empty() {
        tracing::info!("nothing pending; skipping dispatch");
        Vec::new()
    } else {
        let batches = write_batches(&pending.value, &config.batch)?;
        dispatch_batches(fitter, &batches, &config.panel_file, &config.merge.results_dir)?;
        batches
    };

    let merge = merge_results(&config.merge)?;
    let ranked = rank_with(&merge.value.table, &config.rank);

    Ok(RunOutput {
        grid_len: grid.len(),
        pending,
        batches,
        merge,
        ranked,
    })
}

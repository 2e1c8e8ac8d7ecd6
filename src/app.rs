//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and initialises logging
//! - turns flags into config values
//! - runs the requested stage
//! - prints reports and writes outputs

use std::path::Path;

use clap::Parser;

use crate::cli::{
    BatchOpts, BatchesArgs, Cli, Command, GridArgs, MergeArgs, PanelArgs, PanelOpts, PendingArgs, PrepArgs,
    RankArgs, RankOpts, ResultsOpts, RunArgs, SampleArgs,
};
use crate::data::{SampleConfig, generate_sample};
use crate::domain::{BatchConfig, MergeConfig, PanelConfig, RankConfig};
use crate::error::AppError;

pub mod dispatch;
pub mod pipeline;

/// Entry point for the `epps` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing(cli.log_json, cli.log_level);

    match cli.command {
        Command::Sample(args) => handle_sample(&args),
        Command::Prep(args) => handle_prep(&args),
        Command::Panel(args) => handle_panel(&args),
        Command::Grid(args) => handle_grid(&args),
        Command::Pending(args) => handle_pending(&args),
        Command::Batches(args) => handle_batches(&args),
        Command::Run(args) => handle_run(&args),
        Command::Merge(args) => handle_merge(&args),
        Command::Rank(args) => handle_rank(&args),
    }
}

fn handle_sample(args: &SampleArgs) -> Result<(), AppError> {
    let config = sample_config_from_args(args);
    let sample = generate_sample(&config, &PanelConfig::default().outcome_shock_type)?;

    let shocks_path = args.out_dir.join("shocks.csv");
    let don_path = args.out_dir.join("don.csv");
    crate::io::export::write_shocks_csv(&shocks_path, &sample.shocks)?;
    crate::io::export::write_don_csv(&don_path, &sample.don)?;

    println!(
        "Wrote {} shock rows to {} and {} DON rows to {}",
        sample.shocks.len(),
        shocks_path.display(),
        sample.don.len(),
        don_path.display()
    );
    Ok(())
}

fn handle_prep(args: &PrepArgs) -> Result<(), AppError> {
    let config = panel_config_from_args(&args.panel);
    let shocks = crate::io::ingest::load_shocks(&args.shocks)?;
    let prepared = crate::prep::prepare_shocks(&shocks.records, &config);

    let don = match &args.don {
        Some(path) => {
            let loaded = crate::io::ingest::load_don(path)?;
            print!("{}", crate::report::format_row_errors("don", &loaded.row_errors));
            crate::prep::prepare_don(&loaded.records)
        }
        None => Vec::new(),
    };

    crate::io::export::write_shocks_csv(&args.out_dir.join("shocks.csv"), &prepared.records)?;
    if args.don.is_some() {
        crate::io::export::write_don_csv(&args.out_dir.join("don.csv"), &don)?;
    }

    print!("{}", crate::report::format_row_errors("shocks", &shocks.row_errors));
    print!("{}", crate::report::format_prep_summary(&prepared, shocks.records.len(), don.len()));
    if !prepared.rare_types_dropped.is_empty() {
        println!("Rare types: {}", prepared.rare_types_dropped.join(", "));
    }
    Ok(())
}

fn handle_panel(args: &PanelArgs) -> Result<(), AppError> {
    let config = panel_config_from_args(&args.panel);
    let out = pipeline::build_panel_from_files(&args.shocks, args.don.as_deref(), args.mode, args.prep, &config)?;

    crate::io::export::write_panel_csv(&args.out, &out.panel)?;

    print!("{}", crate::report::format_row_errors("shocks", &out.shock_errors));
    print!("{}", crate::report::format_row_errors("don", &out.don_errors));
    print!("{}", crate::report::format_panel_summary(&out.panel));
    println!("Wrote {}", args.out.display());
    Ok(())
}

fn handle_grid(args: &GridArgs) -> Result<(), AppError> {
    let config = crate::grid::load_grid_config(&args.config)?;
    let grid = crate::grid::generate_grid(&config)?;

    print!("{}", crate::report::format_grid_summary(&grid));
    if let Some(path) = &args.out {
        write_grid_csv(path, &grid.specs)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_pending(args: &PendingArgs) -> Result<(), AppError> {
    let grid = pipeline::load_grid(&args.source)?;
    let pending = crate::batch::filter_pending(
        &grid,
        &args.results.results_dir,
        Some(args.results.merged.as_path()),
        &args.results.batch_glob,
    )?;

    print!(
        "{}",
        crate::report::format_pending_summary(grid.len(), pending.value.len(), &pending.skipped)
    );
    if let Some(path) = &args.out {
        write_grid_csv(path, &pending.value)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_batches(args: &BatchesArgs) -> Result<(), AppError> {
    let grid = pipeline::load_grid(&args.source)?;
    let pending = crate::batch::filter_pending(
        &grid,
        &args.results.results_dir,
        Some(args.results.merged.as_path()),
        &args.results.batch_glob,
    )?;
    print!(
        "{}",
        crate::report::format_pending_summary(grid.len(), pending.value.len(), &pending.skipped)
    );

    let config = batch_config_from_args(&args.batch);
    crate::batch::write_batches(&pending.value, &config)?;
    let manifest = crate::batch::read_manifest(&config.out_dir.join(crate::batch::MANIFEST_FILE))?;
    print!("{}", crate::report::format_batch_summary(&manifest));
    Ok(())
}

fn handle_run(args: &RunArgs) -> Result<(), AppError> {
    let fitter = dispatch::FitterCommand::resolve(args.fitter.as_deref())?;
    let grid = pipeline::load_grid(&args.source)?;
    let config = pipeline::RunConfig {
        panel_file: args.panel.clone(),
        batch: batch_config_from_args(&args.batch),
        merge: merge_config_from_args(&args.results, args.delete_after),
        rank: rank_config_from_args(&args.rank),
    };

    let out = pipeline::run_grid(&grid, &fitter, &config)?;

    print!(
        "{}",
        crate::report::format_pending_summary(out.grid_len, out.pending.value.len(), &out.pending.skipped)
    );
    println!("Dispatched {} batch(es)", out.batches.len());
    print!("{}", crate::report::format_merge_summary(&out.merge.value, &out.merge.skipped));
    println!();
    print!("{}", crate::report::format_ranked(&out.ranked, &config.rank.score_col));
    Ok(())
}

fn handle_merge(args: &MergeArgs) -> Result<(), AppError> {
    let config = merge_config_from_args(&args.results, args.delete_after);
    let merged = crate::results::merge_results(&config)?;
    print!("{}", crate::report::format_merge_summary(&merged.value, &merged.skipped));
    if merged.value.written {
        println!("Wrote {}", config.output_file.display());
    }
    Ok(())
}

fn handle_rank(args: &RankArgs) -> Result<(), AppError> {
    if !args.input.is_file() {
        return Err(AppError::no_data(format!(
            "No merged results at '{}'; run `epps merge` first.",
            args.input.display()
        )));
    }
    let table = crate::io::table::read_table(&args.input)?;
    let config = rank_config_from_args(&args.rank);

    let ranked = if args.best_per_scope {
        let candidates = if config.converged_only {
            crate::results::filter_converged(&table)
        } else {
            table
        };
        crate::results::best_per_scope(&candidates, &config.score_col)
    } else {
        crate::results::rank_with(&table, &config)
    };

    print!("{}", crate::report::format_ranked(&ranked, &config.score_col));
    if let Some(path) = &args.out {
        crate::io::table::write_table_atomic(path, &ranked)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn write_grid_csv(path: &Path, specs: &[crate::domain::ModelSpec]) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::io(format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    crate::batch::write_spec_file(path, specs)
}

pub fn sample_config_from_args(args: &SampleArgs) -> SampleConfig {
    SampleConfig {
        countries: args.countries,
        year_min: args.year_min,
        year_max: args.year_max,
        seed: args.seed,
    }
}

pub fn panel_config_from_args(args: &PanelOpts) -> PanelConfig {
    PanelConfig {
        year_min: args.year_min,
        year_max: args.year_max,
        rare_threshold: args.rare_threshold,
        max_lag: usize::from(args.max_lag),
        outcome_shock_type: args.outcome_type.clone(),
        binary_categories: args.binary_categories.clone(),
    }
}

pub fn batch_config_from_args(args: &BatchOpts) -> BatchConfig {
    BatchConfig {
        out_dir: args.batch_dir.clone(),
        basename: args.basename.clone(),
        batch_size: args.batch_size,
    }
}

pub fn merge_config_from_args(args: &ResultsOpts, delete_after: bool) -> MergeConfig {
    MergeConfig {
        results_dir: args.results_dir.clone(),
        output_file: args.merged.clone(),
        pattern: args.batch_glob.clone(),
        delete_after,
    }
}

pub fn rank_config_from_args(args: &RankOpts) -> RankConfig {
    RankConfig {
        score_col: args.score_col.clone(),
        top_n: args.top,
        converged_only: args.converged_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_config_values() {
        let cli = Cli::try_parse_from([
            "epps",
            "run",
            "--config",
            "grid.json",
            "--batch-size",
            "250",
            "--top",
            "0",
            "--converged-only",
            "--merged",
            "out/merged.json",
            "--delete-after",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };

        let batch = batch_config_from_args(&args.batch);
        assert_eq!(batch.batch_size, 250);
        assert_eq!(batch.basename, "model_grid");

        let merge = merge_config_from_args(&args.results, args.delete_after);
        assert_eq!(merge.output_file, Path::new("out/merged.json"));
        assert!(merge.delete_after);

        let rank = rank_config_from_args(&args.rank);
        assert_eq!(rank.top_n, 0);
        assert!(rank.converged_only);
        assert_eq!(rank.score_col, "aicc");
    }

    #[test]
    fn panel_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["epps", "panel", "--shocks", "s.csv"]).unwrap();
        let Command::Panel(args) = cli.command else {
            panic!("expected panel");
        };
        assert_eq!(panel_config_from_args(&args.panel), PanelConfig::default());
    }
}

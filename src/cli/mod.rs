//! Command-line parsing for the panel and model-grid tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the panel/grid/merge code. Flags map onto the config structs in
//! `domain` through the `*_from_args` functions in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_BATCH_GLOB, DEFAULT_BATCH_SIZE, DEFAULT_MAX_LAG, MAX_LAG_LIMIT, PanelMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "epps",
    version,
    about = "Shock/outbreak panel builder and model-grid runner"
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a seeded synthetic shocks.csv and don.csv.
    Sample(SampleArgs),
    /// Deduplicate, window and aggregate raw shocks/DON tables.
    Prep(PrepArgs),
    /// Build the full or event-relative panel.
    Panel(PanelArgs),
    /// Generate the specification grid from a JSON config.
    Grid(GridArgs),
    /// List grid specs that have no result yet.
    Pending(PendingArgs),
    /// Write pending specs as fixed-size batch files.
    Batches(BatchesArgs),
    /// Pending -> batches -> external fitter -> merge -> rank, in one go.
    Run(RunArgs),
    /// Merge per-batch result files into one deduplicated store.
    Merge(MergeArgs),
    /// Rank merged results by AICc (or AIC).
    Rank(RankArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Directory for shocks.csv and don.csv.
    #[arg(long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Number of countries (at most 12).
    #[arg(long, default_value_t = 12)]
    pub countries: usize,

    #[arg(long, default_value_t = 1990)]
    pub year_min: i32,

    #[arg(long, default_value_t = 2019)]
    pub year_max: i32,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Settings shared by `prep` and `panel`.
#[derive(Debug, Args, Clone)]
pub struct PanelOpts {
    /// First year kept by prep (inclusive).
    #[arg(long, default_value_t = 1990)]
    pub year_min: i32,

    /// Last year kept by prep (inclusive).
    #[arg(long, default_value_t = 2019)]
    pub year_max: i32,

    /// Shock types seen in fewer rows are dropped by prep.
    #[arg(long, default_value_t = 10)]
    pub rare_threshold: usize,

    /// Lag/lead window in years; also the event window half-width.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_LAG as u16,
        value_parser = clap::value_parser!(u16).range(..=MAX_LAG_LIMIT as i64)
    )]
    pub max_lag: u16,

    /// Shock_type counted as the outbreak outcome.
    #[arg(long, default_value = "Infectious disease")]
    pub outcome_type: String,

    /// Predictor categories reduced to 0/1 presence flags (repeatable).
    #[arg(long = "binary", value_delimiter = ',', default_values_t = ["ECOLOGICAL".to_string(), "GEOPHYSICAL".to_string()])]
    pub binary_categories: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct PrepArgs {
    /// Shocks CSV.
    #[arg(long)]
    pub shocks: PathBuf,

    /// DON CSV.
    #[arg(long)]
    pub don: Option<PathBuf>,

    /// Directory for the prepared shocks.csv and don.csv.
    #[arg(long, default_value = "data/prepared")]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub panel: PanelOpts,
}

#[derive(Debug, Args, Clone)]
pub struct PanelArgs {
    /// Shocks CSV (cleaned, long form).
    #[arg(long)]
    pub shocks: PathBuf,

    /// DON CSV. Without it cases and deaths are zero.
    #[arg(long)]
    pub don: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = PanelMode::Full)]
    pub mode: PanelMode,

    /// Run prep on the inputs first.
    #[arg(long)]
    pub prep: bool,

    /// Output panel CSV.
    #[arg(long, default_value = "data/panel.csv")]
    pub out: PathBuf,

    #[command(flatten)]
    pub panel: PanelOpts,
}

/// Where the grid comes from: a JSON config (generated now) or a grid CSV
/// written earlier by `epps grid`.
#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
pub struct GridSource {
    /// Grid config JSON.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Grid CSV.
    #[arg(long)]
    pub grid: Option<PathBuf>,
}

/// Where completed results live.
#[derive(Debug, Args, Clone)]
pub struct ResultsOpts {
    /// Directory of per-batch result files.
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Merged result store (.csv or .json).
    #[arg(long, default_value = "results/merged_results.csv")]
    pub merged: PathBuf,

    /// File-name pattern of per-batch result files.
    #[arg(long, default_value = DEFAULT_BATCH_GLOB)]
    pub batch_glob: String,
}

#[derive(Debug, Args, Clone)]
pub struct BatchOpts {
    /// Directory for batch files.
    #[arg(long, default_value = "batches")]
    pub batch_dir: PathBuf,

    /// Batch file name prefix.
    #[arg(long, default_value = "model_grid")]
    pub basename: String,

    /// Specs per batch file.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Grid config JSON.
    #[arg(long)]
    pub config: PathBuf,

    /// Write the grid as CSV.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PendingArgs {
    #[command(flatten)]
    pub source: GridSource,

    #[command(flatten)]
    pub results: ResultsOpts,

    /// Write the pending specs as CSV.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct BatchesArgs {
    #[command(flatten)]
    pub source: GridSource,

    #[command(flatten)]
    pub results: ResultsOpts,

    #[command(flatten)]
    pub batch: BatchOpts,
}

/// Options for ranking.
#[derive(Debug, Args, Clone)]
pub struct RankOpts {
    /// Score column; `aicc` falls back to `aic`.
    #[arg(long, default_value = "aicc")]
    pub score_col: String,

    /// Rows to show (0 = all).
    #[arg(long, default_value_t = 50)]
    pub top: usize,

    /// Keep only converged fits.
    #[arg(long)]
    pub converged_only: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: GridSource,

    #[command(flatten)]
    pub results: ResultsOpts,

    #[command(flatten)]
    pub batch: BatchOpts,

    #[command(flatten)]
    pub rank: RankOpts,

    /// Panel CSV handed to the fitter.
    #[arg(long, default_value = "data/panel.csv")]
    pub panel: PathBuf,

    /// Fitter command line; defaults to $EPPS_FITTER.
    #[arg(long)]
    pub fitter: Option<String>,

    /// Delete batch result files once merged.
    #[arg(long)]
    pub delete_after: bool,
}

#[derive(Debug, Args, Clone)]
pub struct MergeArgs {
    #[command(flatten)]
    pub results: ResultsOpts,

    /// Delete batch result files once merged.
    #[arg(long)]
    pub delete_after: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RankArgs {
    /// Merged result store.
    #[arg(long, default_value = "results/merged_results.csv")]
    pub input: PathBuf,

    #[command(flatten)]
    pub rank: RankOpts,

    /// Show the best model per scope instead of the overall ranking.
    #[arg(long)]
    pub best_per_scope: bool,

    /// Write the ranked table (.csv or .json).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

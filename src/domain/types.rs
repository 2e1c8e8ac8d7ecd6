//! Shared domain types.
//!
//! Configuration is carried as plain immutable values built once from CLI
//! flags (or a JSON file for the grid) and passed by reference to every
//! component. Nothing in the crate reads module-level settings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default maximum lag/lead window (years).
pub const DEFAULT_MAX_LAG: usize = 5;
/// Largest accepted lag/lead window (years).
pub const MAX_LAG_LIMIT: usize = 100;
/// Default specs per batch file.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Default pattern for per-batch result files.
pub const DEFAULT_BATCH_GLOB: &str = "batch_*.csv";
/// Column carrying the specification identity in every exchanged table.
pub const SPEC_ID_COL: &str = "spec_id";

/// One aggregated shock count (long form).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShockRecord {
    pub country: String,
    pub continent: String,
    pub year: i32,
    pub shock_category: String,
    pub shock_type: String,
    pub count: u64,
}

/// One DON notification row (possibly already aggregated).
#[derive(Debug, Clone, PartialEq)]
pub struct DonRecord {
    pub country: String,
    pub year: i32,
    pub disease: String,
    pub cases_total: Option<f64>,
    pub deaths: Option<f64>,
}

/// How the panel is indexed in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PanelMode {
    /// One row per (Country, Continent, Year) present in the shocks table.
    Full,
    /// One row per outbreak event and relative year offset.
    Event,
}

/// Settings for prep and panel construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    /// Inclusive year bounds applied by prep.
    pub year_min: i32,
    pub year_max: i32,
    /// Shock types seen in fewer rows than this are dropped by prep.
    pub rare_threshold: usize,
    /// Window for `_lag_avg` / `_lead_avg` and the event-relative offset range.
    /// Event windows are capped at `MAX_LAG_LIMIT`.
    pub max_lag: usize,
    /// `Shock_type` whose counts form the `Infectious_disease` outcome.
    pub outcome_shock_type: String,
    /// Predictor categories reduced to presence flags.
    pub binary_categories: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            year_min: 1990,
            year_max: 2019,
            rare_threshold: 10,
            max_lag: DEFAULT_MAX_LAG,
            outcome_shock_type: "Infectious disease".to_string(),
            binary_categories: vec!["ECOLOGICAL".to_string(), "GEOPHYSICAL".to_string()],
        }
    }
}

/// Inputs to the specification grid.
///
/// Usually loaded from JSON; absent fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub predictors: Vec<String>,
    pub scopes: Vec<String>,
    pub dv: String,
    pub min_predictors: usize,
    pub max_predictors: usize,
    /// Extra fixed-effect options per scope. Missing scope means "none".
    pub fixed_effects: BTreeMap<String, Vec<String>>,
    /// Year-term options per scope. `None` means `scale(Year)` for every scope.
    pub year_terms: Option<BTreeMap<String, Vec<String>>>,
    /// Random-effect options per scope. `None` means no random term.
    pub random_terms: Option<BTreeMap<String, Vec<String>>>,
    pub engine: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            predictors: Vec::new(),
            scopes: vec!["Global".to_string()],
            dv: "outbreak".to_string(),
            min_predictors: 1,
            max_predictors: 6,
            fixed_effects: BTreeMap::new(),
            year_terms: None,
            random_terms: None,
            engine: "glmmTMB".to_string(),
        }
    }
}

/// Where and how batch files are written.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub out_dir: PathBuf,
    pub basename: String,
    pub batch_size: usize,
}

/// Result merge settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    pub results_dir: PathBuf,
    pub output_file: PathBuf,
    pub pattern: String,
    pub delete_after: bool,
}

/// Ranking settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RankConfig {
    /// Preferred score column; `aicc` falls back to `aic` when absent.
    pub score_col: String,
    /// Rows to keep; `0` keeps everything.
    pub top_n: usize,
    pub converged_only: bool,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            score_col: "aicc".to_string(),
            top_n: 50,
            converged_only: false,
        }
    }
}

/// A file that a directory scan could not use, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// A partial result: the usable value plus the files that were skipped.
#[derive(Debug, Clone)]
pub struct Scan<T> {
    pub value: T,
    pub skipped: Vec<SkippedFile>,
}

impl<T> Scan<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            skipped: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// A row-level problem encountered while reading an input table.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

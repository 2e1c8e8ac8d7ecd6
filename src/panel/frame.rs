//! The in-memory panel table.
//!
//! A `Panel` is an ordered map from a composite key to a row of integer
//! outcomes and optional numeric values. Construction happens in stages
//! (`panel::build`, `panel::features`); each stage consumes a panel and
//! returns a new one, so no stage can observe a half-updated table.

use std::collections::{BTreeMap, HashMap};

use crate::domain::PanelMode;

pub const COUNTRY: &str = "Country";
pub const CONTINENT: &str = "Continent";
pub const YEAR: &str = "Year";
pub const DON_YEAR: &str = "DON_year";
pub const YEAR_REL: &str = "Year_rel";

pub const INFECTIOUS_DISEASE: &str = "Infectious_disease";
pub const CASES_TOTAL: &str = "CasesTotal";
pub const DEATHS: &str = "Deaths";

pub const LAG_SUFFIX: &str = "_lag_avg";
pub const LEAD_SUFFIX: &str = "_lead_avg";

const FULL_KEYS: [&str; 3] = [COUNTRY, CONTINENT, YEAR];
const EVENT_KEYS: [&str; 5] = [COUNTRY, CONTINENT, DON_YEAR, YEAR_REL, YEAR];
pub const OUTCOME_COLUMNS: [&str; 3] = [INFECTIOUS_DISEASE, CASES_TOTAL, DEATHS];

/// Row key. Full panels leave `don_year` empty; event panels set it and
/// derive `Year_rel = year - don_year`.
///
/// Field order drives the map order: rows of one country (and one event)
/// are contiguous and sorted by year.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanelKey {
    pub country: String,
    pub continent: String,
    pub don_year: Option<i32>,
    pub year: i32,
}

impl PanelKey {
    pub fn full(country: impl Into<String>, continent: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            continent: continent.into(),
            don_year: None,
            year,
        }
    }

    pub fn event(country: impl Into<String>, continent: impl Into<String>, don_year: i32, year_rel: i32) -> Self {
        Self {
            country: country.into(),
            continent: continent.into(),
            don_year: Some(don_year),
            year: don_year + year_rel,
        }
    }

    pub fn year_rel(&self) -> Option<i32> {
        self.don_year.map(|d| self.year - d)
    }

    /// The time series this row belongs to for lag/lead purposes: one per
    /// country in full panels, one per outbreak event in event panels.
    pub fn series(&self) -> (&str, Option<i32>) {
        (&self.country, self.don_year)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcomes {
    pub infectious_disease: i64,
    pub cases_total: i64,
    pub deaths: i64,
}

impl Outcomes {
    pub fn as_array(&self) -> [i64; 3] {
        [self.infectious_disease, self.cases_total, self.deaths]
    }
}

/// One panel row; `values` is aligned with `Panel::value_columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub outcomes: Outcomes,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    mode: PanelMode,
    predictors: Vec<String>,
    features: Vec<String>,
    rows: BTreeMap<PanelKey, PanelRow>,
}

impl Panel {
    /// A panel with base predictors only. Row value vectors must have one
    /// entry per predictor.
    pub fn new(mode: PanelMode, predictors: Vec<String>, rows: BTreeMap<PanelKey, PanelRow>) -> Self {
        debug_assert!(rows.values().all(|r| r.values.len() == predictors.len()));
        Self {
            mode,
            predictors,
            features: Vec::new(),
            rows,
        }
    }

    pub fn mode(&self) -> PanelMode {
        self.mode
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    /// Generated columns (lag/lead averages), in generation order.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn rows(&self) -> &BTreeMap<PanelKey, PanelRow> {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn key_columns(&self) -> &'static [&'static str] {
        match self.mode {
            PanelMode::Full => &FULL_KEYS,
            PanelMode::Event => &EVENT_KEYS,
        }
    }

    /// Predictors followed by generated columns.
    pub fn value_columns(&self) -> impl Iterator<Item = &str> {
        self.predictors
            .iter()
            .chain(self.features.iter())
            .map(String::as_str)
    }

    /// All output columns: keys, outcomes, predictors, generated columns.
    pub fn columns(&self) -> Vec<String> {
        let mut out: Vec<String> = self.key_columns().iter().map(|c| c.to_string()).collect();
        out.extend(OUTCOME_COLUMNS.iter().map(|c| c.to_string()));
        out.extend(self.value_columns().map(str::to_string));
        out
    }

    fn value_index(&self, name: &str) -> Option<usize> {
        self.value_columns().position(|c| c == name)
    }

    /// Values of one predictor or generated column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.value_index(name)?;
        Some(self.rows.values().map(|r| r.values[idx]).collect())
    }

    /// A single cell of a predictor or generated column.
    pub fn value(&self, key: &PanelKey, name: &str) -> Option<f64> {
        let idx = self.value_index(name)?;
        self.rows.get(key).and_then(|r| r.values[idx])
    }

    /// Row keys grouped by `PanelKey::series`, each group sorted by year.
    pub fn series(&self) -> Vec<Vec<&PanelKey>> {
        let mut groups: BTreeMap<(&str, Option<i32>), Vec<&PanelKey>> = BTreeMap::new();
        for key in self.rows.keys() {
            groups.entry(key.series()).or_default().push(key);
        }
        groups
            .into_values()
            .map(|mut keys| {
                keys.sort_by_key(|k| k.year);
                keys
            })
            .collect()
    }

    /// Append generated columns. `values` maps each row key to one value per
    /// new column; rows without an entry get missing values.
    pub fn with_features(mut self, names: Vec<String>, mut values: HashMap<PanelKey, Vec<Option<f64>>>) -> Self {
        let width = names.len();
        for (key, row) in self.rows.iter_mut() {
            let mut extra = values.remove(key).unwrap_or_default();
            extra.resize(width, None);
            row.values.extend(extra);
        }
        self.features.extend(names);
        self
    }

    /// Replace every value column through `f(column_index, value)`.
    pub fn map_values(mut self, f: impl Fn(usize, Option<f64>) -> Option<f64>) -> Self {
        for row in self.rows.values_mut() {
            for (idx, v) in row.values.iter_mut().enumerate() {
                *v = f(idx, *v);
            }
        }
        self
    }

    /// Rows rendered as text cells in `columns()` order. Missing values are
    /// empty cells.
    pub fn to_records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|(key, row)| {
                let mut out = Vec::with_capacity(self.key_columns().len() + 3 + row.values.len());
                out.push(key.country.clone());
                out.push(key.continent.clone());
                if let (Some(don_year), Some(year_rel)) = (key.don_year, key.year_rel()) {
                    out.push(don_year.to_string());
                    out.push(year_rel.to_string());
                }
                out.push(key.year.to_string());
                out.extend(row.outcomes.as_array().iter().map(i64::to_string));
                out.extend(row.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
                out
            })
            .collect()
    }
}

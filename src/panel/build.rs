//! Panel construction from the cleaned shocks and DON tables.
//!
//! Both modes share the same stages:
//!
//! 1. split shocks into the outcome count and the wide predictor table
//! 2. aggregate DON totals per (Country, Year)
//! 3. lay out the row index (full grid or event windows) and join 1) and 2)
//! 4. add lag/lead averages, then center (`panel::features`)

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{DonRecord, MAX_LAG_LIMIT, PanelConfig, PanelMode, ShockRecord};
use crate::panel::features::{add_lag_lead_averages, center_predictors};
use crate::panel::frame::{Outcomes, Panel, PanelKey, PanelRow};

/// (Country, Continent, Year)
type SiteYear = (String, String, i32);

/// Predictor categories in column order plus their per-site-year values.
#[derive(Debug, Clone, Default)]
struct Pivot {
    categories: Vec<String>,
    cells: BTreeMap<SiteYear, Vec<f64>>,
}

impl Pivot {
    fn row(&self, key: &SiteYear) -> Vec<Option<f64>> {
        match self.cells.get(key) {
            Some(values) => values.iter().copied().map(Some).collect(),
            None => vec![Some(0.0); self.categories.len()],
        }
    }
}

/// Build a panel in the requested mode.
pub fn build_panel(mode: PanelMode, shocks: &[ShockRecord], don: &[DonRecord], config: &PanelConfig) -> Panel {
    match mode {
        PanelMode::Full => build_full_panel(shocks, don, config),
        PanelMode::Event => build_event_panel(shocks, don, config),
    }
}

/// One row per (Country, Continent, Year) present in `shocks`.
pub fn build_full_panel(shocks: &[ShockRecord], don: &[DonRecord], config: &PanelConfig) -> Panel {
    let outcome = outcome_counts(shocks, config);
    let pivot = pivot_predictors(shocks, config);
    let don_totals = don_totals(don);

    let index: BTreeSet<SiteYear> = shocks
        .iter()
        .map(|r| (r.country.clone(), r.continent.clone(), r.year))
        .collect();

    let rows = index
        .into_iter()
        .map(|site_year| {
            let (cases_total, deaths) = don_totals
                .get(&(site_year.0.clone(), site_year.2))
                .copied()
                .unwrap_or_default();
            let row = PanelRow {
                outcomes: Outcomes {
                    infectious_disease: outcome.get(&site_year).copied().unwrap_or(0) as i64,
                    cases_total,
                    deaths,
                },
                values: pivot.row(&site_year),
            };
            (PanelKey::full(site_year.0, site_year.1, site_year.2), row)
        })
        .collect();

    let panel = Panel::new(PanelMode::Full, pivot.categories, rows);
    tracing::debug!(rows = panel.len(), predictors = panel.predictors().len(), "built full panel base");
    finish(panel, config)
}

/// One row per outbreak event and offset in `[-max_lag, max_lag]`, with
/// `max_lag` capped at `MAX_LAG_LIMIT`.
///
/// Events are the site-years with a positive outcome count. Predictors are
/// joined on the calendar year of each row; `Infectious_disease` and the DON
/// totals are those of the event year. Without events the panel is empty but
/// still carries its key and outcome columns.
pub fn build_event_panel(shocks: &[ShockRecord], don: &[DonRecord], config: &PanelConfig) -> Panel {
    let outcome = outcome_counts(shocks, config);
    let events: Vec<(&SiteYear, u64)> = outcome
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(k, n)| (k, *n))
        .collect();

    if events.is_empty() {
        tracing::info!("no outbreak events; event panel is empty");
        return Panel::new(PanelMode::Event, Vec::new(), BTreeMap::new());
    }

    let pivot = pivot_predictors(shocks, config);
    let don_totals = don_totals(don);
    if config.max_lag > MAX_LAG_LIMIT {
        tracing::warn!(max_lag = config.max_lag, limit = MAX_LAG_LIMIT, "capping event window");
    }
    let max_lag = i32::try_from(config.max_lag.min(MAX_LAG_LIMIT)).unwrap_or(0);

    let mut rows = BTreeMap::new();
    for ((country, continent, don_year), count) in events {
        let (cases_total, deaths) = don_totals
            .get(&(country.clone(), *don_year))
            .copied()
            .unwrap_or_default();
        let outcomes = Outcomes {
            infectious_disease: count as i64,
            cases_total,
            deaths,
        };
        for year_rel in -max_lag..=max_lag {
            let key = PanelKey::event(country.clone(), continent.clone(), *don_year, year_rel);
            let values = pivot.row(&(country.clone(), continent.clone(), key.year));
            rows.insert(key, PanelRow { outcomes, values });
        }
    }

    let panel = Panel::new(PanelMode::Event, pivot.categories, rows);
    tracing::debug!(rows = panel.len(), predictors = panel.predictors().len(), "built event panel base");
    finish(panel, config)
}

fn finish(panel: Panel, config: &PanelConfig) -> Panel {
    center_predictors(add_lag_lead_averages(panel, config.max_lag))
}

fn is_outcome(record: &ShockRecord, config: &PanelConfig) -> bool {
    record.shock_type == config.outcome_shock_type
}

/// Sum of outcome-type counts per site-year.
fn outcome_counts(shocks: &[ShockRecord], config: &PanelConfig) -> BTreeMap<SiteYear, u64> {
    let mut out: BTreeMap<SiteYear, u64> = BTreeMap::new();
    for r in shocks.iter().filter(|r| is_outcome(r, config)) {
        *out.entry((r.country.clone(), r.continent.clone(), r.year)).or_default() += r.count;
    }
    out
}

/// Wide table of non-outcome counts: one column per category (sorted), summed
/// per site-year, zero where a category was not observed. Categories listed
/// in `binary_categories` are reduced to 0/1 presence flags.
fn pivot_predictors(shocks: &[ShockRecord], config: &PanelConfig) -> Pivot {
    let predictors: Vec<&ShockRecord> = shocks.iter().filter(|r| !is_outcome(r, config)).collect();

    let categories: Vec<String> = predictors
        .iter()
        .map(|r| r.shock_category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let position: BTreeMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut cells: BTreeMap<SiteYear, Vec<f64>> = BTreeMap::new();
    for r in predictors {
        let row = cells
            .entry((r.country.clone(), r.continent.clone(), r.year))
            .or_insert_with(|| vec![0.0; categories.len()]);
        row[position[r.shock_category.as_str()]] += r.count as f64;
    }

    let flagged: Vec<usize> = config
        .binary_categories
        .iter()
        .filter_map(|c| position.get(c.as_str()).copied())
        .collect();
    for row in cells.values_mut() {
        for &i in &flagged {
            row[i] = if row[i] > 0.0 { 1.0 } else { 0.0 };
        }
    }

    Pivot { categories, cells }
}

/// DON cases and deaths per (Country, Year), truncated toward zero to whole
/// counts.
fn don_totals(don: &[DonRecord]) -> BTreeMap<(String, i32), (i64, i64)> {
    let mut sums: BTreeMap<(String, i32), (f64, f64)> = BTreeMap::new();
    for r in don {
        let entry = sums.entry((r.country.clone(), r.year)).or_default();
        entry.0 += r.cases_total.unwrap_or(0.0);
        entry.1 += r.deaths.unwrap_or(0.0);
    }
    sums.into_iter()
        .map(|(k, (cases, deaths))| (k, (cases.trunc() as i64, deaths.trunc() as i64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::panel::frame::INFECTIOUS_DISEASE;

    fn shock(country: &str, year: i32, category: &str, shock_type: &str, count: u64) -> ShockRecord {
        let continent = if country == "Peru" { "America" } else { "Africa" };
        ShockRecord {
            country: country.to_string(),
            continent: continent.to_string(),
            year,
            shock_category: category.to_string(),
            shock_type: shock_type.to_string(),
            count,
        }
    }

    fn don(country: &str, year: i32, cases: f64, deaths: Option<f64>) -> DonRecord {
        DonRecord {
            country: country.to_string(),
            year,
            disease: "Cholera".to_string(),
            cases_total: Some(cases),
            deaths,
        }
    }

    fn sample_shocks() -> Vec<ShockRecord> {
        vec![
            shock("Kenya", 2000, "CLIMATIC", "Drought", 2),
            shock("Kenya", 2000, "CLIMATIC", "Flood", 1),
            shock("Kenya", 2001, "BIOLOGICAL", "Infectious disease", 3),
            shock("Kenya", 2001, "GEOPHYSICAL", "Earthquake", 4),
            shock("Kenya", 2002, "CONFLICTS", "Coup", 1),
            shock("Peru", 2000, "CLIMATIC", "Flood", 5),
            shock("Peru", 2001, "BIOLOGICAL", "Infectious disease", 0),
        ]
    }

    fn config(max_lag: usize) -> PanelConfig {
        PanelConfig {
            max_lag,
            ..PanelConfig::default()
        }
    }

    #[test]
    fn full_panel_has_one_row_per_country_year() {
        let shocks = sample_shocks();
        let panel = build_full_panel(&shocks, &[], &config(0));

        let expected: HashSet<(String, i32)> = shocks.iter().map(|r| (r.country.clone(), r.year)).collect();
        let keys: Vec<(String, i32)> = panel.rows().keys().map(|k| (k.country.clone(), k.year)).collect();
        assert_eq!(keys.len(), expected.len());
        assert_eq!(keys.into_iter().collect::<HashSet<_>>(), expected);
    }

    #[test]
    fn full_panel_pivots_flags_and_joins() {
        let shocks = sample_shocks();
        let don = vec![
            don("Kenya", 2001, 100.4, Some(3.0)),
            don("Kenya", 2001, 20.0, None),
            don("Chad", 2001, 5.0, Some(1.0)),
        ];
        let panel = build_full_panel(&shocks, &don, &config(0));

        assert_eq!(panel.predictors(), ["CLIMATIC", "CONFLICTS", "GEOPHYSICAL"]);
        assert_eq!(
            &panel.columns()[..6],
            ["Country", "Continent", "Year", "Infectious_disease", "CasesTotal", "Deaths"]
        );

        let k2001 = PanelKey::full("Kenya", "Africa", 2001);
        let row = &panel.rows()[&k2001];
        assert_eq!(row.outcomes, Outcomes { infectious_disease: 3, cases_total: 120, deaths: 3 });
        // Earthquake count 4 becomes a presence flag.
        assert_eq!(panel.value(&k2001, "GEOPHYSICAL"), Some(1.0));

        let peru = &panel.rows()[&PanelKey::full("Peru", "America", 2001)];
        assert_eq!(peru.outcomes, Outcomes::default());
    }

    #[test]
    fn don_totals_truncate_fractions() {
        let don = vec![don("Peru", 2000, 2.5, Some(0.4)), don("Peru", 2000, 0.4, Some(0.5))];
        let panel = build_full_panel(&sample_shocks(), &don, &config(0));
        let row = &panel.rows()[&PanelKey::full("Peru", "America", 2000)];
        assert_eq!((row.outcomes.cases_total, row.outcomes.deaths), (2, 0));
    }

    #[test]
    fn full_panel_centers_count_predictors_only() {
        let panel = build_full_panel(&sample_shocks(), &[], &config(0));
        // CLIMATIC raw values over 5 rows: Kenya 2000=3, 2001=0, 2002=0, Peru 2000=5, 2001=0.
        let climatic: Vec<f64> = panel.column("CLIMATIC").unwrap().into_iter().flatten().collect();
        assert!((climatic.iter().sum::<f64>()).abs() < 1e-9);
        assert!((climatic[0] - (3.0 - 1.6)).abs() < 1e-9);
        // CONFLICTS is 0/1 and stays untouched.
        let conflicts: Vec<f64> = panel.column("CONFLICTS").unwrap().into_iter().flatten().collect();
        assert!(conflicts.iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn full_panel_orders_lag_lead_columns_after_predictors() {
        let panel = build_full_panel(&sample_shocks(), &[], &config(2));
        let cols = panel.columns();
        assert_eq!(
            &cols[6..],
            [
                "CLIMATIC",
                "CONFLICTS",
                "GEOPHYSICAL",
                "CLIMATIC_lag_avg",
                "CLIMATIC_lead_avg",
                "CONFLICTS_lag_avg",
                "CONFLICTS_lead_avg",
                "GEOPHYSICAL_lag_avg",
                "GEOPHYSICAL_lead_avg"
            ]
        );
        assert!(!cols.iter().any(|c| c.starts_with("Infectious_disease_")));
    }

    #[test]
    fn event_panel_covers_every_offset_for_every_event() {
        let mut shocks = sample_shocks();
        shocks.push(shock("Peru", 2003, "BIOLOGICAL", "Infectious disease", 2));
        let don = vec![don("Kenya", 2001, 50.0, Some(2.0))];
        let panel = build_event_panel(&shocks, &don, &config(2));

        // Events: Kenya 2001 (3 cases), Peru 2003 (2). Peru 2001 has count 0.
        assert_eq!(panel.len(), 2 * 5);
        for (country, don_year) in [("Kenya", 2001), ("Peru", 2003)] {
            let rels: Vec<i32> = panel
                .rows()
                .keys()
                .filter(|k| k.country == country && k.don_year == Some(don_year))
                .filter_map(PanelKey::year_rel)
                .collect();
            assert_eq!(rels, [-2, -1, 0, 1, 2]);
        }

        let key = PanelKey::event("Kenya", "Africa", 2001, -1);
        let row = &panel.rows()[&key];
        assert_eq!(row.outcomes, Outcomes { infectious_disease: 3, cases_total: 50, deaths: 2 });
        assert_eq!(key.year, 2000);
        assert_eq!(
            &panel.columns()[..8],
            ["Country", "Continent", "DON_year", "Year_rel", "Year", INFECTIOUS_DISEASE, "CasesTotal", "Deaths"]
        );
    }

    #[test]
    fn event_panel_lags_follow_each_event_series() {
        // Two Kenya events with overlapping windows (2000..=2002, 2001..=2003).
        let shocks = vec![
            shock("Kenya", 2000, "CLIMATIC", "Drought", 2),
            shock("Kenya", 2001, "CLIMATIC", "Drought", 4),
            shock("Kenya", 2003, "CLIMATIC", "Drought", 8),
            shock("Kenya", 2001, "BIOLOGICAL", "Infectious disease", 1),
            shock("Kenya", 2002, "BIOLOGICAL", "Infectious disease", 1),
        ];
        let panel = build_event_panel(&shocks, &[], &config(1));
        assert_eq!(panel.len(), 6);
        let key = |don_year, rel| PanelKey::event("Kenya", "Africa", don_year, rel);

        // Raw CLIMATIC by calendar year: 2000=2, 2001=4, 2002=0, 2003=8; mean 3.
        assert_eq!(key(2002, 1).year, 2003);
        assert_eq!(panel.value(&key(2002, 1), "CLIMATIC"), Some(5.0));
        assert_eq!(panel.value(&key(2001, -1), "CLIMATIC"), Some(-1.0));

        // Raw lags: event 2001 [-, 2, 4], event 2002 [-, 4, 0]; mean 2.5.
        assert_eq!(panel.value(&key(2001, -1), "CLIMATIC_lag_avg"), None);
        assert_eq!(panel.value(&key(2001, 0), "CLIMATIC_lag_avg"), Some(-0.5));
        assert_eq!(panel.value(&key(2002, -1), "CLIMATIC_lag_avg"), None);
        assert_eq!(panel.value(&key(2002, 1), "CLIMATIC_lag_avg"), Some(-2.5));

        // Raw leads: event 2001 [4, 0, -], event 2002 [0, 8, -]; mean 3.
        // Calendar 2002 is the last row of the 2001 event, so it sees no lead.
        assert_eq!(panel.value(&key(2001, 1), "CLIMATIC_lead_avg"), None);
        assert_eq!(panel.value(&key(2002, 0), "CLIMATIC_lead_avg"), Some(5.0));
        assert_eq!(panel.value(&key(2001, -1), "CLIMATIC_lead_avg"), Some(1.0));
        assert_eq!(panel.value(&key(2002, -1), "CLIMATIC_lead_avg"), Some(-3.0));
    }

    #[test]
    fn event_window_is_capped() {
        let shocks = vec![shock("Kenya", 2001, "BIOLOGICAL", "Infectious disease", 1)];
        let panel = build_event_panel(&shocks, &[], &config(usize::MAX));
        assert_eq!(panel.len(), 2 * MAX_LAG_LIMIT + 1);
        let rels: Vec<i32> = panel.rows().keys().filter_map(PanelKey::year_rel).collect();
        assert_eq!(rels.first(), Some(&-100));
        assert_eq!(rels.last(), Some(&100));
    }

    #[test]
    fn event_panel_without_events_is_empty_but_shaped() {
        let shocks = vec![shock("Kenya", 2000, "CLIMATIC", "Drought", 2)];
        let panel = build_event_panel(&shocks, &[], &config(5));
        assert!(panel.is_empty());
        assert_eq!(
            panel.columns(),
            ["Country", "Continent", "DON_year", "Year_rel", "Year", "Infectious_disease", "CasesTotal", "Deaths"]
        );
    }
}

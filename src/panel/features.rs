//! Lag/lead averaging and mean-centering stages.

use std::collections::{HashMap, HashSet};

use crate::panel::frame::{LAG_SUFFIX, LEAD_SUFFIX, Panel, PanelKey};

/// Add `<predictor>_lag_avg` and `<predictor>_lead_avg` for every base
/// predictor.
///
/// Within each series (see `PanelKey::series`) ordered by year, the lag
/// average is the mean of up to `max_lag` preceding values and the lead
/// average the mean of up to `max_lag` following values, skipping missing
/// ones. With nothing to average the result is missing. Series never see
/// each other's rows.
pub fn add_lag_lead_averages(panel: Panel, max_lag: usize) -> Panel {
    let n_pred = panel.predictors().len();
    if max_lag == 0 || n_pred == 0 {
        return panel;
    }

    let mut names = Vec::with_capacity(2 * n_pred);
    for p in panel.predictors() {
        names.push(format!("{p}{LAG_SUFFIX}"));
        names.push(format!("{p}{LEAD_SUFFIX}"));
    }

    let mut additions: HashMap<PanelKey, Vec<Option<f64>>> = HashMap::with_capacity(panel.len());
    for keys in panel.series() {
        let rows: Vec<&[Option<f64>]> = keys.iter().map(|k| panel.rows()[*k].values.as_slice()).collect();
        let mut per_row: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(2 * n_pred); keys.len()];

        for p in 0..n_pred {
            let series: Vec<Option<f64>> = rows.iter().map(|r| r[p]).collect();
            let (lags, leads) = window_means(&series, max_lag);
            for (i, out) in per_row.iter_mut().enumerate() {
                out.push(lags[i]);
                out.push(leads[i]);
            }
        }

        for (key, values) in keys.into_iter().zip(per_row) {
            additions.insert(key.clone(), values);
        }
    }

    panel.with_features(names, additions)
}

/// Mean of the `window` values before and after each position.
fn window_means(values: &[Option<f64>], window: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = values.len();
    let lags = (0..n)
        .map(|i| mean(&values[i.saturating_sub(window)..i]))
        .collect();
    let leads = (0..n)
        .map(|i| mean(&values[(i + 1).min(n)..(i + 1).saturating_add(window).min(n)]))
        .collect();
    (lags, leads)
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Subtract the panel-wide mean from every predictor or generated column
/// with more than two distinct non-missing values. Binary indicators and
/// columns with no values are left as they are; missing cells stay missing.
pub fn center_predictors(panel: Panel) -> Panel {
    let n_cols = panel.value_columns().count();
    let mut offsets: Vec<Option<f64>> = vec![None; n_cols];

    for (idx, offset) in offsets.iter_mut().enumerate() {
        let present: Vec<f64> = panel.rows().values().filter_map(|r| r.values[idx]).collect();
        if distinct_count(&present) > 2 {
            *offset = Some(present.iter().sum::<f64>() / present.len() as f64);
        }
    }

    panel.map_values(|idx, v| match offsets[idx] {
        Some(m) => v.map(|x| x - m),
        None => v,
    })
}

fn distinct_count(values: &[f64]) -> usize {
    values
        .iter()
        .map(|v| if *v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() })
        .collect::<HashSet<u64>>()
        .len()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::PanelMode;
    use crate::panel::frame::{Outcomes, PanelRow};

    fn panel_of(series: &[(&str, i32, f64)]) -> Panel {
        let rows: BTreeMap<PanelKey, PanelRow> = series
            .iter()
            .map(|(c, y, v)| {
                (
                    PanelKey::full(*c, "X", *y),
                    PanelRow {
                        outcomes: Outcomes::default(),
                        values: vec![Some(*v)],
                    },
                )
            })
            .collect();
        Panel::new(PanelMode::Full, vec!["P".to_string()], rows)
    }

    #[test]
    fn lag_lead_example_with_window_one() {
        let panel = panel_of(&[("A", 1, 10.0), ("A", 2, 20.0), ("A", 3, 30.0), ("A", 4, 40.0)]);
        let panel = add_lag_lead_averages(panel, 1);

        assert_eq!(panel.features(), ["P_lag_avg", "P_lead_avg"]);
        assert_eq!(panel.value(&PanelKey::full("A", "X", 3), "P_lag_avg"), Some(20.0));
        assert_eq!(panel.value(&PanelKey::full("A", "X", 2), "P_lead_avg"), Some(30.0));
        assert_eq!(panel.value(&PanelKey::full("A", "X", 1), "P_lag_avg"), None);
        assert_eq!(panel.value(&PanelKey::full("A", "X", 4), "P_lead_avg"), None);
    }

    #[test]
    fn short_histories_average_what_is_available() {
        let panel = panel_of(&[("A", 1, 10.0), ("A", 2, 20.0), ("A", 3, 60.0)]);
        let panel = add_lag_lead_averages(panel, 5);
        assert_eq!(panel.value(&PanelKey::full("A", "X", 3), "P_lag_avg"), Some(15.0));
        assert_eq!(panel.value(&PanelKey::full("A", "X", 1), "P_lead_avg"), Some(40.0));
    }

    #[test]
    fn no_leakage_across_countries() {
        let panel = panel_of(&[("A", 1, 10.0), ("A", 2, 20.0), ("B", 1, 1000.0), ("B", 2, 2000.0)]);
        let panel = add_lag_lead_averages(panel, 3);
        assert_eq!(panel.value(&PanelKey::full("B", "X", 1), "P_lag_avg"), None);
        assert_eq!(panel.value(&PanelKey::full("A", "X", 2), "P_lead_avg"), None);
        assert_eq!(panel.value(&PanelKey::full("B", "X", 2), "P_lag_avg"), Some(1000.0));
    }

    #[test]
    fn oversized_window_averages_whole_history() {
        let panel = panel_of(&[("A", 1, 10.0), ("A", 2, 20.0), ("A", 3, 60.0)]);
        let panel = add_lag_lead_averages(panel, usize::MAX);
        assert_eq!(panel.value(&PanelKey::full("A", "X", 1), "P_lead_avg"), Some(40.0));
        assert_eq!(panel.value(&PanelKey::full("A", "X", 3), "P_lag_avg"), Some(15.0));
    }

    #[test]
    fn zero_lag_adds_nothing() {
        let panel = panel_of(&[("A", 1, 10.0)]);
        let out = add_lag_lead_averages(panel.clone(), 0);
        assert_eq!(out, panel);
    }

    #[test]
    fn centering_skips_binary_columns_and_is_idempotent() {
        let binary = panel_of(&[("A", 1, 0.0), ("A", 2, 1.0), ("A", 3, 1.0)]);
        assert_eq!(center_predictors(binary.clone()), binary);

        let panel = panel_of(&[("A", 1, 1.0), ("A", 2, 2.0), ("A", 3, 6.0)]);
        let once = center_predictors(panel);
        let col: Vec<f64> = once.column("P").unwrap().into_iter().flatten().collect();
        assert_eq!(col, [-2.0, -1.0, 3.0]);

        let twice = center_predictors(once.clone());
        for (a, b) in once.column("P").unwrap().iter().zip(twice.column("P").unwrap()) {
            assert!((a.unwrap() - b.unwrap()).abs() < 1e-12);
        }
        let mean: f64 = twice.column("P").unwrap().iter().flatten().sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
    }

    #[test]
    fn centering_ignores_missing_cells() {
        let panel = panel_of(&[("A", 1, 10.0), ("A", 2, 20.0), ("A", 3, 30.0), ("A", 4, 40.0)]);
        let panel = center_predictors(add_lag_lead_averages(panel, 1));
        // Lag averages: [-, 10, 20, 30] -> mean 20.
        let lags = panel.column("P_lag_avg").unwrap();
        assert_eq!(lags, [None, Some(-10.0), Some(0.0), Some(10.0)]);
    }
}

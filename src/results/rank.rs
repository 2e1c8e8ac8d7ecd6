//! Ranking and filtering of merged results.
//!
//! Scores are lower-is-better model-selection criteria (AICc, AIC). All
//! operations here are pure: they take a table and return a new one.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::RankConfig;
use crate::io::table::ResultTable;

pub const AICC_COL: &str = "aicc";
pub const AIC_COL: &str = "aic";
pub const CONVERGED_COL: &str = "converged";
pub const SCOPE_COL: &str = "scope";

/// The column to rank by: `preferred` if present, else `aic` when `aicc`
/// was asked for, else `None`.
pub fn resolve_score_column<'a>(table: &ResultTable, preferred: &'a str) -> Option<&'a str> {
    if table.has_column(preferred) {
        return Some(preferred);
    }
    if preferred == AICC_COL && table.has_column(AIC_COL) {
        tracing::debug!("'{AICC_COL}' column missing; ranking by '{AIC_COL}'");
        return Some(AIC_COL);
    }
    None
}

/// Stable ascending sort by score, unparseable scores last, then the first
/// `top_n` rows (`0` keeps all). Without a usable score column, or with no
/// rows, the table is returned unchanged.
pub fn rank_models(table: &ResultTable, score_col: &str, top_n: usize) -> ResultTable {
    if table.is_empty() {
        return table.clone();
    }
    let Some(col) = resolve_score_column(table, score_col) else {
        tracing::warn!(score_col, "score column not found; leaving results unranked");
        return table.clone();
    };

    let scores: Vec<Option<f64>> = (0..table.len()).map(|i| parse_score(table.get(i, col))).collect();
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| compare_scores(scores[a], scores[b]));
    if top_n > 0 {
        order.truncate(top_n);
    }
    table.select_rows(&order)
}

/// Rows whose `converged` cell is truthy. No such column: unchanged.
pub fn filter_converged(table: &ResultTable) -> ResultTable {
    if !table.has_column(CONVERGED_COL) {
        return table.clone();
    }
    let keep: Vec<usize> = (0..table.len())
        .filter(|&i| table.get(i, CONVERGED_COL).is_some_and(is_truthy))
        .collect();
    table.select_rows(&keep)
}

/// The lowest-scoring row for each scope, ordered by scope name.
///
/// Ties keep the earlier row. Rows without a parseable score are ignored.
/// Without a scope or score column the result is an empty table with the
/// same columns.
pub fn best_per_scope(table: &ResultTable, score_col: &str) -> ResultTable {
    let Some(col) = resolve_score_column(table, score_col).filter(|_| table.has_column(SCOPE_COL)) else {
        return ResultTable::new(table.columns().to_vec());
    };

    let mut best: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for i in 0..table.len() {
        let Some(score) = parse_score(table.get(i, col)) else {
            continue;
        };
        let scope = table.get(i, SCOPE_COL).unwrap_or_default();
        if best.get(scope).is_none_or(|(_, current)| score < *current) {
            best.insert(scope, (i, score));
        }
    }
    let rows: Vec<usize> = best.values().map(|(i, _)| *i).collect();
    table.select_rows(&rows)
}

/// Apply `RankConfig`: optional convergence filter, then `rank_models`.
pub fn rank_with(table: &ResultTable, config: &RankConfig) -> ResultTable {
    let filtered = if config.converged_only {
        filter_converged(table)
    } else {
        table.clone()
    };
    rank_models(&filtered, &config.score_col, config.top_n)
}

fn parse_score(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|c| c.trim().parse::<f64>().ok()).filter(|v| !v.is_nan())
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn is_truthy(cell: &str) -> bool {
    matches!(cell.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> ResultTable {
        ResultTable::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn ranks_ascending() {
        let t = table(&["spec_id", "aicc"], &[&["a", "5.2"], &["b", "1.1"], &["c", "3.3"]]);
        let ranked = rank_models(&t, "aicc", 50);
        assert_eq!(ranked.column_values("aicc"), ["1.1", "3.3", "5.2"]);
    }

    #[test]
    fn falls_back_to_aic_and_truncates() {
        let t = table(&["spec_id", "aic"], &[&["a", "9"], &["b", "NA"], &["c", "2"], &["d", "4"]]);
        let ranked = rank_models(&t, "aicc", 2);
        assert_eq!(ranked.column_values("spec_id"), ["c", "d"]);

        let all = rank_models(&t, "aicc", 0);
        assert_eq!(all.column_values("spec_id"), ["c", "d", "a", "b"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let t = table(&["spec_id", "aicc"], &[&["a", "1"], &["b", "1"], &["c", "0.5"]]);
        assert_eq!(rank_models(&t, "aicc", 0).column_values("spec_id"), ["c", "a", "b"]);
    }

    #[test]
    fn empty_or_unscored_tables_pass_through() {
        let empty = ResultTable::new(vec!["spec_id".to_string(), "aicc".to_string()]);
        assert_eq!(rank_models(&empty, "aicc", 50), empty);

        let t = table(&["spec_id", "bic"], &[&["a", "5"], &["b", "1"]]);
        assert_eq!(rank_models(&t, "aicc", 50), t);
    }

    #[test]
    fn converged_filter() {
        let t = table(
            &["spec_id", "converged"],
            &[&["a", "TRUE"], &["b", "false"], &["c", "1"], &["d", ""], &["e", "yes"]],
        );
        assert_eq!(filter_converged(&t).column_values("spec_id"), ["a", "c", "e"]);

        let no_flag = table(&["spec_id"], &[&["a"]]);
        assert_eq!(filter_converged(&no_flag), no_flag);
    }

    #[test]
    fn best_row_per_scope() {
        let t = table(
            &["spec_id", "scope", "aicc"],
            &[
                &["a", "Global", "5"],
                &["b", "Africa", "7"],
                &["c", "Global", "2"],
                &["d", "Africa", "x"],
                &["e", "Global", "2"],
            ],
        );
        let best = best_per_scope(&t, "aicc");
        assert_eq!(best.column_values("spec_id"), ["b", "c"]);
    }

    #[test]
    fn rank_with_config() {
        let t = table(
            &["spec_id", "aicc", "converged"],
            &[&["a", "1", "false"], &["b", "3", "true"], &["c", "2", "true"]],
        );
        let cfg = RankConfig {
            converged_only: true,
            ..RankConfig::default()
        };
        assert_eq!(rank_with(&t, &cfg).column_values("spec_id"), ["c", "b"]);
    }
}

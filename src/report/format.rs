//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the panel, grid and merge code stays free of presentation
//! - output changes are localized

use crate::batch::BatchManifest;
use crate::domain::{PanelMode, RowError, SPEC_ID_COL, SkippedFile};
use crate::grid::SpecGrid;
use crate::io::table::ResultTable;
use crate::panel::Panel;
use crate::prep::PreparedShocks;
use crate::results::{CONVERGED_COL, MergeOutcome, SCOPE_COL, resolve_score_column};

const MAX_LISTED_ERRORS: usize = 10;

/// Summary of a prep run.
pub fn format_prep_summary(prepared: &PreparedShocks, shock_rows_in: usize, don_rows_out: usize) -> String {
    let mut out = String::new();
    out.push_str("=== epps prep ===\n");
    out.push_str(&format!("Shock rows in : {shock_rows_in}\n"));
    out.push_str(&format!(
        "Dropped       : {} duplicate | {} out of range | {} rare type\n",
        prepared.duplicates_dropped,
        prepared.out_of_range_dropped,
        prepared.rare_types_dropped.len()
    ));
    out.push_str(&format!("Shock rows out: {}\n", prepared.records.len()));
    out.push_str(&format!("DON rows out  : {don_rows_out}\n"));
    out
}

/// Shape of a built panel.
pub fn format_panel_summary(panel: &Panel) -> String {
    let mut out = String::new();
    let mode = match panel.mode() {
        PanelMode::Full => "full",
        PanelMode::Event => "event",
    };
    out.push_str(&format!("=== epps panel ({mode}) ===\n"));
    out.push_str(&format!("Rows: {} | columns: {}\n", panel.len(), panel.columns().len()));

    let years: Vec<i32> = panel.rows().keys().map(|k| k.year).collect();
    if let (Some(min), Some(max)) = (years.iter().min(), years.iter().max()) {
        out.push_str(&format!("Years: [{min}, {max}]\n"));
    }
    let countries = panel
        .rows()
        .keys()
        .map(|k| k.country.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    out.push_str(&format!("Countries: {countries}\n"));
    out.push_str(&format!("Predictors: {}\n", fmt_list(panel.predictors())));
    out.push_str(&format!("Generated: {} columns\n", panel.features().len()));
    out
}

/// Size of a generated grid, per scope.
pub fn format_grid_summary(grid: &SpecGrid) -> String {
    let mut per_scope: Vec<(&str, usize)> = Vec::new();
    for spec in &grid.specs {
        match per_scope.iter_mut().find(|(s, _)| *s == spec.scope()) {
            Some((_, n)) => *n += 1,
            None => per_scope.push((spec.scope(), 1)),
        }
    }

    let mut out = String::new();
    out.push_str(&format!("Specs: {}", grid.specs.len()));
    if grid.duplicates_dropped > 0 {
        out.push_str(&format!(" ({} duplicates dropped)", grid.duplicates_dropped));
    }
    out.push('\n');
    for (scope, n) in per_scope {
        out.push_str(&format!("  {:<20} {n:>8}\n", truncate(scope, 20)));
    }
    out
}

/// Grid vs. pending counts.
pub fn format_pending_summary(grid_len: usize, pending_len: usize, skipped: &[SkippedFile]) -> String {
    let mut out = format!(
        "Grid: {grid_len} | completed: {} | pending: {pending_len}\n",
        grid_len.saturating_sub(pending_len)
    );
    out.push_str(&format_skipped(skipped));
    out
}

/// Batch files written.
pub fn format_batch_summary(manifest: &BatchManifest) -> String {
    let mut out = format!(
        "Batches: {} x <= {} specs ({} total)\n",
        manifest.files.len(),
        manifest.batch_size,
        manifest.total_specs
    );
    for name in &manifest.files {
        out.push_str(&format!("  {name}\n"));
    }
    out
}

/// What a merge consumed and produced.
pub fn format_merge_summary(outcome: &MergeOutcome, skipped: &[SkippedFile]) -> String {
    let mut out = String::new();
    if outcome.written {
        out.push_str(&format!(
            "Merged {} file(s) -> {} unique spec(s)\n",
            outcome.merged_files.len(),
            outcome.table.len()
        ));
    } else {
        out.push_str(&format!(
            "Nothing new to merge; store has {} spec(s)\n",
            outcome.table.len()
        ));
    }
    out.push_str(&format_skipped(skipped));
    out
}

/// Ranked results as a fixed-width table.
pub fn format_ranked(table: &ResultTable, score_col: &str) -> String {
    if table.is_empty() {
        return "No results.\n".to_string();
    }
    let score = resolve_score_column(table, score_col).unwrap_or(score_col);

    let mut out = String::new();
    out.push_str(
        format!(
            "{:>4} {:<16} {:<12} {:>12} {:<9} {}\n",
            "#", "spec_id", "scope", score, "converged", "rhs"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<4} {:-<16} {:-<12} {:-<12} {:-<9} {:-<24}\n", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for i in 0..table.len() {
        let cell = |name: &str| table.get(i, name).unwrap_or("");
        out.push_str(
            format!(
                "{:>4} {:<16} {:<12} {:>12} {:<9} {}\n",
                i + 1,
                truncate(cell(SPEC_ID_COL), 16),
                truncate(cell(SCOPE_COL), 12),
                fmt_score(cell(score)),
                truncate(cell(CONVERGED_COL), 9),
                truncate(cell("rhs"), 60),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Rejected input rows, capped.
pub fn format_row_errors(label: &str, errors: &[RowError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut out = format!("{label}: {} row(s) rejected\n", errors.len());
    for e in errors.iter().take(MAX_LISTED_ERRORS) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if errors.len() > MAX_LISTED_ERRORS {
        out.push_str(&format!("  ... {} more\n", errors.len() - MAX_LISTED_ERRORS));
    }
    out
}

fn format_skipped(skipped: &[SkippedFile]) -> String {
    let mut out = String::new();
    for s in skipped {
        out.push_str(&format!("  (skipped {}) {}\n", s.path.display(), s.reason));
    }
    out
}

fn fmt_score(s: &str) -> String {
    match s.trim().parse::<f64>() {
        Ok(v) => format!("{v:.3}"),
        Err(_) => truncate(s, 12),
    }
}

fn fmt_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items.join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
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
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("Global", 12), "Global");
        assert_eq!(truncate("abcdefgh", 4), "abc.");
    }

    #[test]
    fn ranked_table_lists_rows_in_order() {
        let t = table(
            &["spec_id", "scope", "aic", "converged", "rhs"],
            &[
                &["0123456789abcdef0123", "Global", "1.5", "true", "CLIMATIC + scale(Year)"],
                &["ffff", "Africa", "NA", "false", "1"],
            ],
        );
        let text = format_ranked(&t, "aicc");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("aic"));
        assert!(lines[2].starts_with("   1 0123456789abcde."));
        assert!(lines[2].contains("1.500"));
        assert!(lines[3].contains("NA"));
    }

    #[test]
    fn prep_summary_counts_rare_types() {
        let prepared = PreparedShocks {
            records: Vec::new(),
            duplicates_dropped: 3,
            out_of_range_dropped: 1,
            rare_types_dropped: vec!["Drought".to_string(), "Landslide".to_string()],
        };
        let text = format_prep_summary(&prepared, 9, 0);
        assert!(text.contains("3 duplicate | 1 out of range | 2 rare type"));
        assert!(text.contains("Shock rows in : 9"));
    }

    #[test]
    fn empty_results_say_so() {
        assert_eq!(format_ranked(&ResultTable::default(), "aicc"), "No results.\n");
    }

    #[test]
    fn row_errors_are_capped() {
        let errors: Vec<RowError> = (0..12)
            .map(|i| RowError {
                line: i + 2,
                message: "bad".to_string(),
            })
            .collect();
        let text = format_row_errors("shocks", &errors);
        assert!(text.starts_with("shocks: 12 row(s) rejected"));
        assert!(text.contains("... 2 more"));
        assert!(format_row_errors("don", &[]).is_empty());
    }
}

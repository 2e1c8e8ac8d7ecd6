//! Specification grid generation.
//!
//! For every predictor subset and every scope, the subset is crossed with the
//! scope's extra fixed-effect, year-term and random-effect options. Candidate
//! predictors are deduplicated and sorted first, so the caller's ordering of
//! the candidate list never changes the resulting ids.

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;

use crate::domain::{GridConfig, ModelSpec};
use crate::error::AppError;
use crate::grid::combos::predictor_subsets;

const DEFAULT_YEAR_TERM: &str = "scale(Year)";

/// The generated grid: unique specs in generation order.
#[derive(Debug, Clone)]
pub struct SpecGrid {
    pub specs: Vec<ModelSpec>,
    /// Rows dropped because an earlier row had the same id.
    pub duplicates_dropped: usize,
}

/// Generate the full, deduplicated specification grid.
pub fn generate_grid(config: &GridConfig) -> Result<SpecGrid, AppError> {
    let candidates = canonical_terms(&config.predictors);
    let scopes = unique_in_order(&config.scopes);
    if scopes.is_empty() {
        return Err(AppError::invalid("The grid needs at least one scope."));
    }

    let subsets = predictor_subsets(&candidates, config.min_predictors, config.max_predictors)?;

    // Cheap to enumerate; hashing is what we spread across threads.
    let mut drafts: Vec<Draft<'_>> = Vec::new();
    for scope in &scopes {
        let fe_opts = scope_options(Some(&config.fixed_effects), scope, None);
        let yr_opts = scope_options(config.year_terms.as_ref(), scope, Some(DEFAULT_YEAR_TERM));
        let re_opts = scope_options(config.random_terms.as_ref(), scope, None);

        for preds in &subsets {
            for fe in &fe_opts {
                for yr in &yr_opts {
                    for re in &re_opts {
                        drafts.push(Draft {
                            scope,
                            predictors: preds,
                            extra_fe: fe.clone(),
                            year_term: yr.clone(),
                            random: re.clone(),
                        });
                    }
                }
            }
        }
    }

    let built: Vec<ModelSpec> = drafts
        .par_iter()
        .map(|d| {
            ModelSpec::new(
                d.scope.as_str(),
                config.dv.as_str(),
                d.predictors.clone(),
                d.year_term.as_str(),
                d.random.as_str(),
                d.extra_fe.as_str(),
                config.engine.as_str(),
            )
        })
        .collect();

    let total = built.len();
    let mut seen = HashSet::with_capacity(total);
    let specs: Vec<ModelSpec> = built
        .into_iter()
        .filter(|s| seen.insert(s.id().clone()))
        .collect();
    let duplicates_dropped = total - specs.len();

    tracing::info!(
        candidates = candidates.len(),
        scopes = scopes.len(),
        subsets = subsets.len(),
        specs = specs.len(),
        duplicates_dropped,
        "generated spec grid"
    );

    Ok(SpecGrid {
        specs,
        duplicates_dropped,
    })
}

struct Draft<'a> {
    scope: &'a String,
    predictors: &'a Vec<String>,
    extra_fe: String,
    year_term: String,
    random: String,
}

/// Trimmed, non-empty, deduplicated and sorted.
fn canonical_terms(terms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn unique_in_order(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Options for `scope`. An absent map means `default` for every scope; a
/// scope missing from a present map, or mapped to an empty list, means the
/// single empty option.
fn scope_options(
    by_scope: Option<&BTreeMap<String, Vec<String>>>,
    scope: &str,
    default: Option<&str>,
) -> Vec<String> {
    let opts: Vec<String> = match by_scope {
        None => vec![default.unwrap_or("").to_string()],
        Some(map) => map.get(scope).cloned().unwrap_or_default(),
    };
    let opts = unique_in_order_allow_empty(&opts);
    if opts.is_empty() { vec![String::new()] } else { opts }
}

fn unique_in_order_allow_empty(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

//! Pre-processing of cleaned inputs before panel construction.
//!
//! Name normalization and continent lookup happen upstream; this stage only
//! applies the rules that depend on the run configuration:
//!
//! - shocks: exact-duplicate removal, year window, rare shock-type removal,
//!   aggregation to one row per (Country, Continent, Year, category, type)
//! - DON: aggregation to one row per (Country, Year, DiseaseLevel1)

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::{DonRecord, PanelConfig, ShockRecord};

/// Prepared shocks plus what each rule removed (for the run summary).
#[derive(Debug, Clone)]
pub struct PreparedShocks {
    pub records: Vec<ShockRecord>,
    pub duplicates_dropped: usize,
    pub out_of_range_dropped: usize,
    pub rare_types_dropped: Vec<String>,
}

pub fn prepare_shocks(records: &[ShockRecord], config: &PanelConfig) -> PreparedShocks {
    let mut seen = BTreeSet::new();
    let unique: Vec<&ShockRecord> = records.iter().filter(|r| seen.insert(*r)).collect();
    let duplicates_dropped = records.len() - unique.len();

    let in_range: Vec<&ShockRecord> = unique
        .into_iter()
        .filter(|r| (config.year_min..=config.year_max).contains(&r.year))
        .collect();
    let out_of_range_dropped = records.len() - duplicates_dropped - in_range.len();

    let mut type_counts: HashMap<&str, usize> = HashMap::new();
    for r in &in_range {
        *type_counts.entry(r.shock_type.as_str()).or_default() += 1;
    }
    let mut rare_types_dropped: Vec<String> = type_counts
        .iter()
        .filter(|(_, n)| **n < config.rare_threshold)
        .map(|(t, _)| t.to_string())
        .collect();
    rare_types_dropped.sort();

    let mut totals: BTreeMap<(&str, &str, i32, &str, &str), u64> = BTreeMap::new();
    for r in in_range {
        if type_counts[r.shock_type.as_str()] < config.rare_threshold {
            continue;
        }
        let key = (
            r.country.as_str(),
            r.continent.as_str(),
            r.year,
            r.shock_category.as_str(),
            r.shock_type.as_str(),
        );
        *totals.entry(key).or_default() += r.count;
    }

    let records = totals
        .into_iter()
        .map(|((country, continent, year, category, shock_type), count)| ShockRecord {
            country: country.to_string(),
            continent: continent.to_string(),
            year,
            shock_category: category.to_string(),
            shock_type: shock_type.to_string(),
            count,
        })
        .collect();

    tracing::info!(
        duplicates_dropped,
        out_of_range_dropped,
        rare_types = rare_types_dropped.len(),
        "prepared shocks"
    );

    PreparedShocks {
        records,
        duplicates_dropped,
        out_of_range_dropped,
        rare_types_dropped,
    }
}

/// Sum cases and deaths per (Country, Year, DiseaseLevel1). Missing values are
/// skipped by the sums, so a group with no reported values totals zero.
pub fn prepare_don(records: &[DonRecord]) -> Vec<DonRecord> {
    let mut totals: BTreeMap<(&str, i32, &str), (f64, f64)> = BTreeMap::new();
    for r in records {
        let entry = totals
            .entry((r.country.as_str(), r.year, r.disease.as_str()))
            .or_default();
        entry.0 += r.cases_total.unwrap_or(0.0);
        entry.1 += r.deaths.unwrap_or(0.0);
    }

    totals
        .into_iter()
        .map(|((country, year, disease), (cases, deaths))| DonRecord {
            country: country.to_string(),
            year,
            disease: disease.to_string(),
            cases_total: Some(cases),
            deaths: Some(deaths),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shock(country: &str, year: i32, category: &str, shock_type: &str, count: u64) -> ShockRecord {
        ShockRecord {
            country: country.to_string(),
            continent: "Africa".to_string(),
            year,
            shock_category: category.to_string(),
            shock_type: shock_type.to_string(),
            count,
        }
    }

    #[test]
    fn shocks_are_filtered_and_aggregated() {
        let config = PanelConfig {
            rare_threshold: 2,
            ..PanelConfig::default()
        };
        let records = vec![
            shock("Kenya", 2001, "CLIMATIC", "Drought", 1),
            shock("Kenya", 2001, "CLIMATIC", "Drought", 1),
            shock("Kenya", 2001, "CLIMATIC", "Drought", 2),
            shock("Kenya", 1980, "CLIMATIC", "Drought", 5),
            shock("Kenya", 2002, "CONFLICTS", "Coup", 1),
        ];

        let out = prepare_shocks(&records, &config);
        assert_eq!(out.duplicates_dropped, 1);
        assert_eq!(out.out_of_range_dropped, 1);
        assert_eq!(out.rare_types_dropped, ["Coup"]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].count, 3);
    }

    #[test]
    fn don_totals_skip_missing_values() {
        let rec = |year, cases, deaths| DonRecord {
            country: "Peru".to_string(),
            year,
            disease: "Dengue".to_string(),
            cases_total: cases,
            deaths,
        };
        let out = prepare_don(&[
            rec(2004, Some(10.0), None),
            rec(2004, Some(5.0), Some(1.0)),
            rec(2005, None, None),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].cases_total, Some(15.0));
        assert_eq!(out[0].deaths, Some(1.0));
        assert_eq!(out[1].cases_total, Some(0.0));
    }
}

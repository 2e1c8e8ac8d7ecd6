//! Seeded synthetic shocks and DON tables.
//!
//! The real inputs (EM-DAT style shocks, WHO Disease Outbreak News) live
//! outside this repository; the sample stands in for them in demos and smoke
//! runs. Counts are Poisson draws. Outbreak rates rise with the climatic and
//! conflict load of the same country-year so the grid has something to find.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Poisson;

use crate::domain::{DonRecord, PanelConfig, ShockRecord};
use crate::error::AppError;

const COUNTRIES: [(&str, &str); 12] = [
    ("Kenya", "Africa"),
    ("Nigeria", "Africa"),
    ("Democratic Republic of the Congo", "Africa"),
    ("Ethiopia", "Africa"),
    ("India", "Asia"),
    ("Bangladesh", "Asia"),
    ("Indonesia", "Asia"),
    ("Brazil", "Americas"),
    ("Peru", "Americas"),
    ("Haiti", "Americas"),
    ("Ukraine", "Europe"),
    ("Papua New Guinea", "Oceania"),
];

/// (category, type, mean events per country-year)
const SHOCK_TYPES: [(&str, &str, f64); 7] = [
    ("CLIMATIC", "Flood", 0.9),
    ("CLIMATIC", "Drought", 0.3),
    ("CLIMATIC", "Storm", 0.5),
    ("CONFLICTS", "Armed conflict", 0.4),
    ("ECOLOGICAL", "Insect infestation", 0.1),
    ("GEOPHYSICAL", "Earthquake", 0.2),
    ("TECHNOLOGICAL", "Transport accident", 0.6),
];

const DISEASES: [&str; 4] = ["Cholera", "Ebola", "Yellow fever", "Measles"];

/// Sample size and seed.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub countries: usize,
    pub year_min: i32,
    pub year_max: i32,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        let panel = PanelConfig::default();
        Self {
            countries: COUNTRIES.len(),
            year_min: panel.year_min,
            year_max: panel.year_max,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    pub shocks: Vec<ShockRecord>,
    pub don: Vec<DonRecord>,
}

pub fn generate_sample(config: &SampleConfig, outcome_shock_type: &str) -> Result<SampleData, AppError> {
    if config.countries == 0 || config.countries > COUNTRIES.len() {
        return Err(AppError::invalid(format!(
            "Sample country count must be between 1 and {}.",
            COUNTRIES.len()
        )));
    }
    if config.year_max < config.year_min {
        return Err(AppError::invalid(format!(
            "Invalid sample years: {} > {}.",
            config.year_min, config.year_max
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut shocks = Vec::new();
    let mut don = Vec::new();

    for (country, continent) in COUNTRIES.iter().take(config.countries) {
        // Countries differ in baseline vulnerability.
        let vulnerability: f64 = rng.gen_range(0.5..1.5);

        for year in config.year_min..=config.year_max {
            let mut load = 0u64;
            for (category, shock_type, rate) in SHOCK_TYPES {
                let count = poisson(&mut rng, rate * vulnerability)?;
                if category == "CLIMATIC" || category == "CONFLICTS" {
                    load += count;
                }
                if count > 0 {
                    shocks.push(ShockRecord {
                        country: country.to_string(),
                        continent: continent.to_string(),
                        year,
                        shock_category: category.to_string(),
                        shock_type: shock_type.to_string(),
                        count,
                    });
                }
            }

            let outbreaks = poisson(&mut rng, 0.15 * vulnerability + 0.2 * load as f64)?;
            if outbreaks == 0 {
                continue;
            }
            shocks.push(ShockRecord {
                country: country.to_string(),
                continent: continent.to_string(),
                year,
                shock_category: "BIOLOGICAL".to_string(),
                shock_type: outcome_shock_type.to_string(),
                count: outbreaks,
            });

            for _ in 0..outbreaks {
                let disease = DISEASES[rng.gen_range(0..DISEASES.len())];
                let cases = poisson(&mut rng, 40.0 * vulnerability)? as f64;
                // Roughly one in five reports omits deaths.
                let deaths = if rng.gen_bool(0.2) {
                    None
                } else {
                    Some(poisson(&mut rng, 0.03 * cases + 0.5)? as f64)
                };
                don.push(DonRecord {
                    country: country.to_string(),
                    year,
                    disease: disease.to_string(),
                    cases_total: Some(cases),
                    deaths,
                });
            }
        }
    }

    tracing::info!(
        seed = config.seed,
        countries = config.countries,
        shock_rows = shocks.len(),
        don_rows = don.len(),
        "generated synthetic sample"
    );
    Ok(SampleData { shocks, don })
}

fn poisson(rng: &mut StdRng, lambda: f64) -> Result<u64, AppError> {
    let dist = Poisson::new(lambda.max(1e-6))
        .map_err(|e| AppError::invalid(format!("Invalid Poisson rate {lambda}: {e}")))?;
    let draw: f64 = dist.sample(rng);
    Ok(draw as u64)
}

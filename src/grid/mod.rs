//! Specification grid.
//!
//! - grid config JSON (`config`)
//! - predictor subset enumeration (`combos`)
//! - spec generation and deduplication (`generator`)

pub mod combos;
pub mod config;
pub mod generator;

pub use combos::*;
pub use config::*;
pub use generator::*;

//! `epps-shocks` library crate.
//!
//! The binary (`epps`) is a thin wrapper around this library so that:
//!
//! - panel, grid and merge logic is testable without spawning processes
//! - the stages can be driven from other tools (notebooks, schedulers)
//!
//! Data flow: `io::ingest` -> `prep` -> `panel` -> `grid` -> `batch` ->
//! `app::dispatch` (external fitter) -> `results`.

pub mod app;
pub mod batch;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod grid;
pub mod io;
pub mod panel;
pub mod prep;
pub mod report;
pub mod results;
pub mod telemetry;

//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - shocks/DON/panel CSV exports (`export`)
//! - loosely-typed result tables, CSV or columnar JSON (`table`)

pub mod export;
pub mod ingest;
pub mod table;

pub use export::*;
pub use ingest::*;
pub use table::*;

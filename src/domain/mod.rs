//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - cleaned input records (`ShockRecord`, `DonRecord`)
//! - run configuration values (`PanelConfig`, `GridConfig`, `BatchConfig`, ...)
//! - model specifications and their content-derived identity (`ModelSpec`, `SpecId`)
//! - partial-result diagnostics (`Scan`, `SkippedFile`)

pub mod spec;
pub mod types;

pub use spec::*;
pub use types::*;

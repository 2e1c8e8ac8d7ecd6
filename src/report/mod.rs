//! Reporting utilities: summaries and ranked tables for the terminal.
//!
//! Everything here returns a `String`; printing is left to `app`.

pub mod format;

pub use format::*;

//! Input data sources that are not files on disk.
//!
//! - seeded synthetic shocks/DON tables (`sample`)

pub mod sample;

pub use sample::*;

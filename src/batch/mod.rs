//! Batch protocol.
//!
//! - partition the grid into batch files, read spec files back (`writer`)
//! - reconcile completed results against the grid (`pending`)

pub mod pending;
pub mod writer;

pub use pending::*;
pub use writer::*;

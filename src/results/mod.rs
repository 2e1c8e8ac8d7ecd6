//! Result consolidation and ranking.
//!
//! - merge batch result files into one store (`merge`)
//! - rank, filter and summarize merged results (`rank`)

pub mod merge;
pub mod rank;

pub use merge::*;
pub use rank::*;

//! Panel construction.
//!
//! Responsibilities:
//!
//! - hold the keyed panel table (`frame`)
//! - build full and event-relative panels from shocks + DON (`build`)
//! - add lag/lead averages and center predictors (`features`)

pub mod build;
pub mod features;
pub mod frame;

pub use build::*;
pub use features::*;
pub use frame::*;

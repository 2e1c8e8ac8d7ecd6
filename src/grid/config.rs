//! Read grid configuration JSON files.
//!
//! The schema is `domain::GridConfig`; absent fields take its defaults.

use std::fs::File;
use std::path::Path;

use crate::domain::GridConfig;
use crate::error::AppError;

/// Read a grid configuration file.
pub fn load_grid_config(path: &Path) -> Result<GridConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open grid config '{}': {e}", path.display())))?;
    let config: GridConfig = serde_json::from_reader(file)
        .map_err(|e| AppError::invalid(format!("Invalid grid config '{}': {e}", path.display())))?;
    Ok(config)
}

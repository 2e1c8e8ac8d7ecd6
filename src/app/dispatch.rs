//! Run the external fitting command over batch files.
//!
//! Each batch is handed to the fitter as
//! `<program> <args...> <batch_file> <panel_file> <output_dir>`. Batches run
//! one at a time, in order; the first failure stops the run. Results already
//! written by earlier batches are kept, and a later run skips them through
//! the pending filter.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::error::AppError;

/// Environment variable holding the fitter command line.
pub const FITTER_ENV: &str = "EPPS_FITTER";

/// The external fitter: a program and its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitterCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl FitterCommand {
    /// Split a command line on whitespace. Blank input yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Use `flag` when given, otherwise `EPPS_FITTER` (a `.env` file is loaded
    /// first).
    pub fn resolve(flag: Option<&str>) -> Result<Self, AppError> {
        if let Some(line) = flag {
            return Self::parse(line).ok_or_else(|| AppError::invalid("--fitter must not be empty."));
        }
        dotenvy::dotenv().ok();
        let line = std::env::var(FITTER_ENV).map_err(|_| {
            AppError::invalid(format!("No fitter command: pass --fitter or set {FITTER_ENV} (.env)."))
        })?;
        Self::parse(&line).ok_or_else(|| AppError::invalid(format!("{FITTER_ENV} must not be empty.")))
    }
}

/// Run the fitter once per batch file. Returns how many batches completed.
pub fn dispatch_batches(
    fitter: &FitterCommand,
    batches: &[PathBuf],
    panel_file: &Path,
    output_dir: &Path,
) -> Result<usize, AppError> {
    std::fs::create_dir_all(output_dir).map_err(|e| {
        AppError::io(format!(
            "Failed to create results directory '{}': {e}",
            output_dir.display()
        ))
    })?;

    for (i, batch) in batches.iter().enumerate() {
        let started = Instant::now();
        tracing::info!(
            batch = %batch.display(),
            index = i + 1,
            total = batches.len(),
            program = %fitter.program,
            "dispatching batch"
        );

        let status = Command::new(&fitter.program)
            .args(&fitter.args)
            .arg(batch)
            .arg(panel_file)
            .arg(output_dir)
            .status()
            .map_err(|e| {
                AppError::fitter(format!(
                    "Failed to start fitter '{}' for batch '{}': {e}",
                    fitter.program,
                    batch.display()
                ))
            })?;

        if !status.success() {
            let code = status.code().map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(AppError::fitter(format!(
                "Fitter failed on batch '{}' (exit {code}); {i} of {} batches completed.",
                batch.display(),
                batches.len()
            )));
        }

        tracing::info!(
            batch = %batch.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
    }
    Ok(batches.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_program_and_args() {
        let cmd = FitterCommand::parse("  Rscript fit_batch.R --engine glmmTMB ").unwrap();
        assert_eq!(cmd.program, "Rscript");
        assert_eq!(cmd.args, ["fit_batch.R", "--engine", "glmmTMB"]);
        assert!(FitterCommand::parse("   ").is_none());
    }

    #[test]
    fn flag_wins_and_blank_flag_is_invalid() {
        let cmd = FitterCommand::resolve(Some("fitter --x")).unwrap();
        assert_eq!(cmd.program, "fitter");
        assert_eq!(FitterCommand::resolve(Some(" ")).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn missing_program_names_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = FitterCommand::parse("epps-no-such-fitter-program").unwrap();
        let batch = dir.path().join("model_grid_0001.csv");
        let err = dispatch_batches(&cmd, &[batch], &dir.path().join("panel.csv"), dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.message().contains("model_grid_0001.csv"));
    }

    #[cfg(unix)]
    #[test]
    fn stops_at_first_failing_batch() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        let batches = vec![dir.path().join("a.csv"), dir.path().join("b.csv")];

        let ok = FitterCommand::parse("true").unwrap();
        assert_eq!(dispatch_batches(&ok, &batches, &dir.path().join("panel.csv"), &out).unwrap(), 2);
        assert!(out.is_dir());

        let failing = FitterCommand::parse("false").unwrap();
        let err = dispatch_batches(&failing, &batches, &dir.path().join("panel.csv"), &out).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.message().contains("a.csv"));
        assert!(err.message().contains("0 of 2"));
    }
}

//! dblib-migrate: A fast Rust migrator for Altium DbLib component libraries
//!
//! This library converts a DbLib configuration plus its external parts
//! database into a KiCad database library: a self-contained SQLite store,
//! a .kicad_dbl descriptor and a migration report.

pub mod classify;
pub mod config;
pub mod error;
pub mod mapping;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod util;

use std::path::PathBuf;

use anyhow::Result;

pub use error::MigrationError;
pub use orchestrator::{MigrationOutcome, Orchestrator};

/// Options for running a migration
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Path to the .DbLib file
    pub dblib_path: PathBuf,
    /// Optional JSON settings file
    pub settings_path: Option<PathBuf>,
    /// Overrides the settings' output directory when given
    pub output_dir: Option<PathBuf>,
    /// Enable verbose output
    pub verbose: bool,
}

/// Migrate a DbLib component library to a KiCad database library
pub fn run_migration(options: MigrationOptions) -> Result<MigrationOutcome> {
    if options.verbose {
        println!("Migrating library: {}", options.dblib_path.display());
    }

    // Step 1: Load the effective settings
    let mut settings = match &options.settings_path {
        Some(path) => config::MigrationSettings::load(path)?,
        None => config::MigrationSettings::default(),
    };
    if let Some(output_dir) = options.output_dir {
        settings.output_directory = output_dir;
    }

    if options.verbose {
        println!(
            "Output: {} + {}",
            settings.store_path().display(),
            settings.dbl_path().display()
        );
    }

    // Step 2: Run the pipeline
    let outcome = Orchestrator::new(settings).run(&options.dblib_path)?;

    if options.verbose {
        println!("{}", outcome.report.summary());
        println!("Created store: {}", outcome.store_path.display());
        println!("Created descriptor: {}", outcome.dbl_path.display());
        println!("Report: {}", outcome.report_path.display());
    }

    Ok(outcome)
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dblib_migrate::{run_migration, MigrationOptions};

#[derive(Parser)]
#[command(name = "dblib-migrate")]
#[command(author, version, about = "Fast Rust migrator for Altium DbLib libraries to KiCad")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a .DbLib library into a KiCad database library
    Migrate {
        /// Path to the .DbLib file
        #[arg(short, long)]
        dblib: PathBuf,

        /// Optional JSON settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for the store, descriptor and report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            dblib,
            config,
            output,
            verbose,
        } => {
            let options = MigrationOptions {
                dblib_path: dblib,
                settings_path: config,
                output_dir: output,
                verbose,
            };

            let outcome = run_migration(options)?;
            println!("{}", outcome.report.summary());
        }
    }

    Ok(())
}

//! Argument parsing and dispatch for the `finscan` subcommands.

mod backends;
mod extract;
mod run;
mod templates;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use finscan::config::EngineConfig;

#[derive(Parser)]
#[command(name = "finscan")]
#[command(about = "Financial-disclosure document extraction")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides $FINSCAN_CONFIG and auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one document and print its record as JSON
    Extract {
        /// Document file (PDF, image or plain text)
        file: PathBuf,
        /// Document ID (defaults to the file stem)
        #[arg(long)]
        id: Option<String>,
        /// Template type hint (e.g. "ptr", "annual", "extension")
        #[arg(short, long)]
        template: Option<String>,
        /// Allow paid cloud recognition for this document
        #[arg(long)]
        authorize_cloud: bool,
        /// Pretty-print the JSON record
        #[arg(long)]
        pretty: bool,
    },

    /// Process a JSON-lines manifest of work items through the worker pool
    Run {
        /// Manifest file, one work item per line
        #[arg(short, long)]
        manifest: PathBuf,
        /// Object store root (raw/, text/ and records/ live here)
        #[arg(short, long)]
        store: PathBuf,
        /// Number of workers (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Deliveries per item before it is dead-lettered
        #[arg(long, default_value = "3")]
        max_deliveries: u32,
    },

    /// List built-in templates and their expected fields
    Templates,

    /// Show recognition backend availability
    Backends,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            file,
            id,
            template,
            authorize_cloud,
            pretty,
        } => {
            let config = EngineConfig::load(cli.config.as_deref())?;
            extract::cmd_extract(
                config,
                &file,
                id,
                template.as_deref(),
                authorize_cloud,
                pretty,
            )
            .await
        }
        Commands::Run {
            manifest,
            store,
            workers,
            max_deliveries,
        } => {
            let config = EngineConfig::load(cli.config.as_deref())?;
            run::cmd_run(config, &manifest, &store, workers, max_deliveries).await
        }
        Commands::Templates => templates::cmd_templates(),
        Commands::Backends => {
            let config = EngineConfig::load(cli.config.as_deref())?;
            backends::cmd_backends(&config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from([
            "finscan",
            "extract",
            "filing.pdf",
            "--template",
            "ptr",
            "--authorize-cloud",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Extract {
                file,
                template,
                authorize_cloud,
                pretty,
                id,
            } => {
                assert_eq!(file, PathBuf::from("filing.pdf"));
                assert_eq!(template.as_deref(), Some("ptr"));
                assert!(authorize_cloud);
                assert!(!pretty);
                assert_eq!(id, None);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_run_requires_manifest_and_store() {
        assert!(Cli::try_parse_from(["finscan", "run", "--store", "data"]).is_err());
        let cli = Cli::try_parse_from([
            "finscan",
            "run",
            "--manifest",
            "items.jsonl",
            "--store",
            "data",
            "--workers",
            "8",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run {
                workers: Some(8),
                max_deliveries: 3,
                ..
            }
        ));
    }
}

//! wikicorpus: plain-text corpora from MediaWiki XML dumps

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{extract_dump, init_config, textify_stream, ExtractArgs};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;
use wikicorpus::config::{Config, LogFormat, LoggingConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "wikicorpus")]
#[command(about = "Extract plain-text corpora from MediaWiki XML dumps")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract pages from a dump as plain text
    Extract(ExtractArgs),

    /// Convert a form-feed separated markup stream from stdin to plain text
    Textify,

    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Install the stderr subscriber; stdout is reserved for page output
fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let log_level: Level = logging.level.raised(verbose).into();

    match logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_max_level(log_level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit with 1; --help and --version are not errors
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            e.print()?;
            return Ok(code);
        }
    };

    // A missing config file means defaults; an invalid one is fatal
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    init_logging(&config.logging, cli.verbose)?;
    debug!("Logging at {}", config.logging.level.raised(cli.verbose));

    match cli.command {
        Commands::Extract(args) => extract_dump(config, args).await,
        Commands::Textify => {
            textify_stream().await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { path } => {
            init_config(path).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

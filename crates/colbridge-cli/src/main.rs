//! colbridge CLI - point API adapter for batch-writer/scanner stores.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colbridge_core::config::{LogFormat, RowGrouping};
use colbridge_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, bad option value)
    ConfigError = 1,
    /// Input file could not be read or parsed
    InputError = 2,
    /// Write or flush rejected by the store
    WriteError = 3,
    /// Read or scan failed
    ReadError = 4,
    /// Operation the store cannot provide
    Unsupported = 5,
    /// General runtime error
    RuntimeError = 10,
}

impl ExitCode {
    /// Convert an error to an exit code.
    ///
    /// Library errors are matched by variant; anything else falls back to
    /// inspecting the message.
    fn from_error(error: &anyhow::Error) -> Self {
        use colbridge_core::Error;

        if let Some(e) = error.downcast_ref::<Error>() {
            return match e {
                Error::Config(_) => ExitCode::ConfigError,
                Error::Write { .. } | Error::Flush { .. } | Error::BufferClosed => {
                    ExitCode::WriteError
                }
                Error::Read { .. } | Error::IteratorExhausted | Error::TableNotFound(_) => {
                    ExitCode::ReadError
                }
                Error::Unsupported(_) => ExitCode::Unsupported,
                Error::Io(_) => ExitCode::InputError,
                Error::Internal(_) => ExitCode::RuntimeError,
            };
        }
        if error.downcast_ref::<toml::de::Error>().is_some() {
            return ExitCode::ConfigError;
        }
        if error.downcast_ref::<serde_json::Error>().is_some() {
            return ExitCode::InputError;
        }

        let error_str = error.to_string().to_lowercase();
        if error_str.contains("config") || error_str.contains("toml") {
            ExitCode::ConfigError
        } else if error_str.contains("input") || error_str.contains("line") {
            ExitCode::InputError
        } else {
            ExitCode::RuntimeError
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "colbridge")]
#[command(about = "Point get/put/delete/scan over a batch-writer store", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,

    /// Load cells into an in-memory store and print them row by row
    Scan {
        /// JSON-lines file with one cell per line
        #[arg(short, long)]
        input: PathBuf,

        /// Table to load and scan (defaults to the configured data table)
        #[arg(short, long)]
        table: Option<String>,

        /// Override row grouping (client or server)
        #[arg(long)]
        grouping: Option<RowGrouping>,
    },
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config when it parses; failures are
    // reported by the command itself.
    let monitoring = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.monitoring)
        .unwrap_or_default();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new(monitoring.log_level.as_filter()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    match monitoring.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    match execute_command(cli).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from_error(&e)
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Validate => {
            let config = load_config(&cli.config)?;
            config.validate()?;
            println!("Configuration is valid");
        }

        Commands::Scan {
            input,
            table,
            grouping,
        } => {
            // Scanning works without a config file; defaults apply.
            let config = match &cli.config {
                Some(_) => load_config(&cli.config)?,
                None => Config::default(),
            };
            let stdout = std::io::stdout();
            commands::scan::run(config, &input, table, grouping, &mut stdout.lock()).await?;
        }
    }

    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let path = path.clone().unwrap_or_else(|| PathBuf::from("config.toml"));
    Ok(Config::from_file(&path)?)
}

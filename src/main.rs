//! Wayfare: current weather for trip destinations, cached locally.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;

use wayfare_core::{App, AppError, Config, ConfigError};

/// Wayfare travel weather
#[derive(Parser)]
#[command(name = "wayfare", about = "Current weather for trip destinations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print current weather for one or more locations as JSON.
    Weather {
        #[arg(required = true)]
        locations: Vec<String>,
    },
    /// Inspect or maintain the local weather cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show the config file path and validation results.
    Config,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List locations with a fresh cached reading.
    List,
    /// Drop cached readings for the given locations.
    Clear {
        #[arg(required = true)]
        locations: Vec<String>,
    },
    /// Delete every expired entry.
    Sweep,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", failure_report(&e));
            ExitCode::FAILURE
        }
    }
}

/// The single stderr report for a failed command.
fn failure_report(error: &AppError) -> String {
    format!("{}\n  caused by: {}", error.user_message(), error)
}

async fn run(command: Command) -> Result<(), AppError> {
    let config = Config::load()?;
    wayfare_core::init(&config.log.filter)?;

    let validation = config.validate();
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    if let Command::Config = command {
        println!("Config file: {}", Config::config_path()?.display());
        println!("Database:    {}", config.database.path.display());
        for error in &validation.errors {
            println!("error:   {}", error);
        }
        for warning in &validation.warnings {
            println!("warning: {}", warning);
        }
        return Ok(());
    }

    if !validation.is_valid() {
        return Err(ConfigError::Invalid(validation.error_summary()).into());
    }

    let app = App::new(config)?;
    let outcome = execute(&app, command).await;
    app.shutdown();
    outcome
}

async fn execute(app: &App, command: Command) -> Result<(), AppError> {
    let resolver = app.resolver();

    match command {
        Command::Weather { locations } => {
            for location in &locations {
                let resolution = resolver.resolve_with_source(location).await?;
                let output = json!({
                    "source": resolution.source,
                    "reading": resolution.reading,
                });
                println!("{}", serde_json::to_string_pretty(&output).map_err(anyhow::Error::from)?);
            }
        }
        Command::Cache { action } => match action {
            CacheAction::List => {
                for location in resolver.cached_locations()? {
                    println!("{}", location);
                }
            }
            CacheAction::Clear { locations } => {
                for location in &locations {
                    let removed = resolver.clear_location(location)?;
                    println!("{}: {}", location, if removed { "cleared" } else { "not cached" });
                }
            }
            CacheAction::Sweep => {
                let removed = resolver.sweep_expired()?;
                println!("Removed {} expired entries", removed);
            }
        },
        Command::Config => {}
    }

    Ok(())
}

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sf_cli::commands::{directory, events, import, ingest, maintenance, metrics, status};
use sf_cli::{Cli, Commands, Config, MetricsTarget, StationsAction, WorkersAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(sf_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = sf_db::Database::open(&config.database_path).with_context(|| {
        format!("failed to open {}", config.database_path.display())
    })?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so JSON output on stdout stays clean
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();

    match command {
        Commands::Status => status::run(&mut stdout, &db, &config.database_path)?,
        Commands::Seed => maintenance::seed(&mut stdout, &mut db)?,
        Commands::Reset => maintenance::reset(&mut stdout, &mut db)?,
        Commands::Workers(action) => match action {
            WorkersAction::List { json } => directory::list_workers(&mut stdout, &db, *json)?,
            WorkersAction::Add { id, name } => {
                directory::add_worker(&mut stdout, &db, id, name)?;
            }
        },
        Commands::Stations(action) => match action {
            StationsAction::List { json } => directory::list_stations(&mut stdout, &db, *json)?,
            StationsAction::Add { id, name, kind } => {
                directory::add_station(&mut stdout, &db, id, name, kind)?;
            }
        },
        Commands::Ingest {
            worker,
            station,
            event_type,
            confidence,
            count,
            timestamp,
        } => {
            let args = ingest::IngestArgs {
                worker,
                station,
                event_type,
                confidence: *confidence,
                count: *count,
                timestamp: timestamp.as_deref(),
            };
            ingest::run(&mut stdout, &mut db, args)?;
        }
        Commands::Import => {
            let stdin = io::stdin();
            let imported = import::run(stdin.lock(), &mut stdout, &mut db)?;
            tracing::debug!(imported, "import finished");
        }
        Commands::Events {
            worker,
            station,
            event_type,
            after,
            before,
        } => {
            let query = events::EventsQuery {
                worker: worker.as_deref(),
                station: station.as_deref(),
                event_type: event_type.as_deref(),
                after: after.as_deref(),
                before: before.as_deref(),
            };
            let written = events::run(&mut stdout, &db, &query)?;
            tracing::debug!(written, "events listed");
        }
        Commands::Metrics(target) => match target {
            MetricsTarget::Worker { id, json } => {
                metrics::worker(&mut stdout, &db, config.metrics(), id, *json)?;
            }
            MetricsTarget::Station { id, json } => {
                metrics::station(&mut stdout, &db, config.metrics(), id, *json)?;
            }
            MetricsTarget::Factory { json } => {
                metrics::factory(&mut stdout, &db, config.metrics(), *json)?;
            }
        },
    }

    Ok(())
}

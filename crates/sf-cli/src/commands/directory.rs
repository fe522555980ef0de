//! Worker and workstation directory commands.

use std::io::Write;

use anyhow::{Context, Result};

use sf_core::{StationId, Worker, WorkerId, Workstation};
use sf_db::Database;

pub fn list_workers<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let workers = db.list_workers()?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &workers)?;
        writeln!(writer)?;
        return Ok(());
    }

    if workers.is_empty() {
        writeln!(writer, "No workers. Run 'sf seed' to install the standard roster.")?;
        return Ok(());
    }
    writeln!(writer, "{:<6} Name", "ID")?;
    for worker in &workers {
        writeln!(writer, "{:<6} {}", worker.worker_id.as_str(), worker.name)?;
    }
    Ok(())
}

pub fn add_worker<W: Write>(writer: &mut W, db: &Database, id: &str, name: &str) -> Result<()> {
    let worker = Worker::new(WorkerId::new(id)?, name);
    db.insert_worker(&worker)
        .with_context(|| format!("failed to add worker {id}"))?;
    writeln!(writer, "Added worker {} ({})", worker.worker_id, worker.name)?;
    Ok(())
}

pub fn list_stations<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let stations = db.list_workstations()?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &stations)?;
        writeln!(writer)?;
        return Ok(());
    }

    if stations.is_empty() {
        writeln!(
            writer,
            "No workstations. Run 'sf seed' to install the standard roster."
        )?;
        return Ok(());
    }
    writeln!(writer, "{:<6} {:<20} Type", "ID", "Name")?;
    for station in &stations {
        writeln!(
            writer,
            "{:<6} {:<20} {}",
            station.station_id.as_str(),
            station.name,
            station.kind
        )?;
    }
    Ok(())
}

pub fn add_station<W: Write>(
    writer: &mut W,
    db: &Database,
    id: &str,
    name: &str,
    kind: &str,
) -> Result<()> {
    let station = Workstation::new(StationId::new(id)?, name, kind);
    db.insert_workstation(&station)
        .with_context(|| format!("failed to add workstation {id}"))?;
    writeln!(
        writer,
        "Added workstation {} ({}, {})",
        station.station_id, station.name, station.kind
    )?;
    Ok(())
}

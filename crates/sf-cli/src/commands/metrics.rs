//! Metrics command: per-worker, per-workstation and factory-wide views.

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use serde::Serialize;

use sf_core::{
    DashboardSnapshot, MetricsConfig, MetricsEngine, StationId, WorkerId, WorkerMetrics,
    WorkstationMetrics,
};
use sf_db::Database;

const LABEL_WIDTH: usize = 20;
const NAME_WIDTH: usize = 20;

pub fn worker<W: Write>(
    writer: &mut W,
    db: &Database,
    config: MetricsConfig,
    id: &str,
    json: bool,
) -> Result<()> {
    let engine = MetricsEngine::new(db, config);
    let metrics = engine
        .worker_metrics(&WorkerId::new(id)?)
        .context("failed to compute worker metrics")?;
    if json {
        return write_json(writer, &metrics);
    }
    write_worker_metrics(writer, &metrics)?;
    Ok(())
}

pub fn station<W: Write>(
    writer: &mut W,
    db: &Database,
    config: MetricsConfig,
    id: &str,
    json: bool,
) -> Result<()> {
    let engine = MetricsEngine::new(db, config);
    let metrics = engine
        .workstation_metrics(&StationId::new(id)?)
        .context("failed to compute workstation metrics")?;
    if json {
        return write_json(writer, &metrics);
    }
    write_station_metrics(writer, &metrics)?;
    Ok(())
}

pub fn factory<W: Write>(
    writer: &mut W,
    db: &Database,
    config: MetricsConfig,
    json: bool,
) -> Result<()> {
    let engine = MetricsEngine::new(db, config);
    let snapshot = engine
        .snapshot()
        .context("failed to compute factory metrics")?;
    if json {
        return write_json(writer, &snapshot);
    }
    write_snapshot(writer, &snapshot)?;
    Ok(())
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

// ========== Human-Readable Output ==========

fn write_field<W: Write>(
    writer: &mut W,
    label: &str,
    value: impl std::fmt::Display,
) -> io::Result<()> {
    writeln!(writer, "{label:<LABEL_WIDTH$}{value}")
}

fn write_worker_metrics<W: Write>(writer: &mut W, m: &WorkerMetrics) -> io::Result<()> {
    writeln!(writer, "Worker {} ({})", m.worker_id, m.name)?;
    write_field(writer, "Status:", m.status.as_str())?;
    write_field(
        writer,
        "Station:",
        m.current_station.as_ref().map_or("-", StationId::as_str),
    )?;
    write_field(writer, "Active time:", format!("{} min", m.total_active_time_minutes))?;
    write_field(writer, "Idle time:", format!("{} min", m.total_idle_time_minutes))?;
    write_field(writer, "Utilization:", format!("{:.1}%", m.utilization_percentage))?;
    write_field(writer, "Units produced:", m.total_units_produced)?;
    write_field(writer, "Units per hour:", format!("{:.1}", m.units_per_hour))
}

fn write_station_metrics<W: Write>(writer: &mut W, m: &WorkstationMetrics) -> io::Result<()> {
    writeln!(writer, "Workstation {} ({}, {})", m.station_id, m.name, m.kind)?;
    write_field(writer, "Status:", m.status.as_str())?;
    write_field(
        writer,
        "Current worker:",
        m.current_worker.as_ref().map_or("-", WorkerId::as_str),
    )?;
    write_field(writer, "Occupancy:", format!("{} min", m.occupancy_time_minutes))?;
    write_field(writer, "Utilization:", format!("{:.1}%", m.utilization_percentage))?;
    write_field(writer, "Units produced:", m.total_units_produced)?;
    write_field(writer, "Throughput:", format!("{:.1} units/h", m.throughput_rate))
}

fn write_snapshot<W: Write>(writer: &mut W, snapshot: &DashboardSnapshot) -> io::Result<()> {
    let f = &snapshot.factory;
    writeln!(
        writer,
        "Factory summary (as of {})",
        snapshot
            .last_updated
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    write_field(
        writer,
        "Productive time:",
        format!("{} min", f.total_productive_time_minutes),
    )?;
    write_field(writer, "Production:", format!("{} units", f.total_production_count))?;
    write_field(
        writer,
        "Production rate:",
        format!("{:.1} units/h", f.average_production_rate),
    )?;
    write_field(
        writer,
        "Avg utilization:",
        format!("{:.1}%", f.average_worker_utilization),
    )?;
    write_field(
        writer,
        "Active workers:",
        format!("{}/{}", f.active_workers, f.total_workers),
    )?;
    write_field(
        writer,
        "Occupied stations:",
        format!("{}/{}", f.occupied_stations, f.total_stations),
    )?;

    writeln!(writer)?;
    writeln!(writer, "Workers")?;
    if snapshot.workers.is_empty() {
        writeln!(writer, "(none)")?;
    } else {
        write_worker_row(
            writer,
            [
                "ID", "Name", "Status", "Active", "Idle", "Util%", "Units", "Units/h", "Station",
            ],
        )?;
        for w in &snapshot.workers {
            write_worker_row(
                writer,
                [
                    w.worker_id.as_str(),
                    &truncate(&w.name),
                    w.status.as_str(),
                    &w.total_active_time_minutes.to_string(),
                    &w.total_idle_time_minutes.to_string(),
                    &format!("{:.1}", w.utilization_percentage),
                    &w.total_units_produced.to_string(),
                    &format!("{:.1}", w.units_per_hour),
                    w.current_station.as_ref().map_or("-", StationId::as_str),
                ],
            )?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "Workstations")?;
    if snapshot.workstations.is_empty() {
        writeln!(writer, "(none)")?;
    } else {
        write_station_row(
            writer,
            [
                "ID", "Name", "Type", "Status", "Occupied", "Util%", "Units", "Units/h", "Worker",
            ],
        )?;
        for s in &snapshot.workstations {
            write_station_row(
                writer,
                [
                    s.station_id.as_str(),
                    &truncate(&s.name),
                    &s.kind,
                    s.status.as_str(),
                    &s.occupancy_time_minutes.to_string(),
                    &format!("{:.1}", s.utilization_percentage),
                    &s.total_units_produced.to_string(),
                    &format!("{:.1}", s.throughput_rate),
                    s.current_worker.as_ref().map_or("-", WorkerId::as_str),
                ],
            )?;
        }
    }
    Ok(())
}

fn write_worker_row<W: Write>(writer: &mut W, cells: [&str; 9]) -> io::Result<()> {
    let [id, name, status, active, idle, util, units, rate, station] = cells;
    writeln!(
        writer,
        "{id:<5} {name:<NAME_WIDTH$} {status:<7} {active:>6} {idle:>6} {util:>6} {units:>6} {rate:>7}  {station}"
    )
}

fn write_station_row<W: Write>(writer: &mut W, cells: [&str; 9]) -> io::Result<()> {
    let [id, name, kind, status, occupied, util, units, rate, worker] = cells;
    writeln!(
        writer,
        "{id:<5} {name:<NAME_WIDTH$} {kind:<10} {status:<8} {occupied:>8} {util:>6} {units:>6} {rate:>7}  {worker}"
    )
}

/// Truncate by characters, not bytes, to avoid panics on multi-byte UTF-8.
fn truncate(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        format!("{}...", name.chars().take(NAME_WIDTH - 3).collect::<String>())
    } else {
        name.to_string()
    }
}

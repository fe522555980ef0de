//! Status command for showing store contents and recent activity per worker.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use sf_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let counts = db.counts()?;

    writeln!(writer, "Shopfloor status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Workers: {}", counts.workers)?;
    writeln!(writer, "Workstations: {}", counts.workstations)?;
    writeln!(writer, "Events: {}", counts.events)?;

    let latest = db.last_event_times_by_worker()?;
    if latest.is_empty() {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Last event per worker:")?;
    for worker in latest {
        writeln!(writer, "- {}: {}", worker.worker_id, worker.last_event)?;
    }

    Ok(())
}

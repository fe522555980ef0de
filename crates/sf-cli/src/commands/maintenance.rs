//! Seed and reset commands.

use std::io::Write;

use anyhow::{Context, Result};

use sf_db::Database;

/// Replaces all data with the standard roster.
pub fn seed<W: Write>(writer: &mut W, db: &mut Database) -> Result<()> {
    let counts = db.seed_roster().context("failed to seed roster")?;
    writeln!(
        writer,
        "Seeded {} workers and {} workstations.",
        counts.workers, counts.workstations
    )?;
    Ok(())
}

/// Deletes every event, worker and workstation.
pub fn reset<W: Write>(writer: &mut W, db: &mut Database) -> Result<()> {
    let removed = db.reset().context("failed to reset store")?;
    writeln!(
        writer,
        "Removed {} events, {} workers and {} workstations.",
        removed.events, removed.workers, removed.workstations
    )?;
    Ok(())
}

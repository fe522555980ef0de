//! Import command for ingesting JSONL events into the local `SQLite` store.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use sf_core::EventInput;
use sf_db::{Database, DbError};

/// Reads JSONL events from `reader` and stores them as one batch.
///
/// Nothing is stored if any line is malformed or any event is rejected.
pub fn run<R: BufRead, W: Write>(reader: R, writer: &mut W, db: &mut Database) -> Result<usize> {
    let parsed = parse_events(reader)?;
    let inputs: Vec<EventInput> = parsed.iter().map(|(_, input)| input.clone()).collect();

    let stored = db.ingest_events(&inputs).map_err(|err| match err {
        DbError::BatchRejected { index, source } => {
            let line = parsed.get(index).map_or(index + 1, |(line, _)| *line);
            anyhow::Error::new(*source).context(format!("invalid event on line {line}"))
        }
        other => anyhow::Error::new(other).context("failed to import events"),
    })?;

    writeln!(writer, "Imported {} events.", stored.len())?;
    Ok(stored.len())
}

/// Parses non-blank lines, keeping the 1-based line number of each event.
fn parse_events<R: BufRead>(reader: R) -> Result<Vec<(usize, EventInput)>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let input: EventInput = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        events.push((idx + 1, input));
    }
    Ok(events)
}

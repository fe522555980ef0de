//! Events command for querying the event log as JSONL.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use sf_core::{EventFilter, EventType, StationId, WorkerId};
use sf_db::Database;

use super::util::parse_datetime;

/// Raw filter options from the command line.
#[derive(Debug, Clone, Default)]
pub struct EventsQuery<'a> {
    pub worker: Option<&'a str>,
    pub station: Option<&'a str>,
    pub event_type: Option<&'a str>,
    pub after: Option<&'a str>,
    pub before: Option<&'a str>,
}

impl EventsQuery<'_> {
    fn to_filter(&self, now: DateTime<Utc>) -> Result<EventFilter> {
        let start = self
            .after
            .map(|s| parse_datetime(s, now).context("invalid --after"))
            .transpose()?;
        let end = self
            .before
            .map(|s| parse_datetime(s, now).context("invalid --before"))
            .transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            anyhow::ensure!(start <= end, "--after must not be later than --before");
        }

        Ok(EventFilter {
            worker_id: self.worker.map(WorkerId::new).transpose()?,
            station_id: self.station.map(StationId::new).transpose()?,
            event_type: self
                .event_type
                .map(str::parse::<EventType>)
                .transpose()?,
            start,
            end,
        })
    }
}

/// Writes matching events, oldest first, one JSON object per line.
pub fn run<W: Write>(writer: &mut W, db: &Database, query: &EventsQuery<'_>) -> Result<usize> {
    let filter = query.to_filter(Utc::now())?;
    let events = db.get_events(&filter)?;
    for event in &events {
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
    }
    Ok(events.len())
}

//! Ingest command for recording a single observation.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use sf_core::EventInput;
use sf_db::Database;

/// Arguments for a single ingested event, as given on the command line.
#[derive(Debug, Clone)]
pub struct IngestArgs<'a> {
    pub worker: &'a str,
    pub station: &'a str,
    pub event_type: &'a str,
    pub confidence: f64,
    pub count: Option<i64>,
    pub timestamp: Option<&'a str>,
}

impl IngestArgs<'_> {
    fn into_input(self, now: DateTime<Utc>) -> EventInput {
        let timestamp = self.timestamp.map_or_else(
            || now.to_rfc3339_opts(SecondsFormat::Millis, true),
            str::to_string,
        );
        EventInput {
            timestamp: Some(timestamp),
            worker_id: Some(self.worker.to_string()),
            workstation_id: Some(self.station.to_string()),
            event_type: Some(self.event_type.to_string()),
            confidence: Some(self.confidence),
            count: self.count,
        }
    }
}

/// Validates and stores the event, then prints it as one JSON line.
pub fn run<W: Write>(writer: &mut W, db: &mut Database, args: IngestArgs<'_>) -> Result<()> {
    let input = args.into_input(Utc::now());
    let event = db.ingest_event(&input).context("event rejected")?;
    tracing::info!(event_id = %event.id, worker_id = %event.worker_id, "event stored");

    serde_json::to_writer(&mut *writer, &event)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use sf_core::{EventFilter, EventKind};

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.seed_roster().unwrap();
        db
    }

    #[test]
    fn ingest_prints_stored_event() {
        let mut db = seeded();
        let mut output = Vec::new();

        run(
            &mut output,
            &mut db,
            IngestArgs {
                worker: "W1",
                station: "S3",
                event_type: "product_count",
                confidence: 0.88,
                count: Some(4),
                timestamp: Some("2025-01-15T06:30:00Z"),
            },
        )
        .unwrap();

        let printed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(printed["worker_id"], "W1");
        assert_eq!(printed["workstation_id"], "S3");
        assert_eq!(printed["event_type"], "product_count");
        assert_eq!(printed["count"], 4);
        assert_eq!(printed["timestamp"], "2025-01-15T06:30:00Z");

        let stored = db.get_events(&EventFilter::default()).unwrap();
        assert_eq!(stored[0].kind, EventKind::ProductCount { count: 4 });
    }

    #[test]
    fn ingest_defaults_timestamp_to_now() {
        let mut db = seeded();
        let before = Utc::now();

        run(
            &mut Vec::new(),
            &mut db,
            IngestArgs {
                worker: "W2",
                station: "S2",
                event_type: "working",
                confidence: 0.95,
                count: None,
                timestamp: None,
            },
        )
        .unwrap();

        let stored = db.get_events(&EventFilter::default()).unwrap();
        // Stored with millisecond precision
        assert!(stored[0].timestamp >= before - chrono::Duration::milliseconds(1));
    }

    #[test]
    fn ingest_rejects_unknown_type() {
        let mut db = seeded();

        let err = run(
            &mut Vec::new(),
            &mut db,
            IngestArgs {
                worker: "W1",
                station: "S1",
                event_type: "broken",
                confidence: 0.9,
                count: None,
                timestamp: Some("2025-01-15T06:30:00Z"),
            },
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("invalid event_type: broken"));
        assert_eq!(db.counts().unwrap().events, 0);
    }
}

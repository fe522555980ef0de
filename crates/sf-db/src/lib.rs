//! Storage layer for shopfloor.
//!
//! Provides the append-only event log and the worker/workstation directory
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! This means a `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! For multi-threaded access, either:
//! - Use a `Mutex<Database>` to serialize access
//! - Use separate `Database` instances per thread
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in UTC RFC 3339 with millisecond precision
//! (e.g., `2025-01-15T10:30:00.000Z`). Every timestamp is normalized to this
//! exact shape on the way in, so lexicographic ordering matches chronological
//! ordering and range filters can compare strings.
//!
//! ## Event Ordering
//!
//! Events are always read back `ORDER BY timestamp, id`. Insertion order is
//! never relied upon.

use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use thiserror::Error;

use sf_core::{
    Confidence, Event, EventFilter, EventId, EventInput, EventKind, EventType, FactoryStore,
    NewEvent, StationId, ValidationError, Worker, WorkerId, Workstation,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The event payload failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The event references a worker that does not exist.
    #[error("worker {0} not found")]
    WorkerNotFound(String),
    /// The event references a workstation that does not exist.
    #[error("workstation {0} not found")]
    StationNotFound(String),
    /// One event of a batch was rejected; nothing from the batch was stored.
    #[error("event {index} of batch rejected: {source}")]
    BatchRejected {
        index: usize,
        #[source]
        source: Box<DbError>,
    },
    /// A stored row could not be decoded.
    #[error("corrupt {table} row {row}: {message}")]
    DataIntegrity {
        table: &'static str,
        row: String,
        message: String,
    },
}

impl DbError {
    /// Whether the error is caused by a missing worker or workstation.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::WorkerNotFound(_) | Self::StationNotFound(_) => true,
            Self::BatchRejected { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether the error is caused by a malformed payload.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::BatchRejected { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub workers: usize,
    pub workstations: usize,
    pub events: usize,
}

/// Latest event timestamp grouped by worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLastEvent {
    pub worker_id: String,
    pub last_event: String,
}

/// Standard roster installed by [`Database::seed_roster`].
pub const ROSTER_WORKERS: [(&str, &str); 6] = [
    ("W1", "Maria Garcia"),
    ("W2", "James Chen"),
    ("W3", "Sarah Johnson"),
    ("W4", "Michael Brown"),
    ("W5", "Emily Davis"),
    ("W6", "David Wilson"),
];

/// Standard stations installed by [`Database::seed_roster`].
pub const ROSTER_WORKSTATIONS: [(&str, &str, &str); 6] = [
    ("S1", "Assembly Line A", "Assembly"),
    ("S2", "Assembly Line B", "Assembly"),
    ("S3", "Quality Check 1", "QC"),
    ("S4", "Packaging Station", "Packaging"),
    ("S5", "Welding Bay", "Welding"),
    ("S6", "CNC Machine 1", "CNC"),
];

const EVENT_COLUMNS: &str =
    "id, timestamp, worker_id, workstation_id, event_type, confidence, count, created_at";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS workers (
                worker_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workstations (
                station_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Events table: append-only perception observations
            -- timestamp: normalized RFC 3339 UTC with milliseconds
            -- event_type: working | idle | absent | product_count
            -- count: units for product_count events, NULL otherwise
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                worker_id TEXT NOT NULL,
                workstation_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                count INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (worker_id) REFERENCES workers(worker_id),
                FOREIGN KEY (workstation_id) REFERENCES workstations(station_id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_worker ON events(worker_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_workstation ON events(workstation_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
            ",
        )?;
        Ok(())
    }

    // ========== Directory ==========

    /// Adds a worker. Fails if the ID is already taken.
    pub fn insert_worker(&self, worker: &Worker) -> Result<(), DbError> {
        insert_worker_row(&self.conn, worker)
    }

    /// Adds a workstation. Fails if the ID is already taken.
    pub fn insert_workstation(&self, station: &Workstation) -> Result<(), DbError> {
        insert_workstation_row(&self.conn, station)
    }

    pub fn get_worker(&self, worker_id: &WorkerId) -> Result<Option<Worker>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT worker_id, name, created_at FROM workers WHERE worker_id = ?",
                [worker_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, name, created_at)| worker_from_row(id, name, &created_at))
            .transpose()
    }

    pub fn get_workstation(&self, station_id: &StationId) -> Result<Option<Workstation>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT station_id, name, type, created_at FROM workstations WHERE station_id = ?",
                [station_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, name, kind, created_at)| station_from_row(id, name, kind, &created_at))
            .transpose()
    }

    /// Lists workers ordered by ID.
    pub fn list_workers(&self) -> Result<Vec<Worker>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT worker_id, name, created_at FROM workers ORDER BY worker_id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut workers = Vec::new();
        for row in rows {
            let (id, name, created_at) = row?;
            workers.push(worker_from_row(id, name, &created_at)?);
        }
        Ok(workers)
    }

    /// Lists workstations ordered by ID.
    pub fn list_workstations(&self) -> Result<Vec<Workstation>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT station_id, name, type, created_at FROM workstations ORDER BY station_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut stations = Vec::new();
        for row in rows {
            let (id, name, kind, created_at) = row?;
            stations.push(station_from_row(id, name, kind, &created_at)?);
        }
        Ok(stations)
    }

    // ========== Event log ==========

    /// Validates and appends one event.
    ///
    /// Nothing is written unless the payload is valid and both the worker
    /// and the workstation exist.
    pub fn ingest_event(&mut self, input: &EventInput) -> Result<Event, DbError> {
        let event = input.validate()?;
        check_references(&self.conn, &event)?;
        let created_at = Utc::now();
        let id = insert_event_row(&self.conn, &event, created_at)?;
        tracing::debug!(event_id = id, worker_id = %event.worker_id, "event ingested");
        Ok(stored_event(id, event, created_at))
    }

    /// Validates and appends a batch of events atomically.
    ///
    /// Either every event is stored or none is.
    pub fn ingest_events(&mut self, inputs: &[EventInput]) -> Result<Vec<Event>, DbError> {
        let created_at = Utc::now();
        let tx = self.conn.transaction()?;
        let mut stored = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let reject = |source: DbError| DbError::BatchRejected {
                index,
                source: Box::new(source),
            };
            let event = input.validate().map_err(|e| reject(e.into()))?;
            check_references(&tx, &event).map_err(reject)?;
            let id = insert_event_row(&tx, &event, created_at).map_err(reject)?;
            stored.push(stored_event(id, event, created_at));
        }
        tx.commit()?;
        tracing::debug!(count = stored.len(), "event batch ingested");
        Ok(stored)
    }

    /// Retrieves events matching `filter`, ordered by timestamp then ID.
    pub fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>, DbError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(worker_id) = &filter.worker_id {
            conditions.push("worker_id = ?");
            values.push(worker_id.to_string());
        }
        if let Some(station_id) = &filter.station_id {
            conditions.push("workstation_id = ?");
            values.push(station_id.to_string());
        }
        if let Some(event_type) = filter.event_type {
            conditions.push("event_type = ?");
            values.push(event_type.to_string());
        }
        if let Some(start) = filter.start {
            conditions.push("timestamp >= ?");
            values.push(format_timestamp(ceil_to_millis(start)));
        }
        if let Some(end) = filter.end {
            conditions.push("timestamp <= ?");
            values.push(format_timestamp(end));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events {where_clause} ORDER BY timestamp ASC, id ASC"
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(EventRow {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                worker_id: row.get(2)?,
                workstation_id: row.get(3)?,
                event_type: row.get(4)?,
                confidence: row.get(5)?,
                count: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        tracing::debug!(?filter, count = events.len(), "loaded events");
        Ok(events)
    }

    /// Lists the last event timestamp per worker, ordered by most recent.
    pub fn last_event_times_by_worker(&self) -> Result<Vec<WorkerLastEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT worker_id, MAX(timestamp) AS last_event
            FROM events
            GROUP BY worker_id
            ORDER BY last_event DESC, worker_id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WorkerLastEvent {
                worker_id: row.get(0)?,
                last_event: row.get(1)?,
            })
        })?;
        let mut workers = Vec::new();
        for row in rows {
            workers.push(row?);
        }
        Ok(workers)
    }

    /// Returns the number of rows in each table.
    pub fn counts(&self) -> Result<StoreCounts, DbError> {
        let count = |table: &str| -> Result<usize, DbError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(usize::try_from(n).unwrap_or_default())
        };
        Ok(StoreCounts {
            workers: count("workers")?,
            workstations: count("workstations")?,
            events: count("events")?,
        })
    }

    // ========== Bulk operations ==========

    /// Deletes every event, worker and workstation.
    pub fn reset(&mut self) -> Result<StoreCounts, DbError> {
        let before = self.counts()?;
        let tx = self.conn.transaction()?;
        clear_all(&tx)?;
        tx.commit()?;
        tracing::info!(
            events = before.events,
            workers = before.workers,
            workstations = before.workstations,
            "store reset"
        );
        Ok(before)
    }

    /// Replaces all data with the standard six-worker, six-station roster.
    ///
    /// No events are generated.
    pub fn seed_roster(&mut self) -> Result<StoreCounts, DbError> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        clear_all(&tx)?;
        for (id, name) in ROSTER_WORKERS {
            let worker = Worker {
                worker_id: WorkerId::new(id)?,
                name: name.to_string(),
                created_at: now,
            };
            insert_worker_row(&tx, &worker)?;
        }
        for (id, name, kind) in ROSTER_WORKSTATIONS {
            let station = Workstation {
                station_id: StationId::new(id)?,
                name: name.to_string(),
                kind: kind.to_string(),
                created_at: now,
            };
            insert_workstation_row(&tx, &station)?;
        }
        tx.commit()?;
        let counts = self.counts()?;
        tracing::info!(
            workers = counts.workers,
            workstations = counts.workstations,
            "roster seeded"
        );
        Ok(counts)
    }
}

impl FactoryStore for Database {
    type Error = DbError;

    fn get_worker(&self, worker_id: &WorkerId) -> Result<Option<Worker>, DbError> {
        Self::get_worker(self, worker_id)
    }

    fn get_workstation(&self, station_id: &StationId) -> Result<Option<Workstation>, DbError> {
        Self::get_workstation(self, station_id)
    }

    fn list_workers(&self) -> Result<Vec<Worker>, DbError> {
        Self::list_workers(self)
    }

    fn list_workstations(&self) -> Result<Vec<Workstation>, DbError> {
        Self::list_workstations(self)
    }

    fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>, DbError> {
        Self::get_events(self, filter)
    }
}

#[derive(Debug)]
struct EventRow {
    id: i64,
    timestamp: String,
    worker_id: String,
    workstation_id: String,
    event_type: String,
    confidence: f64,
    count: Option<i64>,
    created_at: String,
}

impl EventRow {
    fn into_event(self) -> Result<Event, DbError> {
        let corrupt = |message: String| DbError::DataIntegrity {
            table: "events",
            row: self.id.to_string(),
            message,
        };

        let event_type: EventType = self
            .event_type
            .parse()
            .map_err(|e: sf_core::UnknownEventType| corrupt(e.to_string()))?;
        let kind = match event_type {
            EventType::Working => EventKind::Working,
            EventType::Idle => EventKind::Idle,
            EventType::Absent => EventKind::Absent,
            EventType::ProductCount => {
                let count = u64::try_from(self.count.unwrap_or(0))
                    .map_err(|_| corrupt(format!("negative count {:?}", self.count)))?;
                EventKind::ProductCount { count }
            }
        };

        Ok(Event {
            id: EventId(self.id),
            timestamp: parse_timestamp(&self.timestamp).map_err(corrupt)?,
            worker_id: WorkerId::new(self.worker_id.as_str())
                .map_err(|e| corrupt(e.to_string()))?,
            station_id: StationId::new(self.workstation_id.as_str())
                .map_err(|e| corrupt(e.to_string()))?,
            kind,
            confidence: Confidence::new(self.confidence).map_err(|e| corrupt(e.to_string()))?,
            created_at: Some(parse_timestamp(&self.created_at).map_err(corrupt)?),
        })
    }
}

fn check_references(conn: &Connection, event: &NewEvent) -> Result<(), DbError> {
    let worker_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM workers WHERE worker_id = ?)",
        [event.worker_id.as_str()],
        |row| row.get(0),
    )?;
    if !worker_exists {
        return Err(DbError::WorkerNotFound(event.worker_id.to_string()));
    }
    let station_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM workstations WHERE station_id = ?)",
        [event.station_id.as_str()],
        |row| row.get(0),
    )?;
    if !station_exists {
        return Err(DbError::StationNotFound(event.station_id.to_string()));
    }
    Ok(())
}

fn insert_event_row(
    conn: &Connection,
    event: &NewEvent,
    created_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    let count = match event.kind {
        EventKind::ProductCount { count } => Some(i64::try_from(count).unwrap_or(i64::MAX)),
        _ => None,
    };
    conn.execute(
        "
        INSERT INTO events
        (timestamp, worker_id, workstation_id, event_type, confidence, count, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            format_timestamp(event.timestamp),
            event.worker_id.as_str(),
            event.station_id.as_str(),
            event.kind.event_type().as_str(),
            event.confidence.value(),
            count,
            format_timestamp(created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_worker_row(conn: &Connection, worker: &Worker) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO workers (worker_id, name, created_at) VALUES (?, ?, ?)",
        params![
            worker.worker_id.as_str(),
            worker.name,
            format_timestamp(worker.created_at),
        ],
    )?;
    Ok(())
}

fn insert_workstation_row(conn: &Connection, station: &Workstation) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO workstations (station_id, name, type, created_at) VALUES (?, ?, ?, ?)",
        params![
            station.station_id.as_str(),
            station.name,
            station.kind,
            format_timestamp(station.created_at),
        ],
    )?;
    Ok(())
}

fn clear_all(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        DELETE FROM events;
        DELETE FROM workers;
        DELETE FROM workstations;
        ",
    )?;
    Ok(())
}

fn stored_event(id: i64, event: NewEvent, created_at: DateTime<Utc>) -> Event {
    Event {
        id: EventId(id),
        timestamp: event.timestamp,
        worker_id: event.worker_id,
        station_id: event.station_id,
        kind: event.kind,
        confidence: event.confidence,
        created_at: Some(created_at),
    }
}

fn worker_from_row(id: String, name: String, created_at: &str) -> Result<Worker, DbError> {
    let corrupt = |message: String| DbError::DataIntegrity {
        table: "workers",
        row: id.clone(),
        message,
    };
    Ok(Worker {
        worker_id: WorkerId::new(id.as_str()).map_err(|e| corrupt(e.to_string()))?,
        name,
        created_at: parse_timestamp(created_at).map_err(corrupt)?,
    })
}

fn station_from_row(
    id: String,
    name: String,
    kind: String,
    created_at: &str,
) -> Result<Workstation, DbError> {
    let corrupt = |message: String| DbError::DataIntegrity {
        table: "workstations",
        row: id.clone(),
        message,
    };
    Ok(Workstation {
        station_id: StationId::new(id.as_str()).map_err(|e| corrupt(e.to_string()))?,
        name,
        kind,
        created_at: parse_timestamp(created_at).map_err(corrupt)?,
    })
}

fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {timestamp}: {e}"))
}

/// Rounds up to the storage resolution so an inclusive lower bound never
/// admits a stored event that precedes it.
fn ceil_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = timestamp.trunc_subsecs(3);
    if truncated == timestamp {
        timestamp
    } else {
        truncated + Duration::milliseconds(1)
    }
}

/// Formats a timestamp in the canonical storage form.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

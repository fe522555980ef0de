//! Observations emitted by the perception pipeline.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::EventType;
use crate::types::{Confidence, EventId, StationId, ValidationError, WorkerId};

/// What was observed. `ProductCount` carries the number of units completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    Working,
    Idle,
    Absent,
    ProductCount { count: u64 },
}

impl EventKind {
    #[must_use]
    pub const fn event_type(self) -> EventType {
        match self {
            Self::Working => EventType::Working,
            Self::Idle => EventType::Idle,
            Self::Absent => EventType::Absent,
            Self::ProductCount { .. } => EventType::ProductCount,
        }
    }

    /// Units credited by this observation.
    #[must_use]
    pub const fn units(self) -> u64 {
        match self {
            Self::ProductCount { count } => count,
            _ => 0,
        }
    }

    /// Whether this observation opens a timed state interval.
    #[must_use]
    pub const fn is_state(self) -> bool {
        !matches!(self, Self::ProductCount { .. })
    }
}

/// A stored, immutable observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub worker_id: WorkerId,
    #[serde(rename = "workstation_id")]
    pub station_id: StationId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub confidence: Confidence,
    /// When the event was appended to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A validated event that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub timestamp: DateTime<Utc>,
    pub worker_id: WorkerId,
    pub station_id: StationId,
    pub kind: EventKind,
    pub confidence: Confidence,
}

/// Raw ingestion payload, as received from the perception pipeline.
///
/// Every field is optional so that a missing field surfaces as a
/// [`ValidationError`] instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub workstation_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub count: Option<i64>,
}

impl EventInput {
    /// Validates the payload into a [`NewEvent`].
    ///
    /// Checks run in order: required fields, state label, confidence,
    /// unit count, then timestamp format. Entity existence is checked by
    /// the store. Timestamps are truncated to millisecond precision, the
    /// resolution events are stored at.
    pub fn validate(&self) -> Result<NewEvent, ValidationError> {
        let timestamp = required(self.timestamp.as_deref(), "timestamp")?;
        let worker_id = required(self.worker_id.as_deref(), "worker_id")?;
        let station_id = required(self.workstation_id.as_deref(), "workstation_id")?;
        let event_type: EventType = required(self.event_type.as_deref(), "event_type")?.parse()?;

        let confidence = self
            .confidence
            .ok_or(ValidationError::MissingField { field: "confidence" })
            .and_then(Confidence::new)?;

        let kind = match event_type {
            EventType::Working => EventKind::Working,
            EventType::Idle => EventKind::Idle,
            EventType::Absent => EventKind::Absent,
            EventType::ProductCount => {
                let count = self.count.ok_or(ValidationError::MissingCount)?;
                let count =
                    u64::try_from(count).map_err(|_| ValidationError::NegativeCount { value: count })?;
                EventKind::ProductCount { count }
            }
        };

        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: timestamp.to_string(),
            })?
            .with_timezone(&Utc)
            .trunc_subsecs(3);

        Ok(NewEvent {
            timestamp,
            worker_id: WorkerId::new(worker_id)?,
            station_id: StationId::new(station_id)?,
            kind,
            confidence,
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField { field }),
    }
}

/// Selection criteria for event retrieval. All criteria are conjunctive and
/// the time range is inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub worker_id: Option<WorkerId>,
    pub station_id: Option<StationId>,
    pub event_type: Option<EventType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn for_worker(worker_id: &WorkerId) -> Self {
        Self {
            worker_id: Some(worker_id.clone()),
            ..Self::default()
        }
    }

    pub fn for_station(station_id: &StationId) -> Self {
        Self {
            station_id: Some(station_id.clone()),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.worker_id.as_ref().is_none_or(|id| *id == event.worker_id)
            && self.station_id.as_ref().is_none_or(|id| *id == event.station_id)
            && self.event_type.is_none_or(|t| t == event.kind.event_type())
            && self.start.is_none_or(|start| event.timestamp >= start)
            && self.end.is_none_or(|end| event.timestamp <= end)
    }
}

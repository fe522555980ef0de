//! Workers and workstations tracked on the floor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{StationId, WorkerId};

/// A person observed by the perception pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: WorkerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A physical station a worker can occupy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workstation {
    pub station_id: StationId,
    pub name: String,
    /// Category label, e.g. `Assembly` or `QC`.
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(worker_id: WorkerId, name: impl Into<String>) -> Self {
        Self {
            worker_id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

impl Workstation {
    pub fn new(station_id: StationId, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            station_id,
            name: name.into(),
            kind: kind.into(),
            created_at: Utc::now(),
        }
    }
}

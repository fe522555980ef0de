//! The read interface the metrics engine consumes.

use crate::entity::{Worker, Workstation};
use crate::event::{Event, EventFilter};
use crate::types::{StationId, WorkerId};

/// Event source and entity directory.
///
/// Implementations must return events sorted by timestamp ascending (ties
/// broken by event id), independent of insertion order.
pub trait FactoryStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_worker(&self, worker_id: &WorkerId) -> Result<Option<Worker>, Self::Error>;

    fn get_workstation(&self, station_id: &StationId) -> Result<Option<Workstation>, Self::Error>;

    fn list_workers(&self) -> Result<Vec<Worker>, Self::Error>;

    fn list_workstations(&self) -> Result<Vec<Workstation>, Self::Error>;

    fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>, Self::Error>;
}

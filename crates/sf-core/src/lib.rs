//! Core domain logic for shopfloor.
//!
//! This crate contains the fundamental types and logic for:
//! - Reconstruction: turning sparse state observations into timed intervals
//! - Metrics: worker utilization, workstation occupancy and throughput
//! - Aggregation: rolling per-entity metrics into factory-wide totals

pub mod engine;
pub mod entity;
pub mod event;
pub mod event_type;
pub mod metrics;
mod reconstruct;
pub mod store;
pub mod types;

pub use engine::{MetricsEngine, MetricsError};
pub use entity::{Worker, Workstation};
pub use event::{Event, EventFilter, EventInput, EventKind, NewEvent};
pub use event_type::{EventType, UnknownEventType};
pub use metrics::{
    DEFAULT_SHIFT_MINUTES, DashboardSnapshot, FactoryMetrics, MetricsConfig, StationStatus,
    WorkerMetrics, WorkerStatus, WorkstationMetrics, aggregate_factory, compute_worker_metrics,
    compute_workstation_metrics,
};
pub use reconstruct::{
    ActivityState, Interval, ObservedEvent, Reconstruction, StateDurations, reconstruct,
};
pub use store::FactoryStore;
pub use types::{Confidence, EventId, StationId, ValidationError, WorkerId};

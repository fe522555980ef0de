//! Metrics engine bound to a store handle.
//!
//! The engine reads "now" once per request and recomputes everything from
//! the full event history. Nothing is cached between calls.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::EventFilter;
use crate::metrics::{
    DashboardSnapshot, FactoryMetrics, MetricsConfig, WorkerMetrics, WorkstationMetrics,
    aggregate_factory, compute_worker_metrics, compute_workstation_metrics,
};
use crate::store::FactoryStore;
use crate::types::{StationId, WorkerId};

/// Errors returned by metric lookups.
#[derive(Debug, Error)]
pub enum MetricsError<E> {
    /// The requested worker or workstation does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    /// The underlying store failed.
    #[error("event store error")]
    Store(#[source] E),
}

impl<E> MetricsError<E> {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Computes metrics against a borrowed store.
pub struct MetricsEngine<'a, S> {
    store: &'a S,
    config: MetricsConfig,
}

impl<'a, S: FactoryStore> MetricsEngine<'a, S> {
    pub const fn new(store: &'a S, config: MetricsConfig) -> Self {
        Self { store, config }
    }

    pub const fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn worker_metrics(
        &self,
        worker_id: &WorkerId,
    ) -> Result<WorkerMetrics, MetricsError<S::Error>> {
        self.worker_metrics_at(worker_id, Utc::now())
    }

    pub fn worker_metrics_at(
        &self,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<WorkerMetrics, MetricsError<S::Error>> {
        let worker = self
            .store
            .get_worker(worker_id)
            .map_err(MetricsError::Store)?
            .ok_or_else(|| MetricsError::NotFound {
                entity: "worker",
                id: worker_id.to_string(),
            })?;

        let events = self
            .store
            .get_events(&EventFilter::for_worker(worker_id))
            .map_err(MetricsError::Store)?;
        debug_assert!(events.is_sorted_by_key(|e| e.timestamp));
        tracing::debug!(%worker_id, event_count = events.len(), "computing worker metrics");

        Ok(compute_worker_metrics(&worker, &events, now))
    }

    pub fn workstation_metrics(
        &self,
        station_id: &StationId,
    ) -> Result<WorkstationMetrics, MetricsError<S::Error>> {
        self.workstation_metrics_at(station_id, Utc::now())
    }

    pub fn workstation_metrics_at(
        &self,
        station_id: &StationId,
        now: DateTime<Utc>,
    ) -> Result<WorkstationMetrics, MetricsError<S::Error>> {
        let station = self
            .store
            .get_workstation(station_id)
            .map_err(MetricsError::Store)?
            .ok_or_else(|| MetricsError::NotFound {
                entity: "workstation",
                id: station_id.to_string(),
            })?;

        let events = self
            .store
            .get_events(&EventFilter::for_station(station_id))
            .map_err(MetricsError::Store)?;
        debug_assert!(events.is_sorted_by_key(|e| e.timestamp));
        tracing::debug!(%station_id, event_count = events.len(), "computing workstation metrics");

        Ok(compute_workstation_metrics(
            &station,
            &events,
            now,
            &self.config,
        ))
    }

    pub fn factory_metrics(&self) -> Result<FactoryMetrics, MetricsError<S::Error>> {
        Ok(self.snapshot()?.factory)
    }

    /// Computes factory totals plus every worker and workstation row.
    pub fn snapshot(&self) -> Result<DashboardSnapshot, MetricsError<S::Error>> {
        self.snapshot_at(Utc::now())
    }

    /// Like [`snapshot`](Self::snapshot), evaluated at `now`.
    ///
    /// Entities that disappear between listing and lookup are skipped.
    pub fn snapshot_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DashboardSnapshot, MetricsError<S::Error>> {
        let workers = self.store.list_workers().map_err(MetricsError::Store)?;
        let stations = self.store.list_workstations().map_err(MetricsError::Store)?;

        let mut worker_metrics = Vec::with_capacity(workers.len());
        for worker in &workers {
            match self.worker_metrics_at(&worker.worker_id, now) {
                Ok(metrics) => worker_metrics.push(metrics),
                Err(err) if err.is_not_found() => {
                    tracing::warn!(worker_id = %worker.worker_id, "skipping worker: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        let mut station_metrics = Vec::with_capacity(stations.len());
        for station in &stations {
            match self.workstation_metrics_at(&station.station_id, now) {
                Ok(metrics) => station_metrics.push(metrics),
                Err(err) if err.is_not_found() => {
                    tracing::warn!(station_id = %station.station_id, "skipping workstation: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        let factory = aggregate_factory(
            &worker_metrics,
            &station_metrics,
            workers.len(),
            stations.len(),
        );

        Ok(DashboardSnapshot {
            factory,
            workers: worker_metrics,
            workstations: station_metrics,
            last_updated: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use chrono::{Duration, TimeZone};

    use crate::entity::{Worker, Workstation};
    use crate::event::{Event, EventKind};
    use crate::metrics::{StationStatus, WorkerStatus};
    use crate::types::{Confidence, EventId};

    #[derive(Default)]
    struct TestStore {
        workers: Vec<Worker>,
        stations: Vec<Workstation>,
        events: Vec<Event>,
        /// Listed by the directory but not resolvable by id.
        ghost_workers: Vec<Worker>,
    }

    impl FactoryStore for TestStore {
        type Error = Infallible;

        fn get_worker(&self, worker_id: &WorkerId) -> Result<Option<Worker>, Self::Error> {
            Ok(self
                .workers
                .iter()
                .find(|w| w.worker_id == *worker_id)
                .cloned())
        }

        fn get_workstation(
            &self,
            station_id: &StationId,
        ) -> Result<Option<Workstation>, Self::Error> {
            Ok(self
                .stations
                .iter()
                .find(|s| s.station_id == *station_id)
                .cloned())
        }

        fn list_workers(&self) -> Result<Vec<Worker>, Self::Error> {
            Ok(self
                .workers
                .iter()
                .chain(&self.ghost_workers)
                .cloned()
                .collect())
        }

        fn list_workstations(&self) -> Result<Vec<Workstation>, Self::Error> {
            Ok(self.stations.clone())
        }

        fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>, Self::Error> {
            let mut events: Vec<Event> = self
                .events
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect();
            events.sort_by_key(|e| (e.timestamp, e.id));
            Ok(events)
        }
    }

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 6, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn worker(id: &str) -> Worker {
        Worker {
            worker_id: WorkerId::new(id).unwrap(),
            name: format!("Worker {id}"),
            created_at: ts(0),
        }
    }

    fn station(id: &str) -> Workstation {
        Workstation {
            station_id: StationId::new(id).unwrap(),
            name: format!("Station {id}"),
            kind: "QC".to_string(),
            created_at: ts(0),
        }
    }

    fn event(id: i64, minutes: i64, worker: &str, station: &str, kind: EventKind) -> Event {
        Event {
            id: EventId(id),
            timestamp: ts(minutes),
            worker_id: WorkerId::new(worker).unwrap(),
            station_id: StationId::new(station).unwrap(),
            kind,
            confidence: Confidence::new(0.95).unwrap(),
            created_at: None,
        }
    }

    fn scenario_store() -> TestStore {
        TestStore {
            workers: vec![worker("W1"), worker("W2")],
            stations: vec![station("S1"), station("S2")],
            // Stored out of chronological order on purpose.
            events: vec![
                event(3, 45, "W1", "S1", EventKind::Idle),
                event(1, 0, "W1", "S1", EventKind::Working),
                event(2, 30, "W1", "S1", EventKind::ProductCount { count: 5 }),
                event(4, 10, "W2", "S2", EventKind::Working),
            ],
            ghost_workers: Vec::new(),
        }
    }

    #[test]
    fn worker_metrics_use_sorted_history() {
        let store = scenario_store();
        let engine = MetricsEngine::new(&store, MetricsConfig::default());

        let metrics = engine
            .worker_metrics_at(&WorkerId::new("W1").unwrap(), ts(75))
            .unwrap();

        assert_eq!(metrics.total_active_time_minutes, 45);
        assert_eq!(metrics.total_idle_time_minutes, 30);
        assert_eq!(metrics.total_units_produced, 5);
        assert!((metrics.utilization_percentage - 60.0).abs() < f64::EPSILON);
        assert_eq!(metrics.status, WorkerStatus::Idle);
    }

    #[test]
    fn unknown_worker_is_not_found() {
        let store = scenario_store();
        let engine = MetricsEngine::new(&store, MetricsConfig::default());

        let err = engine
            .worker_metrics(&WorkerId::new("W9").unwrap())
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "worker W9 not found");
    }

    #[test]
    fn unknown_workstation_is_not_found() {
        let store = scenario_store();
        let engine = MetricsEngine::new(&store, MetricsConfig::default());

        let err = engine
            .workstation_metrics(&StationId::new("S9").unwrap())
            .unwrap_err();

        assert_eq!(err.to_string(), "workstation S9 not found");
    }

    #[test]
    fn workstation_metrics_respect_configured_shift() {
        let store = scenario_store();
        let engine = MetricsEngine::new(&store, MetricsConfig { shift_minutes: 60 });

        let metrics = engine
            .workstation_metrics_at(&StationId::new("S2").unwrap(), ts(40))
            .unwrap();

        assert_eq!(metrics.occupancy_time_minutes, 30);
        assert!((metrics.utilization_percentage - 50.0).abs() < f64::EPSILON);
        assert_eq!(metrics.status, StationStatus::Occupied);
        assert_eq!(
            metrics.current_worker.as_ref().map(WorkerId::as_str),
            Some("W2")
        );
    }

    #[test]
    fn snapshot_folds_every_entity() {
        let store = scenario_store();
        let engine = MetricsEngine::new(&store, MetricsConfig::default());

        let snapshot = engine.snapshot_at(ts(75)).unwrap();

        assert_eq!(snapshot.last_updated, ts(75));
        assert_eq!(snapshot.workers.len(), 2);
        assert_eq!(snapshot.workstations.len(), 2);
        // W1: 45 working minutes, W2: 65 working minutes
        assert_eq!(snapshot.factory.total_productive_time_minutes, 110);
        assert_eq!(snapshot.factory.total_production_count, 5);
        assert_eq!(snapshot.factory.active_workers, 1);
        assert_eq!(snapshot.factory.occupied_stations, 2);
        assert_eq!(snapshot.factory.total_workers, 2);
        assert_eq!(snapshot.factory.total_stations, 2);
    }

    #[test]
    fn snapshot_skips_entities_that_fail_lookup() {
        let mut store = scenario_store();
        store.ghost_workers.push(worker("W7"));
        let engine = MetricsEngine::new(&store, MetricsConfig::default());

        let snapshot = engine.snapshot_at(ts(75)).unwrap();

        assert_eq!(snapshot.workers.len(), 2);
        assert!(
            snapshot
                .workers
                .iter()
                .all(|w| w.worker_id.as_str() != "W7")
        );
        assert_eq!(snapshot.factory.total_workers, 3);
    }

    #[test]
    fn empty_factory_snapshot_is_all_zero() {
        let store = TestStore::default();
        let engine = MetricsEngine::new(&store, MetricsConfig::default());

        let factory = engine.factory_metrics().unwrap();

        assert_eq!(factory, FactoryMetrics::default());
    }
}

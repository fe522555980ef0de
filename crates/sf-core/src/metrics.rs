//! Per-entity metrics and factory-wide aggregation.
//!
//! All functions here are pure: they take an entity's full event history
//! (sorted by timestamp ascending) and the instant to evaluate at.
//!
//! Worker utilization is normalized by tracked time, workstation utilization
//! by the configured shift length. The two are not comparable.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::{Worker, Workstation};
use crate::event::{Event, EventKind};
use crate::reconstruct::{ActivityState, reconstruct};
use crate::types::{StationId, WorkerId};

/// Default shift length used as the workstation utilization reference.
pub const DEFAULT_SHIFT_MINUTES: i64 = 8 * 60;

const WORKER_ACTIVE: &[ActivityState] = &[ActivityState::Working];
const WORKER_IDLE: &[ActivityState] = &[ActivityState::Idle, ActivityState::Absent];
const STATION_OCCUPIED: &[ActivityState] = &[ActivityState::Working, ActivityState::Idle];
const STATION_ACTIVE: &[ActivityState] = &[ActivityState::Working];

/// Configuration for metric derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Reference duration for workstation utilization, in minutes.
    /// Non-positive values yield 0% utilization.
    /// Default: 480 (8 hours).
    pub shift_minutes: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            shift_minutes: DEFAULT_SHIFT_MINUTES,
        }
    }
}

/// Live worker status, taken from the most recent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Active,
    Idle,
    Absent,
}

impl WorkerStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Absent => "absent",
        }
    }
}

/// Live workstation status, taken from the most recent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    Occupied,
    Vacant,
}

impl StationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Occupied => "occupied",
            Self::Vacant => "vacant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerMetrics {
    pub worker_id: WorkerId,
    pub name: String,
    pub total_active_time_minutes: i64,
    pub total_idle_time_minutes: i64,
    pub utilization_percentage: f64,
    pub total_units_produced: u64,
    pub units_per_hour: f64,
    pub status: WorkerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_station: Option<StationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkstationMetrics {
    pub station_id: StationId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub occupancy_time_minutes: i64,
    pub utilization_percentage: f64,
    pub total_units_produced: u64,
    /// Units per hour of occupancy.
    pub throughput_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_worker: Option<WorkerId>,
    pub status: StationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactoryMetrics {
    pub total_productive_time_minutes: i64,
    pub total_production_count: u64,
    /// Units per hour of productive time across all workers.
    pub average_production_rate: f64,
    pub average_worker_utilization: f64,
    pub active_workers: usize,
    pub total_workers: usize,
    pub occupied_stations: usize,
    pub total_stations: usize,
}

/// Everything the presentation layer needs, computed at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub factory: FactoryMetrics,
    pub workers: Vec<WorkerMetrics>,
    pub workstations: Vec<WorkstationMetrics>,
    pub last_updated: DateTime<Utc>,
}

/// Computes metrics for one worker from its full event history.
pub fn compute_worker_metrics(
    worker: &Worker,
    events: &[Event],
    now: DateTime<Utc>,
) -> WorkerMetrics {
    let reconstruction = reconstruct(events, now);
    let active_minutes = ms_to_minutes(reconstruction.durations.sum(WORKER_ACTIVE));
    let idle_minutes = ms_to_minutes(reconstruction.durations.sum(WORKER_IDLE));
    let units = reconstruction.total_units;

    let latest = events.last();
    let status = match latest.map(|e| e.kind) {
        Some(EventKind::Working) => WorkerStatus::Active,
        Some(EventKind::Idle) => WorkerStatus::Idle,
        _ => WorkerStatus::Absent,
    };

    WorkerMetrics {
        worker_id: worker.worker_id.clone(),
        name: worker.name.clone(),
        total_active_time_minutes: active_minutes,
        total_idle_time_minutes: idle_minutes,
        utilization_percentage: round1(percentage(active_minutes, active_minutes + idle_minutes)),
        total_units_produced: units,
        units_per_hour: round1(per_hour(units, active_minutes)),
        status,
        current_station: latest.map(|e| e.station_id.clone()),
    }
}

/// Computes metrics for one workstation from its full event history.
pub fn compute_workstation_metrics(
    station: &Workstation,
    events: &[Event],
    now: DateTime<Utc>,
    config: &MetricsConfig,
) -> WorkstationMetrics {
    let reconstruction = reconstruct(events, now);
    let occupancy_minutes = ms_to_minutes(reconstruction.durations.sum(STATION_OCCUPIED));
    let active_minutes = ms_to_minutes(reconstruction.durations.sum(STATION_ACTIVE));
    let units = reconstruction.total_units;

    let occupant = events
        .last()
        .filter(|e| matches!(e.kind, EventKind::Working | EventKind::Idle));

    WorkstationMetrics {
        station_id: station.station_id.clone(),
        name: station.name.clone(),
        kind: station.kind.clone(),
        occupancy_time_minutes: occupancy_minutes,
        utilization_percentage: round1(percentage(active_minutes, config.shift_minutes)),
        total_units_produced: units,
        throughput_rate: round1(per_hour(units, occupancy_minutes)),
        current_worker: occupant.map(|e| e.worker_id.clone()),
        status: if occupant.is_some() {
            StationStatus::Occupied
        } else {
            StationStatus::Vacant
        },
    }
}

/// Folds per-entity metrics into factory totals.
///
/// Production is counted from the worker view only. `total_workers` and
/// `total_stations` are the directory sizes, which may exceed the number of
/// metric rows if some entities were skipped.
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_factory(
    workers: &[WorkerMetrics],
    stations: &[WorkstationMetrics],
    total_workers: usize,
    total_stations: usize,
) -> FactoryMetrics {
    let total_productive_time_minutes: i64 =
        workers.iter().map(|w| w.total_active_time_minutes).sum();
    let total_production_count = workers
        .iter()
        .map(|w| w.total_units_produced)
        .fold(0u64, u64::saturating_add);

    let average_worker_utilization = if workers.is_empty() {
        0.0
    } else {
        workers.iter().map(|w| w.utilization_percentage).sum::<f64>() / workers.len() as f64
    };

    FactoryMetrics {
        total_productive_time_minutes,
        total_production_count,
        average_production_rate: round1(per_hour(
            total_production_count,
            total_productive_time_minutes,
        )),
        average_worker_utilization: round1(average_worker_utilization),
        active_workers: workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Active)
            .count(),
        total_workers,
        occupied_stations: stations
            .iter()
            .filter(|s| s.status == StationStatus::Occupied)
            .count(),
        total_stations,
    }
}

/// Converts milliseconds to whole minutes, rounding half up.
pub const fn ms_to_minutes(ms: i64) -> i64 {
    (ms + 30_000).div_euclid(60_000)
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part_minutes: i64, whole_minutes: i64) -> f64 {
    if whole_minutes <= 0 {
        return 0.0;
    }
    part_minutes as f64 / whole_minutes as f64 * 100.0
}

#[allow(clippy::cast_precision_loss)]
fn per_hour(units: u64, minutes: i64) -> f64 {
    if minutes <= 0 {
        return 0.0;
    }
    units as f64 / (minutes as f64 / 60.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::types::{Confidence, EventId};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 6, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn event(id: i64, minutes: i64, worker: &str, station: &str, kind: EventKind) -> Event {
        Event {
            id: EventId(id),
            timestamp: ts(minutes),
            worker_id: WorkerId::new(worker).unwrap(),
            station_id: StationId::new(station).unwrap(),
            kind,
            confidence: Confidence::new(0.9).unwrap(),
            created_at: None,
        }
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
            kind: "Assembly".to_string(),
            created_at: ts(0),
        }
    }

    #[test]
    fn ms_to_minutes_rounds_half_up() {
        assert_eq!(ms_to_minutes(0), 0);
        assert_eq!(ms_to_minutes(29_999), 0);
        assert_eq!(ms_to_minutes(30_000), 1);
        assert_eq!(ms_to_minutes(89_999), 1);
        assert_eq!(ms_to_minutes(90_000), 2);
    }

    #[test]
    fn worker_scenario_count_extends_working_interval() {
        let events = vec![
            event(1, 0, "W1", "S1", EventKind::Working),
            event(2, 30, "W1", "S1", EventKind::ProductCount { count: 5 }),
            event(3, 45, "W1", "S1", EventKind::Idle),
        ];

        let metrics = compute_worker_metrics(&worker("W1"), &events, ts(75));

        assert_eq!(metrics.total_active_time_minutes, 45);
        assert_eq!(metrics.total_idle_time_minutes, 30);
        assert_eq!(metrics.total_units_produced, 5);
        assert!((metrics.utilization_percentage - 60.0).abs() < f64::EPSILON);
        assert!((metrics.units_per_hour - 6.7).abs() < f64::EPSILON);
        assert_eq!(metrics.status, WorkerStatus::Idle);
        assert_eq!(metrics.current_station.as_ref().map(StationId::as_str), Some("S1"));
    }

    #[test]
    fn worker_without_events_is_absent_and_zeroed() {
        let metrics = compute_worker_metrics(&worker("W2"), &[], ts(60));

        assert_eq!(metrics.total_active_time_minutes, 0);
        assert_eq!(metrics.total_idle_time_minutes, 0);
        assert_eq!(metrics.total_units_produced, 0);
        assert!(metrics.utilization_percentage.abs() < f64::EPSILON);
        assert!(metrics.units_per_hour.abs() < f64::EPSILON);
        assert_eq!(metrics.status, WorkerStatus::Absent);
        assert!(metrics.current_station.is_none());
    }

    #[test]
    fn worker_absent_time_counts_as_idle() {
        let events = vec![
            event(1, 0, "W1", "S1", EventKind::Working),
            event(2, 30, "W1", "S1", EventKind::Absent),
        ];

        let metrics = compute_worker_metrics(&worker("W1"), &events, ts(40));

        assert_eq!(metrics.total_active_time_minutes, 30);
        assert_eq!(metrics.total_idle_time_minutes, 10);
        assert!((metrics.utilization_percentage - 75.0).abs() < f64::EPSILON);
        assert_eq!(metrics.status, WorkerStatus::Absent);
    }

    #[test]
    fn worker_status_follows_latest_event_not_totals() {
        let events = vec![
            event(1, 0, "W1", "S1", EventKind::Working),
            event(2, 100, "W1", "S2", EventKind::Idle),
        ];

        let metrics = compute_worker_metrics(&worker("W1"), &events, ts(101));

        assert!(metrics.utilization_percentage > 90.0);
        assert_eq!(metrics.status, WorkerStatus::Idle);
        assert_eq!(metrics.current_station.as_ref().map(StationId::as_str), Some("S2"));
    }

    #[test]
    fn worker_latest_count_event_reports_absent() {
        let events = vec![
            event(1, 0, "W1", "S1", EventKind::Working),
            event(2, 10, "W1", "S1", EventKind::ProductCount { count: 2 }),
        ];

        let metrics = compute_worker_metrics(&worker("W1"), &events, ts(20));

        assert_eq!(metrics.total_active_time_minutes, 20);
        assert_eq!(metrics.status, WorkerStatus::Absent);
    }

    #[test]
    fn lone_count_event_credits_units_only() {
        let events = vec![event(1, 0, "W1", "S1", EventKind::ProductCount { count: 3 })];

        let metrics = compute_worker_metrics(&worker("W1"), &events, ts(30));

        assert_eq!(metrics.total_units_produced, 3);
        assert_eq!(metrics.total_active_time_minutes, 0);
        assert_eq!(metrics.total_idle_time_minutes, 0);
        assert!(metrics.units_per_hour.abs() < f64::EPSILON);
    }

    #[test]
    fn appending_working_after_idle_does_not_lower_active_share() {
        let mut events = vec![
            event(1, 0, "W1", "S1", EventKind::Working),
            event(2, 20, "W1", "S1", EventKind::Idle),
        ];
        let before = compute_worker_metrics(&worker("W1"), &events, ts(40));

        events.push(event(3, 40, "W1", "S1", EventKind::Working));
        let after = compute_worker_metrics(&worker("W1"), &events, ts(60));

        assert!(after.utilization_percentage >= before.utilization_percentage);
    }

    #[test]
    fn recomputation_at_same_instant_is_stable() {
        let events = vec![
            event(1, 0, "W1", "S1", EventKind::Working),
            event(2, 7, "W1", "S1", EventKind::ProductCount { count: 1 }),
            event(3, 19, "W1", "S1", EventKind::Idle),
        ];

        let first = compute_worker_metrics(&worker("W1"), &events, ts(33));
        let second = compute_worker_metrics(&worker("W1"), &events, ts(33));

        assert_eq!(first, second);
    }

    #[test]
    fn station_occupancy_includes_idle_but_not_absent() {
        let events = vec![
            event(1, 0, "W1", "S1", EventKind::Working),
            event(2, 60, "W1", "S1", EventKind::Idle),
            event(3, 90, "W1", "S1", EventKind::ProductCount { count: 12 }),
            event(4, 120, "W1", "S1", EventKind::Absent),
        ];
        let config = MetricsConfig::default();

        let metrics = compute_workstation_metrics(&station("S1"), &events, ts(180), &config);

        assert_eq!(metrics.occupancy_time_minutes, 120);
        // 60 working minutes out of a 480 minute shift
        assert!((metrics.utilization_percentage - 12.5).abs() < f64::EPSILON);
        assert!((metrics.throughput_rate - 6.0).abs() < f64::EPSILON);
        assert_eq!(metrics.total_units_produced, 12);
        assert_eq!(metrics.status, StationStatus::Vacant);
        assert!(metrics.current_worker.is_none());
    }

    #[test]
    fn station_utilization_uses_configured_shift() {
        let events = vec![event(1, 0, "W1", "S1", EventKind::Working)];
        let config = MetricsConfig { shift_minutes: 240 };

        let metrics = compute_workstation_metrics(&station("S1"), &events, ts(60), &config);

        assert!((metrics.utilization_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(metrics.status, StationStatus::Occupied);
        assert_eq!(metrics.current_worker.as_ref().map(WorkerId::as_str), Some("W1"));
    }

    #[test]
    fn station_zero_shift_yields_zero_utilization() {
        let events = vec![event(1, 0, "W1", "S1", EventKind::Working)];
        let config = MetricsConfig { shift_minutes: 0 };

        let metrics = compute_workstation_metrics(&station("S1"), &events, ts(60), &config);

        assert!(metrics.utilization_percentage.abs() < f64::EPSILON);
        assert_eq!(metrics.occupancy_time_minutes, 60);
    }

    #[test]
    fn station_idle_occupant_keeps_station_occupied() {
        let events = vec![
            event(1, 0, "W2", "S3", EventKind::Working),
            event(2, 5, "W2", "S3", EventKind::Idle),
        ];

        let metrics =
            compute_workstation_metrics(&station("S3"), &events, ts(10), &MetricsConfig::default());

        assert_eq!(metrics.status, StationStatus::Occupied);
        assert_eq!(metrics.current_worker.as_ref().map(WorkerId::as_str), Some("W2"));
    }

    #[test]
    fn station_without_events_is_vacant() {
        let metrics =
            compute_workstation_metrics(&station("S4"), &[], ts(10), &MetricsConfig::default());

        assert_eq!(metrics.occupancy_time_minutes, 0);
        assert!(metrics.utilization_percentage.abs() < f64::EPSILON);
        assert!(metrics.throughput_rate.abs() < f64::EPSILON);
        assert_eq!(metrics.status, StationStatus::Vacant);
    }

    #[test]
    fn factory_with_no_entities_is_all_zero() {
        let factory = aggregate_factory(&[], &[], 0, 0);
        assert_eq!(factory, FactoryMetrics::default());
    }

    #[test]
    fn factory_folds_worker_and_station_metrics() {
        let w1 = compute_worker_metrics(
            &worker("W1"),
            &[
                event(1, 0, "W1", "S1", EventKind::Working),
                event(2, 20, "W1", "S1", EventKind::ProductCount { count: 6 }),
                event(5, 30, "W1", "S1", EventKind::Working),
            ],
            ts(60),
        );
        let w2 = compute_worker_metrics(
            &worker("W2"),
            &[
                event(3, 0, "W2", "S2", EventKind::Working),
                event(4, 30, "W2", "S2", EventKind::Idle),
            ],
            ts(60),
        );
        let w3 = compute_worker_metrics(&worker("W3"), &[], ts(60));
        let s1 = compute_workstation_metrics(
            &station("S1"),
            &[event(1, 0, "W1", "S1", EventKind::Working)],
            ts(60),
            &MetricsConfig::default(),
        );
        let s2 = compute_workstation_metrics(&station("S2"), &[], ts(60), &MetricsConfig::default());

        let factory = aggregate_factory(&[w1, w2, w3], &[s1, s2], 3, 2);

        assert_eq!(factory.total_productive_time_minutes, 90);
        assert_eq!(factory.total_production_count, 6);
        assert!((factory.average_production_rate - 4.0).abs() < f64::EPSILON);
        // (100 + 50 + 0) / 3
        assert!((factory.average_worker_utilization - 50.0).abs() < f64::EPSILON);
        assert_eq!(factory.active_workers, 1);
        assert_eq!(factory.total_workers, 3);
        assert_eq!(factory.occupied_stations, 1);
        assert_eq!(factory.total_stations, 2);
    }

    #[test]
    fn factory_production_total_saturates() {
        let huge = EventKind::ProductCount {
            count: u64::try_from(i64::MAX).unwrap(),
        };
        let w1 = compute_worker_metrics(
            &worker("W1"),
            &[
                event(1, 0, "W1", "S1", huge),
                event(2, 1, "W1", "S1", huge),
                event(3, 2, "W1", "S1", huge),
            ],
            ts(60),
        );
        let w2 = compute_worker_metrics(
            &worker("W2"),
            &[event(4, 0, "W2", "S2", EventKind::ProductCount { count: 1 })],
            ts(60),
        );
        assert_eq!(w1.total_units_produced, u64::MAX);

        let factory = aggregate_factory(&[w1, w2], &[], 2, 0);

        assert_eq!(factory.total_production_count, u64::MAX);
    }

    #[test]
    fn metrics_serialize_with_wire_names() {
        let metrics =
            compute_workstation_metrics(&station("S1"), &[], ts(0), &MetricsConfig::default());
        let value = serde_json::to_value(&metrics).unwrap();

        assert_eq!(value["type"], "Assembly");
        assert_eq!(value["status"], "vacant");
        assert!(value.get("current_worker").is_none());
    }
}

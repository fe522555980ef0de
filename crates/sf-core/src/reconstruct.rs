//! Interval reconstruction.
//!
//! Turns a sparse, point-in-time observation log for one entity into
//! contiguous state intervals.
//!
//! # Algorithm Summary
//!
//! 1. Each state observation (`working`, `idle`, `absent`) opens an interval
//!    that lasts until the next state observation, or until `now` for the
//!    last one.
//! 2. `product_count` observations only add to the unit tally. They neither
//!    open nor close an interval.
//! 3. Durations are summed per state; consumers decide which states count
//!    as active, idle or occupied time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{Event, EventKind};

/// An event suitable for interval reconstruction.
///
/// This trait lets reconstruction run over stored events or test fixtures.
pub trait ObservedEvent {
    /// Returns the event's timestamp.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Returns what was observed.
    fn kind(&self) -> EventKind;
}

impl ObservedEvent for Event {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn kind(&self) -> EventKind {
        self.kind
    }
}

/// A timed state. `product_count` has no counterpart because it has no
/// duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Working,
    Idle,
    Absent,
}

impl ActivityState {
    const fn from_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Working => Some(Self::Working),
            EventKind::Idle => Some(Self::Idle),
            EventKind::Absent => Some(Self::Absent),
            EventKind::ProductCount { .. } => None,
        }
    }
}

/// A span during which an entity's state is assumed constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub state: ActivityState,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

/// Accumulated milliseconds per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateDurations {
    pub working_ms: i64,
    pub idle_ms: i64,
    pub absent_ms: i64,
}

impl StateDurations {
    pub const fn get(&self, state: ActivityState) -> i64 {
        match state {
            ActivityState::Working => self.working_ms,
            ActivityState::Idle => self.idle_ms,
            ActivityState::Absent => self.absent_ms,
        }
    }

    /// Sums the durations of the given states.
    pub fn sum(&self, states: &[ActivityState]) -> i64 {
        states.iter().map(|state| self.get(*state)).sum()
    }

    pub const fn total_ms(&self) -> i64 {
        self.working_ms + self.idle_ms + self.absent_ms
    }

    const fn add(&mut self, state: ActivityState, ms: i64) {
        match state {
            ActivityState::Working => self.working_ms += ms,
            ActivityState::Idle => self.idle_ms += ms,
            ActivityState::Absent => self.absent_ms += ms,
        }
    }
}

/// Result of reconstructing one entity's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconstruction {
    /// Non-overlapping intervals in chronological order.
    pub intervals: Vec<Interval>,
    pub durations: StateDurations,
    pub total_units: u64,
}

impl Reconstruction {
    fn close(&mut self, state: ActivityState, start: DateTime<Utc>, end: DateTime<Utc>) {
        let interval = Interval {
            state,
            start,
            end: end.max(start),
        };
        self.durations.add(state, interval.duration_ms());
        self.intervals.push(interval);
    }
}

/// Reconstructs state intervals for one entity.
///
/// Events must be sorted by timestamp ascending and belong to a single
/// worker or workstation. The last state interval is closed at `now`; if
/// `now` precedes it the interval is empty.
pub fn reconstruct<E: ObservedEvent>(events: &[E], now: DateTime<Utc>) -> Reconstruction {
    let mut result = Reconstruction::default();
    let mut open: Option<(ActivityState, DateTime<Utc>)> = None;

    for event in events {
        let kind = event.kind();
        let Some(state) = ActivityState::from_kind(kind) else {
            result.total_units = result.total_units.saturating_add(kind.units());
            continue;
        };

        let timestamp = event.timestamp();
        if let Some((open_state, start)) = open.take() {
            result.close(open_state, start, timestamp);
        }
        open = Some((state, timestamp));
    }

    if let Some((state, start)) = open {
        result.close(state, start, now);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Test event implementation.
    struct TestEvent {
        timestamp: DateTime<Utc>,
        kind: EventKind,
    }

    impl TestEvent {
        fn working(ts: DateTime<Utc>) -> Self {
            Self {
                timestamp: ts,
                kind: EventKind::Working,
            }
        }

        fn idle(ts: DateTime<Utc>) -> Self {
            Self {
                timestamp: ts,
                kind: EventKind::Idle,
            }
        }

        fn absent(ts: DateTime<Utc>) -> Self {
            Self {
                timestamp: ts,
                kind: EventKind::Absent,
            }
        }

        fn count(ts: DateTime<Utc>, count: u64) -> Self {
            Self {
                timestamp: ts,
                kind: EventKind::ProductCount { count },
            }
        }
    }

    impl ObservedEvent for TestEvent {
        fn timestamp(&self) -> DateTime<Utc> {
            self.timestamp
        }

        fn kind(&self) -> EventKind {
            self.kind
        }
    }

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 6, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    const MINUTE: i64 = 60 * 1000;

    #[test]
    fn test_empty_events() {
        let events: Vec<TestEvent> = vec![];
        let result = reconstruct(&events, ts(10));

        assert!(result.intervals.is_empty());
        assert_eq!(result.durations, StateDurations::default());
        assert_eq!(result.total_units, 0);
    }

    #[test]
    fn test_single_event_is_open_until_now() {
        let events = vec![TestEvent::idle(ts(0))];
        let result = reconstruct(&events, ts(25));

        assert_eq!(result.intervals.len(), 1);
        assert_eq!(result.intervals[0].end, ts(25));
        assert_eq!(result.durations.idle_ms, 25 * MINUTE);
        assert_eq!(result.durations.working_ms, 0);
    }

    #[test]
    fn test_count_does_not_split_working_interval() {
        let events = vec![
            TestEvent::working(ts(0)),
            TestEvent::count(ts(30), 5),
            TestEvent::idle(ts(45)),
        ];
        let result = reconstruct(&events, ts(75));

        assert_eq!(result.durations.working_ms, 45 * MINUTE);
        assert_eq!(result.durations.idle_ms, 30 * MINUTE);
        assert_eq!(result.total_units, 5);
        assert_eq!(
            result.intervals,
            vec![
                Interval {
                    state: ActivityState::Working,
                    start: ts(0),
                    end: ts(45),
                },
                Interval {
                    state: ActivityState::Idle,
                    start: ts(45),
                    end: ts(75),
                },
            ]
        );
    }

    #[test]
    fn test_lone_count_has_no_duration() {
        let events = vec![TestEvent::count(ts(10), 3)];
        let result = reconstruct(&events, ts(60));

        assert!(result.intervals.is_empty());
        assert_eq!(result.durations.total_ms(), 0);
        assert_eq!(result.total_units, 3);
    }

    #[test]
    fn test_count_before_first_state_is_not_timed() {
        let events = vec![TestEvent::count(ts(0), 2), TestEvent::working(ts(10))];
        let result = reconstruct(&events, ts(20));

        assert_eq!(result.durations.working_ms, 10 * MINUTE);
        assert_eq!(result.durations.total_ms(), 10 * MINUTE);
        assert_eq!(result.total_units, 2);
    }

    #[test]
    fn test_total_equals_gaps_plus_open_interval() {
        let plain = vec![
            TestEvent::working(ts(0)),
            TestEvent::idle(ts(12)),
            TestEvent::absent(ts(20)),
            TestEvent::working(ts(33)),
        ];
        let interleaved = vec![
            TestEvent::working(ts(0)),
            TestEvent::count(ts(5), 1),
            TestEvent::count(ts(9), 2),
            TestEvent::idle(ts(12)),
            TestEvent::absent(ts(20)),
            TestEvent::count(ts(30), 4),
            TestEvent::working(ts(33)),
            TestEvent::count(ts(50), 1),
        ];
        let now = ts(61);

        let expected = 61 * MINUTE;
        let plain_result = reconstruct(&plain, now);
        let interleaved_result = reconstruct(&interleaved, now);

        assert_eq!(plain_result.durations.total_ms(), expected);
        assert_eq!(interleaved_result.durations, plain_result.durations);
        assert_eq!(interleaved_result.total_units, 8);
    }

    #[test]
    fn test_durations_per_state() {
        let events = vec![
            TestEvent::working(ts(0)),
            TestEvent::absent(ts(10)),
            TestEvent::idle(ts(15)),
            TestEvent::working(ts(18)),
        ];
        let result = reconstruct(&events, ts(30));

        assert_eq!(result.durations.working_ms, 22 * MINUTE);
        assert_eq!(result.durations.absent_ms, 5 * MINUTE);
        assert_eq!(result.durations.idle_ms, 3 * MINUTE);
        assert_eq!(
            result
                .durations
                .sum(&[ActivityState::Idle, ActivityState::Absent]),
            8 * MINUTE
        );
    }

    #[test]
    fn test_open_interval_grows_with_now() {
        let events = vec![TestEvent::working(ts(0))];
        let earlier = reconstruct(&events, ts(10));
        let later = reconstruct(&events, ts(11));

        assert!(later.durations.working_ms > earlier.durations.working_ms);
    }

    #[test]
    fn test_now_before_last_event_yields_empty_interval() {
        let events = vec![TestEvent::idle(ts(0)), TestEvent::working(ts(30))];
        let result = reconstruct(&events, ts(20));

        assert_eq!(result.durations.idle_ms, 30 * MINUTE);
        assert_eq!(result.durations.working_ms, 0);
        assert_eq!(result.intervals[1].start, result.intervals[1].end);
    }
}

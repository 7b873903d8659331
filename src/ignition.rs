// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Ignition state tracking.
//!
//! Two passes over the classified stream:
//!
//! - [`IgnitionTracker::track`] folds a [`TrackerState`] accumulator through
//!   the events and measures the cadence of periodic reports against the
//!   last ignition boundary or the previous report of the same mode.
//! - [`pair_cycles`] matches each ignition-on with the first ignition-off
//!   strictly after it and strictly before the next ignition-on.

use crate::classifier::{Category, ClassifiedEvent, PeriodicKind};
use crate::policy::CadenceConfig;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};

/// Coarse ignition state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IgnitionState {
    /// No boundary seen yet
    #[default]
    Unknown,
    On,
    Off,
}

/// An ignition boundary observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub timestamp: NaiveDateTime,
    pub line: usize,
    pub odometer: Option<f64>,
}

impl Boundary {
    fn of(event: &ClassifiedEvent<'_>) -> Self {
        Self {
            timestamp: event.record.event_time,
            line: event.record.line,
            odometer: event.record.odometer,
        }
    }
}

/// Accumulator threaded through the tracking pass
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackerState {
    pub state: IgnitionState,
    pub last_on: Option<Boundary>,
    pub last_off: Option<Boundary>,
    /// Timestamp of the last moving periodic report since ignition-on.
    pub moving_marker: Option<NaiveDateTime>,
    /// Timestamp of the last economy periodic report since ignition-off.
    pub economy_marker: Option<NaiveDateTime>,
}

/// A measured interval between periodic reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceInterval {
    /// Timestamp of the report that closes the interval.
    pub timestamp: NaiveDateTime,
    /// Source line of that report.
    pub line: usize,
    /// Moving (on-interval) or Economy (off-interval).
    pub kind: PeriodicKind,
    /// Seconds since the previous report of the same mode, or since the
    /// boundary when it is the first report after one.
    pub measured_secs: i64,
    pub expected_secs: i64,
    /// Whether the interval deviates from the expected cadence.
    pub anomalous: bool,
}

/// Pure transition function.
///
/// Returns the next state and, for periodic reports with a reference point,
/// the measured interval.
pub fn step(
    acc: TrackerState,
    event: &ClassifiedEvent<'_>,
    cadence: &CadenceConfig,
) -> (TrackerState, Option<CadenceInterval>) {
    let now = event.record.event_time;
    match &event.category {
        Category::IgnitionOn => (
            TrackerState {
                state: IgnitionState::On,
                last_on: Some(Boundary::of(event)),
                moving_marker: None,
                ..acc
            },
            None,
        ),
        Category::IgnitionOff => (
            TrackerState {
                state: IgnitionState::Off,
                last_off: Some(Boundary::of(event)),
                economy_marker: None,
                ..acc
            },
            None,
        ),
        Category::PeriodicReport(PeriodicKind::Moving) => {
            let reference = acc.moving_marker.or(acc.last_on.map(|b| b.timestamp));
            let interval = reference.map(|r| interval(event, r, PeriodicKind::Moving, cadence));
            (
                TrackerState {
                    moving_marker: Some(now),
                    ..acc
                },
                interval,
            )
        }
        Category::PeriodicReport(PeriodicKind::Economy) => {
            let reference = acc.economy_marker.or(acc.last_off.map(|b| b.timestamp));
            let interval = reference.map(|r| interval(event, r, PeriodicKind::Economy, cadence));
            (
                TrackerState {
                    economy_marker: Some(now),
                    ..acc
                },
                interval,
            )
        }
        _ => (acc, None),
    }
}

fn interval(
    event: &ClassifiedEvent<'_>,
    reference: NaiveDateTime,
    kind: PeriodicKind,
    cadence: &CadenceConfig,
) -> CadenceInterval {
    let measured_secs = (event.record.event_time - reference).num_seconds();
    // Only Moving and Economy reach here, both have an expected cadence.
    let expected_secs = cadence.expected_secs(kind).unwrap_or_default();
    CadenceInterval {
        timestamp: event.record.event_time,
        line: event.record.line,
        kind,
        measured_secs,
        expected_secs,
        anomalous: cadence.is_anomalous(measured_secs, expected_secs),
    }
}

/// Result of the tracking pass
#[derive(Debug, Clone, Default)]
pub struct TrackingResult {
    /// Every measured interval, in stream order.
    pub intervals: Vec<CadenceInterval>,
    /// State after the last event.
    pub final_state: TrackerState,
}

impl TrackingResult {
    /// Intervals that deviate from the expected cadence.
    pub fn anomalies(&self) -> impl Iterator<Item = &CadenceInterval> {
        self.intervals.iter().filter(|i| i.anomalous)
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies().count()
    }
}

/// Ignition state tracker
#[derive(Debug, Clone, Default)]
pub struct IgnitionTracker {
    cadence: CadenceConfig,
}

impl IgnitionTracker {
    pub fn new(cadence: CadenceConfig) -> Self {
        Self { cadence }
    }

    pub fn cadence(&self) -> &CadenceConfig {
        &self.cadence
    }

    /// Run the tracking pass over chronologically ordered events.
    pub fn track(&self, events: &[ClassifiedEvent<'_>]) -> TrackingResult {
        let (final_state, intervals) = events.iter().fold(
            (TrackerState::default(), Vec::new()),
            |(acc, mut intervals), event| {
                let (next, interval) = step(acc, event, &self.cadence);
                intervals.extend(interval);
                (next, intervals)
            },
        );
        let result = TrackingResult {
            intervals,
            final_state,
        };
        debug!(
            "tracked {} cadence interval(s), {} anomalous",
            result.intervals.len(),
            result.anomaly_count()
        );
        result
    }
}

/// A matched ignition cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnitionCycle {
    /// 0-based position in the cycle list.
    pub index: usize,
    pub on: Boundary,
    /// `None` for an open cycle.
    pub off: Option<Boundary>,
    /// Seconds between on and off.
    pub on_secs: Option<i64>,
    /// Seconds between off and the next ignition-on.
    pub off_secs: Option<i64>,
}

impl IgnitionCycle {
    /// Whether the cycle has no matched ignition-off.
    pub fn is_open(&self) -> bool {
        self.off.is_none()
    }

    /// Local calendar day of the ignition-on.
    pub fn on_day(&self) -> NaiveDate {
        self.on.timestamp.date()
    }
}

/// Pair ignition-on and ignition-off boundaries into cycles.
///
/// Greedy, one pass, two cursors: each on-event takes the first off-event
/// strictly after it and strictly before the next on-event. Off-events that
/// fall before the current on-event are skipped.
pub fn pair_cycles(events: &[ClassifiedEvent<'_>]) -> Vec<IgnitionCycle> {
    let ons: Vec<Boundary> = events
        .iter()
        .filter(|e| e.category == Category::IgnitionOn)
        .map(Boundary::of)
        .collect();
    let offs: Vec<Boundary> = events
        .iter()
        .filter(|e| e.category == Category::IgnitionOff)
        .map(Boundary::of)
        .collect();

    let mut cycles = Vec::with_capacity(ons.len());
    let mut off_cursor = 0;
    for (i, on) in ons.iter().enumerate() {
        let next_on = ons.get(i + 1);

        while off_cursor < offs.len() && offs[off_cursor].timestamp <= on.timestamp {
            off_cursor += 1;
        }

        let off = offs
            .get(off_cursor)
            .filter(|off| next_on.map_or(true, |n| off.timestamp < n.timestamp))
            .copied();
        if off.is_some() {
            off_cursor += 1;
        }

        let on_secs = off.map(|off| (off.timestamp - on.timestamp).num_seconds());
        let off_secs = off
            .zip(next_on)
            .map(|(off, next)| (next.timestamp - off.timestamp).num_seconds());

        cycles.push(IgnitionCycle {
            index: i,
            on: *on,
            off,
            on_secs,
            off_secs,
        });
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NormalizedRecord;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap()
    }

    fn records(timeline: &[(i64, Category)]) -> Vec<(NormalizedRecord, Category)> {
        timeline.iter()
            .enumerate()
            .map(|(i, (offset, category))| {
                (
                    NormalizedRecord::new(i + 2, i as i64, t0() + Duration::seconds(*offset)),
                    category.clone(),
                )
            })
            .collect()
    }

    fn events(recs: &[(NormalizedRecord, Category)]) -> Vec<ClassifiedEvent<'_>> {
        recs.iter()
            .map(|(record, category)| ClassifiedEvent {
                record,
                category: category.clone(),
            })
            .collect()
    }

    const MOVING: Category = Category::PeriodicReport(PeriodicKind::Moving);
    const ECONOMY: Category = Category::PeriodicReport(PeriodicKind::Economy);

    #[test]
    fn test_exact_cadence_no_anomaly() {
        let recs = records(&[
            (0, Category::IgnitionOn),
            (180, MOVING),
            (360, MOVING),
            (540, MOVING),
        ]);
        let result = IgnitionTracker::default().track(&events(&recs));
        assert_eq!(result.intervals.len(), 3);
        assert_eq!(result.anomaly_count(), 0);
        assert!(result.intervals.iter().all(|i| i.measured_secs == 180));
    }

    #[test]
    fn test_late_report_flagged() {
        let recs = records(&[(0, Category::IgnitionOn), (200, MOVING)]);
        let result = IgnitionTracker::default().track(&events(&recs));
        let anomalies: Vec<_> = result.anomalies().collect();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].measured_secs, 200);
        assert_eq!(anomalies[0].expected_secs, 180);
        assert_eq!(anomalies[0].line, 3);
    }

    #[test]
    fn test_economy_measured_from_off() {
        let recs = records(&[
            (0, Category::IgnitionOff),
            (3600, ECONOMY),
            (7300, ECONOMY),
        ]);
        let result = IgnitionTracker::default().track(&events(&recs));
        assert_eq!(result.intervals.len(), 2);
        assert!(!result.intervals[0].anomalous);
        assert_eq!(result.intervals[1].measured_secs, 3700);
        assert!(result.intervals[1].anomalous);
        assert_eq!(result.final_state.state, IgnitionState::Off);
    }

    #[test]
    fn test_marker_reset_on_boundary() {
        let recs = records(&[
            (0, Category::IgnitionOn),
            (180, MOVING),
            (200, Category::IgnitionOff),
            (1000, Category::IgnitionOn),
            (1180, MOVING),
        ]);
        let result = IgnitionTracker::default().track(&events(&recs));
        assert_eq!(result.intervals.len(), 2);
        assert_eq!(result.intervals[1].measured_secs, 180);
        assert_eq!(result.anomaly_count(), 0);
    }

    #[test]
    fn test_report_without_reference() {
        let recs = records(&[(0, MOVING), (180, MOVING)]);
        let result = IgnitionTracker::default().track(&events(&recs));
        assert_eq!(result.intervals.len(), 1);
        assert_eq!(result.final_state.state, IgnitionState::Unknown);
    }

    #[test]
    fn test_step_is_pure() {
        let recs = records(&[(0, Category::IgnitionOn)]);
        let evs = events(&recs);
        let start = TrackerState::default();
        let (a, _) = step(start, &evs[0], &CadenceConfig::default());
        let (b, _) = step(start, &evs[0], &CadenceConfig::default());
        assert_eq!(a, b);
        assert_eq!(start.state, IgnitionState::Unknown);
        assert_eq!(a.state, IgnitionState::On);
    }

    #[test]
    fn test_pair_simple_cycles() {
        let recs = records(&[
            (0, Category::IgnitionOn),
            (600, Category::IgnitionOff),
            (1000, Category::IgnitionOn),
            (1500, Category::IgnitionOff),
        ]);
        let cycles = pair_cycles(&events(&recs));
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].on_secs, Some(600));
        assert_eq!(cycles[0].off_secs, Some(400));
        assert_eq!(cycles[1].on_secs, Some(500));
        assert_eq!(cycles[1].off_secs, None);
        assert_eq!(cycles[1].index, 1);
    }

    #[test]
    fn test_pair_open_cycle_between_ons() {
        let recs = records(&[
            (0, Category::IgnitionOn),
            (100, Category::IgnitionOn),
            (200, Category::IgnitionOff),
        ]);
        let cycles = pair_cycles(&events(&recs));
        assert_eq!(cycles.len(), 2);
        assert!(cycles[0].is_open());
        assert_eq!(cycles[0].on_secs, None);
        assert_eq!(cycles[0].off_secs, None);
        assert_eq!(cycles[1].on_secs, Some(100));
    }

    #[test]
    fn test_pair_skips_leading_off() {
        let recs = records(&[
            (0, Category::IgnitionOff),
            (50, Category::IgnitionOn),
            (60, Category::IgnitionOff),
            (70, Category::IgnitionOff),
        ]);
        let cycles = pair_cycles(&events(&recs));
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].off.map(|b| b.line), Some(4));
    }

    #[test]
    fn test_cycles_on_before_off() {
        let recs = records(&[
            (0, Category::IgnitionOn),
            (0, Category::IgnitionOff),
            (10, Category::IgnitionOff),
            (20, Category::IgnitionOn),
            (20, Category::IgnitionOff),
        ]);
        for cycle in pair_cycles(&events(&recs)) {
            if let Some(off) = cycle.off {
                assert!(cycle.on.timestamp < off.timestamp);
            }
        }
    }

    #[test]
    fn test_no_boundaries() {
        let recs = records(&[(0, MOVING)]);
        assert!(pair_cycles(&events(&recs)).is_empty());
    }
}

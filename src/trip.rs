// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Trip segmentation.
//!
//! A trip is a closed ignition cycle with a numeric odometer at both
//! boundaries. Trips are classified by distance and summed per day.

use crate::ignition::IgnitionCycle;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Distance thresholds for trip classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripConfig {
    /// Upper bound (inclusive) of a short trip.
    pub short_max_km: f64,
    /// Upper bound (inclusive) of a medium trip.
    pub medium_max_km: f64,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            short_max_km: 2.0,
            medium_max_km: 50.0,
        }
    }
}

impl TripConfig {
    /// Category for an odometer delta.
    pub fn categorize(&self, distance: f64) -> TripCategory {
        if distance < 0.0 {
            TripCategory::Ignore
        } else if distance <= self.short_max_km {
            TripCategory::Short
        } else if distance <= self.medium_max_km {
            TripCategory::Medium
        } else {
            TripCategory::Long
        }
    }
}

/// Distance class of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TripCategory {
    /// Negative delta (odometer reset or swap)
    Ignore,
    Short,
    Medium,
    Long,
}

impl TripCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripCategory::Ignore => "Ignore",
            TripCategory::Short => "Short",
            TripCategory::Medium => "Medium",
            TripCategory::Long => "Long",
        }
    }
}

impl fmt::Display for TripCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub cycle_index: usize,
    pub on_time: NaiveDateTime,
    pub on_line: usize,
    pub off_time: NaiveDateTime,
    pub off_line: usize,
    pub start_odometer: f64,
    pub end_odometer: f64,
    /// `end_odometer - start_odometer`
    pub distance: f64,
    pub category: TripCategory,
    /// Day bucket, from the ignition-on.
    pub day: NaiveDate,
}

/// Per-day distance sums by category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTripSummary {
    pub day: NaiveDate,
    pub short_km: f64,
    pub medium_km: f64,
    pub long_km: f64,
    /// Trips counted in the sums.
    pub trips: usize,
}

impl DailyTripSummary {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            short_km: 0.0,
            medium_km: 0.0,
            long_km: 0.0,
            trips: 0,
        }
    }

    pub fn total_km(&self) -> f64 {
        round2(self.short_km + self.medium_km + self.long_km)
    }
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Trip segmenter
#[derive(Debug, Clone, Default)]
pub struct TripSegmenter {
    config: TripConfig,
}

impl TripSegmenter {
    pub fn new(config: TripConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TripConfig {
        &self.config
    }

    /// Build trips from cycles.
    ///
    /// Open cycles and cycles missing an odometer at either boundary are
    /// left out.
    pub fn segment(&self, cycles: &[IgnitionCycle]) -> Vec<Trip> {
        let trips: Vec<Trip> = cycles
            .iter()
            .filter_map(|cycle| {
                let off = cycle.off?;
                let start = cycle.on.odometer?;
                let end = off.odometer?;
                let distance = end - start;
                Some(Trip {
                    cycle_index: cycle.index,
                    on_time: cycle.on.timestamp,
                    on_line: cycle.on.line,
                    off_time: off.timestamp,
                    off_line: off.line,
                    start_odometer: start,
                    end_odometer: end,
                    distance,
                    category: self.config.categorize(distance),
                    day: cycle.on_day(),
                })
            })
            .collect();
        debug!("{} trip(s) from {} cycle(s)", trips.len(), cycles.len());
        trips
    }

    /// Sum trip distances per day and category, days ascending.
    ///
    /// Ignore trips are left out of the sums.
    pub fn daily(&self, trips: &[Trip]) -> Vec<DailyTripSummary> {
        let mut days: BTreeMap<NaiveDate, DailyTripSummary> = BTreeMap::new();
        for trip in trips.iter().filter(|t| t.category != TripCategory::Ignore) {
            let slot = days
                .entry(trip.day)
                .or_insert_with(|| DailyTripSummary::new(trip.day));
            match trip.category {
                TripCategory::Short => slot.short_km += trip.distance,
                TripCategory::Medium => slot.medium_km += trip.distance,
                TripCategory::Long => slot.long_km += trip.distance,
                TripCategory::Ignore => {}
            }
            slot.trips += 1;
        }
        days.into_values()
            .map(|mut d| {
                d.short_km = round2(d.short_km);
                d.medium_km = round2(d.medium_km);
                d.long_km = round2(d.long_km);
                d
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignition::Boundary;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn cycle(index: usize, on: NaiveDateTime, start: Option<f64>, end: Option<f64>) -> IgnitionCycle {
        let off = on + Duration::minutes(30);
        IgnitionCycle {
            index,
            on: Boundary {
                timestamp: on,
                line: index * 2 + 2,
                odometer: start,
            },
            off: Some(Boundary {
                timestamp: off,
                line: index * 2 + 3,
                odometer: end,
            }),
            on_secs: Some(1800),
            off_secs: None,
        }
    }

    #[test]
    fn test_categorize_thresholds() {
        let config = TripConfig::default();
        assert_eq!(config.categorize(-0.1), TripCategory::Ignore);
        assert_eq!(config.categorize(0.0), TripCategory::Short);
        assert_eq!(config.categorize(2.0), TripCategory::Short);
        assert_eq!(config.categorize(2.01), TripCategory::Medium);
        assert_eq!(config.categorize(50.0), TripCategory::Medium);
        assert_eq!(config.categorize(50.5), TripCategory::Long);
    }

    #[test]
    fn test_medium_trip() {
        let trips = TripSegmenter::default().segment(&[cycle(0, at(1, 8), Some(100.0), Some(112.5))]);
        assert_eq!(trips.len(), 1);
        assert_relative_eq!(trips[0].distance, 12.5);
        assert_eq!(trips[0].category, TripCategory::Medium);
    }

    #[test]
    fn test_excludes_open_and_missing_odometer() {
        let mut open = cycle(0, at(1, 8), Some(1.0), Some(2.0));
        open.off = None;
        let cycles = vec![
            open,
            cycle(1, at(1, 9), None, Some(5.0)),
            cycle(2, at(1, 10), Some(5.0), None),
            cycle(3, at(1, 11), Some(5.0), Some(6.0)),
        ];
        let trips = TripSegmenter::default().segment(&cycles);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].cycle_index, 3);
    }

    #[test]
    fn test_daily_sums() {
        let segmenter = TripSegmenter::default();
        let cycles = vec![
            cycle(0, at(2, 8), Some(0.0), Some(1.111)),
            cycle(1, at(2, 9), Some(10.0), Some(11.116)),
            cycle(2, at(2, 10), Some(20.0), Some(100.0)),
            cycle(3, at(2, 11), Some(500.0), Some(10.0)),
            cycle(4, at(1, 8), Some(0.0), Some(30.0)),
        ];
        let trips = segmenter.segment(&cycles);
        assert_eq!(trips.len(), 5);
        assert_eq!(trips[3].category, TripCategory::Ignore);

        let daily = segmenter.daily(&trips);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].day, at(1, 0).date());
        assert_relative_eq!(daily[0].medium_km, 30.0);
        assert_relative_eq!(daily[1].short_km, 2.23);
        assert_relative_eq!(daily[1].long_km, 80.0);
        assert_eq!(daily[1].trips, 3);
        assert_relative_eq!(daily[1].total_km(), 82.23);
    }

    #[test]
    fn test_day_bucket_from_on_event() {
        let on = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(23, 50, 0)
            .unwrap();
        let trips = TripSegmenter::default().segment(&[cycle(0, on, Some(0.0), Some(3.0))]);
        assert_eq!(trips[0].day, on.date());
        assert!(trips[0].off_time.date() > trips[0].day);
    }

    #[test]
    fn test_round2() {
        assert_relative_eq!(round2(1.005_1), 1.01);
        assert_relative_eq!(round2(2.344), 2.34);
    }
}

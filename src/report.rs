// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Output tables of one engine run.

use crate::classifier::ClassifiedEvent;
use crate::delay::DelayReport;
use crate::ignition::{CadenceInterval, IgnitionCycle};
use crate::normalizer::SkippedRow;
use crate::reboot::Reboot;
use crate::sequence::{AnomalyKind, SequenceAnomaly};
use crate::speed::{SpeedAlert, SpeedAlertKind};
use crate::trip::{DailyTripSummary, Trip};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Number of events with one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
    pub label: String,
    pub count: usize,
}

/// One day of the event count pivot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCountRow {
    pub day: NaiveDate,
    /// Counts aligned with [`DailyEventCounts::labels`].
    pub counts: Vec<usize>,
}

/// Event counts pivoted by day and label
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailyEventCounts {
    /// Column labels, sorted.
    pub labels: Vec<String>,
    /// One row per day, days ascending.
    pub rows: Vec<DailyCountRow>,
}

impl DailyEventCounts {
    /// Count for a day and label, 0 when absent.
    pub fn get(&self, day: NaiveDate, label: &str) -> usize {
        let Some(col) = self.labels.iter().position(|l| l == label) else {
            return 0;
        };
        self.rows
            .iter()
            .find(|r| r.day == day)
            .map_or(0, |r| r.counts[col])
    }
}

/// Count events per label, by descending count then label.
pub fn count_events(events: &[ClassifiedEvent<'_>]) -> Vec<EventCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        *counts.entry(event.label()).or_default() += 1;
    }
    let mut table: Vec<EventCount> = counts
        .into_iter()
        .map(|(label, count)| EventCount {
            label: label.to_string(),
            count,
        })
        .collect();
    // BTreeMap order already sorts labels; stable sort keeps it for ties.
    table.sort_by(|a, b| b.count.cmp(&a.count));
    table
}

/// Pivot event counts by the event's calendar day.
pub fn daily_counts(events: &[ClassifiedEvent<'_>]) -> DailyEventCounts {
    let labels: BTreeSet<&str> = events.iter().map(|e| e.label()).collect();
    let labels: Vec<String> = labels.into_iter().map(str::to_string).collect();

    let mut days: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for event in events {
        let day = event.record.event_time.date();
        let row = days.entry(day).or_insert_with(|| vec![0; labels.len()]);
        if let Some(col) = labels.iter().position(|l| l == event.label()) {
            row[col] += 1;
        }
    }

    DailyEventCounts {
        labels,
        rows: days
            .into_iter()
            .map(|(day, counts)| DailyCountRow { day, counts })
            .collect(),
    }
}

/// Everything one engine run derives from a file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineReport {
    /// Name of the source file.
    pub source_name: String,
    /// Device type of the file, if any row carries one.
    pub device_type: Option<String>,
    /// Data rows read.
    pub rows_read: usize,
    /// Rows dropped during normalization.
    pub skipped: Vec<SkippedRow>,
    /// Duplicate sequence rows collapsed.
    pub duplicates_removed: usize,
    /// Records in the normalized stream.
    pub records: usize,

    pub event_counts: Vec<EventCount>,
    pub daily_counts: DailyEventCounts,

    pub cycles: Vec<IgnitionCycle>,
    pub cadence: Vec<CadenceInterval>,
    pub trips: Vec<Trip>,
    pub daily_trips: Vec<DailyTripSummary>,

    pub sequence_anomalies: Vec<SequenceAnomaly>,

    pub delay: DelayReport,
    pub reboots: Vec<Reboot>,
    pub speed_alerts: Vec<SpeedAlert>,
}

impl EngineReport {
    /// Cadence intervals flagged as anomalous.
    pub fn cadence_anomalies(&self) -> impl Iterator<Item = &CadenceInterval> {
        self.cadence.iter().filter(|c| c.anomalous)
    }

    /// Sequence anomalies of one kind.
    pub fn anomalies_of(&self, kind: AnomalyKind) -> impl Iterator<Item = &SequenceAnomaly> {
        self.sequence_anomalies.iter().filter(move |a| a.kind == kind)
    }

    /// Speed alerts of one kind.
    pub fn speed_alerts_of(&self, kind: SpeedAlertKind) -> impl Iterator<Item = &SpeedAlert> {
        self.speed_alerts.iter().filter(move |a| a.kind == kind)
    }

    /// Count for a label, 0 when absent.
    pub fn event_count(&self, label: &str) -> usize {
        self.event_counts
            .iter()
            .find(|c| c.label == label)
            .map_or(0, |c| c.count)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Category;
    use crate::record::NormalizedRecord;
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample() -> Vec<NormalizedRecord> {
        vec![
            NormalizedRecord::new(2, 1, at(1, 8)),
            NormalizedRecord::new(3, 2, at(1, 9)),
            NormalizedRecord::new(4, 3, at(1, 10)).with_message("GTFRI"),
            NormalizedRecord::new(5, 4, at(2, 8)),
            NormalizedRecord::new(6, 5, at(2, 9)),
        ]
    }

    fn classify(records: &[NormalizedRecord]) -> Vec<ClassifiedEvent<'_>> {
        let categories = [
            Category::IgnitionOn,
            Category::IgnitionOff,
            Category::Other,
            Category::IgnitionOn,
            Category::Message("GTSOS".into()),
        ];
        records
            .iter()
            .zip(categories)
            .map(|(record, category)| ClassifiedEvent { record, category })
            .collect()
    }

    #[test]
    fn test_count_order() {
        let records = sample();
        let counts = count_events(&classify(&records));
        assert_eq!(counts[0].label, "IgnitionOn");
        assert_eq!(counts[0].count, 2);
        let rest: Vec<&str> = counts[1..].iter().map(|c| c.label.as_str()).collect();
        assert_eq!(rest, vec!["GTFRI", "GTSOS", "IgnitionOff"]);
    }

    #[test]
    fn test_daily_pivot() {
        let records = sample();
        let pivot = daily_counts(&classify(&records));
        assert_eq!(pivot.rows.len(), 2);
        assert_eq!(pivot.labels.len(), 4);
        assert_eq!(pivot.get(at(1, 0).date(), "IgnitionOn"), 1);
        assert_eq!(pivot.get(at(2, 0).date(), "IgnitionOn"), 1);
        assert_eq!(pivot.get(at(2, 0).date(), "IgnitionOff"), 0);
        assert_eq!(pivot.get(at(1, 0).date(), "GTFRI"), 1);
        assert_eq!(pivot.get(at(3, 0).date(), "GTFRI"), 0);
    }

    #[test]
    fn test_report_json() {
        let report = EngineReport {
            source_name: "a.csv".into(),
            rows_read: 3,
            ..Default::default()
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"source_name\":\"a.csv\""));
        let restored = EngineReport::from_json(&json).unwrap();
        assert_eq!(restored, report);
    }
}

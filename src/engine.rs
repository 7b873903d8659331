// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine - orchestrates one batch run per file.
//!
//! The normalized stream is built once and then read by independent
//! branches: classification → ignition tracking → trip segmentation, the
//! sequence checker, and the delay, reboot and speed detectors. No branch
//! mutates the stream.

use crate::classifier::Classifier;
use crate::config::EngineConfig;
use crate::delay;
use crate::error::Result;
use crate::ignition::{pair_cycles, IgnitionTracker};
use crate::normalizer::{NormalizedBatch, Normalizer};
use crate::reboot;
use crate::record::RawTable;
use crate::report::{count_events, daily_counts, EngineReport};
use crate::sequence::SequenceChecker;
use crate::speed;
use crate::trip::TripSegmenter;
use log::{debug, info};

/// Batch derivation engine.
///
/// Holds configuration only; every run starts from a fresh state, so one
/// engine can serve many files, including from several threads.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    classifier: Classifier,
    checker: SequenceChecker,
    segmenter: TripSegmenter,
}

impl Engine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            classifier: Classifier::with_policy(config.policy.clone()),
            checker: SequenceChecker::new(config.sequence),
            segmenter: TripSegmenter::new(config.trips),
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every derivation over one decoded file.
    ///
    /// Fails only on file-level problems (a missing mandatory column).
    pub fn run(&self, table: &RawTable) -> Result<EngineReport> {
        let batch = Normalizer::new().normalize(table)?;
        let mut report = self.derive(&batch);
        report.source_name = table.source_name.clone();
        report.rows_read = table.len();
        info!(
            "{}: {} record(s), {} cycle(s), {} trip(s), {} sequence anomal(ies)",
            report.source_name,
            report.records,
            report.cycles.len(),
            report.trips.len(),
            report.sequence_anomalies.len()
        );
        Ok(report)
    }

    /// Run the derivations over an already normalized batch.
    pub fn derive(&self, batch: &NormalizedBatch) -> EngineReport {
        let stream = &batch.stream;
        let device_type = batch.device_type.as_deref();

        let events = self.classifier.classify_stream(stream, device_type);
        let cadence = self.config.policy.device(device_type).cadence;
        let tracking = IgnitionTracker::new(cadence).track(&events);
        let cycles = pair_cycles(&events);
        let trips = self.segmenter.segment(&cycles);
        let daily_trips = self.segmenter.daily(&trips);
        debug!(
            "device {:?}: {} event(s), {} cycle(s)",
            device_type,
            events.len(),
            cycles.len()
        );

        // Duplicates must stay visible to the checker as repeats.
        let sequence_anomalies = self.checker.check(&batch.coerced);

        EngineReport {
            source_name: String::new(),
            device_type: batch.device_type.clone(),
            rows_read: batch.coerced.len() + batch.skipped.len(),
            skipped: batch.skipped.clone(),
            duplicates_removed: batch.duplicates_removed(),
            records: stream.len(),
            event_counts: count_events(&events),
            daily_counts: daily_counts(&events),
            cycles,
            cadence: tracking.intervals,
            trips,
            daily_trips,
            sequence_anomalies,
            delay: delay::analyze(&batch.coerced, &self.config.delay),
            reboots: reboot::detect(stream),
            speed_alerts: speed::scan(stream, &self.config.speed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::record::{Field, RawRecord};
    use crate::sequence::AnomalyKind;

    fn row(line: usize, seq: &str, time: &str, message: &str) -> RawRecord {
        RawRecord::new(line)
            .with(Field::Sequence, seq)
            .with(Field::EventTime, time)
            .with(Field::MessageType, message)
            .with(Field::DeviceType, "802003")
    }

    #[test]
    fn test_run_small_file() {
        let mut table = RawTable::with_all_columns("unit.csv");
        table.push(row(2, "1", "2024-05-01 08:00:00", "GTIGN").with(Field::Odometer, "100.0"));
        table.push(row(3, "2", "2024-05-01 08:03:00", "GTERI").with(Field::MotionStatus, "21"));
        table.push(row(4, "3", "2024-05-01 08:30:00", "GTIGF").with(Field::Odometer, "112.5"));
        table.push(row(5, "3", "2024-05-01 08:31:00", "GTERI"));

        let report = Engine::default().run(&table).unwrap();
        assert_eq!(report.source_name, "unit.csv");
        assert_eq!(report.device_type.as_deref(), Some("802003"));
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.records, 3);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.trips.len(), 1);
        assert_eq!(report.cadence.len(), 1);
        assert_eq!(report.cadence_anomalies().count(), 0);
        assert_eq!(report.event_count("MovingPeriodic"), 1);
        assert_eq!(report.anomalies_of(AnomalyKind::Repeat).count(), 1);
    }

    #[test]
    fn test_schema_error_propagates() {
        let table = RawTable::new("bad.csv", [Field::MessageType]);
        let err = Engine::default().run(&table).unwrap_err();
        assert!(matches!(err, EngineError::Schema { .. }));
    }

    #[test]
    fn test_empty_file_is_valid() {
        let report = Engine::default()
            .run(&RawTable::with_all_columns("empty.csv"))
            .unwrap();
        assert_eq!(report.records, 0);
        assert!(report.cycles.is_empty());
        assert!(report.sequence_anomalies.is_empty());
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}

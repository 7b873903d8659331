// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Record normalization.
//!
//! Turns a [`RawTable`] into typed records, drops rows without a usable
//! event timestamp or sequence number, collapses duplicate sequence numbers
//! (first occurrence wins) and orders the result by event time.

use crate::error::{EngineError, Result, RowError};
use crate::record::{
    canonical_code, normalize_message, parse_f64, parse_i64, parse_motion, parse_timestamp,
    Field, NormalizedRecord, RawRecord, RawTable,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Deref;

/// A row dropped during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based source line.
    pub line: usize,
    /// Why the row was dropped.
    pub reason: RowError,
}

/// Deduplicated, time-ordered records. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedStream {
    records: Vec<NormalizedRecord>,
}

impl NormalizedStream {
    /// The ordered records.
    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    /// Take ownership of the records.
    pub fn into_records(self) -> Vec<NormalizedRecord> {
        self.records
    }
}

impl Deref for NormalizedStream {
    type Target = [NormalizedRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

/// Output of one normalization run.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Deduplicated records ordered by event time.
    pub stream: NormalizedStream,
    /// Every row that coerced successfully, in file order, duplicates kept.
    pub coerced: Vec<NormalizedRecord>,
    /// Rows dropped for a missing or unparseable mandatory value.
    pub skipped: Vec<SkippedRow>,
    /// Device type of the file: first non-null value, canonical form.
    pub device_type: Option<String>,
}

impl NormalizedBatch {
    /// Number of duplicate sequence rows collapsed.
    pub fn duplicates_removed(&self) -> usize {
        self.coerced.len() - self.stream.len()
    }
}

/// Record normalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a decoded table.
    ///
    /// Fails only when a mandatory column is missing from the header. Row
    /// problems are recovered by skipping the row.
    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedBatch> {
        let missing = table.missing_mandatory();
        if !missing.is_empty() {
            warn!(
                "{}: missing mandatory column(s): {:?}",
                table.source_name, missing
            );
            return Err(EngineError::Schema { missing });
        }

        let device_type = device_type_of(&table.rows);

        let mut coerced = Vec::with_capacity(table.rows.len());
        let mut skipped = Vec::new();
        for row in &table.rows {
            match coerce(row) {
                Ok(record) => coerced.push(record),
                Err(reason) => {
                    debug!("{}: skipping line {}: {}", table.source_name, row.line, reason);
                    skipped.push(SkippedRow {
                        line: row.line,
                        reason,
                    });
                }
            }
        }

        let stream = normalize_records(coerced.clone());
        debug!(
            "{}: {} rows, {} skipped, {} duplicate sequence(s) collapsed",
            table.source_name,
            table.rows.len(),
            skipped.len(),
            coerced.len() - stream.len()
        );

        Ok(NormalizedBatch {
            stream,
            coerced,
            skipped,
            device_type,
        })
    }
}

/// Deduplicate by sequence number and order by event time.
///
/// Records are first ordered by sequence (stable, so the earliest row wins
/// among duplicates), then by `(event_time, line)`. Applying this to an
/// already normalized stream returns it unchanged.
pub fn normalize_records(mut records: Vec<NormalizedRecord>) -> NormalizedStream {
    records.sort_by_key(|r| r.sequence);
    let mut seen = HashSet::with_capacity(records.len());
    records.retain(|r| seen.insert(r.sequence));
    records.sort_by_key(|r| (r.event_time, r.line));
    NormalizedStream { records }
}

/// Device type of a file: the first non-null value, canonicalised.
pub fn device_type_of(rows: &[RawRecord]) -> Option<String> {
    rows.iter()
        .find_map(|r| r.get(Field::DeviceType))
        .and_then(canonical_code)
}

/// Coerce one raw row. Optional fields degrade to `None` on parse failure.
pub fn coerce(row: &RawRecord) -> std::result::Result<NormalizedRecord, RowError> {
    let event_text = row
        .get(Field::EventTime)
        .ok_or(RowError::MissingField(Field::EventTime))?;
    let event_time =
        parse_timestamp(event_text).ok_or_else(|| RowError::InvalidTimestamp(event_text.into()))?;

    let sequence_text = row
        .get(Field::Sequence)
        .ok_or(RowError::MissingField(Field::Sequence))?;
    let sequence =
        parse_i64(sequence_text).ok_or_else(|| RowError::InvalidSequence(sequence_text.into()))?;

    Ok(NormalizedRecord {
        line: row.line,
        sequence,
        event_time,
        inclusion_time: row.get(Field::InclusionTime).and_then(parse_timestamp),
        message_type: row.get(Field::MessageType).and_then(normalize_message),
        event_code: row.get(Field::EventCode).and_then(canonical_code),
        motion_status: row.get(Field::MotionStatus).and_then(parse_motion),
        report_type: row.get(Field::ReportType).and_then(canonical_code),
        odometer: row.get(Field::Odometer).and_then(parse_f64),
        device_type: row.get(Field::DeviceType).and_then(canonical_code),
        latitude: row.get(Field::Latitude).and_then(parse_f64),
        longitude: row.get(Field::Longitude).and_then(parse_f64),
        satellites: row
            .get(Field::Satellites)
            .and_then(parse_i64)
            .and_then(|v| u32::try_from(v).ok()),
        hdop: row.get(Field::Hdop).and_then(parse_f64),
        speed: row.get(Field::Speed).and_then(parse_f64),
        power_on_reason: row.get(Field::PowerOnReason).and_then(parse_i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: usize, seq: &str, time: &str) -> RawRecord {
        RawRecord::new(line)
            .with(Field::Sequence, seq)
            .with(Field::EventTime, time)
    }

    fn table(rows: Vec<RawRecord>) -> RawTable {
        let mut t = RawTable::with_all_columns("test.csv");
        for r in rows {
            t.push(r);
        }
        t
    }

    #[test]
    fn test_schema_error() {
        let t = RawTable::new("x.csv", [Field::Sequence]);
        let err = Normalizer::new().normalize(&t).unwrap_err();
        assert_eq!(
            err,
            EngineError::Schema {
                missing: vec![Field::EventTime]
            }
        );
    }

    #[test]
    fn test_skips_bad_rows() {
        let t = table(vec![
            row(2, "1", "2024-01-01 10:00:00"),
            row(3, "", "2024-01-01 10:01:00"),
            row(4, "3", "garbage"),
            row(5, "x", "2024-01-01 10:03:00"),
        ]);
        let batch = Normalizer::new().normalize(&t).unwrap();
        assert_eq!(batch.stream.len(), 1);
        assert_eq!(batch.skipped.len(), 3);
        assert_eq!(batch.skipped[0].line, 3);
        assert_eq!(
            batch.skipped[0].reason,
            RowError::MissingField(Field::Sequence)
        );
        assert!(matches!(batch.skipped[1].reason, RowError::InvalidTimestamp(_)));
        assert!(matches!(batch.skipped[2].reason, RowError::InvalidSequence(_)));
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let t = table(vec![
            row(2, "10", "2024-01-01 10:00:00").with(Field::MessageType, "GTIGN"),
            row(3, "10", "2024-01-01 10:05:00").with(Field::MessageType, "GTIGF"),
            row(4, "11", "2024-01-01 10:01:00"),
        ]);
        let batch = Normalizer::new().normalize(&t).unwrap();
        assert_eq!(batch.stream.len(), 2);
        assert_eq!(batch.duplicates_removed(), 1);
        assert_eq!(batch.stream[0].line, 2);
        assert_eq!(batch.stream[0].message_type.as_deref(), Some("GTIGN"));
        assert_eq!(batch.coerced.len(), 3);
    }

    #[test]
    fn test_orders_by_time_then_line() {
        let t = table(vec![
            row(2, "5", "2024-01-01 10:02:00"),
            row(3, "3", "2024-01-01 10:00:00"),
            row(4, "1", "2024-01-01 10:00:00"),
        ]);
        let batch = Normalizer::new().normalize(&t).unwrap();
        let lines: Vec<usize> = batch.stream.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 4, 2]);
    }

    #[test]
    fn test_idempotent() {
        let t = table(vec![
            row(2, "7", "2024-01-01 10:02:00"),
            row(3, "7", "2024-01-01 09:00:00"),
            row(4, "2", "2024-01-01 10:00:00"),
            row(5, "9", "2024-01-01 10:00:00"),
        ]);
        let batch = Normalizer::new().normalize(&t).unwrap();
        let again = normalize_records(batch.stream.records().to_vec());
        assert_eq!(again, batch.stream);
    }

    #[test]
    fn test_optional_fields_degrade() {
        let t = table(vec![row(2, "1", "2024-01-01 10:00:00")
            .with(Field::Odometer, "abc")
            .with(Field::Speed, "55.5")
            .with(Field::Satellites, "-1")
            .with(Field::ReportType, "10.0")]);
        let batch = Normalizer::new().normalize(&t).unwrap();
        let rec = &batch.stream[0];
        assert_eq!(rec.odometer, None);
        assert_eq!(rec.speed, Some(55.5));
        assert_eq!(rec.satellites, None);
        assert_eq!(rec.report_type.as_deref(), Some("10"));
    }

    #[test]
    fn test_device_type_first_non_null() {
        let rows = vec![
            row(2, "1", "2024-01-01 10:00:00"),
            row(3, "2", "2024-01-01 10:00:00").with(Field::DeviceType, "802003.0"),
            row(4, "3", "2024-01-01 10:00:00").with(Field::DeviceType, "999"),
        ];
        assert_eq!(device_type_of(&rows), Some("802003".to_string()));
    }

    #[test]
    fn test_empty_table_is_valid() {
        let batch = Normalizer::new().normalize(&table(vec![])).unwrap();
        assert!(batch.stream.is_empty());
        assert!(batch.skipped.is_empty());
        assert_eq!(batch.device_type, None);
    }
}

// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sequence integrity checking.
//!
//! Records are re-sorted by `(event_time, sequence)` and every adjacent pair
//! is checked once. Rules are evaluated in priority order and the first
//! match wins:
//!
//! 1. Reset: the counter went backwards by more than the reset threshold
//! 2. Repeat: the same sequence number twice
//! 3. Gap: anything other than `current + 1`
//! 4. Temporal order violation: the next event is older
//!
//! Rule 4 can only fire when the input was not already ordered by time.

use crate::record::NormalizedRecord;
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence checker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// A backwards jump larger than this is a counter reset.
    pub reset_threshold: i64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            reset_threshold: 60_000,
        }
    }
}

/// Kind of sequence anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalyKind {
    Reset,
    Repeat,
    Gap,
    TemporalOrderViolation,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::Reset => "Reset",
            AnomalyKind::Repeat => "Repeat",
            AnomalyKind::Gap => "Gap",
            AnomalyKind::TemporalOrderViolation => "TemporalOrderViolation",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An anomaly between two adjacent records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceAnomaly {
    pub kind: AnomalyKind,
    pub current_line: usize,
    pub next_line: usize,
    pub current_sequence: i64,
    pub next_sequence: i64,
    pub current_time: NaiveDateTime,
    pub next_time: NaiveDateTime,
    pub current_message: Option<String>,
    pub next_message: Option<String>,
    /// `next_sequence - current_sequence`, saturated at the `i64` bounds
    pub delta: i64,
}

/// Exact difference between two sequence numbers.
fn sequence_delta(current: &NormalizedRecord, next: &NormalizedRecord) -> i128 {
    i128::from(next.sequence) - i128::from(current.sequence)
}

/// Classify one adjacent pair.
pub fn check_pair(
    current: &NormalizedRecord,
    next: &NormalizedRecord,
    config: &SequenceConfig,
) -> Option<AnomalyKind> {
    let delta = sequence_delta(current, next);
    if delta < 0 && -delta > i128::from(config.reset_threshold) {
        Some(AnomalyKind::Reset)
    } else if delta == 0 {
        Some(AnomalyKind::Repeat)
    } else if delta != 1 {
        Some(AnomalyKind::Gap)
    } else if next.event_time < current.event_time {
        Some(AnomalyKind::TemporalOrderViolation)
    } else {
        None
    }
}

/// Sequence integrity checker
#[derive(Debug, Clone, Default)]
pub struct SequenceChecker {
    config: SequenceConfig,
}

impl SequenceChecker {
    pub fn new(config: SequenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Check records in `(event_time, sequence)` order.
    ///
    /// The input slice is not modified.
    pub fn check(&self, records: &[NormalizedRecord]) -> Vec<SequenceAnomaly> {
        let mut ordered: Vec<&NormalizedRecord> = records.iter().collect();
        ordered.sort_by_key(|r| (r.event_time, r.sequence));
        self.check_ordered(&ordered)
    }

    /// Check records in the order given.
    pub fn check_ordered(&self, records: &[&NormalizedRecord]) -> Vec<SequenceAnomaly> {
        let anomalies: Vec<SequenceAnomaly> = records
            .windows(2)
            .filter_map(|pair| {
                let (current, next) = (pair[0], pair[1]);
                check_pair(current, next, &self.config).map(|kind| SequenceAnomaly {
                    kind,
                    current_line: current.line,
                    next_line: next.line,
                    current_sequence: current.sequence,
                    next_sequence: next.sequence,
                    current_time: current.event_time,
                    next_time: next.event_time,
                    current_message: current.message_type.clone(),
                    next_message: next.message_type.clone(),
                    delta: next.sequence.saturating_sub(current.sequence),
                })
            })
            .collect();
        debug!(
            "{} sequence anomal(ies) over {} record(s)",
            anomalies.len(),
            records.len()
        );
        anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn seqs(values: &[i64]) -> Vec<NormalizedRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, s)| NormalizedRecord::new(i + 2, *s, t0() + Duration::seconds(i as i64 * 60)))
            .collect()
    }

    #[test]
    fn test_single_gap() {
        let anomalies = SequenceChecker::default().check(&seqs(&[1, 2, 3, 5, 6]));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::Gap);
        assert_eq!(anomalies[0].current_sequence, 3);
        assert_eq!(anomalies[0].next_sequence, 5);
        assert_eq!(anomalies[0].delta, 2);
        assert_eq!(anomalies[0].current_line, 4);
        assert_eq!(anomalies[0].next_line, 5);
    }

    #[test]
    fn test_single_repeat() {
        let anomalies = SequenceChecker::default().check(&seqs(&[100, 100, 101]));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::Repeat);
        assert_eq!(anomalies[0].delta, 0);
    }

    #[test]
    fn test_single_reset() {
        let anomalies = SequenceChecker::default().check(&seqs(&[65000, 3]));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::Reset);
        assert_eq!(anomalies[0].delta, -64997);
    }

    #[test]
    fn test_small_backwards_jump_is_gap() {
        let anomalies = SequenceChecker::default().check(&seqs(&[500, 400]));
        assert_eq!(anomalies[0].kind, AnomalyKind::Gap);
        assert_eq!(anomalies[0].delta, -100);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let checker = SequenceChecker::new(SequenceConfig { reset_threshold: 50 });
        let anomalies = checker.check(&seqs(&[500, 400]));
        assert_eq!(anomalies[0].kind, AnomalyKind::Reset);
    }

    #[test]
    fn test_reset_threshold_boundary() {
        let at = SequenceChecker::default().check(&seqs(&[60_000, 0]));
        assert_eq!(at[0].kind, AnomalyKind::Gap);
        assert_eq!(at[0].delta, -60_000);

        let over = SequenceChecker::default().check(&seqs(&[60_001, 0]));
        assert_eq!(over[0].kind, AnomalyKind::Reset);
        assert_eq!(over[0].delta, -60_001);
    }

    #[test]
    fn test_extreme_sequence_values() {
        let anomalies = SequenceChecker::default().check(&seqs(&[i64::MAX, -5]));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::Reset);
        assert_eq!(anomalies[0].delta, i64::MIN);

        let anomalies = SequenceChecker::default().check(&seqs(&[i64::MIN, i64::MAX]));
        assert_eq!(anomalies[0].kind, AnomalyKind::Gap);
        assert_eq!(anomalies[0].delta, i64::MAX);
    }

    #[test]
    fn test_clean_sequence() {
        assert!(SequenceChecker::default().check(&seqs(&[7, 8, 9, 10])).is_empty());
        assert!(SequenceChecker::default().check(&[]).is_empty());
        assert!(SequenceChecker::default().check(&seqs(&[1])).is_empty());
    }

    #[test]
    fn test_resorts_by_time_then_sequence() {
        let mut records = seqs(&[1, 2, 3]);
        records.reverse();
        assert!(SequenceChecker::default().check(&records).is_empty());
        assert_eq!(records[0].sequence, 3);
    }

    #[test]
    fn test_temporal_violation_in_given_order() {
        let a = NormalizedRecord::new(2, 1, t0() + Duration::seconds(60));
        let b = NormalizedRecord::new(3, 2, t0());
        let anomalies = SequenceChecker::default().check_ordered(&[&a, &b]);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::TemporalOrderViolation);
    }

    #[test]
    fn test_gap_wins_over_temporal() {
        let a = NormalizedRecord::new(2, 1, t0() + Duration::seconds(60));
        let b = NormalizedRecord::new(3, 5, t0());
        assert_eq!(
            check_pair(&a, &b, &SequenceConfig::default()),
            Some(AnomalyKind::Gap)
        );
    }
}

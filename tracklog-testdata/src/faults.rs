// Tracklog Testdata - Fault injection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fault injection for testing the derivation engine.
//!
//! Each fault edits a generated log at one row index. Faults are applied in
//! the order given, so later indices refer to the already edited log.

use crate::dataset::{DeviceLog, LogRow};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Fault injection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Type of fault to inject.
    pub fault_type: FaultType,
    /// Row index the fault applies to (clamped to the log).
    pub at_row: usize,
}

impl FaultConfig {
    /// Create a new fault configuration.
    pub fn new(fault_type: FaultType, at_row: usize) -> Self {
        Self { fault_type, at_row }
    }
}

/// Type of fault to inject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaultType {
    /// Sequence numbers jump forward from the row on.
    ///
    /// Expected detection: Gap
    SequenceGap {
        /// Numbers skipped.
        skip: i64,
    },

    /// Sequence counter restarts from the row on.
    ///
    /// Expected detection: Reset when the jump back exceeds the threshold,
    /// Gap otherwise
    CounterReset {
        /// First sequence number after the restart.
        restart_at: i64,
    },

    /// The row is delivered twice.
    ///
    /// Expected detection: Repeat
    DuplicateRow,

    /// The row's event clock is shifted.
    ///
    /// Expected detection: Gap (the row moves in time order)
    ClockSkew {
        /// Shift in seconds (negative moves the event back).
        secs: i64,
    },

    /// The row is lost. The sequence number is consumed.
    ///
    /// Expected detection: Gap, plus a cadence anomaly when the row was a
    /// periodic report followed by another of the same mode
    DroppedReport,

    /// The row is buffered on the device and delivered late.
    ///
    /// Expected detection: logged message
    LateDelivery {
        /// Delay between event and inclusion in seconds.
        delay_secs: i64,
    },

    /// The device reboots right after the row.
    ///
    /// Expected detection: reboot
    Reboot {
        /// Power-on reason code.
        reason: i64,
    },

    /// The row reports an implausible speed.
    ///
    /// Expected detection: excessive speed
    Speeding {
        /// Reported speed in km/h.
        kmh: f64,
    },
}

impl FaultType {
    /// Get expected detection type.
    pub fn expected_detection(&self) -> &'static str {
        match self {
            FaultType::SequenceGap { .. } => "Gap",
            FaultType::CounterReset { .. } => "Reset",
            FaultType::DuplicateRow => "Repeat",
            FaultType::ClockSkew { .. } => "Gap",
            FaultType::DroppedReport => "Gap",
            FaultType::LateDelivery { .. } => "LoggedMessage",
            FaultType::Reboot { .. } => "Reboot",
            FaultType::Speeding { .. } => "Excessive",
        }
    }
}

/// Apply one fault to a log.
pub fn apply(log: &mut DeviceLog, fault: &FaultConfig) {
    if log.is_empty() {
        return;
    }
    let at = fault.at_row.min(log.len() - 1);
    let rows = &mut log.rows;

    match &fault.fault_type {
        FaultType::SequenceGap { skip } => {
            for row in &mut rows[at..] {
                row.sequence += skip;
            }
        }

        FaultType::CounterReset { restart_at } => {
            for (i, row) in rows[at..].iter_mut().enumerate() {
                row.sequence = restart_at + i as i64;
            }
        }

        FaultType::DuplicateRow => {
            let copy = rows[at].clone();
            rows.insert(at + 1, copy);
        }

        FaultType::ClockSkew { secs } => {
            rows[at].event_time += Duration::seconds(*secs);
        }

        FaultType::DroppedReport => {
            rows.remove(at);
        }

        FaultType::LateDelivery { delay_secs } => {
            let row = &mut rows[at];
            row.inclusion_time = Some(row.event_time + Duration::seconds(*delay_secs));
        }

        FaultType::Reboot { reason } => {
            let prev = &rows[at];
            let mut reboot = LogRow::new(
                prev.sequence + 1,
                prev.event_time + Duration::seconds(1),
                "GTPNR",
                &prev.device_type,
            );
            reboot.power_on_reason = Some(*reason);
            reboot.inclusion_time = Some(reboot.event_time + Duration::seconds(2));
            for row in &mut rows[at + 1..] {
                row.sequence += 1;
            }
            rows.insert(at + 1, reboot);
        }

        FaultType::Speeding { kmh } => {
            rows[at].speed = Some(*kmh);
        }
    }
}

/// Apply faults in order.
pub fn apply_all(log: &mut DeviceLog, faults: &[FaultConfig]) {
    for fault in faults {
        apply(log, fault);
    }
}

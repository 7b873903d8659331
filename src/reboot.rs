// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Device reboot detection from power-on reports.

use crate::record::NormalizedRecord;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Message type of a power-on report.
pub const POWER_ON_MESSAGE: &str = "GTPNR";

/// Reason code used when the report carries none.
pub const UNKNOWN_REASON: i64 = -1;

/// Human readable power-on reason.
pub fn reason_description(code: i64) -> &'static str {
    match code {
        0 => "Normal power on",
        1 => "FOTA reboot",
        2 => "RTO reboot",
        3 => "Watchdog reboot",
        5 => "System watchdog reboot",
        6 => "Configuration upgrade reboot",
        _ => "Unknown reason",
    }
}

/// One device reboot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reboot {
    /// 1-based position among the reboots of the file.
    pub number: usize,
    pub line: usize,
    pub event_time: NaiveDateTime,
    pub reason_code: i64,
    pub reason: String,
}

/// Power-on reports of a time-ordered stream, numbered from 1.
pub fn detect(records: &[NormalizedRecord]) -> Vec<Reboot> {
    records
        .iter()
        .filter(|r| r.message_type.as_deref() == Some(POWER_ON_MESSAGE))
        .enumerate()
        .map(|(i, r)| {
            let reason_code = r.power_on_reason.unwrap_or(UNKNOWN_REASON);
            Reboot {
                number: i + 1,
                line: r.line,
                event_time: r.event_time,
                reason_code,
                reason: reason_description(reason_code).to_string(),
            }
        })
        .collect()
}

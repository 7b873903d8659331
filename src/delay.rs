// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Delivery delay analysis.
//!
//! The delay of a record is the time between the event and its inclusion on
//! the server. Records delivered later than the threshold were buffered on
//! the device and sent as logged messages.

use crate::record::NormalizedRecord;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Delay analysis configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Delays strictly above this are logged messages.
    pub log_threshold_secs: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            log_threshold_secs: 60.0,
        }
    }
}

/// A record delivered after the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedMessage {
    pub line: usize,
    pub message_type: Option<String>,
    pub event_time: NaiveDateTime,
    pub inclusion_time: NaiveDateTime,
    pub delay_secs: f64,
}

/// Aggregate delay statistics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DelaySummary {
    /// Records with both timestamps.
    pub total: usize,
    /// Records flagged as logged.
    pub logged: usize,
    /// `logged / total` as a percentage, 0 when there is nothing to measure.
    pub logged_percent: f64,
    /// Mean delay of logged records.
    pub mean_logged_delay_secs: f64,
    /// Largest delay among logged records.
    pub max_delay_secs: Option<f64>,
    pub max_delay_line: Option<usize>,
    pub max_delay_message: Option<String>,
}

/// Delay analysis output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DelayReport {
    pub summary: DelaySummary,
    pub messages: Vec<DelayedMessage>,
}

/// Analyze records in the order given.
///
/// Records missing an inclusion time are not counted.
pub fn analyze(records: &[NormalizedRecord], config: &DelayConfig) -> DelayReport {
    let mut total = 0;
    let mut messages = Vec::new();

    for record in records {
        let Some(inclusion) = record.inclusion_time else {
            continue;
        };
        total += 1;
        let delay_secs = (inclusion - record.event_time).num_milliseconds() as f64 / 1000.0;
        if delay_secs > config.log_threshold_secs {
            messages.push(DelayedMessage {
                line: record.line,
                message_type: record.message_type.clone(),
                event_time: record.event_time,
                inclusion_time: inclusion,
                delay_secs,
            });
        }
    }

    let logged = messages.len();
    let logged_percent = if total > 0 {
        logged as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let mean_logged_delay_secs = if logged > 0 {
        messages.iter().map(|m| m.delay_secs).sum::<f64>() / logged as f64
    } else {
        0.0
    };
    // First occurrence wins on ties.
    let max = messages.iter().fold(None::<&DelayedMessage>, |best, m| match best {
        Some(b) if b.delay_secs >= m.delay_secs => Some(b),
        _ => Some(m),
    });

    DelayReport {
        summary: DelaySummary {
            total,
            logged,
            logged_percent,
            mean_logged_delay_secs,
            max_delay_secs: max.map(|m| m.delay_secs),
            max_delay_line: max.map(|m| m.line),
            max_delay_message: max.and_then(|m| m.message_type.clone()),
        },
        messages,
    }
}

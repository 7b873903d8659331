// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Speed plausibility alerts.
//!
//! Two independent checks over the time-ordered stream: reported speed above
//! a ceiling, and any movement while the motion status says the ignition is
//! off. The off window opens on a motion prefix `'1'` and closes on `'2'`.

use crate::record::NormalizedRecord;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Speed alert configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Speeds strictly above this raise an excessive speed alert (km/h).
    pub max_speed_kmh: f64,
    /// Motion prefix that opens the ignition-off window.
    pub off_prefix: char,
    /// Motion prefix that closes it.
    pub on_prefix: char,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            max_speed_kmh: 150.0,
            off_prefix: '1',
            on_prefix: '2',
        }
    }
}

/// Kind of speed alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedAlertKind {
    Excessive,
    MovingWithIgnitionOff,
}

impl fmt::Display for SpeedAlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedAlertKind::Excessive => f.write_str("Excessive"),
            SpeedAlertKind::MovingWithIgnitionOff => f.write_str("MovingWithIgnitionOff"),
        }
    }
}

/// A speed alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedAlert {
    pub kind: SpeedAlertKind,
    pub line: usize,
    pub event_time: NaiveDateTime,
    pub message_type: Option<String>,
    pub speed: f64,
}

/// Scan a time-ordered stream. One record may raise both alerts.
pub fn scan(records: &[NormalizedRecord], config: &SpeedConfig) -> Vec<SpeedAlert> {
    let mut alerts = Vec::new();
    let mut ignition_off = false;

    for record in records {
        match record.motion_prefix() {
            Some(p) if p == config.off_prefix => ignition_off = true,
            Some(p) if p == config.on_prefix => ignition_off = false,
            _ => {}
        }

        let Some(speed) = record.speed else {
            continue;
        };
        let alert = |kind| SpeedAlert {
            kind,
            line: record.line,
            event_time: record.event_time,
            message_type: record.message_type.clone(),
            speed,
        };
        if speed > config.max_speed_kmh {
            alerts.push(alert(SpeedAlertKind::Excessive));
        }
        if ignition_off && speed > 0.0 {
            alerts.push(alert(SpeedAlertKind::MovingWithIgnitionOff));
        }
    }
    alerts
}

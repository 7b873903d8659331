// Tracklog Testdata - Fault scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fault scenario definitions for testing the derivation engine.
//!
//! A scenario pairs a generator configuration (faults included) with the
//! counts the engine is expected to report for the generated log.

use crate::dataset::DeviceLog;
use crate::faults::{FaultConfig, FaultType};
use crate::generator::{generate_log, GeneratorConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracklog::{AnomalyKind, EngineReport, SpeedAlertKind};

/// Fault scenario definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Generator configuration, faults included.
    pub config: GeneratorConfig,
    /// Expected engine output.
    #[serde(default)]
    pub expected: ScenarioExpectations,
}

/// Expected counts in an engine report. `None` means not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioExpectations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trips: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaps: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeats: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_violations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence_anomalies: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reboots: Option<usize>,
    /// Messages over the delay threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excessive_speed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_with_ignition_off: Option<usize>,
}

impl ScenarioExpectations {
    /// Expectations of a fault-free log with `trips` trips.
    pub fn clean(trips: usize) -> Self {
        Self {
            cycles: Some(trips),
            trips: Some(trips),
            gaps: Some(0),
            repeats: Some(0),
            resets: Some(0),
            order_violations: Some(0),
            cadence_anomalies: Some(0),
            reboots: Some(0),
            logged: Some(0),
            excessive_speed: Some(0),
            moving_with_ignition_off: Some(0),
        }
    }

    /// Compare against a report.
    pub fn validate(&self, report: &EngineReport) -> ValidationOutcome {
        let checks = [
            ("cycles", self.cycles, report.cycles.len()),
            ("trips", self.trips, report.trips.len()),
            ("gaps", self.gaps, report.anomalies_of(AnomalyKind::Gap).count()),
            ("repeats", self.repeats, report.anomalies_of(AnomalyKind::Repeat).count()),
            ("resets", self.resets, report.anomalies_of(AnomalyKind::Reset).count()),
            (
                "order_violations",
                self.order_violations,
                report
                    .anomalies_of(AnomalyKind::TemporalOrderViolation)
                    .count(),
            ),
            (
                "cadence_anomalies",
                self.cadence_anomalies,
                report.cadence_anomalies().count(),
            ),
            ("reboots", self.reboots, report.reboots.len()),
            ("logged", self.logged, report.delay.summary.logged),
            (
                "excessive_speed",
                self.excessive_speed,
                report.speed_alerts_of(SpeedAlertKind::Excessive).count(),
            ),
            (
                "moving_with_ignition_off",
                self.moving_with_ignition_off,
                report
                    .speed_alerts_of(SpeedAlertKind::MovingWithIgnitionOff)
                    .count(),
            ),
        ];

        let failures: Vec<String> = checks
            .iter()
            .filter_map(|(name, expected, actual)| match expected {
                Some(e) if e != actual => {
                    Some(format!("{}: expected {}, got {}", name, e, actual))
                }
                _ => None,
            })
            .collect();

        ValidationOutcome {
            passed: failures.is_empty(),
            failures,
        }
    }
}

/// Result of comparing a report against expectations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub failures: Vec<String>,
}

impl Scenario {
    /// Load scenario from JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save scenario to JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Generate the scenario's log.
    pub fn generate(&self) -> DeviceLog {
        let mut log = generate_log(&self.config).with_name(&self.name);
        log.metadata.description = Some(self.description.clone());
        log
    }

    fn faulty(name: &str, description: &str, fault: FaultType, at_row: usize) -> Self {
        let config = base_config().with_fault(FaultConfig::new(fault, at_row));
        Self {
            name: name.to_string(),
            description: description.to_string(),
            expected: ScenarioExpectations::clean(config.num_trips),
            config,
        }
    }

    /// Three trips without faults.
    pub fn clean() -> Self {
        let config = base_config();
        Self {
            name: "clean".to_string(),
            description: "Three trips with exact cadence and contiguous sequence".to_string(),
            expected: ScenarioExpectations::clean(config.num_trips),
            config,
        }
    }

    /// A moving report is lost.
    pub fn dropped_report() -> Self {
        let mut s = Self::faulty(
            "dropped_report",
            "Second moving report of the first trip is lost",
            FaultType::DroppedReport,
            2,
        );
        s.expected.gaps = Some(1);
        s.expected.cadence_anomalies = Some(1);
        s
    }

    /// A row is delivered twice.
    pub fn duplicate_row() -> Self {
        let mut s = Self::faulty(
            "duplicate_row",
            "First moving report is delivered twice",
            FaultType::DuplicateRow,
            1,
        );
        s.expected.repeats = Some(1);
        s
    }

    /// The sequence counter restarts near its top.
    pub fn counter_reset() -> Self {
        let mut s = Self::faulty(
            "counter_reset",
            "Sequence counter restarts from zero after 65009",
            FaultType::CounterReset { restart_at: 0 },
            10,
        );
        s.config.start_sequence = 65_000;
        s.expected.resets = Some(1);
        s
    }

    /// A report arrives fifteen minutes late.
    pub fn late_delivery() -> Self {
        let mut s = Self::faulty(
            "late_delivery",
            "Third moving report is buffered for fifteen minutes",
            FaultType::LateDelivery { delay_secs: 900 },
            3,
        );
        s.expected.logged = Some(1);
        s
    }

    /// The device reboots during a trip.
    pub fn reboot() -> Self {
        let mut s = Self::faulty(
            "reboot",
            "Watchdog reboot during the first trip",
            FaultType::Reboot { reason: 3 },
            4,
        );
        s.expected.reboots = Some(1);
        s
    }

    /// A moving report carries an implausible speed.
    pub fn speeding() -> Self {
        let mut s = Self::faulty(
            "speeding",
            "Third moving report at 220 km/h",
            FaultType::Speeding { kmh: 220.0 },
            3,
        );
        s.expected.excessive_speed = Some(1);
        s
    }

    /// A report's clock runs an hour behind.
    pub fn clock_skew() -> Self {
        let mut s = Self::faulty(
            "clock_skew",
            "Second moving report stamped an hour early",
            FaultType::ClockSkew { secs: -3600 },
            2,
        );
        // The skewed row sorts before the ignition on: two gaps around it,
        // one stretched moving interval and one long delivery delay.
        s.expected.gaps = Some(2);
        s.expected.cadence_anomalies = Some(1);
        s.expected.logged = Some(1);
        s
    }
}

fn base_config() -> GeneratorConfig {
    GeneratorConfig::new().with_seed(42).with_num_trips(3)
}

/// Collection of predefined scenarios.
pub fn predefined_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::clean(),
        Scenario::dropped_report(),
        Scenario::duplicate_row(),
        Scenario::counter_reset(),
        Scenario::late_delivery(),
        Scenario::reboot(),
        Scenario::speeding(),
        Scenario::clock_skew(),
    ]
}

// Tracklog Testdata - Synthetic device log generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Tracklog Testdata
//!
//! Synthetic event log generator for the Tracklog engine.
//!
//! Generated logs follow a tracker's life: ignition on, moving reports,
//! ignition off, economy reports while parked. Faults can be injected at
//! given rows to exercise the engine's detectors:
//!
//! - **Sequence faults**: gaps, counter resets, duplicate deliveries
//! - **Timing faults**: dropped reports, clock skew, late delivery
//! - **Device events**: reboots, implausible speeds
//!
//! ## Quick Start
//!
//! ```rust
//! use tracklog_testdata::{generate_log, FaultConfig, FaultType, GeneratorConfig};
//!
//! let config = GeneratorConfig::new()
//!     .with_num_trips(2)
//!     .with_seed(42)
//!     .with_fault(FaultConfig::new(FaultType::DuplicateRow, 1));
//!
//! let log = generate_log(&config);
//! let report = tracklog::Engine::default()
//!     .run(&log.to_raw_table("generated.csv"))
//!     .unwrap();
//!
//! assert_eq!(report.cycles.len(), 2);
//! assert_eq!(report.duplicates_removed, 1);
//! ```
//!
//! ## Scenarios
//!
//! [`scenario::predefined_scenarios`] lists faulty logs together with the
//! counts the engine should report for them.

pub mod dataset;
pub mod faults;
pub mod generator;
pub mod scenario;

// Re-exports for convenience
pub use dataset::{DatasetError, DeviceLog, LogMetadata, LogRow, EXPORT_DATE_FORMAT};
pub use faults::{FaultConfig, FaultType};
pub use generator::{generate_log, GeneratorConfig, LogBuilder};
pub use scenario::{predefined_scenarios, Scenario, ScenarioExpectations, ValidationOutcome};

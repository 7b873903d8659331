//! # Tracklog - Device log derivation engine
//!
//! Derives operational facts from the event log exported by a vehicle
//! tracking platform for one device.
//!
//! ## Key Features
//!
//! - **Normalization**: typed records, deduplicated by sequence number and
//!   ordered by event time
//! - **Classification**: a declarative policy table maps message types,
//!   event codes and motion status to ignition and periodic-report categories
//! - **Ignition tracking**: cycle pairing and periodic-report cadence checks
//! - **Trips**: odometer deltas per cycle, classified by distance and summed
//!   per day
//! - **Sequence integrity**: resets, repeats, gaps and ordering violations
//!
//! ## Quick Start
//!
//! ```rust
//! use tracklog::{Engine, EngineConfig, Field, RawRecord, RawTable};
//!
//! let mut table = RawTable::with_all_columns("device.csv");
//! table.push(
//!     RawRecord::new(2)
//!         .with(Field::Sequence, "1")
//!         .with(Field::EventTime, "2024-05-01 08:00:00")
//!         .with(Field::MessageType, "GTIGN")
//!         .with(Field::Odometer, "100.0"),
//! );
//! table.push(
//!     RawRecord::new(3)
//!         .with(Field::Sequence, "2")
//!         .with(Field::EventTime, "2024-05-01 08:40:00")
//!         .with(Field::MessageType, "GTIGF")
//!         .with(Field::Odometer, "112.5"),
//! );
//!
//! let engine = Engine::new(EngineConfig::default());
//! let report = engine.run(&table).unwrap();
//!
//! assert_eq!(report.cycles.len(), 1);
//! assert!((report.trips[0].distance - 12.5).abs() < 1e-9);
//! ```
//!
//! ## Modules
//!
//! - [`record`]: Raw and normalized record types, value parsing
//! - [`normalizer`]: Coercion, deduplication and ordering
//! - [`classifier`] and [`policy`]: Event categories and the device policy table
//! - [`ignition`]: Ignition state tracking and cycle pairing
//! - [`trip`]: Trip segmentation and daily sums
//! - [`sequence`]: Sequence integrity checks
//! - [`delay`], [`reboot`], [`speed`]: Delivery delay, reboot and speed detectors
//! - [`report`]: Output tables
//! - [`engine`]: Orchestration of one run

// Modules
pub mod classifier;
pub mod config;
pub mod delay;
pub mod engine;
pub mod error;
pub mod ignition;
pub mod normalizer;
pub mod policy;
pub mod reboot;
pub mod record;
pub mod report;
pub mod sequence;
pub mod speed;
pub mod trip;

// Re-exports for convenient access
pub use classifier::{Category, ClassifiedEvent, Classifier, PeriodicKind};
pub use config::EngineConfig;
pub use delay::{DelayConfig, DelayReport, DelaySummary, DelayedMessage};
pub use engine::Engine;
pub use error::{EngineError, Result, RowError};
pub use ignition::{
    pair_cycles, step, Boundary, CadenceInterval, IgnitionCycle, IgnitionState, IgnitionTracker,
    TrackerState, TrackingResult,
};
pub use normalizer::{normalize_records, NormalizedBatch, NormalizedStream, Normalizer, SkippedRow};
pub use policy::{CadenceConfig, DevicePolicy, PolicyTable, RefinementRule, REFINED_DEVICE_TYPE};
pub use reboot::Reboot;
pub use record::{Field, NormalizedRecord, RawRecord, RawTable};
pub use report::{DailyCountRow, DailyEventCounts, EngineReport, EventCount};
pub use sequence::{AnomalyKind, SequenceAnomaly, SequenceChecker, SequenceConfig};
pub use speed::{SpeedAlert, SpeedAlertKind, SpeedConfig};
pub use trip::{DailyTripSummary, Trip, TripCategory, TripConfig, TripSegmenter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

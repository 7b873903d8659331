// Tracklog Testdata - Core generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Core log generation logic.
//!
//! A generated log is a run of trips. Each trip is an ignition on, moving
//! reports at the moving cadence, an ignition off, then economy reports at
//! the economy cadence until the next trip starts. Without faults the log
//! is clean: contiguous sequence numbers, exact cadence, short delivery
//! delays and plausible speeds.

use crate::dataset::{DeviceLog, LogMetadata, LogRow};
use crate::faults::{apply_all, FaultConfig};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

const BASE_LATITUDE: f64 = -23.5505;
const BASE_LONGITUDE: f64 = -46.6333;

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Event time of the first ignition on.
    pub start: NaiveDateTime,
    /// Number of trips to generate.
    pub num_trips: usize,
    /// Interval between moving reports in seconds.
    pub moving_interval_secs: i64,
    /// Interval between economy reports in seconds.
    pub economy_interval_secs: i64,
    /// Fewest moving reports per trip.
    pub min_reports_per_trip: usize,
    /// Most moving reports per trip.
    pub max_reports_per_trip: usize,
    /// Mean speed while moving in km/h.
    pub mean_speed_kmh: f64,
    /// Device type written on every row.
    pub device_type: String,
    /// Sequence number of the first row.
    pub start_sequence: i64,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Faults applied after generation, in order.
    #[serde(default)]
    pub faults: Vec<FaultConfig>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 2, 1)
                .and_then(|d| d.and_hms_opt(6, 0, 0))
                .unwrap_or_default(),
            num_trips: 3,
            moving_interval_secs: 180,
            economy_interval_secs: 3600,
            min_reports_per_trip: 5,
            max_reports_per_trip: 40,
            mean_speed_kmh: 45.0,
            device_type: "802003".to_string(),
            start_sequence: 1,
            seed: None,
            faults: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    /// Create a new generator config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first ignition on time.
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    /// Set number of trips.
    pub fn with_num_trips(mut self, n: usize) -> Self {
        self.num_trips = n;
        self
    }

    /// Set the moving report interval.
    pub fn with_moving_interval_secs(mut self, secs: i64) -> Self {
        self.moving_interval_secs = secs;
        self
    }

    /// Set the economy report interval.
    pub fn with_economy_interval_secs(mut self, secs: i64) -> Self {
        self.economy_interval_secs = secs;
        self
    }

    /// Set the range of moving reports per trip.
    pub fn with_reports_per_trip(mut self, min: usize, max: usize) -> Self {
        self.min_reports_per_trip = min.min(max);
        self.max_reports_per_trip = max.max(min);
        self
    }

    /// Set mean speed.
    pub fn with_mean_speed(mut self, kmh: f64) -> Self {
        self.mean_speed_kmh = kmh;
        self
    }

    /// Set device type.
    pub fn with_device_type(mut self, device_type: &str) -> Self {
        self.device_type = device_type.to_string();
        self
    }

    /// Set first sequence number.
    pub fn with_start_sequence(mut self, sequence: i64) -> Self {
        self.start_sequence = sequence;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Add a fault.
    pub fn with_fault(mut self, fault: FaultConfig) -> Self {
        self.faults.push(fault);
        self
    }
}

/// Running state of the simulated device.
struct DeviceState {
    sequence: i64,
    now: NaiveDateTime,
    odometer: f64,
    latitude: f64,
    longitude: f64,
}

impl DeviceState {
    fn row(
        &mut self,
        config: &GeneratorConfig,
        rng: &mut dyn RngCore,
        message: &str,
        code: &str,
        motion: &str,
        speed: f64,
    ) -> LogRow {
        let mut row = LogRow::new(self.sequence, self.now, message, &config.device_type);
        self.sequence += 1;
        row.event_code = Some(code.to_string());
        row.motion_status = Some(motion.to_string());
        row.odometer = Some((self.odometer * 1000.0).round() / 1000.0);
        row.speed = Some(speed);
        row.latitude = Some(self.latitude);
        row.longitude = Some(self.longitude);
        row.satellites = Some(rng.gen_range(6..=12));
        row.hdop = Some(rng.gen_range(0.8..2.0));
        row.inclusion_time = Some(self.now + Duration::seconds(rng.gen_range(1..=10)));
        row
    }
}

/// Generate a device log.
pub fn generate_log(config: &GeneratorConfig) -> DeviceLog {
    let mut rng: Box<dyn RngCore> = match config.seed {
        Some(s) => Box::new(StdRng::seed_from_u64(s)),
        None => Box::new(StdRng::from_entropy()),
    };

    let mut log = DeviceLog::new();
    log.metadata = LogMetadata {
        name: None,
        description: None,
        seed: config.seed,
        trips: Some(config.num_trips),
    };

    let speed_dist = Normal::new(config.mean_speed_kmh, config.mean_speed_kmh / 4.0).ok();
    let step_dist = Normal::new(0.0, 0.002).ok();
    let mut state = DeviceState {
        sequence: config.start_sequence,
        now: config.start,
        odometer: rng.gen_range(1_000.0..50_000.0),
        latitude: BASE_LATITUDE,
        longitude: BASE_LONGITUDE,
    };
    let moving = Duration::seconds(config.moving_interval_secs);
    let economy = Duration::seconds(config.economy_interval_secs);

    for _ in 0..config.num_trips {
        let row = state.row(config, &mut *rng, "GTIGN", "21", "21", 0.0);
        log.push(row);

        let reports = rng.gen_range(config.min_reports_per_trip..=config.max_reports_per_trip);
        for _ in 0..reports {
            let speed = speed_dist
                .map(|d| d.sample(&mut *rng))
                .unwrap_or(config.mean_speed_kmh)
                .clamp(5.0, 120.0);
            state.now += moving;
            state.odometer += speed * config.moving_interval_secs as f64 / 3600.0;
            if let Some(d) = step_dist {
                state.latitude += d.sample(&mut *rng);
                state.longitude += d.sample(&mut *rng);
            }
            let speed = (speed * 10.0).round() / 10.0;
            let mut row = state.row(config, &mut *rng, "GTERI", "30", "22", speed);
            row.report_type = Some("10".to_string());
            log.push(row);
        }

        state.now += moving;
        let row = state.row(config, &mut *rng, "GTIGF", "20", "11", 0.0);
        log.push(row);

        let parked = rng.gen_range(1..=4);
        for _ in 0..parked {
            state.now += economy;
            let row = state.row(config, &mut *rng, "GTERI", "30", "11", 0.0);
            log.push(row);
        }

        // Next trip starts off the economy grid.
        state.now += Duration::seconds(rng.gen_range(60..config.economy_interval_secs.max(61)));
    }

    apply_all(&mut log, &config.faults);
    log
}

/// Builder for creating logs.
pub struct LogBuilder {
    config: GeneratorConfig,
    name: Option<String>,
    description: Option<String>,
}

impl LogBuilder {
    /// Create a new log builder.
    pub fn new() -> Self {
        Self {
            config: GeneratorConfig::default(),
            name: None,
            description: None,
        }
    }

    /// Set generator configuration.
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a fault.
    pub fn add_fault(mut self, fault: FaultConfig) -> Self {
        self.config.faults.push(fault);
        self
    }

    /// Set log name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Build the log.
    pub fn build(self) -> DeviceLog {
        let mut log = generate_log(&self.config);
        log.metadata.name = self.name;
        log.metadata.description = self.description;
        log
    }
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

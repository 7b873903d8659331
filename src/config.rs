// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.

use crate::delay::DelayConfig;
use crate::error::{EngineError, Result};
use crate::policy::PolicyTable;
use crate::sequence::SequenceConfig;
use crate::speed::SpeedConfig;
use crate::trip::TripConfig;
use serde::{Deserialize, Serialize};

/// Master configuration for one engine run.
///
/// Every section has documented defaults, so a JSON file only needs the
/// values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Classification policy, including per-device cadence.
    pub policy: PolicyTable,

    /// Sequence checker settings (reset threshold 60000).
    pub sequence: SequenceConfig,

    /// Trip distance thresholds (2 km, 50 km).
    pub trips: TripConfig,

    /// Delivery delay threshold (60 s).
    pub delay: DelayConfig,

    /// Speed ceiling (150 km/h).
    pub speed: SpeedConfig,
}

impl EngineConfig {
    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Builder: override the reset threshold.
    pub fn with_reset_threshold(mut self, threshold: i64) -> Self {
        self.sequence.reset_threshold = threshold;
        self
    }

    /// Reject values no run can work with.
    pub fn validate(&self) -> Result<()> {
        if self.sequence.reset_threshold < 0 {
            return Err(EngineError::Config(
                "sequence.reset_threshold must not be negative".into(),
            ));
        }
        if !(self.trips.short_max_km <= self.trips.medium_max_km) {
            return Err(EngineError::Config(
                "trips.short_max_km must not exceed trips.medium_max_km".into(),
            ));
        }
        let cadences = std::iter::once(&self.policy.default_device)
            .chain(self.policy.devices.values())
            .map(|d| &d.cadence);
        for cadence in cadences {
            if cadence.moving_secs <= 0 || cadence.economy_secs <= 0 || cadence.tolerance_secs < 0 {
                return Err(EngineError::Config(
                    "cadence values must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

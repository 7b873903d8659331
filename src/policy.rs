// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Declarative classification policy.
//!
//! Device-specific behaviour is data, not code: a [`PolicyTable`] maps
//! message mnemonics and event codes to base categories, and a per-device
//! [`DevicePolicy`] holds ordered refinement rules for periodic reports and
//! the expected report cadence. Rules are evaluated first-match-wins.

use crate::classifier::{Category, PeriodicKind};
use crate::record::NormalizedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Device type with refined periodic semantics in the default table.
pub const REFINED_DEVICE_TYPE: &str = "802003";

/// Expected cadence of periodic reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Expected seconds between moving periodic reports.
    pub moving_secs: i64,
    /// Expected seconds between economy periodic reports.
    pub economy_secs: i64,
    /// Allowed deviation in seconds before an interval is flagged.
    pub tolerance_secs: i64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            moving_secs: 180,
            economy_secs: 3600,
            tolerance_secs: 0,
        }
    }
}

impl CadenceConfig {
    /// Expected interval for a periodic mode.
    pub fn expected_secs(&self, kind: PeriodicKind) -> Option<i64> {
        match kind {
            PeriodicKind::Moving => Some(self.moving_secs),
            PeriodicKind::Economy => Some(self.economy_secs),
            PeriodicKind::Unrefined => None,
        }
    }

    /// Whether a measured interval deviates from the expected one.
    pub fn is_anomalous(&self, measured_secs: i64, expected_secs: i64) -> bool {
        (measured_secs - expected_secs).abs() > self.tolerance_secs
    }
}

/// A refinement rule for an unrefined periodic report.
///
/// Every condition that is set must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementRule {
    /// Required leading character of the motion status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_prefix: Option<char>,
    /// Required position report type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    /// Required event code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_code: Option<String>,
    /// Resulting mode.
    pub kind: PeriodicKind,
}

impl RefinementRule {
    /// Rule keyed only on the motion prefix.
    pub fn motion(prefix: char, kind: PeriodicKind) -> Self {
        Self {
            motion_prefix: Some(prefix),
            report_type: None,
            event_code: None,
            kind,
        }
    }

    /// Add a report type condition.
    pub fn with_report_type(mut self, report_type: &str) -> Self {
        self.report_type = Some(report_type.to_string());
        self
    }

    /// Whether the rule matches a record.
    pub fn matches(&self, record: &NormalizedRecord) -> bool {
        let prefix_ok = self
            .motion_prefix
            .map_or(true, |p| record.motion_prefix() == Some(p));
        let report_ok = self
            .report_type
            .as_deref()
            .map_or(true, |t| record.report_type.as_deref() == Some(t));
        let code_ok = self
            .event_code
            .as_deref()
            .map_or(true, |c| record.event_code.as_deref() == Some(c));
        prefix_ok && report_ok && code_ok
    }
}

/// Policy for one device type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePolicy {
    /// Whether periodic reports are refined into moving/economy.
    pub refine_periodic: bool,
    /// Ordered refinement rules, first match wins.
    #[serde(default)]
    pub refinements: Vec<RefinementRule>,
    /// Expected report cadence.
    #[serde(default)]
    pub cadence: CadenceConfig,
}

impl Default for DevicePolicy {
    fn default() -> Self {
        Self {
            refine_periodic: false,
            refinements: Vec::new(),
            cadence: CadenceConfig::default(),
        }
    }
}

impl DevicePolicy {
    /// Policy with the motion-prefix refinement rules.
    ///
    /// The third rule is shadowed by the second and never fires; it is kept
    /// so the table reproduces the observed rule order.
    pub fn refined() -> Self {
        Self {
            refine_periodic: true,
            refinements: vec![
                RefinementRule::motion('1', PeriodicKind::Economy),
                RefinementRule::motion('2', PeriodicKind::Moving),
                RefinementRule::motion('2', PeriodicKind::Moving).with_report_type("10"),
            ],
            cadence: CadenceConfig::default(),
        }
    }

    /// First matching refinement for a record.
    pub fn refine(&self, record: &NormalizedRecord) -> Option<PeriodicKind> {
        self.refinements
            .iter()
            .find(|rule| rule.matches(record))
            .map(|rule| rule.kind)
    }
}

/// Classification policy for all device types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    /// Substring of message text meaning "economy mode".
    pub economy_text: String,
    /// Known message mnemonics and their base categories.
    pub messages: BTreeMap<String, Category>,
    /// Event code → message mnemonic, used when message text is absent.
    pub event_codes: BTreeMap<String, String>,
    /// Device-specific policies keyed by canonical device type.
    pub devices: BTreeMap<String, DevicePolicy>,
    /// Policy for device types not listed.
    pub default_device: DevicePolicy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let messages = [
            ("GTIGN", Category::IgnitionOn),
            ("GTIGF", Category::IgnitionOff),
            ("GTERI", Category::PeriodicReport(PeriodicKind::Unrefined)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let event_codes = [("20", "GTIGF"), ("21", "GTIGN"), ("30", "GTERI"), ("27", "GTERI")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut devices = BTreeMap::new();
        devices.insert(REFINED_DEVICE_TYPE.to_string(), DevicePolicy::refined());

        Self {
            economy_text: "MODO ECONÔMICO".to_string(),
            messages,
            event_codes,
            devices,
            default_device: DevicePolicy::default(),
        }
    }
}

impl PolicyTable {
    /// Policy for a device type, falling back to the default.
    pub fn device(&self, device_type: Option<&str>) -> &DevicePolicy {
        device_type
            .and_then(|d| self.devices.get(d))
            .unwrap_or(&self.default_device)
    }

    /// Register or replace a device policy.
    pub fn set_device(&mut self, device_type: &str, policy: DevicePolicy) {
        self.devices.insert(device_type.to_string(), policy);
    }

    /// Base category of non-empty message text.
    pub fn message_category(&self, text: &str) -> Category {
        let upper = text.trim().to_uppercase();
        if upper.is_empty() {
            return Category::Other;
        }
        if upper.contains(&self.economy_text.to_uppercase()) {
            return Category::PeriodicReport(PeriodicKind::Economy);
        }
        self.messages
            .get(&upper)
            .cloned()
            .unwrap_or(Category::Message(upper))
    }

    /// Message mnemonic for an event code.
    pub fn code_message(&self, code: &str) -> Option<&str> {
        self.event_codes.get(code).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> NormalizedRecord {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        NormalizedRecord::new(2, 1, ts)
    }

    #[test]
    fn test_default_table() {
        let table = PolicyTable::default();
        assert!(table.device(Some(REFINED_DEVICE_TYPE)).refine_periodic);
        assert!(!table.device(Some("1")).refine_periodic);
        assert!(!table.device(None).refine_periodic);
        assert_eq!(table.code_message("21"), Some("GTIGN"));
        assert_eq!(table.code_message("99"), None);
    }

    #[test]
    fn test_message_category() {
        let table = PolicyTable::default();
        assert_eq!(table.message_category("gtign"), Category::IgnitionOn);
        assert_eq!(
            table.message_category("Entrou em MODO ECONÔMICO"),
            Category::PeriodicReport(PeriodicKind::Economy)
        );
        assert_eq!(
            table.message_category("GTFRI"),
            Category::Message("GTFRI".to_string())
        );
        assert_eq!(table.message_category("  "), Category::Other);
    }

    #[test]
    fn test_rule_first_match_wins() {
        let policy = DevicePolicy::refined();
        let rec = record().with_motion("210").with_report_type("10");
        assert_eq!(policy.refine(&rec), Some(PeriodicKind::Moving));
        let rec = record().with_motion("110").with_report_type("10");
        assert_eq!(policy.refine(&rec), Some(PeriodicKind::Economy));
        assert_eq!(policy.refine(&record().with_motion("310")), None);
    }

    #[test]
    fn test_rule_conditions_all_required() {
        let rule = RefinementRule::motion('2', PeriodicKind::Moving).with_report_type("10");
        assert!(rule.matches(&record().with_motion("200").with_report_type("10")));
        assert!(!rule.matches(&record().with_motion("200").with_report_type("11")));
        assert!(!rule.matches(&record().with_motion("200")));
    }

    #[test]
    fn test_cadence_tolerance() {
        let cadence = CadenceConfig {
            tolerance_secs: 5,
            ..Default::default()
        };
        assert!(!cadence.is_anomalous(184, 180));
        assert!(cadence.is_anomalous(186, 180));
        assert!(CadenceConfig::default().is_anomalous(181, 180));
        assert_eq!(cadence.expected_secs(PeriodicKind::Unrefined), None);
    }

    #[test]
    fn test_policy_serialization() {
        let table = PolicyTable::default();
        let json = serde_json::to_string(&table).unwrap();
        let parsed: PolicyTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, table);
    }
}

// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Event classification
//!
//! Maps one normalized record, plus the file's device type, to a semantic
//! [`Category`]. Classification is a pure function of the record and the
//! [`PolicyTable`]; it never fails; ambiguous input becomes
//! [`Category::Other`].

use crate::normalizer::NormalizedStream;
use crate::policy::PolicyTable;
use crate::record::NormalizedRecord;
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mode of a periodic position report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodicKind {
    /// Sent at a fixed cadence while the ignition is on
    Moving,
    /// Sent at a fixed cadence while parked (economy mode)
    Economy,
    /// Periodic report whose mode the device policy does not resolve
    Unrefined,
}

/// Semantic category of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Ignition switched on
    IgnitionOn,
    /// Ignition switched off
    IgnitionOff,
    /// Periodic position report
    PeriodicReport(PeriodicKind),
    /// Message type text with no semantic mapping; the text is its own category
    Message(String),
    /// Nothing to classify on
    Other,
}

impl Category {
    /// Label used in count tables
    pub fn label(&self) -> &str {
        match self {
            Category::IgnitionOn => "IgnitionOn",
            Category::IgnitionOff => "IgnitionOff",
            Category::PeriodicReport(PeriodicKind::Moving) => "MovingPeriodic",
            Category::PeriodicReport(PeriodicKind::Economy) => "EconomyMode",
            Category::PeriodicReport(PeriodicKind::Unrefined) => "PeriodicReport",
            Category::Message(text) => text,
            Category::Other => "Other",
        }
    }

    /// Whether this is an ignition boundary
    pub fn is_boundary(&self) -> bool {
        matches!(self, Category::IgnitionOn | Category::IgnitionOff)
    }

    /// Periodic mode, if this is a periodic report
    pub fn periodic_kind(&self) -> Option<PeriodicKind> {
        match self {
            Category::PeriodicReport(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A normalized record with its category
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent<'a> {
    pub record: &'a NormalizedRecord,
    pub category: Category,
}

impl<'a> ClassifiedEvent<'a> {
    /// Display label, backfilling `Other` from the raw message text.
    pub fn label(&self) -> &str {
        match (&self.category, self.record.message_type.as_deref()) {
            (Category::Other, Some(text)) => text,
            (category, _) => category.label(),
        }
    }
}

/// Policy-driven event classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    policy: PolicyTable,
}

impl Classifier {
    /// Create a classifier with the default policy table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with a custom policy table
    pub fn with_policy(policy: PolicyTable) -> Self {
        Self { policy }
    }

    /// Get the policy table
    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Classify one record
    pub fn classify(&self, record: &NormalizedRecord, device_type: Option<&str>) -> Category {
        let base = self.base_category(record);

        let category = match base {
            Category::PeriodicReport(PeriodicKind::Unrefined) => {
                let device = self.policy.device(device_type);
                if device.refine_periodic {
                    device
                        .refine(record)
                        .map(Category::PeriodicReport)
                        .unwrap_or(base)
                } else {
                    base
                }
            }
            other => other,
        };

        if category == Category::Other {
            trace!(
                "line {}: no classification for message {:?} / code {:?}",
                record.line,
                record.message_type,
                record.event_code
            );
        }
        category
    }

    /// Classify every record of a stream, preserving order
    pub fn classify_stream<'a>(
        &self,
        stream: &'a NormalizedStream,
        device_type: Option<&str>,
    ) -> Vec<ClassifiedEvent<'a>> {
        stream
            .iter()
            .map(|record| ClassifiedEvent {
                record,
                category: self.classify(record, device_type),
            })
            .collect()
    }

    /// Category from message text, falling back to the event-code lookup
    fn base_category(&self, record: &NormalizedRecord) -> Category {
        if let Some(text) = record.message_type.as_deref() {
            return self.policy.message_category(text);
        }
        record
            .event_code
            .as_deref()
            .and_then(|code| self.policy.code_message(code))
            .map(|message| self.policy.message_category(message))
            .unwrap_or(Category::Other)
    }
}

// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Tracklog
//!
//! File-level errors ([`EngineError`]) abort the run for one file. Row-level
//! errors ([`RowError`]) are recovered by dropping the offending row and are
//! only reported as part of the normalization summary.

use crate::record::Field;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Fatal errors for one input file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No supported text encoding or CSV parse succeeded
    #[error("File unreadable: {source_name}: {reason}")]
    FileUnreadable { source_name: String, reason: String },

    /// A mandatory column is absent from the header
    #[error("Schema error: missing mandatory column(s) {}", format_fields(.missing))]
    Schema { missing: Vec<Field> },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Create a FileUnreadable error
    pub fn unreadable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FileUnreadable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Per-row coercion failures, recovered by skipping the row
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RowError {
    /// A mandatory value is empty
    #[error("missing value for {0}")]
    MissingField(Field),

    /// Event timestamp could not be parsed
    #[error("invalid event timestamp '{0}'")]
    InvalidTimestamp(String),

    /// Sequence number could not be parsed as an integer
    #[error("invalid sequence number '{0}'")]
    InvalidSequence(String),
}

fn format_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| format!("'{}'", f.header()))
        .collect::<Vec<_>>()
        .join(", ")
}

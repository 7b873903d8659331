// Tracklog - Device log derivation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Record types: raw decoded rows and their typed, normalized form.
//!
//! Column names follow the locale the tracking platform exports in
//! (`Sequência`, `Data/Hora Evento`, ...). Raw rows carry every field as
//! optional text; [`NormalizedRecord`] carries parsed values.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Input columns understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Sequence,
    EventTime,
    InclusionTime,
    MessageType,
    EventCode,
    MotionStatus,
    ReportType,
    Odometer,
    DeviceType,
    Latitude,
    Longitude,
    Satellites,
    Hdop,
    Speed,
    PowerOnReason,
}

impl Field {
    /// All known fields, in export column order.
    pub const ALL: [Field; 15] = [
        Field::Sequence,
        Field::EventTime,
        Field::InclusionTime,
        Field::MessageType,
        Field::EventCode,
        Field::MotionStatus,
        Field::ReportType,
        Field::Odometer,
        Field::DeviceType,
        Field::Latitude,
        Field::Longitude,
        Field::Satellites,
        Field::Hdop,
        Field::Speed,
        Field::PowerOnReason,
    ];

    /// Fields whose absence from the header is a schema error.
    pub const MANDATORY: [Field; 2] = [Field::EventTime, Field::Sequence];

    /// Column header as exported by the platform.
    pub fn header(&self) -> &'static str {
        match self {
            Field::Sequence => "Sequência",
            Field::EventTime => "Data/Hora Evento",
            Field::InclusionTime => "Data/Hora Inclusão",
            Field::MessageType => "Tipo Mensagem",
            Field::EventCode => "Event Code",
            Field::MotionStatus => "Motion Status",
            Field::ReportType => "Position Report Type",
            Field::Odometer => "Hodômetro Total",
            Field::DeviceType => "Tipo Dispositivo",
            Field::Latitude => "Latitude",
            Field::Longitude => "Longitude",
            Field::Satellites => "Satélites",
            Field::Hdop => "Precisão GNSS",
            Field::Speed => "Velocidade",
            Field::PowerOnReason => "Motivo Power On",
        }
    }

    /// Resolve a header cell, ignoring surrounding whitespace and case.
    pub fn from_header(header: &str) -> Option<Field> {
        let wanted = header.trim().trim_start_matches('\u{feff}').to_lowercase();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.header().to_lowercase() == wanted)
    }

    /// Whether the field is mandatory.
    pub fn is_mandatory(&self) -> bool {
        Field::MANDATORY.contains(self)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// One decoded input row. Every value is the cell text as supplied by the
/// decoding adapter; empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// 1-based source line (header is line 1).
    pub line: usize,
    pub sequence: Option<String>,
    pub event_time: Option<String>,
    pub inclusion_time: Option<String>,
    pub message_type: Option<String>,
    pub event_code: Option<String>,
    pub motion_status: Option<String>,
    pub report_type: Option<String>,
    pub odometer: Option<String>,
    pub device_type: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub satellites: Option<String>,
    pub hdop: Option<String>,
    pub speed: Option<String>,
    pub power_on_reason: Option<String>,
}

impl RawRecord {
    /// Create an empty row for a source line.
    pub fn new(line: usize) -> Self {
        Self {
            line,
            ..Default::default()
        }
    }

    /// Set a field from cell text. Blank text is stored as `None`.
    pub fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        let value = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
        *self.slot_mut(field) = value;
    }

    /// Builder form of [`RawRecord::set`].
    pub fn with(mut self, field: Field, value: &str) -> Self {
        self.set(field, value);
        self
    }

    /// Get a field's text.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::Sequence => &self.sequence,
            Field::EventTime => &self.event_time,
            Field::InclusionTime => &self.inclusion_time,
            Field::MessageType => &self.message_type,
            Field::EventCode => &self.event_code,
            Field::MotionStatus => &self.motion_status,
            Field::ReportType => &self.report_type,
            Field::Odometer => &self.odometer,
            Field::DeviceType => &self.device_type,
            Field::Latitude => &self.latitude,
            Field::Longitude => &self.longitude,
            Field::Satellites => &self.satellites,
            Field::Hdop => &self.hdop,
            Field::Speed => &self.speed,
            Field::PowerOnReason => &self.power_on_reason,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Sequence => &mut self.sequence,
            Field::EventTime => &mut self.event_time,
            Field::InclusionTime => &mut self.inclusion_time,
            Field::MessageType => &mut self.message_type,
            Field::EventCode => &mut self.event_code,
            Field::MotionStatus => &mut self.motion_status,
            Field::ReportType => &mut self.report_type,
            Field::Odometer => &mut self.odometer,
            Field::DeviceType => &mut self.device_type,
            Field::Latitude => &mut self.latitude,
            Field::Longitude => &mut self.longitude,
            Field::Satellites => &mut self.satellites,
            Field::Hdop => &mut self.hdop,
            Field::Speed => &mut self.speed,
            Field::PowerOnReason => &mut self.power_on_reason,
        }
    }
}

/// A decoded input file: the columns present in its header plus its rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Name of the source (usually the file name), used in messages.
    pub source_name: String,
    /// Known columns present in the header.
    pub columns: BTreeSet<Field>,
    /// Rows in file order.
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    /// Create a table with the given columns and no rows.
    pub fn new(source_name: impl Into<String>, columns: impl IntoIterator<Item = Field>) -> Self {
        Self {
            source_name: source_name.into(),
            columns: columns.into_iter().collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table that declares every known column.
    pub fn with_all_columns(source_name: impl Into<String>) -> Self {
        Self::new(source_name, Field::ALL)
    }

    /// Append a row.
    pub fn push(&mut self, row: RawRecord) {
        self.rows.push(row);
    }

    /// Whether a column is present.
    pub fn has_column(&self, field: Field) -> bool {
        self.columns.contains(&field)
    }

    /// Mandatory columns missing from the header.
    pub fn missing_mandatory(&self) -> Vec<Field> {
        Field::MANDATORY
            .iter()
            .copied()
            .filter(|f| !self.has_column(*f))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A row with parsed timestamps and numerics.
///
/// Mandatory values (`sequence`, `event_time`) are always present; every
/// other value is `None` when absent or unparseable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub line: usize,
    pub sequence: i64,
    pub event_time: NaiveDateTime,
    pub inclusion_time: Option<NaiveDateTime>,
    /// Message type, trimmed and upper-cased.
    pub message_type: Option<String>,
    /// Event code in canonical form.
    pub event_code: Option<String>,
    /// Motion status as text; its leading digit is the coarse ignition signal.
    pub motion_status: Option<String>,
    /// Position report type in canonical form.
    pub report_type: Option<String>,
    pub odometer: Option<f64>,
    /// Device type in canonical form.
    pub device_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub satellites: Option<u32>,
    pub hdop: Option<f64>,
    pub speed: Option<f64>,
    pub power_on_reason: Option<i64>,
}

impl NormalizedRecord {
    /// Minimal record with only mandatory values, mostly for tests and
    /// synthetic inputs.
    pub fn new(line: usize, sequence: i64, event_time: NaiveDateTime) -> Self {
        Self {
            line,
            sequence,
            event_time,
            inclusion_time: None,
            message_type: None,
            event_code: None,
            motion_status: None,
            report_type: None,
            odometer: None,
            device_type: None,
            latitude: None,
            longitude: None,
            satellites: None,
            hdop: None,
            speed: None,
            power_on_reason: None,
        }
    }

    /// Leading character of the motion status code.
    pub fn motion_prefix(&self) -> Option<char> {
        self.motion_status.as_deref().and_then(|m| m.chars().next())
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message_type = normalize_message(message);
        self
    }

    pub fn with_event_code(mut self, code: &str) -> Self {
        self.event_code = canonical_code(code);
        self
    }

    pub fn with_motion(mut self, motion: &str) -> Self {
        self.motion_status = parse_motion(motion);
        self
    }

    pub fn with_report_type(mut self, report_type: &str) -> Self {
        self.report_type = canonical_code(report_type);
        self
    }

    pub fn with_odometer(mut self, odometer: f64) -> Self {
        self.odometer = Some(odometer);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_device_type(mut self, device_type: &str) -> Self {
        self.device_type = canonical_code(device_type);
        self
    }

    pub fn with_inclusion_time(mut self, inclusion_time: NaiveDateTime) -> Self {
        self.inclusion_time = Some(inclusion_time);
        self
    }

    pub fn with_power_on_reason(mut self, reason: i64) -> Self {
        self.power_on_reason = Some(reason);
        self
    }
}

const NAIVE_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a device timestamp as local wall time.
///
/// RFC 3339 inputs keep their wall-clock value and drop the offset, so a file
/// mixing both forms still orders consistently.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.naive_local())
}

/// Parse a float, returning `None` for blank, unparseable or non-finite text.
pub fn parse_f64(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse an integer, accepting integral float text such as `"42.0"`.
pub fn parse_i64(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Some(value);
    }
    let value = parse_f64(text)?;
    (value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

/// Canonical string form of a code-like cell: numeric text collapses to its
/// integer form (`"802003.0"` → `"802003"`), anything else is trimmed.
pub fn canonical_code(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match parse_f64(text) {
        Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Some((value as i64).to_string())
        }
        _ => Some(text.to_string()),
    }
}

/// Motion status text. Spreadsheet exports sometimes render the code as a
/// float; the integral part is kept so the leading digit survives.
pub fn parse_motion(text: &str) -> Option<String> {
    canonical_code(text)
}

/// Message type text, trimmed and upper-cased.
pub fn normalize_message(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(text.to_uppercase())
    }
}

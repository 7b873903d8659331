// Tracklog Testdata - Device log structures
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Device log structures and I/O operations.
//!
//! Provides the `DeviceLog` type for storing generated rows and exporting
//! them with the column headers and date format of the platform export.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracklog::record::{canonical_code, parse_f64, parse_i64, parse_timestamp};
use tracklog::{Field, RawRecord, RawTable};

/// Date format of the platform export.
pub const EXPORT_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Device log error types.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error at line {line}: {message}")]
    CsvParse { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Empty log")]
    Empty,
}

/// One row of a device log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub sequence: i64,
    pub event_time: NaiveDateTime,
    pub inclusion_time: Option<NaiveDateTime>,
    pub message_type: String,
    pub event_code: Option<String>,
    pub motion_status: Option<String>,
    pub report_type: Option<String>,
    /// Cumulative odometer (km).
    pub odometer: Option<f64>,
    pub device_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub satellites: Option<u32>,
    pub hdop: Option<f64>,
    /// Speed (km/h).
    pub speed: Option<f64>,
    pub power_on_reason: Option<i64>,
}

impl LogRow {
    /// Create a row with only the mandatory values and a message type.
    pub fn new(sequence: i64, event_time: NaiveDateTime, message_type: &str, device_type: &str) -> Self {
        Self {
            sequence,
            event_time,
            inclusion_time: None,
            message_type: message_type.to_string(),
            event_code: None,
            motion_status: None,
            report_type: None,
            odometer: None,
            device_type: device_type.to_string(),
            latitude: None,
            longitude: None,
            satellites: None,
            hdop: None,
            speed: None,
            power_on_reason: None,
        }
    }

    /// Cell text for a column, as the platform exports it.
    pub fn cell(&self, field: Field) -> Option<String> {
        match field {
            Field::Sequence => Some(self.sequence.to_string()),
            Field::EventTime => Some(self.event_time.format(EXPORT_DATE_FORMAT).to_string()),
            Field::InclusionTime => self
                .inclusion_time
                .map(|t| t.format(EXPORT_DATE_FORMAT).to_string()),
            Field::MessageType => Some(self.message_type.clone()),
            Field::EventCode => self.event_code.clone(),
            Field::MotionStatus => self.motion_status.clone(),
            Field::ReportType => self.report_type.clone(),
            Field::Odometer => self.odometer.map(|v| format!("{:.3}", v)),
            Field::DeviceType => Some(self.device_type.clone()),
            Field::Latitude => self.latitude.map(|v| format!("{:.6}", v)),
            Field::Longitude => self.longitude.map(|v| format!("{:.6}", v)),
            Field::Satellites => self.satellites.map(|v| v.to_string()),
            Field::Hdop => self.hdop.map(|v| format!("{:.1}", v)),
            Field::Speed => self.speed.map(|v| format!("{:.1}", v)),
            Field::PowerOnReason => self.power_on_reason.map(|v| v.to_string()),
        }
    }

    /// Parse a row back from cell text.
    fn from_cells(cells: &[(Field, &str)], line: usize) -> Result<Self, DatasetError> {
        let get = |field: Field| {
            cells
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, v)| v.trim())
                .filter(|v| !v.is_empty())
        };
        let parse_err = |message: &str| DatasetError::CsvParse {
            line,
            message: message.to_string(),
        };

        let sequence = get(Field::Sequence)
            .and_then(parse_i64)
            .ok_or_else(|| parse_err("invalid sequence"))?;
        let event_time = get(Field::EventTime)
            .and_then(parse_timestamp)
            .ok_or_else(|| parse_err("invalid event time"))?;

        Ok(Self {
            sequence,
            event_time,
            inclusion_time: get(Field::InclusionTime).and_then(parse_timestamp),
            message_type: get(Field::MessageType).unwrap_or_default().to_string(),
            event_code: get(Field::EventCode).and_then(canonical_code),
            motion_status: get(Field::MotionStatus).map(str::to_string),
            report_type: get(Field::ReportType).and_then(canonical_code),
            odometer: get(Field::Odometer).and_then(parse_f64),
            device_type: get(Field::DeviceType).unwrap_or_default().to_string(),
            latitude: get(Field::Latitude).and_then(parse_f64),
            longitude: get(Field::Longitude).and_then(parse_f64),
            satellites: get(Field::Satellites)
                .and_then(parse_i64)
                .and_then(|v| u32::try_from(v).ok()),
            hdop: get(Field::Hdop).and_then(parse_f64),
            speed: get(Field::Speed).and_then(parse_f64),
            power_on_reason: get(Field::PowerOnReason).and_then(parse_i64),
        })
    }
}

/// Log metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Log name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Generation seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Number of ignition cycles generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trips: Option<usize>,
}

/// A device event log in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceLog {
    /// Data rows.
    pub rows: Vec<LogRow>,
    /// Metadata.
    #[serde(default)]
    pub metadata: LogMetadata,
}

impl DeviceLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn push(&mut self, row: LogRow) {
        self.rows.push(row);
    }

    /// Get all rows.
    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Get number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Set name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.metadata.name = Some(name.to_string());
        self
    }

    /// Rows with a given message type.
    pub fn count_message(&self, message_type: &str) -> usize {
        self.rows
            .iter()
            .filter(|r| r.message_type == message_type)
            .count()
    }

    /// Convert to the engine's input table. Line numbers follow the CSV
    /// export (header is line 1).
    pub fn to_raw_table(&self, source_name: &str) -> RawTable {
        let mut table = RawTable::with_all_columns(source_name);
        for (i, row) in self.rows.iter().enumerate() {
            let mut raw = RawRecord::new(i + 2);
            for field in Field::ALL {
                if let Some(cell) = row.cell(field) {
                    raw.set(field, &cell);
                }
            }
            table.push(raw);
        }
        table
    }

    /// Write CSV to any writer.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut writer = BufWriter::new(writer);

        // Header
        let header: Vec<&str> = Field::ALL.iter().map(|f| f.header()).collect();
        writeln!(writer, "{}", header.join(","))?;

        // Data rows
        for row in &self.rows {
            let cells: Vec<String> = Field::ALL
                .iter()
                .map(|f| row.cell(*f).unwrap_or_default())
                .collect();
            writeln!(writer, "{}", cells.join(","))?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export to CSV file.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        self.write_csv(File::create(path)?)
    }

    /// Read CSV from any reader.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut lines = BufReader::new(reader).lines();

        // Parse header
        let header = lines.next().ok_or(DatasetError::Empty)??;
        let columns: Vec<Option<Field>> = header.split(',').map(Field::from_header).collect();
        for mandatory in Field::MANDATORY {
            if !columns.contains(&Some(mandatory)) {
                return Err(DatasetError::MissingColumn(mandatory.header().to_string()));
            }
        }

        // Parse data rows
        let mut log = DeviceLog::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<(Field, &str)> = columns
                .iter()
                .zip(line.split(','))
                .filter_map(|(field, value)| field.map(|f| (f, value)))
                .collect();
            log.push(LogRow::from_cells(&cells, i + 2)?);
        }
        Ok(log)
    }

    /// Import from CSV file.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        Self::read_csv(File::open(path)?)
    }

    /// Export to JSON file.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Import from JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

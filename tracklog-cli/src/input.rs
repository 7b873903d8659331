// Tracklog CLI - Input decoding
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Export file decoding.
//!
//! Exports arrive as UTF-8 (sometimes with a byte-order mark) or Latin-1.
//! Text is decoded here and parsed into a [`RawTable`]; the engine never
//! sees bytes.

use crate::error::CliError;
use std::fs;
use std::path::Path;
use tracing::debug;
use tracklog::{EngineError, Field, RawRecord, RawTable};

/// Decode export bytes: UTF-8 with the BOM stripped, else Latin-1.
pub fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
        // Every byte is a valid Latin-1 code point.
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Parse decoded CSV text. Unknown columns are ignored; line numbers count
/// the header as line 1.
pub fn parse_table(source_name: &str, text: &str) -> Result<RawTable, CliError> {
    let unreadable = |e: csv::Error| EngineError::unreadable(source_name, e.to_string());

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(unreadable)?.clone();
    let columns: Vec<Option<Field>> = headers.iter().map(Field::from_header).collect();

    let mut table = RawTable::new(source_name, columns.iter().flatten().copied());
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(unreadable)?;
        let mut raw = RawRecord::new(i + 2);
        for (field, cell) in columns.iter().zip(record.iter()) {
            if let Some(field) = field {
                raw.set(*field, cell);
            }
        }
        table.push(raw);
    }

    debug!(
        "{}: {} column(s) recognised, {} row(s)",
        source_name,
        table.columns.len(),
        table.len()
    );
    Ok(table)
}

/// Read and parse one export file.
pub fn read_table(path: &Path) -> Result<RawTable, CliError> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let bytes = fs::read(path)?;
    let text = decode(&bytes);
    parse_table(&source_name, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Sequência,Data/Hora Evento,Tipo Mensagem,Hodômetro Total,Extra";

    #[test]
    fn test_decode_utf8_with_bom() {
        let bytes = "\u{feff}Sequência".as_bytes();
        assert_eq!(decode(bytes), "Sequência");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // "Sequência" in Latin-1
        let bytes = b"Sequ\xeancia";
        assert_eq!(decode(bytes), "Sequência");
    }

    #[test]
    fn test_parse_table_lines_and_columns() {
        let text = format!(
            "{}\n1,01/05/2024 08:00:00,GTIGN,100.0,x\n2,01/05/2024 08:03:00,GTERI,,y\n",
            HEADER
        );
        let table = parse_table("a.csv", &text).unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.has_column(Field::Odometer));
        assert!(!table.has_column(Field::Speed));
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[1].line, 3);
        assert_eq!(table.rows[1].get(Field::MessageType), Some("GTERI"));
        assert_eq!(table.rows[1].get(Field::Odometer), None);
    }

    #[test]
    fn test_short_rows_tolerated() {
        let text = format!("{}\n1,01/05/2024 08:00:00\n", HEADER);
        let table = parse_table("short.csv", &text).unwrap();
        assert_eq!(table.rows[0].get(Field::Sequence), Some("1"));
        assert_eq!(table.rows[0].get(Field::MessageType), None);
    }

    #[test]
    fn test_read_latin1_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Sequ\xeancia,Data/Hora Evento,Tipo Mensagem\n7,01/05/2024 08:00:00,GTPNR\n")
            .unwrap();
        file.flush().unwrap();

        let table = read_table(file.path()).unwrap();
        assert!(table.missing_mandatory().is_empty());
        assert_eq!(table.rows[0].get(Field::Sequence), Some("7"));
    }

    #[test]
    fn test_missing_file() {
        let err = read_table(Path::new("/nonexistent/export.csv")).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }
}

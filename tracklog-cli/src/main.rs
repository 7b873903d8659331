// Tracklog CLI - Command-line runner for the Tracklog engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Tracklog CLI
//!
//! Runs the Tracklog engine over platform export files and writes the
//! derived tables.
//!
//! ## Usage
//!
//! ```bash
//! # One export, tables under ./tracklog-out/<file stem>/
//! tracklog export.csv
//!
//! # Several exports in parallel with a custom configuration
//! tracklog --config tracklog.json --out-dir reports a.csv b.csv
//!
//! # Treat any backward jump over 30000 as a counter reset
//! tracklog --reset-threshold 30000 export.csv
//! ```

mod error;
mod input;
mod output;

use clap::Parser;
use error::CliError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;
use tracklog::{Engine, EngineConfig};

/// Tracklog device log analysis
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Export files to analyse
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for output tables
    #[arg(short, long, default_value = "tracklog-out")]
    out_dir: PathBuf,

    /// JSON engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Backward sequence jump that counts as a counter reset
    #[arg(long)]
    reset_threshold: Option<i64>,
}

/// Build the engine configuration from the optional file and overrides.
fn load_config(path: Option<&Path>, reset_threshold: Option<i64>) -> Result<EngineConfig, CliError> {
    let config = match path {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let config = match reset_threshold {
        Some(threshold) => config.with_reset_threshold(threshold),
        None => config,
    };
    config.validate()?;
    Ok(config)
}

/// Read, run and write one file.
fn process_file(engine: &Engine, path: &Path, out_dir: &Path) -> Result<PathBuf, CliError> {
    let table = input::read_table(path)?;
    let report = engine.run(&table)?;
    output::write_report(out_dir, &report)
}

/// Process every input on its own scoped thread. Results keep input order.
fn process_files(
    engine: &Engine,
    inputs: &[PathBuf],
    out_dir: &Path,
) -> Vec<Result<PathBuf, CliError>> {
    std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|path| s.spawn(move || process_file(engine, path, out_dir)))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(CliError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "worker thread panicked",
                    )))
                })
            })
            .collect()
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing (also captures the engine's `log` records)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Tracklog v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(args.config.as_deref(), args.reset_threshold) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let engine = Engine::new(config);

    let results = process_files(&engine, &args.inputs, &args.out_dir);
    let mut failed = 0;
    for (path, result) in args.inputs.iter().zip(results) {
        match result {
            Ok(dir) => info!("{} -> {}", path.display(), dir.display()),
            Err(e) => {
                failed += 1;
                error!("{}: {}", path.display(), e);
            }
        }
    }

    info!(
        "{} file(s) processed, {} failed",
        args.inputs.len() - failed,
        failed
    );
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracklog::EngineError;
    use tracklog_testdata::Scenario;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "tracklog",
            "--out-dir",
            "out",
            "--reset-threshold",
            "30000",
            "a.csv",
            "b.csv",
        ])
        .unwrap();
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.out_dir, PathBuf::from("out"));
        assert_eq!(args.reset_threshold, Some(30000));
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_require_input() {
        assert!(Args::try_parse_from(["tracklog"]).is_err());
    }

    #[test]
    fn test_load_config_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracklog.json");
        fs::write(&path, r#"{ "speed": { "max_speed_kmh": 110.0 } }"#).unwrap();

        let config = load_config(Some(&path), Some(1000)).unwrap();
        assert_eq!(config.speed.max_speed_kmh, 110.0);
        assert_eq!(config.sequence.reset_threshold, 1000);

        let config = load_config(None, None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_config_rejects_negative_threshold() {
        let err = load_config(None, Some(-1)).unwrap_err();
        assert!(matches!(err, CliError::Engine(EngineError::Config(_))));
    }

    #[test]
    fn test_process_files_parallel() {
        let dir = TempDir::new().unwrap();
        let reset = dir.path().join("counter_reset.csv");
        let reboot = dir.path().join("reboot.csv");
        Scenario::counter_reset().generate().to_csv(&reset).unwrap();
        Scenario::reboot().generate().to_csv(&reboot).unwrap();
        let missing = dir.path().join("missing.csv");
        let out = dir.path().join("out");

        let engine = Engine::default();
        let results = process_files(&engine, &[reset, reboot, missing], &out);

        let reset_dir = results[0].as_ref().unwrap();
        let json = fs::read_to_string(reset_dir.join("report.json")).unwrap();
        let report = tracklog::EngineReport::from_json(&json).unwrap();
        assert_eq!(report.source_name, "counter_reset.csv");
        assert_eq!(report.anomalies_of(tracklog::AnomalyKind::Reset).count(), 1);

        let reboot_dir = results[1].as_ref().unwrap();
        let reboots = fs::read_to_string(reboot_dir.join("reboots.csv")).unwrap();
        assert_eq!(reboots.lines().count(), 2);

        assert!(matches!(results[2], Err(CliError::FileNotFound(_))));
    }

    #[test]
    fn test_schema_error_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_sequence.csv");
        fs::write(&path, "Data/Hora Evento,Tipo Mensagem\n01/05/2024 08:00:00,GTIGN\n").unwrap();

        let err = process_file(&Engine::default(), &path, dir.path()).unwrap_err();
        assert!(matches!(err, CliError::Engine(EngineError::Schema { .. })));
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Readers for the voucher-map input files.
//!
//! Every reader takes a path and returns typed records, or an
//! [`IngestError`] naming the file and what was wrong with it. Each reader
//! has a `parse_*` twin that works on in-memory contents.
//!
//! Structural problems (unreadable file, malformed JSON, missing column)
//! are fatal. Individual records with unusable coordinates are kept with
//! `coordinates: None` so downstream stages can report them.

pub mod listings;
pub mod points;
pub mod review;
pub mod tables;

use std::path::Path;

use thiserror::Error;

pub use listings::{parse_listings, read_listings};
pub use points::{parse_landlords, parse_location, parse_stations, read_landlords, read_stations};
pub use review::{parse_overrides, parse_verification, read_overrides, read_verification};
pub use tables::{parse_evictions, parse_rent_index, read_evictions, read_rent_index};

/// Errors that can occur while reading an input file.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid JSON of the expected shape.
    #[error("Failed to parse {path}: {source}")]
    Json {
        /// File path.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// The file is not valid CSV.
    #[error("Failed to parse {path}: {source}")]
    Csv {
        /// File path.
        path: String,
        /// Underlying error.
        source: csv::Error,
    },

    /// A required column is absent from the header row.
    #[error("{path} is missing required column {column:?}")]
    MissingColumn {
        /// File path.
        path: String,
        /// Column name.
        column: String,
    },

    /// A record holds a value that cannot be interpreted.
    #[error("{path}: record {record}: {message}")]
    InvalidRecord {
        /// File path.
        path: String,
        /// Record key or line number.
        record: String,
        /// What was wrong.
        message: String,
    },
}

fn read_to_string(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// A CSV body with its header row resolved.
struct CsvTable {
    path: String,
    headers: csv::StringRecord,
    records: Vec<csv::StringRecord>,
}

impl CsvTable {
    fn parse(path: &str, contents: &str) -> Result<Self, IngestError> {
        let csv_error = |source| IngestError::Csv {
            path: path.to_string(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(contents.as_bytes());
        let headers = reader.headers().map_err(csv_error)?.clone();
        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_error)?;

        Ok(Self {
            path: path.to_string(),
            headers,
            records,
        })
    }

    fn column(&self, name: &str) -> Result<usize, IngestError> {
        self.optional_column(name)
            .ok_or_else(|| IngestError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn invalid(&self, record: &csv::StringRecord, message: String) -> IngestError {
        IngestError::InvalidRecord {
            path: self.path.clone(),
            record: record
                .position()
                .map_or_else(|| "?".to_string(), |p| format!("line {}", p.line())),
            message,
        }
    }
}

/// Parses an optional number; empty cells are `None`.
fn parse_optional_f64(value: &str) -> Result<Option<f64>, String> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|e| format!("{value:?} is not a number: {e}"))
}

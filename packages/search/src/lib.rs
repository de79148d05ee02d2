#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filtering over a published locator database.
//!
//! Loads the CSV written by the pipeline and answers unit searches built
//! from [`SearchCriteria`].

pub mod criteria;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use thiserror::Error;
use voucher_map_housing_models::LocatorRecord;

pub use criteria::{Bounds, SearchCriteria, StopRadius};

/// Errors from loading or searching a locator database.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The database file could not be opened.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Database path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A database row did not match the locator columns.
    #[error("Failed to parse {path}: {source}")]
    Csv {
        /// Database path.
        path: String,
        /// Underlying error.
        source: csv::Error,
    },

    /// A range filter had its lower bound above its upper bound.
    #[error("Invalid {field} range {range}")]
    InvalidRange {
        /// Criteria field name.
        field: &'static str,
        /// The offending range.
        range: String,
    },

    /// A list filter was set but empty.
    #[error("{field} must name at least one value")]
    EmptyList {
        /// Criteria field name.
        field: &'static str,
    },

    /// A neighborhood filter named a neighborhood absent from the database.
    #[error("Unknown neighborhood: {0}")]
    UnknownNeighborhood(String),
}

/// An in-memory locator database.
#[derive(Debug, Clone, Default)]
pub struct LocatorDataset {
    records: Vec<LocatorRecord>,
    neighborhoods: BTreeSet<String>,
}

impl LocatorDataset {
    /// Reads a locator database CSV.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Io`] if the file cannot be opened, or
    /// [`SearchError::Csv`] if a row does not deserialize.
    pub fn load(path: &Path) -> Result<Self, SearchError> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|source| SearchError::Io {
            path: display.clone(),
            source,
        })?;

        let records = csv::Reader::from_reader(file)
            .deserialize()
            .collect::<Result<Vec<LocatorRecord>, _>>()
            .map_err(|source| SearchError::Csv {
                path: display.clone(),
                source,
            })?;

        log::info!("Loaded {} units from {display}", records.len());
        Ok(Self::from_records(records))
    }

    /// Wraps already-built records.
    #[must_use]
    pub fn from_records(records: Vec<LocatorRecord>) -> Self {
        let neighborhoods = records.iter().map(|r| r.neighborhood.clone()).collect();
        Self {
            records,
            neighborhoods,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[LocatorRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct neighborhood names, sorted.
    pub fn neighborhoods(&self) -> impl Iterator<Item = &str> {
        self.neighborhoods.iter().map(String::as_str)
    }

    /// Returns the units matching every filter in `criteria`, in database
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if `criteria` fails validation or names a
    /// neighborhood the database does not contain.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<&LocatorRecord>, SearchError> {
        criteria.validate()?;

        if let Some(names) = &criteria.neighborhoods
            && let Some(unknown) = names.iter().find(|n| !self.neighborhoods.contains(*n))
        {
            return Err(SearchError::UnknownNeighborhood(unknown.clone()));
        }

        let matches: Vec<&LocatorRecord> = self
            .records
            .iter()
            .filter(|r| criteria.matches(r))
            .collect();

        log::debug!("{} of {} units matched", matches.len(), self.records.len());
        Ok(matches)
    }
}

/// Writes `records` as locator database CSV.
///
/// # Errors
///
/// Returns a [`csv::Error`] if serialization or the writer fails.
pub fn write_results<'a, W: Write>(
    records: impl IntoIterator<Item = &'a LocatorRecord>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

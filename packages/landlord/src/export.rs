//! Stage-one review file.
//!
//! One row per candidate pair, in the order the engine produced them
//! (unit input order, then watch-list order):
//!
//! ```text
//! unit_id,landlord_address,distance_mi
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use voucher_map_proximity::{Candidate, PerSubjectFlags};

use crate::LandlordError;

/// One line of the review file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRow<'a> {
    /// Unit id.
    pub unit_id: &'a str,
    /// Watch-listed address.
    pub landlord_address: &'a str,
    /// Distance in miles.
    pub distance_mi: f64,
}

impl<'a> From<&'a Candidate> for CandidateRow<'a> {
    fn from(candidate: &'a Candidate) -> Self {
        Self {
            unit_id: &candidate.subject_id,
            landlord_address: &candidate.reference_id,
            distance_mi: candidate.distance_mi,
        }
    }
}

/// Writes the candidates of `flags` as CSV to `writer`.
///
/// # Errors
///
/// Returns a [`csv::Error`] if serialization or the underlying writer fails.
pub fn write_candidates<W: Write>(flags: &PerSubjectFlags, writer: W) -> Result<(), csv::Error> {
    // Header is written by hand so an empty candidate list still yields
    // a valid file.
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(["unit_id", "landlord_address", "distance_mi"])?;

    for candidate in &flags.candidates {
        csv_writer.serialize(CandidateRow::from(candidate))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the review file to `path` via a temporary sibling that is
/// renamed into place on success. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`LandlordError`] if the file cannot be written or renamed.
pub fn export_candidates(flags: &PerSubjectFlags, path: &Path) -> Result<usize, LandlordError> {
    let display = path.display().to_string();
    let tmp = path.with_extension("csv.tmp");

    let file = std::fs::File::create(&tmp).map_err(|source| LandlordError::Io {
        path: display.clone(),
        source,
    })?;

    if let Err(source) = write_candidates(flags, file) {
        std::fs::remove_file(&tmp).ok();
        return Err(LandlordError::Csv {
            path: display,
            source,
        });
    }

    std::fs::rename(&tmp, path).map_err(|source| {
        std::fs::remove_file(&tmp).ok();
        LandlordError::Io {
            path: display.clone(),
            source,
        }
    })?;

    log::info!(
        "Wrote {} landlord candidates to {display}",
        flags.candidates.len()
    );

    Ok(flags.candidates.len())
}

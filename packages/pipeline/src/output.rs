//! Locator database and derived rent index CSV output.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use voucher_map_enrich::{EnrichSettings, RentPeriod};
use voucher_map_housing_models::{LocatorRecord, NeighborhoodRentIndex};

use crate::PipelineError;

/// Serializes `records` as CSV with a header row.
///
/// # Errors
///
/// Returns a [`csv::Error`] if serialization or the writer fails.
pub fn write_records<W: Write>(records: &[LocatorRecord], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Serializes the rent index with one `YYYY-01` column per published
/// January and a fractional change column per configured period, named
/// `<from>-<to>`. Missing values are blank.
///
/// # Errors
///
/// Returns a [`csv::Error`] if the writer fails.
pub fn write_rent_index<W: Write>(
    rows: &[NeighborhoodRentIndex],
    settings: &EnrichSettings,
    writer: W,
) -> Result<(), csv::Error> {
    let years: BTreeSet<u16> = rows.iter().flat_map(|r| r.january.keys().copied()).collect();
    let periods = [settings.early_rent_period, settings.late_rent_period];

    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut header: Vec<String> = ["RegionID", "RegionName", "City", "State", "Metro", "CountyName"]
        .into_iter()
        .map(str::to_string)
        .collect();
    header.extend(years.iter().map(|year| format!("{year}-01")));
    header.extend(periods.iter().map(|RentPeriod { from, to }| format!("{from}-{to}")));
    csv_writer.write_record(&header)?;

    let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    for row in rows {
        let mut fields = vec![row.region_id.clone()];
        fields.extend(
            [&row.region_name, &row.city, &row.state, &row.metro, &row.county]
                .map(|attribute| attribute.clone().unwrap_or_default()),
        );
        fields.extend(years.iter().map(|year| number(row.january.get(year).copied())));
        fields.extend(periods.iter().map(|p| number(row.change(p.from, p.to))));
        csv_writer.write_record(&fields)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the locator database to `path`.
///
/// The table is written to `<path>.tmp` and renamed over `path` only after
/// every row is flushed, so a failed run never leaves a partial file at
/// `path`. The parent directory is created if needed.
///
/// # Errors
///
/// Returns [`PipelineError::Output`] if the directory, temporary file or
/// rename fails.
pub fn write_locator_database(path: &Path, records: &[LocatorRecord]) -> Result<(), PipelineError> {
    write_atomically(path, |file| write_records(records, file))?;
    log::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Writes the rent index with its change columns to `path`, atomically like
/// [`write_locator_database`].
///
/// # Errors
///
/// Returns [`PipelineError::Output`] if the directory, temporary file or
/// rename fails.
pub fn write_rent_index_table(
    path: &Path,
    rows: &[NeighborhoodRentIndex],
    settings: &EnrichSettings,
) -> Result<(), PipelineError> {
    write_atomically(path, |file| write_rent_index(rows, settings, file))?;
    log::info!("Wrote rent index for {} neighborhoods to {}", rows.len(), path.display());
    Ok(())
}

fn write_atomically(
    path: &Path,
    write: impl FnOnce(std::fs::File) -> Result<(), csv::Error>,
) -> Result<(), PipelineError> {
    let io_error = |source: std::io::Error| PipelineError::Output {
        path: path.to_path_buf(),
        message: source.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let tmp = temp_path(path);
    let file = std::fs::File::create(&tmp).map_err(io_error)?;

    if let Err(e) = write(file) {
        std::fs::remove_file(&tmp).ok();
        return Err(PipelineError::Output {
            path: path.to_path_buf(),
            message: e.to_string(),
        });
    }

    if let Err(e) = std::fs::rename(&tmp, path) {
        std::fs::remove_file(&tmp).ok();
        return Err(io_error(e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use voucher_map_housing_models::PropertyType;

    use super::*;

    fn record(id: &str) -> LocatorRecord {
        LocatorRecord {
            unit_id: id.to_string(),
            address: "6200 S Ellis Ave".to_string(),
            monthly_rent: 1100,
            property_type: PropertyType::Apartment,
            bathrooms: 1.0,
            bedrooms: 2.0,
            availability: "Available Now".to_string(),
            contact: None,
            url: None,
            latitude: Some(41.781),
            longitude: Some(-87.601),
            geoid: None,
            state: "IL".to_string(),
            county: "Cook".to_string(),
            city: "Chicago".to_string(),
            neighborhood: "Woodlawn".to_string(),
            region_id: "269600".to_string(),
            parent_location: Some("Cook County, Illinois".to_string()),
            population: Some(1520.0),
            renter_occupied_households: None,
            median_gross_rent: None,
            median_household_income: None,
            median_property_value: None,
            pct_white: None,
            pct_af_am: None,
            pct_hispanic: None,
            pct_am_ind: None,
            pct_asian: None,
            eviction_filings: None,
            evictions: None,
            eviction_rate: Some(2.5),
            eviction_rate_percentile: Some(0.5),
            eviction_filing_rate: None,
            eviction_filing_rate_percentile: None,
            rent_change_2011_2015: None,
            rent_change_2015_2019: None,
            potential_bad_landlord: false,
            bad_landlord_address: None,
            stops_within_quarter_mile: 0,
            stops_within_half_mile: 1,
            stops_within_three_quarter_mile: 1,
            stops_within_one_mile: 2,
        }
    }

    #[test]
    fn header_uses_published_column_names() {
        let mut out = Vec::new();
        write_records(&[record("1")], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let header = text.lines().next().unwrap();

        assert_eq!(
            header,
            "index,Address,Monthly Rent,Property Type,Bath,Bed,Availability,Contact,URL,Lat,Long,\
             GEOID,State,County,City,Neighborhood,RegionID,parent-location,population,\
             renter-occupied-households,median-gross-rent,median-household-income,\
             median-property-value,pct-white,pct-af-am,pct-hispanic,pct-am-ind,pct-asian,\
             eviction-filings,evictions,2016_evict_rate,er_percentile,2016_evict_filing_rate,\
             efr_percentile,2011-2015_rent_perc_change,2015-2019_rent_perc_change,\
             potential_bad_landlord,bad_landlord_address,num_stops_quart_mi,num_stops_half_mi,\
             num_stops_3quart_mi,num_stops_1_mi"
        );
    }

    #[test]
    fn empty_values_are_blank() {
        let mut out = Vec::new();
        write_records(&[record("1")], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "1,6200 S Ellis Ave,1100,Apt,1.0,2.0,Available Now,,,41.781,-87.601,,IL,Cook,Chicago,\
             Woodlawn,269600,\"Cook County, Illinois\",1520.0,,,,,,,,,,,,\
             2.5,0.5,,,,,false,,0,1,1,2"
        );
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join("voucher_map_pipeline_output_test");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("nested").join("locator_database.csv");

        write_locator_database(&path, &[record("1"), record("2")]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(!temp_path(&path).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    fn zri(region_id: &str, values: &[(u16, f64)]) -> NeighborhoodRentIndex {
        NeighborhoodRentIndex {
            region_id: region_id.to_string(),
            region_name: Some("Woodlawn".to_string()),
            city: Some("Chicago".to_string()),
            state: Some("IL".to_string()),
            metro: None,
            county: Some("Cook County".to_string()),
            january: values.iter().copied().collect(),
        }
    }

    #[test]
    fn rent_index_adds_period_changes() {
        let rows = [
            zri("269600", &[(2011, 1000.0), (2015, 1250.0), (2019, 1500.0)]),
            zri("269601", &[(2015, 800.0)]),
        ];
        let mut out = Vec::new();
        write_rent_index(&rows, &EnrichSettings::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "RegionID,RegionName,City,State,Metro,CountyName,2011-01,2015-01,2019-01,2011-2015,2015-2019"
        );
        assert_eq!(lines[1], "269600,Woodlawn,Chicago,IL,,Cook County,1000,1250,1500,0.25,0.2");
        assert_eq!(lines[2], "269601,Woodlawn,Chicago,IL,,Cook County,,800,,,");
    }

    #[test]
    fn rent_index_table_is_written_atomically() {
        let dir = std::env::temp_dir().join("voucher_map_pipeline_rent_index_test");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("zillow_rindex_with_increase.csv");

        write_rent_index_table(&path, &[zri("1", &[(2011, 10.0)])], &EnrichSettings::default())
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
        assert!(!temp_path(&path).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(
            temp_path(Path::new("/out/locator_database.csv")),
            PathBuf::from("/out/locator_database.csv.tmp")
        );
    }
}

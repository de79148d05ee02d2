//! Published reference tables: Eviction Lab block groups and the
//! neighborhood rent index.

use std::collections::BTreeMap;
use std::path::Path;

use voucher_map_housing_models::{BlockGroupEvictions, BlockGroupProfile, NeighborhoodRentIndex};

use crate::{CsvTable, IngestError, parse_optional_f64, read_to_string};

/// Reads an Eviction Lab block-group table.
///
/// Every row is returned; year and county filtering happen at join time.
/// The demographic columns are optional and read as empty when absent.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read, lacks a required
/// column, or a rate is not a number.
pub fn read_evictions(path: &Path) -> Result<Vec<BlockGroupEvictions>, IngestError> {
    let contents = read_to_string(path)?;
    let rows = parse_evictions(&path.display().to_string(), &contents)?;
    log::info!("Read {} block-group eviction rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parses eviction table contents. `path` is used in error messages.
///
/// # Errors
///
/// See [`read_evictions`].
pub fn parse_evictions(path: &str, contents: &str) -> Result<Vec<BlockGroupEvictions>, IngestError> {
    let table = CsvTable::parse(path, contents)?;
    let geoid = table.column("GEOID")?;
    let year = table.column("year")?;
    let parent = table.column("parent-location")?;
    let rate = table.column("eviction-rate")?;
    let filing_rate = table.column("eviction-filing-rate")?;
    let [
        population,
        renter_occupied_households,
        median_gross_rent,
        median_household_income,
        median_property_value,
        pct_white,
        pct_af_am,
        pct_hispanic,
        pct_am_ind,
        pct_asian,
        eviction_filings,
        evictions,
    ] = [
        "population",
        "renter-occupied-households",
        "median-gross-rent",
        "median-household-income",
        "median-property-value",
        "pct-white",
        "pct-af-am",
        "pct-hispanic",
        "pct-am-ind",
        "pct-asian",
        "eviction-filings",
        "evictions",
    ]
    .map(|name| table.optional_column(name));

    table
        .records
        .iter()
        .map(|record| -> Result<BlockGroupEvictions, IngestError> {
            let text = |idx: usize| record.get(idx).unwrap_or_default().to_string();
            let number = |idx: usize| {
                parse_optional_f64(record.get(idx).unwrap_or_default())
                    .map_err(|message| table.invalid(record, message))
            };
            let optional = |idx: Option<usize>| idx.map_or(Ok(None), number);

            Ok(BlockGroupEvictions {
                geoid: text(geoid),
                year: text(year),
                parent_location: text(parent),
                eviction_rate: number(rate)?,
                eviction_filing_rate: number(filing_rate)?,
                profile: BlockGroupProfile {
                    population: optional(population)?,
                    renter_occupied_households: optional(renter_occupied_households)?,
                    median_gross_rent: optional(median_gross_rent)?,
                    median_household_income: optional(median_household_income)?,
                    median_property_value: optional(median_property_value)?,
                    pct_white: optional(pct_white)?,
                    pct_af_am: optional(pct_af_am)?,
                    pct_hispanic: optional(pct_hispanic)?,
                    pct_am_ind: optional(pct_am_ind)?,
                    pct_asian: optional(pct_asian)?,
                    eviction_filings: optional(eviction_filings)?,
                    evictions: optional(evictions)?,
                },
            })
        })
        .collect()
}

/// Reads a neighborhood rent index table.
///
/// Only January columns (`YYYY-01`) are kept, along with the optional
/// `RegionName`, `City`, `State`, `Metro` and `CountyName` attributes.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read, lacks `RegionID`,
/// or a January value is not a number.
pub fn read_rent_index(path: &Path) -> Result<Vec<NeighborhoodRentIndex>, IngestError> {
    let contents = read_to_string(path)?;
    let rows = parse_rent_index(&path.display().to_string(), &contents)?;
    log::info!("Read rent index for {} neighborhoods from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parses rent index contents. `path` is used in error messages.
///
/// # Errors
///
/// See [`read_rent_index`].
pub fn parse_rent_index(path: &str, contents: &str) -> Result<Vec<NeighborhoodRentIndex>, IngestError> {
    let table = CsvTable::parse(path, contents)?;
    let region_id = table.column("RegionID")?;
    let [region_name, city, state, metro, county] =
        ["RegionName", "City", "State", "Metro", "CountyName"].map(|name| table.optional_column(name));

    let januaries: Vec<(usize, u16)> = table
        .headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| january_year(header).map(|year| (idx, year)))
        .collect();

    if januaries.is_empty() {
        log::warn!("{path} has no January (YYYY-01) columns");
    }

    table
        .records
        .iter()
        .map(|record| -> Result<NeighborhoodRentIndex, IngestError> {
            let mut january = BTreeMap::new();
            for &(idx, year) in &januaries {
                let value = parse_optional_f64(record.get(idx).unwrap_or_default())
                    .map_err(|message| table.invalid(record, message))?;
                if let Some(value) = value {
                    january.insert(year, value);
                }
            }

            let attribute = |idx: Option<usize>| {
                idx.and_then(|idx| record.get(idx))
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };

            Ok(NeighborhoodRentIndex {
                region_id: record.get(region_id).unwrap_or_default().to_string(),
                region_name: attribute(region_name),
                city: attribute(city),
                state: attribute(state),
                metro: attribute(metro),
                county: attribute(county),
                january,
            })
        })
        .collect()
}

/// `"2015-01"` to `Some(2015)`.
fn january_year(header: &str) -> Option<u16> {
    let (year, month) = header.split_once('-')?;
    if month != "01" || year.len() != 4 {
        return None;
    }
    year.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_eviction_rows() {
        let csv = "GEOID,year,name,parent-location,population,eviction-rate,eviction-filing-rate\n\
                   170310101001,2016,101.1,\"Cook County, Illinois\",1200,3.25,6.5\n\
                   170310101002,2016,101.2,\"Cook County, Illinois\",900,,\n";
        let rows = parse_evictions("evictions.csv", csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].geoid, "170310101001");
        assert_eq!(rows[0].parent_location, "Cook County, Illinois");
        assert_eq!(rows[0].eviction_rate, Some(3.25));
        assert_eq!(rows[0].eviction_filing_rate, Some(6.5));
        assert!(rows[1].eviction_rate.is_none());
        assert_eq!(rows[0].profile.population, Some(1200.0));
        assert!(rows[0].profile.pct_asian.is_none());
    }

    #[test]
    fn reads_block_group_profile() {
        let csv = "GEOID,year,parent-location,population,renter-occupied-households,\
                   median-gross-rent,median-household-income,median-property-value,\
                   pct-white,pct-af-am,pct-hispanic,pct-am-ind,pct-asian,eviction-filings,\
                   evictions,eviction-rate,eviction-filing-rate\n\
                   170310101001,2016,Cook,1200,410,980,41000,210000,22.5,60.1,12.4,0.3,2.2,27,14,3.41,6.59\n";
        let rows = parse_evictions("evictions.csv", csv).unwrap();

        let profile = rows[0].profile;
        assert_eq!(profile.renter_occupied_households, Some(410.0));
        assert_eq!(profile.median_gross_rent, Some(980.0));
        assert_eq!(profile.median_household_income, Some(41000.0));
        assert_eq!(profile.median_property_value, Some(210_000.0));
        assert_eq!(profile.pct_white, Some(22.5));
        assert_eq!(profile.pct_af_am, Some(60.1));
        assert_eq!(profile.pct_hispanic, Some(12.4));
        assert_eq!(profile.pct_am_ind, Some(0.3));
        assert_eq!(profile.pct_asian, Some(2.2));
        assert_eq!(profile.eviction_filings, Some(27.0));
        assert_eq!(profile.evictions, Some(14.0));
    }

    #[test]
    fn profile_numbers_are_validated() {
        let csv = "GEOID,year,parent-location,eviction-rate,eviction-filing-rate,population\n\
                   1,2016,x,1,1,many\n";
        assert!(matches!(
            parse_evictions("evictions.csv", csv),
            Err(IngestError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn eviction_rate_must_be_numeric() {
        let csv = "GEOID,year,parent-location,eviction-rate,eviction-filing-rate\n1,2016,x,high,1\n";
        assert!(matches!(
            parse_evictions("evictions.csv", csv),
            Err(IngestError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn keeps_only_january_columns() {
        let csv = "RegionID,RegionName,City,2010-12,2011-01,2011-02,2015-01,2019-01\n\
                   269590,Logan Square,Chicago,990,1000,1010,1250,\n";
        let rows = parse_rent_index("zri.csv", csv).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.region_id, "269590");
        assert_eq!(row.january.keys().copied().collect::<Vec<_>>(), vec![2011, 2015]);
        assert!((row.change(2011, 2015).unwrap() - 0.25).abs() < 1e-12);
        assert!(row.change(2015, 2019).is_none());
        assert_eq!(row.region_name.as_deref(), Some("Logan Square"));
        assert_eq!(row.city.as_deref(), Some("Chicago"));
        assert!(row.state.is_none());
    }

    #[test]
    fn reads_region_attributes() {
        let csv = "RegionID,City,RegionName,State,Metro,CountyName,2011-01\n\
                   269600,Chicago,Woodlawn,IL,Chicago-Naperville-Elgin,Cook County,1000\n\
                   269601,,Unnamed,,,,\n";
        let rows = parse_rent_index("zri.csv", csv).unwrap();

        assert_eq!(rows[0].state.as_deref(), Some("IL"));
        assert_eq!(rows[0].metro.as_deref(), Some("Chicago-Naperville-Elgin"));
        assert_eq!(rows[0].county.as_deref(), Some("Cook County"));
        assert!(rows[1].city.is_none());
        assert!(rows[1].january.is_empty());
    }

    #[test]
    fn rent_index_requires_region_id() {
        let csv = "RegionName,2011-01\nx,1\n";
        assert!(matches!(
            parse_rent_index("zri.csv", csv),
            Err(IngestError::MissingColumn { .. })
        ));
    }

    #[test]
    fn january_headers() {
        assert_eq!(january_year("2019-01"), Some(2019));
        assert_eq!(january_year("2019-02"), None);
        assert_eq!(january_year("RegionID"), None);
        assert_eq!(january_year("19-01"), None);
    }
}

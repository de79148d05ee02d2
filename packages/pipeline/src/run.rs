//! Stage orchestration.

use std::path::PathBuf;
use std::sync::Arc;

use voucher_map_enrich::enrich;
use voucher_map_geocoder::{GeocodeReport, GeocodedUnits, assign_regions};
use voucher_map_geography::{RegionKind, load_boundaries};
use voucher_map_housing_models::{LocatorRecord, NeighborhoodRentIndex, RentalUnit};
use voucher_map_ingest::{
    read_evictions, read_landlords, read_listings, read_overrides, read_rent_index, read_stations,
    read_verification,
};
use voucher_map_landlord::{export_candidates, flag_potential_bad_landlord_with};
use voucher_map_proximity::progress::{ProgressCallback, null_progress};
use voucher_map_proximity::{Haversine, ProximityEngine};
use voucher_map_spatial::RegionIndex;

use crate::output::{write_locator_database, write_rent_index_table};
use crate::records::locator_records;
use crate::{PipelineConfig, PipelineError};

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Listings read.
    pub listings: usize,
    /// Region assignment outcome.
    pub geocode: GeocodeReport,
    /// Units and stations left out of transit scoring for lack of a
    /// location.
    pub transit_excluded: usize,
    /// Units and watch-listed buildings left out of landlord matching for
    /// lack of a location.
    pub landlord_excluded: usize,
    /// Stage-one landlord candidate pairs.
    pub landlord_candidates: usize,
    /// Units flagged after verification.
    pub flagged: usize,
    /// Rows in the output table.
    pub rows: usize,
    /// Where the table was written, if it was.
    pub output: Option<PathBuf>,
    /// Where the rent index with change columns was written, if it was.
    pub rent_index_output: Option<PathBuf>,
}

/// In-memory result of [`Pipeline::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltDatabase {
    /// Output rows, ordered by unit id.
    pub records: Vec<LocatorRecord>,
    /// Rent index rows as read, empty when no rent index is configured.
    pub rent_index: Vec<NeighborhoodRentIndex>,
    /// Run counts.
    pub summary: PipelineSummary,
}

/// A configured pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl Pipeline {
    /// Creates a pipeline with no progress reporting.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            progress: null_progress(),
        }
    }

    /// Reports distance-matrix progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Builds the locator database and writes it to the configured output
    /// path, along with the rent index change table when a rent index is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] from the first failing stage. The output
    /// files are left untouched on failure.
    pub fn run(&self) -> Result<PipelineSummary, PipelineError> {
        let BuiltDatabase {
            records,
            rent_index,
            mut summary,
        } = self.build()?;
        let output = &self.config.output;

        let path = output.locator_database_path();
        write_locator_database(&path, &records)?;
        summary.output = Some(path);

        if self.config.inputs.rent_index.is_some() {
            let path = output.rent_index_path();
            write_rent_index_table(&path, &rent_index, &self.config.enrichment)?;
            summary.rent_index_output = Some(path);
        }
        Ok(summary)
    }

    /// Builds the locator database in memory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] from the first failing stage.
    pub fn build(&self) -> Result<BuiltDatabase, PipelineError> {
        let inputs = &self.config.inputs;
        let geocoded = self.geocode()?;
        let units: Vec<RentalUnit> = geocoded.units.iter().map(|g| g.unit.clone()).collect();
        let engine = self.engine();

        log::info!("Scoring transit access for {} units", units.len());
        let stations = read_stations(&inputs.transit_stations)?;
        let transit = engine.nearest_within(&units, &stations, &self.config.proximity.transit_radii_mi)?;
        for excluded in &transit.excluded {
            log::warn!("Transit scoring: {excluded}");
        }
        let transit_excluded = transit.excluded.len();
        let transit = transit.into_map();

        log::info!("Matching units against the landlord watch list");
        let landlords = read_landlords(&inputs.landlords)?;
        let verification = inputs
            .landlord_verification
            .as_deref()
            .map(read_verification)
            .transpose()?;
        let flags = flag_potential_bad_landlord_with(
            &engine,
            &units,
            &landlords,
            self.config.proximity.landlord_threshold_mi,
            verification.as_ref(),
        )?;
        for excluded in &flags.candidates.excluded {
            log::warn!("Landlord matching: {excluded}");
        }

        let evictions = inputs
            .evictions
            .as_deref()
            .map(read_evictions)
            .transpose()?
            .unwrap_or_default();
        let rent_index = inputs
            .rent_index
            .as_deref()
            .map(read_rent_index)
            .transpose()?
            .unwrap_or_default();
        let enrichment = enrich(&geocoded.units, &evictions, &rent_index, &self.config.enrichment);

        let records = locator_records(&geocoded.units, &enrichment, &transit, &flags);

        let summary = PipelineSummary {
            listings: geocoded.report.input,
            geocode: geocoded.report,
            transit_excluded,
            landlord_excluded: flags.candidates.excluded.len(),
            landlord_candidates: flags.candidates.candidates.len(),
            flagged: flags.flagged_count(),
            rows: records.len(),
            output: None,
            rent_index_output: None,
        };
        log::info!(
            "Built {} rows from {} listings ({} flagged for landlord review)",
            summary.rows,
            summary.listings,
            summary.flagged
        );

        Ok(BuiltDatabase {
            records,
            rent_index,
            summary,
        })
    }

    /// Writes the stage-one landlord candidates for human review. Returns
    /// the number of candidate pairs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if geocoding, matching or the export fails.
    pub fn export_candidates(&self) -> Result<usize, PipelineError> {
        let geocoded = self.geocode()?;
        let units: Vec<RentalUnit> = geocoded.units.into_iter().map(|g| g.unit).collect();
        let landlords = read_landlords(&self.config.inputs.landlords)?;

        let flags = flag_potential_bad_landlord_with(
            &self.engine(),
            &units,
            &landlords,
            self.config.proximity.landlord_threshold_mi,
            None,
        )?;

        let path = self.config.output.landlord_candidates_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::Output {
                path: path.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(export_candidates(&flags.candidates, &path)?)
    }

    /// Loads both layers and assigns every listing to its regions.
    fn geocode(&self) -> Result<GeocodedUnits, PipelineError> {
        let inputs = &self.config.inputs;
        let layers = &self.config.layers;

        log::info!("Loading boundary layers");
        let block_groups = RegionIndex::build(
            RegionKind::BlockGroup,
            load_boundaries(&inputs.block_groups, RegionKind::BlockGroup, &layers.block_groups)?,
        )?;
        let neighborhoods = RegionIndex::build(
            RegionKind::Neighborhood,
            load_boundaries(&inputs.neighborhoods, RegionKind::Neighborhood, &layers.neighborhoods)?,
        )?;

        let units = read_listings(&inputs.listings)?;
        let file_overrides = inputs
            .neighborhood_overrides
            .as_deref()
            .map(read_overrides)
            .transpose()?
            .unwrap_or_default();
        let rules = self.config.geocode_rules(file_overrides)?;

        Ok(assign_regions(units, &block_groups, &neighborhoods, &rules)?)
    }

    fn engine(&self) -> ProximityEngine<Haversine> {
        ProximityEngine::new(Haversine)
            .with_chunk_size(self.config.proximity.chunk_size)
            .with_progress(self.progress.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const BLOCK_GROUPS: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"GEOID": "170310001001"},
         "geometry": {"type": "Polygon", "coordinates": [[[-87.70, 41.90], [-87.65, 41.90], [-87.65, 41.95], [-87.70, 41.95], [-87.70, 41.90]]]}},
        {"type": "Feature", "properties": {"GEOID": "170310001002"},
         "geometry": {"type": "Polygon", "coordinates": [[[-87.65, 41.90], [-87.60, 41.90], [-87.60, 41.95], [-87.65, 41.95], [-87.65, 41.90]]]}}
    ]}"#;

    const NEIGHBORHOODS: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"RegionID": 269600, "Name": "North"},
         "geometry": {"type": "Polygon", "coordinates": [[[-87.70, 41.90], [-87.60, 41.90], [-87.60, 41.95], [-87.70, 41.95], [-87.70, 41.90]]]}}
    ]}"#;

    const LISTINGS: &str = r#"{
        "3": {"Address": "3 W Test St", "Monthly Rent": 1200, "Property Type": "Apt", "Bath": 1, "Bed": 2,
              "Availability": "Available Now", "Lat": 41.9201, "Long": 87.68},
        "1": {"Address": "1 W Test St", "Monthly Rent": 900, "Property Type": "House", "Bath": 1.5, "Bed": 3,
              "Availability": "07/01/2019", "Lat": 41.92, "Long": 87.62},
        "2": {"Address": "2 W Test St", "Monthly Rent": 1000, "Property Type": "Duplex", "Bath": 1, "Bed": 2,
              "Availability": "Available Now", "Lat": 41.85, "Long": 87.65},
        "9": {"Address": "9 Nowhere", "Monthly Rent": 500, "Property Type": "Apt", "Bath": 1, "Bed": 1,
              "Availability": "Available Now", "Lat": 41.92, "Long": 87.62}
    }"#;

    const STATIONS: &str = "STOP_ID,Location\n30001,\"(41.92, -87.68)\"\n";

    const LANDLORDS: &str = "ADDRESS,LATITUDE,LONGITUDE\n1 W Test St,41.92,-87.62\n99 Unknown Ave,,\n";

    const VERIFICATION: &str = "unit_id,confirmed\n1,true\n";

    const EVICTIONS: &str = "GEOID,year,parent-location,population,renter-occupied-households,\
                             pct-af-am,eviction-filings,evictions,eviction-rate,eviction-filing-rate\n\
                             170310001002,2016,\"Cook County, Illinois\",1520,610,71.5,40,22,3.61,6.56\n";

    const RENT_INDEX: &str = "RegionID,City,RegionName,State,Metro,CountyName,2011-01,2015-01,2019-01\n\
                              269600,Evanston,North,IL,Chicago-Naperville-Elgin,Cook County,1000,1250,1500\n";

    const CONFIG: &str = r#"
        [inputs]
        block_groups = "block-groups.geojson"
        neighborhoods = "neighborhoods.geojson"
        listings = "listings.json"
        transit_stations = "stations.csv"
        landlords = "landlords.csv"
        landlord_verification = "verification.csv"
        evictions = "evictions.csv"
        rent_index = "zri.csv"

        [output]
        directory = "out"

        [geocoding]
        exclusions = ["9"]

        [[geocoding.overrides]]
        unit_id = "2"
        neighborhood = "Gresham"
        region_id = "269571"
    "#;

    fn fixture(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        for (file, contents) in [
            ("block-groups.geojson", BLOCK_GROUPS),
            ("neighborhoods.geojson", NEIGHBORHOODS),
            ("listings.json", LISTINGS),
            ("stations.csv", STATIONS),
            ("landlords.csv", LANDLORDS),
            ("verification.csv", VERIFICATION),
            ("evictions.csv", EVICTIONS),
            ("zri.csv", RENT_INDEX),
            ("pipeline.toml", CONFIG),
        ] {
            std::fs::write(dir.join(file), contents).unwrap();
        }
        dir
    }

    fn pipeline(dir: &Path) -> Pipeline {
        Pipeline::new(PipelineConfig::load(&dir.join("pipeline.toml")).unwrap())
    }

    #[test]
    fn builds_expected_rows() {
        let dir = fixture("voucher_map_pipeline_build_test");
        let BuiltDatabase {
            records,
            rent_index,
            summary,
        } = pipeline(&dir).build().unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(summary.listings, 4);
        assert_eq!(summary.geocode.excluded, vec!["9".to_string()]);
        assert_eq!(summary.geocode.overridden, vec!["2".to_string()]);
        assert_eq!(summary.transit_excluded, 0);
        assert_eq!(summary.landlord_excluded, 1);
        assert_eq!(summary.landlord_candidates, 1);
        assert_eq!(rent_index.len(), 1);

        let one = &records[0];
        assert_eq!(one.geoid.as_deref(), Some("170310001002"));
        assert_eq!(one.neighborhood, "North");
        assert_eq!(one.region_id, "269600");
        assert!(one.potential_bad_landlord);
        assert_eq!(one.bad_landlord_address.as_deref(), Some("1 W Test St"));
        assert_eq!(one.stops_within_one_mile, 0);
        assert_eq!(one.parent_location.as_deref(), Some("Cook County, Illinois"));
        assert_eq!(one.population, Some(1520.0));
        assert_eq!(one.renter_occupied_households, Some(610.0));
        assert_eq!(one.pct_af_am, Some(71.5));
        assert!(one.pct_white.is_none());
        assert_eq!(one.evictions, Some(22.0));
        assert_eq!(one.eviction_rate, Some(3.61));
        assert_eq!(
            (one.state.as_str(), one.county.as_str(), one.city.as_str()),
            ("IL", "Cook County", "Evanston")
        );
        assert!((one.rent_change_2011_2015.unwrap() - 0.25).abs() < 1e-12);

        let two = &records[1];
        assert!(two.geoid.is_none());
        assert_eq!(two.neighborhood, "Gresham");
        assert!(!two.potential_bad_landlord);
        assert_eq!(
            (two.state.as_str(), two.county.as_str(), two.city.as_str()),
            ("IL", "Cook", "Chicago")
        );
        assert!(two.population.is_none());

        let three = &records[2];
        assert_eq!(three.geoid.as_deref(), Some("170310001001"));
        assert_eq!(
            [
                three.stops_within_quarter_mile,
                three.stops_within_half_mile,
                three.stops_within_three_quarter_mile,
                three.stops_within_one_mile,
            ],
            [1, 1, 1, 1]
        );
        assert!(three.eviction_rate.is_none());
        assert!(three.parent_location.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let dir = fixture("voucher_map_pipeline_idempotence_test");
        let pipeline = pipeline(&dir);

        let first = pipeline.run().unwrap();
        let path = first.output.clone().unwrap();
        let first_bytes = std::fs::read(&path).unwrap();

        let second = pipeline.run().unwrap();
        let second_bytes = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_bytes, second_bytes);
        assert_eq!(String::from_utf8(first_bytes).unwrap().lines().count(), 4);

        let rent_index = std::fs::read_to_string(first.rent_index_output.unwrap()).unwrap();
        assert_eq!(
            rent_index.lines().nth(1),
            Some("269600,North,Evanston,IL,Chicago-Naperville-Elgin,Cook County,1000,1250,1500,0.25,0.2")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_run_leaves_previous_output() {
        let dir = fixture("voucher_map_pipeline_failure_test");
        let pipeline = pipeline(&dir);
        let path = pipeline.run().unwrap().output.unwrap();
        let before = std::fs::read(&path).unwrap();

        std::fs::write(dir.join("stations.csv"), "STOP_ID,Lat\n1,41.9\n").unwrap();
        assert!(matches!(pipeline.run(), Err(PipelineError::Ingest(_))));

        assert_eq!(std::fs::read(&path).unwrap(), before);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn exports_candidates() {
        let dir = fixture("voucher_map_pipeline_candidates_test");
        let pipeline = pipeline(&dir);

        let written = pipeline.export_candidates().unwrap();

        assert_eq!(written, 1);
        let text = std::fs::read_to_string(dir.join("out").join("landlord_candidates.csv")).unwrap();
        assert_eq!(text.lines().nth(1), Some("1,1 W Test St,0.0"));

        std::fs::remove_dir_all(&dir).ok();
    }
}

//! TOML pipeline configuration.
//!
//! See `configs/chicago.toml` for a complete example. Only `[inputs]` is
//! required; every other section falls back to the Chicago defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voucher_map_enrich::EnrichSettings;
use voucher_map_geocoder::{GeocodeRules, NeighborhoodOverride};
use voucher_map_geography::{BoundaryFieldMapping, RegionKind};
use voucher_map_housing_models::Coordinates;
use voucher_map_proximity::{DEFAULT_CHUNK_SIZE, DEFAULT_LANDLORD_THRESHOLD_MI, TRANSIT_RADII_MI};

/// Errors that can occur while loading a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("Invalid config value {field}: {message}")]
    Invalid {
        /// Dotted key of the offending value.
        field: String,
        /// What was wrong.
        message: String,
    },
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input files.
    pub inputs: InputPaths,
    /// Output location.
    #[serde(default)]
    pub output: OutputConfig,
    /// Boundary property names.
    #[serde(default)]
    pub layers: LayerFields,
    /// Distance parameters.
    #[serde(default)]
    pub proximity: ProximitySettings,
    /// Eviction and rent-index join parameters.
    #[serde(default)]
    pub enrichment: EnrichSettings,
    /// Hand-maintained geocoding fixes.
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// Input file locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPaths {
    /// Census block group `GeoJSON`.
    pub block_groups: PathBuf,
    /// Neighborhood `GeoJSON`.
    pub neighborhoods: PathBuf,
    /// Listing snapshot JSON.
    pub listings: PathBuf,
    /// Rapid-transit station CSV.
    pub transit_stations: PathBuf,
    /// Landlord watch-list CSV.
    pub landlords: PathBuf,
    /// Neighborhood override CSV, merged with `[geocoding.overrides]`.
    pub neighborhood_overrides: Option<PathBuf>,
    /// Landlord verification CSV. Without it no unit is flagged.
    pub landlord_verification: Option<PathBuf>,
    /// Eviction Lab block-group CSV.
    pub evictions: Option<PathBuf>,
    /// Neighborhood rent index CSV.
    pub rent_index: Option<PathBuf>,
}

/// Output location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the output files are written to.
    pub directory: PathBuf,
    /// Locator database file name.
    pub locator_database: String,
    /// Landlord candidate review file name.
    pub landlord_candidates: String,
    /// Rent index with change columns, written when `inputs.rent_index` is
    /// set.
    pub rent_index: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("processed_data"),
            locator_database: "locator_database.csv".to_string(),
            landlord_candidates: "landlord_candidates.csv".to_string(),
            rent_index: "zillow_rindex_with_increase.csv".to_string(),
        }
    }
}

impl OutputConfig {
    /// Full path of the locator database.
    #[must_use]
    pub fn locator_database_path(&self) -> PathBuf {
        self.directory.join(&self.locator_database)
    }

    /// Full path of the candidate review file.
    #[must_use]
    pub fn landlord_candidates_path(&self) -> PathBuf {
        self.directory.join(&self.landlord_candidates)
    }

    /// Full path of the derived rent index.
    #[must_use]
    pub fn rent_index_path(&self) -> PathBuf {
        self.directory.join(&self.rent_index)
    }
}

/// Boundary property names per layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerFields {
    pub block_groups: BoundaryFieldMapping,
    pub neighborhoods: BoundaryFieldMapping,
}

impl Default for LayerFields {
    fn default() -> Self {
        Self {
            block_groups: RegionKind::BlockGroup.default_fields(),
            neighborhoods: RegionKind::Neighborhood.default_fields(),
        }
    }
}

/// Distance parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    /// Cumulative transit radius bands, in miles. Exactly four, ascending.
    pub transit_radii_mi: Vec<f64>,
    /// Landlord match distance, in miles.
    pub landlord_threshold_mi: f64,
    /// Subjects per distance-matrix chunk.
    pub chunk_size: usize,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            transit_radii_mi: TRANSIT_RADII_MI.to_vec(),
            landlord_threshold_mi: DEFAULT_LANDLORD_THRESHOLD_MI,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// `[[geocoding.corrections]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    /// Listing to relocate.
    pub unit_id: String,
    /// Replacement latitude, in degrees.
    pub latitude: f64,
    /// Replacement longitude, in degrees (negative west of Greenwich).
    pub longitude: f64,
}

/// `[[geocoding.overrides]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    /// Listing to place.
    pub unit_id: String,
    /// Neighborhood name written to the output row.
    pub neighborhood: String,
    /// Neighborhood region id used for the rent-index join.
    pub region_id: String,
}

/// Hand-maintained geocoding fixes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Unit ids to drop.
    pub exclusions: Vec<String>,
    /// Replacement locations.
    pub corrections: Vec<CorrectionEntry>,
    /// Fallback neighborhoods.
    pub overrides: Vec<OverrideEntry>,
}

impl PipelineConfig {
    /// Reads, validates and resolves a config file. Relative paths in the
    /// file are taken relative to the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// value fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(path, &contents)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolve_relative_to(base))
    }

    /// Parses and validates config contents without resolving paths.
    ///
    /// # Errors
    ///
    /// See [`PipelineConfig::load`].
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, message: String| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field: field.to_string(),
                message,
            })
        };

        let proximity = &self.proximity;
        if !(proximity.landlord_threshold_mi.is_finite() && proximity.landlord_threshold_mi > 0.0) {
            return invalid(
                "proximity.landlord_threshold_mi",
                format!("must be positive, got {}", proximity.landlord_threshold_mi),
            );
        }
        if proximity.chunk_size == 0 {
            return invalid("proximity.chunk_size", "must be positive".to_string());
        }
        let radii = &proximity.transit_radii_mi;
        if radii.len() != TRANSIT_RADII_MI.len() {
            return invalid(
                "proximity.transit_radii_mi",
                format!("must list {} bands, got {}", TRANSIT_RADII_MI.len(), radii.len()),
            );
        }
        let ascending = radii.iter().all(|r| r.is_finite() && *r > 0.0)
            && radii.windows(2).all(|w| w[0] < w[1]);
        if !ascending {
            return invalid(
                "proximity.transit_radii_mi",
                format!("must be positive and strictly increasing, got {radii:?}"),
            );
        }

        for entry in &self.geocoding.corrections {
            if Coordinates::new(entry.latitude, entry.longitude).is_none() {
                return invalid(
                    "geocoding.corrections",
                    format!(
                        "unit {} has an unusable location ({}, {})",
                        entry.unit_id, entry.latitude, entry.longitude
                    ),
                );
            }
        }

        let layers = [
            ("layers.block_groups.id", &self.layers.block_groups),
            ("layers.neighborhoods.id", &self.layers.neighborhoods),
        ];
        for (field, mapping) in layers {
            if mapping.id.is_empty() {
                return invalid(field, "must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Joins every relative path onto `base`.
    #[must_use]
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        let inputs = &mut self.inputs;
        resolve(&mut inputs.block_groups);
        resolve(&mut inputs.neighborhoods);
        resolve(&mut inputs.listings);
        resolve(&mut inputs.transit_stations);
        resolve(&mut inputs.landlords);
        for optional in [
            &mut inputs.neighborhood_overrides,
            &mut inputs.landlord_verification,
            &mut inputs.evictions,
            &mut inputs.rent_index,
        ] {
            if let Some(path) = optional {
                resolve(path);
            }
        }
        resolve(&mut self.output.directory);

        self
    }

    /// Builds geocoding rules from the inline entries plus any overrides
    /// read from the override file. Inline overrides win over file entries
    /// for the same unit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a correction with an unusable
    /// location.
    pub fn geocode_rules(
        &self,
        file_overrides: BTreeMap<String, NeighborhoodOverride>,
    ) -> Result<GeocodeRules, ConfigError> {
        let mut rules = GeocodeRules {
            overrides: file_overrides,
            ..GeocodeRules::new()
        };

        for id in &self.geocoding.exclusions {
            rules = rules.with_exclusion(id);
        }
        for entry in &self.geocoding.corrections {
            let coordinates = Coordinates::new(entry.latitude, entry.longitude).ok_or_else(|| {
                ConfigError::Invalid {
                    field: "geocoding.corrections".to_string(),
                    message: format!("unit {} has an unusable location", entry.unit_id),
                }
            })?;
            rules = rules.with_correction(&entry.unit_id, coordinates);
        }
        for entry in &self.geocoding.overrides {
            if rules.overrides.contains_key(&entry.unit_id) {
                log::warn!(
                    "Inline override for unit {} replaces the override file entry",
                    entry.unit_id
                );
            }
            rules = rules.with_override(&entry.unit_id, &entry.neighborhood, &entry.region_id);
        }

        Ok(rules)
    }
}

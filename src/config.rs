//! Processing configuration, including the default tag-key lists and
//! fueltype/technology mappings a caller gets without supplying anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The subset of [`Config`] that determines whether a cached processed-units
/// bundle may be reused. Hashed with stable key ordering (a `BTreeMap`, not a
/// sort step) before being digested.
pub const PROCESSING_PARAMETERS: &[&str] = &[
    "capacity_extraction",
    "capacity_estimation",
    "units_clustering",
    "source_mapping",
    "technology_mapping",
    "source_technology_mapping",
    "plants_only",
    "missing_name_allowed",
    "missing_technology_allowed",
    "missing_start_date_allowed",
    "sources",
    "units_reconstruction",
];

/// The net-to-gross land-use derating applied to area-based plant capacity
/// estimates. Not exposed as a separate config key: the source never makes it
/// configurable either (see DESIGN.md Open Question decisions).
pub const PLANT_AREA_DERATING_FACTOR: f64 = 1.0 / 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverpassApiConfig {
    pub url: String,
    pub timeout: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for OverpassApiConfig {
    fn default() -> Self {
        Self {
            url: "https://overpass-api.de/api/interpreter".to_string(),
            timeout: 300,
            max_retries: 3,
            retry_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagKeys {
    #[serde(default)]
    pub name_tags_keys: Vec<String>,
    #[serde(default)]
    pub source_tags_keys: Vec<String>,
    #[serde(default)]
    pub technology_tags_keys: Vec<String>,
    #[serde(default)]
    pub output_tags_keys: Vec<String>,
    #[serde(default)]
    pub start_date_tags_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapacityExtractionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub regex_patterns: Vec<String>,
    #[serde(default)]
    pub additional_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapacityEstimationMethodConfig {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub unit_capacity: Option<f64>,
    #[serde(default)]
    pub efficiency: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub min_samples: Option<usize>,
    #[serde(default)]
    pub n_clusters: Option<usize>,
    #[serde(default)]
    pub to_radians: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub capacity_estimation: CapacityEstimationMethodConfig,
    #[serde(default)]
    pub units_clustering: ClusteringConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_generators")]
    pub min_generators_for_reconstruction: usize,
    #[serde(default = "default_similarity_threshold")]
    pub name_similarity_threshold: f64,
}

fn default_min_generators() -> usize {
    2
}

fn default_similarity_threshold() -> f64 {
    0.7
}

impl Default for ClusteringEnableConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringEnableConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub overpass_api: OverpassApiConfig,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub plants_only: bool,
    #[serde(default)]
    pub missing_name_allowed: bool,
    #[serde(default)]
    pub missing_technology_allowed: bool,
    #[serde(default)]
    pub missing_start_date_allowed: bool,
    #[serde(default)]
    pub source_mapping: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub technology_mapping: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub source_technology_mapping: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub plant_tags: TagKeys,
    #[serde(default)]
    pub generator_tags: TagKeys,
    #[serde(default)]
    pub capacity_extraction: CapacityExtractionConfig,
    #[serde(default)]
    pub capacity_estimation: ClusteringEnableConfig,
    #[serde(default)]
    pub units_reconstruction: ReconstructionConfig,
    #[serde(default)]
    pub units_clustering: ClusteringEnableConfig,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub cache_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overpass_api: OverpassApiConfig::default(),
            force_refresh: false,
            plants_only: false,
            missing_name_allowed: false,
            missing_technology_allowed: false,
            missing_start_date_allowed: false,
            source_mapping: default_source_mapping(),
            technology_mapping: default_technology_mapping(),
            source_technology_mapping: default_source_technology_mapping(),
            plant_tags: TagKeys {
                name_tags_keys: vec!["name:en".into(), "name".into()],
                source_tags_keys: vec!["plant:source".into()],
                technology_tags_keys: vec!["plant:method".into(), "plant:type".into()],
                output_tags_keys: vec!["plant:output:electricity".into()],
                start_date_tags_keys: vec!["start_date".into(), "year".into()],
            },
            generator_tags: TagKeys {
                name_tags_keys: vec!["name:en".into(), "name".into()],
                source_tags_keys: vec!["generator:source".into()],
                technology_tags_keys: vec!["generator:method".into(), "generator:type".into()],
                output_tags_keys: vec!["generator:output:electricity".into()],
                start_date_tags_keys: vec!["start_date".into(), "year".into()],
            },
            capacity_extraction: CapacityExtractionConfig {
                enabled: false,
                regex_patterns: vec![r"^(\d+(?:\.\d+)?)\s*([a-zA-Z]+p?)$".to_string()],
                additional_tags: vec![],
            },
            capacity_estimation: ClusteringEnableConfig { enabled: false },
            units_reconstruction: ReconstructionConfig {
                enabled: false,
                min_generators_for_reconstruction: default_min_generators(),
                name_similarity_threshold: default_similarity_threshold(),
            },
            units_clustering: ClusteringEnableConfig { enabled: false },
            sources: BTreeMap::new(),
            cache_dir: None,
        }
    }
}

/// A fixed starter mapping covering the common OSM `plant:source`/`generator:source`
/// values, the way `original_source/config.py`'s `target_fueltypes()` enumerates a
/// fixed standardised fueltype list. Supplements the distilled spec, which names the
/// configuration surface but not its default content (see SPEC_FULL.md §10.3).
fn default_source_mapping() -> BTreeMap<String, Vec<String>> {
    [
        ("Solar", vec!["solar", "solar_photovoltaic_panel", "pv"]),
        ("Wind", vec!["wind", "wind_turbine"]),
        ("Hydro", vec!["hydro", "water"]),
        ("Natural Gas", vec!["gas", "natural_gas"]),
        ("Nuclear", vec!["nuclear"]),
        ("Hard Coal", vec!["coal", "hard_coal"]),
        ("Lignite", vec!["lignite", "brown_coal"]),
        ("Oil", vec!["oil", "diesel"]),
        ("Bioenergy", vec!["biomass", "biogas", "bioenergy"]),
        ("Geothermal", vec!["geothermal"]),
        ("Waste", vec!["waste", "municipal_waste"]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
    .collect()
}

fn default_technology_mapping() -> BTreeMap<String, Vec<String>> {
    [
        ("PV", vec!["photovoltaic", "solar_photovoltaic"]),
        ("Onshore", vec!["onshore"]),
        ("Offshore", vec!["offshore"]),
        ("Run-Of-River", vec!["run-of-river", "run_of_river"]),
        ("Pumped Storage", vec!["pumped_storage"]),
        ("Reservoir", vec!["reservoir", "water-storage"]),
        ("CCGT", vec!["combined_cycle"]),
        ("OCGT", vec!["gas_turbine"]),
        ("Steam Turbine", vec!["steam_turbine"]),
        ("Combustion Engine", vec!["combustion_engine"]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
    .collect()
}

fn default_source_technology_mapping() -> BTreeMap<String, Vec<String>> {
    [
        ("Solar", vec!["PV"]),
        ("Wind", vec!["Onshore", "Offshore"]),
        (
            "Hydro",
            vec!["Run-Of-River", "Pumped Storage", "Reservoir"],
        ),
        ("Natural Gas", vec!["CCGT", "OCGT", "Steam Turbine"]),
        ("Oil", vec!["Combustion Engine", "Steam Turbine"]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
    .collect()
}

impl Config {
    /// Digest of the processing-relevant config subset, used to decide
    /// whether a cached processed-units bundle is still valid.
    pub fn config_hash(&self) -> String {
        let subset = serde_json::json!({
            "capacity_extraction": self.capacity_extraction,
            "capacity_estimation": self.capacity_estimation,
            "units_clustering": self.units_clustering,
            "source_mapping": self.source_mapping,
            "technology_mapping": self.technology_mapping,
            "source_technology_mapping": self.source_technology_mapping,
            "plants_only": self.plants_only,
            "missing_name_allowed": self.missing_name_allowed,
            "missing_technology_allowed": self.missing_technology_allowed,
            "missing_start_date_allowed": self.missing_start_date_allowed,
            "sources": self.sources,
            "units_reconstruction": self.units_reconstruction,
        });
        // serde_json serializes maps in the order produced by iteration; using
        // BTreeMap fields above gives us stable key ordering without a sort step.
        let canonical = serde_json::to_string(&subset).expect("config subset is serializable");
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

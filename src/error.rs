//! Per-subsystem error types.
//!
//! Each subsystem gets its own `thiserror` enum and `Result` alias, following
//! the blob-reader convention of this crate's ancestor. Most of these never
//! reach a caller: data defects become [`crate::model::rejection::RejectedElement`]
//! values, and cache I/O failures are logged and degrade to an empty class.
//! [`WorkflowError`] aggregates only the subset that must actually abort a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error reading/writing cache file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt cache file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum OverpassError {
    #[error("query construction failed: {0}")]
    MalformedQuery(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response was not valid JSON: {0}")]
    InvalidResponse(String),
}

pub type OverpassResult<T> = std::result::Result<T, OverpassError>;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("element has fewer than the minimum required points")]
    InsufficientPoints,
    #[error("polygon is not simple/valid")]
    InvalidPolygon,
}

pub type GeometryResult<T> = std::result::Result<T, GeometryError>;

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("unsupported capacity unit: {0}")]
    UnsupportedUnit(String),
    #[error("capacity grammar not recognised: {0}")]
    NoGrammarMatch(String),
}

pub type CapacityResult<T> = std::result::Result<T, CapacityError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown country name(s): {0:?}")]
    UnknownCountries(Vec<UnknownCountry>),
    #[error("missing mandatory configuration key: {0}")]
    MissingKey(String),
    #[error("unknown region type: {0}")]
    UnknownRegionType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCountry {
    pub input: String,
    pub closest_match: Option<String>,
}

impl std::fmt::Display for UnknownCountry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.closest_match {
            Some(m) => write!(f, "'{}' (did you mean '{}'?)", self.input, m),
            None => write!(f, "'{}' (no close match found)", self.input),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Overpass(#[from] OverpassError),
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

pub use crate::cache::{CoordinateCache, ElementCache};
pub use crate::capacity::{CapacityEstimator, CapacityExtractor};
pub use crate::clustering::{ClusteringAlgorithm, ClusteringManager};
pub use crate::config::Config;
pub use crate::country::{resolve_countries, resolve_country};
pub use crate::error::{
    CacheError, CapacityError, ConfigError, GeometryError, OverpassError, WorkflowError,
};
pub use crate::geometry_handler::GeometryHandler;
pub use crate::model::{
    ElementType, Node, OsmElement, PlantGeometry, RejectedElement, RejectionReason, Relation,
    Shape, Unit, Units, Way,
};
pub use crate::overpass::{AreaFilter, HttpTransport, OverpassClient, QueryTransport};
pub use crate::parsing::{GeneratorParser, PlantParser};
pub use crate::rejection::RejectionTracker;
pub use crate::workflow::Workflow;

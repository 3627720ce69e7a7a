pub mod generator_parser;
pub mod plant_parser;
pub mod reconstruction;
pub mod tags;
pub mod unit_factory;

pub use generator_parser::{GeneratorOutcome, GeneratorParser, OrphanedGenerator};
pub use plant_parser::PlantParser;
pub use reconstruction::{NameAggregator, PlantReconstructor, ReconstructedPlantInfo};
pub use tags::{CapacityResult, TagExtractor, UnitKind};
pub use unit_factory::{PlantUnitArgs, UnitFactory};

pub mod estimator;
pub mod extractor;

pub use estimator::{CapacityEstimator, EstimatedCapacity};
pub use extractor::{CapacityExtractor, ExtractedCapacity, ExtractionOutcome};

//! The closed set of reasons a candidate unit can be discarded, and the
//! record type the [`crate::rejection::RejectionTracker`] stores.

use serde::{Deserialize, Serialize};

use crate::model::element::ElementType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    InvalidElementType,
    CoordinatesNotFound,
    MissingNameTag,
    MissingSourceTag,
    MissingSourceType,
    MissingTechnologyTag,
    MissingTechnologyType,
    MissingOutputTag,
    MissingStartDateTag,
    InvalidStartDateFormat,
    CapacityPlaceholder,
    CapacityDecimalFormat,
    CapacityRegexError,
    CapacityRegexNoMatch,
    CapacityNonNumeric,
    CapacityUnsupportedUnit,
    CapacityZero,
    ElementAlreadyProcessed,
    WithinExistingPlant,
    EstimationMethodUnknown,
    Other,
}

impl RejectionReason {
    /// Human-readable value, matching the source's `Enum.value` strings.
    pub fn label(self) -> &'static str {
        use RejectionReason::*;
        match self {
            InvalidElementType => "Invalid element type",
            CoordinatesNotFound => "Could not determine coordinates",
            MissingNameTag => "Missing name tag",
            MissingSourceTag => "Missing source tag",
            MissingSourceType => "Missing source type",
            MissingTechnologyTag => "Missing technology tag",
            MissingTechnologyType => "Missing technology type",
            MissingOutputTag => "Missing output tag",
            MissingStartDateTag => "Missing start date tag",
            InvalidStartDateFormat => "Invalid start date format",
            CapacityPlaceholder => "Capacity placeholder value",
            CapacityDecimalFormat => "Capacity decimal format",
            CapacityRegexError => "Capacity regex error",
            CapacityRegexNoMatch => "Capacity regex no match",
            CapacityNonNumeric => "Capacity non-numeric",
            CapacityUnsupportedUnit => "Unsupported capacity unit",
            CapacityZero => "Capacity zero",
            ElementAlreadyProcessed => "Element already processed",
            WithinExistingPlant => "Element within existing plant geometry",
            EstimationMethodUnknown => "Unknown estimation method",
            Other => "Other reason",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedElement {
    /// `"type/id"`.
    pub id: String,
    pub element_id: String,
    pub element_type: ElementType,
    pub reason: RejectionReason,
    pub details: Option<String>,
    pub keywords: String,
    pub timestamp: String,
    pub url: Option<String>,
    pub coordinates: Option<(f64, f64)>,
    pub country: Option<String>,
    pub unit_type: Option<String>,
}

impl RejectedElement {
    pub fn url_for(id: &str) -> Option<String> {
        if id.contains("cluster") {
            None
        } else {
            Some(format!("https://www.openstreetmap.org/{id}"))
        }
    }
}

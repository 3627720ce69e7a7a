//! Append-only log of discarded candidates, deduplicated so a systematic tag
//! problem doesn't flood the log with near-identical entries.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;

use crate::model::element::ElementType;
use crate::model::rejection::{RejectedElement, RejectionReason};

pub struct RejectionTracker {
    entries: Vec<RejectedElement>,
    seen: HashMap<(RejectionReason, String, String), usize>,
}

impl Default for RejectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RejectionTracker {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            seen: HashMap::new(),
        }
    }

    /// Records a rejection, deduplicating on (reason, details, keywords): a
    /// repeat of the identical defect is dropped, not appended again.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        element_id: impl Into<String>,
        element_type: ElementType,
        reason: RejectionReason,
        details: Option<String>,
        keywords: impl Into<String>,
        coordinates: Option<(f64, f64)>,
        country: Option<String>,
        unit_type: Option<String>,
    ) {
        let element_id = element_id.into();
        let keywords = keywords.into();
        let dedup_key = (reason, details.clone().unwrap_or_default(), keywords.clone());
        if self.seen.contains_key(&dedup_key) {
            return;
        }
        let id = format!("{element_type}/{element_id}");
        let entry = RejectedElement {
            url: RejectedElement::url_for(&id),
            id,
            element_id,
            element_type,
            reason,
            details,
            keywords,
            timestamp: Utc::now().to_rfc3339(),
            coordinates,
            country,
            unit_type,
        };
        self.seen.insert(dedup_key, self.entries.len());
        self.entries.push(entry);
    }

    /// Removes every rejection recorded against the given element ids, used
    /// once those elements go on to produce a real [`crate::model::unit::Unit`].
    pub fn delete_for_units(&mut self, element_ids: &[String]) {
        self.entries.retain(|e| !element_ids.contains(&e.element_id));
        self.seen = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                (
                    (e.reason, e.details.clone().unwrap_or_default(), e.keywords.clone()),
                    i,
                )
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RejectedElement> {
        self.entries.iter()
    }

    /// Count of rejections per reason.
    pub fn summary(&self) -> HashMap<RejectionReason, usize> {
        let mut counts = HashMap::new();
        for e in &self.entries {
            *counts.entry(e.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Histogram of the free-text `keywords` field, useful for spotting a
    /// single unmapped tag value responsible for many rejections.
    pub fn keyword_histogram(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for e in &self.entries {
            if !e.keywords.is_empty() {
                *counts.entry(e.keywords.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// GeoJSON FeatureCollection of every rejection that has coordinates and
    /// isn't a synthetic cluster entry.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .entries
            .iter()
            .filter(|e| e.coordinates.is_some() && !e.id.contains("cluster"))
            .map(|e| {
                let (lat, lon) = e.coordinates.unwrap();
                serde_json::json!({
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [lon, lat] },
                    "properties": {
                        "reason": e.reason.label(),
                        "details": e.details,
                        "keywords": e.keywords,
                        "url": e.url,
                        "country": e.country,
                    }
                })
            })
            .collect();
        serde_json::json!({ "type": "FeatureCollection", "features": features })
    }

    /// Splits rejections into one GeoJSON document per reason, for callers
    /// that want a file-per-reason export.
    pub fn geojson_by_reason(&self) -> HashMap<RejectionReason, Value> {
        let mut grouped: HashMap<RejectionReason, Vec<&RejectedElement>> = HashMap::new();
        for e in &self.entries {
            if e.coordinates.is_some() && !e.id.contains("cluster") {
                grouped.entry(e.reason).or_default().push(e);
            }
        }
        grouped
            .into_iter()
            .map(|(reason, entries)| {
                let features: Vec<Value> = entries
                    .iter()
                    .map(|e| {
                        let (lat, lon) = e.coordinates.unwrap();
                        serde_json::json!({
                            "type": "Feature",
                            "geometry": { "type": "Point", "coordinates": [lon, lat] },
                            "properties": { "details": e.details, "keywords": e.keywords, "url": e.url },
                        })
                    })
                    .collect();
                (
                    reason,
                    serde_json::json!({ "type": "FeatureCollection", "features": features }),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_rejections_are_deduplicated() {
        let mut tracker = RejectionTracker::new();
        tracker.record(
            "1",
            ElementType::Node,
            RejectionReason::MissingSourceType,
            Some("bad".into()),
            "widget",
            None,
            None,
            None,
        );
        tracker.record(
            "2",
            ElementType::Node,
            RejectionReason::MissingSourceType,
            Some("bad".into()),
            "widget",
            None,
            None,
            None,
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn delete_for_units_removes_matching_element_ids() {
        let mut tracker = RejectionTracker::new();
        tracker.record(
            "1",
            ElementType::Node,
            RejectionReason::MissingNameTag,
            None,
            "",
            None,
            None,
            None,
        );
        tracker.delete_for_units(&["1".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn geojson_excludes_entries_without_coordinates() {
        let mut tracker = RejectionTracker::new();
        tracker.record(
            "1",
            ElementType::Node,
            RejectionReason::CoordinatesNotFound,
            None,
            "",
            None,
            None,
            None,
        );
        let geojson = tracker.to_geojson();
        assert_eq!(geojson["features"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn cluster_ids_never_get_a_url() {
        assert_eq!(RejectedElement::url_for("cluster/1"), None);
        assert!(RejectedElement::url_for("node/1").is_some());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_reason() -> impl Strategy<Value = RejectionReason> {
        prop_oneof![
            Just(RejectionReason::MissingSourceType),
            Just(RejectionReason::MissingNameTag),
            Just(RejectionReason::CoordinatesNotFound),
            Just(RejectionReason::CapacityZero),
            Just(RejectionReason::CapacityPlaceholder),
        ]
    }

    proptest! {
        /// However many times the same (reason, details, keywords) triple is
        /// recorded under different element ids, exactly one entry survives.
        #[test]
        fn repeated_identical_rejections_collapse_to_one(
            reason in any_reason(),
            details in "[a-z]{0,8}",
            keywords in "[a-z]{0,8}",
            repeat_count in 1usize..20,
        ) {
            let mut tracker = RejectionTracker::new();
            for i in 0..repeat_count {
                tracker.record(
                    i.to_string(),
                    ElementType::Node,
                    reason,
                    Some(details.clone()),
                    keywords.clone(),
                    None,
                    None,
                    None,
                );
            }
            prop_assert_eq!(tracker.len(), 1);
        }
    }
}

//! Shared tag-extraction and capacity-orchestration logic used by both the
//! plant and generator parsers.

use crate::cache::ElementCache;
use crate::capacity::{CapacityEstimator, CapacityExtractor};
use crate::config::Config;
use crate::model::element::{MemberType, OsmElement};
use crate::model::geometry::Shape;
use crate::model::rejection::RejectionReason;

/// Which side of the plant/generator tag split a lookup is being done for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Plant,
    Generator,
}

pub struct TagExtractor<'a> {
    config: &'a Config,
}

#[derive(Debug, Clone)]
pub struct CapacityResult {
    pub capacity_mw: Option<f64>,
    pub info: String,
    pub contributing_ids: Vec<String>,
}

impl<'a> TagExtractor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn tag_keys(&self, kind: UnitKind) -> &crate::config::TagKeys {
        match kind {
            UnitKind::Plant => &self.config.plant_tags,
            UnitKind::Generator => &self.config.generator_tags,
        }
    }

    pub fn extract_name(
        &self,
        element: &OsmElement,
        kind: UnitKind,
    ) -> Result<String, RejectionReason> {
        let tags = element.tags();
        for key in &self.tag_keys(kind).name_tags_keys {
            if let Some(value) = tags.get(key) {
                if !value.trim().is_empty() {
                    return Ok(value.clone());
                }
            }
        }
        if self.config.missing_name_allowed {
            Ok(String::new())
        } else {
            Err(RejectionReason::MissingNameTag)
        }
    }

    pub fn extract_source(
        &self,
        element: &OsmElement,
        kind: UnitKind,
    ) -> Result<String, RejectionReason> {
        let tags = element.tags();
        for key in &self.tag_keys(kind).source_tags_keys {
            if let Some(raw) = tags.get(key) {
                let lowered = raw.to_lowercase();
                for (canonical, synonyms) in &self.config.source_mapping {
                    if synonyms.iter().any(|s| s == &lowered) {
                        return Ok(canonical.clone());
                    }
                }
                return Err(RejectionReason::MissingSourceType);
            }
        }
        Err(RejectionReason::MissingSourceTag)
    }

    pub fn extract_technology(
        &self,
        element: &OsmElement,
        kind: UnitKind,
        source_type: &str,
    ) -> Result<String, RejectionReason> {
        let tags = element.tags();
        let allowed = self.config.source_technology_mapping.get(source_type);
        for key in &self.tag_keys(kind).technology_tags_keys {
            if let Some(raw) = tags.get(key) {
                let lowered = raw.to_lowercase();
                for (canonical, synonyms) in &self.config.technology_mapping {
                    if synonyms.iter().any(|s| s == &lowered) {
                        if let Some(allowed) = allowed {
                            if !allowed.contains(canonical) {
                                continue;
                            }
                        }
                        return Ok(canonical.clone());
                    }
                }
                return Err(RejectionReason::MissingTechnologyType);
            }
        }
        if self.config.missing_technology_allowed {
            Ok(String::new())
        } else {
            Err(RejectionReason::MissingTechnologyTag)
        }
    }

    /// Returns the *key name* holding the output/capacity value, not the
    /// value itself — the caller still has to read and parse the tag.
    pub fn extract_output_key(
        &self,
        element: &OsmElement,
        kind: UnitKind,
        source_type: Option<&str>,
    ) -> Result<String, RejectionReason> {
        let tags = element.tags();
        let mut candidates: Vec<String> = self.tag_keys(kind).output_tags_keys.clone();
        if source_type.is_some() {
            candidates.extend(self.config.capacity_extraction.additional_tags.iter().cloned());
        }
        candidates
            .into_iter()
            .find(|key| tags.contains_key(key))
            .ok_or(RejectionReason::MissingOutputTag)
    }

    /// Extracts and validates a start-date key, returning the 4-digit year
    /// as a string. Matches the source's behaviour of only ever yielding a
    /// bare year regardless of how much of a full date was present.
    pub fn extract_start_date(
        &self,
        element: &OsmElement,
        kind: UnitKind,
    ) -> Result<String, RejectionReason> {
        let tags = element.tags();
        for key in &self.tag_keys(kind).start_date_tags_keys {
            if let Some(raw) = tags.get(key) {
                if let Some(year) = extract_year(raw) {
                    return Ok(year.to_string());
                }
                return Err(RejectionReason::InvalidStartDateFormat);
            }
        }
        if self.config.missing_start_date_allowed {
            Ok(String::new())
        } else {
            Err(RejectionReason::MissingStartDateTag)
        }
    }

    /// Reads `output_key`'s tag value and runs it through the two-pass
    /// capacity extractor, falling back to the source's configured estimation
    /// method if both passes fail and estimation is enabled. `shape`/`ref_lat`
    /// feed the `area_based` method; `is_plant` picks its derating and info tag.
    pub fn process_capacity(
        &self,
        element: &OsmElement,
        output_key: &str,
        source_type: &str,
        shape: Option<&Shape>,
        ref_lat: f64,
        is_plant: bool,
    ) -> Result<CapacityResult, RejectionReason> {
        let raw = element
            .tags()
            .get(output_key)
            .ok_or(RejectionReason::MissingOutputTag)?;

        let basic = CapacityExtractor::basic_extraction(raw);
        let extracted = match basic {
            Ok(v) => Ok(v),
            Err(_) if self.config.capacity_extraction.enabled => {
                CapacityExtractor::advanced_extraction(raw)
            }
            Err(e) => Err(e),
        };

        match extracted {
            Ok(v) => Ok(CapacityResult {
                capacity_mw: Some(v.capacity_mw),
                info: v.info,
                contributing_ids: vec![element.identification()],
            }),
            Err(_reason) if self.config.capacity_estimation.enabled => {
                let source_cfg = self.config.sources.get(source_type);
                let method = source_cfg.map(|s| s.capacity_estimation.method.as_str());
                let estimate = match method {
                    None | Some("") | Some("default_value") => {
                        let default_mw = source_cfg
                            .and_then(|s| s.capacity_estimation.unit_capacity)
                            .unwrap_or(1.0);
                        CapacityEstimator::default_value(default_mw)
                    }
                    Some("area_based") => {
                        let shape = shape.ok_or(RejectionReason::EstimationMethodUnknown)?;
                        let efficiency_w_per_m2 = source_cfg
                            .and_then(|s| s.capacity_estimation.efficiency)
                            .unwrap_or(0.0);
                        CapacityEstimator::area_based(
                            shape,
                            ref_lat,
                            efficiency_w_per_m2 / 1_000_000.0,
                            is_plant,
                        )?
                    }
                    Some(_) => return Err(RejectionReason::EstimationMethodUnknown),
                };
                Ok(CapacityResult {
                    capacity_mw: Some(estimate.capacity_mw),
                    info: estimate.info,
                    contributing_ids: vec![element.identification()],
                })
            }
            Err(reason) => Err(reason),
        }
    }

    /// Aggregates capacity across a relation's members that carry a
    /// `power:*` or `*output*` tag, per the member-capacity rules: a single
    /// qualifying member's value passes through, multiple qualifying members
    /// sum, and no qualifying members yields `None`/"unknown".
    pub fn relation_member_capacity(
        &self,
        relation: &crate::model::element::Relation,
        source_type: &str,
        cache: &ElementCache,
    ) -> CapacityResult {
        let mut contributions: Vec<(f64, String)> = Vec::new();

        for member in &relation.members {
            let tags = match member.member_type {
                MemberType::Node => cache.get_node(member.ref_id).map(|n| &n.tags),
                MemberType::Way => cache.get_way(member.ref_id).map(|w| &w.tags),
                MemberType::Relation => None,
            };
            let Some(tags) = tags else { continue };
            let qualifies = tags
                .keys()
                .any(|k| k.starts_with("power:") || k.contains("output"));
            if !qualifies {
                continue;
            }
            let output_key = tags
                .keys()
                .filter(|k| k.contains("output"))
                .max_by_key(|k| k.contains("output:electricity"))
                .cloned();
            let Some(output_key) = output_key else { continue };
            let Some(raw) = tags.get(&output_key) else { continue };

            let value = CapacityExtractor::basic_extraction(raw)
                .or_else(|_| CapacityExtractor::advanced_extraction(raw));
            let identification = format!("{}/{}", member.member_type_str(), member.ref_id);
            match value {
                Ok(v) => contributions.push((v.capacity_mw, identification)),
                Err(_) => {
                    let source_cfg = self.config.sources.get(source_type);
                    let default_mw = source_cfg
                        .and_then(|s| s.capacity_estimation.unit_capacity)
                        .unwrap_or(1.0);
                    contributions.push((default_mw, identification));
                }
            }
        }

        match contributions.len() {
            0 => CapacityResult {
                capacity_mw: None,
                info: "unknown".to_string(),
                contributing_ids: vec![],
            },
            1 => {
                let (value, id) = contributions.into_iter().next().unwrap();
                CapacityResult {
                    capacity_mw: Some(value),
                    info: "member_capacity".to_string(),
                    contributing_ids: vec![id],
                }
            }
            _ => {
                let total: f64 = contributions.iter().map(|(v, _)| v).sum();
                let ids = contributions.into_iter().map(|(_, id)| id).collect();
                CapacityResult {
                    capacity_mw: Some(total),
                    info: "aggregated_capacity".to_string(),
                    contributing_ids: ids,
                }
            }
        }
    }
}

impl MemberType {
    fn member_type_str(self) -> &'static str {
        match self {
            MemberType::Node => "node",
            MemberType::Way => "way",
            MemberType::Relation => "relation",
        }
    }
}

/// Extracts a 4-digit year from a free-form date string. Only the year is
/// ever trusted, even if the original string looks like a full `YYYY-MM-DD`.
fn extract_year(raw: &str) -> Option<u32> {
    let bytes: Vec<char> = raw.chars().collect();
    for window_start in 0..bytes.len() {
        if window_start + 4 > bytes.len() {
            break;
        }
        let window: String = bytes[window_start..window_start + 4].iter().collect();
        if let Ok(year) = window.parse::<u32>() {
            if (1300..3000).contains(&year) {
                let before_ok = window_start == 0 || !bytes[window_start - 1].is_ascii_digit();
                let after_ok = window_start + 4 == bytes.len()
                    || !bytes[window_start + 4].is_ascii_digit();
                if before_ok && after_ok {
                    return Some(year);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::{Node, Tags};

    fn node_with_tags(tags: &[(&str, &str)]) -> OsmElement {
        OsmElement::Node(Node {
            id: 1,
            lat: 0.0,
            lon: 0.0,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<Tags>(),
            country: None,
        })
    }

    #[test]
    fn extract_name_prefers_name_en() {
        let cfg = Config::default();
        let extractor = TagExtractor::new(&cfg);
        let el = node_with_tags(&[("name:en", "Alpha"), ("name", "Alfa")]);
        assert_eq!(extractor.extract_name(&el, UnitKind::Plant).unwrap(), "Alpha");
    }

    #[test]
    fn extract_name_rejects_when_missing_and_not_allowed() {
        let cfg = Config::default();
        let extractor = TagExtractor::new(&cfg);
        let el = node_with_tags(&[]);
        assert_eq!(
            extractor.extract_name(&el, UnitKind::Plant).unwrap_err(),
            RejectionReason::MissingNameTag
        );
    }

    #[test]
    fn extract_source_maps_synonym_to_canonical() {
        let cfg = Config::default();
        let extractor = TagExtractor::new(&cfg);
        let el = node_with_tags(&[("plant:source", "pv")]);
        assert_eq!(extractor.extract_source(&el, UnitKind::Plant).unwrap(), "Solar");
    }

    #[test]
    fn extract_source_unmapped_value_is_rejected() {
        let cfg = Config::default();
        let extractor = TagExtractor::new(&cfg);
        let el = node_with_tags(&[("plant:source", "antimatter")]);
        assert_eq!(
            extractor.extract_source(&el, UnitKind::Plant).unwrap_err(),
            RejectionReason::MissingSourceType
        );
    }

    #[test]
    fn extract_start_date_keeps_only_the_year() {
        let cfg = Config::default();
        let extractor = TagExtractor::new(&cfg);
        let el = node_with_tags(&[("start_date", "2015-06-12")]);
        assert_eq!(extractor.extract_start_date(&el, UnitKind::Plant).unwrap(), "2015");
    }

    #[test]
    fn extract_year_ignores_digit_runs_that_are_not_four_long() {
        assert_eq!(extract_year("in the 20150s"), None);
        assert_eq!(extract_year("2015"), Some(2015));
    }

    #[test]
    fn process_capacity_falls_back_to_area_based_when_source_configures_it() {
        use crate::config::{CapacityEstimationMethodConfig, SourceConfig};
        use crate::model::geometry::polygon_shape;

        let mut cfg = Config::default();
        cfg.capacity_estimation.enabled = true;
        cfg.sources.insert(
            "Solar".to_string(),
            SourceConfig {
                capacity_estimation: CapacityEstimationMethodConfig {
                    method: "area_based".to_string(),
                    unit_capacity: None,
                    efficiency: Some(100.0),
                },
                units_clustering: Default::default(),
            },
        );
        let extractor = TagExtractor::new(&cfg);
        let el = node_with_tags(&[("plant:output:electricity", "yes")]);
        let shape =
            polygon_shape(&[(0.0, 0.0), (0.0, 0.001), (0.001, 0.001), (0.001, 0.0)]).unwrap();

        let result = extractor
            .process_capacity(&el, "plant:output:electricity", "Solar", Some(&shape), 0.0, true)
            .unwrap();
        assert_eq!(result.info, "estimated_area_plant");
        assert!(result.capacity_mw.unwrap() > 0.0);
    }

    #[test]
    fn process_capacity_rejects_an_unrecognised_estimation_method() {
        use crate::config::{CapacityEstimationMethodConfig, SourceConfig};

        let mut cfg = Config::default();
        cfg.capacity_estimation.enabled = true;
        cfg.sources.insert(
            "Solar".to_string(),
            SourceConfig {
                capacity_estimation: CapacityEstimationMethodConfig {
                    method: "neural_net".to_string(),
                    unit_capacity: None,
                    efficiency: None,
                },
                units_clustering: Default::default(),
            },
        );
        let extractor = TagExtractor::new(&cfg);
        let el = node_with_tags(&[("plant:output:electricity", "yes")]);

        let err = extractor
            .process_capacity(&el, "plant:output:electricity", "Solar", None, 0.0, true)
            .unwrap_err();
        assert_eq!(err, RejectionReason::EstimationMethodUnknown);
    }
}

//! Turns a raw `power=plant` element into a [`Unit`], or records why it
//! couldn't be turned into one.

use crate::cache::ElementCache;
use crate::config::Config;
use crate::geometry_handler::GeometryHandler;
use crate::model::element::{MemberType, OsmElement};
use crate::model::geometry::PlantGeometry;
use crate::model::rejection::RejectionReason;
use crate::model::unit::Unit;
use crate::parsing::reconstruction::PlantReconstructor;
use crate::parsing::tags::{TagExtractor, UnitKind};
use crate::parsing::unit_factory::{PlantUnitArgs, UnitFactory};
use crate::rejection::RejectionTracker;

/// Tracks which of a plant's mandatory fields failed extraction, to decide
/// whether the relation-member reconstruction subpath is worth attempting.
#[derive(Debug, Default, Clone, Copy)]
struct MissingFields {
    name: bool,
    source: bool,
    technology: bool,
    start_date: bool,
}

impl MissingFields {
    fn any(self) -> bool {
        self.name || self.source || self.technology || self.start_date
    }
}

pub struct PlantParser<'a> {
    config: &'a Config,
    factory: UnitFactory,
}

impl<'a> PlantParser<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            factory: UnitFactory::new(config),
        }
    }

    /// Runs the full plant pipeline against a single element: coordinates,
    /// name, source, technology and start date are all extracted eagerly so
    /// that an incomplete relation has a chance to reconstruct itself from
    /// its own generator members (see [`Self::try_reconstruct_from_members`])
    /// before the first missing field is allowed to fail the element outright.
    pub fn process_element(
        &self,
        element: &OsmElement,
        cache: &ElementCache,
        rejections: &mut RejectionTracker,
    ) -> Option<Unit> {
        let extractor = TagExtractor::new(self.config);
        let id = element.identification();

        let Some((lat, lon)) = GeometryHandler::process_element_coordinates(element, cache) else {
            rejections.record(
                element.id().to_string(),
                element.element_type(),
                RejectionReason::CoordinatesNotFound,
                None,
                "",
                None,
                element.country().map(String::from),
                Some("plant".to_string()),
            );
            return None;
        };

        let mut missing = MissingFields::default();

        let name_result = extractor.extract_name(element, UnitKind::Plant);
        missing.name = name_result.is_err();

        let source_result = extractor.extract_source(element, UnitKind::Plant);
        missing.source = source_result.is_err();
        let source_type = source_result.clone().unwrap_or_default();

        let technology_result = extractor.extract_technology(element, UnitKind::Plant, &source_type);
        missing.technology = technology_result.is_err();

        let start_date_result = extractor.extract_start_date(element, UnitKind::Plant);
        missing.start_date = start_date_result.is_err();

        if missing.any() && self.config.units_reconstruction.enabled {
            if let Some(relation) = element.as_relation() {
                if let Some(unit) = self.try_reconstruct_from_members(element, relation, cache, missing) {
                    rejections.delete_for_units(&[id]);
                    return Some(unit);
                }
            }
        }

        let name = match name_result {
            Ok(n) => n,
            Err(reason) => {
                self.reject(rejections, element, reason, None, (lat, lon));
                return None;
            }
        };

        let source_type = match source_result {
            Ok(s) => s,
            Err(reason) => {
                let keyword = element
                    .tags()
                    .get("plant:source")
                    .cloned()
                    .unwrap_or_default();
                self.reject(rejections, element, reason, Some(keyword), (lat, lon));
                return None;
            }
        };

        let technology = match technology_result {
            Ok(t) => t,
            Err(reason) => {
                self.reject(rejections, element, reason, None, (lat, lon));
                return None;
            }
        };

        let start_date = match start_date_result {
            Ok(d) => d,
            Err(reason) => {
                self.reject(rejections, element, reason, None, (lat, lon));
                return None;
            }
        };

        let geometry = GeometryHandler::get_element_geometry(element, cache);
        let shape = geometry.as_ref().map(|g| &g.shape);

        let capacity_result = if let Some(relation) = element.as_relation() {
            let relation_capacity = extractor.relation_member_capacity(relation, &source_type, cache);
            if relation_capacity.capacity_mw.is_some() {
                relation_capacity
            } else {
                match extractor.extract_output_key(element, UnitKind::Plant, Some(&source_type)) {
                    Ok(key) => match extractor.process_capacity(element, &key, &source_type, shape, lat, true) {
                        Ok(v) => v,
                        Err(reason) => {
                            self.reject_capacity(rejections, element, &key, reason, (lat, lon));
                            return None;
                        }
                    },
                    Err(reason) => {
                        self.reject(rejections, element, reason, None, (lat, lon));
                        return None;
                    }
                }
            }
        } else {
            let output_key =
                match extractor.extract_output_key(element, UnitKind::Plant, Some(&source_type)) {
                    Ok(k) => k,
                    Err(reason) => {
                        self.reject(rejections, element, reason, None, (lat, lon));
                        return None;
                    }
                };
            match extractor.process_capacity(element, &output_key, &source_type, shape, lat, true) {
                Ok(v) => v,
                Err(reason) => {
                    self.reject_capacity(rejections, element, &output_key, reason, (lat, lon));
                    return None;
                }
            }
        };

        let id_for_delete = capacity_result.contributing_ids.clone();
        let args = PlantUnitArgs {
            unit_type: "plant",
            element_type: element.element_type().to_string(),
            element_id: element.id().to_string(),
            country: element.country().map(String::from),
            lat: Some(lat),
            lon: Some(lon),
            fueltype: Some(source_type),
            technology: (!technology.is_empty()).then_some(technology),
            capacity: capacity_result.capacity_mw,
            name: (!name.is_empty()).then_some(name),
            generator_count: None,
            date_in: (!start_date.is_empty()).then_some(start_date),
            capacity_source: Some(capacity_result.info),
        };
        let unit = self.factory.create_plant_unit(args);
        let mut ids = id_for_delete;
        ids.push(id);
        rejections.delete_for_units(&ids);
        Some(unit)
    }

    /// Reconstructs a plant unit from a set of orphaned generators that
    /// plausibly belong to the same installation. Returns `None` if there
    /// are too few matching generators to meet the minimum threshold.
    pub fn reconstruct_from_generators(
        &self,
        reconstructor: &PlantReconstructor,
        representative_element: &OsmElement,
        names: &[String],
        sources: &[String],
        technologies: &[String],
        capacities_mw: &[f64],
        start_dates: &[String],
    ) -> Option<Unit> {
        if !reconstructor.can_reconstruct(names) {
            return None;
        }
        let info = reconstructor.aggregate_generator_info(
            names,
            sources,
            technologies,
            capacities_mw,
            start_dates,
            None,
        );
        let (lat, lon) = representative_element.derived_coordinates();
        let args = PlantUnitArgs {
            unit_type: "plant",
            element_type: representative_element.element_type().to_string(),
            element_id: representative_element.id().to_string(),
            country: representative_element.country().map(String::from),
            lat,
            lon,
            fueltype: Some(info.source_type.clone()),
            technology: (!info.technology.is_empty()).then_some(info.technology.clone()),
            capacity: Some(info.total_capacity_mw),
            name: Some(info.name.clone()),
            generator_count: Some(info.generator_count),
            date_in: info.earliest_start_date.clone(),
            capacity_source: None,
        };
        Some(self.factory.create_reconstructed_plant(args))
    }

    /// Resolves `relation`'s own members, keeps the ones tagged
    /// `power=generator`, and attempts to reconstruct a plant from them.
    /// Returns `None` if reconstruction is disabled, too few members
    /// qualify, or the reconstructed unit still lacks a value for any field
    /// that was originally missing — a partial reconstruction is not an
    /// improvement over the plain rejection it would otherwise fall back to.
    fn try_reconstruct_from_members(
        &self,
        element: &OsmElement,
        relation: &crate::model::element::Relation,
        cache: &ElementCache,
        missing: MissingFields,
    ) -> Option<Unit> {
        let extractor = TagExtractor::new(self.config);

        let mut names = Vec::new();
        let mut sources = Vec::new();
        let mut technologies = Vec::new();
        let mut capacities = Vec::new();
        let mut start_dates = Vec::new();

        for member in &relation.members {
            let member_element = match member.member_type {
                MemberType::Node => cache.get_node(member.ref_id).map(|n| OsmElement::Node(n.clone())),
                MemberType::Way => cache.get_way(member.ref_id).map(|w| OsmElement::Way(w.clone())),
                MemberType::Relation => None,
            };
            let Some(member_element) = member_element else {
                continue;
            };
            if member_element.tags().get("power").map(String::as_str) != Some("generator") {
                continue;
            }

            let name = extractor
                .extract_name(&member_element, UnitKind::Generator)
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let source_type = extractor
                .extract_source(&member_element, UnitKind::Generator)
                .unwrap_or_default();
            let technology = extractor
                .extract_technology(&member_element, UnitKind::Generator, &source_type)
                .unwrap_or_default();
            let start_date = extractor
                .extract_start_date(&member_element, UnitKind::Generator)
                .unwrap_or_default();
            let capacity_mw = extractor
                .extract_output_key(&member_element, UnitKind::Generator, Some(&source_type))
                .ok()
                .and_then(|key| {
                    let geometry = GeometryHandler::get_element_geometry(&member_element, cache);
                    let (member_lat, _) =
                        GeometryHandler::process_element_coordinates(&member_element, cache)
                            .unwrap_or((0.0, 0.0));
                    extractor
                        .process_capacity(
                            &member_element,
                            &key,
                            &source_type,
                            geometry.as_ref().map(|g| &g.shape),
                            member_lat,
                            false,
                        )
                        .ok()
                })
                .and_then(|c| c.capacity_mw)
                .unwrap_or(0.0);

            names.push(name);
            sources.push(source_type);
            technologies.push(technology);
            capacities.push(capacity_mw);
            start_dates.push(start_date);
        }

        let reconstructor = PlantReconstructor::new(
            self.config
                .units_reconstruction
                .min_generators_for_reconstruction,
            self.config.units_reconstruction.name_similarity_threshold,
        );
        let unit = self.reconstruct_from_generators(
            &reconstructor,
            element,
            &names,
            &sources,
            &technologies,
            &capacities,
            &start_dates,
        )?;

        if missing.name && unit.name.as_deref().unwrap_or("").is_empty() {
            return None;
        }
        if missing.source && unit.fueltype.as_deref().unwrap_or("").is_empty() {
            return None;
        }
        if missing.technology && unit.technology.as_deref().unwrap_or("").is_empty() {
            return None;
        }
        if missing.start_date && unit.date_in.as_deref().unwrap_or("").is_empty() {
            return None;
        }
        Some(unit)
    }

    /// Builds a salvaged plant from generators found inside a rejected
    /// plant's geometry, preserving the rejected plant's identity.
    pub fn salvage_from_rejected_geometry(
        &self,
        rejected_plant: &PlantGeometry,
        country: Option<String>,
        source_type: String,
        technology: Option<String>,
        total_capacity_mw: f64,
        generator_count: u32,
    ) -> Unit {
        let (lat, lon) = rejected_plant.centroid().unzip();
        let args = PlantUnitArgs {
            unit_type: "plant",
            element_type: rejected_plant.element_type.to_string(),
            element_id: String::new(),
            country,
            lat,
            lon,
            fueltype: Some(source_type),
            technology,
            capacity: Some(total_capacity_mw),
            name: None,
            generator_count: Some(generator_count),
            date_in: None,
            capacity_source: None,
        };
        self.factory.create_salvaged_plant(&rejected_plant.id, args)
    }

    fn reject(
        &self,
        rejections: &mut RejectionTracker,
        element: &OsmElement,
        reason: RejectionReason,
        keyword: Option<String>,
        coordinates: (f64, f64),
    ) {
        self.reject_with_details(rejections, element, reason, None, keyword, coordinates);
    }

    /// Rejection for a failed capacity parse: carries the raw tag value as
    /// `keywords` and, for a decimal-format error, the comma-to-dot suggested
    /// fix as `details`.
    fn reject_capacity(
        &self,
        rejections: &mut RejectionTracker,
        element: &OsmElement,
        output_key: &str,
        reason: RejectionReason,
        coordinates: (f64, f64),
    ) {
        let raw = element.tags().get(output_key).cloned().unwrap_or_default();
        let details = (reason == RejectionReason::CapacityDecimalFormat)
            .then(|| crate::capacity::extractor::suggested_correction(&raw));
        self.reject_with_details(rejections, element, reason, details, Some(raw), coordinates);
    }

    fn reject_with_details(
        &self,
        rejections: &mut RejectionTracker,
        element: &OsmElement,
        reason: RejectionReason,
        details: Option<String>,
        keyword: Option<String>,
        coordinates: (f64, f64),
    ) {
        rejections.record(
            element.id().to_string(),
            element.element_type(),
            reason,
            details,
            keyword.unwrap_or_default(),
            Some(coordinates),
            element.country().map(String::from),
            Some("plant".to_string()),
        );
    }
}

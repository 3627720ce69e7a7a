//! Turns a raw `power=generator` element into a [`Unit`], and tracks
//! generators left unclaimed by any plant so they can be salvaged or
//! reconstructed into one later.

use crate::cache::ElementCache;
use crate::config::Config;
use crate::geometry_handler::GeometryHandler;
use crate::model::element::OsmElement;
use crate::model::geometry::PlantGeometry;
use crate::model::rejection::RejectionReason;
use crate::model::unit::Unit;
use crate::parsing::tags::{TagExtractor, UnitKind};
use crate::parsing::unit_factory::{PlantUnitArgs, UnitFactory};
use crate::rejection::RejectionTracker;

pub struct GeneratorParser<'a> {
    config: &'a Config,
    factory: UnitFactory,
}

/// A generator that parsed cleanly but didn't already belong to a known
/// plant, kept around for reconstruction/salvage.
#[derive(Debug, Clone)]
pub struct OrphanedGenerator {
    pub element_id: String,
    pub name: String,
    pub source_type: String,
    pub technology: String,
    pub capacity_mw: f64,
    pub start_date: String,
    pub lat: f64,
    pub lon: f64,
}

/// What became of a generator run through [`GeneratorParser::process_element`].
pub enum GeneratorOutcome {
    /// Parsed to a standalone unit.
    Unit(Unit),
    /// Tags extracted cleanly but the generator's coordinates fall inside a
    /// rejected plant's footprint; it belongs to that plant's salvage group
    /// rather than becoming a unit of its own.
    SalvageMatch {
        rejected_plant_id: String,
        generator: OrphanedGenerator,
    },
    /// Rejected outright; the reason has already been recorded.
    Rejected,
}

impl<'a> GeneratorParser<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            factory: UnitFactory::new(config),
        }
    }

    /// If `accepted_plant_geometries` is non-empty and the generator's own
    /// coordinates land within any of them, rejects it with
    /// [`RejectionReason::WithinExistingPlant`]: it's already accounted for.
    /// Otherwise, once tags extract cleanly, checks `rejected_plant_geometries`
    /// next: a generator inside a rejected plant's footprint is routed into
    /// that plant's salvage group instead of becoming its own unit.
    pub fn process_element(
        &self,
        element: &OsmElement,
        cache: &ElementCache,
        accepted_plant_geometries: &[PlantGeometry],
        rejected_plant_geometries: &[PlantGeometry],
        rejections: &mut RejectionTracker,
    ) -> GeneratorOutcome {
        let extractor = TagExtractor::new(self.config);

        let Some((lat, lon)) = GeometryHandler::process_element_coordinates(element, cache) else {
            self.reject(rejections, element, RejectionReason::CoordinatesNotFound, None, None);
            return GeneratorOutcome::Rejected;
        };

        if GeometryHandler::is_element_within_plant_geometries(
            element,
            cache,
            accepted_plant_geometries,
            None,
        ) {
            self.reject(
                rejections,
                element,
                RejectionReason::WithinExistingPlant,
                None,
                Some((lat, lon)),
            );
            return GeneratorOutcome::Rejected;
        }

        let name = extractor
            .extract_name(element, UnitKind::Generator)
            .unwrap_or_default();

        let source_type = match extractor.extract_source(element, UnitKind::Generator) {
            Ok(s) => s,
            Err(reason) => {
                self.reject(rejections, element, reason, None, Some((lat, lon)));
                return GeneratorOutcome::Rejected;
            }
        };

        let technology =
            match extractor.extract_technology(element, UnitKind::Generator, &source_type) {
                Ok(t) => t,
                Err(reason) => {
                    self.reject(rejections, element, reason, None, Some((lat, lon)));
                    return GeneratorOutcome::Rejected;
                }
            };

        let start_date = extractor
            .extract_start_date(element, UnitKind::Generator)
            .unwrap_or_default();

        let output_key = match extractor.extract_output_key(element, UnitKind::Generator, Some(&source_type)) {
            Ok(k) => k,
            Err(reason) => {
                self.reject(rejections, element, reason, None, Some((lat, lon)));
                return GeneratorOutcome::Rejected;
            }
        };

        if self.config.units_reconstruction.enabled {
            if let Some(rejected) = rejected_plant_geometries
                .iter()
                .find(|g| g.contains_point(lat, lon, None))
            {
                let capacity_mw = GeometryHandler::get_element_geometry(element, cache)
                    .and_then(|geometry| {
                        extractor
                            .process_capacity(
                                element,
                                &output_key,
                                &source_type,
                                Some(&geometry.shape),
                                lat,
                                false,
                            )
                            .ok()
                    })
                    .and_then(|c| c.capacity_mw)
                    .unwrap_or(0.0);
                return GeneratorOutcome::SalvageMatch {
                    rejected_plant_id: rejected.id.clone(),
                    generator: OrphanedGenerator {
                        element_id: element.identification(),
                        name,
                        source_type,
                        technology,
                        capacity_mw,
                        start_date,
                        lat,
                        lon,
                    },
                };
            }
        }

        let geometry = GeometryHandler::get_element_geometry(element, cache);
        let capacity = match extractor.process_capacity(
            element,
            &output_key,
            &source_type,
            geometry.as_ref().map(|g| &g.shape),
            lat,
            false,
        ) {
            Ok(v) => v,
            Err(reason) => {
                self.reject_capacity(rejections, element, &output_key, reason, (lat, lon));
                return GeneratorOutcome::Rejected;
            }
        };

        let id = element.identification();
        let args = PlantUnitArgs {
            unit_type: "generator",
            element_type: element.element_type().to_string(),
            element_id: element.id().to_string(),
            country: element.country().map(String::from),
            lat: Some(lat),
            lon: Some(lon),
            fueltype: Some(source_type),
            technology: (!technology.is_empty()).then_some(technology),
            capacity: capacity.capacity_mw,
            name: (!name.is_empty()).then_some(name),
            generator_count: None,
            date_in: (!start_date.is_empty()).then_some(start_date),
            capacity_source: Some(capacity.info),
        };
        let unit = self.factory.create_generator_unit(args);
        let mut ids = capacity.contributing_ids;
        ids.push(id);
        rejections.delete_for_units(&ids);
        GeneratorOutcome::Unit(unit)
    }

    /// Builds the [`OrphanedGenerator`] record used by the reconstruction
    /// and salvage paths, skipping generators that lack a name (they
    /// contribute nothing to name-similarity aggregation).
    pub fn as_orphaned(
        &self,
        element: &OsmElement,
        cache: &ElementCache,
    ) -> Option<OrphanedGenerator> {
        let extractor = TagExtractor::new(self.config);
        let (lat, lon) = GeometryHandler::process_element_coordinates(element, cache)?;
        let name = extractor.extract_name(element, UnitKind::Generator).ok()?;
        if name.is_empty() {
            return None;
        }
        let source_type = extractor
            .extract_source(element, UnitKind::Generator)
            .unwrap_or_default();
        let technology = extractor
            .extract_technology(element, UnitKind::Generator, &source_type)
            .unwrap_or_default();
        let start_date = extractor
            .extract_start_date(element, UnitKind::Generator)
            .unwrap_or_default();
        let geometry = GeometryHandler::get_element_geometry(element, cache);
        let capacity_mw = extractor
            .extract_output_key(element, UnitKind::Generator, Some(&source_type))
            .and_then(|key| {
                extractor.process_capacity(
                    element,
                    &key,
                    &source_type,
                    geometry.as_ref().map(|g| &g.shape),
                    lat,
                    false,
                )
            })
            .ok()
            .and_then(|c| c.capacity_mw)
            .unwrap_or(0.0);

        Some(OrphanedGenerator {
            element_id: element.identification(),
            name,
            source_type,
            technology,
            capacity_mw,
            start_date,
            lat,
            lon,
        })
    }

    fn reject(
        &self,
        rejections: &mut RejectionTracker,
        element: &OsmElement,
        reason: RejectionReason,
        keyword: Option<String>,
        coordinates: Option<(f64, f64)>,
    ) {
        rejections.record(
            element.id().to_string(),
            element.element_type(),
            reason,
            None,
            keyword.unwrap_or_default(),
            coordinates,
            element.country().map(String::from),
            Some("generator".to_string()),
        );
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
        rejections.record(
            element.id().to_string(),
            element.element_type(),
            reason,
            details,
            raw,
            Some(coordinates),
            element.country().map(String::from),
            Some("generator".to_string()),
        );
    }
}

//! Top-level orchestration: wires the caches, the Overpass client and the
//! parsers together into a single country's (or several countries') run.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::cache::{CoordinateCache, ElementCache};
use crate::config::Config;
use crate::country::resolve_countries;
use crate::error::WorkflowResult;
use crate::geometry_handler::GeometryHandler;
use crate::model::element::OsmElement;
use crate::model::geometry::PlantGeometry;
use crate::model::unit::{Unit, Units};
use crate::overpass::{AreaFilter, OverpassClient};
use crate::parsing::generator_parser::{GeneratorOutcome, OrphanedGenerator};
use crate::parsing::reconstruction::PlantReconstructor;
use crate::parsing::{GeneratorParser, PlantParser};
use crate::rejection::RejectionTracker;

pub struct Workflow {
    config: Config,
    overpass: OverpassClient,
}

#[derive(Debug, Default)]
pub struct CountryReport {
    pub country: String,
    pub plants_processed: usize,
    pub generators_processed: usize,
    pub rejections: usize,
    pub reused_cache: bool,
}

impl Workflow {
    pub fn new(config: Config, overpass: OverpassClient) -> Self {
        Self { config, overpass }
    }

    /// Runs the full pipeline for one country: fetch, parse plants, build
    /// their geometries, parse generators against those geometries, fold
    /// any leftover generators back in via reconstruction, and persist the
    /// result to `cache` if its config hash no longer matches a cached run.
    pub async fn process_country(
        &self,
        country: &str,
        cache: &mut ElementCache,
        rejections: &mut RejectionTracker,
    ) -> WorkflowResult<CountryReport> {
        let config_hash = self.config.config_hash();
        if !self.config.force_refresh {
            if let Some(cached) = cache.get_units(country) {
                if cached.iter().all(|u| u.is_valid_for_config(&config_hash)) && !cached.is_empty()
                {
                    info!(country, "reusing cached units, config unchanged");
                    return Ok(CountryReport {
                        country: country.to_string(),
                        plants_processed: cached.len(),
                        generators_processed: 0,
                        rejections: rejections.len(),
                        reused_cache: true,
                    });
                }
            }
        }

        let plant_outcome = self
            .overpass
            .get_power_elements("plant", &AreaFilter::Country(country.to_string()))
            .await?;
        if let Some(err) = &plant_outcome.error {
            warn!(country, error = %err, "plant fetch degraded to empty result");
        }
        cache.store_nodes(plant_outcome.nodes.clone());
        cache.store_ways(plant_outcome.ways.clone());
        cache.store_relations(plant_outcome.relations.clone());

        let generator_outcome = self
            .overpass
            .get_power_elements("generator", &AreaFilter::Country(country.to_string()))
            .await?;
        if let Some(err) = &generator_outcome.error {
            warn!(country, error = %err, "generator fetch degraded to empty result");
        }
        cache.store_nodes(generator_outcome.nodes.clone());
        cache.store_ways(generator_outcome.ways.clone());
        cache.store_relations(generator_outcome.relations.clone());

        let plant_parser = PlantParser::new(&self.config);
        let generator_parser = GeneratorParser::new(&self.config);

        let plant_elements: Vec<OsmElement> = plant_outcome
            .nodes
            .into_iter()
            .map(OsmElement::Node)
            .chain(plant_outcome.ways.into_iter().map(OsmElement::Way))
            .chain(plant_outcome.relations.into_iter().map(OsmElement::Relation))
            .collect();

        let mut units = Units::new();
        let mut accepted_plant_geometries: Vec<PlantGeometry> = Vec::new();
        let mut rejected_plant_geometries: Vec<PlantGeometry> = Vec::new();

        for element in &plant_elements {
            let geometry = GeometryHandler::get_element_geometry(element, cache);
            if let Some(unit) = plant_parser.process_element(element, cache, rejections) {
                units.add_unit(unit);
                if let Some(geometry) = geometry {
                    accepted_plant_geometries.push(geometry);
                }
            } else if let Some(geometry) = geometry {
                rejected_plant_geometries.push(geometry);
            }
        }

        let generator_elements: Vec<OsmElement> = generator_outcome
            .nodes
            .into_iter()
            .map(OsmElement::Node)
            .chain(generator_outcome.ways.into_iter().map(OsmElement::Way))
            .chain(
                generator_outcome
                    .relations
                    .into_iter()
                    .map(OsmElement::Relation),
            )
            .collect();

        let mut generator_count = 0usize;
        let mut orphans: Vec<(OrphanedGenerator, OsmElement)> = Vec::new();
        let mut salvage_groups: HashMap<String, Vec<OrphanedGenerator>> = HashMap::new();
        for element in generator_elements {
            match generator_parser.process_element(
                &element,
                cache,
                &accepted_plant_geometries,
                &rejected_plant_geometries,
                rejections,
            ) {
                GeneratorOutcome::Unit(unit) => {
                    generator_count += 1;
                    units.add_unit(unit);
                }
                GeneratorOutcome::SalvageMatch {
                    rejected_plant_id,
                    generator,
                } => {
                    salvage_groups
                        .entry(rejected_plant_id)
                        .or_default()
                        .push(generator);
                }
                GeneratorOutcome::Rejected => {
                    if let Some(orphan) = generator_parser.as_orphaned(&element, cache) {
                        orphans.push((orphan, element));
                    }
                }
            }
        }

        for salvaged in
            self.finalize_salvage(&plant_parser, &rejected_plant_geometries, salvage_groups)
        {
            units.add_unit(salvaged);
        }
        for reconstructed in self.reconstruct_orphans(&plant_parser, orphans) {
            units.add_unit(reconstructed);
        }

        let country_units: Vec<Unit> = units.iter().cloned().collect();
        cache.store_units(country, country_units);
        cache.save_all(false)?;

        Ok(CountryReport {
            country: country.to_string(),
            plants_processed: plant_elements.len(),
            generators_processed: generator_count,
            rejections: rejections.len(),
            reused_cache: false,
        })
    }

    /// Finalizes each rejected plant's salvage group, built up during
    /// generator processing by [`GeneratorParser::process_element`] routing
    /// every generator whose coordinates land inside that plant's geometry.
    /// A group needs only one member to salvage — unlike full reconstruction,
    /// the plant's own geometry is already known, so there's no name-based
    /// clustering to get wrong.
    fn finalize_salvage(
        &self,
        plant_parser: &PlantParser,
        rejected_plant_geometries: &[PlantGeometry],
        mut salvage_groups: HashMap<String, Vec<OrphanedGenerator>>,
    ) -> Vec<Unit> {
        let reconstructor = PlantReconstructor::new(1, 0.0);
        rejected_plant_geometries
            .iter()
            .filter_map(|geometry| {
                let group = salvage_groups.remove(&geometry.id)?;
                if group.is_empty() {
                    return None;
                }
                let names: Vec<String> = group.iter().map(|o| o.name.clone()).collect();
                let sources: Vec<String> = group.iter().map(|o| o.source_type.clone()).collect();
                let technologies: Vec<String> = group.iter().map(|o| o.technology.clone()).collect();
                let capacities: Vec<f64> = group.iter().map(|o| o.capacity_mw).collect();
                let info = reconstructor.aggregate_generator_info(
                    &names,
                    &sources,
                    &technologies,
                    &capacities,
                    &[],
                    None,
                );
                Some(plant_parser.salvage_from_rejected_geometry(
                    geometry,
                    None,
                    info.source_type,
                    (!info.technology.is_empty()).then_some(info.technology),
                    info.total_capacity_mw,
                    group.len() as u32,
                ))
            })
            .collect()
    }

    /// Greedily groups orphaned generators that are neither members of any
    /// plant relation nor inside any rejected plant's footprint, by
    /// representative-name similarity, and reconstructs a plant for each
    /// group that meets the configured minimum generator count. This is a
    /// last resort for generators a relation or a rejected-plant polygon
    /// never claimed.
    fn reconstruct_orphans(
        &self,
        plant_parser: &PlantParser,
        orphans: Vec<(OrphanedGenerator, OsmElement)>,
    ) -> Vec<Unit> {
        let reconstructor = PlantReconstructor::new(
            self.config
                .units_reconstruction
                .min_generators_for_reconstruction,
            self.config.units_reconstruction.name_similarity_threshold,
        );
        let mut groups: Vec<Vec<(OrphanedGenerator, OsmElement)>> = Vec::new();
        'orphan: for entry in orphans {
            for group in groups.iter_mut() {
                if reconstructor
                    .name_aggregator
                    .names_match(&group[0].0.name, &entry.0.name)
                {
                    group.push(entry);
                    continue 'orphan;
                }
            }
            groups.push(vec![entry]);
        }

        groups
            .into_iter()
            .filter_map(|group| {
                let names: Vec<String> = group.iter().map(|(o, _)| o.name.clone()).collect();
                if !reconstructor.can_reconstruct(&names) {
                    return None;
                }
                let sources: Vec<String> = group.iter().map(|(o, _)| o.source_type.clone()).collect();
                let technologies: Vec<String> =
                    group.iter().map(|(o, _)| o.technology.clone()).collect();
                let capacities: Vec<f64> = group.iter().map(|(o, _)| o.capacity_mw).collect();
                let start_dates: Vec<String> =
                    group.iter().map(|(o, _)| o.start_date.clone()).collect();
                let representative = &group[0].1;
                plant_parser.reconstruct_from_generators(
                    &reconstructor,
                    representative,
                    &names,
                    &sources,
                    &technologies,
                    &capacities,
                    &start_dates,
                )
            })
            .collect()
    }
}

/// Runs [`Workflow::process_country`] across many countries. Each country is
/// still processed single-threaded and synchronously end to end; the
/// parallelism here is only across countries, and only when `parallel` is
/// true. Country name validation happens up front, across the whole batch,
/// so a single typo doesn't abort a run halfway through.
pub fn validate_countries(inputs: &[String]) -> WorkflowResult<Vec<String>> {
    Ok(resolve_countries(inputs)?)
}

/// Synchronous convenience wrapper used when the caller already has fully
/// independent per-country [`ElementCache`]s and just wants them processed
/// with optional thread-level fan-out. Async orchestration (the common
/// path) should call [`Workflow::process_country`] directly per country.
pub fn process_countries_blocking<F>(countries: &[String], parallel: bool, process_one: F)
where
    F: Fn(&str) + Sync + Send,
{
    if parallel {
        countries.par_iter().for_each(|c| process_one(c));
    } else {
        for c in countries {
            process_one(c);
        }
    }
}

pub type SharedOverpassClient = Arc<OverpassClient>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overpass::transport::stub::StubTransport;

    #[tokio::test]
    async fn process_country_persists_units_to_cache() {
        let cfg = Config::default();
        let transport = Arc::new(StubTransport::new(vec![
            Ok(serde_json::json!({
                "elements": [
                    {"type": "node", "id": 1, "lat": 48.0, "lon": 11.0, "tags": {
                        "power": "plant", "plant:source": "solar", "plant:method": "photovoltaic",
                        "plant:output:electricity": "5 MW", "name": "Alpha"
                    }},
                ]
            })),
            Ok(serde_json::json!({ "elements": [] })),
        ]));
        let overpass = OverpassClient::new(transport, &cfg);
        let workflow = Workflow::new(cfg, overpass);
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ElementCache::new(dir.path());
        let mut rejections = RejectionTracker::new();

        let report = workflow
            .process_country("DE", &mut cache, &mut rejections)
            .await
            .unwrap();

        assert_eq!(report.plants_processed, 1);
        assert!(!report.reused_cache);
        assert_eq!(cache.get_units("DE").unwrap().len(), 1);
    }

    #[test]
    fn process_countries_blocking_runs_every_country() {
        let countries = vec!["DE".to_string(), "FR".to_string()];
        let processed = std::sync::Mutex::new(Vec::new());
        process_countries_blocking(&countries, false, |c| {
            processed.lock().unwrap().push(c.to_string());
        });
        assert_eq!(processed.into_inner().unwrap(), countries);
    }
}

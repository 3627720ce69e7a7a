//! Builds [`Unit`] values with the bookkeeping fields (timestamps, config
//! hash, processing parameters) filled in consistently across every path
//! that ever produces one.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::Config;
use crate::model::unit::Unit;

pub struct UnitFactory {
    config_hash: String,
    processing_parameters: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct PlantUnitArgs {
    pub unit_type: &'static str,
    pub element_type: String,
    pub element_id: String,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub fueltype: Option<String>,
    pub technology: Option<String>,
    pub capacity: Option<f64>,
    pub name: Option<String>,
    pub generator_count: Option<u32>,
    pub date_in: Option<String>,
    pub capacity_source: Option<String>,
}

impl UnitFactory {
    pub fn new(config: &Config) -> Self {
        let processing_parameters = serde_json::to_value(&config.sources)
            .ok()
            .and_then(|v| {
                let mut map = BTreeMap::new();
                map.insert("sources".to_string(), v);
                Some(map)
            })
            .unwrap_or_default();
        Self {
            config_hash: config.config_hash(),
            processing_parameters,
        }
    }

    pub fn create_plant_unit(&self, args: PlantUnitArgs) -> Unit {
        let unit_type_tag = format!("{}:{}", args.unit_type, args.element_type);
        Unit {
            project_id: format!("OSM_{unit_type_tag}/{}", args.element_id),
            country: args.country,
            lat: args.lat,
            lon: args.lon,
            unit_type: Some(unit_type_tag),
            fueltype: args.fueltype,
            technology: args.technology,
            capacity: args.capacity,
            name: args.name,
            generator_count: args.generator_count,
            set: Some("PP".to_string()),
            capacity_source: args.capacity_source,
            date_in: args.date_in,
            id: Some(format!("{}/{}", args.element_type, args.element_id)),
            created_at: Some(Utc::now().to_rfc3339()),
            config_hash: Some(self.config_hash.clone()),
            config_version: Some("1.0".to_string()),
            processing_parameters: Some(self.processing_parameters.clone()),
        }
    }

    pub fn create_reconstructed_plant(&self, mut args: PlantUnitArgs) -> Unit {
        args.element_type = "relation".to_string();
        args.capacity_source = Some("reconstructed_from_generators".to_string());
        self.create_plant_unit(args)
    }

    /// Built directly rather than via `create_plant_unit`: salvaged plants
    /// keep the identity of the rejected candidate they were aggregated
    /// from, with no element-type suffix on `type`.
    pub fn create_salvaged_plant(&self, rejected_plant_id: &str, args: PlantUnitArgs) -> Unit {
        Unit {
            project_id: format!("rejected_plant/{rejected_plant_id}"),
            country: args.country,
            lat: args.lat,
            lon: args.lon,
            unit_type: Some("plant".to_string()),
            fueltype: args.fueltype,
            technology: args.technology,
            capacity: args.capacity,
            name: args.name,
            generator_count: args.generator_count,
            set: Some("PP".to_string()),
            capacity_source: Some("aggregated_from_orphaned_generators".to_string()),
            date_in: args.date_in,
            id: Some(format!("rejected_plant/{rejected_plant_id}")),
            created_at: Some(Utc::now().to_rfc3339()),
            config_hash: Some(self.config_hash.clone()),
            config_version: Some("1.0".to_string()),
            processing_parameters: Some(self.processing_parameters.clone()),
        }
    }

    pub fn create_generator_unit(&self, mut args: PlantUnitArgs) -> Unit {
        args.unit_type = "generator";
        self.create_plant_unit(args)
    }

    pub fn create_cluster_plant(&self, cluster_id: i64, template: &Unit, mut args: PlantUnitArgs) -> Unit {
        args.unit_type = "plant";
        args.element_type = "cluster".to_string();
        args.element_id = cluster_id.to_string();
        args.country = template.country.clone();
        let mut unit = self.create_plant_unit(args);
        unit.capacity_source = Some("aggregated_cluster".to_string());
        unit.technology = template.technology.clone();
        unit.date_in = template.date_in.clone();
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> PlantUnitArgs {
        PlantUnitArgs {
            unit_type: "plant",
            element_type: "node".to_string(),
            element_id: "42".to_string(),
            country: Some("DE".into()),
            lat: Some(48.0),
            lon: Some(11.0),
            fueltype: Some("Solar".into()),
            technology: Some("PV".into()),
            capacity: Some(5.0),
            name: Some("Alpha".into()),
            generator_count: None,
            date_in: Some("2015".into()),
            capacity_source: Some("direct_tag".into()),
        }
    }

    #[test]
    fn plant_unit_id_follows_osm_prefix_convention() {
        let factory = UnitFactory::new(&Config::default());
        let unit = factory.create_plant_unit(base_args());
        assert_eq!(unit.project_id, "OSM_plant:node/42");
        assert_eq!(unit.id.as_deref(), Some("node/42"));
        assert_eq!(unit.set.as_deref(), Some("PP"));
    }

    #[test]
    fn salvaged_plant_has_no_element_type_suffix() {
        let factory = UnitFactory::new(&Config::default());
        let unit = factory.create_salvaged_plant("relation/99", base_args());
        assert_eq!(unit.project_id, "rejected_plant/relation/99");
        assert_eq!(unit.unit_type.as_deref(), Some("plant"));
        assert_eq!(
            unit.capacity_source.as_deref(),
            Some("aggregated_from_orphaned_generators")
        );
    }

    #[test]
    fn reconstructed_plant_uses_relation_element_type() {
        let factory = UnitFactory::new(&Config::default());
        let unit = factory.create_reconstructed_plant(base_args());
        assert_eq!(unit.project_id, "OSM_plant:relation/42");
        assert_eq!(
            unit.capacity_source.as_deref(),
            Some("reconstructed_from_generators")
        );
    }

    /// Two units built from identical args out of the same factory agree on
    /// every field but the timestamp; `pretty_assertions` gives a readable
    /// diff if a future change makes one of them drift.
    #[test]
    fn identical_args_produce_identical_units_modulo_timestamp() {
        use pretty_assertions::assert_eq;

        let factory = UnitFactory::new(&Config::default());
        let mut a = factory.create_plant_unit(base_args());
        let mut b = factory.create_plant_unit(base_args());
        a.created_at = None;
        b.created_at = None;
        assert_eq!(a, b);
    }
}

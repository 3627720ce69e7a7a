//! The canonical output record and its append-only collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(rename = "Country", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    #[serde(rename = "Fueltype", skip_serializing_if = "Option::is_none")]
    pub fueltype: Option<String>,
    #[serde(rename = "Technology", skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(rename = "Capacity", skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_count: Option<u32>,
    #[serde(rename = "Set", skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_source: Option<String>,
    #[serde(rename = "DateIn", skip_serializing_if = "Option::is_none")]
    pub date_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_parameters: Option<BTreeMap<String, Value>>,
}

impl Unit {
    /// True if this unit's recorded `config_hash` matches the hash of the
    /// current run's processing-relevant config subset.
    pub fn is_valid_for_config(&self, current_hash: &str) -> bool {
        self.config_hash.as_deref() == Some(current_hash)
    }
}

/// Append-only collection of [`Unit`]s, keyed internally by `project_id` so no
/// two units ever share an identity.
#[derive(Debug, Clone, Default)]
pub struct Units {
    items: Vec<Unit>,
}

impl Units {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, unit: Unit) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|u| u.project_id == unit.project_id)
        {
            *existing = unit;
        } else {
            self.items.push(unit);
        }
    }

    pub fn add_units(&mut self, units: impl IntoIterator<Item = Unit>) {
        for u in units {
            self.add_unit(u);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.items.iter()
    }

    pub fn filter_by_country<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a Unit> {
        self.items
            .iter()
            .filter(move |u| u.country.as_deref() == Some(country))
    }

    pub fn filter_by_fueltype<'a>(&'a self, fueltype: &'a str) -> impl Iterator<Item = &'a Unit> {
        self.items
            .iter()
            .filter(move |u| u.fueltype.as_deref() == Some(fueltype))
    }

    pub fn filter_by_technology<'a>(
        &'a self,
        technology: &'a str,
    ) -> impl Iterator<Item = &'a Unit> {
        self.items
            .iter()
            .filter(move |u| u.technology.as_deref() == Some(technology))
    }

    pub fn total_capacity(&self) -> f64 {
        self.items.iter().filter_map(|u| u.capacity).sum()
    }

    pub fn generate_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .items
            .iter()
            .filter_map(|u| {
                let (lat, lon) = (u.lat?, u.lon?);
                Some(serde_json::json!({
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [lon, lat] },
                    "properties": {
                        "label": u.name,
                        "fueltype": u.fueltype,
                        "technology": u.technology,
                        "capacity_mw": u.capacity,
                        "osm_element": u.id.as_ref().map(|id| format!("https://www.openstreetmap.org/{id}")),
                    }
                }))
            })
            .collect();
        serde_json::json!({ "type": "FeatureCollection", "features": features })
    }

    /// Writes the Units CSV export with the columns the processed-units cache
    /// file shares with the report surface.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([
            "projectID",
            "Country",
            "lat",
            "lon",
            "type",
            "Fueltype",
            "Technology",
            "Capacity",
            "Name",
            "generator_count",
            "Set",
            "capacity_source",
            "DateIn",
            "id",
        ])?;
        for u in &self.items {
            wtr.write_record([
                u.project_id.clone(),
                u.country.clone().unwrap_or_default(),
                u.lat.map(|v| v.to_string()).unwrap_or_default(),
                u.lon.map(|v| v.to_string()).unwrap_or_default(),
                u.unit_type.clone().unwrap_or_default(),
                u.fueltype.clone().unwrap_or_default(),
                u.technology.clone().unwrap_or_default(),
                u.capacity.map(|v| v.to_string()).unwrap_or_default(),
                u.name.clone().unwrap_or_default(),
                u.generator_count.map(|v| v.to_string()).unwrap_or_default(),
                u.set.clone().unwrap_or_default(),
                u.capacity_source.clone().unwrap_or_default(),
                u.date_in.clone().unwrap_or_default(),
                u.id.clone().unwrap_or_default(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(project_id: &str) -> Unit {
        Unit {
            project_id: project_id.to_string(),
            country: Some("DE".into()),
            lat: Some(48.0),
            lon: Some(11.0),
            unit_type: Some("plant:node".into()),
            fueltype: Some("Solar".into()),
            technology: Some("PV".into()),
            capacity: Some(5.0),
            name: Some("Alpha".into()),
            generator_count: None,
            set: Some("PP".into()),
            capacity_source: Some("direct_tag".into()),
            date_in: Some("2019".into()),
            id: Some("node/1".into()),
            created_at: None,
            config_hash: Some("abc".into()),
            config_version: Some("1.0".into()),
            processing_parameters: None,
        }
    }

    #[test]
    fn never_holds_two_units_with_same_project_id() {
        let mut units = Units::new();
        units.add_unit(sample("OSM_plant:node/1"));
        units.add_unit(sample("OSM_plant:node/1"));
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn is_valid_for_config_requires_matching_hash() {
        let unit = sample("p1");
        assert!(unit.is_valid_for_config("abc"));
        assert!(!unit.is_valid_for_config("xyz"));
    }

    #[test]
    fn total_capacity_sums_present_values() {
        let mut units = Units::new();
        units.add_unit(sample("p1"));
        let mut second = sample("p2");
        second.capacity = Some(2.5);
        units.add_unit(second);
        assert_eq!(units.total_capacity(), 7.5);
    }
}

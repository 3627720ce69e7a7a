//! Ad hoc region-based downloads that don't go through a country's `area`
//! declaration: bounding boxes, a radius around a point, or an arbitrary
//! polygon, with the matched elements then partitioned back out by country.

use std::collections::HashMap;

use crate::cache::{CoordinateCache, ElementCache};
use crate::error::OverpassResult;
use crate::model::element::{Node, OsmElement, Relation, Way};
use crate::overpass::client::OverpassClient;
use crate::overpass::query::AreaFilter;

#[derive(Debug, Clone)]
pub enum RegionShape {
    BoundingBox {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },
    Radius {
        lat: f64,
        lon: f64,
        radius_km: f64,
    },
    Polygon(Vec<(f64, f64)>),
}

impl From<&RegionShape> for AreaFilter {
    fn from(shape: &RegionShape) -> Self {
        match shape.clone() {
            RegionShape::BoundingBox {
                south,
                west,
                north,
                east,
            } => AreaFilter::BoundingBox {
                south,
                west,
                north,
                east,
            },
            RegionShape::Radius {
                lat,
                lon,
                radius_km,
            } => AreaFilter::Radius {
                lat,
                lon,
                radius_km,
            },
            RegionShape::Polygon(points) => AreaFilter::Polygon(points),
        }
    }
}

#[derive(Debug, Default)]
pub struct RegionDownloadReport {
    pub nodes_fetched: usize,
    pub ways_fetched: usize,
    pub relations_fetched: usize,
    pub countries_touched: Vec<String>,
    pub errors: Vec<String>,
}

/// Downloads power elements for a set of ad hoc regions, optionally routing
/// the results into each element's resolved country bucket in `cache`.
pub async fn region_download(
    client: &OverpassClient,
    regions: &[RegionShape],
    power_values: &[&str],
    coordinate_cache: &mut CoordinateCache,
    reverse_lookup: impl Fn(f64, f64) -> Option<String> + Copy,
    cache: &mut ElementCache,
    update_country_caches: bool,
) -> OverpassResult<RegionDownloadReport> {
    let mut report = RegionDownloadReport::default();
    let mut by_country: HashMap<String, Vec<OsmElement>> = HashMap::new();

    for region in regions {
        let filter: AreaFilter = region.into();
        for &power_value in power_values {
            let outcome = client.get_power_elements(power_value, &filter).await?;
            if let Some(err) = outcome.error {
                report.errors.push(err);
                continue;
            }
            report.nodes_fetched += outcome.nodes.len();
            report.ways_fetched += outcome.ways.len();
            report.relations_fetched += outcome.relations.len();

            for node in &outcome.nodes {
                let country =
                    coordinate_cache.get(node.lat, node.lon, reverse_lookup);
                if let Some(country) = country {
                    by_country
                        .entry(country)
                        .or_default()
                        .push(OsmElement::Node(node.clone()));
                }
            }
            cache.store_nodes(outcome.nodes);
            cache.store_ways(outcome.ways);
            cache.store_relations(outcome.relations);
        }
    }

    report.countries_touched = by_country.keys().cloned().collect();
    report.countries_touched.sort();

    if update_country_caches {
        for (_country, elements) in by_country {
            let (nodes, ways, relations) = partition_elements(elements);
            cache.store_nodes(nodes);
            cache.store_ways(ways);
            cache.store_relations(relations);
        }
    }

    Ok(report)
}

fn partition_elements(elements: Vec<OsmElement>) -> (Vec<Node>, Vec<Way>, Vec<Relation>) {
    let mut nodes = Vec::new();
    let mut ways = Vec::new();
    let mut relations = Vec::new();
    for el in elements {
        match el {
            OsmElement::Node(n) => nodes.push(n),
            OsmElement::Way(w) => ways.push(w),
            OsmElement::Relation(r) => relations.push(r),
        }
    }
    (nodes, ways, relations)
}

/// Derives the bounding box candidate countries a region radius touches, for
/// pre-flight validation before a fetch — an approximation, not a precise
/// point-in-country test.
pub fn countries_touching_radius(
    lat: f64,
    lon: f64,
    radius_km: f64,
) -> (f64, f64, f64, f64) {
    AreaFilter::radius_bounding_box(lat, lon, radius_km)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::overpass::transport::stub::StubTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn region_download_partitions_nodes_by_country() {
        let cfg = Config::default();
        let transport = Arc::new(StubTransport::new(vec![Ok(serde_json::json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 48.0, "lon": 11.0, "tags": {"power": "plant"}},
            ]
        }))]));
        let client = OverpassClient::new(transport, &cfg);
        let mut coord_cache = CoordinateCache::new(100, 2);
        let mut element_cache = ElementCache::new(std::env::temp_dir());

        let report = region_download(
            &client,
            &[RegionShape::BoundingBox {
                south: 47.0,
                west: 10.0,
                north: 49.0,
                east: 12.0,
            }],
            &["plant"],
            &mut coord_cache,
            |_, _| Some("DE".to_string()),
            &mut element_cache,
            true,
        )
        .await
        .unwrap();

        assert_eq!(report.nodes_fetched, 1);
        assert_eq!(report.countries_touched, vec!["DE".to_string()]);
    }

    #[test]
    fn radius_bounding_box_widens_with_latitude() {
        let equator = countries_touching_radius(0.0, 0.0, 100.0);
        let high_lat = countries_touching_radius(70.0, 0.0, 100.0);
        let equator_lon_span = equator.3 - equator.1;
        let high_lat_lon_span = high_lat.3 - high_lat.1;
        assert!(high_lat_lon_span > equator_lon_span);
    }
}

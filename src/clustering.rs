//! Groups nearby same-source units into a single cluster unit, for sources
//! where OSM maps one physical installation as many small elements (e.g.
//! rooftop solar panels).
//!
//! No external clustering crate: neither `linfa` nor `petal-clustering`
//! appears anywhere in the surrounding codebase, so DBSCAN and k-means are
//! hand-rolled over plain coordinate vectors (see DESIGN.md).

use crate::config::{ClusteringConfig, Config};
use crate::model::unit::Unit;
use crate::parsing::unit_factory::{PlantUnitArgs, UnitFactory};

fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// DBSCAN over haversine distance. Returns one cluster id per input point;
/// `-1` marks noise, matching the sklearn convention the source mirrors.
pub fn dbscan(points: &[(f64, f64)], eps_km: f64, min_samples: usize) -> Vec<i64> {
    let n = points.len();
    let mut labels = vec![-2i64; n]; // -2 = unvisited
    let mut next_cluster = 0i64;

    let neighbors = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| j != i && haversine_km(points[i], points[j]) <= eps_km)
            .collect()
    };

    for i in 0..n {
        if labels[i] != -2 {
            continue;
        }
        let neighbors_i = neighbors(i);
        if neighbors_i.len() < min_samples {
            labels[i] = -1;
            continue;
        }
        labels[i] = next_cluster;
        let mut seeds = neighbors_i;
        let mut idx = 0;
        while idx < seeds.len() {
            let q = seeds[idx];
            if labels[q] == -1 {
                labels[q] = next_cluster;
            }
            if labels[q] == -2 {
                labels[q] = next_cluster;
                let neighbors_q = neighbors(q);
                if neighbors_q.len() >= min_samples {
                    for n in neighbors_q {
                        if !seeds.contains(&n) {
                            seeds.push(n);
                        }
                    }
                }
            }
            idx += 1;
        }
        next_cluster += 1;
    }
    labels
}

/// Lloyd's algorithm k-means, seeded deterministically from evenly spaced
/// input points rather than a random draw (no RNG dependency needed).
pub fn kmeans(points: &[(f64, f64)], k: usize, max_iterations: usize) -> Vec<i64> {
    if points.is_empty() || k == 0 {
        return vec![];
    }
    let k = k.min(points.len());
    let mut centroids: Vec<(f64, f64)> = (0..k)
        .map(|i| points[i * points.len() / k])
        .collect();
    let mut labels = vec![0i64; points.len()];

    for _ in 0..max_iterations {
        let mut changed = false;
        for (i, &p) in points.iter().enumerate() {
            let best = centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    haversine_km(p, **a)
                        .partial_cmp(&haversine_km(p, **b))
                        .unwrap()
                })
                .map(|(idx, _)| idx as i64)
                .unwrap();
            if labels[i] != best {
                changed = true;
            }
            labels[i] = best;
        }
        for c in 0..k {
            let members: Vec<(f64, f64)> = points
                .iter()
                .zip(&labels)
                .filter(|&(_, &label)| label == c as i64)
                .map(|(&p, _)| p)
                .collect();
            if !members.is_empty() {
                let lat = members.iter().map(|p| p.0).sum::<f64>() / members.len() as f64;
                let lon = members.iter().map(|p| p.1).sum::<f64>() / members.len() as f64;
                centroids[c] = (lat, lon);
            }
        }
        if !changed {
            break;
        }
    }
    labels
}

pub enum ClusteringAlgorithm {
    Dbscan { eps_km: f64, min_samples: usize },
    Kmeans { k: usize, max_iterations: usize },
}

impl ClusteringAlgorithm {
    pub fn cluster(&self, points: &[(f64, f64)]) -> Vec<i64> {
        match self {
            ClusteringAlgorithm::Dbscan { eps_km, min_samples } => {
                dbscan(points, *eps_km, *min_samples)
            }
            ClusteringAlgorithm::Kmeans { k, max_iterations } => {
                kmeans(points, *k, *max_iterations)
            }
        }
    }
}

pub struct ClusteringManager<'a> {
    config: &'a Config,
    factory: UnitFactory,
}

impl<'a> ClusteringManager<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            factory: UnitFactory::new(config),
        }
    }

    /// Builds the algorithm configured for `source_type`, or `None` (with a
    /// log warning left to the caller) if clustering isn't enabled or names
    /// an unrecognised method.
    pub fn create_algorithm(&self, source_type: &str) -> Option<ClusteringAlgorithm> {
        let cfg: &ClusteringConfig = &self.config.sources.get(source_type)?.units_clustering;
        match cfg.method.as_str() {
            "dbscan" => Some(ClusteringAlgorithm::Dbscan {
                eps_km: cfg.eps.unwrap_or(1.0),
                min_samples: cfg.min_samples.unwrap_or(2),
            }),
            "kmeans" => Some(ClusteringAlgorithm::Kmeans {
                k: cfg.n_clusters.unwrap_or(1),
                max_iterations: 100,
            }),
            _ => None,
        }
    }

    /// Groups `generators` by cluster label and emits one cluster [`Unit`]
    /// per non-noise label (`label >= 0`). The noise label's generators are
    /// passed through untouched, not collected here.
    pub fn create_cluster_plants(&self, generators: &[Unit], labels: &[i64]) -> Vec<Unit> {
        let mut clusters: std::collections::BTreeMap<i64, Vec<&Unit>> = std::collections::BTreeMap::new();
        for (unit, &label) in generators.iter().zip(labels) {
            if label >= 0 {
                clusters.entry(label).or_default().push(unit);
            }
        }
        clusters
            .into_iter()
            .filter_map(|(cluster_id, members)| {
                let template = members.first()?;
                let lats: Vec<f64> = members.iter().filter_map(|u| u.lat).collect();
                let lons: Vec<f64> = members.iter().filter_map(|u| u.lon).collect();
                if lats.is_empty() {
                    return None;
                }
                let lat = lats.iter().sum::<f64>() / lats.len() as f64;
                let lon = lons.iter().sum::<f64>() / lons.len() as f64;
                let capacity: f64 = members.iter().filter_map(|u| u.capacity).sum();
                let args = PlantUnitArgs {
                    unit_type: "plant",
                    element_type: "cluster".to_string(),
                    element_id: cluster_id.to_string(),
                    country: template.country.clone(),
                    lat: Some(lat),
                    lon: Some(lon),
                    fueltype: template.fueltype.clone(),
                    technology: template.technology.clone(),
                    capacity: Some(capacity),
                    name: template.name.clone(),
                    generator_count: Some(members.len() as u32),
                    date_in: template.date_in.clone(),
                    capacity_source: Some("aggregated_cluster".to_string()),
                };
                Some(self.factory.create_cluster_plant(cluster_id, template, args))
            })
            .collect()
    }
}

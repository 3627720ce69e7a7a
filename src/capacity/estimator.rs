//! Falls back to an estimated capacity when no tag-derived value could be
//! extracted: a configured default, or an area-based guess from the
//! element's footprint.

use geo::{MultiPolygon, Polygon};

use crate::config::PLANT_AREA_DERATING_FACTOR;
use crate::model::geometry::Shape;
use crate::model::rejection::RejectionReason;

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedCapacity {
    pub capacity_mw: f64,
    pub info: String,
}

/// Equirectangular-projected shoelace area in square metres, adequate at the
/// scale of a single power plant footprint. `ref_lat` anchors the local
/// metres-per-degree scale factor.
fn ring_area_m2(ring: &[(f64, f64)], ref_lat: f64) -> f64 {
    const METRES_PER_DEGREE_LAT: f64 = 111_320.0;
    let lon_scale = ref_lat.to_radians().cos() * METRES_PER_DEGREE_LAT;
    let projected: Vec<(f64, f64)> = ring
        .iter()
        .map(|&(lat, lon)| (lon * lon_scale, lat * METRES_PER_DEGREE_LAT))
        .collect();
    let mut sum = 0.0;
    for i in 0..projected.len() {
        let (x1, y1) = projected[i];
        let (x2, y2) = projected[(i + 1) % projected.len()];
        sum += x1 * y2 - x2 * y1;
    }
    (sum / 2.0).abs()
}

fn polygon_area_m2(polygon: &Polygon<f64>, ref_lat: f64) -> f64 {
    let ring: Vec<(f64, f64)> = polygon
        .exterior()
        .points()
        .map(|p| (p.y(), p.x()))
        .collect();
    ring_area_m2(&ring, ref_lat)
}

fn multi_polygon_area_m2(mp: &MultiPolygon<f64>, ref_lat: f64) -> f64 {
    mp.0.iter().map(|p| polygon_area_m2(p, ref_lat)).sum()
}

pub struct CapacityEstimator;

impl CapacityEstimator {
    /// A flat default value, used for sources where capacity correlates
    /// weakly with footprint (e.g. rooftop solar counted per-installation).
    pub fn default_value(unit_capacity_mw: f64) -> EstimatedCapacity {
        EstimatedCapacity {
            capacity_mw: unit_capacity_mw,
            info: "estimated_default".to_string(),
        }
    }

    /// Area (m^2) times an efficiency factor (MW per m^2) gives a raw
    /// capacity guess; `is_plant` applies the land-use derating, since a
    /// plant's mapped footprint typically includes access roads and
    /// buffer land a single generator's footprint does not.
    pub fn area_based(
        shape: &Shape,
        ref_lat: f64,
        efficiency_mw_per_m2: f64,
        is_plant: bool,
    ) -> Result<EstimatedCapacity, RejectionReason> {
        let area_m2 = match shape {
            Shape::Polygon(p) => polygon_area_m2(p, ref_lat),
            Shape::MultiPolygon(mp) => multi_polygon_area_m2(mp, ref_lat),
            Shape::Point(_) => return Err(RejectionReason::EstimationMethodUnknown),
        };
        let mut capacity = area_m2 * efficiency_mw_per_m2;
        if is_plant {
            capacity *= PLANT_AREA_DERATING_FACTOR;
        }
        if capacity <= 0.0 {
            return Err(RejectionReason::CapacityZero);
        }
        Ok(EstimatedCapacity {
            capacity_mw: capacity,
            info: if is_plant {
                "estimated_area_plant"
            } else {
                "estimated_area_generator"
            }
            .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::geometry::polygon_shape;

    #[test]
    fn default_value_passes_through_unchanged() {
        let est = CapacityEstimator::default_value(5.0);
        assert_eq!(est.capacity_mw, 5.0);
    }

    #[test]
    fn area_based_applies_plant_derating() {
        let shape = polygon_shape(&[(0.0, 0.0), (0.0, 0.001), (0.001, 0.001), (0.001, 0.0)]).unwrap();
        let plant = CapacityEstimator::area_based(&shape, 0.0, 0.0001, true).unwrap();
        let generator = CapacityEstimator::area_based(&shape, 0.0, 0.0001, false).unwrap();
        assert!((plant.capacity_mw - generator.capacity_mw * PLANT_AREA_DERATING_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn area_based_tags_plant_and_generator_estimates_differently() {
        let shape = polygon_shape(&[(0.0, 0.0), (0.0, 0.001), (0.001, 0.001), (0.001, 0.0)]).unwrap();
        let plant = CapacityEstimator::area_based(&shape, 0.0, 0.0001, true).unwrap();
        let generator = CapacityEstimator::area_based(&shape, 0.0, 0.0001, false).unwrap();
        assert_eq!(plant.info, "estimated_area_plant");
        assert_eq!(generator.info, "estimated_area_generator");
    }

    #[test]
    fn area_based_rejects_point_shapes() {
        let shape = Shape::Point(geo::Point::new(11.0, 48.0));
        let err = CapacityEstimator::area_based(&shape, 48.0, 0.0001, false).unwrap_err();
        assert_eq!(err, RejectionReason::EstimationMethodUnknown);
    }
}

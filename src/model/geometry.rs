//! Shapes derived from OSM elements, and the predicates the parsers need.

use geo::{
    Contains, ConvexHull, Intersects, LineString, MultiPolygon, Point, Polygon,
    coord,
};

use crate::model::element::ElementType;

/// Metres-to-degrees conversion for a point buffer, corrected for latitude the
/// same way the source does: `buffer_m / (111_320 * (1 + cos(lat)) / 2)`.
fn buffer_metres_to_degrees(buffer_m: f64, lat: f64) -> f64 {
    let lat_rad = lat.to_radians();
    buffer_m / (111_320.0 * ((1.0 + lat_rad.cos()) / 2.0))
}

pub const DEFAULT_POINT_BUFFER_M: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

/// The shape backing a power plant, used to test generator containment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantGeometry {
    pub id: String,
    pub element_type: ElementType,
    pub shape: Shape,
}

impl PlantGeometry {
    pub fn new(id: impl Into<String>, element_type: ElementType, shape: Shape) -> Self {
        Self {
            id: id.into(),
            element_type,
            shape,
        }
    }

    pub fn centroid(&self) -> Option<(f64, f64)> {
        use geo::Centroid;
        match &self.shape {
            Shape::Point(p) => Some((p.y(), p.x())),
            Shape::Polygon(p) => p.centroid().map(|c| (c.y(), c.x())),
            Shape::MultiPolygon(mp) => mp.centroid().map(|c| (c.y(), c.x())),
        }
    }

    /// `buffer_m` only applies to Point shapes; polygons use a strict topological contains.
    pub fn contains_point(&self, lat: f64, lon: f64, buffer_m: Option<f64>) -> bool {
        let test = Point::new(lon, lat);
        match &self.shape {
            Shape::Point(p) => {
                let buffer = buffer_m.unwrap_or(DEFAULT_POINT_BUFFER_M);
                let radius_deg = buffer_metres_to_degrees(buffer, p.y());
                let dx = p.x() - lon;
                let dy = p.y() - lat;
                (dx * dx + dy * dy).sqrt() <= radius_deg
            }
            Shape::Polygon(p) => p.contains(&test),
            Shape::MultiPolygon(mp) => mp.contains(&test),
        }
    }

    pub fn intersects_point(&self, lat: f64, lon: f64) -> bool {
        let test = Point::new(lon, lat);
        match &self.shape {
            Shape::Point(p) => p.intersects(&test),
            Shape::Polygon(p) => p.intersects(&test),
            Shape::MultiPolygon(mp) => mp.intersects(&test),
        }
    }
}

pub fn point_shape(lat: f64, lon: f64) -> Shape {
    Shape::Point(Point::new(lon, lat))
}

/// Builds a polygon from an ordered ring of (lat, lon) points, closing the ring
/// if the caller did not already repeat the first point at the end.
pub fn polygon_shape(points: &[(f64, f64)]) -> Option<Shape> {
    if points.len() < 3 {
        return None;
    }
    let mut coords: Vec<_> = points.iter().map(|&(lat, lon)| coord! { x: lon, y: lat }).collect();
    if coords.first() != coords.last() {
        coords.push(coords[0]);
    }
    let ring = LineString::new(coords);
    let polygon = Polygon::new(ring, vec![]);
    if polygon.exterior().0.len() < 4 {
        return None;
    }
    Some(Shape::Polygon(polygon))
}

pub fn convex_hull_shape(points: &[(f64, f64)]) -> Option<Shape> {
    if points.len() < 3 {
        return None;
    }
    let coords: Vec<_> = points.iter().map(|&(lat, lon)| coord! { x: lon, y: lat }).collect();
    let ring = LineString::new(coords);
    let hull = ring.convex_hull();
    Some(Shape::Polygon(hull))
}

pub fn union_shape(polygons: Vec<Polygon<f64>>) -> Option<Shape> {
    use geo::BooleanOps;
    let mut iter = polygons.into_iter();
    let first = iter.next()?;
    let mut acc = MultiPolygon::new(vec![first]);
    for p in iter {
        acc = acc.union(&MultiPolygon::new(vec![p]));
    }
    if acc.0.len() == 1 {
        Some(Shape::Polygon(acc.0.into_iter().next().unwrap()))
    } else {
        Some(Shape::MultiPolygon(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_buffer_contains_49m_excludes_51m() {
        let geom = PlantGeometry::new("node/1", ElementType::Node, point_shape(48.0, 11.0));
        let deg_per_m = buffer_metres_to_degrees(1.0, 48.0);
        let near = (48.0 + deg_per_m * 49.0, 11.0);
        let far = (48.0 + deg_per_m * 51.0, 11.0);
        assert!(geom.contains_point(near.0, near.1, None));
        assert!(!geom.contains_point(far.0, far.1, None));
    }

    #[test]
    fn triangle_polygon_from_three_points() {
        let shape = polygon_shape(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]).unwrap();
        assert!(matches!(shape, Shape::Polygon(_)));
    }

    #[test]
    fn fewer_than_three_points_yields_no_polygon() {
        assert!(polygon_shape(&[(0.0, 0.0), (0.0, 1.0)]).is_none());
    }

    #[test]
    fn convex_hull_requires_at_least_three_points() {
        assert!(convex_hull_shape(&[(0.0, 0.0), (1.0, 1.0)]).is_none());
        assert!(convex_hull_shape(&[(0.0, 0.0), (0.0, 2.0), (2.0, 1.0)]).is_some());
    }
}

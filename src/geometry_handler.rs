//! Builds a [`PlantGeometry`] for an OSM element and answers containment
//! questions against a set of known plant geometries.

use crate::cache::ElementCache;
use crate::model::element::{ElementType, MemberType, OsmElement};
use crate::model::geometry::{
    convex_hull_shape, point_shape, polygon_shape, union_shape, PlantGeometry, Shape,
};

pub struct GeometryHandler;

impl GeometryHandler {
    /// Builds the geometry backing `element`, given the caches needed to
    /// resolve way/relation members:
    ///
    /// - Node: a point.
    /// - Way with fewer than 3 distinct nodes: a point at the first member.
    /// - Way with 3+ nodes forming a closed ring: a polygon.
    /// - Relation: the union of its resolvable child-way polygons; if none
    ///   resolve, the convex hull of its node members; if neither, a point at
    ///   the relation's own derived coordinates if present.
    pub fn get_element_geometry(
        element: &OsmElement,
        cache: &ElementCache,
    ) -> Option<PlantGeometry> {
        let id = element.identification();
        let element_type = element.element_type();
        match element {
            OsmElement::Node(n) => Some(PlantGeometry::new(
                id,
                element_type,
                point_shape(n.lat, n.lon),
            )),
            OsmElement::Way(w) => {
                let coords: Vec<(f64, f64)> = w
                    .nodes
                    .iter()
                    .filter_map(|nid| cache.get_node(*nid))
                    .map(|n| (n.lat, n.lon))
                    .collect();
                if coords.len() < 3 {
                    let (lat, lon) = coords.first().copied().or_else(|| {
                        let (lat, lon) = w.lat.zip(w.lon)?;
                        Some((lat, lon))
                    })?;
                    return Some(PlantGeometry::new(id, element_type, point_shape(lat, lon)));
                }
                let shape = polygon_shape(&coords)
                    .unwrap_or_else(|| convex_hull_shape(&coords).expect("3+ points"));
                Some(PlantGeometry::new(id, element_type, shape))
            }
            OsmElement::Relation(r) => {
                let way_polygons: Vec<_> = r
                    .members
                    .iter()
                    .filter(|m| m.member_type == MemberType::Way)
                    .filter_map(|m| cache.get_way(m.ref_id))
                    .filter_map(|way| {
                        let coords: Vec<(f64, f64)> = way
                            .nodes
                            .iter()
                            .filter_map(|nid| cache.get_node(*nid))
                            .map(|n| (n.lat, n.lon))
                            .collect();
                        match polygon_shape(&coords) {
                            Some(Shape::Polygon(p)) => Some(p),
                            _ => None,
                        }
                    })
                    .collect();
                if !way_polygons.is_empty() {
                    if let Some(shape) = union_shape(way_polygons) {
                        return Some(PlantGeometry::new(id, element_type, shape));
                    }
                }
                let node_points: Vec<(f64, f64)> = r
                    .members
                    .iter()
                    .filter(|m| m.member_type == MemberType::Node)
                    .filter_map(|m| cache.get_node(m.ref_id))
                    .map(|n| (n.lat, n.lon))
                    .collect();
                if let Some(shape) = convex_hull_shape(&node_points) {
                    return Some(PlantGeometry::new(id, element_type, shape));
                }
                let (lat, lon) = r.lat.zip(r.lon)?;
                Some(PlantGeometry::new(id, element_type, point_shape(lat, lon)))
            }
        }
    }

    /// Centroid-first coordinate resolution for an element: prefers the
    /// geometry's centroid, falling back to the element's own derived lat/lon.
    pub fn process_element_coordinates(
        element: &OsmElement,
        cache: &ElementCache,
    ) -> Option<(f64, f64)> {
        if let Some(geometry) = Self::get_element_geometry(element, cache) {
            if let Some(centroid) = geometry.centroid() {
                return Some(centroid);
            }
        }
        let (lat, lon) = element.derived_coordinates();
        lat.zip(lon)
    }

    /// True if `lat`/`lon` falls within (or inside the buffer of) any of
    /// `geometries`.
    pub fn check_point_within_geometries(
        lat: f64,
        lon: f64,
        geometries: &[PlantGeometry],
        buffer_m: Option<f64>,
    ) -> bool {
        geometries
            .iter()
            .any(|g| g.contains_point(lat, lon, buffer_m))
    }

    /// True if `element`'s own coordinates fall within any of `geometries`,
    /// excluding the element's own geometry if it happens to already be one
    /// of them (identified by `"type/id"`).
    pub fn is_element_within_plant_geometries(
        element: &OsmElement,
        cache: &ElementCache,
        geometries: &[PlantGeometry],
        buffer_m: Option<f64>,
    ) -> bool {
        let id = element.identification();
        let Some((lat, lon)) = Self::process_element_coordinates(element, cache) else {
            return false;
        };
        geometries
            .iter()
            .filter(|g| g.id != id)
            .any(|g| g.contains_point(lat, lon, buffer_m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::{Node, Tags, Way};

    fn cache_with_square() -> ElementCache {
        let mut cache = ElementCache::new(std::env::temp_dir());
        let pts = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];
        for (i, (lat, lon)) in pts.iter().enumerate() {
            cache.store_node(Node {
                id: i as i64 + 1,
                lat: *lat,
                lon: *lon,
                tags: Tags::new(),
                country: None,
            });
        }
        cache
    }

    #[test]
    fn way_with_three_plus_closed_nodes_becomes_polygon() {
        let cache = cache_with_square();
        let way = OsmElement::Way(Way {
            id: 100,
            nodes: vec![1, 2, 3, 4],
            tags: Tags::new(),
            country: None,
            lat: None,
            lon: None,
        });
        let geom = GeometryHandler::get_element_geometry(&way, &cache).unwrap();
        assert!(matches!(geom.shape, Shape::Polygon(_)));
    }

    #[test]
    fn way_with_fewer_than_three_resolvable_nodes_becomes_point() {
        let cache = cache_with_square();
        let way = OsmElement::Way(Way {
            id: 101,
            nodes: vec![1, 2],
            tags: Tags::new(),
            country: None,
            lat: None,
            lon: None,
        });
        let geom = GeometryHandler::get_element_geometry(&way, &cache).unwrap();
        assert!(matches!(geom.shape, Shape::Point(_)));
    }

    #[test]
    fn point_within_buffered_geometry_is_detected() {
        let geometries = vec![PlantGeometry::new(
            "node/9",
            ElementType::Node,
            point_shape(48.0, 11.0),
        )];
        assert!(GeometryHandler::check_point_within_geometries(
            48.0001, 11.0, &geometries, Some(50.0)
        ));
        assert!(!GeometryHandler::check_point_within_geometries(
            50.0, 11.0, &geometries, Some(50.0)
        ));
    }
}

//! Overpass QL query-string construction.

use crate::error::{OverpassError, OverpassResult};

const DEFAULT_TIMEOUT_SECS: u32 = 180;

/// A geographic filter applied to an Overpass query's statements.
#[derive(Debug, Clone)]
pub enum AreaFilter {
    Country(String),
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

impl AreaFilter {
    /// Renders the trailing `(...)` Overpass applies to a statement, e.g.
    /// `(52.3,13.1,52.6,13.6)` or `(around:5000,52.3,13.1)`.
    fn render_suffix(&self) -> OverpassResult<String> {
        match self {
            AreaFilter::Country(_) => Ok(String::new()),
            AreaFilter::BoundingBox {
                south,
                west,
                north,
                east,
            } => Ok(format!("({south},{west},{north},{east})")),
            AreaFilter::Radius {
                lat,
                lon,
                radius_km,
            } => {
                if *radius_km <= 0.0 {
                    return Err(OverpassError::MalformedQuery(
                        "radius must be positive".to_string(),
                    ));
                }
                Ok(format!("(around:{},{lat},{lon})", radius_km * 1000.0))
            }
            AreaFilter::Polygon(points) => {
                if points.len() < 3 {
                    return Err(OverpassError::MalformedQuery(
                        "polygon filter needs at least 3 points".to_string(),
                    ));
                }
                let coords = points
                    .iter()
                    .map(|(lat, lon)| format!("{lat} {lon}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                Ok(format!("(poly:\"{coords}\")"))
            }
        }
    }

    /// Bounding degree offsets around a radius filter's centre, matching the
    /// source's latitude-corrected approximation (111km per degree of
    /// latitude, corrected by cos(lat) for longitude).
    pub fn radius_bounding_box(lat: f64, lon: f64, radius_km: f64) -> (f64, f64, f64, f64) {
        let lat_offset = radius_km / 111.0;
        let lon_offset = radius_km / (111.0 * lat.to_radians().cos().abs().max(1e-6));
        (
            lat - lat_offset,
            lon - lon_offset,
            lat + lat_offset,
            lon + lon_offset,
        )
    }

    fn area_set_statement(&self) -> Option<String> {
        match self {
            AreaFilter::Country(iso) => Some(format!(
                "area[\"ISO3166-1\"=\"{iso}\"][admin_level=2]->.searchArea;"
            )),
            _ => None,
        }
    }
}

/// Builds the Overpass QL query fetching all `power=plant`/`power=generator`
/// elements (nodes, ways and relations) within an area filter.
pub fn power_elements_query(power_value: &str, filter: &AreaFilter) -> OverpassResult<String> {
    let suffix = filter.render_suffix()?;
    let area_decl = filter.area_set_statement().unwrap_or_default();
    let area_suffix = if filter.area_set_statement().is_some() {
        ".searchArea"
    } else {
        suffix.as_str()
    };
    let selector = format!("[\"power\"=\"{power_value}\"]");
    Ok(format!(
        "[out:json][timeout:{DEFAULT_TIMEOUT_SECS}];\n{area_decl}\n(\n  node{selector}{area_suffix};\n  way{selector}{area_suffix};\n  relation{selector}{area_suffix};\n);\nout body;\n>;\nout skel qt;"
    ))
}

/// Builds a query that counts matching elements instead of returning them,
/// for cheap pre-flight sizing of a region before a full download.
pub fn count_query(power_value: &str, filter: &AreaFilter) -> OverpassResult<String> {
    let suffix = filter.render_suffix()?;
    let area_decl = filter.area_set_statement().unwrap_or_default();
    let area_suffix = if filter.area_set_statement().is_some() {
        ".searchArea"
    } else {
        &suffix
    };
    let selector = format!("[\"power\"=\"{power_value}\"]");
    Ok(format!(
        "[out:json][timeout:{DEFAULT_TIMEOUT_SECS}];\n{area_decl}\n(\n  node{selector}{area_suffix};\n  way{selector}{area_suffix};\n  relation{selector}{area_suffix};\n);\nout count;"
    ))
}

/// Builds a batched by-id fetch query for a single element class, optionally
/// resolving child members (`(._;>;);`) so ways/relations come back with
/// their referenced nodes/ways attached.
pub fn ids_query(element_type: &str, ids: &[i64], resolve_children: bool) -> OverpassResult<String> {
    if ids.is_empty() {
        return Err(OverpassError::MalformedQuery(
            "ids_query requires at least one id".to_string(),
        ));
    }
    let refs = ids
        .iter()
        .map(|id| format!("  {element_type}({id});"))
        .collect::<Vec<_>>()
        .join("\n");
    let body = if resolve_children {
        format!("(\n{refs}\n);\n(._;>;);\nout body;")
    } else {
        format!("(\n{refs}\n);\nout body;")
    };
    Ok(format!("[out:json][timeout:{DEFAULT_TIMEOUT_SECS}];\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_filter_renders_four_values() {
        let filter = AreaFilter::BoundingBox {
            south: 1.0,
            west: 2.0,
            north: 3.0,
            east: 4.0,
        };
        assert_eq!(filter.render_suffix().unwrap(), "(1,2,3,4)");
    }

    #[test]
    fn radius_filter_converts_km_to_metres() {
        let filter = AreaFilter::Radius {
            lat: 48.0,
            lon: 11.0,
            radius_km: 5.0,
        };
        assert_eq!(filter.render_suffix().unwrap(), "(around:5000,48,11)");
    }

    #[test]
    fn zero_radius_is_rejected() {
        let filter = AreaFilter::Radius {
            lat: 0.0,
            lon: 0.0,
            radius_km: 0.0,
        };
        assert!(filter.render_suffix().is_err());
    }

    #[test]
    fn polygon_filter_needs_three_points() {
        let filter = AreaFilter::Polygon(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(filter.render_suffix().is_err());
    }

    #[test]
    fn ids_query_includes_each_id() {
        let q = ids_query("way", &[1, 2, 3], true).unwrap();
        assert!(q.contains("way(1);"));
        assert!(q.contains("way(2);"));
        assert!(q.contains("(._;>;);"));
    }

    #[test]
    fn ids_query_rejects_empty_list() {
        assert!(ids_query("node", &[], false).is_err());
    }
}

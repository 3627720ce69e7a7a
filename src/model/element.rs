//! OSM element types: nodes, ways and relations as they arrive from Overpass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type Tags = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMember {
    #[serde(rename = "type")]
    pub member_type: MemberType,
    #[serde(rename = "ref")]
    pub ref_id: i64,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: Tags,
    /// ISO alpha-2, stamped by the fetcher once the element's country is known.
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: i64,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub country: Option<String>,
    /// Computed centroid, filled in once GeometryHandler resolves member nodes.
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    #[serde(default)]
    pub members: Vec<RelationMember>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// Tagged union over the three kinds of OSM element the pipeline ever sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmElement {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl OsmElement {
    pub fn id(&self) -> i64 {
        match self {
            OsmElement::Node(n) => n.id,
            OsmElement::Way(w) => w.id,
            OsmElement::Relation(r) => r.id,
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            OsmElement::Node(_) => ElementType::Node,
            OsmElement::Way(_) => ElementType::Way,
            OsmElement::Relation(_) => ElementType::Relation,
        }
    }

    /// `"type/id"`, the identifier used throughout caches and the rejection tracker.
    pub fn identification(&self) -> String {
        format!("{}/{}", self.element_type(), self.id())
    }

    pub fn tags(&self) -> &Tags {
        match self {
            OsmElement::Node(n) => &n.tags,
            OsmElement::Way(w) => &w.tags,
            OsmElement::Relation(r) => &r.tags,
        }
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        match self {
            OsmElement::Node(n) => &mut n.tags,
            OsmElement::Way(w) => &mut w.tags,
            OsmElement::Relation(r) => &mut r.tags,
        }
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            OsmElement::Node(n) => n.country.as_deref(),
            OsmElement::Way(w) => w.country.as_deref(),
            OsmElement::Relation(r) => r.country.as_deref(),
        }
    }

    pub fn set_country(&mut self, country: impl Into<String>) {
        let country = country.into();
        match self {
            OsmElement::Node(n) => n.country = Some(country),
            OsmElement::Way(w) => w.country = Some(country),
            OsmElement::Relation(r) => r.country = Some(country),
        }
    }

    /// The derived `_lat`/`_lon` annotation for ways/relations, or the node's own position.
    pub fn derived_coordinates(&self) -> (Option<f64>, Option<f64>) {
        match self {
            OsmElement::Node(n) => (Some(n.lat), Some(n.lon)),
            OsmElement::Way(w) => (w.lat, w.lon),
            OsmElement::Relation(r) => (r.lat, r.lon),
        }
    }

    pub fn set_derived_coordinates(&mut self, lat: f64, lon: f64) {
        match self {
            OsmElement::Node(_) => {}
            OsmElement::Way(w) => {
                w.lat = Some(lat);
                w.lon = Some(lon);
            }
            OsmElement::Relation(r) => {
                r.lat = Some(lat);
                r.lon = Some(lon);
            }
        }
    }

    pub fn power_tag(&self) -> Option<&str> {
        self.tags().get("power").map(String::as_str)
    }

    pub fn as_relation(&self) -> Option<&Relation> {
        match self {
            OsmElement::Relation(r) => Some(r),
            _ => None,
        }
    }
}

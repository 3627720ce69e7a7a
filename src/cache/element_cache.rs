//! Persistent multi-map cache of raw OSM elements and processed units,
//! mirroring the retrieval layer's on-disk cache files one-to-one.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::model::element::{Node, Relation, Way};
use crate::model::unit::Unit;

const NODES_FILE: &str = "nodes_data.json";
const WAYS_FILE: &str = "ways_data.json";
const RELATIONS_FILE: &str = "relations_data.json";
const PLANTS_FILE: &str = "plants_power.json";
const GENERATORS_FILE: &str = "generators_power.json";
const PROCESSED_UNITS_FILE: &str = "processed_units.json";

#[derive(Default)]
struct Dirty {
    nodes: bool,
    ways: bool,
    relations: bool,
    plants: bool,
    generators: bool,
    units: bool,
}

/// Keeps every raw-element and per-country processed class in memory, with a
/// dirty flag per class so `save_all` only rewrites what actually changed.
pub struct ElementCache {
    dir: PathBuf,
    nodes: HashMap<i64, Node>,
    ways: HashMap<i64, Way>,
    relations: HashMap<i64, Relation>,
    plants: HashMap<String, Vec<serde_json::Value>>,
    generators: HashMap<String, Vec<serde_json::Value>>,
    units: HashMap<String, Vec<Unit>>,
    dirty: Dirty,
}

impl ElementCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            nodes: HashMap::new(),
            ways: HashMap::new(),
            relations: HashMap::new(),
            plants: HashMap::new(),
            generators: HashMap::new(),
            units: HashMap::new(),
            dirty: Dirty::default(),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn load_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> CacheResult<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let text = fs::read_to_string(path).map_err(|e| CacheError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| CacheError::Corrupt {
            path: path.display().to_string(),
            source: e,
        })
    }

    fn save_json<T: Serialize>(path: &Path, value: &T) -> CacheResult<()> {
        let text = serde_json::to_string_pretty(value).map_err(|e| CacheError::Corrupt {
            path: path.display().to_string(),
            source: e,
        })?;
        fs::write(path, text).map_err(|e| CacheError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Loads every cache class from disk, tolerating a class whose file is
    /// missing (a fresh cache directory) by leaving it empty.
    pub fn load_all(&mut self) -> CacheResult<()> {
        self.nodes = Self::load_json(&self.path(NODES_FILE))?;
        self.ways = Self::load_json(&self.path(WAYS_FILE))?;
        self.relations = Self::load_json(&self.path(RELATIONS_FILE))?;
        self.plants = Self::load_json(&self.path(PLANTS_FILE))?;
        self.generators = Self::load_json(&self.path(GENERATORS_FILE))?;
        self.units = Self::load_json(&self.path(PROCESSED_UNITS_FILE))?;
        self.dirty = Dirty::default();
        Ok(())
    }

    /// Writes every dirty class to disk. With `force`, writes every class
    /// regardless of its dirty flag.
    pub fn save_all(&mut self, force: bool) -> CacheResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;
        if force || self.dirty.nodes {
            Self::save_json(&self.path(NODES_FILE), &self.nodes)?;
        }
        if force || self.dirty.ways {
            Self::save_json(&self.path(WAYS_FILE), &self.ways)?;
        }
        if force || self.dirty.relations {
            Self::save_json(&self.path(RELATIONS_FILE), &self.relations)?;
        }
        if force || self.dirty.plants {
            Self::save_json(&self.path(PLANTS_FILE), &self.plants)?;
        }
        if force || self.dirty.generators {
            Self::save_json(&self.path(GENERATORS_FILE), &self.generators)?;
        }
        if force || self.dirty.units {
            Self::save_json(&self.path(PROCESSED_UNITS_FILE), &self.units)?;
        }
        self.dirty = Dirty::default();
        Ok(())
    }

    pub fn get_node(&self, id: i64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_way(&self, id: i64) -> Option<&Way> {
        self.ways.get(&id)
    }

    pub fn get_relation(&self, id: i64) -> Option<&Relation> {
        self.relations.get(&id)
    }

    pub fn store_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
        self.dirty.nodes = true;
    }

    pub fn store_way(&mut self, way: Way) {
        self.ways.insert(way.id, way);
        self.dirty.ways = true;
    }

    pub fn store_relation(&mut self, relation: Relation) {
        self.relations.insert(relation.id, relation);
        self.dirty.relations = true;
    }

    pub fn store_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) {
        for n in nodes {
            self.store_node(n);
        }
    }

    pub fn store_ways(&mut self, ways: impl IntoIterator<Item = Way>) {
        for w in ways {
            self.store_way(w);
        }
    }

    pub fn store_relations(&mut self, relations: impl IntoIterator<Item = Relation>) {
        for r in relations {
            self.store_relation(r);
        }
    }

    pub fn get_plants(&self, country: &str) -> Option<&[serde_json::Value]> {
        self.plants.get(country).map(Vec::as_slice)
    }

    pub fn store_plants(&mut self, country: &str, plants: Vec<serde_json::Value>) {
        self.plants.insert(country.to_string(), plants);
        self.dirty.plants = true;
    }

    pub fn get_generators(&self, country: &str) -> Option<&[serde_json::Value]> {
        self.generators.get(country).map(Vec::as_slice)
    }

    pub fn store_generators(&mut self, country: &str, generators: Vec<serde_json::Value>) {
        self.generators.insert(country.to_string(), generators);
        self.dirty.generators = true;
    }

    pub fn get_units(&self, country: &str) -> Option<&[Unit]> {
        self.units.get(country).map(Vec::as_slice)
    }

    pub fn store_units(&mut self, country: &str, units: Vec<Unit>) {
        self.units.insert(country.to_string(), units);
        self.dirty.units = true;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::Tags;

    fn node(id: i64) -> Node {
        Node {
            id,
            lat: 1.0,
            lon: 2.0,
            tags: Tags::new(),
            country: Some("DE".into()),
        }
    }

    #[test]
    fn save_and_reload_round_trips_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ElementCache::new(dir.path());
        cache.store_node(node(1));
        cache.save_all(false).unwrap();

        let mut reloaded = ElementCache::new(dir.path());
        reloaded.load_all().unwrap();
        assert_eq!(reloaded.get_node(1).unwrap().country.as_deref(), Some("DE"));
    }

    #[test]
    fn save_all_without_force_skips_clean_classes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ElementCache::new(dir.path());
        cache.store_node(node(1));
        cache.save_all(false).unwrap();
        assert!(dir.path().join(NODES_FILE).exists());
        assert!(!dir.path().join(WAYS_FILE).exists());
    }

    #[test]
    fn force_save_writes_every_class_even_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ElementCache::new(dir.path());
        cache.save_all(true).unwrap();
        assert!(dir.path().join(WAYS_FILE).exists());
        assert!(dir.path().join(RELATIONS_FILE).exists());
    }

    #[test]
    fn store_plants_is_keyed_per_country() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ElementCache::new(dir.path());
        cache.store_plants("DE", vec![serde_json::json!({"id": 1})]);
        cache.store_plants("FR", vec![]);
        assert_eq!(cache.get_plants("DE").unwrap().len(), 1);
        assert_eq!(cache.get_plants("FR").unwrap().len(), 0);
        assert!(cache.get_plants("PL").is_none());
    }
}

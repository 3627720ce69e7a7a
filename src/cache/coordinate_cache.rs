//! Bounded LRU cache mapping rounded coordinates to a reverse-geocoded
//! country code, plus a secondary tolerance scan for near-miss lookups.

use std::collections::VecDeque;

/// Default number of distinct rounded-coordinate entries retained.
pub const DEFAULT_CAPACITY: usize = 1000;
/// Default rounding precision, in decimal degrees (~1.1km at the equator).
pub const DEFAULT_PRECISION: u32 = 2;
/// Cap on how many recent entries the tolerance scan walks.
pub const DEFAULT_TOLERANCE_SCAN_LIMIT: usize = 500;

fn round_key(lat: f64, lon: f64, precision: u32) -> (i64, i64) {
    let factor = 10f64.powi(precision as i32);
    (
        (lat * factor).round() as i64,
        (lon * factor).round() as i64,
    )
}

struct Entry {
    key: (i64, i64),
    lat: f64,
    lon: f64,
    country: Option<String>,
}

/// A coordinate reverse-lookup cache with LRU eviction, keyed on coordinates
/// rounded to `precision` decimal places so nearby queries share an entry.
pub struct CoordinateCache {
    capacity: usize,
    precision: u32,
    tolerance_scan_limit: usize,
    order: VecDeque<Entry>,
}

impl CoordinateCache {
    pub fn new(capacity: usize, precision: u32) -> Self {
        Self {
            capacity,
            precision,
            tolerance_scan_limit: DEFAULT_TOLERANCE_SCAN_LIMIT,
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, index: usize) {
        let entry = self.order.remove(index).expect("index in bounds");
        self.order.push_back(entry);
    }

    fn find_exact(&self, key: (i64, i64)) -> Option<usize> {
        self.order.iter().position(|e| e.key == key)
    }

    /// Returns a cached country for these coordinates, calling `lookup` and
    /// inserting the result on a cache miss.
    pub fn get(
        &mut self,
        lat: f64,
        lon: f64,
        lookup: impl FnOnce(f64, f64) -> Option<String>,
    ) -> Option<String> {
        let key = round_key(lat, lon, self.precision);
        if let Some(idx) = self.find_exact(key) {
            let country = self.order[idx].country.clone();
            self.touch(idx);
            return country;
        }
        let country = lookup(lat, lon);
        self.insert(key, lat, lon, country.clone());
        country
    }

    fn insert(&mut self, key: (i64, i64), lat: f64, lon: f64, country: Option<String>) {
        if self.order.len() >= self.capacity {
            self.order.pop_front();
        }
        self.order.push_back(Entry {
            key,
            lat,
            lon,
            country,
        });
    }

    /// Secondary lookup: scans the most recently used entries (bounded by
    /// `tolerance_scan_limit`) for one within `tolerance` degrees, without
    /// requiring an exact rounded-key match. Does not call `lookup` itself;
    /// returns `None` on no near match so the caller can fall back.
    pub fn get_with_tolerance(&mut self, lat: f64, lon: f64, tolerance: f64) -> Option<String> {
        let scan_from = self.order.len().saturating_sub(self.tolerance_scan_limit);
        let mut best: Option<(usize, f64)> = None;
        for (i, entry) in self.order.iter().enumerate().skip(scan_from) {
            if entry.country.is_none() {
                continue;
            }
            let dist = ((entry.lat - lat).powi(2) + (entry.lon - lon).powi(2)).sqrt();
            if dist <= tolerance && best.map(|(_, d)| dist < d).unwrap_or(true) {
                best = Some((i, dist));
            }
        }
        let (idx, _) = best?;
        let country = self.order[idx].country.clone();
        self.touch(idx);
        country
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

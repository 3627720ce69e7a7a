//! OSM power-infrastructure extraction: turns Overpass API results for
//! `power=plant`/`power=generator` elements into a normalised set of power
//! units, with every rejected candidate tracked alongside the ones that made
//! it through.

pub mod cache;
pub mod capacity;
pub mod clustering;
pub mod config;
pub mod country;
pub mod error;
pub mod geometry_handler;
pub mod model;
pub mod overpass;
pub mod parsing;
pub mod rejection;
pub mod workflow;

pub mod prelude;

//! A small static ISO-3166 country table and resolution helper, standing in
//! for the `pycountry` lookups the source relies on.

use crate::error::{ConfigError, ConfigResult};

/// (ISO alpha-2 code, English short name). Not exhaustive; covers the
/// countries OSM's European power infrastructure coverage concentrates on
/// plus a handful of common non-European ones, matching the spec's
/// "countries participating in this pipeline" framing rather than a full
/// 249-entry ISO registry.
pub const COUNTRY_TABLE: &[(&str, &str)] = &[
    ("AT", "Austria"),
    ("BE", "Belgium"),
    ("BG", "Bulgaria"),
    ("CH", "Switzerland"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EE", "Estonia"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GR", "Greece"),
    ("HR", "Croatia"),
    ("HU", "Hungary"),
    ("IE", "Ireland"),
    ("IT", "Italy"),
    ("LT", "Lithuania"),
    ("LU", "Luxembourg"),
    ("LV", "Latvia"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("RS", "Serbia"),
    ("SE", "Sweden"),
    ("SI", "Slovenia"),
    ("SK", "Slovakia"),
    ("UA", "Ukraine"),
    ("US", "United States"),
];

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn closest_match(input: &str) -> Option<String> {
    let lowered = input.to_lowercase();
    COUNTRY_TABLE
        .iter()
        .map(|&(code, name)| {
            let dist = levenshtein(&lowered, &code.to_lowercase())
                .min(levenshtein(&lowered, &name.to_lowercase()));
            (dist, code)
        })
        .min_by_key(|&(dist, _)| dist)
        .filter(|&(dist, _)| dist <= 2)
        .map(|(_, code)| code.to_string())
}

/// Resolves a single free-form country name or ISO code to its canonical
/// alpha-2 code. Case-insensitive; accepts either the code or the English name.
pub fn resolve_country(input: &str) -> ConfigResult<String> {
    let trimmed = input.trim();
    let lowered = trimmed.to_lowercase();
    for &(code, name) in COUNTRY_TABLE {
        if code.to_lowercase() == lowered || name.to_lowercase() == lowered {
            return Ok(code.to_string());
        }
    }
    Err(ConfigError::UnknownCountries(vec![
        crate::error::UnknownCountry {
            input: trimmed.to_string(),
            closest_match: closest_match(trimmed),
        },
    ]))
}

/// Validates a whole batch of country inputs up front, collecting every
/// unresolved entry into a single error rather than failing on the first.
pub fn resolve_countries(inputs: &[String]) -> ConfigResult<Vec<String>> {
    let mut resolved = Vec::with_capacity(inputs.len());
    let mut unknown = Vec::new();
    for input in inputs {
        match resolve_country(input) {
            Ok(code) => resolved.push(code),
            Err(ConfigError::UnknownCountries(mut entries)) => unknown.append(&mut entries),
            Err(other) => return Err(other),
        }
    }
    if unknown.is_empty() {
        Ok(resolved)
    } else {
        Err(ConfigError::UnknownCountries(unknown))
    }
}

//! Capacity-string parsing: a cheap first pass for the common `"N MW"`/`"N MWp"`
//! shape, then a richer second pass covering more units and long unit names.
//!
//! Hand-rolled rather than built on the `regex` crate: the grammar is small
//! and fixed, and pulling in a regex engine for it would be the outlier
//! dependency in this codebase (see DESIGN.md).

use crate::model::rejection::RejectionReason;

/// Placeholder values OSM contributors sometimes leave in capacity tags
/// instead of a real number.
const PLACEHOLDER_VALUES: &[&str] = &["yes", "no", "unknown", "?", "n/a", "none"];

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCapacity {
    pub capacity_mw: f64,
    pub info: String,
}

pub type ExtractionOutcome = Result<ExtractedCapacity, RejectionReason>;

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_VALUES.contains(&value.trim().to_lowercase().as_str())
}

/// A value written with a comma but no dot is ambiguous (decimal separator in
/// some locales, thousands separator in others) and is always rejected,
/// regardless of how many digits follow the comma.
fn has_ambiguous_comma(value: &str) -> bool {
    value.contains(',') && !value.contains('.')
}

/// Comma-replaced-with-dot rewrite offered back to the caller as the
/// `details` of a `capacity-decimal-format` rejection, so the report tells
/// the contributor what to fix the tag to.
pub fn suggested_correction(value: &str) -> String {
    value.replace(',', ".")
}

/// Splits a leading numeric run (digits, at most one `.` or `,`) from a
/// trailing unit string. Returns `None` if there's no numeric prefix at all.
fn split_number_and_unit(value: &str) -> Option<(&str, &str)> {
    let trimmed = value.trim();
    let mut split_at = 0;
    let mut seen_separator = false;
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_digit() {
            split_at = i + c.len_utf8();
        } else if (c == '.' || c == ',') && !seen_separator {
            seen_separator = true;
            split_at = i + c.len_utf8();
        } else {
            break;
        }
    }
    if split_at == 0 {
        return None;
    }
    Some((&trimmed[..split_at], trimmed[split_at..].trim()))
}

fn parse_number(raw: &str) -> Result<f64, RejectionReason> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RejectionReason::CapacityNonNumeric);
    }
    raw.parse::<f64>()
        .map_err(|_| RejectionReason::CapacityNonNumeric)
}

/// Known unit suffixes, longest-match-first so `"megawatt"` isn't mistaken
/// for `"mw"` mid-match. The float is the multiplier to megawatts.
const UNIT_TABLE: &[(&str, f64)] = &[
    ("gigawatt peak", 1000.0),
    ("gigawatt", 1000.0),
    ("megawatt peak", 1.0),
    ("megawatt", 1.0),
    ("kilowatt peak", 0.001),
    ("kilowatt", 0.001),
    ("watt peak", 0.000001),
    ("watt", 0.000001),
    ("gwp", 1000.0),
    ("gw", 1000.0),
    ("mwp", 1.0),
    ("mw", 1.0),
    ("kwp", 0.001),
    ("kw", 0.001),
    ("wp", 0.000001),
    ("w", 0.000001),
];

fn match_unit(unit: &str) -> Option<(&'static str, f64)> {
    let lowered = unit.trim().to_lowercase();
    UNIT_TABLE
        .iter()
        .find(|(name, _)| lowered == *name)
        .map(|&(name, factor)| (name, factor))
}

pub struct CapacityExtractor;

impl CapacityExtractor {
    /// First pass: only accepts the plain `mw`/`mwp` suffix, matching the
    /// shape almost every OSM capacity tag actually uses.
    pub fn basic_extraction(value: &str) -> ExtractionOutcome {
        if is_placeholder(value) {
            return Err(RejectionReason::CapacityPlaceholder);
        }
        if has_ambiguous_comma(value) {
            return Err(RejectionReason::CapacityDecimalFormat);
        }
        let (number, unit) = split_number_and_unit(value)
            .ok_or(RejectionReason::CapacityRegexNoMatch)?;
        let unit_lower = unit.to_lowercase();
        if unit_lower != "mw" && unit_lower != "mwp" {
            return Err(RejectionReason::CapacityRegexNoMatch);
        }
        let number = parse_number(number)?;
        if number == 0.0 {
            return Err(RejectionReason::CapacityZero);
        }
        Ok(ExtractedCapacity {
            capacity_mw: number,
            info: "basic_extraction".to_string(),
        })
    }

    /// Second pass: the fuller unit table (W through GW, abbreviated and
    /// spelled out, "peak" variants for solar). Only consulted when the
    /// basic pass fails and advanced extraction is enabled in config.
    pub fn advanced_extraction(value: &str) -> ExtractionOutcome {
        if is_placeholder(value) {
            return Err(RejectionReason::CapacityPlaceholder);
        }
        if has_ambiguous_comma(value) {
            return Err(RejectionReason::CapacityDecimalFormat);
        }
        let (number, unit) = split_number_and_unit(value)
            .ok_or(RejectionReason::CapacityRegexNoMatch)?;
        if unit.is_empty() {
            return Err(RejectionReason::CapacityRegexNoMatch);
        }
        let (_, factor) =
            match_unit(unit).ok_or_else(|| RejectionReason::CapacityUnsupportedUnit)?;
        let number = parse_number(number)?;
        if number == 0.0 {
            return Err(RejectionReason::CapacityZero);
        }
        Ok(ExtractedCapacity {
            capacity_mw: number * factor,
            info: "advanced_extraction".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_extraction_accepts_plain_mw() {
        let result = CapacityExtractor::basic_extraction("12.5 MW").unwrap();
        assert_eq!(result.capacity_mw, 12.5);
    }

    #[test]
    fn basic_extraction_accepts_mwp_for_solar() {
        let result = CapacityExtractor::basic_extraction("3MWp").unwrap();
        assert_eq!(result.capacity_mw, 3.0);
    }

    #[test]
    fn basic_extraction_rejects_kilowatt() {
        let err = CapacityExtractor::basic_extraction("500 kW").unwrap_err();
        assert_eq!(err, RejectionReason::CapacityRegexNoMatch);
    }

    #[test]
    fn basic_extraction_rejects_placeholder() {
        let err = CapacityExtractor::basic_extraction("yes").unwrap_err();
        assert_eq!(err, RejectionReason::CapacityPlaceholder);
    }

    #[test]
    fn advanced_extraction_converts_kilowatt_to_megawatt() {
        let result = CapacityExtractor::advanced_extraction("500 kW").unwrap();
        assert_eq!(result.capacity_mw, 0.5);
    }

    #[test]
    fn advanced_extraction_converts_gigawatt() {
        let result = CapacityExtractor::advanced_extraction("1.2GW").unwrap();
        assert_eq!(result.capacity_mw, 1200.0);
    }

    #[test]
    fn advanced_extraction_accepts_long_unit_names() {
        let result = CapacityExtractor::advanced_extraction("2 megawatt").unwrap();
        assert_eq!(result.capacity_mw, 2.0);
    }

    #[test]
    fn advanced_extraction_rejects_unknown_unit() {
        let err = CapacityExtractor::advanced_extraction("5 barrels").unwrap_err();
        assert_eq!(err, RejectionReason::CapacityUnsupportedUnit);
    }

    #[test]
    fn ambiguous_thousands_separator_is_rejected() {
        let err = CapacityExtractor::advanced_extraction("1,500 MW").unwrap_err();
        assert_eq!(err, RejectionReason::CapacityDecimalFormat);
    }

    #[test]
    fn comma_decimal_separator_is_rejected_even_with_one_digit() {
        let err = CapacityExtractor::advanced_extraction("1,5 MW").unwrap_err();
        assert_eq!(err, RejectionReason::CapacityDecimalFormat);
    }

    #[test]
    fn suggested_correction_replaces_comma_with_dot() {
        assert_eq!(suggested_correction("3,5 MW"), "3.5 MW");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = CapacityExtractor::basic_extraction("0 MW").unwrap_err();
        assert_eq!(err, RejectionReason::CapacityZero);
    }
}

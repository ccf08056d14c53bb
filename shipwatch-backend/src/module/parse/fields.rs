//! Normalization of heterogeneous source fields into one record shape.
//!
//! Sources disagree on naming (`SHIPNAME`, `Vessel Name`, `name`...) and on
//! formatting (`12.3 kn`, `123°`, epoch seconds vs. dates). Every pair is
//! mapped through an alias table onto a canonical field; the first non-empty
//! value for a field wins.

use chrono::DateTime;
use regex::Regex;
use shipwatch_common::PartialRecord;
use std::sync::LazyLock;

use super::patterns::parse_position_value;

/// Label/value pairs as one source produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    pub source: String,
    pub pairs: Vec<(String, String)>,
}

impl RawFields {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            pairs: Vec::new(),
        }
    }

    /// Add a pair; blank values are dropped.
    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if !value.is_empty() {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }

    pub fn extend<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in pairs {
            self.push(&k, v);
        }
    }

    /// First value stored under `key` (exact match)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Canonical fields every source is mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Latitude,
    Longitude,
    Position,
    Speed,
    Course,
    Heading,
    Status,
    Destination,
    Eta,
    Timestamp,
}

impl Field {
    /// Map a source label onto a canonical field. Case, punctuation,
    /// underscores and parenthesised units are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let key = canonical_label(label);
        let field = match key.as_str() {
            "shipname" | "ship name" | "vessel name" | "vessel" | "name" | "ship" => Field::Name,
            "lat" | "latitude" => Field::Latitude,
            "lon" | "lng" | "long" | "longitude" => Field::Longitude,
            "position" | "coordinates" | "coords" | "location" | "lat lon" | "latlon"
            | "latitude longitude" | "current position" => Field::Position,
            "speed" | "sog" | "speed over ground" | "current speed" => Field::Speed,
            "course" | "cog" | "course over ground" => Field::Course,
            "heading" | "true heading" | "hdg" => Field::Heading,
            "status" | "navigation status" | "navigational status" | "nav status"
            | "navstatus" | "condition" => Field::Status,
            "destination" | "dest" | "reported destination" => Field::Destination,
            "eta" | "estimated time of arrival" | "reported eta" => Field::Eta,
            "timestamp" | "last update" | "last report" | "position received" | "last seen"
            | "last position update" => Field::Timestamp,
            _ => return None,
        };
        Some(field)
    }
}

static PARENTHESISED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("parenthesis pattern"));
static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number pattern"));
static HEMISPHERE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\d+(?:\.\d+)?\s*°?\s*([NSEW])\b").expect("hemisphere suffix pattern")
});
static HEMISPHERE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([NSEW])\s*-?\d").expect("hemisphere prefix pattern"));

fn canonical_label(label: &str) -> String {
    let label = PARENTHESISED.replace_all(label, " ");
    label
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First decimal number in a unit-bearing value such as `"12.3 kn"`
pub fn first_number(value: &str) -> Option<f64> {
    FIRST_NUMBER
        .find(value)
        .and_then(|m| m.as_str().parse().ok())
}

/// A single coordinate, negated for `S`/`W` hemisphere suffixes
pub fn parse_coordinate(value: &str) -> Option<f64> {
    let number = first_number(value)?;
    let hemisphere = HEMISPHERE_SUFFIX
        .captures(value)
        .or_else(|| HEMISPHERE_PREFIX.captures(value))
        .map(|c| c[1].to_string());
    match hemisphere {
        Some(h) if h == "S" || h == "W" => Some(-number.abs()),
        _ => Some(number),
    }
}

/// Render epoch-second timestamps; keep anything else as printed.
fn format_timestamp(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        if let Some(dt) = value
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        {
            return dt.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        }
    }
    value.to_string()
}

/// AIS navigational status codes as reported by position APIs
pub fn nav_status_text(code: u8) -> Option<&'static str> {
    let text = match code {
        0 => "Under way using engine",
        1 => "At anchor",
        2 => "Not under command",
        3 => "Restricted manoeuvrability",
        4 => "Constrained by draught",
        5 => "Moored",
        6 => "Aground",
        7 => "Engaged in fishing",
        8 => "Under way sailing",
        14 => "AIS-SART active",
        15 => "Not defined",
        _ => return None,
    };
    Some(text)
}

fn status_text(value: &str) -> String {
    value
        .parse::<u8>()
        .ok()
        .and_then(nav_status_text)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Map raw pairs onto a [`PartialRecord`]. Unknown labels are ignored.
pub fn normalize(raw: &RawFields) -> PartialRecord {
    let mut record = PartialRecord::default();
    let mut heading = None;
    let mut position = None;

    for (label, value) in &raw.pairs {
        let Some(field) = Field::from_label(label) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match field {
            Field::Name => set(&mut record.name, Some(value.to_string())),
            Field::Latitude => set(&mut record.latitude, parse_coordinate(value)),
            Field::Longitude => set(&mut record.longitude, parse_coordinate(value)),
            Field::Position => set(&mut position, parse_position_value(value)),
            Field::Speed => set(&mut record.speed_knots, first_number(value)),
            Field::Course => set(&mut record.course_deg, first_number(value)),
            // 511 is the AIS "heading not available" value
            Field::Heading => set(&mut heading, first_number(value).filter(|h| *h < 360.0)),
            Field::Status => set(&mut record.status, Some(status_text(value))),
            Field::Destination => set(&mut record.destination, Some(value.to_string())),
            Field::Eta => set(&mut record.eta, Some(value.to_string())),
            Field::Timestamp => set(&mut record.reported_at, Some(format_timestamp(value))),
        }
    }

    if !record.has_position() {
        if let Some((lat, lon)) = position {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
        }
    }
    set(&mut record.course_deg, heading);

    tracing::debug!("Normalized {} pairs from {}: {:?}", raw.len(), raw.source, record);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawFields {
        let mut fields = RawFields::new("test");
        for (k, v) in pairs {
            fields.push(k, *v);
        }
        fields
    }

    #[test]
    fn test_label_aliases() {
        assert_eq!(Field::from_label("SHIPNAME"), Some(Field::Name));
        assert_eq!(Field::from_label("Vessel Name:"), Some(Field::Name));
        assert_eq!(Field::from_label("Speed (kn)"), Some(Field::Speed));
        assert_eq!(Field::from_label("Lat/Lon"), Some(Field::Position));
        assert_eq!(Field::from_label("NAV_STATUS"), Some(Field::Status));
        assert_eq!(Field::from_label("Gross Tonnage"), None);
    }

    #[test]
    fn test_normalize_api_payload() {
        let record = normalize(&raw(&[
            ("SHIPNAME", "EVER GIVEN"),
            ("LAT", "51.95"),
            ("LON", "4.05"),
            ("SPEED", "12.3"),
            ("COURSE", "45"),
            ("STATUS", "5"),
            ("DESTINATION", "ROTTERDAM"),
            ("ETA", "2025-06-02T14:00:00"),
            ("TIMESTAMP", "1748772000"),
        ]));
        assert_eq!(record.name.as_deref(), Some("EVER GIVEN"));
        assert_eq!(record.latitude, Some(51.95));
        assert_eq!(record.longitude, Some(4.05));
        assert_eq!(record.speed_knots, Some(12.3));
        assert_eq!(record.course_deg, Some(45.0));
        assert_eq!(record.status.as_deref(), Some("Moored"));
        assert_eq!(record.eta.as_deref(), Some("2025-06-02T14:00:00"));
        assert_eq!(record.reported_at.as_deref(), Some("2025-06-01 10:00:00 UTC"));
    }

    #[test]
    fn test_normalize_scraped_page() {
        let record = normalize(&raw(&[
            ("Vessel Name", "EVER GIVEN"),
            ("Gross Tonnage", "220940"),
            ("Course", "123.4°"),
            ("Speed", "12.3 kn"),
            ("Position", "51.95 N / 4.05 W"),
            ("Navigation Status", "Under way using engine"),
            ("Name", "SHOULD NOT WIN"),
        ]));
        assert_eq!(record.name.as_deref(), Some("EVER GIVEN"));
        assert_eq!(record.course_deg, Some(123.4));
        assert_eq!(record.speed_knots, Some(12.3));
        assert_eq!(record.latitude, Some(51.95));
        assert_eq!(record.longitude, Some(-4.05));
        assert_eq!(record.status.as_deref(), Some("Under way using engine"));
    }

    #[test]
    fn test_separate_coordinates_beat_combined_position() {
        let record = normalize(&raw(&[
            ("Position", "1.0, 2.0"),
            ("Latitude", "33.86 S"),
            ("Longitude", "151.2 E"),
        ]));
        assert_eq!(record.latitude, Some(-33.86));
        assert_eq!(record.longitude, Some(151.2));
    }

    #[test]
    fn test_hemisphere_suffix_without_space() {
        assert_eq!(parse_coordinate("33.86S"), Some(-33.86));
        assert_eq!(parse_coordinate("151.21°W"), Some(-151.21));
        assert_eq!(parse_coordinate("S 33.86"), Some(-33.86));
        assert_eq!(parse_coordinate("51.95N"), Some(51.95));

        let record = normalize(&raw(&[("Latitude", "33.86S"), ("Longitude", "151.21W")]));
        assert_eq!(record.latitude, Some(-33.86));
        assert_eq!(record.longitude, Some(-151.21));
    }

    #[test]
    fn test_heading_only_used_without_course() {
        let record = normalize(&raw(&[("Heading", "270"), ("COG", "268.5")]));
        assert_eq!(record.course_deg, Some(268.5));

        let record = normalize(&raw(&[("Heading", "511")]));
        assert_eq!(record.course_deg, None);

        let record = normalize(&raw(&[("hdg", "90")]));
        assert_eq!(record.course_deg, Some(90.0));
    }

    #[test]
    fn test_raw_fields_drop_blank_values() {
        let mut fields = RawFields::new("x");
        fields.push("name", "   ");
        fields.push("speed", " 3 ");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("speed"), Some("3"));
    }
}

//! Ordered regex extraction over page or dialog text.
//!
//! For every field the patterns are tried in order and the first match wins.
//! Text is expected line oriented (see `html::page_text`), so free-text
//! captures stop at the end of the line.

use regex::Regex;
use std::sync::LazyLock;

use super::fields::RawFields;

struct FieldPatterns {
    key: &'static str,
    patterns: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("built-in field pattern"))
        .collect()
}

const NUMBER: &str = r"(\d+(?:\.\d+)?)";

static FIELD_PATTERNS: LazyLock<Vec<FieldPatterns>> = LazyLock::new(|| {
    vec![
        FieldPatterns {
            key: "name",
            patterns: compile(&[
                r"(?i)\bvessel[ \t]+name[ \t]*:[ \t]*([^\n]+)",
                r"(?i)\bname[ \t]*:[ \t]*([^\n]+)",
                r"(?i)\bvessel[ \t]*:[ \t]*([^\n]+)",
                r"(?i)\bship[ \t]*:[ \t]*([^\n]+)",
            ]),
        },
        FieldPatterns {
            key: "speed",
            patterns: compile(&[
                &format!(r"(?i)\bspeed[ \t]*:?[ \t]*{NUMBER}[ \t]*(?:kn|knots?)\b"),
                &format!(r"(?i)\bSOG[ \t]*:?[ \t]*{NUMBER}"),
                &format!(r"(?i)\bspeed(?:[ \t]+over[ \t]+ground)?[ \t]*:?[ \t]*{NUMBER}"),
            ]),
        },
        FieldPatterns {
            key: "course",
            patterns: compile(&[
                &format!(r"(?i)\bcourse[ \t]*:?[ \t]*{NUMBER}[ \t]*(?:°|deg)"),
                &format!(r"(?i)\bCOG[ \t]*:?[ \t]*{NUMBER}"),
                &format!(r"(?i)\bcourse(?:[ \t]+over[ \t]+ground)?[ \t]*:?[ \t]*{NUMBER}"),
            ]),
        },
        FieldPatterns {
            key: "heading",
            patterns: compile(&[&format!(r"(?i)\bheading[ \t]*:?[ \t]*{NUMBER}")]),
        },
        FieldPatterns {
            key: "status",
            patterns: compile(&[
                r"(?i)\bnavigation(?:al)?[ \t]+status[ \t]*:[ \t]*([A-Za-z][A-Za-z \-]*)",
                r"(?i)\bstatus[ \t]*:[ \t]*([A-Za-z][A-Za-z \-]*)",
                r"(?i)\bcondition[ \t]*:[ \t]*([A-Za-z][A-Za-z \-]*)",
            ]),
        },
        FieldPatterns {
            key: "destination",
            patterns: compile(&[r"(?i)\bdestination[ \t]*:[ \t]*([^\n]+)"]),
        },
        FieldPatterns {
            key: "eta",
            patterns: compile(&[r"(?i)\bETA[ \t]*:[ \t]*([^\n]+)"]),
        },
    ]
});

static COORDINATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // 12.34° N, 56.78° W
        r"(\d{1,2}(?:\.\d+)?)[ \t]*°?[ \t]*([NS])\b[ \t]*[,/]?[ \t]*(\d{1,3}(?:\.\d+)?)[ \t]*°?[ \t]*([EW])\b",
        // Lat: -12.34, Lon: 56.78
        r"(?i)\blat(?:itude)?[ \t]*:?[ \t]*(-?\d+(?:\.\d+)?)[ \t]*°?[,/\s]+lon(?:g|gitude)?[ \t]*:?[ \t]*(-?\d+(?:\.\d+)?)",
        // Position: -12.34, 56.78
        r"(?i)\bposition[ \t]*:?[ \t]*(-?\d+(?:\.\d+)?)[ \t]*°?[ \t]*[,/ \t][ \t]*(-?\d+(?:\.\d+)?)",
    ])
});

static BARE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*°?\s*[,/ ]\s*(-?\d+(?:\.\d+)?)\s*°?\s*$")
        .expect("bare coordinate pattern")
});

/// Find a latitude/longitude pair in free text.
///
/// Hemisphere letters are honoured: `S` and `W` give negative values.
pub fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    for (index, re) in COORDINATE_PATTERNS.iter().enumerate() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let pair = if index == 0 {
            let lat: f64 = caps[1].parse().ok()?;
            let lon: f64 = caps[3].parse().ok()?;
            let lat = if &caps[2] == "S" { -lat } else { lat };
            let lon = if &caps[4] == "W" { -lon } else { lon };
            (lat, lon)
        } else {
            (caps[1].parse().ok()?, caps[2].parse().ok()?)
        };
        tracing::debug!("Coordinates matched pattern {}: {:?}", index + 1, pair);
        return Some(pair);
    }
    None
}

/// Parse a value that should hold a position, e.g. `"12.5, -3.25"`
pub fn parse_position_value(value: &str) -> Option<(f64, f64)> {
    if let Some(pair) = parse_coordinates(value) {
        return Some(pair);
    }
    let caps = BARE_PAIR.captures(value)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Run all field patterns over `text` and collect what they find.
pub fn extract_fields(text: &str, source: &str) -> RawFields {
    let mut fields = RawFields::new(source);

    for field in FIELD_PATTERNS.iter() {
        let found = field
            .patterns
            .iter()
            .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
            .map(|m| m.as_str().trim().to_string());

        if let Some(value) = found {
            tracing::debug!("Extracted {}: {}", field.key, value);
            fields.push(field.key, value);
        }
    }

    if let Some((lat, lon)) = parse_coordinates(text) {
        fields.push("latitude", lat.to_string());
        fields.push("longitude", lon.to_string());
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hemisphere_coordinates() {
        assert_eq!(
            parse_coordinates("Ship is at 12.34° N, 56.78° W now"),
            Some((12.34, -56.78))
        );
        assert_eq!(parse_coordinates("33.9 S 151.2 E"), Some((-33.9, 151.2)));
    }

    #[test]
    fn test_labelled_coordinates() {
        assert_eq!(
            parse_coordinates("Lat: -12.5, Lon: 100.25"),
            Some((-12.5, 100.25))
        );
        assert_eq!(
            parse_coordinates("Latitude: 51.9\nLongitude: 4.1"),
            Some((51.9, 4.1))
        );
        assert_eq!(parse_coordinates("Position: 1.5, -2.5"), Some((1.5, -2.5)));
        assert_eq!(parse_coordinates("no numbers here"), None);
    }

    #[test]
    fn test_position_value() {
        assert_eq!(parse_position_value("12.5, -3.25"), Some((12.5, -3.25)));
        assert_eq!(parse_position_value("12.5 / -3.25"), Some((12.5, -3.25)));
        assert_eq!(parse_position_value("12.5"), None);
    }

    #[test]
    fn test_extract_fields_from_dialog_text() {
        let text = "Vessel Name: EVER GIVEN\n\
                    Speed: 12.3 kn\n\
                    Course: 45 deg\n\
                    Navigation Status: Under way using engine\n\
                    Destination: ROTTERDAM\n\
                    ETA: 2025-06-02 14:00\n\
                    Lat: 51.95, Lon: 4.05";
        let fields = extract_fields(text, "browser");

        assert_eq!(fields.get("name"), Some("EVER GIVEN"));
        assert_eq!(fields.get("speed"), Some("12.3"));
        assert_eq!(fields.get("course"), Some("45"));
        assert_eq!(fields.get("status"), Some("Under way using engine"));
        assert_eq!(fields.get("destination"), Some("ROTTERDAM"));
        assert_eq!(fields.get("eta"), Some("2025-06-02 14:00"));
        assert_eq!(fields.get("latitude"), Some("51.95"));
        assert_eq!(fields.get("longitude"), Some("4.05"));
    }

    #[test]
    fn test_fallback_patterns() {
        let fields = extract_fields("SOG 8.1\nCOG: 270.5\nHeading: 268", "ocr");
        assert_eq!(fields.get("speed"), Some("8.1"));
        assert_eq!(fields.get("course"), Some("270.5"));
        assert_eq!(fields.get("heading"), Some("268"));
        assert_eq!(fields.get("name"), None);
    }
}

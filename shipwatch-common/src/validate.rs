//! Coordinate validation and light sanitation of scraped records

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{PartialRecord, Position, ShipSnapshot, UNKNOWN_SHIP};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("no coordinates in result")]
    MissingCoordinates,
    #[error("coordinates are not finite numbers")]
    NonFinite,
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("position 0,0 is the AIS no-fix placeholder")]
    NullIsland,
}

/// Turn a partial record into a snapshot, rejecting unusable coordinates.
pub fn validate(
    partial: PartialRecord,
    mmsi: &str,
    source: &str,
    fetched_at: DateTime<Utc>,
) -> Result<ShipSnapshot, ValidationError> {
    let position = check_position(partial.latitude, partial.longitude)?;

    Ok(ShipSnapshot {
        mmsi: mmsi.to_string(),
        name: non_empty(partial.name).unwrap_or_else(|| UNKNOWN_SHIP.to_string()),
        position,
        speed_knots: partial.speed_knots.filter(|s| s.is_finite() && *s >= 0.0),
        course_deg: partial.course_deg.and_then(normalize_course),
        status: non_empty(partial.status),
        destination: non_empty(partial.destination),
        eta: non_empty(partial.eta),
        reported_at: non_empty(partial.reported_at),
        source: source.to_string(),
        fetched_at,
    })
}

pub fn check_position(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Position, ValidationError> {
    let (Some(lat), Some(lon)) = (latitude, longitude) else {
        return Err(ValidationError::MissingCoordinates);
    };
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::LatitudeOutOfRange(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationError::LongitudeOutOfRange(lon));
    }
    if lat == 0.0 && lon == 0.0 {
        return Err(ValidationError::NullIsland);
    }
    Ok(Position::new(lat, lon))
}

/// AIS reports 360 for "course not available".
fn normalize_course(course: f64) -> Option<f64> {
    if !course.is_finite() || course == 360.0 {
        return None;
    }
    Some(course.rem_euclid(360.0))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

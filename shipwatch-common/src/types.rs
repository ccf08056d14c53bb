//! Ship record types shared by the capture daemon and the bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when no source reported a vessel name
pub const UNKNOWN_SHIP: &str = "Unknown Ship";

/// A validated WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Google Maps link centred on this position
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Fields recovered from one source before validation.
///
/// Every field is optional: scrapers routinely find a name without a
/// position or the other way round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_knots: Option<f64>,
    pub course_deg: Option<f64>,
    pub status: Option<String>,
    pub destination: Option<String>,
    pub eta: Option<String>,
    /// Ship-side report time as the source printed it
    pub reported_at: Option<String>,
}

impl PartialRecord {
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill fields that are still `None` from `other`.
    ///
    /// Coordinates are only taken as a pair so a latitude from one page is
    /// never combined with a longitude from another.
    pub fn merge_missing(&mut self, other: &PartialRecord) {
        fill(&mut self.name, &other.name);
        fill(&mut self.speed_knots, &other.speed_knots);
        fill(&mut self.course_deg, &other.course_deg);
        fill(&mut self.status, &other.status);
        fill(&mut self.destination, &other.destination);
        fill(&mut self.eta, &other.eta);
        fill(&mut self.reported_at, &other.reported_at);

        if self.latitude.is_none() && self.longitude.is_none() && other.has_position() {
            self.latitude = other.latitude;
            self.longitude = other.longitude;
        }
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, from: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(from);
    }
}

/// A validated position report, as persisted in the snapshot cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    /// Maritime Mobile Service Identity of the tracked vessel
    pub mmsi: String,
    pub name: String,
    pub position: Position,
    pub speed_knots: Option<f64>,
    pub course_deg: Option<f64>,
    /// Navigational status, e.g. "Under way using engine"
    pub status: Option<String>,
    pub destination: Option<String>,
    pub eta: Option<String>,
    pub reported_at: Option<String>,
    /// Strategy that produced this snapshot, e.g. "marinetraffic-api"
    pub source: String,
    /// When this snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

impl ShipSnapshot {
    /// Age of the snapshot relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }
}

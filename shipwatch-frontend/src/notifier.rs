//! Message formatting, independent of the chat platform.
//!
//! Everything here is pure so the wording can be tested without a gateway
//! connection; `frontend::discord` turns these into serenity builders.

use chrono::{DateTime, Utc};
use shipwatch_common::ShipSnapshot;

use crate::command::CommandType;
use crate::provider::Report;

pub const REPORT_COLOR: u32 = 0x0099ff;
pub const STATUS_COLOR: u32 = 0x00ff00;

pub const FETCHING: &str = "🔍 Fetching ship location...";
pub const FETCH_FAILED: &str = "❌ Could not fetch ship location data.";
pub const SCHEDULED_FETCH_FAILED: &str =
    "❌ Could not fetch ship location data. Please check the data sources and MMSI number.";
pub const NO_CACHED: &str = "📭 No cached ship location yet.";
pub const NO_SCHEDULE: &str = "Bot is running, but no scheduled updates are active.";
pub const TESTING: &str = "🧪 Testing ship data source...";

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl ReportField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline,
        }
    }
}

/// An embed-shaped message
#[derive(Debug, Clone, PartialEq)]
pub struct ShipReport {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<ReportField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// What a command or task wants to send
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Embed(ShipReport),
    Text(String),
}

fn or_unknown(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn age_text(snapshot: &ShipSnapshot, now: DateTime<Utc>) -> String {
    let age = snapshot.age(now);
    if age.num_hours() >= 1 {
        format!("{} hours old", age.num_hours())
    } else {
        format!("{} minutes old", age.num_minutes().max(0))
    }
}

impl ShipReport {
    pub fn from_snapshot(report: &Report, nickname: &str, now: DateTime<Utc>) -> Self {
        let snapshot = &report.snapshot;
        let position = &snapshot.position;

        let speed = snapshot
            .speed_knots
            .map(|s| format!("{:.1} knots", s))
            .unwrap_or_else(|| format!("{} speed", UNKNOWN));
        let course = snapshot
            .course_deg
            .map(|c| format!("{:.0}°", c))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let mut fields = vec![
            ReportField::new(
                "📍 Position",
                format!("Lat: {:.5}°\nLon: {:.5}°", position.latitude, position.longitude),
                true,
            ),
            ReportField::new("⚡ Speed & Course", format!("{}\nCourse: {}", speed, course), true),
            ReportField::new("🎯 Destination", or_unknown(&snapshot.destination), true),
            ReportField::new("📊 Status", or_unknown(&snapshot.status), true),
            ReportField::new("⏰ ETA", or_unknown(&snapshot.eta), true),
            ReportField::new(
                "🗺️ View on Map",
                format!("[Click here to view location]({})", position.maps_url()),
                false,
            ),
        ];

        if report.stale {
            fields.push(ReportField::new(
                "⚠️ Stale data",
                format!(
                    "Live data unavailable, showing the last capture ({}).",
                    age_text(snapshot, now)
                ),
                false,
            ));
        }

        let footer = match &snapshot.reported_at {
            Some(reported) => format!("Last ship update: {} · via {}", reported, snapshot.source),
            None => format!(
                "Fetched {} · via {}",
                snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
                snapshot.source
            ),
        };

        Self {
            title: "🚢 Ship Location Update".to_string(),
            description: format!("**{}** - {}", snapshot.name, nickname),
            color: REPORT_COLOR,
            fields,
            footer: Some(footer),
            timestamp: Some(snapshot.fetched_at),
        }
    }

    /// Plain-text rendering for channels where embeds are unavailable
    pub fn as_text(&self) -> String {
        let mut out = format!("{}\n{}", self.title, self.description);
        for field in &self.fields {
            out.push_str(&format!("\n{}: {}", field.name, field.value.replace('\n', ", ")));
        }
        if let Some(footer) = &self.footer {
            out.push_str(&format!("\n{}", footer));
        }
        out
    }
}

/// Reply to `status`: next update as a Discord relative timestamp
pub fn status_report(next_run: Option<DateTime<Utc>>) -> Outgoing {
    match next_run {
        Some(next) => Outgoing::Embed(ShipReport {
            title: "🤖 Bot Status".to_string(),
            description: "Ship tracking bot is running!".to_string(),
            color: STATUS_COLOR,
            fields: vec![ReportField::new(
                "⏰ Next Update",
                format!("<t:{}:R>", next.timestamp()),
                false,
            )],
            footer: None,
            timestamp: None,
        }),
        None => Outgoing::Text(NO_SCHEDULE.to_string()),
    }
}

pub fn test_result(result: &anyhow::Result<String>) -> String {
    match result {
        Ok(detail) => format!("✅ Data source connection successful! ({})", detail),
        Err(e) => format!("❌ Data source connection failed: {:#}", e),
    }
}

pub fn help_text(prefix: &str) -> String {
    let mut out = String::from("🚢 **Ship tracker commands**");
    for command in CommandType::ALL {
        out.push_str(&format!(
            "\n`{}{}` - {}",
            prefix,
            command.as_str(),
            command.description()
        ));
    }
    out
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use shipwatch_backend::config::{BackendConfig, ShipConfig, config_path, validate_mmsi};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DiscordConfigError {
    #[error("discord.token is not set (config file or DISCORD_TOKEN)")]
    MissingToken,
    #[error("discord.channel_id is not set (config file or CHANNEL_ID)")]
    MissingChannel,
    #[error("CHANNEL_ID '{0}' is not a numeric channel id")]
    InvalidChannel(String),
    #[error("discord.update_interval_hours must be greater than zero")]
    ZeroInterval,
}

/// Where the bot gets its snapshots from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Run the extraction pipeline in-process
    #[default]
    Live,
    /// Read what the capture daemon wrote
    Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub channel_id: u64,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_update_interval")]
    pub update_interval_hours: u64,

    #[serde(default)]
    pub source: SnapshotSource,

    /// Cached snapshots older than this are reported as stale
    #[serde(default = "default_max_age")]
    pub max_age_hours: i64,

    #[serde(default = "default_true")]
    pub post_on_startup: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: 0,
            prefix: default_prefix(),
            update_interval_hours: default_update_interval(),
            source: SnapshotSource::default(),
            max_age_hours: default_max_age(),
            post_on_startup: true,
            log_level: default_log_level(),
        }
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_update_interval() -> u64 {
    48
}

fn default_max_age() -> i64 {
    12
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfigs {
    #[serde(default)]
    pub ship: ShipConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub discord: DiscordConfig,
}

impl BotConfigs {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), DiscordConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Some(channel) = lookup("CHANNEL_ID") {
            self.discord.channel_id = channel
                .trim()
                .parse()
                .map_err(|_| DiscordConfigError::InvalidChannel(channel.clone()))?;
        }
        if let Some(mmsi) = lookup("SHIP_MMSI") {
            self.ship.mmsi = mmsi.trim().to_string();
        }
        if let Some(key) = lookup("MARINETRAFFIC_API_KEY") {
            self.backend.marinetraffic_api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let token = self.discord.token.trim();
        if token.is_empty() || token == "YOUR_DISCORD_BOT_TOKEN" {
            return Err(DiscordConfigError::MissingToken.into());
        }
        if self.discord.channel_id == 0 {
            return Err(DiscordConfigError::MissingChannel.into());
        }
        if self.discord.update_interval_hours == 0 {
            return Err(DiscordConfigError::ZeroInterval.into());
        }
        validate_mmsi(&self.ship.mmsi)?;
        Ok(())
    }
}

pub static CONFIG: OnceLock<BotConfigs> = OnceLock::new();

pub fn read_config() -> anyhow::Result<&'static BotConfigs> {
    dotenvy::dotenv().ok();

    let path = config_path();
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let mut config = BotConfigs::parse(&content)
        .with_context(|| format!("Invalid config file {:?}", path))?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [ship]
        mmsi = "538010457"
        nickname = "Old Faithful"

        [discord]
        token = "abc"
        channel_id = 1234
    "#;

    #[test]
    fn test_defaults() {
        let config = BotConfigs::parse(MINIMAL).unwrap();
        assert_eq!(config.discord.prefix, "!");
        assert_eq!(config.discord.update_interval_hours, 48);
        assert_eq!(config.discord.source, SnapshotSource::Live);
        assert!(config.discord.post_on_startup);
        assert_eq!(config.ship.nickname, "Old Faithful");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_source() {
        let config =
            BotConfigs::parse(&format!("{MINIMAL}\nsource = \"cache\"\nmax_age_hours = 3\n"))
                .unwrap();
        assert_eq!(config.discord.source, SnapshotSource::Cache);
        assert_eq!(config.discord.max_age_hours, 3);
    }

    #[test]
    fn test_env_overrides_secrets() {
        let mut config = BotConfigs::default();
        config
            .apply_env(|key| match key {
                "DISCORD_TOKEN" => Some("from-env".to_string()),
                "CHANNEL_ID" => Some(" 987654321 ".to_string()),
                "SHIP_MMSI" => Some("538010457\n".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.discord.token, "from-env");
        assert_eq!(config.discord.channel_id, 987654321);
        assert_eq!(config.ship.mmsi, "538010457");
        assert!(config.validate().is_ok());

        let err = config
            .apply_env(|key| (key == "CHANNEL_ID").then(|| "general".to_string()))
            .unwrap_err();
        assert_eq!(err, DiscordConfigError::InvalidChannel("general".to_string()));
    }

    #[test]
    fn test_placeholders_rejected() {
        let mut config = BotConfigs::parse(MINIMAL).unwrap();
        config.discord.token = "YOUR_DISCORD_BOT_TOKEN".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<DiscordConfigError>(),
            Some(&DiscordConfigError::MissingToken)
        );

        config.discord.token = "abc".to_string();
        config.discord.channel_id = 0;
        assert!(config.validate().is_err());
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "SHIPWATCH_CONFIG";

/// Built-in strategy names accepted in `backend.strategies`
pub const API_STRATEGY: &str = "marinetraffic-api";
pub const BROWSER_STRATEGY: &str = "browser";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("ship.mmsi is not set (config file or SHIP_MMSI)")]
    MissingMmsi,
    #[error("ship.mmsi '{0}' is not a 9-digit MMSI")]
    InvalidMmsi(String),
    #[error("unknown strategy '{0}' in backend.strategies")]
    UnknownStrategy(String),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
    #[serde(default, deserialize_with = "trimmed")]
    pub mmsi: String,

    /// Shown next to the vessel name in reports
    #[serde(default = "default_nickname")]
    pub nickname: String,
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            mmsi: String::new(),
            nickname: default_nickname(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Per-element wait timeout
    #[serde(default = "default_browser_timeout")]
    pub timeout_secs: u64,

    /// Pause after navigation and after each click, for dynamic content
    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    #[serde(default = "default_browser_url")]
    pub url_template: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_secs: default_browser_timeout(),
            settle_secs: default_settle(),
            url_template: default_browser_url(),
        }
    }
}

/// An HTML vessel page; `{mmsi}` in the template is substituted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub url_template: String,
}

impl SiteProfile {
    pub fn new(name: &str, url_template: &str) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
        }
    }

    pub fn url_for(&self, mmsi: &str) -> String {
        self.url_template.replace("{mmsi}", mmsi)
    }

    pub fn builtin() -> Vec<SiteProfile> {
        vec![
            SiteProfile::new(
                "myshiptracking",
                "https://www.myshiptracking.com/vessels/mmsi-{mmsi}",
            ),
            SiteProfile::new(
                "vesselfinder",
                "https://www.vesselfinder.com/vessels/details/{mmsi}",
            ),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    #[serde(default = "default_capture_interval")]
    pub capture_interval_hours: u64,

    #[serde(default = "default_true")]
    pub perform_initial_capture: bool,

    #[serde(default = "default_keep_snapshots")]
    pub keep_snapshots: usize,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Strategy names, tried in this order
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,

    #[serde(default)]
    pub marinetraffic_api_key: Option<String>,

    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    /// Extra HTML sites, addressable by name in `strategies`
    #[serde(default)]
    pub sites: Vec<SiteProfile>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            screenshot_dir: default_screenshot_dir(),
            capture_interval_hours: default_capture_interval(),
            perform_initial_capture: true,
            keep_snapshots: default_keep_snapshots(),
            retention_days: default_retention_days(),
            strategies: default_strategies(),
            marinetraffic_api_key: None,
            attempt_timeout_secs: default_attempt_timeout(),
            http: HttpConfig::default(),
            browser: BrowserConfig::default(),
            sites: Vec::new(),
        }
    }
}

impl BackendConfig {
    /// Built-in HTML sites followed by configured ones
    pub fn site_profiles(&self) -> Vec<SiteProfile> {
        let mut sites = SiteProfile::builtin();
        for site in &self.sites {
            sites.retain(|s| s.name != site.name);
            sites.push(site.clone());
        }
        sites
    }

    pub fn api_key(&self) -> Option<&str> {
        self.marinetraffic_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != "YOUR_MARINETRAFFIC_API_KEY")
    }
}

fn default_nickname() -> String {
    "My Best Friend Ship".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/snapshots")
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("data/screenshots")
}

fn default_capture_interval() -> u64 {
    6
}

fn default_keep_snapshots() -> usize {
    20
}

fn default_retention_days() -> i64 {
    7
}

fn default_strategies() -> Vec<String> {
    vec![
        API_STRATEGY.to_string(),
        "myshiptracking".to_string(),
        "vesselfinder".to_string(),
        BROWSER_STRATEGY.to_string(),
    ]
}

fn default_attempt_timeout() -> u64 {
    120
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_browser_timeout() -> u64 {
    20
}

fn default_settle() -> u64 {
    5
}

fn default_browser_url() -> String {
    "https://www.myshiptracking.com/?mmsi={mmsi}".to_string()
}

fn default_true() -> bool {
    true
}

/// Backend view of the shared config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ship: ShipConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// Secrets from the environment take precedence over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mmsi) = lookup("SHIP_MMSI") {
            self.ship.mmsi = mmsi.trim().to_string();
        }
        if let Some(key) = lookup("MARINETRAFFIC_API_KEY") {
            self.backend.marinetraffic_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_mmsi(&self.ship.mmsi)?;
        if self.backend.capture_interval_hours == 0 {
            return Err(ConfigError::ZeroInterval("backend.capture_interval_hours"));
        }
        let sites = self.backend.site_profiles();
        for name in &self.backend.strategies {
            let known = name == API_STRATEGY
                || name == BROWSER_STRATEGY
                || sites.iter().any(|s| &s.name == name);
            if !known {
                return Err(ConfigError::UnknownStrategy(name.clone()));
            }
        }
        Ok(())
    }
}

pub fn validate_mmsi(mmsi: &str) -> Result<(), ConfigError> {
    let mmsi = mmsi.trim();
    if mmsi.is_empty() || mmsi == "YOUR_SHIP_MMSI" {
        return Err(ConfigError::MissingMmsi);
    }
    if mmsi.len() != 9 || !mmsi.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidMmsi(mmsi.to_string()));
    }
    Ok(())
}

/// Config file path, overridable with `SHIPWATCH_CONFIG`
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load `.env`, the config file and env overrides into [`CONFIG`].
pub fn read_config() -> anyhow::Result<&'static Config> {
    dotenvy::dotenv().ok();

    let mut config = Config::from_file(&config_path())?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    Ok(CONFIG.get_or_init(|| config))
}

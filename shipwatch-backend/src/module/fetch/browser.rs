//! Headless Chrome capture of the "Get Coordinates" dialog.
//!
//! `headless_chrome` is synchronous, so the whole session runs on a blocking
//! thread and hands back the page content, the dialog text and the
//! screenshot path.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::consent::{click_by_text, dismiss_consent, is_button_label};
use super::html::fields_from_page;
use super::{Strategy, is_blocked_page};
use crate::config::{BROWSER_STRATEGY, BrowserConfig};
use crate::module::parse::RawFields;
use crate::module::parse::patterns::extract_fields;

const COORDINATES_CONTROL: &str = "button, a, span, div[onclick], [role='button']";
static COORDINATES_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bget\s+coordinates\b").expect("coordinates label pattern"));

fn is_coordinates_label(label: &str) -> bool {
    is_button_label(label) && COORDINATES_LABEL.is_match(label)
}

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined }); true";

const DIALOG_TEXT: &str = r#"(() => {
    const selectors = [".modal-dialog", ".ui-dialog", "[role='dialog']", ".swal2-popup"];
    for (const s of selectors) {
        for (const el of document.querySelectorAll(s)) {
            const text = (el.innerText || "").trim();
            if (text) return text;
        }
    }
    return "";
})()"#;

const BODY_TEXT: &str = "document.body ? document.body.innerText : ''";

/// What one browser session collected
#[derive(Debug, Default)]
pub struct BrowserCapture {
    pub html: String,
    pub dialog_text: String,
    pub body_text: String,
    pub screenshot: Option<PathBuf>,
}

pub struct BrowserStrategy {
    config: BrowserConfig,
    screenshot_dir: PathBuf,
}

impl BrowserStrategy {
    pub fn new(config: BrowserConfig, screenshot_dir: impl AsRef<Path>) -> Self {
        Self {
            config,
            screenshot_dir: screenshot_dir.as_ref().to_path_buf(),
        }
    }

    pub fn url_for(&self, mmsi: &str) -> String {
        self.config.url_template.replace("{mmsi}", mmsi)
    }
}

/// Dialog text is the most precise source, then the page body, then the DOM.
pub fn fields_from_capture(capture: &BrowserCapture) -> RawFields {
    let mut fields = RawFields::new(BROWSER_STRATEGY);
    if !capture.dialog_text.is_empty() {
        fields.extend(extract_fields(&capture.dialog_text, BROWSER_STRATEGY).pairs);
    }
    if !capture.body_text.is_empty() {
        fields.extend(extract_fields(&capture.body_text, BROWSER_STRATEGY).pairs);
    }
    if !capture.html.is_empty() {
        fields.extend(fields_from_page(&capture.html, BROWSER_STRATEGY).pairs);
    }
    fields
}

pub fn screenshot_name(mmsi: &str) -> String {
    format!("{}_{}.png", mmsi, Utc::now().format("%Y%m%d_%H%M%S"))
}

fn eval_string(tab: &Tab, script: &str) -> String {
    match tab.evaluate(script, false) {
        Ok(result) => result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        Err(e) => {
            debug!("Script evaluation failed: {}", e);
            String::new()
        }
    }
}

fn save_screenshot(tab: &Tab, dir: &Path, mmsi: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create screenshot directory: {:?}", dir))?;
    let data = tab
        .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        .context("Failed to capture screenshot")?;
    let path = dir.join(screenshot_name(mmsi));
    std::fs::write(&path, &data)
        .with_context(|| format!("Failed to write screenshot to: {:?}", path))?;
    info!("Saved screenshot to: {:?} ({} bytes)", path, data.len());
    Ok(path)
}

fn run_session(
    config: &BrowserConfig,
    url: &str,
    screenshot_dir: &Path,
    mmsi: &str,
) -> Result<BrowserCapture> {
    let settle = Duration::from_secs(config.settle_secs);

    let launch_options = LaunchOptions {
        headless: config.headless,
        sandbox: false,
        window_size: Some((1920, 1080)),
        args: vec![OsStr::new("--disable-blink-features=AutomationControlled")],
        ..Default::default()
    };

    let browser = Browser::new(launch_options).context("Failed to launch headless browser")?;
    let tab = browser.new_tab().context("Failed to create new tab")?;
    tab.set_default_timeout(Duration::from_secs(config.timeout_secs));

    info!("Navigating to: {}", url);
    tab.navigate_to(url).context("Failed to navigate to URL")?;
    tab.wait_until_navigated()
        .context("Failed to wait for page navigation")?;
    let _ = tab.evaluate(HIDE_WEBDRIVER, false);

    thread::sleep(settle);

    dismiss_consent(&tab, settle);

    match click_by_text(&tab, "body", COORDINATES_CONTROL, is_coordinates_label) {
        Some(label) => {
            info!("Clicked '{}'", label);
            thread::sleep(settle);
        }
        None => warn!("'Get Coordinates' control not found, reading page as-is"),
    }

    let dialog_text = eval_string(&tab, DIALOG_TEXT);
    let body_text = eval_string(&tab, BODY_TEXT);
    let html = tab.get_content().context("Failed to get page content")?;

    let screenshot = match save_screenshot(&tab, screenshot_dir, mmsi) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    };

    Ok(BrowserCapture {
        html,
        dialog_text,
        body_text,
        screenshot,
    })
}

#[async_trait]
impl Strategy for BrowserStrategy {
    fn name(&self) -> &str {
        BROWSER_STRATEGY
    }

    async fn fetch(&self, mmsi: &str) -> Result<RawFields> {
        let config = self.config.clone();
        let url = self.url_for(mmsi);
        let dir = self.screenshot_dir.clone();
        let mmsi_owned = mmsi.to_string();

        let capture = tokio::task::spawn_blocking(move || {
            run_session(&config, &url, &dir, &mmsi_owned)
        })
        .await
        .context("Browser task panicked")??;

        let fields = fields_from_capture(&capture);
        if fields.is_empty() {
            if is_blocked_page(&capture.html) {
                bail!("Browser was served an anti-bot page");
            }
            bail!("No vessel data found in browser capture");
        }
        debug!("Browser capture yielded {} pairs", fields.len());
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::parse::normalize;

    #[test]
    fn test_fields_prefer_dialog_text() {
        let capture = BrowserCapture {
            html: "<table><tr><td>Speed</td><td>1.0 kn</td></tr></table>".to_string(),
            dialog_text: "Vessel Name: EVER GIVEN\nSpeed: 12.3 kn\nLat: 51.95, Lon: 4.05"
                .to_string(),
            body_text: String::new(),
            screenshot: None,
        };
        let record = normalize(&fields_from_capture(&capture));
        assert_eq!(record.name.as_deref(), Some("EVER GIVEN"));
        assert_eq!(record.speed_knots, Some(12.3));
        assert_eq!(record.latitude, Some(51.95));
    }

    #[test]
    fn test_coordinates_label() {
        assert!(is_coordinates_label("Get Coordinates"));
        assert!(is_coordinates_label("  get   coordinates "));
        assert!(!is_coordinates_label("Coordinates"));
        assert!(!is_coordinates_label(
            "Sign up today to get coordinates, photos and voyage history for every vessel"
        ));
    }

    #[test]
    fn test_url_and_screenshot_name() {
        let strategy = BrowserStrategy::new(BrowserConfig::default(), "shots");
        assert_eq!(
            strategy.url_for("538010457"),
            "https://www.myshiptracking.com/?mmsi=538010457"
        );
        let name = screenshot_name("538010457");
        assert!(name.starts_with("538010457_"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    #[ignore = "needs a local Chrome and network access"]
    async fn test_live_capture() {
        let dir = tempfile::TempDir::new().unwrap();
        let strategy = BrowserStrategy::new(BrowserConfig::default(), dir.path());
        let fields = strategy.fetch("538010457").await.unwrap();
        assert!(!fields.is_empty());
    }
}

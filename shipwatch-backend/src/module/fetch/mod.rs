//! Data acquisition strategies.
//!
//! Each strategy turns an MMSI into raw label/value pairs; normalization and
//! validation happen later in the pipeline, so strategies stay dumb about
//! field semantics.

pub mod api;
pub mod browser;
pub mod consent;
pub mod html;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::module::parse::RawFields;
use crate::module::parse::html::{extract_pairs, page_text};

pub use api::ApiStrategy;
pub use browser::BrowserStrategy;
pub use html::HtmlStrategy;

/// One way of obtaining a vessel's current data
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, mmsi: &str) -> Result<RawFields>;
}

/// Shared HTTP client for the API and HTML strategies
pub fn http_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to build HTTP client")
}

/// Interstitial wording, matched against visible text only
const BLOCK_PHRASES: [&str; 6] = [
    "just a moment",
    "checking your browser",
    "verify you are human",
    "are you a robot",
    "access denied",
    "complete the captcha",
];

/// Challenge widgets that only count when the page carries no vessel data
const CHALLENGE_MARKERS: [&str; 5] = [
    "cf-browser-verification",
    "challenge-platform",
    "cf-chl-",
    "g-recaptcha",
    "px-captcha",
];

/// Whether a fetched page is an anti-bot interstitial instead of content.
///
/// A page with label/value pairs is never blocked; scripts and markup are
/// ignored for the wording check so embedded form captchas don't count.
pub fn is_blocked_page(html: &str) -> bool {
    if !extract_pairs(html).is_empty() {
        return false;
    }

    let text = page_text(html).to_lowercase();
    if BLOCK_PHRASES.iter().any(|p| text.contains(p)) {
        return true;
    }

    let lower = html.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}

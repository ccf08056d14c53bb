//! Plain HTTP scraping of vessel detail pages
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;

use super::{Strategy, is_blocked_page};
use crate::config::SiteProfile;
use crate::module::parse::RawFields;
use crate::module::parse::html::{extract_pairs, page_text};
use crate::module::parse::patterns::extract_fields;

pub struct HtmlStrategy {
    client: Client,
    site: SiteProfile,
}

impl HtmlStrategy {
    pub fn new(client: Client, site: SiteProfile) -> Self {
        Self { client, site }
    }
}

/// Structured pairs first, then regex hits over the visible text.
pub fn fields_from_page(html: &str, source: &str) -> RawFields {
    let mut fields = RawFields::new(source);
    fields.extend(extract_pairs(html));

    let text = page_text(html);
    fields.extend(extract_fields(&text, source).pairs);
    fields
}

#[async_trait]
impl Strategy for HtmlStrategy {
    fn name(&self) -> &str {
        &self.site.name
    }

    async fn fetch(&self, mmsi: &str) -> Result<RawFields> {
        let url = self.site.url_for(mmsi);
        tracing::info!("Scraping {} at {}", self.site.name, url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", self.site.name, status);
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))?;

        let fields = fields_from_page(&html, &self.site.name);
        if fields.is_empty() {
            if is_blocked_page(&html) {
                bail!("{} served an anti-bot page", self.site.name);
            }
            bail!("No vessel data found on {}", self.site.name);
        }
        tracing::debug!("{} yielded {} pairs", self.site.name, fields.len());
        Ok(fields)
    }
}

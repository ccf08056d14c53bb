//! MarineTraffic `exportvessel` JSON API
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use super::Strategy;
use crate::config::API_STRATEGY;
use crate::module::parse::RawFields;

const DEFAULT_BASE_URL: &str = "https://services.marinetraffic.com";
const EXPORT_PATH: &str = "/api/exportvessel/v:8";

pub struct ApiStrategy {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ApiStrategy {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_url(&self, mmsi: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}{}", self.base_url, EXPORT_PATH),
            &[
                ("key", self.api_key.as_str()),
                ("v", "2"),
                ("protocol", "jsono"),
                ("mmsi", mmsi),
            ],
        )
        .context("Failed to build API URL")
    }
}

/// Flatten the first vessel object of an API response into raw pairs.
fn fields_from_response(body: &Value) -> Result<RawFields> {
    if let Some(errors) = body.get("errors") {
        bail!("API returned errors: {}", errors);
    }

    let vessel = body
        .as_array()
        .ok_or_else(|| anyhow!("Unexpected API response shape"))?
        .first()
        .ok_or_else(|| anyhow!("API returned no vessel data"))?
        .as_object()
        .ok_or_else(|| anyhow!("API vessel entry is not an object"))?;

    let mut fields = RawFields::new(API_STRATEGY);
    for (key, value) in vessel {
        match value {
            Value::Null => {}
            Value::String(s) => fields.push(key, s.as_str()),
            other => fields.push(key, other.to_string()),
        }
    }
    Ok(fields)
}

#[async_trait]
impl Strategy for ApiStrategy {
    fn name(&self) -> &str {
        API_STRATEGY
    }

    async fn fetch(&self, mmsi: &str) -> Result<RawFields> {
        let url = self.request_url(mmsi)?;
        tracing::info!("Querying MarineTraffic API for MMSI {}", mmsi);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach MarineTraffic API")?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!("API error: HTTP {}", status);
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to decode API response")?;

        let fields = fields_from_response(&body)?;
        tracing::debug!("API returned {} fields", fields.len());
        Ok(fields)
    }
}

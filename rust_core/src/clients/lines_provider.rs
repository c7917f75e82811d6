//! Upstream lines provider client
//!
//! The provider serves the latest line for one sport at
//! `GET {base}/api/v1/lines/{sport}` as `{"lines":{"BASEBALL":"0.744"}}`.
//! Values arrive either as strings or as numbers.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::LineError;
use crate::models::{SportLine, SportType};

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    lines: HashMap<String, serde_json::Value>,
}

/// Decode a provider response body into lines.
pub fn parse_provider_lines(body: &str) -> Result<Vec<SportLine>, LineError> {
    let response: ProviderResponse = serde_json::from_str(body)
        .map_err(|e| LineError::internal(format!("malformed provider response: {}", e)))?;

    let mut lines = Vec::with_capacity(response.lines.len());
    for (name, value) in response.lines {
        let sport_type = name
            .parse::<SportType>()
            .map_err(|e| LineError::internal(format!("provider sent {}", e)))?;

        let score = match &value {
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            serde_json::Value::Number(n) => n.as_f64(),
            _ => None,
        }
        .ok_or_else(|| {
            LineError::internal(format!("provider sent non-numeric line for {}: {}", name, value))
        })?;

        let line = SportLine::new(sport_type, score)
            .map_err(|e| LineError::internal(format!("provider sent invalid line: {}", e)))?;
        lines.push(line);
    }
    lines.sort_by_key(|l| l.sport_type);
    Ok(lines)
}

/// HTTP client for the lines provider
#[derive(Clone)]
pub struct LinesProviderClient {
    client: Client,
    base_url: String,
}

impl LinesProviderClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("LineDistributor/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn lines_url(&self, sport_type: SportType) -> String {
        format!(
            "{}/api/v1/lines/{}",
            self.base_url,
            sport_type.as_str().to_lowercase()
        )
    }

    /// Fetch the current line(s) reported for `sport_type`
    pub async fn fetch_lines(&self, sport_type: SportType) -> Result<Vec<SportLine>> {
        let url = self.lines_url(sport_type);
        debug!("Fetching lines from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch lines for {}", sport_type))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Lines provider error: {} - {}", status, body));
        }

        let body = response
            .text()
            .await
            .context("Failed to read lines provider response")?;
        Ok(parse_provider_lines(&body)?)
    }
}

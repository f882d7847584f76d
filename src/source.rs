use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{AgentError, Result};
use crate::model::ClientReport;

/// Trait for sources that provide raw client reports
#[async_trait]
pub trait ReportSource: Send + Sync + 'static {
    /// Fetch one cycle's worth of client reports
    async fn fetch(&self) -> Result<Vec<ClientReport>>;

    /// Get the source name
    fn name(&self) -> &str;
}

/// HTTP source polling the ViaIpe monitoring API
pub struct ViaIpeSource {
    client: reqwest::Client,
    url: String,
}

impl ViaIpeSource {
    /// Build the HTTP client with the configured total request timeout.
    /// The timeout bounds the whole request; a hung fetch fails here rather
    /// than blocking the cycle forever.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ReportSource for ViaIpeSource {
    async fn fetch(&self) -> Result<Vec<ClientReport>> {
        debug!("Requesting client reports from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AgentError::Http(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        let response = response
            .error_for_status()
            .map_err(|e| AgentError::Http(format!("API returned status {}: {}", status, e)))?;

        let reports = response
            .json::<Vec<ClientReport>>()
            .await
            .map_err(|e| AgentError::Http(format!("Failed to decode API payload: {}", e)))?;

        debug!("Received {} client reports", reports.len());
        Ok(reports)
    }

    fn name(&self) -> &str {
        "viaipe_api"
    }
}

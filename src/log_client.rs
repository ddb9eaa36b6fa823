use crate::config::Config;
use crate::error::FetchError;
use crate::types::{LogBatch, LogsResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use std::time::Duration;

const LOGS_PATH: &str = "api/logs";

/// Backend read endpoint for device logs.
#[async_trait]
pub trait LogSource: Send + Sync + 'static {
    async fn fetch_logs(&self, limit: u32) -> Result<LogBatch, FetchError>;
}

/// `GET {server_url}/api/logs?limit=N` over reqwest.
pub struct HttpLogSource {
    client: reqwest::Client,
    logs_url: Url,
}

impl HttpLogSource {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            logs_url: logs_url(&config.server_url)?,
        })
    }

    pub fn logs_url(&self) -> &Url {
        &self.logs_url
    }
}

#[async_trait]
impl LogSource for HttpLogSource {
    async fn fetch_logs(&self, limit: u32) -> Result<LogBatch, FetchError> {
        debug!("GET {} limit={}", self.logs_url, limit);

        let response = self
            .client
            .get(self.logs_url.clone())
            .query(&[("limit", limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                status_code: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let logs: LogsResponse = serde_json::from_slice(&body)?;
        Ok(logs.into())
    }
}

/// Joins the endpoint path onto the base URL, keeping any path prefix.
fn logs_url(server_url: &str) -> Result<Url> {
    let mut base = Url::parse(server_url)
        .with_context(|| format!("Invalid server URL: {}", server_url))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(LOGS_PATH)
        .with_context(|| format!("Invalid server URL: {}", server_url))
}

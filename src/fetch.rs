use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde_json::Value;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The network primitive behind structured sources: GET a URL, bypassing
/// caches, and parse the body as JSON.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value>;
}

/// [`Fetch`] over a shared reqwest client with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gallery/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        // The envelope decides success, not the HTTP status; keep it for the error text only.
        let status = resp.status();
        let body = resp.bytes().await.context("reading response body")?;
        serde_json::from_slice(&body)
            .with_context(|| format!("response from {url} (HTTP {status}) is not valid JSON"))
    }
}

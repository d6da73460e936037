// ABOUTME: Remote template download behind a pluggable fetcher trait
// ABOUTME: The HTTP implementation enforces status and size limits before parsing

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::error::{Result, StoreError};

pub const DEFAULT_MAX_TEMPLATE_BYTES: usize = 1024 * 1024;

#[async_trait]
pub trait TemplateFetcher: Send + Sync {
    /// Download the raw template text at `url`
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            max_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn too_large(&self, url: &str) -> StoreError {
        StoreError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }
}

#[async_trait]
impl TemplateFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let failed = |e: reqwest::Error| StoreError::FetchFailed {
            url: url.to_string(),
            message: e.to_string(),
        };

        debug!("Fetching template from {}", url);
        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(failed)?;

        if !response.status().is_success() {
            return Err(StoreError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(self.too_large(url));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(failed)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        let text = String::from_utf8(body).map_err(|_| StoreError::InvalidSource {
            source_name: url.to_string(),
            reason: "response is not valid UTF-8".to_string(),
        })?;

        info!("Fetched template from {} ({} bytes)", url, text.len());
        Ok(text)
    }
}

/// Join a hub base URL and a relative template path
pub fn hub_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

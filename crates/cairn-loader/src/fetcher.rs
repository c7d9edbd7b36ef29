//! Fetcher backed by an HTTP client.

use async_trait::async_trait;
use cairn_core::ports::ResourceFetcher;
use cairn_core::resource::ResourceDescriptor;
use cairn_core::{Error, Result};
use tracing::debug;
use url::Url;

/// Fetches `http`, `https` and `file` locators.
///
/// One call is one attempt. Timeouts and retries are applied by the loader.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn parse(locator: &str) -> Result<Url> {
        Url::parse(locator).map_err(|e| Error::InvalidLocator(format!("{}: {}", locator, e)))
    }

    async fn fetch_file(url: &Url) -> Result<Vec<u8>> {
        let path = url
            .to_file_path()
            .map_err(|_| Error::InvalidLocator(url.to_string()))?;
        Ok(tokio::fs::read(path).await?)
    }

    async fn fetch_http(&self, url: Url) -> Result<Vec<u8>> {
        let locator = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::FetchStatus {
                locator,
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(body.to_vec())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<Vec<u8>> {
        let url = Self::parse(&descriptor.locator)?;
        debug!(id = %descriptor.id, locator = %url, "Fetching resource");

        match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => Self::fetch_file(&url).await,
            other => Err(Error::InvalidLocator(format!(
                "unsupported scheme '{}' in {}",
                other, descriptor.locator
            ))),
        }
    }
}

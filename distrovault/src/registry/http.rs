//! HTTP registry client.

use std::time::Duration;

use tracing::debug;

use crate::error::{VaultError, VaultResult};

use super::{RegistryClient, RemoteDistro};

/// Timeout for the whole registry index request. The index is a small
/// JSON document, so a flat request timeout is enough here.
const REGISTRY_TIMEOUT_SECS: u64 = 30;

/// Fetches the distribution index as JSON from a configured URL.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    url: String,
}

impl HttpRegistryClient {
    /// Create a client for the given index URL.
    pub fn new(url: impl Into<String>) -> VaultResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REGISTRY_TIMEOUT_SECS))
            .build()
            .map_err(|e| VaultError::Registry(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn fetch(&self) -> VaultResult<Vec<RemoteDistro>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| VaultError::Registry(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaultError::Registry(format!(
                "HTTP {status} from {}",
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| VaultError::Registry(format!("failed to read index body: {e}")))?;

        let records: Vec<RemoteDistro> = serde_json::from_slice(&body)
            .map_err(|e| VaultError::Registry(format!("malformed index from {}: {e}", self.url)))?;

        debug!(count = records.len(), url = %self.url, "registry index fetched");
        Ok(records)
    }
}

// The trait uses `impl Future<>` in its signature; the implementation must
// match it rather than use async fn sugar.
#[allow(clippy::manual_async_fn)]
impl RegistryClient for HttpRegistryClient {
    fn fetch_available(
        &self,
    ) -> impl std::future::Future<Output = VaultResult<Vec<RemoteDistro>>> + Send {
        async move { self.fetch().await }
    }
}

//! Configuration for the distribution vault.
//!
//! `VaultConfig` combines everything needed to construct a [`DistroVault`]:
//! where catalog and archives live on disk, where the remote registry is,
//! and the network/staleness tunables.
//!
//! [`DistroVault`]: crate::vault::DistroVault

use std::path::PathBuf;
use std::time::Duration;

/// Default registry index location.
pub const DEFAULT_REGISTRY_URL: &str =
    "https://registry.distrovault.dev/v2/distributions.json";

/// Default catalog staleness window (24 hours).
///
/// The reconciler only contacts the registry when the persisted catalog's
/// `updatedAt` is older than this, or when a refresh is forced.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default stall window for downloads (60 seconds).
///
/// Measured as "no chunk received", not total elapsed time, so a slow but
/// steady transfer is never penalized.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Default redirect hop limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Configuration for a [`DistroVault`].
///
/// [`DistroVault`]: crate::vault::DistroVault
#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Root directory for the catalog file and downloaded archives.
    pub data_dir: PathBuf,

    /// URL of the remote registry index.
    pub registry_url: String,

    /// How long the persisted catalog stays fresh.
    pub refresh_interval: Duration,

    /// Stall window for a single download.
    pub fetch_timeout: Duration,

    /// Maximum redirect hops a fetch will follow.
    pub max_redirects: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("distrovault");

        Self {
            data_dir,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl VaultConfig {
    /// Override the data directory (builder pattern).
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Override the registry URL (builder pattern).
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    /// Override the staleness window (builder pattern).
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Override the download stall window (builder pattern).
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();

        assert!(config.data_dir.ends_with("distrovault"));
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(
            config.refresh_interval,
            Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)
        );
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
    }

    #[test]
    fn test_builder_overrides() {
        let config = VaultConfig::default()
            .with_data_dir("/tmp/vault-test")
            .with_registry_url("http://localhost:9000/index.json")
            .with_refresh_interval(Duration::from_secs(5))
            .with_fetch_timeout(Duration::from_millis(250));

        assert_eq!(config.data_dir, PathBuf::from("/tmp/vault-test"));
        assert_eq!(config.registry_url, "http://localhost:9000/index.json");
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
    }
}

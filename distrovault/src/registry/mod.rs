//! Remote distribution registry.
//!
//! The registry is the remote source of truth for which distributions
//! exist and where their archives live. It is consumed through the
//! [`RegistryClient`] trait so the reconciler can be driven by the real
//! HTTP client or by a fixture in tests.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::catalog::Architecture;
use crate::error::VaultResult;

mod http;

pub use http::HttpRegistryClient;

/// One publishable distribution as described by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDistro {
    /// Registry identifier. May contain spaces and mixed case; the
    /// reconciler normalizes it into the catalog key.
    pub name: String,

    /// Human-readable name.
    pub friendly_name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Version label.
    #[serde(default = "crate::catalog::default_version_label")]
    pub version: String,

    /// Archive URL for x64 hosts.
    #[serde(default)]
    pub amd64_url: Option<String>,

    /// Archive URL for arm64 hosts.
    #[serde(default)]
    pub arm64_url: Option<String>,

    /// Labels to carry into the catalog entry.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RemoteDistro {
    /// The archive URL for the given architecture, if published.
    pub fn url_for(&self, arch: Architecture) -> Option<&str> {
        match arch {
            Architecture::X64 => self.amd64_url.as_deref(),
            Architecture::Arm64 => self.arm64_url.as_deref(),
        }
    }
}

/// Source of the current remote distribution list.
///
/// A failed fetch surfaces as [`VaultError::Registry`]; the reconciler
/// treats that as "continue with the existing catalog" and never lets it
/// propagate as fatal.
///
/// [`VaultError::Registry`]: crate::error::VaultError::Registry
pub trait RegistryClient: Send + Sync {
    /// Fetch the currently publishable distributions.
    fn fetch_available(&self) -> impl Future<Output = VaultResult<Vec<RemoteDistro>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_architecture() {
        let record = RemoteDistro {
            name: "Ubuntu".to_string(),
            friendly_name: "Ubuntu".to_string(),
            description: String::new(),
            version: "latest".to_string(),
            amd64_url: Some("https://host/amd64".to_string()),
            arm64_url: None,
            tags: Vec::new(),
        };

        assert_eq!(record.url_for(Architecture::X64), Some("https://host/amd64"));
        assert_eq!(record.url_for(Architecture::Arm64), None);
    }

    #[test]
    fn test_remote_distro_deserializes_minimal_record() {
        let json = r#"{"name": "Alpine", "friendlyName": "Alpine Linux"}"#;
        let record: RemoteDistro = serde_json::from_str(json).unwrap();

        assert_eq!(record.name, "Alpine");
        assert_eq!(record.version, "latest");
        assert!(record.amd64_url.is_none());
        assert!(record.tags.is_empty());
    }
}

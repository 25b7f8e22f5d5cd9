//! Catalog data model.
//!
//! [`DistroEntry`] is one catalog record; [`Catalog`] is the sole persisted
//! artifact, a single JSON document of all known distributions and their
//! local acquisition state.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Catalog file format version.
pub const FORMAT_VERSION: &str = "2.0.0";

/// CPU architecture a distribution archive targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X64,
    Arm64,
}

impl Architecture {
    /// Detect the architecture of the running host.
    ///
    /// Unknown architectures fall back to `X64`, the most widely published
    /// archive flavor.
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Self::Arm64,
            _ => Self::X64,
        }
    }

    /// Name tags used to recognize this architecture in container entry
    /// names (e.g. `Distro_1.0_x64.appx`).
    pub fn name_tags(&self) -> &'static [&'static str] {
        match self {
            Self::X64 => &["x64", "x86_64", "amd64"],
            Self::Arm64 => &["arm64", "aarch64"],
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X64 => write!(f, "x64"),
            Self::Arm64 => write!(f, "arm64"),
        }
    }
}

/// One catalog record.
///
/// Remote metadata (`display_name`, `description`, `version`) is refreshed
/// on every reconciliation; local acquisition state (`available`,
/// `file_path`, `size`, `sha256`, `added`) is only written by downloads,
/// imports and availability re-verification.
///
/// Invariant: `available == true` implies `file_path` is set and the file
/// exists on disk. Reconciliation re-verifies and corrects this in both
/// directions on every pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistroEntry {
    /// Stable lowercase identifier, unique within the catalog.
    pub name: String,

    /// Human-readable name, as published by the registry.
    pub display_name: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Version label. Registries commonly publish `"latest"`.
    #[serde(default = "default_version")]
    pub version: String,

    /// Architecture the archive targets.
    pub architecture: Architecture,

    /// Remote archive location. Absent for purely local entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Free-form labels (`"microsoft"`, `"imported"`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// True iff the archive currently exists on local storage.
    #[serde(default)]
    pub available: bool,

    /// Local archive path when `available` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Byte length of the local archive, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Hex SHA-256 digest of the local archive, once computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Timestamp of first local acquisition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<DateTime<Utc>>,
}

pub(crate) fn default_version() -> String {
    "latest".to_string()
}

impl DistroEntry {
    /// Create a minimal entry with no local state.
    ///
    /// The name is normalized (lowercase, spaces to hyphens).
    pub fn new(name: impl AsRef<str>, display_name: impl Into<String>, arch: Architecture) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            display_name: display_name.into(),
            description: String::new(),
            version: default_version(),
            architecture: arch,
            source_url: None,
            tags: Vec::new(),
            available: false,
            file_path: None,
            size: None,
            sha256: None,
            added: None,
        }
    }

    /// Copy local acquisition state forward from a previous incarnation of
    /// this entry. Remote metadata never overwrites what was downloaded.
    pub fn inherit_local_state(&mut self, previous: &DistroEntry) {
        self.available = previous.available;
        self.file_path = previous.file_path.clone();
        self.size = previous.size;
        self.sha256 = previous.sha256.clone();
        self.added = previous.added;
    }
}

impl fmt::Display for DistroEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.version, self.architecture)
    }
}

/// The persisted catalog: format version, refresh timestamp, entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub format_version: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<DistroEntry>,
}

impl Catalog {
    /// An empty catalog, stale by construction so the first listing
    /// triggers a registry refresh.
    pub fn empty() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: DateTime::UNIX_EPOCH,
            entries: Vec::new(),
        }
    }

    /// Whether the catalog is older than the given staleness window.
    pub fn is_stale(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        let interval = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX);
        now - self.updated_at > interval
    }

    /// Look up an entry by identity.
    ///
    /// Identity is a case-insensitive match on `name`, falling back to
    /// `display_name`, so a registry rename does not spuriously create a
    /// duplicate while local state is preserved.
    pub fn find(&self, key: &str) -> Option<&DistroEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(key))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.display_name.eq_ignore_ascii_case(key))
            })
    }

    /// Mutable variant of [`find`](Self::find), same fallback order.
    pub fn find_mut(&mut self, key: &str) -> Option<&mut DistroEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(key))
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|e| e.display_name.eq_ignore_ascii_case(key))
            })?;
        self.entries.get_mut(idx)
    }
}

/// Normalize a registry-published name into a stable identifier.
///
/// # Examples
///
/// ```
/// use distrovault::catalog::normalize_name;
///
/// assert_eq!(normalize_name("Ubuntu 24.04"), "ubuntu-24.04");
/// assert_eq!(normalize_name("  Debian  "), "debian");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

/// Reduce a name to filesystem-safe characters (`[A-Za-z0-9_-]`).
///
/// Anything else, including path separators and dots, is stripped, which
/// blocks traversal through crafted names. Names with no valid characters
/// at all are rejected before any I/O happens.
///
/// # Examples
///
/// ```
/// use distrovault::catalog::sanitize_name;
///
/// assert_eq!(sanitize_name("ubuntu-24.04").unwrap(), "ubuntu-2404");
/// assert_eq!(sanitize_name("../../etc/passwd").unwrap(), "etcpasswd");
/// assert!(sanitize_name("..").is_err());
/// ```
pub fn sanitize_name(name: &str) -> VaultResult<String> {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if sanitized.is_empty() {
        return Err(VaultError::InvalidName {
            name: name.to_string(),
            reason: "no filesystem-safe characters".to_string(),
        });
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, display: &str) -> DistroEntry {
        DistroEntry::new(name, display, Architecture::X64)
    }

    #[test]
    fn test_architecture_current_is_known() {
        let arch = Architecture::current();
        assert!(matches!(arch, Architecture::X64 | Architecture::Arm64));
    }

    #[test]
    fn test_architecture_display() {
        assert_eq!(Architecture::X64.to_string(), "x64");
        assert_eq!(Architecture::Arm64.to_string(), "arm64");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Ubuntu 24.04"), "ubuntu-24.04");
        assert_eq!(normalize_name("ALPINE"), "alpine");
        assert_eq!(normalize_name(" two  words "), "two--words");
    }

    #[test]
    fn test_sanitize_name_strips_traversal() {
        assert_eq!(sanitize_name("ubuntu-24.04").unwrap(), "ubuntu-2404");
        assert_eq!(sanitize_name("a/b\\c").unwrap(), "abc");
        assert!(matches!(
            sanitize_name(".."),
            Err(VaultError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_entry_new_normalizes_name() {
        let e = DistroEntry::new("Ubuntu 24.04", "Ubuntu 24.04 LTS", Architecture::X64);
        assert_eq!(e.name, "ubuntu-24.04");
        assert_eq!(e.display_name, "Ubuntu 24.04 LTS");
        assert!(!e.available);
    }

    #[test]
    fn test_inherit_local_state() {
        let mut fresh = entry("debian-12", "Debian 12");
        fresh.description = "new description".to_string();

        let mut previous = entry("debian-12", "Debian");
        previous.available = true;
        previous.file_path = Some(PathBuf::from("/data/debian-12.tar.gz"));
        previous.size = Some(42);
        previous.sha256 = Some("cafe".to_string());
        previous.added = Some(Utc::now());

        fresh.inherit_local_state(&previous);

        assert!(fresh.available);
        assert_eq!(fresh.file_path, Some(PathBuf::from("/data/debian-12.tar.gz")));
        assert_eq!(fresh.size, Some(42));
        assert_eq!(fresh.sha256, Some("cafe".to_string()));
        assert_eq!(fresh.description, "new description");
    }

    #[test]
    fn test_catalog_find_prefers_name_over_display_name() {
        let mut a = entry("alpine", "Alpine Linux");
        a.description = "by name".to_string();
        let mut b = entry("other", "alpine");
        b.description = "by display".to_string();

        let catalog = Catalog {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: vec![b, a],
        };

        let found = catalog.find("Alpine").expect("entry");
        assert_eq!(found.description, "by name");
    }

    #[test]
    fn test_catalog_find_falls_back_to_display_name() {
        let catalog = Catalog {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: vec![entry("fedora-40", "Fedora Workstation 40")],
        };

        assert!(catalog.find("fedora workstation 40").is_some());
        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn test_empty_catalog_is_stale() {
        let catalog = Catalog::empty();
        assert!(catalog.is_stale(Duration::from_secs(3600), Utc::now()));
    }

    #[test]
    fn test_fresh_catalog_is_not_stale() {
        let mut catalog = Catalog::empty();
        catalog.updated_at = Utc::now();
        assert!(!catalog.is_stale(Duration::from_secs(3600), Utc::now()));
    }

    #[test]
    fn test_entry_serde_shape_is_camel_case() {
        let mut e = entry("ubuntu-24.04", "Ubuntu 24.04 LTS");
        e.source_url = Some("https://host/ubuntu.tar.gz".to_string());
        e.available = true;
        e.file_path = Some(PathBuf::from("/data/ubuntu-2404.tar.gz"));

        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"displayName\""));
        assert!(json.contains("\"sourceUrl\""));
        assert!(json.contains("\"filePath\""));
        assert!(json.contains("\"architecture\":\"x64\""));
        // Unset optionals are omitted entirely.
        assert!(!json.contains("sha256"));
    }

    #[test]
    fn test_entry_deserializes_with_missing_optionals() {
        let json = r#"{
            "name": "alpine",
            "displayName": "Alpine Linux",
            "architecture": "arm64"
        }"#;

        let e: DistroEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.name, "alpine");
        assert_eq!(e.architecture, Architecture::Arm64);
        assert_eq!(e.version, "latest");
        assert!(!e.available);
        assert!(e.file_path.is_none());
    }
}

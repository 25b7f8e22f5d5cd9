//! Durable catalog persistence.
//!
//! The catalog is one JSON file under the vault's data directory. Loading
//! never fails: a missing or corrupt file yields an empty catalog, because
//! a broken catalog must not brick distribution listing. Saving is atomic
//! (write to a temp file, then rename) so a crash mid-write cannot leave a
//! half-written catalog behind.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{VaultError, VaultResult};

use super::entry::{sanitize_name, Catalog};

/// Filename of the persisted catalog within the data directory.
const CATALOG_FILENAME: &str = "catalog.json";

/// Subdirectory of the data directory holding downloaded archives.
const ARCHIVE_DIRNAME: &str = "archives";

/// Owns load/save of the catalog file and the archive path layout.
///
/// All catalog mutation in the crate goes through this store's
/// load-merge-save cycle; nothing else touches the file.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    catalog_path: PathBuf,
    archive_dir: PathBuf,
}

impl CatalogStore {
    /// Create a store rooted at the given data directory.
    ///
    /// No directories are created until something is saved.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            catalog_path: data_dir.join(CATALOG_FILENAME),
            archive_dir: data_dir.join(ARCHIVE_DIRNAME),
        }
    }

    /// Path of the persisted catalog file.
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Directory downloaded archives are stored in.
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Canonical local path for a distribution's archive.
    ///
    /// The name is reduced to `[A-Za-z0-9_-]` first, which blocks path
    /// traversal through crafted names.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidName`] when nothing of the name survives
    /// sanitization. Raised before any I/O is attempted.
    pub fn entry_path(&self, name: &str) -> VaultResult<PathBuf> {
        let sanitized = sanitize_name(name)?;
        Ok(self.archive_dir.join(format!("{sanitized}.tar.gz")))
    }

    /// Staging path used while a download for `name` is in flight.
    pub fn staging_path(&self, name: &str) -> VaultResult<PathBuf> {
        let sanitized = sanitize_name(name)?;
        Ok(self.archive_dir.join(format!("{sanitized}.download")))
    }

    /// Create the data and archive directories if they are missing.
    pub async fn ensure_dirs(&self) -> VaultResult<()> {
        tokio::fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|e| VaultError::io(&self.archive_dir, e))
    }

    /// Load the catalog.
    ///
    /// A missing file is normal (first run) and yields an empty catalog.
    /// A malformed file is recovered the same way, with a warning; the
    /// parse error is never propagated.
    pub async fn load(&self) -> Catalog {
        let raw = match tokio::fs::read(&self.catalog_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.catalog_path.display(), "no catalog file yet");
                return Catalog::empty();
            }
            Err(e) => {
                warn!(
                    path = %self.catalog_path.display(),
                    error = %e,
                    "failed to read catalog, starting empty"
                );
                return Catalog::empty();
            }
        };

        match serde_json::from_slice::<Catalog>(&raw) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(
                    path = %self.catalog_path.display(),
                    error = %e,
                    "catalog file is corrupt, starting empty"
                );
                Catalog::empty()
            }
        }
    }

    /// Persist the catalog atomically.
    ///
    /// Writes to a sibling temp file and renames it over the catalog, so
    /// readers only ever see a complete document.
    pub async fn save(&self, catalog: &Catalog) -> VaultResult<()> {
        if let Some(parent) = self.catalog_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VaultError::io(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(catalog).map_err(|e| {
            VaultError::io(
                &self.catalog_path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;

        let tmp_path = self.catalog_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| VaultError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &self.catalog_path)
            .await
            .map_err(|e| VaultError::io(&self.catalog_path, e))?;

        debug!(
            path = %self.catalog_path.display(),
            entries = catalog.entries.len(),
            "catalog saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entry::{Architecture, DistroEntry};
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> CatalogStore {
        CatalogStore::new(temp.path().join("vault"))
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let catalog = store.load().await;
        assert!(catalog.entries.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_returns_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        std::fs::create_dir_all(store.catalog_path().parent().unwrap()).unwrap();
        std::fs::write(store.catalog_path(), b"{not json at all\x00\xff").unwrap();

        let catalog = store.load().await;
        assert!(catalog.entries.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let mut catalog = Catalog::empty();
        catalog.updated_at = chrono::Utc::now();
        catalog
            .entries
            .push(DistroEntry::new("alpine", "Alpine Linux", Architecture::X64));

        store.save(&catalog).await.unwrap();
        let loaded = store.load().await;

        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].name, "alpine");
        assert_eq!(loaded.format_version, "2.0.0");
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.save(&Catalog::empty()).await.unwrap();

        assert!(store.catalog_path().exists());
        assert!(!store.catalog_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_entry_path_is_confined_to_archive_dir() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let path = store.entry_path("../../etc/passwd").unwrap();
        assert!(path.starts_with(store.archive_dir()));
        assert_eq!(path.file_name().unwrap(), "etcpasswd.tar.gz");
    }

    #[test]
    fn test_entry_path_rejects_unusable_names() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        assert!(matches!(
            store.entry_path(".."),
            Err(VaultError::InvalidName { .. })
        ));
        assert!(matches!(
            store.entry_path(""),
            Err(VaultError::InvalidName { .. })
        ));
    }
}

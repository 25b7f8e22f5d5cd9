//! The distribution vault facade.
//!
//! `DistroVault` wires the catalog store, reconciler, registry client,
//! fetcher and extractor together behind the operations the instance
//! layer consumes: list, download, remove, import, entry path. All
//! catalog mutation goes through the store's load-merge-save cycle under
//! the cooperative guards.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::catalog::{normalize_name, reconcile, Architecture, CatalogStore, DistroEntry};
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::extract::PayloadExtractor;
use crate::fetch::{file_sha256, FetchOptions, HttpFetcher, ProgressCallback};
use crate::guard::OperationGuards;
use crate::registry::RegistryClient;

/// Catalog and acquisition of distribution archives.
///
/// The registry client is injected as a type parameter so tests can drive
/// the vault with fixture registries.
pub struct DistroVault<C: RegistryClient> {
    config: VaultConfig,
    store: CatalogStore,
    registry: C,
    fetcher: HttpFetcher,
    extractor: PayloadExtractor,
    guards: OperationGuards,
    arch: Architecture,
}

impl<C: RegistryClient> DistroVault<C> {
    /// Create a vault over the given configuration and registry client.
    ///
    /// Nothing is read or created on disk until the first operation.
    pub fn new(config: VaultConfig, registry: C) -> Self {
        let store = CatalogStore::new(config.data_dir.clone());
        Self {
            config,
            store,
            registry,
            fetcher: HttpFetcher::new(),
            extractor: PayloadExtractor::new(),
            guards: OperationGuards::new(),
            arch: Architecture::current(),
        }
    }

    /// The catalog store backing this vault.
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// The cooperative operation guards.
    pub fn guards(&self) -> &OperationGuards {
        &self.guards
    }

    /// Architecture used to pick registry URLs and bundle packages.
    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    /// List all catalog entries, refreshing from the registry first when
    /// the catalog has gone stale.
    ///
    /// Registry downtime and a skipped refresh both degrade to "return
    /// what we have"; only a failure to persist surfaces as an error.
    pub async fn list_entries(&self) -> VaultResult<Vec<DistroEntry>> {
        self.refresh(false).await?;
        Ok(self.store.load().await.entries)
    }

    /// Run a reconciliation pass against the registry.
    ///
    /// Returns `true` when a pass ran and the catalog was persisted.
    /// The pass is skipped (`false`) when a download is in progress, when
    /// the catalog is still fresh and `force` is not set, or when the
    /// registry is unavailable. A skipped pass is not queued or retried;
    /// the existing catalog stays authoritative, byte for byte.
    pub async fn refresh(&self, force: bool) -> VaultResult<bool> {
        let Some(_token) = self.guards.try_refresh() else {
            debug!("refresh skipped, conflicting operation in progress");
            return Ok(false);
        };

        let previous = self.store.load().await;
        if !force && !previous.is_stale(self.config.refresh_interval, Utc::now()) {
            return Ok(false);
        }

        let remote = match self.registry.fetch_available().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "registry unavailable, keeping existing catalog");
                return Ok(false);
            }
        };

        let merged = reconcile(&previous, &remote, &self.store, self.arch, Utc::now());
        self.store.save(&merged).await?;
        info!(entries = merged.entries.len(), "catalog refreshed");
        Ok(true)
    }

    /// Download a distribution's archive and record it in the catalog.
    ///
    /// The container is fetched to a staging path, its payload extracted
    /// to the entry's canonical archive path, and the catalog updated
    /// with `available`, `file_path`, `size`, `sha256` and `added`.
    ///
    /// Already-downloaded entries whose archive still matches their
    /// recorded digest are a no-op.
    ///
    /// # Errors
    ///
    /// [`VaultError::Busy`] when a refresh (or another download) holds
    /// its guard; the fetcher's network, status, timeout, checksum and
    /// extraction errors otherwise.
    pub async fn download(
        &self,
        name: &str,
        progress: Option<ProgressCallback>,
    ) -> VaultResult<DistroEntry> {
        let Some(_token) = self.guards.try_download() else {
            let operation = if self.guards.refresh_held() {
                "refresh"
            } else {
                "download"
            };
            return Err(VaultError::Busy { operation });
        };

        let key = normalize_name(name);
        let catalog = self.store.load().await;
        let entry = catalog
            .find(&key)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(key.clone()))?;

        let target = self.store.entry_path(&entry.name)?;
        let recorded = entry.file_path.clone().unwrap_or_else(|| target.clone());

        if entry.available {
            if let Some(expected) = entry.sha256.as_deref() {
                if recorded.is_file() && file_sha256(&recorded).await? == expected {
                    debug!(name = %entry.name, "archive already present and verified");
                    return Ok(entry);
                }
            }
        }

        let url = entry.source_url.clone().ok_or_else(|| VaultError::NoSource {
            name: entry.name.clone(),
        })?;

        self.store.ensure_dirs().await?;
        let staging = self.store.staging_path(&entry.name)?;

        let options = FetchOptions {
            progress,
            timeout: self.config.fetch_timeout,
            max_redirects: self.config.max_redirects,
            ..FetchOptions::default()
        };

        let outcome = match self.fetcher.fetch(&url, &staging, &options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Timeout and checksum failures already cleaned up after
                // themselves; cover the remaining exits.
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e);
            }
        };
        debug!(name = %entry.name, bytes = outcome.bytes, "container downloaded");

        let extracted = self
            .extractor
            .extract_payload(&staging, &url, &target, self.arch)
            .await;
        let _ = tokio::fs::remove_file(&staging).await;
        let payload = extracted?.ok_or_else(|| VaultError::Extraction {
            path: target.clone(),
            reason: "no filesystem archive found inside the container".to_string(),
        })?;

        let size = tokio::fs::metadata(&payload)
            .await
            .map_err(|e| VaultError::io(&payload, e))?
            .len();
        let sha256 = file_sha256(&payload).await?;

        // The fetch took a while; reload before mutating.
        let mut catalog = self.store.load().await;
        let updated = match catalog.find_mut(&entry.name) {
            Some(existing) => {
                existing.available = true;
                existing.file_path = Some(payload.clone());
                existing.size = Some(size);
                existing.sha256 = Some(sha256);
                if existing.added.is_none() {
                    existing.added = Some(Utc::now());
                }
                existing.clone()
            }
            None => {
                // The entry vanished from the catalog mid-download;
                // re-add it rather than orphan the archive.
                let mut fresh = entry.clone();
                fresh.available = true;
                fresh.file_path = Some(payload.clone());
                fresh.size = Some(size);
                fresh.sha256 = Some(sha256);
                fresh.added = Some(Utc::now());
                catalog.entries.push(fresh.clone());
                fresh
            }
        };
        self.store.save(&catalog).await?;

        info!(name = %updated.name, size, "distribution downloaded");
        Ok(updated)
    }

    /// Delete a distribution's archive and catalog record.
    ///
    /// Returns `false` when no such entry exists. The backing file is
    /// removed first; if that fails the catalog is left untouched.
    pub async fn remove(&self, name: &str) -> VaultResult<bool> {
        let Some(_token) = self.guards.try_download() else {
            return Err(VaultError::Busy {
                operation: "refresh or download",
            });
        };

        let key = normalize_name(name);
        let mut catalog = self.store.load().await;
        let Some(idx) = catalog
            .entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(&key))
        else {
            return Ok(false);
        };

        let entry = catalog.entries.remove(idx);
        let path = entry
            .file_path
            .clone()
            .or_else(|| self.store.entry_path(&entry.name).ok());
        if let Some(path) = path {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(name = %entry.name, path = %path.display(), "archive deleted"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(VaultError::io(path, e)),
            }
        }

        self.store.save(&catalog).await?;
        info!(name = %entry.name, "distribution removed");
        Ok(true)
    }

    /// Local archive path of an available distribution.
    ///
    /// Absent when the entry is unknown or its archive is not on disk.
    pub async fn entry_path(&self, name: &str) -> Option<PathBuf> {
        let catalog = self.store.load().await;
        let entry = catalog.find(&normalize_name(name))?;
        if entry.available {
            entry.file_path.clone()
        } else {
            None
        }
    }

    /// Register an archive that already exists on disk as a catalog
    /// entry.
    ///
    /// The entry is tagged `imported`, marked available, and keeps
    /// pointing at the given path; the file is not copied.
    pub async fn import_local(
        &self,
        name: &str,
        display_name: &str,
        archive: &Path,
    ) -> VaultResult<DistroEntry> {
        let Some(_token) = self.guards.try_download() else {
            return Err(VaultError::Busy {
                operation: "refresh or download",
            });
        };

        let key = normalize_name(name);
        // Validates the name before any I/O.
        self.store.entry_path(&key)?;

        let meta = tokio::fs::metadata(archive)
            .await
            .map_err(|e| VaultError::io(archive, e))?;
        if !meta.is_file() {
            return Err(VaultError::io(
                archive,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let sha256 = file_sha256(archive).await?;

        let mut entry = DistroEntry::new(&key, display_name, self.arch);
        entry.tags = vec!["imported".to_string()];
        entry.available = true;
        entry.file_path = Some(archive.to_path_buf());
        entry.size = Some(meta.len());
        entry.sha256 = Some(sha256);
        entry.added = Some(Utc::now());

        let mut catalog = self.store.load().await;
        match catalog.find_mut(&key) {
            Some(existing) => *existing = entry.clone(),
            None => catalog.entries.push(entry.clone()),
        }
        self.store.save(&catalog).await?;

        info!(name = %entry.name, "local archive imported");
        Ok(entry)
    }
}

//! Catalog reconciliation.
//!
//! Produces an updated catalog from three inputs: the previous catalog,
//! the remote registry's current records, and the local filesystem. Remote
//! metadata is refreshed, local acquisition state is carried forward, and
//! the `available` invariant is re-verified against the disk in both
//! directions.
//!
//! These are pure functions over their inputs (plus `stat` calls); the
//! caller owns loading, guarding and saving.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::catalog::entry::{Architecture, Catalog, DistroEntry, FORMAT_VERSION};
use crate::catalog::store::CatalogStore;
use crate::registry::RemoteDistro;

/// Full reconciliation pass: merge remote records, then re-verify
/// availability against the filesystem.
///
/// The caller persists the result; nothing is written here. When the
/// registry fetch itself failed, this is never reached and the previous
/// catalog stays authoritative.
pub fn reconcile(
    previous: &Catalog,
    remote: &[RemoteDistro],
    store: &CatalogStore,
    arch: Architecture,
    now: DateTime<Utc>,
) -> Catalog {
    let mut merged = merge_remote(previous, remote, arch, now);
    verify_availability(&mut merged, store);
    merged
}

/// Merge remote registry records with the previous catalog.
///
/// For each remote record a candidate entry is derived (normalized name,
/// architecture-matched source URL). A matching previous entry, found by
/// case-insensitive name and then display name, donates its local
/// acquisition state. Previous entries that are locally available but no
/// longer published survive unchanged; unavailable unpublished entries are
/// dropped.
pub fn merge_remote(
    previous: &Catalog,
    remote: &[RemoteDistro],
    arch: Architecture,
    now: DateTime<Utc>,
) -> Catalog {
    let mut entries: Vec<DistroEntry> = Vec::with_capacity(remote.len());

    for record in remote {
        let mut entry = DistroEntry::new(&record.name, record.friendly_name.clone(), arch);
        entry.description = record.description.clone();
        entry.version = record.version.clone();
        entry.source_url = record.url_for(arch).map(str::to_string);
        entry.tags = record.tags.clone();

        if entries.iter().any(|e| e.name == entry.name) {
            warn!(name = %entry.name, "duplicate registry record ignored");
            continue;
        }

        if let Some(prev) = previous
            .find(&entry.name)
            .or_else(|| previous.find(&entry.display_name))
        {
            entry.inherit_local_state(prev);
        }

        entries.push(entry);
    }

    // Locally acquired entries survive registry churn.
    for prev in &previous.entries {
        let published = entries.iter().any(|e| {
            e.name.eq_ignore_ascii_case(&prev.name)
                || e.display_name.eq_ignore_ascii_case(&prev.display_name)
        });
        if !published && prev.available {
            debug!(name = %prev.name, "retaining local-only entry");
            entries.push(prev.clone());
        }
    }

    Catalog {
        format_version: FORMAT_VERSION.to_string(),
        updated_at: now,
        entries,
    }
}

/// Re-verify the `available` invariant for every entry.
///
/// An entry whose archive exists on disk is forced available (filling in
/// `file_path` and `size` when missing); an entry claiming availability
/// whose file vanished out-of-band is flipped back to unavailable.
pub fn verify_availability(catalog: &mut Catalog, store: &CatalogStore) {
    for entry in &mut catalog.entries {
        match locate_archive(entry, store) {
            Some((path, size)) => {
                entry.available = true;
                entry.file_path = Some(path);
                if entry.size.is_none() {
                    entry.size = Some(size);
                }
            }
            None => {
                if entry.available {
                    warn!(name = %entry.name, "archive vanished, marking unavailable");
                }
                entry.available = false;
                entry.file_path = None;
            }
        }
    }
}

/// Find the archive backing an entry, trying the recorded path first and
/// the canonical store path second.
fn locate_archive(entry: &DistroEntry, store: &CatalogStore) -> Option<(PathBuf, u64)> {
    let mut candidates = Vec::new();
    if let Some(recorded) = &entry.file_path {
        candidates.push(recorded.clone());
    }
    if let Ok(canonical) = store.entry_path(&entry.name) {
        if entry.file_path.as_deref() != Some(canonical.as_path()) {
            candidates.push(canonical);
        }
    }

    for path in candidates {
        if let Ok(meta) = std::fs::metadata(&path) {
            if meta.is_file() {
                return Some((path, meta.len()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn remote(name: &str, friendly: &str) -> RemoteDistro {
        RemoteDistro {
            name: name.to_string(),
            friendly_name: friendly.to_string(),
            description: String::new(),
            version: "latest".to_string(),
            amd64_url: Some(format!("https://host/{name}/amd64.tar.gz")),
            arm64_url: Some(format!("https://host/{name}/arm64.tar.gz")),
            tags: vec!["registry".to_string()],
        }
    }

    fn seeded_store(temp: &TempDir) -> CatalogStore {
        CatalogStore::new(temp.path().join("vault"))
    }

    #[test]
    fn test_merge_preserves_local_state() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp);

        // Existing available entry with a real file behind it.
        std::fs::create_dir_all(store.archive_dir()).unwrap();
        let archive = store.entry_path("debian-12").unwrap();
        std::fs::write(&archive, b"payload").unwrap();

        let mut prev_entry = DistroEntry::new("debian-12", "Debian 12", Architecture::X64);
        prev_entry.available = true;
        prev_entry.file_path = Some(archive.clone());
        prev_entry.size = Some(7);
        prev_entry.sha256 = Some("feed".to_string());
        let previous = Catalog {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: vec![prev_entry],
        };

        let mut record = remote("Debian 12", "Debian 12");
        record.description = "refreshed description".to_string();
        record.version = "12.6".to_string();

        let merged = reconcile(&previous, &[record], &store, Architecture::X64, Utc::now());

        let entry = merged.find("debian-12").expect("entry survives");
        assert!(entry.available);
        assert_eq!(entry.file_path, Some(archive));
        assert_eq!(entry.sha256, Some("feed".to_string()));
        // Remote metadata is refreshed.
        assert_eq!(entry.description, "refreshed description");
        assert_eq!(entry.version, "12.6");
    }

    #[test]
    fn test_vanished_file_flips_available_off() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp);

        let mut entry = DistroEntry::new("alpine", "Alpine", Architecture::X64);
        entry.available = true;
        entry.file_path = Some(store.entry_path("alpine").unwrap());
        let mut catalog = Catalog {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: vec![entry],
        };

        verify_availability(&mut catalog, &store);

        let entry = &catalog.entries[0];
        assert!(!entry.available);
        assert!(entry.file_path.is_none());
    }

    #[test]
    fn test_discovered_file_flips_available_on() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp);

        std::fs::create_dir_all(store.archive_dir()).unwrap();
        let archive = store.entry_path("alpine").unwrap();
        std::fs::write(&archive, b"tarball bytes").unwrap();

        let mut catalog = Catalog {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: vec![DistroEntry::new("alpine", "Alpine", Architecture::X64)],
        };

        verify_availability(&mut catalog, &store);

        let entry = &catalog.entries[0];
        assert!(entry.available);
        assert_eq!(entry.file_path, Some(archive));
        assert_eq!(entry.size, Some(13));
    }

    #[test]
    fn test_local_only_available_entry_survives_registry_churn() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp);

        std::fs::create_dir_all(store.archive_dir()).unwrap();
        std::fs::write(store.entry_path("homegrown").unwrap(), b"x").unwrap();

        let mut local = DistroEntry::new("homegrown", "Homegrown", Architecture::X64);
        local.available = true;
        local.file_path = Some(store.entry_path("homegrown").unwrap());
        let previous = Catalog {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: vec![local, DistroEntry::new("gone", "Gone", Architecture::X64)],
        };

        let merged = reconcile(
            &previous,
            &[remote("Ubuntu", "Ubuntu")],
            &store,
            Architecture::X64,
            Utc::now(),
        );

        assert!(merged.find("homegrown").is_some(), "available entry kept");
        assert!(merged.find("gone").is_none(), "unavailable entry dropped");
        assert!(merged.find("ubuntu").is_some());
    }

    #[test]
    fn test_registry_rename_matches_by_display_name() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp);

        std::fs::create_dir_all(store.archive_dir()).unwrap();
        let old_archive = store.entry_path("suse").unwrap();
        std::fs::write(&old_archive, b"suse bytes").unwrap();

        let mut prev_entry = DistroEntry::new("suse", "openSUSE Tumbleweed", Architecture::X64);
        prev_entry.available = true;
        prev_entry.file_path = Some(old_archive.clone());
        prev_entry.sha256 = Some("beef".to_string());
        let previous = Catalog {
            format_version: FORMAT_VERSION.to_string(),
            updated_at: Utc::now(),
            entries: vec![prev_entry],
        };

        // Registry renamed the identifier but kept the friendly name.
        let merged = reconcile(
            &previous,
            &[remote("openSUSE-Tumbleweed", "openSUSE Tumbleweed")],
            &store,
            Architecture::X64,
            Utc::now(),
        );

        assert_eq!(merged.entries.len(), 1, "no duplicate created");
        let entry = merged.find("opensuse-tumbleweed").expect("renamed entry");
        assert!(entry.available);
        assert_eq!(entry.file_path, Some(old_archive));
        assert_eq!(entry.sha256, Some("beef".to_string()));
    }

    #[test]
    fn test_source_url_follows_architecture() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp);

        let merged = reconcile(
            &Catalog::empty(),
            &[remote("Fedora", "Fedora")],
            &store,
            Architecture::Arm64,
            Utc::now(),
        );

        let entry = merged.find("fedora").unwrap();
        assert_eq!(
            entry.source_url.as_deref(),
            Some("https://host/Fedora/arm64.tar.gz")
        );
    }

    #[test]
    fn test_duplicate_registry_records_are_ignored() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp);

        let merged = reconcile(
            &Catalog::empty(),
            &[remote("Arch", "Arch Linux"), remote("arch", "Arch again")],
            &store,
            Architecture::X64,
            Utc::now(),
        );

        assert_eq!(merged.entries.len(), 1);
    }
}

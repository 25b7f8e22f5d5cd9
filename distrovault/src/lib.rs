//! DistroVault - acquisition and cataloging of Linux root-filesystem
//! images.
//!
//! This library maintains a durable catalog of downloadable distributions,
//! merges it with a remote registry without losing local download state,
//! fetches archives over HTTP(S) with progress, stall-timeout, redirect
//! and checksum handling, and digs usable filesystem archives out of
//! nested package containers. Cooperative guards keep background
//! refreshes and in-flight downloads from corrupting the shared catalog
//! file.
//!
//! The embedding application owns presentation, command parsing and
//! logging configuration; this crate only emits `tracing` events.
//!
//! # Example
//!
//! ```no_run
//! use distrovault::{DistroVault, HttpRegistryClient, VaultConfig};
//!
//! # async fn demo() -> distrovault::VaultResult<()> {
//! let config = VaultConfig::default();
//! let registry = HttpRegistryClient::new(config.registry_url.clone())?;
//! let vault = DistroVault::new(config, registry);
//!
//! for entry in vault.list_entries().await? {
//!     println!("{} available={}", entry.name, entry.available);
//! }
//!
//! vault.download("ubuntu-24.04", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod guard;
pub mod registry;
pub mod vault;

pub use catalog::{Architecture, Catalog, CatalogStore, DistroEntry};
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use extract::PayloadExtractor;
pub use fetch::{DownloadProgress, FetchOptions, FetchOutcome, HttpFetcher, ProgressCallback};
pub use guard::OperationGuards;
pub use registry::{HttpRegistryClient, RegistryClient, RemoteDistro};
pub use vault::DistroVault;

//! Catalog of known distributions and their local acquisition state.
//!
//! This module owns the persisted catalog:
//! - Data model (`entry`): [`DistroEntry`], [`Catalog`], [`Architecture`]
//! - Durable persistence (`store`): [`CatalogStore`] with corrupt-file
//!   recovery and atomic saves
//! - Reconciliation (`reconciler`): merging remote registry records with
//!   local state and re-verifying on-disk availability

mod entry;
mod reconciler;
mod store;

pub use entry::{normalize_name, sanitize_name, Architecture, Catalog, DistroEntry, FORMAT_VERSION};
pub(crate) use entry::default_version as default_version_label;
pub use reconciler::{merge_remote, reconcile, verify_availability};
pub use store::CatalogStore;

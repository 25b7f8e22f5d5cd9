//! HTTP download of distribution archives.
//!
//! This module provides the streaming archive fetcher, including:
//! - Single file downloads with bounded redirect following (`http`)
//! - SHA-256 digests of files on disk (`checksum`)
//! - Real-time progress reporting (`progress`)
//!
//! # Architecture
//!
//! ```text
//! HttpFetcher::fetch(url, dest, options)
//!         │
//!         ├── skip-if-exists check (digest of existing file)
//!         ├── manual redirect resolution (bounded hops)
//!         └── chunk loop: write + hash + progress
//!                 │
//!                 ├── stall timeout   → partial file removed
//!                 ├── cancellation    → partial file left to caller
//!                 └── checksum verify → mismatching file removed
//! ```

mod checksum;
mod http;
mod progress;

pub use checksum::file_sha256;
pub use http::{FetchOptions, FetchOutcome, HttpFetcher};
pub use progress::{DownloadProgress, ProgressCallback};

//! Streaming HTTP(S) archive downloads.
//!
//! One fetch streams a GET response to a destination file, feeding a
//! running SHA-256 digest and a progress observer per chunk. Redirects are
//! followed manually with a bounded hop count, the stall timeout fires
//! when no chunk arrives within its window, and cancellation is checked at
//! every suspension point.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Response, Url};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_REDIRECTS};
use crate::error::{VaultError, VaultResult};

use super::checksum::file_sha256;
use super::progress::{DownloadProgress, ProgressCallback};

/// Connect timeout for opening the transfer. Distinct from the stall
/// window, which only starts once the response is streaming.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Per-fetch options. All optional; defaults noted on the fields.
pub struct FetchOptions {
    /// Observer invoked for every received chunk.
    pub progress: Option<ProgressCallback>,

    /// Stall window: the fetch aborts when no chunk arrives within it.
    /// Default 60 seconds.
    pub timeout: Duration,

    /// Redirect hop limit. Default 5.
    pub max_redirects: usize,

    /// Cooperative cancellation. A cancelled fetch aborts promptly and
    /// may leave a partial file for the caller to discard.
    pub cancellation: CancellationToken,

    /// Expected hex SHA-256 digest, consumed by `verify_checksum` and
    /// `skip_if_exists`.
    pub expected_sha256: Option<String>,

    /// Compare the streamed digest against `expected_sha256` after the
    /// transfer; on mismatch the file is deleted and an error raised.
    pub verify_checksum: bool,

    /// When the destination already exists and matches
    /// `expected_sha256`, skip the transfer entirely. The existing
    /// file's modification time is left untouched.
    pub skip_if_exists: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            progress: None,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            cancellation: CancellationToken::new(),
            expected_sha256: None,
            verify_checksum: false,
            skip_if_exists: false,
        }
    }
}

impl FetchOptions {
    /// Attach a progress observer (builder pattern).
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Override the stall window (builder pattern).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the redirect hop limit (builder pattern).
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Attach a cancellation token (builder pattern).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Verify the streamed digest against an expected value.
    pub fn verify_sha256(mut self, expected: impl Into<String>) -> Self {
        self.expected_sha256 = Some(expected.into());
        self.verify_checksum = true;
        self
    }

    /// Skip the transfer when the destination already matches a digest.
    pub fn skip_if_matching(mut self, expected: impl Into<String>) -> Self {
        self.expected_sha256 = Some(expected.into());
        self.skip_if_exists = true;
        self
    }
}

/// Result of a completed (or skipped) fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Bytes on disk at the destination.
    pub bytes: u64,

    /// Hex SHA-256 digest of the destination file.
    pub sha256: String,
}

/// Streaming downloader for archive files.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher.
    ///
    /// Redirect handling is disabled in the client; hops are followed
    /// manually so the loop bound stays explicit.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Download `url` into `dest`.
    ///
    /// The destination's parent directory must already exist; a missing or
    /// unwritable directory fails before any bytes are transferred.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Network`] on DNS/connect/read failures
    /// - [`VaultError::HttpStatus`] on a non-success status
    /// - [`VaultError::RedirectLoop`] past the hop limit
    /// - [`VaultError::Timeout`] when no chunk arrives within the stall
    ///   window (partial file removed)
    /// - [`VaultError::ChecksumMismatch`] when verification fails
    ///   (destination removed)
    /// - [`VaultError::Cancelled`] on cooperative cancellation (partial
    ///   file left for the caller)
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        options: &FetchOptions,
    ) -> VaultResult<FetchOutcome> {
        if options.skip_if_exists {
            if let Some(expected) = options.expected_sha256.as_deref() {
                if let Some(outcome) = check_existing(dest, expected, options).await? {
                    debug!(url, dest = %dest.display(), "destination up to date, skipping fetch");
                    return Ok(outcome);
                }
            }
        }

        let response = self.resolve_redirects(url, options).await?;
        stream_to_file(url, response, dest, options).await
    }

    /// Issue the GET, following 3xx responses manually up to the hop
    /// limit.
    async fn resolve_redirects(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> VaultResult<Response> {
        let mut current = Url::parse(url).map_err(|e| VaultError::Network {
            url: url.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;

        for _ in 0..=options.max_redirects {
            if options.cancellation.is_cancelled() {
                return Err(VaultError::Cancelled {
                    url: url.to_string(),
                });
            }

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| VaultError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(VaultError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    })?;
                let next = current.join(location).map_err(|e| VaultError::Network {
                    url: url.to_string(),
                    reason: format!("bad redirect target {location:?}: {e}"),
                })?;
                debug!(from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(VaultError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            return Ok(response);
        }

        Err(VaultError::RedirectLoop {
            url: url.to_string(),
            limit: options.max_redirects,
        })
    }
}

/// Skip-if-exists check: a destination whose digest already matches makes
/// the fetch a no-op, leaving the file (and its modification time) alone.
async fn check_existing(
    dest: &Path,
    expected: &str,
    options: &FetchOptions,
) -> VaultResult<Option<FetchOutcome>> {
    let meta = match tokio::fs::metadata(dest).await {
        Ok(meta) if meta.is_file() => meta,
        _ => return Ok(None),
    };

    let digest = file_sha256(dest).await?;
    if !digest.eq_ignore_ascii_case(expected) {
        return Ok(None);
    }

    if let Some(ref cb) = options.progress {
        cb(DownloadProgress::new(meta.len(), Some(meta.len())));
    }
    Ok(Some(FetchOutcome {
        bytes: meta.len(),
        sha256: digest,
    }))
}

/// Stream the response body to the destination, hashing as it goes.
async fn stream_to_file(
    url: &str,
    response: Response,
    dest: &Path,
    options: &FetchOptions,
) -> VaultResult<FetchOutcome> {
    // A zero Content-Length is treated as unknown so percent is omitted
    // rather than pinned to a meaningless value.
    let total_bytes = response.content_length().filter(|total| *total > 0);

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| VaultError::io(dest, e))?;

    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    loop {
        let step = tokio::select! {
            _ = options.cancellation.cancelled() => {
                // Partial file stays; discarding it is the caller's call.
                warn!(url, "download cancelled");
                return Err(VaultError::Cancelled {
                    url: url.to_string(),
                });
            }
            step = tokio::time::timeout(options.timeout, stream.next()) => step,
        };

        let chunk = match step {
            Err(_) => {
                drop(file);
                remove_partial(dest).await;
                return Err(VaultError::Timeout {
                    url: url.to_string(),
                    stall_secs: options.timeout.as_secs(),
                });
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                return Err(VaultError::Network {
                    url: url.to_string(),
                    reason: format!("read error: {e}"),
                });
            }
            Ok(Some(Ok(chunk))) => chunk,
        };

        file.write_all(&chunk)
            .await
            .map_err(|e| VaultError::io(dest, e))?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;

        if let Some(ref cb) = options.progress {
            cb(DownloadProgress::new(downloaded, total_bytes));
        }
    }

    file.flush().await.map_err(|e| VaultError::io(dest, e))?;
    drop(file);

    let sha256 = format!("{:x}", hasher.finalize());

    if options.verify_checksum {
        if let Some(expected) = options.expected_sha256.as_deref() {
            if !sha256.eq_ignore_ascii_case(expected) {
                remove_partial(dest).await;
                return Err(VaultError::ChecksumMismatch {
                    file: dest
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .to_string(),
                    expected: expected.to_string(),
                    actual: sha256,
                });
            }
        }
    }

    info!(url, bytes = downloaded, "download complete");
    Ok(FetchOutcome {
        bytes: downloaded,
        sha256,
    })
}

/// Best-effort removal of a partial destination file.
async fn remove_partial(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %dest.display(), error = %e, "failed to remove partial file");
        }
    }
}

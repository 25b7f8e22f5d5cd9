//! SHA-256 digests of files on disk.
//!
//! Downloads hash their bytes while streaming; these helpers cover the
//! cases where an already-written file must be digested, such as the
//! skip-if-exists check and post-extraction bookkeeping.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::{VaultError, VaultResult};

/// Buffer size for reading files during checksum calculation (64KB).
pub(crate) const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the SHA-256 digest of a file.
///
/// Returns the lowercase hexadecimal hash of the file contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn file_sha256(path: &Path) -> VaultResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| VaultError::io(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .await
            .map_err(|e| VaultError::io(path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

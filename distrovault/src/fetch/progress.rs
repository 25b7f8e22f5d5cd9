//! Download progress reporting.

/// Progress callback invoked for every chunk received during a fetch.
///
/// Deliveries within one fetch are strictly ordered: `downloaded_bytes`
/// is monotonically non-decreasing.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync>;

/// A point-in-time snapshot of one transfer. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub downloaded_bytes: u64,

    /// Total transfer size, when the server announced one.
    pub total_bytes: Option<u64>,

    /// Completion percentage. `None` whenever the total is unknown, so a
    /// missing or zero Content-Length never misreports 0% throughout.
    pub percent: Option<f64>,
}

impl DownloadProgress {
    /// Build a snapshot, deriving `percent` from the counters.
    pub fn new(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes
            .filter(|total| *total > 0)
            .map(|total| (downloaded_bytes as f64 / total as f64) * 100.0);

        Self {
            downloaded_bytes,
            total_bytes,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_with_known_total() {
        let progress = DownloadProgress::new(50, Some(200));
        assert_eq!(progress.percent, Some(25.0));
    }

    #[test]
    fn test_percent_unknown_total() {
        let progress = DownloadProgress::new(50, None);
        assert_eq!(progress.percent, None);
        assert_eq!(progress.downloaded_bytes, 50);
    }

    #[test]
    fn test_percent_zero_total_is_omitted() {
        let progress = DownloadProgress::new(0, Some(0));
        assert_eq!(progress.percent, None);
    }

    #[test]
    fn test_complete_transfer() {
        let progress = DownloadProgress::new(200, Some(200));
        assert_eq!(progress.percent, Some(100.0));
    }
}

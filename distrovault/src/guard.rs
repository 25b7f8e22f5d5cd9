//! Cooperative locks coordinating refreshes and downloads.
//!
//! Two advisory flags make catalog refreshes and downloads mutually
//! exclusive: a refresh is skipped entirely while a download holds its
//! flag, and a download refuses to start while a refresh holds its flag.
//! Skipped operations are not queued or retried; the caller keeps working
//! with the catalog it has.
//!
//! The flags are atomics rather than plain booleans because the tokio
//! runtime schedules tasks across threads. They remain advisory and
//! single-process: nothing here locks the catalog file across processes.

use std::sync::atomic::{AtomicBool, Ordering};

/// The two cooperative operation flags.
#[derive(Debug, Default)]
pub struct OperationGuards {
    refresh: AtomicBool,
    download: AtomicBool,
}

/// RAII token for a held flag. Dropping it releases the flag, so release
/// happens on every exit path, including early returns and panics.
#[derive(Debug)]
pub struct GuardToken<'a> {
    flag: &'a AtomicBool,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl OperationGuards {
    /// Create both flags in the released state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to begin a refresh pass.
    ///
    /// Returns `None` when a download is in progress or another refresh
    /// already holds the flag. The caller must skip the pass, not wait.
    pub fn try_refresh(&self) -> Option<GuardToken<'_>> {
        if self.download.load(Ordering::SeqCst) {
            return None;
        }
        self.acquire(&self.refresh)
    }

    /// Try to begin a download pass.
    ///
    /// Returns `None` when a refresh is in progress or another download
    /// already holds the flag.
    pub fn try_download(&self) -> Option<GuardToken<'_>> {
        if self.refresh.load(Ordering::SeqCst) {
            return None;
        }
        self.acquire(&self.download)
    }

    /// Whether the refresh flag is currently held.
    pub fn refresh_held(&self) -> bool {
        self.refresh.load(Ordering::SeqCst)
    }

    /// Whether the download flag is currently held.
    pub fn download_held(&self) -> bool {
        self.download.load(Ordering::SeqCst)
    }

    fn acquire<'a>(&'a self, flag: &'a AtomicBool) -> Option<GuardToken<'a>> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| GuardToken { flag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_blocked_while_download_held() {
        let guards = OperationGuards::new();

        let token = guards.try_download().expect("download flag free");
        assert!(guards.download_held());
        assert!(guards.try_refresh().is_none());

        drop(token);
        assert!(!guards.download_held());
        assert!(guards.try_refresh().is_some());
    }

    #[test]
    fn test_download_blocked_while_refresh_held() {
        let guards = OperationGuards::new();

        let token = guards.try_refresh().expect("refresh flag free");
        assert!(guards.refresh_held());
        assert!(guards.try_download().is_none());

        drop(token);
        assert!(guards.try_download().is_some());
    }

    #[test]
    fn test_same_flag_is_not_reentrant() {
        let guards = OperationGuards::new();

        let _token = guards.try_refresh().expect("refresh flag free");
        assert!(guards.try_refresh().is_none());
    }

    #[test]
    fn test_token_releases_on_early_exit() {
        let guards = OperationGuards::new();

        fn bails_out(guards: &OperationGuards) -> Result<(), ()> {
            let _token = guards.try_download().ok_or(())?;
            Err(())
        }

        assert!(bails_out(&guards).is_err());
        assert!(!guards.download_held());
    }
}

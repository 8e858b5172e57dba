//! Decoded-progress signalling for frame-threaded decoding.
//!
//! Each in-flight picture carries a handle that the owning thread bumps as
//! rows finish reconstruction; threads reading the picture as a reference
//! poll it before touching sample memory. Synthetic placeholder pictures
//! report [`ProgressHandle::COMPLETE`] immediately so nobody ever waits on
//! them.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Shared, monotonically increasing decode progress for one picture.
#[derive(Clone, Debug)]
pub struct ProgressHandle {
    rows: Arc<AtomicI32>,
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandle {
    /// Progress value meaning "every sample is available".
    pub const COMPLETE: i32 = i32::MAX;

    pub fn new() -> Self {
        Self {
            rows: Arc::new(AtomicI32::new(-1)),
        }
    }

    /// Publish progress up to row `n`. Never moves backwards.
    pub fn report(&self, n: i32) {
        self.rows.fetch_max(n, Ordering::Release);
    }

    /// Latest published progress (-1 before any report).
    pub fn current(&self) -> i32 {
        self.rows.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let progress = ProgressHandle::new();
        assert_eq!(progress.current(), -1);
        progress.report(10);
        progress.report(5);
        assert_eq!(progress.current(), 10);
        progress.report(ProgressHandle::COMPLETE);
        assert_eq!(progress.current(), ProgressHandle::COMPLETE);
    }

    #[test]
    fn test_clones_share_state() {
        let progress = ProgressHandle::new();
        let other = progress.clone();
        progress.report(3);
        assert_eq!(other.current(), 3);
    }
}

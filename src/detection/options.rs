//! Runtime scan configuration.

use serde::{Deserialize, Serialize};

/// Largest start and end window a scan reads.
pub const MAX_WINDOW_SIZE: usize = 4096;

/// Default cap on the in-memory copy taken by the async scan.
pub const DEFAULT_MAX_SNAPSHOT_SIZE: u64 = 256 * 1024 * 1024;

/// Options of one scan.
///
/// # Examples
///
/// ```
/// use filesniff::ScanOptions;
/// let options = ScanOptions::default().with_window_size(100_000);
/// assert_eq!(options.window_size(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Bytes read from each end of the source, clamped to `1..=4096`
    pub window_size: usize,
    /// Sources larger than this are not buffered by the async scan;
    /// container scanners then report no match
    pub max_snapshot_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            window_size: MAX_WINDOW_SIZE,
            max_snapshot_size: DEFAULT_MAX_SNAPSHOT_SIZE,
        }
    }
}

impl ScanOptions {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_max_snapshot_size(mut self, max_snapshot_size: u64) -> Self {
        self.max_snapshot_size = max_snapshot_size;
        self
    }

    /// Effective window size.
    pub fn window_size(&self) -> usize {
        self.window_size.clamp(1, MAX_WINDOW_SIZE)
    }
}

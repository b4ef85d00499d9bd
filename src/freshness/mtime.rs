//! File modification times for change detection.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification time in milliseconds since the Unix epoch.
///
/// Returns `None` if the file doesn't exist or the platform has no mtime.
pub fn mtime_millis(path: &Path) -> Option<u64> {
    let modified = path.metadata().and_then(|m| m.modified()).ok()?;
    system_time_millis(modified)
}

#[allow(clippy::cast_possible_truncation)] // u64 millis covers ~584 million years
pub fn system_time_millis(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}
